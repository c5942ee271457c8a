//! Canonical project paths.
//!
//! Every orchestrator works from one [`ProjectPaths`] value computed at start
//! from the project root. Nothing below this layer calls `current_dir`.

use std::path::{Path, PathBuf};

/// Directory (under `node_modules`) holding the pre-built DLL bundle.
pub const DLL_DIR_NAME: &str = "cmpack-dlls";

/// File name of the DLL reference manifest inside [`DLL_DIR_NAME`].
pub const DLL_MANIFEST_NAME: &str = "cmpack.json";

/// Absolute paths of the project being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub app_directory: PathBuf,
    pub app_src: PathBuf,
    pub app_public: PathBuf,
    pub app_package_json: PathBuf,
    pub app_node_modules: PathBuf,
    /// Output directory of `cmpack buildDll`.
    pub dll_node_module: PathBuf,
    /// Reference manifest written next to the DLL bundle.
    pub dll_manifest: PathBuf,
    /// Transform cache, cleared before every DLL build.
    pub app_babel_cache: PathBuf,
    /// Where the dev server lets the bundler write its output.
    pub dev_output: PathBuf,
    /// Live-reload client prepended to development entries.
    pub dev_client: PathBuf,
}

impl ProjectPaths {
    /// Derive all paths from a project root.
    ///
    /// Relative roots are made absolute against the current directory; the
    /// root is not required to exist.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let app_directory = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        };

        let app_node_modules = app_directory.join("node_modules");
        let dll_node_module = app_node_modules.join(DLL_DIR_NAME);

        Self {
            app_src: app_directory.join("src"),
            app_public: app_directory.join("public"),
            app_package_json: app_directory.join("package.json"),
            dll_manifest: dll_node_module.join(DLL_MANIFEST_NAME),
            app_babel_cache: app_node_modules.join(".cache").join("babel-loader"),
            dev_output: app_node_modules.join(".cache").join("cmpack-dev"),
            dev_client: app_node_modules
                .join(".cache")
                .join("cmpack-reload-client.js"),
            dll_node_module,
            app_node_modules,
            app_directory,
        }
    }

    /// Resolve a project-relative path. Absolute inputs are returned as-is.
    pub fn resolve_app(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.app_directory.join(relative)
        }
    }
}
