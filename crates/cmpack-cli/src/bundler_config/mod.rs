//! Bundler configuration assembly.
//!
//! Each assembler turns one [`RcConfig`] target into a complete
//! [`BundlerConfig`]: production (`cmpack build`), development
//! (`cmpack server`) and the DLL pre-build (`cmpack buildDll`). The result is
//! serialized as JSON for the external bundler, after the optional override
//! hook has had the last word.

mod css;
mod dev;
mod dll;
mod entry;
mod hook;
mod plugins;
mod prod;
mod rules;
mod splitting;
mod theme;
mod types;

pub use css::{get_css_loaders, get_css_rules, CssContext, CssLoaders, EXTRACT_LOADER, STYLE_LOADER};
pub use dev::assemble_dev;
pub use dll::{assemble_dll, dll_modules, DLL_NAME};
pub use entry::get_entry;
pub use hook::{apply_override, warn_if_exists, OVERRIDE_FILE};
pub use plugins::*;
pub use prod::{assemble_prod, file_name_templates, ProdOptions};
pub use rules::{
    add_extra_babel_includes, get_babel_options, get_first_rules, get_last_rules, get_svg_rules,
};
pub use splitting::{assign_group, split_chunks, COMMON_GROUP, STYLES_GROUP, VENDOR_GROUP};
pub use theme::get_theme;
pub use types::*;

use crate::config::RcConfig;
use crate::extension::{ConfigOverride, ConfigScript};
use crate::paths::ProjectPaths;
use std::path::PathBuf;
use std::sync::Arc;

/// Module extensions the bundler tries, in order, before user additions.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".web.js", ".js", ".jsx", ".ts", ".tsx", ".json"];

/// Everything an assembler needs besides the target config itself.
#[derive(Clone)]
pub struct AssemblyContext<'a> {
    pub paths: &'a ProjectPaths,
    /// Value of `NODE_ENV` for this run
    pub environment: &'a str,
    /// Evaluates script theme files
    pub script: &'a dyn ConfigScript,
    /// Applied to every assembled config when present
    pub config_override: Option<Arc<dyn ConfigOverride>>,
}

impl<'a> AssemblyContext<'a> {
    pub fn new(paths: &'a ProjectPaths, environment: &'a str, script: &'a dyn ConfigScript) -> Self {
        Self {
            paths,
            environment,
            script,
            config_override: None,
        }
    }

    pub fn with_override(mut self, hook: Option<Arc<dyn ConfigOverride>>) -> Self {
        self.config_override = hook;
        self
    }
}

/// Module resolution shared by every assembler.
pub fn get_resolve(config: &RcConfig, paths: &ProjectPaths) -> Resolve {
    let mut extensions: Vec<String> = RESOLVE_EXTENSIONS.iter().map(|e| e.to_string()).collect();
    for extra in &config.extra_resolve_extensions {
        if !extensions.contains(extra) {
            extensions.push(extra.clone());
        }
    }

    Resolve {
        modules: vec![paths.app_node_modules.clone(), PathBuf::from("node_modules")],
        extensions,
        alias: config.alias.clone(),
    }
}
