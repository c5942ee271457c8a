//! DLL assembler (`cmpack buildDll`).

use crate::bundler_config::css::{get_css_loaders, get_css_rules, CssContext};
use crate::bundler_config::plugins::{DLL_PLUGIN, EXTRACT_PLUGIN};
use crate::bundler_config::rules::{get_babel_options, get_first_rules, get_last_rules};
use crate::bundler_config::{
    get_resolve, AssemblyContext, BundlerConfig, ModuleConfig, Mode, Optimization, Output, Plugin,
};
use crate::config::{read_manifest_opt, Devtool, RcConfig};
use crate::error::BuildError;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Chunk name of the DLL bundle; the library and manifest use it too.
pub const DLL_NAME: &str = "cmpack";

/// Modules bundled into the DLL: manifest `dependencies` minus `exclude`,
/// plus `include`, without duplicates.
pub fn dll_modules(manifest: Option<&Value>, config: &RcConfig) -> Vec<String> {
    let options = config.dll_options();
    let mut modules: Vec<String> = manifest
        .and_then(|m| m.get("dependencies"))
        .and_then(Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default();

    modules.retain(|name| !options.exclude.contains(name));
    for name in options.include {
        if !modules.contains(&name) {
            modules.push(name);
        }
    }
    modules
}

/// Assemble the reference-generation config for the DLL bundle.
pub fn assemble_dll(config: &RcConfig, ctx: &AssemblyContext) -> Result<BundlerConfig, BuildError> {
    let paths = ctx.paths;
    let manifest = read_manifest_opt(paths);
    let modules = dll_modules(manifest.as_ref(), config);
    if modules.is_empty() {
        return Err(BuildError::EntryNotFound {
            pattern: "package.json dependencies".to_string(),
        });
    }

    let babel_options = get_babel_options(config, paths);
    let css_loaders = get_css_loaders(config);
    let theme = IndexMap::new();

    let mut rules = get_first_rules(paths, &babel_options);
    rules.extend(get_css_rules(
        Mode::Production,
        &CssContext {
            config,
            paths,
            loaders: &css_loaders,
            theme: &theme,
        },
    ));
    rules.extend(get_last_rules());

    let mut entry = BTreeMap::new();
    entry.insert(DLL_NAME.to_string(), modules);

    Ok(BundlerConfig {
        mode: Mode::Production,
        bail: true,
        devtool: Devtool::Disabled,
        entry,
        output: Output {
            path: paths.dll_node_module.clone(),
            filename: "[name].dll.js".to_string(),
            chunk_filename: None,
            public_path: config.public_path().to_string(),
            library: Some("[name]".to_string()),
            library_target: None,
        },
        resolve: get_resolve(config, paths),
        module: ModuleConfig { rules },
        optimization: Optimization {
            minimize: true,
            ..Optimization::default()
        },
        plugins: vec![
            Plugin::new(
                "DefinePlugin",
                json!({ "process.env.NODE_ENV": json!(ctx.environment).to_string() }),
            ),
            Plugin::new(EXTRACT_PLUGIN, json!({ "filename": "[name].dll.css" })),
            Plugin::new(
                DLL_PLUGIN,
                json!({
                    "path": paths.dll_manifest,
                    "name": "[name]",
                    "context": paths.app_directory
                }),
            ),
        ],
        externals: None,
        extra: IndexMap::new(),
    })
}
