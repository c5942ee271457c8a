//! Production assembler (`cmpack build`).

use crate::bundler_config::css::{get_css_loaders, get_css_rules, CssContext};
use crate::bundler_config::entry::get_entry;
use crate::bundler_config::plugins::{
    get_common_plugins, ANALYZE_REPORT, EXTRACT_PLUGIN, VISUALIZER_PLUGIN,
};
use crate::bundler_config::rules::{
    add_extra_babel_includes, get_babel_options, get_first_rules, get_last_rules, get_svg_rules,
};
use crate::bundler_config::splitting::split_chunks;
use crate::bundler_config::theme::get_theme;
use crate::bundler_config::{
    get_resolve, AssemblyContext, BundlerConfig, ModuleConfig, Mode, Optimization, Output, Plugin,
};
use crate::config::{Devtool, RcConfig, DEFAULT_DEVTOOL};
use crate::error::BuildError;
use indexmap::IndexMap;
use serde_json::json;
use std::path::Path;

/// Flags of `cmpack build` that shape the assembled config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProdOptions {
    /// Unminified build with development defines and source maps
    pub debug: bool,
    /// Add the bundle visualizer
    pub analyze: bool,
}

/// Output file name stems for scripts and stylesheets.
pub fn file_name_templates(hash: bool) -> (&'static str, &'static str) {
    if hash {
        ("[name].[chunkhash:8]", "[name].[contenthash:8]")
    } else {
        ("[name]", "[name]")
    }
}

/// Assemble the production config for one target.
pub fn assemble_prod(
    options: ProdOptions,
    output_dir: &Path,
    config: &RcConfig,
    ctx: &AssemblyContext,
) -> Result<BundlerConfig, BuildError> {
    let paths = ctx.paths;
    let node_env = if options.debug {
        "development"
    } else {
        ctx.environment
    };
    let devtool = config.devtool.clone().unwrap_or(if options.debug {
        Devtool::Named(DEFAULT_DEVTOOL.to_string())
    } else {
        Devtool::Disabled
    });

    let babel_options = get_babel_options(config, paths);
    let css_loaders = get_css_loaders(config);
    let theme: IndexMap<_, _> = get_theme(&paths.app_directory, config, ctx.script)?;
    let (js_name, css_name) = file_name_templates(config.hash);

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
    rules.extend(get_svg_rules(config, paths));

    let mut plugins = vec![Plugin::new(
        EXTRACT_PLUGIN,
        json!({ "filename": format!("{css_name}.css") }),
    )];
    plugins.extend(get_common_plugins(config, paths, output_dir, node_env));
    if options.analyze {
        plugins.push(Plugin::new(
            VISUALIZER_PLUGIN,
            json!({ "filename": ANALYZE_REPORT }),
        ));
    }

    let assembled = BundlerConfig {
        mode: if options.debug {
            Mode::Development
        } else {
            Mode::Production
        },
        bail: true,
        devtool,
        entry: get_entry(config, paths, true)?,
        output: Output {
            path: output_dir.to_path_buf(),
            filename: format!("{js_name}.js"),
            chunk_filename: Some(format!("{js_name}.async.js")),
            public_path: config.public_path().to_string(),
            library: config.library.clone(),
            library_target: Some(config.library_target().to_string()),
        },
        resolve: get_resolve(config, paths),
        module: ModuleConfig { rules },
        optimization: Optimization {
            split_chunks: split_chunks(),
            minimize: !options.debug,
        },
        plugins,
        externals: config.externals.clone(),
        extra: IndexMap::new(),
    };

    Ok(add_extra_babel_includes(
        assembled,
        paths,
        &config.extra_babel_includes,
        &babel_options,
    ))
}
