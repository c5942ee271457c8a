//! Development assembler (`cmpack server`).

use crate::bundler_config::css::{get_css_loaders, get_css_rules, CssContext};
use crate::bundler_config::entry::get_entry;
use crate::bundler_config::plugins::get_common_plugins;
use crate::bundler_config::rules::{
    add_extra_babel_includes, get_babel_options, get_first_rules, get_last_rules, get_svg_rules,
};
use crate::bundler_config::theme::get_theme;
use crate::bundler_config::{
    get_resolve, AssemblyContext, BundlerConfig, ModuleConfig, Mode, Optimization, Output,
};
use crate::config::{Devtool, RcConfig, DEFAULT_DEVTOOL};
use crate::error::BuildError;
use indexmap::IndexMap;

/// Assemble the development config for one target.
///
/// Output goes to the dev cache directory with stable names; styles are
/// injected rather than extracted and nothing is split or minimized.
pub fn assemble_dev(config: &RcConfig, ctx: &AssemblyContext) -> Result<BundlerConfig, BuildError> {
    let paths = ctx.paths;
    let babel_options = get_babel_options(config, paths);
    let css_loaders = get_css_loaders(config);
    let theme = get_theme(&paths.app_directory, config, ctx.script)?;

    let mut rules = get_first_rules(paths, &babel_options);
    rules.extend(get_css_rules(
        Mode::Development,
        &CssContext {
            config,
            paths,
            loaders: &css_loaders,
            theme: &theme,
        },
    ));
    rules.extend(get_last_rules());
    rules.extend(get_svg_rules(config, paths));

    let assembled = BundlerConfig {
        mode: Mode::Development,
        bail: false,
        devtool: config
            .devtool
            .clone()
            .unwrap_or_else(|| Devtool::Named(DEFAULT_DEVTOOL.to_string())),
        entry: get_entry(config, paths, false)?,
        output: Output {
            path: paths.dev_output.clone(),
            filename: "[name].js".to_string(),
            chunk_filename: Some("[name].async.js".to_string()),
            public_path: config.public_path().to_string(),
            library: config.library.clone(),
            library_target: Some(config.library_target().to_string()),
        },
        resolve: get_resolve(config, paths),
        module: ModuleConfig { rules },
        optimization: Optimization::default(),
        plugins: get_common_plugins(config, paths, &paths.dev_output, ctx.environment),
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
