//! Script, asset and svg rules bracketing the style rules.

use crate::bundler_config::{BundlerConfig, Condition, RuleSetRule, UseEntry};
use crate::config::RcConfig;
use crate::paths::ProjectPaths;
use serde_json::{json, Value};
use std::path::Path;

const SCRIPT_TEST: &str = r"\.(js|jsx)$";
const TYPESCRIPT_TEST: &str = r"\.(ts|tsx)$";
const SVG_TEST: &str = r"\.svg$";

/// Inline assets below this size (bytes) as data URLs.
const URL_LOADER_LIMIT: u64 = 10_000;

/// Babel options shared by every script rule of a target.
pub fn get_babel_options(config: &RcConfig, paths: &ProjectPaths) -> Value {
    json!({
        "babelrc": false,
        "cacheDirectory": paths.app_babel_cache,
        "presets": [
            ["@babel/preset-env", { "targets": { "browsers": config.browsers() } }],
            "@babel/preset-react"
        ]
    })
}

fn babel_loader(options: &Value) -> UseEntry {
    UseEntry::with_options("babel-loader", options.clone())
}

/// Source-transform rules; these come before the style rules.
pub fn get_first_rules(paths: &ProjectPaths, babel_options: &Value) -> Vec<RuleSetRule> {
    vec![
        RuleSetRule::test(SCRIPT_TEST)
            .include(Condition::Path(paths.app_src.clone()))
            .loader(babel_loader(babel_options)),
        RuleSetRule::test(TYPESCRIPT_TEST)
            .include(Condition::Path(paths.app_src.clone()))
            .loader(babel_loader(babel_options))
            .loader(UseEntry::with_options(
                "ts-loader",
                json!({ "transpileOnly": true }),
            )),
    ]
}

/// Html and catch-all asset rules; these come after the style rules.
pub fn get_last_rules() -> Vec<RuleSetRule> {
    let catch_all = [
        r"\.html$",
        SCRIPT_TEST,
        TYPESCRIPT_TEST,
        r"\.(css|less|scss|sass)$",
        r"\.json$",
        SVG_TEST,
    ]
    .into_iter()
    .fold(RuleSetRule::default(), |rule, test| {
        rule.exclude(Condition::regex(test))
    })
    .loader(UseEntry::with_options(
        "url-loader",
        json!({ "limit": URL_LOADER_LIMIT, "name": "static/[name].[hash:8].[ext]" }),
    ));

    vec![
        RuleSetRule::test(r"\.html$").loader(UseEntry::with_options(
            "file-loader",
            json!({ "name": "[name].[ext]" }),
        )),
        catch_all,
    ]
}

/// Svg rules: sprite loader for `svgSpriteLoaderDirs`, url-loader elsewhere.
pub fn get_svg_rules(config: &RcConfig, paths: &ProjectPaths) -> Vec<RuleSetRule> {
    let base = RuleSetRule::test(SVG_TEST).loader(UseEntry::with_options(
        "url-loader",
        json!({ "limit": URL_LOADER_LIMIT, "name": "static/[name].[hash:8].[ext]" }),
    ));

    if config.svg_sprite_loader_dirs.is_empty() {
        return vec![base];
    }

    let dirs: Vec<Condition> = config
        .svg_sprite_loader_dirs
        .iter()
        .map(|dir| Condition::Path(paths.resolve_app(dir)))
        .collect();

    let base = RuleSetRule {
        exclude: dirs.clone(),
        ..base
    };
    let sprite = RuleSetRule {
        include: dirs,
        ..RuleSetRule::test(SVG_TEST).loader(UseEntry::new("svg-sprite-loader"))
    };
    vec![base, sprite]
}

/// Add a babel rule covering `includes` (e.g. linked local packages).
///
/// Relative paths are resolved against the project root. The default script
/// rule, and its restriction to `src`, are left as they are.
pub fn add_extra_babel_includes(
    mut config: BundlerConfig,
    paths: &ProjectPaths,
    includes: &[String],
    babel_options: &Value,
) -> BundlerConfig {
    if includes.is_empty() {
        return config;
    }

    let include = includes
        .iter()
        .map(|p| Condition::Path(paths.resolve_app(Path::new(p))))
        .collect();

    config.module.rules.push(RuleSetRule {
        include,
        ..RuleSetRule::test(SCRIPT_TEST).loader(babel_loader(babel_options))
    });
    config
}
