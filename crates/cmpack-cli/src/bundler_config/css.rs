//! Style rule synthesis.
//!
//! Each stylesheet family (css, less, and sass when enabled) gets one rule
//! whose `oneOf` list is checked in a fixed order and stops at the first
//! match:
//!
//! 1. paths listed in `cssModulesExclude` (global CSS)
//! 2. files under `node_modules` (global CSS)
//! 3. everything else (CSS modules unless `disableCSSModules`)

use crate::bundler_config::{Condition, Mode, RuleSetRule, UseEntry};
use crate::config::RcConfig;
use crate::paths::ProjectPaths;
use indexmap::IndexMap;
use serde_json::{json, Value};

pub const STYLE_LOADER: &str = "style-loader";
pub const EXTRACT_LOADER: &str = "mini-css-extract-plugin/loader";

/// Loader chains shared by all stylesheet families.
#[derive(Debug, Clone, PartialEq)]
pub struct CssLoaders {
    /// Project styles
    pub own: Vec<UseEntry>,
    /// Styles from dependencies
    pub node_modules: Vec<UseEntry>,
    /// Project styles opted out of CSS modules
    pub no_css_modules: Vec<UseEntry>,
    /// Sass preprocessor, when enabled
    pub sass: Option<UseEntry>,
}

/// Everything [`get_css_rules`] reads.
pub struct CssContext<'a> {
    pub config: &'a RcConfig,
    pub paths: &'a ProjectPaths,
    pub loaders: &'a CssLoaders,
    pub theme: &'a IndexMap<String, Value>,
}

fn css_loader(modules: bool) -> UseEntry {
    let mut options = json!({ "importLoaders": 1, "sourceMap": true });
    if modules {
        options["modules"] = json!({ "localIdentName": "[local]___[hash:base64:5]" });
    }
    UseEntry::with_options("css-loader", options)
}

fn postcss_loader(browsers: &[String]) -> UseEntry {
    UseEntry::with_options(
        "postcss-loader",
        json!({
            "postcssOptions": {
                "plugins": [["autoprefixer", { "overrideBrowserslist": browsers }]]
            }
        }),
    )
}

/// Build the loader chains for a target.
pub fn get_css_loaders(config: &RcConfig) -> CssLoaders {
    let postcss = postcss_loader(&config.browsers());
    let global = vec![css_loader(false), postcss.clone()];

    let sass = config.sass.as_ref().filter(|s| s.is_enabled()).map(|s| {
        let mut options = s.loader_options();
        options.entry("sourceMap").or_insert(Value::Bool(true));
        UseEntry::with_options("sass-loader", Value::Object(options))
    });

    CssLoaders {
        own: vec![css_loader(!config.disable_css_modules), postcss],
        node_modules: global.clone(),
        no_css_modules: global,
        sass,
    }
}

fn less_loader(theme: &IndexMap<String, Value>) -> UseEntry {
    UseEntry::with_options(
        "less-loader",
        json!({
            "lessOptions": {
                "modifyVars": theme,
                "javascriptEnabled": true
            }
        }),
    )
}

/// Build the ordered style rules for `mode`.
///
/// Development injects styles with `style-loader`; production extracts them
/// into separate files.
pub fn get_css_rules(mode: Mode, ctx: &CssContext<'_>) -> Vec<RuleSetRule> {
    let head = match mode {
        Mode::Development => UseEntry::new(STYLE_LOADER),
        Mode::Production => UseEntry::new(EXTRACT_LOADER),
    };

    let mut families: Vec<(&str, Option<UseEntry>)> = vec![
        (r"\.css$", None),
        (r"\.less$", Some(less_loader(ctx.theme))),
    ];
    if let Some(sass) = &ctx.loaders.sass {
        families.push((r"\.(scss|sass)$", Some(sass.clone())));
    }

    families
        .into_iter()
        .map(|(test, preprocessor)| {
            let chain = |loaders: &[UseEntry]| {
                std::iter::once(head.clone())
                    .chain(loaders.iter().cloned())
                    .chain(preprocessor.clone())
                    .collect::<Vec<_>>()
            };

            let mut one_of = Vec::new();
            if !ctx.config.css_modules_exclude.is_empty() {
                let mut rule = RuleSetRule::default().loaders(chain(&ctx.loaders.no_css_modules));
                for excluded in &ctx.config.css_modules_exclude {
                    rule = rule.include(Condition::Path(ctx.paths.resolve_app(excluded)));
                }
                one_of.push(rule);
            }
            one_of.push(
                RuleSetRule::default()
                    .include(Condition::Path(ctx.paths.app_node_modules.clone()))
                    .loaders(chain(&ctx.loaders.node_modules)),
            );
            one_of.push(RuleSetRule::default().loaders(chain(&ctx.loaders.own)));

            RuleSetRule {
                one_of,
                ..RuleSetRule::test(test)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler_config::first_match;
    use crate::config::SassOption;
    use std::path::Path;

    fn loader_names(rule: &RuleSetRule) -> Vec<&str> {
        rule.use_entries.iter().map(|u| u.loader.as_str()).collect()
    }

    fn rules_for(config: &RcConfig, mode: Mode) -> Vec<RuleSetRule> {
        let paths = ProjectPaths::new("/app");
        let loaders = get_css_loaders(config);
        let theme = IndexMap::new();
        get_css_rules(
            mode,
            &CssContext {
                config,
                paths: &paths,
                loaders: &loaders,
                theme: &theme,
            },
        )
    }

    #[test]
    fn test_development_injects_and_production_extracts() {
        let config = RcConfig::default();
        let dev = rules_for(&config, Mode::Development);
        let prod = rules_for(&config, Mode::Production);

        let module = Path::new("/app/src/a.css");
        assert_eq!(loader_names(first_match(&dev, module).unwrap())[0], STYLE_LOADER);
        assert_eq!(loader_names(first_match(&prod, module).unwrap())[0], EXTRACT_LOADER);
    }

    #[test]
    fn test_first_match_order_within_family() {
        let config = RcConfig {
            css_modules_exclude: vec!["src/global".to_string()],
            ..RcConfig::default()
        };
        let rules = rules_for(&config, Mode::Production);

        let own = first_match(&rules, Path::new("/app/src/page.css")).unwrap();
        let dep = first_match(&rules, Path::new("/app/node_modules/antd/x.css")).unwrap();
        let global = first_match(&rules, Path::new("/app/src/global/reset.css")).unwrap();

        assert!(own.use_entries[1].options.as_ref().unwrap().get("modules").is_some());
        assert!(dep.use_entries[1].options.as_ref().unwrap().get("modules").is_none());
        assert!(global.use_entries[1].options.as_ref().unwrap().get("modules").is_none());
    }

    #[test]
    fn test_less_gets_theme_and_sass_is_opt_in() {
        let rules = rules_for(&RcConfig::default(), Mode::Production);
        assert_eq!(rules.len(), 2);
        let less = first_match(&rules, Path::new("/app/src/a.less")).unwrap();
        assert_eq!(loader_names(less).last(), Some(&"less-loader"));
        assert!(first_match(&rules, Path::new("/app/src/a.scss")).is_none());

        let config = RcConfig {
            sass: Some(SassOption::Enabled(true)),
            ..RcConfig::default()
        };
        let rules = rules_for(&config, Mode::Production);
        let sass = first_match(&rules, Path::new("/app/src/a.scss")).unwrap();
        assert_eq!(loader_names(sass).last(), Some(&"sass-loader"));
    }

    #[test]
    fn test_disable_css_modules() {
        let config = RcConfig {
            disable_css_modules: true,
            ..RcConfig::default()
        };
        let loaders = get_css_loaders(&config);
        assert!(loaders.own[0].options.as_ref().unwrap().get("modules").is_none());
    }
}
