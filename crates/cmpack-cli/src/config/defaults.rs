/// Output directory when `outputPath` is not set.
pub const DEFAULT_OUTPUT_PATH: &str = "dist";

/// Public URL prefix when `publicPath` is not set.
pub const DEFAULT_PUBLIC_PATH: &str = "/";

pub const DEFAULT_LIBRARY_TARGET: &str = "var";

/// Source map mode for development builds (and `build --debug`).
pub const DEFAULT_DEVTOOL: &str = "cheap-module-source-map";

/// Browserslist query handed to autoprefixer when `browsers` is empty.
pub fn default_browsers() -> Vec<String> {
    vec![
        ">1%".to_string(),
        "last 4 versions".to_string(),
        "Firefox ESR".to_string(),
        "not ie < 9".to_string(),
    ]
}

/// Library targets the bundler understands.
pub const LIBRARY_TARGETS: &[&str] = &[
    "var",
    "assign",
    "this",
    "window",
    "self",
    "global",
    "commonjs",
    "commonjs2",
    "amd",
    "umd",
    "umd2",
    "jsonp",
    "system",
];
