use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Only compiled scripts and stylesheets are measured.
pub fn is_reported(name: &str) -> bool {
    name.ends_with(".js") || name.ends_with(".css")
}

/// Size of `bytes` after gzip at maximum compression.
pub fn gzip_size(bytes: &[u8]) -> io::Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?.len() as u64)
}

static HASHED_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.*)\.[0-9a-f]{4,}(\.[a-z]+)?(\.js|\.css)$").ok());

/// Output-relative name with the content hash removed, so the same asset
/// matches across builds: `static/js/main.82be8a.js` becomes
/// `static/js/main.js`.
pub fn normalize_key(name: &str) -> String {
    let name = name.replace('\\', "/");
    let name = name.trim_start_matches('/');
    match HASHED_NAME.as_ref() {
        Some(re) => re.replace(name, "$1$2$3").into_owned(),
        None => name.to_string(),
    }
}

/// Gzip sizes of the previous build, by normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeSnapshot {
    sizes: HashMap<String, u64>,
}

impl SizeSnapshot {
    /// Measure every script and stylesheet below `dir`. A missing directory
    /// yields an empty snapshot.
    pub fn take(dir: &Path) -> io::Result<Self> {
        let mut snapshot = Self::default();
        if !dir.is_dir() {
            return Ok(snapshot);
        }

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let name = rel.to_string_lossy();
            if !is_reported(&name) {
                continue;
            }
            let size = gzip_size(&std::fs::read(entry.path())?)?;
            snapshot.insert(&name, size);
        }

        tracing::debug!(files = snapshot.len(), dir = %dir.display(), "size snapshot taken");
        Ok(snapshot)
    }

    pub fn insert(&mut self, name: &str, size: u64) {
        self.sizes.insert(normalize_key(name), size);
    }

    /// Previous size of the asset `name` (hashed or not).
    pub fn get(&self, name: &str) -> Option<u64> {
        self.sizes.get(&normalize_key(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_key_strips_hash() {
        assert_eq!(normalize_key("main.abcd1234.js"), "main.js");
        assert_eq!(normalize_key("/static/js/main.82be8a.js"), "static/js/main.js");
        assert_eq!(normalize_key("static\\css\\app.0f3c9e21.css"), "static/css/app.css");
        assert_eq!(normalize_key("1.0a1b2c3d.chunk.js"), "1.chunk.js");
        assert_eq!(normalize_key("main.js"), "main.js");
    }

    #[test]
    fn test_normalize_key_strips_hash_of_async_chunks() {
        assert_eq!(normalize_key("0.abcd1234.async.js"), "0.async.js");
        assert_eq!(
            normalize_key("0.abcd1234.async.js"),
            normalize_key("0.ffff0000.async.js")
        );
        assert_ne!(normalize_key("0.abcd1234.async.js"), normalize_key("1.abcd1234.async.js"));
    }

    #[test]
    fn test_normalize_key_is_idempotent_and_keeps_names_apart() {
        let once = normalize_key("vendor.deadbeef.js");
        assert_eq!(normalize_key(&once), once);
        assert_eq!(normalize_key("a.1234abcd.js"), normalize_key("a.ffff0000.js"));
        assert_ne!(normalize_key("a.1234abcd.js"), normalize_key("b.1234abcd.js"));
        assert_ne!(normalize_key("a.1234abcd.js"), normalize_key("a.1234abcd.css"));
    }

    #[test]
    fn test_gzip_size_of_repetitive_input_is_small() {
        let size = gzip_size(&vec![b'a'; 10_000]).unwrap();
        assert!(size > 0 && size < 200, "{size}");
    }

    #[test]
    fn test_take_walks_recursively_and_filters() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("static/js")).unwrap();
        fs::write(dir.path().join("main.abcd1234.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join("static/js/chunk.0f0f0f0f.js"), "x").unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let snapshot = SizeSnapshot::take(dir.path()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("main.ffffffff.js").is_some());
        assert!(snapshot.get("static/js/chunk.js").is_some());
        assert!(snapshot.get("index.html").is_none());
    }

    #[test]
    fn test_take_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(SizeSnapshot::take(&dir.path().join("nope")).unwrap().is_empty());
    }
}
