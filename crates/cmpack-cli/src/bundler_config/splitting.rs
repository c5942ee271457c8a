//! Code-splitting policy.

use crate::bundler_config::{CacheGroup, Chunks, Condition, SplitChunks};
use std::path::Path;

pub const STYLES_GROUP: &str = "styles";
pub const VENDOR_GROUP: &str = "vendor";
pub const COMMON_GROUP: &str = "common";

/// The three production cache groups, highest priority first:
/// styles (any stylesheet), vendor (anything under `node_modules`) and
/// common (application modules shared by at least two entry chunks).
pub fn split_chunks() -> SplitChunks {
    let mut groups = SplitChunks::default();
    groups.cache_groups.insert(
        STYLES_GROUP.to_string(),
        CacheGroup {
            name: STYLES_GROUP.to_string(),
            test: Some(Condition::regex(r"\.(css|less|scss|sass)$")),
            chunks: Chunks::All,
            priority: 20,
            min_chunks: None,
            min_size: None,
            enforce: true,
        },
    );
    groups.cache_groups.insert(
        VENDOR_GROUP.to_string(),
        CacheGroup {
            name: VENDOR_GROUP.to_string(),
            test: Some(Condition::regex(r"[\\/]node_modules[\\/]")),
            chunks: Chunks::Initial,
            priority: 10,
            min_chunks: None,
            min_size: None,
            enforce: false,
        },
    );
    groups.cache_groups.insert(
        COMMON_GROUP.to_string(),
        CacheGroup {
            name: COMMON_GROUP.to_string(),
            test: None,
            chunks: Chunks::Initial,
            priority: 0,
            min_chunks: Some(2),
            min_size: Some(0),
            enforce: false,
        },
    );
    groups
}

/// Which cache group `module` lands in when `referencing_entries` entry
/// chunks import it.
///
/// Groups are tried by descending priority; ties keep declaration order.
pub fn assign_group<'a>(
    policy: &'a SplitChunks,
    module: &Path,
    referencing_entries: u32,
) -> Option<&'a str> {
    let mut groups: Vec<&CacheGroup> = policy.cache_groups.values().collect();
    groups.sort_by(|a, b| b.priority.cmp(&a.priority));

    groups
        .into_iter()
        .find(|group| {
            group.test.as_ref().map_or(true, |t| t.matches(module))
                && referencing_entries >= group.min_chunks.unwrap_or(1)
        })
        .map(|group| group.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_always_lands_in_styles() {
        let policy = split_chunks();
        for (module, refs) in [
            ("/app/src/a.css", 1),
            ("/app/src/a.less", 3),
            ("/app/node_modules/antd/dist/antd.css", 5),
        ] {
            assert_eq!(
                assign_group(&policy, Path::new(module), refs),
                Some(STYLES_GROUP),
                "{module}"
            );
        }
    }

    #[test]
    fn test_dependency_module_prefers_vendor_over_common() {
        let policy = split_chunks();
        assert_eq!(
            assign_group(&policy, Path::new("/app/node_modules/react/index.js"), 4),
            Some(VENDOR_GROUP)
        );
    }

    #[test]
    fn test_shared_app_module_goes_to_common() {
        let policy = split_chunks();
        assert_eq!(
            assign_group(&policy, Path::new("/app/src/utils.js"), 2),
            Some(COMMON_GROUP)
        );
        assert_eq!(assign_group(&policy, Path::new("/app/src/utils.js"), 1), None);
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let policy = split_chunks();
        let module = Path::new("/app/src/shared.js");
        let first = assign_group(&policy, module, 3);
        for _ in 0..10 {
            assert_eq!(assign_group(&policy, module, 3), first);
        }
    }
}
