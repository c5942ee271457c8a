//! Single-or-many target containers.
//!
//! A project config may describe one bundle or an ordered list of them. Every
//! layer above the loader goes through [`Targets`] so nothing assumes the
//! single-target shape, and [`Targets::for_each_target`] maps a fallible step
//! over the targets while keeping that shape.

use serde::{Deserialize, Serialize};

/// One target or an ordered sequence of independent targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Targets<T> {
    /// A list of targets; serializes as a JSON array.
    Multi(Vec<T>),
    /// A single target; serializes as the bare value.
    Single(T),
}

impl<T> Targets<T> {
    /// Apply `f` to every target, in order, preserving the shape.
    ///
    /// Each call gets only its own target, so no state leaks between them.
    /// The first error stops the iteration.
    pub fn for_each_target<U, E, F>(self, mut f: F) -> Result<Targets<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        match self {
            Targets::Single(t) => f(t).map(Targets::Single),
            Targets::Multi(items) => items
                .into_iter()
                .map(f)
                .collect::<Result<Vec<_>, E>>()
                .map(Targets::Multi),
        }
    }

    /// Infallible shape-preserving map.
    pub fn map<U, F>(self, mut f: F) -> Targets<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Targets::Single(t) => Targets::Single(f(t)),
            Targets::Multi(items) => Targets::Multi(items.into_iter().map(f).collect()),
        }
    }

    /// Borrowing view with the same shape.
    pub fn as_ref(&self) -> Targets<&T> {
        match self {
            Targets::Single(t) => Targets::Single(t),
            Targets::Multi(items) => Targets::Multi(items.iter().collect()),
        }
    }

    /// Iterate over the targets in order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Targets::Single(t) => std::slice::from_ref(t).iter(),
            Targets::Multi(items) => items.iter(),
        }
    }

    /// First target, if any.
    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Whether this came from an array config.
    pub fn is_multi(&self) -> bool {
        matches!(self, Targets::Multi(_))
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.iter().len()
    }

    /// `true` only for an empty multi-target list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a, T> IntoIterator for &'a Targets<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_target_preserves_single_shape() {
        let out: Result<Targets<i32>, ()> = Targets::Single(2).for_each_target(|n| Ok(n * 10));
        assert_eq!(out, Ok(Targets::Single(20)));
    }

    #[test]
    fn test_for_each_target_preserves_multi_shape_and_order() {
        let out: Result<Targets<String>, ()> =
            Targets::Multi(vec![1, 2, 3]).for_each_target(|n| Ok(format!("t{n}")));
        assert_eq!(
            out,
            Ok(Targets::Multi(vec![
                "t1".to_string(),
                "t2".to_string(),
                "t3".to_string()
            ]))
        );
    }

    #[test]
    fn test_multi_of_one_stays_multi() {
        let out = Targets::Multi(vec![1]).map(|n| n + 1);
        assert!(out.is_multi());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_for_each_target_stops_at_first_error() {
        let mut seen = Vec::new();
        let out = Targets::Multi(vec![1, 2, 3]).for_each_target(|n| {
            seen.push(n);
            if n == 2 {
                Err("boom")
            } else {
                Ok(n)
            }
        });
        assert_eq!(out, Err("boom"));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_untagged_serde_shapes() {
        let single: Targets<serde_json::Value> =
            serde_json::from_str(r#"{"outputPath":"dist"}"#).unwrap();
        assert!(!single.is_multi());

        let multi: Targets<serde_json::Value> =
            serde_json::from_str(r#"[{"outputPath":"a"},{"outputPath":"b"}]"#).unwrap();
        assert_eq!(multi.len(), 2);
        assert_eq!(serde_json::to_string(&Targets::Single(1)).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Targets::Multi(vec![1])).unwrap(), "[1]");
    }
}
