//! Deterministic deployment order.

use crate::config::SortPriority;
use crate::package::Package;

/// Priority of packages without an override.
pub const DEFAULT_PRIORITY: i64 = 100;

/// Orders packages by flat integer weights, lowest first.
///
/// Weights instead of dependency edges: the order is total, there are no
/// cycles, and packages with equal weight keep their catalog order so the same
/// inputs always yield the same order.
pub struct SortPriorityResolver<'a> {
    overrides: &'a SortPriority,
}

impl<'a> SortPriorityResolver<'a> {
    pub fn new(overrides: &'a SortPriority) -> Self {
        Self { overrides }
    }

    fn priority_of(&self, package: &str) -> i64 {
        self.overrides
            .get(package)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Stable sort of `packages` by priority.
    pub fn resolve<'p>(&self, packages: &'p [Package]) -> Vec<&'p Package> {
        let mut ordered: Vec<&Package> = packages.iter().collect();
        // sort_by_key is stable: ties keep catalog order
        ordered.sort_by_key(|p| self.priority_of(&p.name));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packages(names: &[&str]) -> Vec<Package> {
        names
            .iter()
            .map(|n| Package::new(*n, format!("/srv/vendor/{}", n)))
            .collect()
    }

    fn names<'a>(ordered: &[&'a Package]) -> Vec<&'a str> {
        ordered.iter().map(|p| p.name.as_str()).collect()
    }

    fn priorities(entries: &[(&str, i64)]) -> SortPriority {
        entries.iter().map(|(n, p)| (n.to_string(), *p)).collect()
    }

    #[test]
    fn test_overrides_and_default_sentinel() {
        let catalog = packages(&["vendor/module-a", "vendor/module-b", "vendor/module-c"]);
        let overrides = priorities(&[("vendor/module-a", 10), ("vendor/module-b", 5)]);

        let ordered = SortPriorityResolver::new(&overrides).resolve(&catalog);
        assert_eq!(
            names(&ordered),
            vec!["vendor/module-b", "vendor/module-a", "vendor/module-c"]
        );
    }

    #[test]
    fn test_distinct_priorities_ascending() {
        let catalog = packages(&["a/one", "a/two", "a/three", "a/four"]);
        let overrides = priorities(&[("a/one", 40), ("a/two", -3), ("a/three", 7), ("a/four", 250)]);

        let ordered = SortPriorityResolver::new(&overrides).resolve(&catalog);
        assert_eq!(names(&ordered), vec!["a/two", "a/three", "a/one", "a/four"]);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let catalog = packages(&["z/last", "a/first", "m/middle", "b/other"]);
        let overrides = priorities(&[("m/middle", 1), ("b/other", 1)]);

        let ordered = SortPriorityResolver::new(&overrides).resolve(&catalog);
        assert_eq!(names(&ordered), vec!["m/middle", "b/other", "z/last", "a/first"]);
    }

    #[test]
    fn test_no_overrides_is_catalog_order() {
        let catalog = packages(&["c/c", "a/a", "b/b"]);
        let ordered = SortPriorityResolver::new(&SortPriority::new()).resolve(&catalog);
        assert_eq!(names(&ordered), vec!["c/c", "a/a", "b/b"]);
    }

    #[test]
    fn test_override_equal_to_sentinel_ties_with_default() {
        let catalog = packages(&["a/x", "a/y"]);
        let overrides = priorities(&[("a/y", DEFAULT_PRIORITY)]);
        let ordered = SortPriorityResolver::new(&overrides).resolve(&catalog);
        assert_eq!(names(&ordered), vec!["a/x", "a/y"]);
    }

    #[test]
    fn test_resolve_is_reproducible() {
        let catalog = packages(&["a/1", "a/2", "a/3", "a/4", "a/5"]);
        let overrides = priorities(&[("a/3", 1), ("a/5", 1), ("a/1", 200)]);
        let resolver = SortPriorityResolver::new(&overrides);
        let first = names(&resolver.resolve(&catalog));
        let second = names(&resolver.resolve(&catalog));
        assert_eq!(first, second);
        assert_eq!(first, vec!["a/3", "a/5", "a/2", "a/4", "a/1"]);
    }
}
