//! Test suite and partition models
//!
//! A suite is the ordered, deduplicated list of test identifiers handed to
//! the splitter. Partitions are the per-worker slices of it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Ordered, deduplicated sequence of test identifiers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    tests: Vec<String>,
}

impl TestSuite {
    /// Build a suite from raw identifiers.
    ///
    /// Identifiers are trimmed, empty ones are dropped and duplicates keep
    /// their first position.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let tests = ids
            .into_iter()
            .map(|id| id.into().trim().to_string())
            .filter(|id| !id.is_empty())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self { tests }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn tests(&self) -> &[String] {
        &self.tests
    }
}

/// One worker's share of the suite
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Zero-based group index
    pub index: usize,
    /// Test identifiers in suite order
    pub tests: Vec<String>,
}

impl Partition {
    pub fn new(index: usize, tests: Vec<String>) -> Self {
        Self { index, tests }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// One-based label used on the console and in reports
    pub fn label(&self) -> String {
        format!("g{}", self.index + 1)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {} ({} tests)", self.index + 1, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_dedup_keeps_first() {
        let suite = TestSuite::new(["t2", "t1", "t2", "t3", "t1"]);
        assert_eq!(suite.tests(), ["t2", "t1", "t3"]);
    }

    #[test]
    fn test_suite_drops_blank_ids() {
        let suite = TestSuite::new(["  t1 ", "", "   ", "t2"]);
        assert_eq!(suite.tests(), ["t1", "t2"]);
        assert_eq!(suite.len(), 2);
    }

    #[test]
    fn test_empty_suite() {
        let suite = TestSuite::new(Vec::<String>::new());
        assert!(suite.is_empty());
    }

    #[test]
    fn test_partition_label() {
        let partition = Partition::new(0, vec!["t1".to_string()]);
        assert_eq!(partition.label(), "g1");
        assert_eq!(partition.to_string(), "group 1 (1 tests)");
    }
}
