//! Suite partitioning
//!
//! Contiguous-block split: the first `len % workers` partitions take one
//! extra test, so `[t1, t2, t3]` over two workers becomes `[t1, t2]` and
//! `[t3]`. The split only depends on the suite order, so repeated runs put
//! the same tests in the same group.

use crate::models::{Partition, TestSuite};

use super::SplitError;

/// Splits a suite into a fixed number of balanced partitions
#[derive(Clone, Copy, Debug)]
pub struct Partitioner {
    workers: usize,
}

impl Partitioner {
    pub fn new(workers: usize) -> Result<Self, SplitError> {
        if workers == 0 {
            return Err(SplitError::InvalidWorkerCount(workers));
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Produce exactly `workers` partitions, some possibly empty
    pub fn split(&self, suite: &TestSuite) -> Vec<Partition> {
        let base = suite.len() / self.workers;
        let extra = suite.len() % self.workers;

        let mut remaining = suite.tests();
        (0..self.workers)
            .map(|index| {
                let size = base + usize::from(index < extra);
                let (head, tail) = remaining.split_at(size);
                remaining = tail;
                Partition::new(index, head.to_vec())
            })
            .collect()
    }

    /// Partitions that actually need a worker process
    pub fn split_non_empty(&self, suite: &TestSuite) -> Vec<Partition> {
        self.split(suite)
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect()
    }
}
