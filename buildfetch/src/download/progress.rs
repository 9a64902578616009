//! Progress reporting for multi-file downloads.
//!
//! Byte counts live in atomic counters shared by every fetch task; each
//! commit adds to them and, when a callback is configured, reports a
//! [`ProgressUpdate`] snapshot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// A progress snapshot delivered after each committed part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// File the committed part belongs to.
    pub file: String,
    /// Bytes written to that file so far.
    pub file_bytes: u64,
    /// Expected size of that file.
    pub file_total: u64,
    /// Bytes written across all files.
    pub total_bytes: u64,
    /// Expected size of all files.
    pub total_expected: u64,
}

impl ProgressUpdate {
    /// Overall completion in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        fraction(self.total_bytes, self.total_expected)
    }
}

/// Progress callback invoked from fetch tasks.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Shared progress counters for parallel downloads.
///
/// Counts only grow: bytes are added as parts are committed.
#[derive(Debug)]
pub struct ProgressCounters {
    file_bytes: Vec<AtomicU64>,
    file_expected: Vec<u64>,
    files_completed: AtomicUsize,
    total_expected: u64,
}

impl ProgressCounters {
    /// Create counters for files with the given expected sizes.
    pub fn new(file_expected: Vec<u64>) -> Self {
        Self {
            file_bytes: file_expected.iter().map(|_| AtomicU64::new(0)).collect(),
            total_expected: file_expected.iter().sum(),
            file_expected,
            files_completed: AtomicUsize::new(0),
        }
    }

    /// Number of tracked files.
    pub fn file_count(&self) -> usize {
        self.file_bytes.len()
    }

    /// Add committed bytes to a file. Returns the file's new byte count.
    pub fn add_bytes(&self, file_index: usize, bytes: u64) -> u64 {
        match self.file_bytes.get(file_index) {
            Some(counter) => counter.fetch_add(bytes, Ordering::SeqCst) + bytes,
            None => 0,
        }
    }

    /// Bytes committed to one file.
    pub fn file_bytes(&self, file_index: usize) -> u64 {
        self.file_bytes
            .get(file_index)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    /// Expected size of one file.
    pub fn file_expected(&self, file_index: usize) -> u64 {
        self.file_expected.get(file_index).copied().unwrap_or(0)
    }

    /// Bytes committed across all files.
    pub fn total_bytes(&self) -> u64 {
        self.file_bytes.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    pub fn total_expected(&self) -> u64 {
        self.total_expected
    }

    /// Record that a file finished successfully.
    pub fn mark_completed(&self) {
        self.files_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed_files(&self) -> usize {
        self.files_completed.load(Ordering::SeqCst)
    }

    /// Overall completion in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        fraction(self.total_bytes(), self.total_expected)
    }
}

fn fraction(done: u64, expected: u64) -> f64 {
    if expected == 0 {
        1.0
    } else {
        (done as f64 / expected as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counters_new() {
        let counters = ProgressCounters::new(vec![100, 50]);
        assert_eq!(counters.file_count(), 2);
        assert_eq!(counters.total_bytes(), 0);
        assert_eq!(counters.total_expected(), 150);
        assert_eq!(counters.completed_files(), 0);
        assert_eq!(counters.fraction(), 0.0);
    }

    #[test]
    fn test_progress_counters_add_bytes() {
        let counters = ProgressCounters::new(vec![100, 50]);

        assert_eq!(counters.add_bytes(0, 40), 40);
        assert_eq!(counters.add_bytes(0, 60), 100);
        assert_eq!(counters.add_bytes(1, 25), 25);
        assert_eq!(counters.add_bytes(7, 25), 0);

        assert_eq!(counters.file_bytes(0), 100);
        assert_eq!(counters.total_bytes(), 125);
        assert!((counters.fraction() - 125.0 / 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_counters_mark_completed() {
        let counters = ProgressCounters::new(vec![1]);
        counters.mark_completed();
        assert_eq!(counters.completed_files(), 1);
    }

    #[test]
    fn test_fraction_of_empty_download_is_complete() {
        assert_eq!(ProgressCounters::new(vec![]).fraction(), 1.0);
        assert_eq!(ProgressCounters::new(vec![0]).fraction(), 1.0);
    }

    #[test]
    fn test_update_fraction() {
        let update = ProgressUpdate {
            file: "a".to_string(),
            file_bytes: 5,
            file_total: 10,
            total_bytes: 5,
            total_expected: 20,
        };
        assert_eq!(update.fraction(), 0.25);
    }

    #[test]
    fn test_progress_counters_concurrent_adds() {
        let counters = Arc::new(ProgressCounters::new(vec![8000]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.add_bytes(0, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.total_bytes(), 8000);
    }
}
