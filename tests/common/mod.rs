//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write `count` chart description files into a temporary directory
///
/// Returns the TempDir (for lifetime management) and the input paths in
/// batch order. Each file holds a small distinct JSON chart body.
#[allow(dead_code)]
pub fn chart_batch(count: usize) -> (TempDir, Vec<PathBuf>) {
    let dir = temp_dir();
    let inputs = (0..count)
        .map(|i| {
            let path = dir.path().join(format!("chart-{i}.json"));
            let body = format!(r#"{{"title":"chart {i}","values":[{i},{},{}]}}"#, i + 1, i + 2);
            std::fs::write(&path, body).expect("Failed to write chart fixture");
            path
        })
        .collect();
    (dir, inputs)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 20ms until it returns true or timeout is
/// reached. Returns whether the condition was met.
#[allow(dead_code)]
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_chart_batch_writes_inputs() {
        let (_dir, inputs) = chart_batch(3);
        assert_eq!(inputs.len(), 3);
        for (i, path) in inputs.iter().enumerate() {
            let body = std::fs::read_to_string(path).unwrap();
            assert!(body.contains(&format!("chart {i}")));
        }
    }

    #[tokio::test]
    async fn test_wait_for_immediate_true() {
        let result = wait_for(|| true, 1000).await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let result = wait_for(|| false, 200).await;
        assert!(!result);
    }
}
