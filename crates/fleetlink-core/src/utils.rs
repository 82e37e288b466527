/*!
 * Utility functions and helpers for FleetLink.
 */
use std::future::Future;

use tracing::{debug, warn};

/// Spawn a fallible task whose outcome is logged rather than returned.
///
/// # Arguments
///
/// * `name` - A name for the task (for logging)
/// * `fut` - The future to run
pub fn spawn_and_log<F, T, E>(name: &str, fut: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let task_name = name.to_string();
    tokio::spawn(async move {
        match fut.await {
            Ok(_) => {
                debug!("Task '{}' completed successfully", task_name);
            }
            Err(e) => {
                warn!("Task '{}' failed: {}", task_name, e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawn_and_log_runs_to_completion() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = counter.clone();

        let handle = spawn_and_log("ok", async move {
            task_counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(())
        });
        tokio_test::assert_ok!(handle.await);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawn_and_log_swallows_failure() {
        let handle = spawn_and_log("failing", async { Err::<(), _>(Error::other("boom")) });
        tokio_test::assert_ok!(handle.await);
    }
}
