//! Package artifact location and readiness.

use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use semver::Version;
use tokio::time::Instant;
use tracing::debug;

use crate::error::PublishError;

const INITIAL_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 2_000;

/// `{base_dir}/bin/{configuration}/{project_name}.{version}.nupkg`
pub fn artifact_path(
    base_dir: &Path,
    project_name: &str,
    version: &Version,
    configuration: &str,
) -> PathBuf {
    base_dir
        .join("bin")
        .join(configuration)
        .join(format!("{project_name}.{version}.nupkg"))
}

/// Wait until `path` exists, polling with exponential backoff.
///
/// Fails with `ArtifactNotFound` once `max_wait` has elapsed. A zero
/// `max_wait` checks exactly once.
pub async fn wait_for_artifact(path: &Path, max_wait: Duration) -> Result<(), PublishError> {
    let mut backoff = ExponentialBackoff {
        current_interval: Duration::from_millis(INITIAL_POLL_INTERVAL_MS),
        initial_interval: Duration::from_millis(INITIAL_POLL_INTERVAL_MS),
        max_interval: Duration::from_millis(MAX_POLL_INTERVAL_MS),
        max_elapsed_time: None, // Bounded by max_wait below
        ..Default::default()
    };
    let started = Instant::now();

    loop {
        if path.is_file() {
            debug!(path = %path.display(), waited_ms = started.elapsed().as_millis() as u64, "Artifact ready");
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= max_wait {
            return Err(PublishError::ArtifactNotFound {
                path: path.to_path_buf(),
                waited: elapsed,
            });
        }

        let wait = backoff
            .next_backoff()
            .unwrap_or(Duration::from_millis(MAX_POLL_INTERVAL_MS))
            .min(max_wait - elapsed);
        debug!(path = %path.display(), wait_ms = wait.as_millis() as u64, "Artifact not there yet");
        tokio::time::sleep(wait).await;
    }
}
