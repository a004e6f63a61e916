// Batch runner: drains pending tasks from a task source through the
// recovery coordinator and reports terminal statuses back.

use crate::config::BatchConfig;
use crate::error::RecoveryError;
use crate::recover::RecoveryCoordinator;
use crate::task::TaskSource;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Running totals across processed tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl BatchStats {
    fn record(&mut self, complete: bool) {
        self.processed += 1;
        if complete {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    fn merge(&mut self, other: BatchStats) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

pub struct BatchRunner {
    source: Arc<dyn TaskSource>,
    coordinator: RecoveryCoordinator,
    config: BatchConfig,
    token: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        source: Arc<dyn TaskSource>,
        coordinator: RecoveryCoordinator,
        config: BatchConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            source,
            coordinator,
            config,
            token,
        }
    }

    /// Processes one batch of pending tasks. Each task gets exactly one
    /// coordinator invocation and one result report.
    pub async fn run_once(&self) -> Result<BatchStats, RecoveryError> {
        let mut stats = BatchStats::default();
        let tasks = self.source.list_pending(self.config.batch_size).await?;
        for task in tasks {
            if self.token.is_cancelled() {
                info!("stop signal received, leaving remaining tasks pending");
                break;
            }
            info!(identifier = %task.identifier, url = %task.url, "processing task");
            let result = self.coordinator.recover(&task.identifier, &task.url).await;
            stats.record(result.is_complete);
            if let Err(e) = self.source.mark_result(&task.identifier, &result).await {
                error!(identifier = %task.identifier, error = %e, "failed to record task result");
            }
            if !self.config.cooldown.is_zero() && !self.token.is_cancelled() {
                self.sleep_interruptible(self.config.cooldown).await;
            }
        }
        Ok(stats)
    }

    /// Daemon loop: poll, process, sleep between polls. Returns accumulated
    /// stats once cancelled.
    pub async fn run(&self) -> BatchStats {
        let mut total = BatchStats::default();
        while !self.token.is_cancelled() {
            match self.run_once().await {
                Ok(stats) => total.merge(stats),
                Err(e) => warn!(error = %e, "task source poll failed"),
            }
            if self.token.is_cancelled() {
                break;
            }
            self.sleep_interruptible(self.config.check_interval).await;
        }
        info!(
            processed = total.processed,
            succeeded = total.succeeded,
            failed = total.failed,
            "batch runner stopped"
        );
        total
    }

    async fn sleep_interruptible(&self, duration: Duration) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, RecoveryConfig};
    use crate::pipeline::SegmentPipeline;
    use crate::task::{MemoryTaskSource, TaskStatus};
    use crate::testing::ScriptedSource;

    const GOOD_URL: &str = "https://h/vod/good.m3u8";
    const DEAD_URL: &str = "https://h/vod/dead.m3u8";

    const GOOD_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:6\n\
#EXTINF:6.0,\nseg0.ts\n\
#EXT-X-ENDLIST\n";

    fn runner(
        source: Arc<ScriptedSource>,
        tasks: Arc<MemoryTaskSource>,
        root: std::path::PathBuf,
    ) -> BatchRunner {
        let token = CancellationToken::new();
        let pipeline = SegmentPipeline::new(source, FetchConfig::default(), token.clone());
        let coordinator = RecoveryCoordinator::new(
            pipeline,
            RecoveryConfig { max_retry_rounds: 1 },
            root,
            token.clone(),
        );
        let config = BatchConfig {
            batch_size: 10,
            cooldown: Duration::ZERO,
            ..Default::default()
        };
        BatchRunner::new(tasks, coordinator, config, token)
    }

    #[tokio::test]
    async fn run_once_marks_tasks_by_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes_source = Arc::new(ScriptedSource::new());
        bytes_source.always(GOOD_URL, GOOD_PLAYLIST.as_bytes());
        bytes_source.always("https://h/vod/seg0.ts", &b"payload"[..]);
        bytes_source.fail_always(DEAD_URL, "connection refused");

        let tasks = Arc::new(MemoryTaskSource::new());
        tasks.push("good", GOOD_URL);
        tasks.push("dead", DEAD_URL);

        let stats = runner(bytes_source, Arc::clone(&tasks), tmp.path().to_path_buf())
            .run_once()
            .await
            .unwrap();

        assert_eq!(
            stats,
            BatchStats {
                processed: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(tasks.status_of("good"), Some(TaskStatus::Complete));
        assert_eq!(tasks.status_of("dead"), Some(TaskStatus::Failed));
        assert!(tasks.updated_at("good").is_some());
    }

    #[tokio::test]
    async fn run_once_with_nothing_pending_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes_source = Arc::new(ScriptedSource::new());
        let tasks = Arc::new(MemoryTaskSource::new());

        let stats = runner(bytes_source, tasks, tmp.path().to_path_buf())
            .run_once()
            .await
            .unwrap();
        assert_eq!(stats, BatchStats::default());
    }

    #[tokio::test]
    async fn respects_batch_size_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes_source = Arc::new(ScriptedSource::new());
        bytes_source.always(GOOD_URL, GOOD_PLAYLIST.as_bytes());
        bytes_source.always("https://h/vod/seg0.ts", &b"payload"[..]);

        let tasks = Arc::new(MemoryTaskSource::new());
        tasks.push("a", GOOD_URL);
        tasks.push("b", GOOD_URL);

        let token = CancellationToken::new();
        let pipeline = SegmentPipeline::new(
            Arc::clone(&bytes_source) as Arc<dyn crate::source::ByteSource>,
            FetchConfig::default(),
            token.clone(),
        );
        let coordinator = RecoveryCoordinator::new(
            pipeline,
            RecoveryConfig { max_retry_rounds: 1 },
            tmp.path().to_path_buf(),
            token.clone(),
        );
        let config = BatchConfig {
            batch_size: 1,
            cooldown: Duration::ZERO,
            ..Default::default()
        };
        let runner = BatchRunner::new(Arc::clone(&tasks) as Arc<dyn TaskSource>, coordinator, config, token);

        let stats = runner.run_once().await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(tasks.status_of("a"), Some(TaskStatus::Complete));
        assert_eq!(tasks.status_of("b"), Some(TaskStatus::Pending));
    }
}
