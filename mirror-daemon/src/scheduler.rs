use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mirror_core::{CompareMode, MirrorConfig, PassSummary, SyncEvent};
use mirror_sync::{EventSink, ReconcileOptions, Reconciler, SyncError};

use crate::error::{io_err, DaemonError};

/// Scheduler lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Syncing,
    Sleeping,
    Stopped,
}

/// Why a scheduler run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired (signal or caller request).
    Cancelled,
    /// `max_passes` passes completed.
    PassLimitReached,
}

/// Everything one scheduler run needs besides the sink and the token.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub source_root: PathBuf,
    pub replica_root: PathBuf,
    pub interval: Duration,
    pub compare: CompareMode,
    pub follow_links: bool,
    /// Stop after this many passes; `None` runs until cancelled.
    pub max_passes: Option<u64>,
}

impl SchedulerConfig {
    pub fn new(source_root: impl Into<PathBuf>, replica_root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            interval,
            compare: CompareMode::default(),
            follow_links: false,
            max_passes: None,
        }
    }

    pub fn with_max_passes(mut self, max_passes: u64) -> Self {
        self.max_passes = Some(max_passes);
        self
    }
}

impl From<&MirrorConfig> for SchedulerConfig {
    fn from(cfg: &MirrorConfig) -> Self {
        Self {
            compare: cfg.compare,
            follow_links: cfg.follow_links,
            ..Self::new(
                cfg.source.clone(),
                cfg.replica.clone(),
                Duration::from_secs(cfg.interval_secs),
            )
        }
    }
}

/// Start the scheduler on a fresh runtime, stop on SIGINT/SIGTERM, and block
/// the current thread until it exits.
pub fn start_blocking(
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
) -> Result<StopReason, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run_until_signal(config, sink))
}

/// Run the scheduler until a shutdown signal arrives, a pass fails fatally,
/// or the pass limit is reached.
pub async fn run_until_signal(
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
) -> Result<StopReason, DaemonError> {
    let cancel = CancellationToken::new();

    let signal_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => Ok::<(), DaemonError>(()),
                signal = wait_for_shutdown_signal() => {
                    cancel.cancel();
                    match signal {
                        Ok(name) => {
                            tracing::info!(signal = name, "received shutdown signal");
                            Ok(())
                        }
                        Err(err) => Err(err),
                    }
                }
            }
        })
    };

    let result = run(config, sink, cancel.clone()).await;
    cancel.cancel();
    let signal_result = handle_join("signal_handler", signal_handle.await);

    let stop = result?;
    signal_result?;
    Ok(stop)
}

/// Run passes every `config.interval` until `cancel` fires.
///
/// Returns `Err` only for pass-fatal failures; those are also reported to
/// `sink` as an `error` event.
pub async fn run(
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) -> Result<StopReason, DaemonError> {
    Scheduler {
        config,
        sink,
        cancel,
        state: SchedulerState::Idle,
        passes: 0,
    }
    .run()
    .await
}

struct Scheduler {
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    state: SchedulerState,
    passes: u64,
}

impl Scheduler {
    async fn run(mut self) -> Result<StopReason, DaemonError> {
        tracing::info!(
            source = %self.config.source_root.display(),
            replica = %self.config.replica_root.display(),
            interval_secs = self.config.interval.as_secs(),
            compare = %self.config.compare,
            "mirror started"
        );

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.stop(StopReason::Cancelled));
            }

            self.transition(SchedulerState::Syncing);
            match self.pass().await {
                Ok(summary) => {
                    self.passes += 1;
                    tracing::info!(
                        pass = self.passes,
                        directories_created = summary.directories_created,
                        files_copied = summary.files_copied,
                        files_deleted = summary.files_deleted,
                        directories_deleted = summary.directories_deleted,
                        errors = summary.errors,
                        duration_ms = summary.duration_ms as u64,
                        "pass complete"
                    );
                }
                Err(err) if err.is_cancelled() => return Ok(self.stop(StopReason::Cancelled)),
                Err(err) => {
                    let path = fatal_path(&err, &self.config.source_root);
                    self.sink
                        .emit(SyncEvent::error(&path, format!("pass aborted: {err}")));
                    self.transition(SchedulerState::Stopped);
                    return Err(err);
                }
            }

            if self.config.max_passes.is_some_and(|max| self.passes >= max) {
                return Ok(self.stop(StopReason::PassLimitReached));
            }

            self.transition(SchedulerState::Sleeping);
            // `sleep` saturates oversized intervals instead of overflowing.
            let cancelled = tokio::select! {
                _ = self.cancel.cancelled() => true,
                _ = tokio::time::sleep(self.config.interval) => false,
            };
            if cancelled {
                return Ok(self.stop(StopReason::Cancelled));
            }
            self.transition(SchedulerState::Idle);
        }
    }

    /// One reconciliation pass on a blocking worker.
    async fn pass(&self) -> Result<PassSummary, DaemonError> {
        let reconciler = Reconciler::new(ReconcileOptions {
            compare: self.config.compare,
            follow_links: self.config.follow_links,
            cancel: Some(self.cancel.clone()),
        });
        let source = self.config.source_root.clone();
        let replica = self.config.replica_root.clone();
        let sink = self.sink.clone();

        let result = tokio::task::spawn_blocking(move || reconciler.run(&source, &replica, sink.as_ref()))
            .await
            .map_err(|err| DaemonError::Join(format!("sync pass: {err}")))?;
        Ok(result?)
    }

    fn transition(&mut self, next: SchedulerState) {
        tracing::debug!(from = ?self.state, to = ?next, "scheduler state");
        self.state = next;
    }

    fn stop(&mut self, reason: StopReason) -> StopReason {
        self.transition(SchedulerState::Stopped);
        match reason {
            StopReason::Cancelled => {
                tracing::info!(passes = self.passes, "stop requested; mirror stopped")
            }
            StopReason::PassLimitReached => {
                tracing::info!(passes = self.passes, "pass limit reached; mirror stopped")
            }
        }
        reason
    }
}

fn fatal_path(err: &DaemonError, source_root: &Path) -> PathBuf {
    match err {
        DaemonError::Sync(
            SyncError::SourceUnavailable { path, .. }
            | SyncError::ReplicaRoot { path, .. }
            | SyncError::Walk { path, .. }
            | SyncError::Io { path, .. },
        ) => path.clone(),
        _ => source_root.to_path_buf(),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())
        .map_err(|err| DaemonError::Signal(format!("SIGTERM handler: {err}")))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|err| DaemonError::Signal(format!("ctrl-c handler: {err}")))?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|err| DaemonError::Signal(format!("ctrl-c handler: {err}")))?;
    Ok("ctrl-c")
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join(format!("{task}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use mirror_core::SyncAction;
    use mirror_sync::RecordingSink;
    use tempfile::TempDir;
    use tokio::time::Instant;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().expect("tmp");
        let source = tmp.path().join("source");
        let replica = tmp.path().join("replica");
        fs::create_dir_all(source.join("a")).expect("mkdir");
        fs::write(source.join("a").join("b.txt"), "v1").expect("write");
        (tmp, source, replica)
    }

    #[tokio::test]
    async fn single_pass_limit_syncs_and_stops() {
        let (_tmp, source, replica) = fixture();
        let sink = Arc::new(RecordingSink::new());
        let config = SchedulerConfig::new(&source, &replica, Duration::from_secs(3600)).with_max_passes(1);

        let stop = run(config, sink.clone(), CancellationToken::new()).await.expect("run");

        assert_eq!(stop, StopReason::PassLimitReached);
        assert_eq!(fs::read_to_string(replica.join("a/b.txt")).expect("read"), "v1");
        assert_eq!(sink.events().len(), 3, "replica root, a/, a/b.txt");
    }

    #[tokio::test]
    async fn pre_cancelled_token_runs_no_pass() {
        let (_tmp, source, replica) = fixture();
        let sink = Arc::new(RecordingSink::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stop = run(SchedulerConfig::new(&source, &replica, Duration::from_secs(1)), sink.clone(), cancel)
            .await
            .expect("run");

        assert_eq!(stop, StopReason::Cancelled);
        assert!(sink.events().is_empty());
        assert!(!replica.exists());
    }

    #[tokio::test]
    async fn cancellation_interrupts_long_sleep() {
        let (_tmp, source, replica) = fixture();
        let sink = Arc::new(RecordingSink::new());
        let cancel = CancellationToken::new();
        let config = SchedulerConfig::new(&source, &replica, Duration::from_secs(3600));

        let handle = tokio::spawn(run(config, sink.clone(), cancel.clone()));

        let deadline = Instant::now() + Duration::from_secs(10);
        while sink.events().len() < 3 {
            assert!(Instant::now() < deadline, "first pass never finished");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();

        let stop = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler must stop promptly")
            .expect("join")
            .expect("run");
        assert_eq!(stop, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn maximal_interval_sleeps_until_cancelled() {
        let (_tmp, source, replica) = fixture();
        let sink = Arc::new(RecordingSink::new());
        let cancel = CancellationToken::new();
        let config = SchedulerConfig::new(&source, &replica, Duration::from_secs(u64::MAX));

        let handle = tokio::spawn(run(config, sink.clone(), cancel.clone()));

        let deadline = Instant::now() + Duration::from_secs(10);
        while sink.events().len() < 3 {
            assert!(Instant::now() < deadline, "first pass never finished");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let stop = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler must stop promptly")
            .expect("scheduler task must not panic")
            .expect("run");
        assert_eq!(stop, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn repeated_passes_are_idempotent() {
        let (_tmp, source, replica) = fixture();
        let sink = Arc::new(RecordingSink::new());
        let config = SchedulerConfig::new(&source, &replica, Duration::from_millis(10)).with_max_passes(3);

        let stop = run(config, sink.clone(), CancellationToken::new()).await.expect("run");

        assert_eq!(stop, StopReason::PassLimitReached);
        let actions: Vec<_> = sink.take_actions().into_iter().map(|(action, _)| action).collect();
        assert_eq!(
            actions,
            vec![
                SyncAction::DirectoryCreated,
                SyncAction::DirectoryCreated,
                SyncAction::FileCopied
            ]
        );
    }

    #[tokio::test]
    async fn missing_source_is_fatal_and_reported() {
        let tmp = TempDir::new().expect("tmp");
        let source = tmp.path().join("gone");
        let replica = tmp.path().join("replica");
        let sink = Arc::new(RecordingSink::new());

        let err = run(
            SchedulerConfig::new(&source, &replica, Duration::from_secs(1)),
            sink.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DaemonError::Sync(SyncError::SourceUnavailable { .. })), "got: {err}");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
        assert_eq!(events[0].path, source);
    }

    #[test]
    fn config_converts_from_mirror_config() {
        let cfg = MirrorConfig {
            source: PathBuf::from("/src"),
            replica: PathBuf::from("/dst"),
            interval_secs: 7,
            log_file: PathBuf::from("/log/mirror.log"),
            max_log_bytes: 1024,
            max_archived_logs: 1,
            compare: CompareMode::Metadata,
            follow_links: true,
        };
        let sched = SchedulerConfig::from(&cfg);
        assert_eq!(sched.interval, Duration::from_secs(7));
        assert_eq!(sched.compare, CompareMode::Metadata);
        assert!(sched.follow_links);
        assert_eq!(sched.max_passes, None);
    }
}
