//! Ingest session lifecycle
//!
//! One supervisor owns every live ingest session. Per stream identity there
//! is at most one session at a time: a new publish on the same identity
//! supersedes the old one, tearing down its queue and transcoder. Teardown
//! signals the transcoder and closes the queue synchronously; reaping the
//! process and recording the archive proceed in background tasks that remain
//! joinable for shutdown testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::archive::{ArchiveFinalizer, ArchiveSink, SessionRecording};
use crate::config::RelayConfig;
use crate::relay::{BroadcastQueue, RelayHub};
use crate::transcode::{TranscodeJob, TranscodeSpec};

const OUTPUT_FRAME_RATE: u32 = 30;
const KEYFRAME_INTERVAL: u32 = 60;

/// Background tasks belonging to one session
///
/// Both are spawned fire-and-forget during normal operation, but handed back
/// from [`IngestSupervisor::end_session`] so tests can join them instead of
/// leaking work past shutdown.
#[derive(Default)]
pub struct SessionTasks {
    /// Drains transcoder stderr into the log
    pub log_drain: Option<JoinHandle<()>>,
    /// Awaits transcoder exit, then runs the archive finalizer
    pub exit_wait: Option<JoinHandle<()>>,
}

/// What a publish connection holds while its session is live
#[derive(Clone)]
pub struct SessionHandle {
    /// Resolved stream identity
    pub stream_key: String,
    /// Connection session id, used to verify teardown ownership
    pub session_id: u64,
    /// The session's broadcast queue
    pub queue: Arc<BroadcastQueue>,
}

struct ActiveSession {
    session_id: u64,
    queue: Arc<BroadcastQueue>,
    kill_tx: Option<oneshot::Sender<()>>,
    tasks: SessionTasks,
}

/// Owns the lifecycle of all publish sessions
pub struct IngestSupervisor {
    config: RelayConfig,
    hub: Arc<RelayHub>,
    finalizer: ArchiveFinalizer,
    sessions: Mutex<HashMap<String, ActiveSession>>,
}

impl IngestSupervisor {
    pub fn new(config: RelayConfig, hub: Arc<RelayHub>, sink: Arc<dyn ArchiveSink>) -> Self {
        Self {
            config,
            hub,
            finalizer: ArchiveFinalizer::new(sink),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a session for an accepted publish request
    ///
    /// Prepares a fresh output directory, launches the transcoder
    /// (best-effort: a start failure leaves the session relay-only) and
    /// returns the queue the connection should copy packets into.
    pub async fn begin_session(
        &self,
        session_id: u64,
        app: &str,
        requested_key: &str,
    ) -> SessionHandle {
        let stream_key = self.config.key_policy.resolve(requested_key);

        tracing::info!(
            session_id = session_id,
            stream = %stream_key,
            requested = %requested_key,
            "Publish started"
        );

        self.supersede_existing(&stream_key);
        self.prepare_output_dirs(&stream_key).await;

        let queue = self.hub.current_or_install(&stream_key);
        // A closed leftover can only appear if a prior teardown raced an
        // attach; replace it so this session gets a writable queue
        let queue = if queue.is_closed() {
            self.hub.install(&stream_key).0
        } else {
            queue
        };

        let started_at = Instant::now();
        let archive_path = self
            .config
            .archive_path_for(&stream_key, chrono::Utc::now().timestamp());
        let spec = TranscodeSpec {
            input_url: self.config.local_pull_url(app, requested_key),
            hls_dir: self.config.hls_dir_for(&stream_key),
            archive_path: archive_path.clone(),
            renditions: self.config.renditions.clone(),
            segment_seconds: self.config.segment_seconds,
            segment_window: self.config.segment_window,
            frame_rate: OUTPUT_FRAME_RATE,
            keyframe_interval: KEYFRAME_INTERVAL,
        };

        let (kill_tx, tasks) = match TranscodeJob::spawn(&self.config.ffmpeg_bin, &spec) {
            Ok(mut job) => {
                tracing::info!(
                    stream = %stream_key,
                    pid = ?job.pid(),
                    "Transcoder started"
                );

                let log_drain = job.spawn_log_drain(&stream_key);

                let (kill_tx, kill_rx) = oneshot::channel();
                let recording = SessionRecording {
                    stream_key: stream_key.clone(),
                    web_path: self.config.archive_web_path(&archive_path),
                    archive_path,
                    started_at,
                };
                let finalizer = self.finalizer.clone();
                let exit_wait = tokio::spawn(async move {
                    let exit = job.run_to_exit(kill_rx).await;
                    finalizer.finalize(&recording, exit).await;
                });

                (
                    Some(kill_tx),
                    SessionTasks {
                        log_drain,
                        exit_wait: Some(exit_wait),
                    },
                )
            }
            Err(e) => {
                tracing::error!(
                    stream = %stream_key,
                    error = %e,
                    "Failed to start transcoder, session continues relay-only"
                );
                (None, SessionTasks::default())
            }
        };

        let stale = self.sessions.lock().insert(
            stream_key.clone(),
            ActiveSession {
                session_id,
                queue: queue.clone(),
                kill_tx,
                tasks,
            },
        );
        // A racing publish slipped in between supersede and insert; the
        // later insert wins and the loser is torn down like any superseded
        // session
        if let Some(mut stale) = stale {
            if let Some(kill) = stale.kill_tx.take() {
                let _ = kill.send(());
            }
            if !Arc::ptr_eq(&stale.queue, &queue) {
                stale.queue.close();
            }
        }

        SessionHandle {
            stream_key,
            session_id,
            queue,
        }
    }

    /// Tear down a session when its publish connection ends
    ///
    /// Signals the transcoder (no blocking wait), closes the queue so every
    /// viewer sees end-of-stream, and installs a fresh queue for the next
    /// session. No-op if the session was already superseded by a newer
    /// publish. Returns the session's background tasks for joining.
    pub fn end_session(&self, handle: &SessionHandle) -> Option<SessionTasks> {
        let mut sessions = self.sessions.lock();

        let owns = matches!(
            sessions.get(&handle.stream_key),
            Some(active) if active.session_id == handle.session_id
        );
        if !owns {
            tracing::debug!(
                session_id = handle.session_id,
                stream = %handle.stream_key,
                "Session already superseded, nothing to tear down"
            );
            return None;
        }

        let mut active = sessions.remove(&handle.stream_key)?;

        if let Some(kill) = active.kill_tx.take() {
            let _ = kill.send(());
        }
        active.queue.close();
        self.hub.install(&handle.stream_key);

        tracing::info!(
            session_id = handle.session_id,
            stream = %handle.stream_key,
            "Publish ended, session torn down"
        );

        Some(active.tasks)
    }

    /// Whether a stream identity currently has a live session
    pub fn is_live(&self, stream_key: &str) -> bool {
        self.sessions.lock().contains_key(stream_key)
    }

    /// Resolve an inbound path to its effective stream identity
    pub fn resolve_key(&self, requested: &str) -> String {
        self.config.key_policy.resolve(requested)
    }

    fn supersede_existing(&self, stream_key: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(mut old) = sessions.remove(stream_key) {
            tracing::warn!(
                stream = %stream_key,
                old_session_id = old.session_id,
                "New publish supersedes active session"
            );
            if let Some(kill) = old.kill_tx.take() {
                let _ = kill.send(());
            }
            old.queue.close();
            self.hub.install(stream_key);
        }
    }

    /// Destructively recreate the session's output directory tree
    async fn prepare_output_dirs(&self, stream_key: &str) {
        let hls_dir = self.config.hls_dir_for(stream_key);

        if let Err(e) = tokio::fs::remove_dir_all(&hls_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %hls_dir.display(),
                    error = %e,
                    "Failed to clean segment directory"
                );
            }
        }
        if let Err(e) = tokio::fs::create_dir_all(&hls_dir).await {
            tracing::error!(
                path = %hls_dir.display(),
                error = %e,
                "Failed to create segment directory"
            );
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.config.archive_root).await {
            tracing::error!(
                path = %self.config.archive_root.display(),
                error = %e,
                "Failed to create archive directory"
            );
        }
    }
}
