//! Supervised transcoder subprocess
//!
//! The transcoder is an external black box: it pulls the live stream back
//! over RTMP, writes the segmented tree and the archive file, and is only
//! observed through its stderr and exit status. The process is always reaped
//! through [`TranscodeJob::run_to_exit`] so a crashed or killed transcoder
//! never lingers as a zombie.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::config::TranscodeSpec;

/// A running transcoder process
pub struct TranscodeJob {
    child: tokio::process::Child,
    stderr: Option<ChildStderr>,
}

impl TranscodeJob {
    /// Spawn the transcoder for the given job description
    pub fn spawn(ffmpeg_bin: &str, spec: &TranscodeSpec) -> std::io::Result<Self> {
        let mut cmd = Command::new(ffmpeg_bin);
        cmd.args(spec.to_args());
        Self::spawn_command(cmd)
    }

    fn spawn_command(mut cmd: Command) -> std::io::Result<Self> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take();
        Ok(Self { child, stderr })
    }

    /// OS process id, if the process is still running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Spawn a task draining the process's stderr into the log
    ///
    /// The drain holds only the stderr handle, so it can never delay process
    /// exit; it finishes on its own when the pipe closes.
    pub fn spawn_log_drain(&mut self, stream_key: &str) -> Option<JoinHandle<()>> {
        let stderr = self.stderr.take()?;
        let stream_key = stream_key.to_string();

        Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "transcoder", stream = %stream_key, "{}", line);
            }
        }))
    }

    /// Wait for the process to finish, terminating it when `kill` fires
    ///
    /// The kill signal is delivered out-of-band (or implied by the sender
    /// being dropped); either way the child is reaped here. A process that
    /// exits before any kill was requested is reported as an early exit.
    pub async fn run_to_exit(mut self, kill: oneshot::Receiver<()>) -> std::io::Result<ExitStatus> {
        tokio::select! {
            status = self.child.wait() => {
                tracing::warn!(status = ?status, "Transcoder exited before session end");
                status
            }
            _ = kill => {
                // start_kill fails when the process already exited; wait()
                // below reaps it either way
                let _ = self.child.start_kill();
                self.child.wait().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let spec = TranscodeSpec {
            input_url: "rtmp://127.0.0.1:1935/live/x".into(),
            hls_dir: "/tmp/hls/x".into(),
            archive_path: "/tmp/archive/x.mp4".into(),
            renditions: crate::transcode::Rendition::default_ladder(),
            segment_seconds: 2,
            segment_window: 6,
            frame_rate: 30,
            keyframe_interval: 60,
        };

        let result = TranscodeJob::spawn("streamcast-no-such-binary", &spec);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_kill_reaps_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let job = TranscodeJob::spawn_command(cmd).unwrap();
        assert!(job.pid().is_some());

        let (kill_tx, kill_rx) = oneshot::channel();
        let wait = tokio::spawn(job.run_to_exit(kill_rx));

        kill_tx.send(()).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("kill did not reap the process")
            .unwrap()
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_dropped_kill_sender_terminates() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let job = TranscodeJob::spawn_command(cmd).unwrap();

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        drop(kill_tx);

        let status = tokio::time::timeout(Duration::from_secs(5), job.run_to_exit(kill_rx))
            .await
            .expect("dropped sender did not terminate the process")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_early_exit_is_reaped() {
        let job = TranscodeJob::spawn_command(Command::new("true")).unwrap();

        let (_kill_tx, kill_rx) = oneshot::channel();
        let status = tokio::time::timeout(Duration::from_secs(5), job.run_to_exit(kill_rx))
            .await
            .expect("early exit was not observed")
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_log_drain_finishes_on_exit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo diagnostics >&2"]);
        let mut job = TranscodeJob::spawn_command(cmd).unwrap();

        let drain = job.spawn_log_drain("abc123").unwrap();
        // A second call has nothing left to drain
        assert!(job.spawn_log_drain("abc123").is_none());

        let (_kill_tx, kill_rx) = oneshot::channel();
        job.run_to_exit(kill_rx).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), drain)
            .await
            .expect("drain task did not finish")
            .unwrap();
    }
}
