//! Child process channel for the tool server
//!
//! Owns the lifecycle of the spawned server process and hands out its piped
//! stdin/stdout. At most one transport binds to a channel.

use crate::mcp::error::McpError;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Fixed flag granting the tool server full runtime permissions
const ALLOW_ALL_FLAG: &str = "-A";

/// Handle to the spawned tool server process
#[derive(Debug)]
pub struct ProcessChannel {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl ProcessChannel {
    /// Spawn the tool server: `<runtime> run -A <script> <allowed dirs...>`
    ///
    /// Stdin and stdout are piped for the message transport; stderr is
    /// inherited so server diagnostics land on the parent's console.
    pub fn spawn(
        runtime: &str,
        script: &Path,
        allowed_dirs: &[impl AsRef<Path>],
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(runtime);
        cmd.arg("run").arg(ALLOW_ALL_FLAG).arg(script);
        for dir in allowed_dirs {
            cmd.arg(dir.as_ref());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| {
            McpError::spawn(format!(
                "Failed to launch '{} run {} {}': {}",
                runtime,
                ALLOW_ALL_FLAG,
                script.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn("Failed to get stdout handle"))?;

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(stdout),
        })
    }

    /// OS process id, if the process is still owned
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Take the writable end. Returns `None` after the first call.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Take the readable end. Returns `None` after the first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Exit status if the process has already terminated
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }

    /// Terminate the process. Idempotent: a no-op once the process is gone.
    pub async fn stop(&mut self) -> Result<(), McpError> {
        // Closing stdin signals EOF to a well-behaved server
        self.stdin.take();

        if let Some(mut child) = self.child.take() {
            tokio::select! {
                result = child.wait() => {
                    result.map_err(|e| McpError::transport(e.to_string()))?;
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
                    child.kill().await.ok();
                }
            }
        }

        Ok(())
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        // Best effort cleanup
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let err = ProcessChannel::spawn(
            "definitely-not-a-real-runtime",
            Path::new("server.ts"),
            &[] as &[PathBuf],
        )
        .unwrap_err();

        assert!(matches!(err, McpError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        // `true` exits immediately; both stops must succeed
        let mut channel =
            ProcessChannel::spawn("true", Path::new("run"), &[] as &[PathBuf]).unwrap();
        channel.stop().await.unwrap();
        channel.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_streams_taken_once() {
        let mut channel =
            ProcessChannel::spawn("cat", Path::new("-"), &[] as &[PathBuf]).unwrap();
        assert!(channel.take_stdin().is_some());
        assert!(channel.take_stdin().is_none());
        assert!(channel.take_stdout().is_some());
        assert!(channel.take_stdout().is_none());
        channel.stop().await.unwrap();
    }
}
