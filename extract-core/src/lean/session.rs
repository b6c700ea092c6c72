//! Lean 4 REPL subprocess sessions.
//!
//! A [`Session`] owns exactly one `repl` child process. Requests are single
//! JSON objects terminated by a blank line; responses may span many stdout
//! lines, so they are accumulated line by line until the buffer decodes.
//!
//! See: https://github.com/leanprover-community/repl

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use super::types::{LeanCommand, LeanMessage, LeanResponse};
use crate::error::{Error, Result};

/// Default cap on line reads while waiting for one response.
pub const DEFAULT_MAX_READ_ATTEMPTS: u64 = 100_000_000;

/// Relative location of the REPL binary inside a built repl checkout.
pub const REPL_BINARY: &str = ".lake/build/bin/repl";

/// Configuration for one Lean REPL subprocess.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Executable to spawn.
    pub program: PathBuf,

    /// Arguments passed to `program`.
    pub args: Vec<String>,

    /// Working directory of the child (the Lean project root).
    pub working_dir: Option<PathBuf>,

    /// File the child's stderr is appended to. Discarded when `None`.
    pub stderr_log: Option<PathBuf>,

    /// Wall-clock bound on reading one response. `None` waits for the
    /// read-attempt cap only.
    pub response_timeout_ms: Option<u64>,

    /// Maximum number of stdout lines read for one response.
    pub max_read_attempts: u64,

    /// Whether to log full request and response payloads.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("repl"),
            args: Vec::new(),
            working_dir: None,
            stderr_log: None,
            response_timeout_ms: None,
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            verbose: false,
        }
    }
}

impl SessionConfig {
    /// Run a built REPL checkout through `lake env` inside a Lean project.
    pub fn lake_env(project_dir: impl Into<PathBuf>, repl_dir: impl AsRef<Path>) -> Self {
        let repl_binary = repl_dir.as_ref().join(REPL_BINARY);
        Self {
            program: PathBuf::from("lake"),
            args: vec!["env".to_string(), repl_binary.to_string_lossy().to_string()],
            working_dir: Some(project_dir.into()),
            ..Default::default()
        }
    }

    /// Spawn an arbitrary program speaking the REPL protocol.
    pub fn program(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Default::default()
        }
    }

    /// Set the response timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the read-attempt cap.
    pub fn with_max_read_attempts(mut self, attempts: u64) -> Self {
        self.max_read_attempts = attempts.max(1);
        self
    }

    /// Append child stderr to a log file.
    pub fn with_stderr_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log = Some(path.into());
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn stderr(&self) -> Result<Stdio> {
        match &self.stderr_log {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Error::io(path, e))?;
                Ok(Stdio::from(file))
            }
            None => Ok(Stdio::null()),
        }
    }
}

/// Handle to a running Lean REPL subprocess.
///
/// A session serves one submission workflow and is then closed with
/// [`Session::close`]. The child is also killed if the handle is dropped
/// without being closed.
pub struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    config: SessionConfig,
}

impl Session {
    /// Spawn a new Lean REPL subprocess.
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(config.stderr()?)
            .kill_on_drop(true);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::SubprocessComm(format!(
                "Failed to spawn Lean REPL ({}): {}",
                config.program.display(),
                e
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdin handle for Lean REPL".to_string())
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdout handle for Lean REPL".to_string())
        })?;

        debug!(program = %config.program.display(), pid = ?child.id(), "Lean REPL session opened");

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            config,
        })
    }

    /// Submit one Lean source text and return the compiler messages.
    pub async fn submit(&mut self, code: &str) -> Result<Vec<LeanMessage>> {
        let request_json = serde_json::to_string(&LeanCommand::command(code))?;

        if self.config.verbose {
            debug!("Lean REPL request: {}", request_json);
        }

        self.stdin
            .write_all(request_json.as_bytes())
            .await
            .map_err(|e| Error::SubprocessComm(format!("Failed to send command to Lean REPL: {}", e)))?;
        self.stdin
            .write_all(b"\n\n")
            .await
            .map_err(|e| Error::SubprocessComm(format!("Failed to send command to Lean REPL: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| Error::SubprocessComm(format!("Failed to flush Lean REPL stdin: {}", e)))?;

        let start = Instant::now();
        let read = read_response(&mut self.stdout, self.config.max_read_attempts);
        let response = match self.config.response_timeout_ms {
            Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), read)
                .await
                .map_err(|_| Error::timeout(timeout_ms))??,
            None => read.await?,
        };

        debug!(
            messages = response.messages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Lean REPL response decoded"
        );

        Ok(response.messages)
    }

    /// Kill the subprocess and wait for it to exit.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.child.start_kill() {
            // Already exited on its own; the wait below still reaps it.
            trace!("Lean REPL kill: {}", e);
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::SubprocessComm(format!("Failed to wait for Lean REPL: {}", e)))?;
        debug!(?status, "Lean REPL session closed");
        Ok(())
    }
}

/// Accumulate lines from `reader` until they decode as one response.
///
/// Any decode failure keeps accumulating, since one response may span
/// several lines. End of stream is reported immediately.
pub(crate) async fn read_response<R>(reader: &mut R, max_read_attempts: u64) -> Result<LeanResponse>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = String::new();

    for _ in 0..max_read_attempts {
        let read = reader
            .read_line(&mut buffer)
            .await
            .map_err(|e| Error::SubprocessComm(format!("Failed to read from Lean REPL: {}", e)))?;

        if read == 0 {
            return Err(Error::SubprocessComm(format!(
                "Lean REPL closed its output before a complete response ({} bytes buffered)",
                buffer.len()
            )));
        }

        if buffer.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LeanResponse>(&buffer) {
            Ok(response) => return Ok(response),
            Err(e) => trace!("Lean REPL response not decodable yet: {}", e),
        }
    }

    warn!(
        attempts = max_read_attempts,
        buffered = buffer.len(),
        "Lean REPL response never decoded"
    );
    Err(Error::ProtocolDecodeExhausted {
        attempts: max_read_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lean::MessageSeverity;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.program, PathBuf::from("repl"));
        assert!(config.working_dir.is_none());
        assert!(config.response_timeout_ms.is_none());
        assert_eq!(config.max_read_attempts, DEFAULT_MAX_READ_ATTEMPTS);
    }

    #[test]
    fn test_session_config_lake_env() {
        let config = SessionConfig::lake_env("/work/AutoML", "/work/repl");
        assert_eq!(config.program, PathBuf::from("lake"));
        assert_eq!(config.args, vec!["env", "/work/repl/.lake/build/bin/repl"]);
        assert_eq!(config.working_dir, Some(PathBuf::from("/work/AutoML")));
    }

    #[test]
    fn test_max_read_attempts_is_at_least_one() {
        let config = SessionConfig::default().with_max_read_attempts(0);
        assert_eq!(config.max_read_attempts, 1);
    }

    #[tokio::test]
    async fn test_read_response_single_line() {
        let mut input: &[u8] = b"{\"messages\": []}\n";
        let response = read_response(&mut input, 10).await.unwrap();
        assert!(response.messages.is_empty());
    }

    #[tokio::test]
    async fn test_read_response_accumulates_lines() {
        let mut input: &[u8] = b"\n{\"messages\": [\n  {\"severity\": \"info\", \"data\": \"executed tactic: simp\"}\n]}\n\n";
        let response = read_response(&mut input, 10).await.unwrap();
        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].severity, MessageSeverity::Info);
        assert_eq!(response.messages[0].data, "executed tactic: simp");
    }

    #[tokio::test]
    async fn test_read_response_exhausts_attempts() {
        let mut input: &[u8] = b"{\"messages\": [\n{\n{\n{\n{\n";
        let err = read_response(&mut input, 3).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolDecodeExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_read_response_reports_eof() {
        let mut input: &[u8] = b"{\"messages\": [\n";
        let err = read_response(&mut input, 100).await.unwrap_err();
        assert!(matches!(err, Error::SubprocessComm(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_against_echo_process() {
        // `cat` echoes the request; `{"cmd": ...}` decodes as a response with no messages.
        let mut session = Session::open(SessionConfig::program("cat", Vec::new()))
            .await
            .unwrap();
        let messages = session.submit("theorem t : True := trivial").await.unwrap();
        assert!(messages.is_empty());
        session.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_multiline_response() {
        let script = r#"read line; printf '{"messages":\n[{"severity":"error","data":"boom","pos":{"line":3,"column":0}}]}\n'; sleep 5"#;
        let config = SessionConfig::program("sh", vec!["-c".to_string(), script.to_string()]);
        let mut session = Session::open(config).await.unwrap();
        let messages = session.submit("example : False := by simp").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, MessageSeverity::Error);
        assert_eq!(messages[0].data, "boom");
        session.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_times_out_on_silent_process() {
        let config = SessionConfig::program("sh", vec!["-c".to_string(), "sleep 30".to_string()])
            .with_timeout(100);
        let mut session = Session::open(config).await.unwrap();
        let err = session.submit("def x := 1").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { duration_ms: 100 }));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_binary_fails() {
        let config = SessionConfig::program("/nonexistent/lean-repl-binary", Vec::new());
        let err = Session::open(config).await.err().unwrap();
        assert!(matches!(err, Error::SubprocessComm(_)));
    }

    #[test]
    #[ignore = "requires Lean REPL installed"]
    fn test_lean_repl_round_trip() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut session = Session::open(SessionConfig::default()).await.unwrap();
            let messages = session.submit("#eval 1 + 1").await.unwrap();
            assert!(messages.iter().any(|m| m.data.contains('2')));
            session.close().await.unwrap();
        });
    }
}
