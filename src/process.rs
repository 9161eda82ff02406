//! External command execution.
//!
//! [`Cmd`] describes one command line; a [`CommandRunner`] executes it
//! synchronously and turns a nonzero exit into
//! [`BuildError::ExternalCommand`]. [`SystemRunner`] is the real
//! implementation; tests substitute a recording runner.
//!
//! # Example
//!
//! ```rust,no_run
//! use bcm_builder::process::{Cmd, CommandRunner, SystemRunner};
//!
//! let output = SystemRunner.run(&Cmd::new("uname").arg("-a").echo(true))?;
//! println!("{}", output.stdout);
//! # Ok::<(), bcm_builder::BuildError>(())
//! ```

use std::ffi::OsString;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::BuildError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One external command line plus how to run it.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    echo: bool,
    timeout: Option<Duration>,
}

impl Cmd {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            echo: false,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Write the command line and its captured output to the operator log.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Kill the command if it runs longer than `limit`.
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn is_echo(&self) -> bool {
        self.echo
    }

    /// The command line as the operator would type it.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }

    /// Trimmed stderr, or trimmed stdout when the tool reported errors there.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    fn from_output(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        }
    }
}

/// Executes commands. Implementations must not return `Ok` for a nonzero exit.
pub trait CommandRunner {
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput, BuildError>;
}

/// Runs commands as child processes of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput, BuildError> {
        let command_line = cmd.command_line();
        let mut command = cmd.to_command();

        let output = match cmd.timeout {
            None => command.output().map_err(|source| BuildError::Process {
                command: command_line.clone(),
                source,
            })?,
            Some(limit) => wait_with_timeout(&mut command, limit, &command_line)?,
        };
        let result = CommandOutput::from_output(output);

        if cmd.echo {
            echo_output(&command_line, &result);
        }

        if !result.success() {
            return Err(BuildError::ExternalCommand {
                command: command_line,
                error_text: result.error_text(),
            });
        }
        Ok(result)
    }
}

fn echo_output(command_line: &str, output: &CommandOutput) {
    info!("$ {command_line}");
    for line in output.combined().lines() {
        if !line.trim().is_empty() {
            info!("  {line}");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run `command` with a deadline covering both the process and its output.
///
/// The child leads its own process group, so anything it backgrounds is
/// killed with it. Output is collected over a channel: a grandchild that
/// keeps a pipe open past the deadline cannot stall the caller.
fn wait_with_timeout(
    command: &mut Command,
    limit: Duration,
    command_line: &str,
) -> Result<Output, BuildError> {
    command.process_group(0);
    let mut child = command.spawn().map_err(|source| BuildError::Process {
        command: command_line.to_string(),
        source,
    })?;
    let timed_out = || BuildError::Timeout {
        command: command_line.to_string(),
        seconds: limit.as_secs(),
    };

    let (tx, rx) = mpsc::channel();
    drain(child.stdout.take(), Stream::Stdout, tx.clone());
    drain(child.stderr.take(), Stream::Stderr, tx);

    let deadline = Instant::now() + limit;
    let status = loop {
        let polled = child.try_wait().map_err(|source| BuildError::Process {
            command: command_line.to_string(),
            source,
        })?;
        if let Some(status) = polled {
            break status;
        }
        if Instant::now() >= deadline {
            kill_process_group(&mut child);
            return Err(timed_out());
        }
        thread::sleep(POLL_INTERVAL);
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for _ in 0..2 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, bytes)) => stdout = bytes,
            Ok((Stream::Stderr, bytes)) => stderr = bytes,
            Err(RecvTimeoutError::Timeout) => {
                kill_process_group(&mut child);
                return Err(timed_out());
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    stream: Stream,
    tx: Sender<(Stream, Vec<u8>)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send((stream, buf));
    });
}

fn kill_process_group(child: &mut Child) {
    // process_group(0) made the child's pid its group id.
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) takes no pointers; a negative pid addresses the group.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Cmd {
        Cmd::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_command_line_rendering() {
        let cmd = Cmd::new("/usr/bin/qcc")
            .args(["-o", "out"])
            .arg_path(Path::new("src/main.c"));
        assert_eq!(cmd.command_line(), "/usr/bin/qcc -o out src/main.c");
    }

    #[test]
    fn test_run_captures_stdout() {
        let output = SystemRunner.run(&sh("echo hello").echo(true)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_nonzero_exit_is_external_command_error() {
        let cmd = sh("echo '  undefined reference  ' >&2; exit 2");
        let err = SystemRunner.run(&cmd).unwrap_err();
        match &err {
            BuildError::ExternalCommand {
                command,
                error_text,
            } => {
                assert_eq!(command, &cmd.command_line());
                assert_eq!(error_text, "undefined reference");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("undefined reference"));
        assert!(msg.contains("exit 2"));
    }

    #[test]
    fn test_run_uses_current_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();
        let output = SystemRunner
            .run(&sh("ls").current_dir(temp.path()))
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[test]
    fn test_missing_program_is_process_error() {
        let err = SystemRunner
            .run(&Cmd::new("definitely_not_a_real_command_12345"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Process { .. }));
    }

    #[test]
    fn test_timeout_kills_hung_command() {
        let cmd = sh("sleep 5").timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let err = SystemRunner.run(&cmd).unwrap_err();
        assert!(matches!(err, BuildError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_bounds_backgrounded_grandchild() {
        // sh exits at once, but the backgrounded sleep holds stdout open.
        let cmd = sh("sleep 6 & echo started").timeout(Some(Duration::from_secs(1)));
        let started = Instant::now();
        let err = SystemRunner.run(&cmd).unwrap_err();
        assert!(matches!(err, BuildError::Timeout { seconds: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    fn is_running(pid: &str) -> bool {
        // Field 3 of /proc/<pid>/stat is the state; Z and X are already gone.
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .and_then(|(_, rest)| rest.chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[test]
    fn test_timeout_kills_whole_process_group() {
        let temp = TempDir::new().unwrap();
        let pid_file = temp.path().join("sleeper.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let err = SystemRunner
            .run(&sh(&script).timeout(Some(Duration::from_millis(500))))
            .unwrap_err();
        assert!(matches!(err, BuildError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let gone_by = Instant::now() + Duration::from_secs(2);
        while is_running(pid) && Instant::now() < gone_by {
            thread::sleep(POLL_INTERVAL);
        }
        assert!(!is_running(pid), "backgrounded sleep survived the timeout");
    }

    #[derive(Clone, Default)]
    struct LogCapture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run_with_log_capture(cmd: &Cmd) -> String {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || SystemRunner.run(cmd).unwrap());
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_echo_writes_command_and_output_to_log() {
        let cmd = sh("echo compiled; echo 'warning: unused' >&2").echo(true);
        let log = run_with_log_capture(&cmd);
        assert!(log.contains(&format!("$ {}", cmd.command_line())));
        assert!(log.contains("compiled"));
        assert!(log.contains("warning: unused"));
    }

    #[test]
    fn test_no_echo_leaves_log_empty() {
        let log = run_with_log_capture(&sh("echo quiet"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_timeout_not_reached_returns_output() {
        let cmd = sh("echo quick").timeout(Some(Duration::from_secs(10)));
        let output = SystemRunner.run(&cmd).unwrap();
        assert_eq!(output.stdout.trim(), "quick");
    }

    #[test]
    fn test_error_text_falls_back_to_stdout() {
        let output = CommandOutput {
            stdout: "error: bad flag\n".to_string(),
            stderr: String::new(),
            code: Some(1),
        };
        assert_eq!(output.error_text(), "error: bad flag");
    }
}
