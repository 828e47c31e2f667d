use std::{
    ffi::OsString,
    fmt, io,
    os::unix::process::ExitStatusExt as _,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::Context as _;
use nix::{
    errno::Errno,
    sys::signal::{killpg, Signal},
    unistd::{setpgid, Pid},
};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    process::Command,
    time::Instant,
};

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    TimedOut,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {}", code),
            Self::Signaled(sig) => write!(f, "killed by signal {}", sig),
            Self::TimedOut => write!(f, "time limit exceeded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub termination: Termination,
    /// Wall-clock time from spawn until the process ended or was killed.
    pub elapsed: Duration,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessReport {
    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StdinSource {
    #[default]
    Null,
    Bytes(Vec<u8>),
}

/// A single child process run under a wall-clock limit.
///
/// The limit bounds the child itself. Its output is drained concurrently and,
/// once the child is gone, for a short grace period at most. The child leads
/// its own process group, so on timeout the whole group (including anything
/// it forked) is killed with `SIGKILL`, as is any descendant still holding
/// the pipes after the grace period.
#[derive(Debug, Clone)]
pub struct TimedCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    stdin: StdinSource,
    time_limit: Duration,
}

impl TimedCommand {
    const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(1000);
    /// How long pipe readers may keep draining once the child is gone.
    const DRAIN_GRACE: Duration = Duration::from_millis(100);

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: StdinSource::Null,
            time_limit: Self::DEFAULT_TIME_LIMIT,
        }
    }

    /// `<shell> -c <command>`
    pub fn shell(shell: impl Into<PathBuf>, command: &str) -> Self {
        Self::new(shell).arg("-c").arg(command)
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, stdin: StdinSource) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_time_limit(&self) -> Duration {
        self.time_limit
    }

    fn display(&self) -> String {
        let mut s = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            s.push(' ');
            s += &arg.to_string_lossy();
        }
        s
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(match self.stdin {
                StdinSource::Null => Stdio::null(),
                StdinSource::Bytes(_) => Stdio::piped(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        unsafe {
            cmd.pre_exec(|| {
                setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(io::Error::from)?;
                Ok(())
            });
        }
        cmd
    }

    pub async fn run(&self) -> anyhow::Result<ProcessReport> {
        log::debug!("Running '{}' (limit {:?})", self.display(), self.time_limit);

        let mut child = self
            .build()
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", self.display()))?;
        let started = Instant::now();
        let pid = child.id();

        let stdin = child.stdin.take();
        let mut stdout = child.stdout.take().context("Failed to open stdout")?;
        let mut stderr = child.stderr.take().context("Failed to open stderr")?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let (status, elapsed) = {
            let input = match &self.stdin {
                StdinSource::Bytes(input) => Some(input.as_slice()),
                StdinSource::Null => None,
            };
            let feed = async move {
                let (Some(mut stdin), Some(input)) = (stdin, input) else {
                    return
                };
                if let Err(e) = stdin.write_all(input).await {
                    // the program may exit without reading its input
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        log::debug!("Failed to write stdin: {}", e);
                    }
                }
                // EOF for the child
                drop(stdin);
            };

            let (out, out_buf) = (&mut stdout, &mut stdout_buf);
            let (err, err_buf) = (&mut stderr, &mut stderr_buf);
            let io = async move {
                let (_, out, err) =
                    tokio::join!(feed, out.read_to_end(out_buf), err.read_to_end(err_buf));
                if let Err(e) = out.and(err) {
                    log::debug!("Failed to read child output: {}", e);
                }
            };
            tokio::pin!(io);
            let mut io_done = false;

            let waited = tokio::time::timeout(self.time_limit, async {
                loop {
                    tokio::select! {
                        status = child.wait() => break status,
                        () = &mut io, if !io_done => io_done = true,
                    }
                }
            })
            .await;
            let elapsed = started.elapsed();

            let status = match waited {
                Ok(status) => Some(status.context("Failed to wait for child process")?),
                Err(_) => None,
            };
            if status.is_none() {
                kill_process_group(pid);
            }
            if !io_done {
                io_done = tokio::time::timeout(Self::DRAIN_GRACE, &mut io).await.is_ok();
            }
            if !io_done {
                // a descendant still holds the pipes open
                kill_process_group(pid);
                if tokio::time::timeout(Self::DRAIN_GRACE, &mut io).await.is_err() {
                    log::debug!("Output of '{}' may be truncated", self.display());
                }
            }
            (status, elapsed)
        };

        let termination = match status {
            Some(status) => match (status.code(), status.signal()) {
                (Some(code), _) => Termination::Exited(code),
                (None, Some(sig)) => Termination::Signaled(sig),
                (None, None) => Termination::Signaled(0),
            },
            None => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to reap '{}': {}", self.display(), e);
                }
                Termination::TimedOut
            }
        };

        Ok(ProcessReport {
            termination,
            elapsed,
            stdout: stdout_buf,
            stderr: stderr_buf,
        })
    }
}

fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sh(script: &str) -> TimedCommand {
        TimedCommand::shell("/bin/sh", script).time_limit(Duration::from_millis(2000))
    }

    struct X {
        script: &'static str,
        stdin: StdinSource,
        want_termination: Termination,
        want_stdout: &'static str,
        want_stderr: &'static str,
    }

    async fn run_test(x: X) {
        let res = dbg!(sh(x.script).stdin(x.stdin).run().await).unwrap();
        assert_eq!(res.termination, x.want_termination);
        assert_eq!(String::from_utf8_lossy(&res.stdout), x.want_stdout);
        assert_eq!(String::from_utf8_lossy(&res.stderr), x.want_stderr);
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        run_test(X {
            script: "echo hello",
            stdin: StdinSource::Null,
            want_termination: Termination::Exited(0),
            want_stdout: "hello\n",
            want_stderr: "",
        })
        .await;
    }

    #[tokio::test]
    async fn captures_stderr_and_nonzero_exit() {
        run_test(X {
            script: "echo oops >&2; exit 3",
            stdin: StdinSource::Null,
            want_termination: Termination::Exited(3),
            want_stdout: "",
            want_stderr: "oops\n",
        })
        .await;
    }

    #[tokio::test]
    async fn feeds_stdin() {
        run_test(X {
            script: "read x; echo \"got $x\"",
            stdin: StdinSource::Bytes(b"123\n".to_vec()),
            want_termination: Termination::Exited(0),
            want_stdout: "got 123\n",
            want_stderr: "",
        })
        .await;
    }

    #[tokio::test]
    async fn unread_stdin_is_not_an_error() {
        run_test(X {
            script: "echo done",
            stdin: StdinSource::Bytes(vec![b'x'; 1 << 20]),
            want_termination: Termination::Exited(0),
            want_stdout: "done\n",
            want_stderr: "",
        })
        .await;
    }

    #[tokio::test]
    async fn reports_signal() {
        run_test(X {
            script: "kill -9 $$",
            stdin: StdinSource::Null,
            want_termination: Termination::Signaled(9),
            want_stdout: "",
            want_stderr: "",
        })
        .await;
    }

    #[tokio::test]
    async fn timeout_keeps_partial_output() {
        let res = sh("echo partial; sleep 5")
            .time_limit(Duration::from_millis(300))
            .run()
            .await
            .unwrap();
        assert!(res.timed_out());
        assert_eq!(res.exit_code(), None);
        assert_eq!(res.stdout, b"partial\n");
        assert!(res.elapsed >= Duration::from_millis(300));
        assert!(res.elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn timeout_kills_forked_descendants() {
        let started = std::time::Instant::now();
        let res = sh("(sleep 5; echo late) & sleep 5")
            .time_limit(Duration::from_millis(300))
            .run()
            .await
            .unwrap();
        assert!(res.timed_out());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(res.stdout.is_empty());
    }

    #[tokio::test]
    async fn background_descendant_does_not_hold_the_result() {
        let started = std::time::Instant::now();
        let res = sh("echo ok; (sleep 5; echo late) &")
            .time_limit(Duration::from_millis(1000))
            .run()
            .await
            .unwrap();
        assert_eq!(res.termination, Termination::Exited(0));
        assert_eq!(res.stdout, b"ok\n");
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn direct_invocation_in_given_dir() {
        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("marker.txt"), "here").unwrap();

        let res = TimedCommand::new("/bin/cat")
            .arg("marker.txt")
            .current_dir(dir.path())
            .run()
            .await
            .unwrap();
        assert!(res.success());
        assert_eq!(res.stdout, b"here");
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let res = TimedCommand::new("/nonexistent/program").run().await;
        assert!(res.is_err());
    }
}
