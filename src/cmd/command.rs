use std::io::{BufRead, BufReader, Error, ErrorKind, Lines};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use itertools::Itertools;
use timeout_readwrite::TimeoutReader;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Error while executing command: {0}")]
    ExecutionError(#[from] Error),

    #[error("Command terminated with a non success exit status code: {0}")]
    ExitStatusError(ExitStatus),

    #[error("Command killed due to timeout: {0}")]
    TimeoutError(String),

    #[error("Command killed by user request: {0}")]
    Killed(String),
}

#[derive(Debug, Clone)]
pub enum AbortReason {
    Timeout(Duration),
    Canceled(String),
}

pub struct CommandKiller<'a> {
    should_abort: Box<dyn Fn() -> Option<AbortReason> + 'a>,
}

impl<'a> CommandKiller<'a> {
    pub fn never() -> CommandKiller<'a> {
        CommandKiller {
            should_abort: Box::new(|| None),
        }
    }

    pub fn from_timeout(timeout: Duration) -> CommandKiller<'a> {
        let started_at = Instant::now();
        CommandKiller {
            should_abort: Box::new(move || {
                if started_at.elapsed() >= timeout {
                    return Some(AbortReason::Timeout(timeout));
                }
                None
            }),
        }
    }

    pub fn from_cancelable(is_canceled: &'a dyn Fn() -> bool) -> CommandKiller<'a> {
        CommandKiller {
            should_abort: Box::new(move || {
                if is_canceled() {
                    return Some(AbortReason::Canceled("Task canceled".to_string()));
                }
                None
            }),
        }
    }

    pub fn should_abort(&self) -> Option<AbortReason> {
        (self.should_abort)()
    }
}

/// Outcome of draining one of the child's output pipes for a while.
enum Drain {
    Open,
    Closed,
    Aborted,
}

/// A process invocation whose output is streamed line by line to callbacks.
pub struct ExecCommand {
    command: Command,
}

impl ExecCommand {
    pub fn new<P: AsRef<Path>>(binary: P, args: &[&str], envs: &[(&str, &str)]) -> ExecCommand {
        let mut command = Command::new(binary.as_ref().as_os_str());
        command.args(args);
        for (k, v) in envs {
            command.env(k, v);
        }

        ExecCommand { command }
    }

    fn kill(cmd_handle: &mut Child) {
        let _ = cmd_handle
            .kill()
            .map(|_| cmd_handle.wait())
            .map_err(|err| error!("Cannot kill process {:?} {}", cmd_handle, err));
    }

    pub fn exec(&mut self) -> Result<(), CommandError> {
        self.exec_with_abort(
            &mut |line| info!("{}", line),
            &mut |line| warn!("{}", line),
            &CommandKiller::never(),
        )
    }

    pub fn exec_with_output<STDOUT, STDERR>(
        &mut self,
        stdout_output: &mut STDOUT,
        stderr_output: &mut STDERR,
    ) -> Result<(), CommandError>
    where
        STDOUT: FnMut(String),
        STDERR: FnMut(String),
    {
        self.exec_with_abort(stdout_output, stderr_output, &CommandKiller::never())
    }

    pub fn exec_with_abort<STDOUT, STDERR>(
        &mut self,
        stdout_output: &mut STDOUT,
        stderr_output: &mut STDERR,
        abort_notifier: &CommandKiller,
    ) -> Result<(), CommandError>
    where
        STDOUT: FnMut(String),
        STDERR: FnMut(String),
    {
        debug!("command: {:?}", self.command);
        let mut cmd_handle = self
            .command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(CommandError::ExecutionError)?;

        let stdout: ChildStdout = cmd_handle.stdout.take().ok_or_else(|| {
            CommandError::ExecutionError(Error::new(ErrorKind::BrokenPipe, "Cannot get stdout for command"))
        })?;
        let stderr: ChildStderr = cmd_handle.stderr.take().ok_or_else(|| {
            CommandError::ExecutionError(Error::new(ErrorKind::BrokenPipe, "Cannot get stderr for command"))
        })?;

        let mut stdout_reader = BufReader::new(TimeoutReader::new(stdout, Duration::from_secs(1))).lines();
        // don't block on stderr
        let mut stderr_reader = BufReader::new(TimeoutReader::new(stderr, Duration::from_secs(0))).lines();

        let mut stdout_closed = false;
        let mut stderr_closed = false;
        while !stdout_closed || !stderr_closed {
            if abort_notifier.should_abort().is_some() {
                break;
            }

            if !stdout_closed {
                match self.drain(&mut stdout_reader, stdout_output, abort_notifier) {
                    Drain::Open => {}
                    Drain::Closed => stdout_closed = true,
                    Drain::Aborted => break,
                }
            }

            if !stderr_closed {
                match self.drain(&mut stderr_reader, stderr_output, abort_notifier) {
                    Drain::Open => {}
                    Drain::Closed => stderr_closed = true,
                    Drain::Aborted => break,
                }
            }
        }

        // Wait for the process to exit, kill it if asked to
        let exit_status = loop {
            match cmd_handle.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => match abort_notifier.should_abort() {
                    None => {}
                    Some(AbortReason::Timeout(timeout)) => {
                        let msg = format!(
                            "Killing process {:?} due to timeout {}s reached",
                            self.command,
                            timeout.as_secs()
                        );
                        warn!("{}", msg);
                        Self::kill(&mut cmd_handle);
                        return Err(CommandError::TimeoutError(msg));
                    }
                    Some(AbortReason::Canceled(_)) => {
                        let msg = format!("Killing process {:?}", self.command);
                        warn!("{}", msg);
                        Self::kill(&mut cmd_handle);
                        return Err(CommandError::Killed(msg));
                    }
                },
                Err(err) => return Err(CommandError::ExecutionError(err)),
            };

            std::thread::sleep(Duration::from_millis(500));
        };

        if !exit_status.success() {
            debug!("command: {:?} terminated with error exit status {:?}", self.command, exit_status);
            return Err(CommandError::ExitStatusError(exit_status));
        }

        Ok(())
    }

    fn drain<R, F>(&self, reader: &mut Lines<BufReader<R>>, output: &mut F, abort_notifier: &CommandKiller) -> Drain
    where
        R: std::io::Read,
        F: FnMut(String),
    {
        loop {
            match reader.next() {
                None => return Drain::Closed,
                Some(Err(ref err)) if err.kind() == ErrorKind::TimedOut => return Drain::Open,
                Some(Ok(line)) => output(line),
                Some(Err(err)) => {
                    error!("Error while reading output of cmd {:?}: {:?}", self.command, err);
                    return Drain::Closed;
                }
            }

            if abort_notifier.should_abort().is_some() {
                return Drain::Aborted;
            }
        }
    }
}

/// Renders a command line for logs, hiding env values.
pub fn command_to_string<P>(binary: P, args: &[&str], envs: &[(&str, &str)]) -> String
where
    P: AsRef<Path>,
{
    let envs = envs.iter().map(|(k, _)| format!("{}=***", k)).join(" ");
    format!("{} {:?} {}", envs, binary.as_ref().as_os_str(), args.join(" "))
        .trim()
        .to_string()
}
