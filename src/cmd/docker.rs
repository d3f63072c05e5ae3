use crate::cmd::command::{CommandError, CommandKiller, ExecCommand, command_to_string};
use retry::OperationResult;
use retry::delay::Fixed;
use std::path::Path;
use std::process::ExitStatus;
use url::Url;

const PUSH_RETRY_DELAY_MS: u64 = 5000;

#[derive(thiserror::Error, Debug)]
pub enum DockerError {
    #[error("Docker invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Docker terminated with an unknown error: {0}")]
    ExecutionError(#[from] std::io::Error),

    #[error("Docker terminated with a non success exit status code: {0}")]
    ExitStatusError(ExitStatus),

    #[error("Docker aborted due to user cancel request: {0}")]
    Aborted(String),

    #[error("Docker command terminated due to timeout: {0}")]
    Timeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    pub registry: Url,
    pub name: String,
    pub tags: Vec<String>,
}

impl ContainerImage {
    pub fn new(registry: Url, name: String, tags: Vec<String>) -> Self {
        ContainerImage { registry, name, tags }
    }

    /// Registry host as docker expects it, port included when set.
    pub fn registry_host(&self) -> String {
        match self.registry.port() {
            Some(port) => format!("{}:{}", self.registry.host_str().unwrap_or_default(), port),
            None => self.registry.host_str().unwrap_or_default().to_string(),
        }
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.registry_host(), self.name)
    }

    pub fn image_names(&self) -> Vec<String> {
        let repository = self.repository();
        self.tags.iter().map(|tag| format!("{}:{}", repository, tag)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Docker {
    common_envs: Vec<(String, String)>,
    push_attempts: usize,
}

impl Docker {
    pub fn new(socket_location: Option<Url>) -> Docker {
        let mut common_envs = vec![("DOCKER_BUILDKIT".to_string(), "1".to_string())];

        // Override DOCKER_HOST if we use a TCP socket
        if let Some(socket_location) = socket_location {
            common_envs.push(("DOCKER_HOST".to_string(), socket_location.to_string()));
        }

        Docker {
            common_envs,
            push_attempts: 3,
        }
    }

    fn get_all_envs<'a>(&'a self, envs: &'a [(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut all_envs: Vec<(&str, &str)> = self.common_envs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        all_envs.extend_from_slice(envs);
        all_envs
    }

    /// Logs in with the user and password carried by the url.
    pub fn login(&self, registry: &Url) -> Result<(), DockerError> {
        info!("Docker login {} as user {}", registry.host_str().unwrap_or_default(), registry.username());
        if registry.username().is_empty() {
            return Err(DockerError::InvalidConfig(format!(
                "registry `{}` has no username to login with",
                registry.host_str().unwrap_or_default()
            )));
        }

        let password = urlencoding::decode(registry.password().unwrap_or_default())
            .unwrap_or_default()
            .to_string();
        let host = match registry.port() {
            Some(port) => format!("{}:{}", registry.host_str().unwrap_or_default(), port),
            None => registry.host_str().unwrap_or_default().to_string(),
        };
        let args = vec!["login", host.as_str(), "-u", registry.username(), "-p", &password];

        docker_exec(
            &args,
            &self.get_all_envs(&[]),
            &mut |line| info!("{}", line),
            &mut |line| warn!("{}", line),
            &CommandKiller::never(),
        )
    }

    pub fn build<Stdout, Stderr>(
        &self,
        dockerfile: &Path,
        context: &Path,
        image_to_build: &ContainerImage,
        build_args: &[(&str, &str)],
        stdout_output: &mut Stdout,
        stderr_output: &mut Stderr,
        should_abort: &CommandKiller,
    ) -> Result<(), DockerError>
    where
        Stdout: FnMut(String),
        Stderr: FnMut(String),
    {
        // if there is no tags, nothing to build
        if image_to_build.tags.is_empty() {
            return Ok(());
        }

        if !dockerfile.is_file() {
            return Err(DockerError::InvalidConfig(format!(
                "provided dockerfile `{:?}` is not a valid file",
                dockerfile
            )));
        }

        if !context.is_dir() {
            return Err(DockerError::InvalidConfig(format!(
                "provided docker build context `{:?}` is not a valid directory",
                context
            )));
        }

        info!("Docker build {:?}", image_to_build.image_names());
        let args = build_command_args(dockerfile, context, image_to_build, build_args);
        docker_exec(
            &args.iter().map(String::as_str).collect::<Vec<&str>>(),
            &self.get_all_envs(&[]),
            stdout_output,
            stderr_output,
            should_abort,
        )
    }

    /// Pushes every tag of the image, each one retried on failure.
    pub fn push<Stdout, Stderr>(
        &self,
        image: &ContainerImage,
        stdout_output: &mut Stdout,
        stderr_output: &mut Stderr,
        should_abort: &CommandKiller,
    ) -> Result<(), DockerError>
    where
        Stdout: FnMut(String),
        Stderr: FnMut(String),
    {
        for image_name in image.image_names() {
            info!("Docker push {}", image_name);
            retry_push(&image_name, self.push_attempts, PUSH_RETRY_DELAY_MS, || {
                docker_exec(
                    &["push", &image_name],
                    &self.get_all_envs(&[]),
                    stdout_output,
                    stderr_output,
                    should_abort,
                )
            })?;
        }

        Ok(())
    }
}

/// Runs `push` up to `attempts` times, aborts and timeouts are never retried.
fn retry_push<F>(image_name: &str, attempts: usize, delay_ms: u64, mut push: F) -> Result<(), DockerError>
where
    F: FnMut() -> Result<(), DockerError>,
{
    let ret = retry::retry(Fixed::from_millis(delay_ms).take(attempts.saturating_sub(1)), || match push() {
        Ok(_) => OperationResult::Ok(()),
        Err(err @ DockerError::Aborted(_)) | Err(err @ DockerError::Timeout(_)) => OperationResult::Err(err),
        Err(err) => {
            warn!("Docker push of {} failed, retrying: {}", image_name, err);
            OperationResult::Retry(err)
        }
    });

    ret.map_err(|err| err.error)
}

fn build_command_args(
    dockerfile: &Path,
    context: &Path,
    image_to_build: &ContainerImage,
    build_args: &[(&str, &str)],
) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--network".to_string(),
        "host".to_string(),
        "-f".to_string(),
        dockerfile.to_string_lossy().to_string(),
    ];

    for image_name in image_to_build.image_names() {
        args.push("--tag".to_string());
        args.push(image_name);
    }

    for (k, v) in build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", k, v));
    }

    args.push(context.to_string_lossy().to_string());
    args
}

fn docker_exec<F, X>(
    args: &[&str],
    envs: &[(&str, &str)],
    stdout_output: &mut F,
    stderr_output: &mut X,
    cmd_killer: &CommandKiller,
) -> Result<(), DockerError>
where
    F: FnMut(String),
    X: FnMut(String),
{
    // login args carry the password
    if args.first() != Some(&"login") {
        debug!("{}", command_to_string("docker", args, envs));
    }

    let mut cmd = ExecCommand::new("docker", args, envs);
    match cmd.exec_with_abort(stdout_output, stderr_output, cmd_killer) {
        Ok(_) => Ok(()),
        Err(CommandError::TimeoutError(msg)) => Err(DockerError::Timeout(msg)),
        Err(CommandError::Killed(msg)) => Err(DockerError::Aborted(msg)),
        Err(CommandError::ExitStatusError(err)) => Err(DockerError::ExitStatusError(err)),
        Err(CommandError::ExecutionError(err)) => Err(DockerError::ExecutionError(err)),
    }
}
