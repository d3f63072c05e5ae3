use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cmd::command::{CommandKiller, ExecCommand};
use crate::cmd::docker::{ContainerImage, Docker, DockerError};
use crate::container_registry::{ContainerRegistryError, EcrService, ecr_credentials};
use crate::runtime::block_on_with_timeout;

pub const SHORT_SHA_LENGTH: usize = 7;
pub const TIMESTAMP_TAG_FORMAT: &str = "%Y%m%d%H%M%S";
pub const LATEST_TAG: &str = "latest";

const BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 30);
const PUSH_TIMEOUT: Duration = Duration::from_secs(60 * 15);

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Invalid commit sha `{sha}`, expected at least {SHORT_SHA_LENGTH} hexadecimal characters.")]
    InvalidCommitSha { sha: String },
    #[error("Cannot resolve current commit sha: {raw_error_message}")]
    CannotResolveCommitSha { raw_error_message: String },
    #[error("Invalid registry `{registry}`: {raw_error_message}")]
    InvalidRegistry { registry: String, raw_error_message: String },
    #[error("Timeout while requesting registry credentials.")]
    RegistryCredentialsTimeout,
    #[error(transparent)]
    ContainerRegistry(#[from] ContainerRegistryError),
    #[error(transparent)]
    Docker(#[from] DockerError),
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Registry host, the one returned with the registry credentials when unset.
    pub registry: Option<String>,
    pub repository: String,
    pub commit_sha: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub include_latest: bool,
}

/// Tags applied to a published image: short sha, build timestamp, both joined, and `latest`.
pub fn compute_tags(commit_sha: &str, now: &DateTime<Utc>, include_latest: bool) -> Result<Vec<String>, ReleaseError> {
    let sha = commit_sha.trim().to_lowercase();
    if sha.len() < SHORT_SHA_LENGTH || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ReleaseError::InvalidCommitSha {
            sha: commit_sha.to_string(),
        });
    }

    let short_sha = &sha[..SHORT_SHA_LENGTH];
    let timestamp = now.format(TIMESTAMP_TAG_FORMAT).to_string();

    let mut tags = vec![
        short_sha.to_string(),
        timestamp.clone(),
        format!("{}-{}", short_sha, timestamp),
    ];
    if include_latest {
        tags.push(LATEST_TAG.to_string());
    }

    Ok(tags)
}

/// Explicit sha when provided, `git rev-parse HEAD` otherwise.
pub fn resolve_commit_sha(explicit: Option<String>) -> Result<String, ReleaseError> {
    if let Some(sha) = explicit.filter(|s| !s.trim().is_empty()) {
        return Ok(sha.trim().to_string());
    }

    let mut output = String::new();
    let mut errors = String::new();
    let ret = ExecCommand::new("git", &["rev-parse", "HEAD"], &[])
        .exec_with_output(&mut |line| output.push_str(line.trim()), &mut |line| errors.push_str(&line));

    match ret {
        Ok(()) => Ok(output),
        Err(e) => Err(ReleaseError::CannotResolveCommitSha {
            raw_error_message: format!("{} {}", e, errors).trim().to_string(),
        }),
    }
}

pub fn registry_url(registry: &str) -> Result<Url, ReleaseError> {
    let registry = registry.trim().trim_end_matches('/');
    let with_scheme = if registry.contains("://") {
        registry.to_string()
    } else {
        format!("https://{}", registry)
    };

    let url = Url::parse(&with_scheme).map_err(|e| ReleaseError::InvalidRegistry {
        registry: registry.to_string(),
        raw_error_message: e.to_string(),
    })?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ReleaseError::InvalidRegistry {
            registry: registry.to_string(),
            raw_error_message: "registry has no host".to_string(),
        });
    }

    Ok(url)
}

/// Builds and pushes the image with every computed tag, after logging docker into the registry.
pub fn publish(
    config: &PublishConfig,
    ecr: &dyn EcrService,
    docker: &Docker,
    now: &DateTime<Utc>,
) -> Result<ContainerImage, ReleaseError> {
    let tags = compute_tags(&config.commit_sha, now, config.include_latest)?;

    let credentials =
        block_on_with_timeout(ecr_credentials(ecr)).map_err(|_| ReleaseError::RegistryCredentialsTimeout)??;
    let login_url = credentials.login_url()?;

    let registry = match &config.registry {
        Some(registry) => registry_url(registry)?,
        None => registry_url(&credentials.endpoint)?,
    };
    let image = ContainerImage::new(registry, config.repository.clone(), tags);
    info!("publishing {}", image.repository());

    docker.login(&login_url)?;
    docker.build(
        &config.dockerfile,
        &config.context,
        &image,
        &[("GIT_SHA", config.commit_sha.as_str())],
        &mut |line| info!("{}", line),
        &mut |line| info!("{}", line),
        &CommandKiller::from_timeout(BUILD_TIMEOUT),
    )?;
    docker.push(
        &image,
        &mut |line| info!("{}", line),
        &mut |line| warn!("{}", line),
        &CommandKiller::from_timeout(PUSH_TIMEOUT),
    )?;

    for name in image.image_names() {
        info!("pushed {}", name);
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ecr::error::SdkError;
    use aws_sdk_ecr::operation::get_authorization_token::{GetAuthorizationTokenError, GetAuthorizationTokenOutput};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_compute_tags() {
        let tags = compute_tags("3F2A9C1D0E8B7A6F5E4D3C2B1A0F9E8D7C6B5A49", &now(), true).unwrap();
        assert_eq!(
            tags,
            vec![
                "3f2a9c1".to_string(),
                "20240309070501".to_string(),
                "3f2a9c1-20240309070501".to_string(),
                "latest".to_string(),
            ]
        );
    }

    #[test]
    fn test_compute_tags_without_latest() {
        let tags = compute_tags("abcdef0", &now(), false).unwrap();
        assert_eq!(tags.len(), 3);
        assert!(!tags.contains(&LATEST_TAG.to_string()));
    }

    #[test]
    fn test_compute_tags_invalid_sha() {
        assert!(matches!(
            compute_tags("abc", &now(), true),
            Err(ReleaseError::InvalidCommitSha { .. })
        ));
        assert!(matches!(
            compute_tags("not-a-sha-at-all", &now(), true),
            Err(ReleaseError::InvalidCommitSha { .. })
        ));
        assert!(compute_tags("", &now(), true).is_err());
    }

    #[test]
    fn test_resolve_commit_sha_prefers_explicit() {
        assert_eq!(
            resolve_commit_sha(Some(" abcdef0123 ".to_string())).unwrap(),
            "abcdef0123".to_string()
        );
    }

    #[test]
    fn test_registry_url() {
        let url = registry_url("123456789012.dkr.ecr.eu-west-3.amazonaws.com").unwrap();
        assert_eq!(url.host_str(), Some("123456789012.dkr.ecr.eu-west-3.amazonaws.com"));

        let url = registry_url("https://123456789012.dkr.ecr.eu-west-3.amazonaws.com/").unwrap();
        assert_eq!(url.host_str(), Some("123456789012.dkr.ecr.eu-west-3.amazonaws.com"));

        let url = registry_url("localhost:5000").unwrap();
        assert_eq!(url.port(), Some(5000));

        assert!(registry_url("").is_err());
    }

    #[test]
    fn test_publish_rejects_invalid_sha_before_any_call() {
        struct UnreachableEcr;

        #[async_trait::async_trait]
        impl EcrService for UnreachableEcr {
            async fn get_authorization_token(
                &self,
            ) -> Result<GetAuthorizationTokenOutput, SdkError<GetAuthorizationTokenError>> {
                panic!("registry must not be called with an invalid sha");
            }
        }

        let config = PublishConfig {
            registry: None,
            repository: "dynamo-etl".to_string(),
            commit_sha: "zzz".to_string(),
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            include_latest: true,
        };

        let ret = publish(&config, &UnreachableEcr, &Docker::new(None), &now());
        assert!(matches!(ret, Err(ReleaseError::InvalidCommitSha { .. })));
    }
}
