use async_trait::async_trait;
use aws_sdk_ecr::error::SdkError;
use aws_sdk_ecr::operation::get_authorization_token::{GetAuthorizationTokenError, GetAuthorizationTokenOutput};
use aws_types::SdkConfig;
use base64::Engine;
use base64::engine::general_purpose;
use derivative::Derivative;
use thiserror::Error;
use url::Url;

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum ContainerRegistryError {
    #[error("Cannot get credentials from registry: {raw_error_message}")]
    CannotGetCredentials { raw_error_message: String },
    #[error("Invalid authorization token returned by registry: {raw_error_message}")]
    InvalidAuthorizationToken { raw_error_message: String },
    #[error("Invalid registry URL error, cannot be parsed: `{registry_url}`.")]
    InvalidRegistryUrl { registry_url: String },
}

#[async_trait]
pub trait EcrService {
    async fn get_authorization_token(
        &self,
    ) -> Result<GetAuthorizationTokenOutput, SdkError<GetAuthorizationTokenError>>;
}

#[async_trait]
impl EcrService for SdkConfig {
    async fn get_authorization_token(
        &self,
    ) -> Result<GetAuthorizationTokenOutput, SdkError<GetAuthorizationTokenError>> {
        let client = aws_sdk_ecr::Client::new(self);
        client.get_authorization_token().send().await
    }
}

#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct RegistryCredentials {
    pub username: String,
    #[derivative(Debug = "ignore")]
    pub password: String,
    pub endpoint: String,
}

impl RegistryCredentials {
    /// Registry url carrying the credentials, as `Docker::login` expects it.
    pub fn login_url(&self) -> Result<Url, ContainerRegistryError> {
        let invalid_url = || ContainerRegistryError::InvalidRegistryUrl {
            registry_url: self.endpoint.clone(),
        };

        let endpoint = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("https://{}", self.endpoint)
        };

        let mut url = Url::parse(&endpoint).map_err(|_| invalid_url())?;
        url.set_username(&self.username).map_err(|_| invalid_url())?;
        url.set_password(Some(urlencoding::encode(&self.password).as_ref()))
            .map_err(|_| invalid_url())?;

        Ok(url)
    }
}

/// Decodes an ECR authorization token, base64 of `user:password`.
pub fn decode_authorization_token(b64_token: &str) -> Result<(String, String), ContainerRegistryError> {
    let invalid = |msg: String| ContainerRegistryError::InvalidAuthorizationToken { raw_error_message: msg };

    let decoded_token = general_purpose::STANDARD
        .decode(b64_token)
        .map_err(|e| invalid(e.to_string()))?;
    let token = String::from_utf8(decoded_token).map_err(|e| invalid(e.to_string()))?;

    match token.split_once(':') {
        Some((user, password)) if !user.is_empty() && !password.is_empty() => {
            Ok((user.to_string(), password.to_string()))
        }
        _ => Err(invalid("token is not in the form `user:password`".to_string())),
    }
}

pub async fn ecr_credentials<T: EcrService + ?Sized>(ecr: &T) -> Result<RegistryCredentials, ContainerRegistryError> {
    let output = ecr
        .get_authorization_token()
        .await
        .map_err(|e| ContainerRegistryError::CannotGetCredentials {
            raw_error_message: e.to_string(),
        })?;

    let authorization_data = output
        .authorization_data()
        .first()
        .ok_or_else(|| ContainerRegistryError::CannotGetCredentials {
            raw_error_message: "no authorization data returned".to_string(),
        })?;

    let b64_token = authorization_data.authorization_token().ok_or_else(|| {
        ContainerRegistryError::CannotGetCredentials {
            raw_error_message: "authorization data has no token".to_string(),
        }
    })?;
    let (username, password) = decode_authorization_token(b64_token)?;

    let endpoint = authorization_data.proxy_endpoint().ok_or_else(|| {
        ContainerRegistryError::CannotGetCredentials {
            raw_error_message: "authorization data has no proxy endpoint".to_string(),
        }
    })?;

    Ok(RegistryCredentials {
        username,
        password,
        endpoint: endpoint.to_string(),
    })
}
