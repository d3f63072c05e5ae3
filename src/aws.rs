use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::SdkConfig;
use aws_types::region::Region;
use derivative::Derivative;

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum AwsCredentials {
    Static {
        access_key_id: String,
        #[derivative(Debug = "ignore")]
        secret_access_key: String,
    },
    STS {
        access_key_id: String,
        #[derivative(Debug = "ignore")]
        secret_access_key: String,
        #[derivative(Debug = "ignore")]
        session_token: String,
    },
}

impl AwsCredentials {
    pub fn new(access_key_id: String, secret_access_key: String, session_token: Option<String>) -> Self {
        match session_token {
            Some(session_token) => AwsCredentials::STS {
                access_key_id,
                secret_access_key,
                session_token,
            },
            None => AwsCredentials::Static {
                access_key_id,
                secret_access_key,
            },
        }
    }

    pub fn access_key_id(&self) -> &str {
        match self {
            AwsCredentials::Static { access_key_id, .. } => access_key_id,
            AwsCredentials::STS { access_key_id, .. } => access_key_id,
        }
    }

    pub fn secret_access_key(&self) -> &str {
        match self {
            AwsCredentials::Static { secret_access_key, .. } => secret_access_key,
            AwsCredentials::STS { secret_access_key, .. } => secret_access_key,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        match self {
            AwsCredentials::Static { .. } => None,
            AwsCredentials::STS { session_token, .. } => Some(session_token),
        }
    }
}

/// Builds an sdk config from explicit credentials.
pub fn sdk_config(credentials: &AwsCredentials, region: &str) -> SdkConfig {
    SdkConfig::builder()
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(str::to_string),
            None,
            "dynamo-etl",
        )))
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .build()
}

/// Resolves credentials with the default provider chain: env, profile, web identity, container
/// and instance metadata.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }

    loader.load().await
}

/// Explicit credentials win when a region is known, otherwise the default chain is used.
pub async fn resolve_sdk_config(credentials: Option<&AwsCredentials>, region: Option<&str>) -> SdkConfig {
    match (credentials, region) {
        (Some(credentials), Some(region)) => sdk_config(credentials, region),
        _ => load_sdk_config(region).await,
    }
}
