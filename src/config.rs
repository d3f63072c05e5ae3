use crate::aws::AwsCredentials;
use derivative::Derivative;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const REDSHIFT_DEFAULT_PORT: u16 = 5439;
pub const SERVER_DEFAULT_PORT: u16 = 80;
pub const DEFAULT_LOCAL_STORAGE_DIR: &str = "raw";

pub const ENV_DB_NAME: &str = "dbname";
pub const ENV_DB_HOST: &str = "host";
pub const ENV_DB_PORT: &str = "port";
pub const ENV_DB_USER: &str = "user";
pub const ENV_DB_PASSWORD: &str = "password";
pub const ENV_ENVIRONMENT: &str = "env";
pub const ENV_COPY_ROLE_ARN: &str = "redshift_copy_arn";
pub const ENV_DATA_BUCKET: &str = "data_bucket";
pub const ENV_LOCAL_STORAGE_DIR: &str = "local_storage_dir";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_SERVER_PORT: &str = "PORT";
pub const ENV_SERVER_BIND_ADDRESS: &str = "BIND_ADDRESS";

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing mandatory environment variable `{name}`.")]
    MissingVariable { name: String },
    #[error("Invalid value `{value}` for `{name}`: {raw_error_message}")]
    InvalidValue {
        name: String,
        value: String,
        raw_error_message: String,
    },
}

/// Deployment environment, decides which tables get extracted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
    Other(String),
}

impl Environment {
    /// Only `stg` prefixed tables are extracted in dev.
    pub fn accepts_table(&self, table_name: &str) -> bool {
        match self {
            Environment::Dev => table_name.starts_with("stg"),
            _ => true,
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // exact match, `DEV` is not dev and gets no table filter
        let env = match s {
            "" => {
                return Err(ConfigError::InvalidValue {
                    name: ENV_ENVIRONMENT.to_string(),
                    value: s.to_string(),
                    raw_error_message: "environment cannot be empty".to_string(),
                });
            }
            "dev" => Environment::Dev,
            "staging" => Environment::Staging,
            "prod" => Environment::Prod,
            other => Environment::Other(other.to_string()),
        };

        Ok(env)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => f.write_str("dev"),
            Environment::Staging => f.write_str("staging"),
            Environment::Prod => f.write_str("prod"),
            Environment::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct RedshiftConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    #[derivative(Debug = "ignore")]
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub redshift: RedshiftConfig,
    pub environment: Environment,
    pub copy_role_arn: String,
    pub data_bucket: String,
    pub local_storage_dir: PathBuf,
    pub aws_region: Option<String>,
    pub aws_credentials: Option<AwsCredentials>,
}

impl EtlConfig {
    /// Reads the process environment, a `.env` file in the working directory is loaded first.
    pub fn from_env() -> Result<EtlConfig, ConfigError> {
        dotenv::dotenv().ok();
        EtlConfig::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<EtlConfig, ConfigError> {
        let port = match optional(vars, ENV_DB_PORT) {
            Some(port) => parse_port(ENV_DB_PORT, &port)?,
            None => REDSHIFT_DEFAULT_PORT,
        };

        let environment = match optional(vars, ENV_ENVIRONMENT) {
            Some(env) => env.parse()?,
            None => Environment::default(),
        };

        let aws_credentials = match (
            optional(vars, ENV_AWS_ACCESS_KEY_ID),
            optional(vars, ENV_AWS_SECRET_ACCESS_KEY),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials::new(
                access_key_id,
                secret_access_key,
                optional(vars, ENV_AWS_SESSION_TOKEN),
            )),
            _ => None,
        };

        Ok(EtlConfig {
            redshift: RedshiftConfig {
                host: mandatory(vars, ENV_DB_HOST)?,
                port,
                dbname: mandatory(vars, ENV_DB_NAME)?,
                user: mandatory(vars, ENV_DB_USER)?,
                password: mandatory(vars, ENV_DB_PASSWORD)?,
            },
            environment,
            copy_role_arn: mandatory(vars, ENV_COPY_ROLE_ARN)?,
            data_bucket: mandatory(vars, ENV_DATA_BUCKET)?,
            local_storage_dir: optional(vars, ENV_LOCAL_STORAGE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_STORAGE_DIR)),
            aws_region: optional(vars, ENV_AWS_REGION),
            aws_credentials,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: SERVER_DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<ServerConfig, ConfigError> {
        dotenv::dotenv().ok();
        ServerConfig::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::default();

        if let Some(port) = optional(vars, ENV_SERVER_PORT) {
            config.port = parse_port(ENV_SERVER_PORT, &port)?;
        }

        if let Some(address) = optional(vars, ENV_SERVER_BIND_ADDRESS) {
            config.bind_address = address.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                name: ENV_SERVER_BIND_ADDRESS.to_string(),
                value: address.clone(),
                raw_error_message: e.to_string(),
            })?;
        }

        Ok(config)
    }
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn mandatory(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    optional(vars, name).ok_or_else(|| ConfigError::MissingVariable { name: name.to_string() })
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        raw_error_message: e.to_string(),
    })
}
