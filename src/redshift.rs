use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::RedshiftConfig;

pub const RAW_TABLE_PREFIX: &str = "raw_";
const RAW_TABLE_COLUMNS: &str =
    "id varchar, data varchar(max), createdAt datetime, updatedAt datetime, isDeleted boolean";

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum WarehouseError {
    #[error("Cannot connect to warehouse `{host}:{port}/{dbname}`: {raw_error_message}")]
    CannotConnect {
        host: String,
        port: u16,
        dbname: String,
        raw_error_message: String,
    },
    #[error("Invalid identifier `{identifier}`: {raw_error_message}")]
    InvalidIdentifier {
        identifier: String,
        raw_error_message: String,
    },
    #[error("Invalid literal `{literal}`: {raw_error_message}")]
    InvalidLiteral { literal: String, raw_error_message: String },
    #[error("Query on table `{table_name}` failed and was rolled back: {raw_error_message}")]
    QueryFailed {
        table_name: String,
        raw_error_message: String,
    },
}

/// Name of the warehouse table a DynamoDB table is loaded into.
pub fn raw_table_name(dynamo_table_name: &str) -> String {
    format!("{}{}", RAW_TABLE_PREFIX, dynamo_table_name)
}

pub fn quote_identifier(identifier: &str) -> Result<String, WarehouseError> {
    if identifier.is_empty() || identifier.len() > 127 {
        return Err(WarehouseError::InvalidIdentifier {
            identifier: identifier.to_string(),
            raw_error_message: "identifier must be between 1 and 127 bytes".to_string(),
        });
    }

    if identifier.contains('\0') {
        return Err(WarehouseError::InvalidIdentifier {
            identifier: identifier.to_string(),
            raw_error_message: "identifier cannot contain NUL".to_string(),
        });
    }

    Ok(format!("\"{}\"", identifier.replace('"', "\"\"")))
}

pub fn quote_literal(literal: &str) -> Result<String, WarehouseError> {
    if literal.contains('\\') || literal.contains('\0') {
        return Err(WarehouseError::InvalidLiteral {
            literal: literal.to_string(),
            raw_error_message: "backslashes and NUL are not allowed".to_string(),
        });
    }

    Ok(format!("'{}'", literal.replace('\'', "''")))
}

pub fn create_table_query(table_name: &str) -> Result<String, WarehouseError> {
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(table_name)?,
        RAW_TABLE_COLUMNS
    ))
}

pub fn truncate_table_query(table_name: &str) -> Result<String, WarehouseError> {
    Ok(format!("TRUNCATE TABLE {}", quote_identifier(table_name)?))
}

pub fn copy_query(s3_path: &str, table_name: &str, role_arn: &str) -> Result<String, WarehouseError> {
    Ok(format!(
        "COPY {} FROM {} IAM_ROLE {} DELIMITER ',' IGNOREHEADER 1 CSV QUOTE AS '\"' TIMEFORMAT 'auto'",
        quote_identifier(table_name)?,
        quote_literal(s3_path)?,
        quote_literal(role_arn)?
    ))
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Runs one statement in its own transaction, rolled back on failure.
    async fn execute(&self, table_name: &str, query: &str) -> Result<(), WarehouseError>;

    async fn create_table_if_not_exists(&self, table_name: &str) -> Result<(), WarehouseError> {
        self.execute(table_name, &create_table_query(table_name)?).await
    }

    async fn truncate_table(&self, table_name: &str) -> Result<(), WarehouseError> {
        self.execute(table_name, &truncate_table_query(table_name)?).await
    }

    /// Full reload of `table_name` from a csv export.
    async fn copy_s3_data(&self, s3_path: &str, table_name: &str, role_arn: &str) -> Result<(), WarehouseError> {
        let query = copy_query(s3_path, table_name, role_arn)?;
        self.create_table_if_not_exists(table_name).await?;
        self.truncate_table(table_name).await?;
        self.execute(table_name, &query).await
    }
}

pub struct RedshiftConnector {
    connection: Mutex<PgConnection>,
}

impl RedshiftConnector {
    pub async fn connect(config: &RedshiftConfig) -> Result<RedshiftConnector, WarehouseError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password);

        let connection = PgConnection::connect_with(&options)
            .await
            .map_err(|e| WarehouseError::CannotConnect {
                host: config.host.clone(),
                port: config.port,
                dbname: config.dbname.clone(),
                raw_error_message: e.to_string(),
            })?;

        info!("connected to redshift {}:{}/{}", config.host, config.port, config.dbname);
        Ok(RedshiftConnector {
            connection: Mutex::new(connection),
        })
    }

    pub async fn close(self) {
        if let Err(e) = self.connection.into_inner().close().await {
            warn!("error while closing redshift connection: {}", e);
        }
    }
}

#[async_trait]
impl Warehouse for RedshiftConnector {
    async fn execute(&self, table_name: &str, query: &str) -> Result<(), WarehouseError> {
        let query_failed = |e: sqlx::Error| WarehouseError::QueryFailed {
            table_name: table_name.to_string(),
            raw_error_message: e.to_string(),
        };

        let mut connection = self.connection.lock().await;
        let mut tx = connection.begin().await.map_err(query_failed)?;

        debug!("executing on {}: {}", table_name, query);
        match sqlx::Executor::execute(&mut *tx, query).await {
            Ok(_) => tx.commit().await.map_err(query_failed),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!("cannot rollback transaction on {}: {}", table_name, rollback_err);
                }
                Err(query_failed(e))
            }
        }
    }
}
