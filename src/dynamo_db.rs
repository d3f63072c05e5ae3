use async_trait::async_trait;
use aws_sdk_dynamodb::types::KeyType;
use aws_types::SdkConfig;
use thiserror::Error;

use crate::models::Item;

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum DynamoDbError {
    #[error("Cannot list DynamoDB tables: {raw_error_message}")]
    CannotListTables { raw_error_message: String },
    #[error("Cannot describe DynamoDB table `{table_name}`: {raw_error_message}")]
    CannotDescribeTable {
        table_name: String,
        raw_error_message: String,
    },
    #[error("DynamoDB table `{table_name}` has no HASH key in its key schema.")]
    MissingHashKey { table_name: String },
    #[error("Cannot scan DynamoDB table `{table_name}`: {raw_error_message}")]
    CannotScanTable {
        table_name: String,
        raw_error_message: String,
    },
}

/// One page of a scan, `last_evaluated_key` is set while pages remain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

#[async_trait]
pub trait DynamoDbService: Send + Sync {
    /// One page of table names, starting after `exclusive_start_table_name`.
    async fn list_tables_page(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), DynamoDbError>;

    async fn hash_key(&self, table_name: &str) -> Result<String, DynamoDbError>;

    async fn scan_page(&self, table_name: &str, exclusive_start_key: Option<Item>) -> Result<ScanPage, DynamoDbError>;

    /// Every table of the account in the configured region.
    async fn list_tables(&self) -> Result<Vec<String>, DynamoDbError> {
        let mut tables = Vec::new();
        let mut start_table_name = None;

        loop {
            let (names, last_evaluated_table_name) = self.list_tables_page(start_table_name).await?;
            tables.extend(names);

            match last_evaluated_table_name {
                Some(name) => start_table_name = Some(name),
                None => break,
            }
        }

        Ok(tables)
    }

    /// Scans the whole table, following `LastEvaluatedKey` until exhaustion.
    async fn scan_all(&self, table_name: &str) -> Result<Vec<Item>, DynamoDbError> {
        let mut items = Vec::new();
        let mut start_key = None;
        let mut pages = 0;

        loop {
            let page = self.scan_page(table_name, start_key).await?;
            pages += 1;
            items.extend(page.items);

            match page.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!("scanned {} items in {} pages from table {}", items.len(), pages, table_name);
        Ok(items)
    }
}

#[async_trait]
impl DynamoDbService for SdkConfig {
    async fn list_tables_page(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), DynamoDbError> {
        let client = aws_sdk_dynamodb::Client::new(self);
        let output = client
            .list_tables()
            .set_exclusive_start_table_name(exclusive_start_table_name)
            .send()
            .await
            .map_err(|e| DynamoDbError::CannotListTables {
                raw_error_message: e.to_string(),
            })?;

        Ok((
            output.table_names().to_vec(),
            output.last_evaluated_table_name().map(str::to_string),
        ))
    }

    async fn hash_key(&self, table_name: &str) -> Result<String, DynamoDbError> {
        let client = aws_sdk_dynamodb::Client::new(self);
        let output = client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| DynamoDbError::CannotDescribeTable {
                table_name: table_name.to_string(),
                raw_error_message: e.to_string(),
            })?;

        output
            .table()
            .map(|t| t.key_schema())
            .unwrap_or_default()
            .iter()
            .find(|k| k.key_type() == &KeyType::Hash)
            .map(|k| k.attribute_name().to_string())
            .ok_or_else(|| DynamoDbError::MissingHashKey {
                table_name: table_name.to_string(),
            })
    }

    async fn scan_page(&self, table_name: &str, exclusive_start_key: Option<Item>) -> Result<ScanPage, DynamoDbError> {
        let client = aws_sdk_dynamodb::Client::new(self);
        let output = client
            .scan()
            .table_name(table_name)
            .set_exclusive_start_key(exclusive_start_key)
            .send()
            .await
            .map_err(|e| DynamoDbError::CannotScanTable {
                table_name: table_name.to_string(),
                raw_error_message: e.to_string(),
            })?;

        Ok(ScanPage {
            items: output.items().to_vec(),
            last_evaluated_key: output.last_evaluated_key().cloned(),
        })
    }
}
