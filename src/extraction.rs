use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Instrument;

use crate::config::Environment;
use crate::dynamo_db::{DynamoDbError, DynamoDbService};
use crate::export::{ExportError, write_csv};
use crate::models::{ModelError, transform_items};
use crate::object_storage::{ObjectStorage, ObjectStorageError, s3_uri};
use crate::redshift::{Warehouse, WarehouseError, raw_table_name};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Cannot list tables to extract: {0}")]
    CannotListTables(DynamoDbError),
    #[error(transparent)]
    DynamoDb(#[from] DynamoDbError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    ObjectStorage(#[from] ObjectStorageError),
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub environment: Environment,
    pub copy_role_arn: String,
    pub local_storage_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTable {
    pub table_name: String,
    pub warehouse_table: String,
    pub s3_path: String,
    pub rows: usize,
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub loaded: Vec<LoadedTable>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, ExtractionError)>,
}

impl ExtractionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Dumps DynamoDB tables to csv, ships them to S3 and reloads them into the warehouse.
pub struct DataExtraction<'a> {
    dynamo: &'a dyn DynamoDbService,
    storage: &'a dyn ObjectStorage,
    warehouse: &'a dyn Warehouse,
    settings: ExtractionSettings,
}

impl<'a> DataExtraction<'a> {
    pub fn new(
        dynamo: &'a dyn DynamoDbService,
        storage: &'a dyn ObjectStorage,
        warehouse: &'a dyn Warehouse,
        settings: ExtractionSettings,
    ) -> Self {
        DataExtraction {
            dynamo,
            storage,
            warehouse,
            settings,
        }
    }

    /// Key of the export in the bucket: `<staging dir name>/<table>.csv`.
    pub fn object_key(&self, table_name: &str) -> String {
        match self.settings.local_storage_dir.file_name() {
            Some(dir) => format!("{}/{}.csv", dir.to_string_lossy(), table_name),
            None => format!("{}.csv", table_name),
        }
    }

    pub async fn extract_and_load(&self, bucket_name: &str) -> Result<ExtractionReport, ExtractionError> {
        let tables = self
            .dynamo
            .list_tables()
            .await
            .map_err(ExtractionError::CannotListTables)?;
        info!("found {} tables, environment is {}", tables.len(), self.settings.environment);

        let mut report = ExtractionReport::default();
        for table_name in tables {
            if !self.settings.environment.accepts_table(&table_name) {
                debug!("skipping table {} in {} environment", table_name, self.settings.environment);
                report.skipped.push(table_name);
                continue;
            }

            let span = info_span!("table", name = table_name.as_str());
            match self.load_table(&table_name, bucket_name).instrument(span).await {
                Ok(loaded) => {
                    info!("loaded {} rows into {}", loaded.rows, loaded.warehouse_table);
                    report.loaded.push(loaded);
                }
                Err(err) => {
                    error!("error during extraction and loading of {}: {}", table_name, err);
                    report.failed.push((table_name, err));
                }
            }
        }

        info!(
            "extraction done: {} loaded, {} skipped, {} failed",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn load_table(&self, table_name: &str, bucket_name: &str) -> Result<LoadedTable, ExtractionError> {
        info!("starting {}", table_name);
        let primary_key = self.dynamo.hash_key(table_name).await?;
        let items = self.dynamo.scan_all(table_name).await?;
        let rows = transform_items(&items, &primary_key, &Utc::now())?;

        let local_path = write_csv(Path::new(&self.settings.local_storage_dir), table_name, &rows)?;

        info!("uploading {} to s3", table_name);
        let object_key = self.object_key(table_name);
        self.storage.put_object(bucket_name, &object_key, &local_path).await?;

        let s3_path = s3_uri(bucket_name, &object_key);
        let warehouse_table = raw_table_name(table_name);
        info!("copying {} to redshift", table_name);
        self.warehouse
            .copy_s3_data(&s3_path, &warehouse_table, &self.settings.copy_role_arn)
            .await?;

        Ok(LoadedTable {
            table_name: table_name.to_string(),
            warehouse_table,
            s3_path,
            rows: rows.len(),
        })
    }
}
