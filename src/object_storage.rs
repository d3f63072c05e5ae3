use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::SdkConfig;
use std::path::Path;
use thiserror::Error;

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum ObjectStorageError {
    #[error("Invalid bucket name error for `{bucket_name}`: {raw_error_message}")]
    InvalidBucketName {
        bucket_name: String,
        raw_error_message: String,
    },
    #[error("Cannot read file `{file_path}` to upload: {raw_error_message}")]
    CannotReadFile {
        file_path: String,
        raw_error_message: String,
    },
    #[error("Cannot upload file `{file_path}` to bucket `{bucket_name}` as `{object_key}`: {raw_error_message}")]
    CannotUploadFile {
        bucket_name: String,
        object_key: String,
        file_path: String,
        raw_error_message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BucketObject {
    pub bucket_name: String,
    pub key: String,
}

impl BucketObject {
    pub fn uri(&self) -> String {
        s3_uri(&self.bucket_name, &self.key)
    }
}

pub fn s3_uri(bucket_name: &str, object_key: &str) -> String {
    format!("s3://{}/{}", bucket_name, object_key.trim_start_matches('/'))
}

pub fn is_bucket_name_valid(bucket_name: &str) -> Result<(), ObjectStorageError> {
    let invalid = |msg: &str| ObjectStorageError::InvalidBucketName {
        bucket_name: bucket_name.to_string(),
        raw_error_message: msg.to_string(),
    };

    if bucket_name.is_empty() {
        return Err(invalid("bucket name cannot be empty"));
    }

    if bucket_name.contains('/') || bucket_name.starts_with("s3://") {
        return Err(invalid("bucket name must not be an uri nor contain `/`"));
    }

    Ok(())
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(
        &self,
        bucket_name: &str,
        object_key: &str,
        file_path: &Path,
    ) -> Result<BucketObject, ObjectStorageError>;
}

#[async_trait]
impl ObjectStorage for SdkConfig {
    async fn put_object(
        &self,
        bucket_name: &str,
        object_key: &str,
        file_path: &Path,
    ) -> Result<BucketObject, ObjectStorageError> {
        is_bucket_name_valid(bucket_name)?;

        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| ObjectStorageError::CannotReadFile {
                file_path: file_path.to_string_lossy().to_string(),
                raw_error_message: e.to_string(),
            })?;

        let client = aws_sdk_s3::Client::new(self);
        client
            .put_object()
            .bucket(bucket_name)
            .key(object_key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .map_err(|e| ObjectStorageError::CannotUploadFile {
                bucket_name: bucket_name.to_string(),
                object_key: object_key.to_string(),
                file_path: file_path.to_string_lossy().to_string(),
                raw_error_message: e.to_string(),
            })?;

        info!("uploaded {:?} to {}", file_path, s3_uri(bucket_name, object_key));
        Ok(BucketObject {
            bucket_name: bucket_name.to_string(),
            key: object_key.to_string(),
        })
    }
}
