use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use silo_core::error::AppError;
use silo_core::models::ObjectUri;
use silo_core::ObjectStore;
use std::path::Path;
use tracing::{debug, info};

/// Google Cloud Storage bucket used as the batch-file object store.
///
/// Credentials come from `GOOGLE_APPLICATION_CREDENTIALS`.
#[derive(Clone)]
pub struct GcsStore {
    client: Client,
    bucket: String,
}

impl GcsStore {
    /// Authenticates and returns a store for `bucket`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StorageError` if credentials cannot be loaded.
    pub async fn connect(bucket: &str) -> Result<Self, AppError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| AppError::StorageError(format!("GCS authentication failed: {}", e)))?;

        Ok(Self {
            client: Client::new(config),
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn storage_error(action: &str, name: &str, err: GcsError) -> AppError {
    AppError::StorageError(format!("{} {}: {}", action, name, err))
}

/// True if the error is a 404 answer from the storage API.
fn is_not_found(err: &GcsError) -> bool {
    matches!(err, GcsError::Response(resp) if resp.code == 404)
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put_file(&self, local: &Path, name: &str) -> Result<ObjectUri, AppError> {
        let data = tokio::fs::read(local).await?;
        let len = data.len() as u64;

        let mut media = Media::new(name.to_string());
        media.content_type = "application/json".into();
        media.content_length = Some(len);

        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            ..Default::default()
        };

        self.client
            .upload_object(&request, data, &UploadType::Simple(media))
            .await
            .map_err(|e| storage_error("uploading", name, e))?;

        let uri = ObjectUri::new(&self.bucket, name);
        info!(object = %uri, bytes = len, "Uploaded to GCS");
        Ok(uri)
    }

    async fn exists(&self, name: &str) -> Result<bool, AppError> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object: name.to_string(),
            ..Default::default()
        };

        match self.client.get_object(&request).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => {
                debug!(object = %name, "Not yet visible in GCS");
                Ok(false)
            }
            Err(e) => Err(storage_error("looking up", name, e)),
        }
    }
}
