//! Blob store backed by `object_store`.
//!
//! Supports in-memory, local filesystem and (with the `aws` feature) S3 backends.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, GetResult, ObjectStore, PutOptions,
    PutPayload,
};
use tracing::{debug, info};

use crate::blob::mime::content_type_for;
use crate::blob::{normalize_key, BlobError, BlobMetadata, BlobObject, BlobStore};
use crate::errors::DeployError;
use crate::storage::settings::BlobStoreSettings;

/// Blob store over any `ObjectStore` implementation
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    backend: String,
}

impl ObjectBlobStore {
    /// Create a blob store from settings
    pub fn from_settings(settings: &BlobStoreSettings) -> Result<Self, DeployError> {
        let store: Arc<dyn ObjectStore> = match settings.kind.as_str() {
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            "local" => {
                std::fs::create_dir_all(&settings.path).map_err(|e| {
                    DeployError::ConfigError(format!(
                        "Failed to create blob directory {}: {}",
                        settings.path, e
                    ))
                })?;
                let store = object_store::local::LocalFileSystem::new_with_prefix(&settings.path)
                    .map_err(|e| {
                        DeployError::ConfigError(format!("Failed to create local store: {}", e))
                    })?;
                Arc::new(store)
            }
            #[cfg(feature = "aws")]
            "s3" => {
                use object_store::aws::AmazonS3Builder;
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(&settings.path);
                if let Some(region) = &settings.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &settings.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                let store = builder.build().map_err(|e| {
                    DeployError::ConfigError(format!("Failed to create S3 store: {}", e))
                })?;
                Arc::new(store)
            }
            other => {
                return Err(DeployError::ConfigError(format!(
                    "Unsupported blob store kind: {}",
                    other
                )))
            }
        };

        info!("Blob store ready: {} ({})", settings.kind, settings.path);
        Ok(Self {
            store,
            backend: settings.kind.clone(),
        })
    }

    /// In-memory store, mainly for tests and ephemeral runs
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(object_store::memory::InMemory::new()), "memory")
    }

    /// Wrap a pre-configured object store
    pub fn with_store(store: Arc<dyn ObjectStore>, backend: impl Into<String>) -> Self {
        Self {
            store,
            backend: backend.into(),
        }
    }

    fn object_path(key: &str) -> Result<ObjectPath, BlobError> {
        let key = normalize_key(key)?;
        Ok(ObjectPath::from(key.as_str()))
    }

    fn metadata(key: &str, result: &GetResult) -> BlobMetadata {
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| AsRef::<str>::as_ref(value).to_string())
            .unwrap_or_else(|| content_type_for(key).to_string());

        BlobMetadata {
            key: result.meta.location.to_string(),
            size: result.meta.size as u64,
            content_type,
            last_modified: result.meta.last_modified,
        }
    }
}

fn map_error(key: &str, err: object_store::Error) -> BlobError {
    match err {
        object_store::Error::NotFound { .. } => BlobError::NotFound(key.to_string()),
        object_store::Error::PermissionDenied { .. }
        | object_store::Error::Unauthenticated { .. } => BlobError::Misconfigured(err.to_string()),
        other => BlobError::Backend(other.to_string()),
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        let path = Self::object_path(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        match self
            .store
            .put_opts(&path, PutPayload::from(bytes.clone()), options)
            .await
        {
            Ok(_) => {}
            // Backends without attribute support still take the bytes
            Err(object_store::Error::NotImplemented) => {
                debug!("{} store ignores content types, storing {} without", self.backend, key);
                self.store
                    .put(&path, PutPayload::from(bytes))
                    .await
                    .map_err(|e| map_error(key, e))?;
            }
            Err(e) => return Err(map_error(key, e)),
        }

        Ok(())
    }

    async fn head(&self, key: &str) -> Result<BlobMetadata, BlobError> {
        let path = Self::object_path(key)?;
        let options = GetOptions {
            head: true,
            ..Default::default()
        };

        let result = self
            .store
            .get_opts(&path, options)
            .await
            .map_err(|e| map_error(key, e))?;

        Ok(Self::metadata(key, &result))
    }

    async fn get(&self, key: &str) -> Result<BlobObject, BlobError> {
        let path = Self::object_path(key)?;

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| map_error(key, e))?;
        let metadata = Self::metadata(key, &result);
        let bytes = result.bytes().await.map_err(|e| map_error(key, e))?;

        Ok(BlobObject { metadata, bytes })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let prefix = Self::object_path(prefix)?;

        let metas: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| map_error(prefix.as_ref(), e))?;

        let mut keys: Vec<String> = metas.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        Ok(keys)
    }
}
