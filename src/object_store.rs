use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

/// Object store client for generated QR images
pub struct ObjectStore {
    client: S3Client,
    bucket: String,
    key_prefix: String,
    public_base_url: Option<String>,
}

impl ObjectStore {
    /// Create a new object store client
    pub async fn new(config: &StorageConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack/GCS interop
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "Object store client initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.trim_end_matches('/').to_string(),
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Generate an object key for a new image
    /// Format: `{prefix}/{YYYYMMDD_HHMMSS}_{8 hex chars}.png`
    ///
    /// The timestamp keeps keys sortable; the UUID-derived suffix keeps keys
    /// generated within the same second distinct.
    pub fn generate_object_key(&self, now: DateTime<Utc>) -> String {
        let timestamp = now.format("%Y%m%d_%H%M%S");
        let unique_id = Uuid::new_v4().simple().to_string();

        format!("{}/{}_{}.png", self.key_prefix, timestamp, &unique_id[..8])
    }

    /// Upload PNG bytes under the given key
    #[instrument(skip(self, bytes), fields(key = %key, size_bytes = bytes.len()))]
    pub async fn upload_png(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("image/png")
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("upload of '{key}' failed: {e}")))?;

        debug!(key = %key, "Image uploaded");
        Ok(())
    }

    /// Fetch stored object bytes for the given key
    ///
    /// A missing key maps to [`AppError::NotFound`]; any other failure to
    /// [`AppError::StoreUnavailable`].
    #[instrument(skip(self), fields(key = %key))]
    pub async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false)
                {
                    AppError::NotFound(format!("object '{key}'"))
                } else {
                    AppError::StoreUnavailable(format!("fetch of '{key}' failed: {e}"))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("read of '{key}' failed: {e}")))?;

        debug!(key = %key, "Image fetched");
        Ok(data.into_bytes().to_vec())
    }

    /// Resolve the browser-facing URL for a stored key
    ///
    /// With a public base URL configured, rows link straight to the bucket;
    /// otherwise they go through the internal proxy route.
    pub fn display_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => {
                let name = key
                    .strip_prefix(&format!("{}/", self.key_prefix))
                    .unwrap_or(key);
                format!("/get_qr/{}", name)
            }
        }
    }

    /// Get the key prefix
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config() -> StorageConfig {
        StorageConfig {
            bucket: "test-bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            key_prefix: "qr_codes".to_string(),
            public_base_url: None,
        }
    }

    #[tokio::test]
    async fn test_generate_object_key_format() {
        let store = ObjectStore::new(&test_config()).await;
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();

        let key = store.generate_object_key(now);

        let name = key.strip_prefix("qr_codes/20240115_103045_").unwrap();
        let suffix = name.strip_suffix(".png").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_keys_in_same_second_are_distinct() {
        let store = ObjectStore::new(&test_config()).await;
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();

        let first = store.generate_object_key(now);
        let second = store.generate_object_key(now);

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_display_url_uses_proxy_route_by_default() {
        let store = ObjectStore::new(&test_config()).await;

        assert_eq!(
            store.display_url("qr_codes/20240115_103045_ab12cd34.png"),
            "/get_qr/20240115_103045_ab12cd34.png"
        );
    }

    #[tokio::test]
    async fn test_display_url_uses_public_base_when_configured() {
        let mut config = test_config();
        config.public_base_url = Some("https://cdn.example.com/".to_string());
        let store = ObjectStore::new(&config).await;

        assert_eq!(
            store.display_url("qr_codes/20240115_103045_ab12cd34.png"),
            "https://cdn.example.com/qr_codes/20240115_103045_ab12cd34.png"
        );
    }
}
