//! S3 object store for pre-uploaded identification media.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;

use perch_core::{traits::ObjectStore, Error, Result};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    /// Build a store from the default AWS credential chain.
    ///
    /// `endpoint` targets S3-compatible services and switches to path-style
    /// addressing.
    pub async fn new(bucket: &str, prefix: &str, endpoint: Option<&str>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
        let client = match endpoint {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&config),
        };
        Self::new_with_client(client, bucket, prefix)
    }

    pub fn new_with_client(client: Client, bucket: &str, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn key(&self, path: &str) -> Result<String> {
        object_key(&self.prefix, path)
    }
}

/// Object key for a client-supplied path, refusing traversal.
pub fn object_key(prefix: &str, path: &str) -> Result<String> {
    let path = path.trim().trim_start_matches('/');
    if path.is_empty() || path.split('/').any(|segment| segment == "..") {
        return Err(Error::invalid_request(format!("Invalid imagePath: {}", path)));
    }
    Ok(if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix, path)
    })
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, path: &str) -> Result<Option<Bytes>> {
        let key = self.key(path)?;

        let result = self.client.get_object().bucket(&self.bucket).key(&key).send().await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| Error::storage(format!("S3 body read error: {}", e)))?
                    .into_bytes();
                Ok(Some(data))
            }
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    tracing::debug!(key = %key, "Object not found");
                    Ok(None)
                } else {
                    Err(Error::storage(format!("S3 download error: {}", e)))
                }
            }
        }
    }
}
