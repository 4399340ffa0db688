//! S3 object storage client.
//!
//! Only two operations are needed here: fetching a completed query's result
//! object and uploading staged pages. Requests go straight to the S3 REST
//! API with SigV4 signing.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::aws::{sign_request, uri_encode, AwsCredentials};
use crate::traits::ObjectStore;

pub struct S3Client {
    client: reqwest::Client,
    region: String,
    creds: AwsCredentials,
}

impl S3Client {
    pub fn new(region: impl Into<String>, creds: AwsCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            region: region.into(),
            creds,
        }
    }

    fn host(&self, bucket: &str) -> String {
        format!("{}.s3.{}.amazonaws.com", bucket, self.region)
    }

    fn encoded_key(key: &str) -> String {
        key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let host = self.host(bucket);
        let encoded_key = Self::encoded_key(key);
        let url = format!("https://{}/{}", host, encoded_key);

        let headers = sign_request(
            &self.creds,
            &self.region,
            "s3",
            "GET",
            &host,
            &format!("/{}", encoded_key),
            "",
            &[],
            b"",
        );

        let mut req = self.client.get(&url);
        for (name, value) in &headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to get s3://{}/{}", bucket, key))?;

        if !resp.status().is_success() {
            let status = resp.status();
            bail!("S3 GetObject failed (HTTP {}) for key '{}'", status, key);
        }

        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let host = self.host(bucket);
        let encoded_key = Self::encoded_key(key);
        let url = format!("https://{}/{}", host, encoded_key);

        let headers = sign_request(
            &self.creds,
            &self.region,
            "s3",
            "PUT",
            &host,
            &format!("/{}", encoded_key),
            "",
            &[],
            &body,
        );

        let mut req = self.client.put(&url).body(body);
        for (name, value) in &headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to put s3://{}/{}", bucket, key))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "S3 PutObject failed (HTTP {}) for key '{}': {}",
                status,
                key,
                body.chars().take(500).collect::<String>()
            );
        }

        Ok(())
    }
}
