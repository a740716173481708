use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;

/// Object storage as seen by the pipeline: whole objects to and from local files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads `key` from `bucket` into the local file `dest`.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> anyhow::Result<()>;

    /// Uploads the local file `src` to `key` in `bucket`.
    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    inner: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(skip(self))]
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> anyhow::Result<()> {
        let resp = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context(format!("could not get item {key} from bucket {bucket}"))?;

        let mut body = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(dest)
            .await
            .context(format!("could not create {}", dest.display()))?;
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .context("could not write object body")?;
        file.flush().await.context("could not flush object body")?;

        tracing::debug!(bytes, "object downloaded");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> anyhow::Result<()> {
        let body = ByteStream::from_path(src)
            .await
            .context(format!("could not read {}", src.display()))?;
        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .context(format!("could not put item {key} into bucket {bucket}"))?;
        Ok(())
    }
}
