use async_trait::async_trait;
use std::error::Error;

/// Uploads evidence and report files to content-addressed storage.
#[async_trait]
pub trait ContentPinner: Send + Sync {
    /// Pin `content` under `file_name` and return its CID.
    async fn pin_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}
