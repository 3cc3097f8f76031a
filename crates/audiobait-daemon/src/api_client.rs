//! The remote HTTP API: schedule/file metadata fetch and streaming
//! download, plus the "not registered" classification the downloader
//! treats as fatal.

use std::path::Path;

use audiobait_proto::error::{AudiobaitError, AudiobaitResult};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct FileDetails {
    pub file: FileDetailsInner,
    #[serde(rename = "fileSize")]
    pub file_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDetailsInner {
    pub details: FileDetailsFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDetailsFields {
    #[serde(rename = "originalName")]
    pub original_name: String,
    pub name: String,
}

#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    async fn get_schedule(&self) -> AudiobaitResult<Vec<u8>>;
    async fn get_file_details(&self, id: i64) -> AudiobaitResult<FileDetails>;
    async fn download_file(&self, id: i64, dest_path: &Path) -> AudiobaitResult<()>;
}

pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    device_group: String,
    api_key: String,
}

impl HttpApiClient {
    pub fn new(base_url: String, device_group: String, api_key: String) -> AudiobaitResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("audiobaitd/0.1")
            .build()
            .map_err(AudiobaitError::from)?;
        Ok(Self {
            client,
            base_url,
            device_group,
            api_key,
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", &self.api_key)
            .header("X-Device-Group", &self.device_group)
    }
}

/// True when the API reported the device as not registered — fatal, the
/// process exits cleanly and defers to the supervisor to retry later.
pub fn is_not_registered_error(err: &AudiobaitError) -> bool {
    matches!(err, AudiobaitError::NotRegistered)
}

#[async_trait::async_trait]
impl ApiClient for HttpApiClient {
    async fn get_schedule(&self) -> AudiobaitResult<Vec<u8>> {
        let url = format!("{}/api/v1/schedule", self.base_url);
        let resp = self.authed(self.client.get(&url)).send().await?;
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(AudiobaitError::NotRegistered);
        }
        let resp = resp.error_for_status().map_err(AudiobaitError::from)?;
        let bytes = resp.bytes().await.map_err(AudiobaitError::from)?;
        Ok(bytes.to_vec())
    }

    async fn get_file_details(&self, id: i64) -> AudiobaitResult<FileDetails> {
        let url = format!("{}/api/v1/files/{}", self.base_url, id);
        let resp = self.authed(self.client.get(&url)).send().await?;
        let resp = resp.error_for_status().map_err(AudiobaitError::from)?;
        resp.json::<FileDetails>()
            .await
            .map_err(|e| AudiobaitError::Decode(e.to_string()))
    }

    async fn download_file(&self, id: i64, dest_path: &Path) -> AudiobaitResult<()> {
        let url = format!("{}/api/v1/files/{}/download", self.base_url, id);
        let resp = self.authed(self.client.get(&url)).send().await?;
        let resp = resp.error_for_status().map_err(AudiobaitError::from)?;

        debug!(id, dest = %dest_path.display(), "streaming file download");
        let mut file = tokio::fs::File::create(dest_path).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AudiobaitError::from)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
