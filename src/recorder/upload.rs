//! Multipart upload of recorded artifacts

use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use std::sync::Arc;

use super::artifact::Artifact;
use super::error::UploadError;

/// Multipart field the backend reads the recording from
pub const AUDIO_FIELD: &str = "audio";

const CHUNK_SIZE: usize = 16 * 1024;

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn new(sent: u64, total: u64) -> Self {
        Self { sent, total }
    }

    /// Completion in whole percent, clamped to 0..=100
    pub fn percent_complete(&self) -> u16 {
        if self.total == 0 {
            return 100;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u16
    }
}

/// Progress callback shared with the body stream
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Sends a finished artifact somewhere
pub trait ArtifactUploader: Send + Sync {
    fn upload(
        &self,
        artifact: Artifact,
        on_progress: ProgressFn,
    ) -> BoxFuture<'static, Result<(), UploadError>>;
}

/// Posts artifacts to `{server}/upload`
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    url: String,
}

impl HttpUploader {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: upload_url(base_url),
        }
    }
}

impl ArtifactUploader for HttpUploader {
    fn upload(
        &self,
        artifact: Artifact,
        on_progress: ProgressFn,
    ) -> BoxFuture<'static, Result<(), UploadError>> {
        let client = self.client.clone();
        let url = self.url.clone();

        Box::pin(async move {
            let mime = artifact.mime_type().to_string();
            let total = artifact.len() as u64;
            tracing::info!("Uploading {} bytes ({}) to {}", total, mime, url);

            on_progress(UploadProgress::new(0, total));
            let body = progress_body(artifact.into_bytes(), on_progress);

            let part = Part::stream_with_length(body, total)
                .file_name("recording.wav")
                .mime_str(&mime)
                .map_err(|e| UploadError::Transport(e.to_string()))?;

            let form = Form::new().part(AUDIO_FIELD, part);

            let response = client.post(&url).multipart(form).send().await?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                tracing::warn!("Upload rejected ({}): {}", status, detail.trim());
                return Err(UploadError::Status(status.as_u16()));
            }

            tracing::info!("Upload complete");
            Ok(())
        })
    }
}

pub fn upload_url(base_url: &str) -> String {
    format!("{}/upload", base_url.trim_end_matches('/'))
}

/// Stream the payload in chunks, reporting each chunk as it is pulled
fn progress_body(bytes: Vec<u8>, on_progress: ProgressFn) -> reqwest::Body {
    reqwest::Body::wrap_stream(progress_stream(bytes, on_progress))
}

/// Chunks of `bytes` in order; `on_progress` sees the running total per chunk
fn progress_stream(
    bytes: Vec<u8>,
    on_progress: ProgressFn,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();

    let mut sent = 0u64;
    futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        on_progress(UploadProgress::new(sent, total));
        Ok(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_complete() {
        assert_eq!(UploadProgress::new(0, 200).percent_complete(), 0);
        assert_eq!(UploadProgress::new(50, 200).percent_complete(), 25);
        assert_eq!(UploadProgress::new(200, 200).percent_complete(), 100);
        assert_eq!(UploadProgress::new(300, 200).percent_complete(), 100);
    }

    #[test]
    fn test_empty_upload_is_complete() {
        assert_eq!(UploadProgress::new(0, 0).percent_complete(), 100);
    }

    #[test]
    fn test_upload_url() {
        assert_eq!(upload_url("http://localhost:5000"), "http://localhost:5000/upload");
        assert_eq!(upload_url("http://localhost:5000/"), "http://localhost:5000/upload");
    }

    #[test]
    fn test_http_uploader_target() {
        let uploader = HttpUploader::new(reqwest::Client::new(), "http://tasks.local/");
        assert_eq!(uploader.url, "http://tasks.local/upload");
    }

    fn recorded() -> (ProgressFn, Arc<parking_lot::Mutex<Vec<UploadProgress>>>) {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Arc::new(move |p: UploadProgress| sink.lock().push(p)), seen)
    }

    #[tokio::test]
    async fn test_progress_stream_reports_each_chunk() {
        let bytes: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        let (on_progress, seen) = recorded();

        let chunks: Vec<Vec<u8>> = progress_stream(bytes.clone(), on_progress)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), bytes);
        let sent: Vec<u64> = seen.lock().iter().map(|p| p.sent).collect();
        assert_eq!(sent, [16_384, 32_768, 40_000]);
        assert!(seen.lock().iter().all(|p| p.total == 40_000));
    }

    #[tokio::test]
    async fn test_progress_stream_empty_payload() {
        let (on_progress, seen) = recorded();
        let chunks: Vec<std::io::Result<Vec<u8>>> =
            progress_stream(Vec::new(), on_progress).collect().await;

        assert!(chunks.is_empty());
        assert!(seen.lock().is_empty());
    }
}
