//! Media download and text extraction.
//!
//! Attachments are fetched with the gateway's credentials, classified by the
//! declared content type (falling back to magic bytes), and turned into text:
//! plain text is decoded directly, PDFs go through `pdftotext`, images
//! through `tesseract`. Both tools run as external commands on a temp file
//! under a timeout. Unsupported media yields empty text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use tempfile::Builder as TempFileBuilder;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::inbound::MediaItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Pdf,
    Image,
    Unsupported,
}

impl MediaKind {
    /// Classify from a MIME type, ignoring parameters such as `charset`
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("text/") {
            Self::Text
        } else if essence == "application/pdf" {
            Self::Pdf
        } else if essence.starts_with("image/") {
            Self::Image
        } else {
            Self::Unsupported
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMedia {
    pub url: String,
    pub content_type: String,
    pub kind: MediaKind,
    pub text: String,
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn extract(&self, item: &MediaItem) -> Result<ExtractedMedia>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaExtractorConfig {
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_pdftotext_bin")]
    pub pdftotext_bin: String,
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    60
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_pdftotext_bin() -> String {
    "pdftotext".to_string()
}

fn default_tesseract_bin() -> String {
    "tesseract".to_string()
}

impl Default for MediaExtractorConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            max_bytes: default_max_bytes(),
            pdftotext_bin: default_pdftotext_bin(),
            tesseract_bin: default_tesseract_bin(),
        }
    }
}

pub struct HttpMediaExtractor {
    http_client: reqwest::Client,
    credentials: Option<(String, String)>,
    config: MediaExtractorConfig,
}

impl HttpMediaExtractor {
    pub fn new(config: MediaExtractorConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            credentials: None,
            config,
        })
    }

    /// Basic-auth credentials for gateway-hosted media
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.http_client.get(url);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: format!("media download failed for {}", url),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.len() > self.config.max_bytes {
            return Err(GatewayError::MediaTooLarge {
                size: bytes.len(),
                limit: self.config.max_bytes,
            });
        }
        Ok(bytes.to_vec())
    }

    async fn run_tool(&self, program: &str, args: &[&str]) -> Result<String> {
        let timeout = Duration::from_secs(self.config.command_timeout_secs);
        let output = tokio::time::timeout(timeout, Command::new(program).args(args).output())
            .await
            .map_err(|_| {
                GatewayError::Extraction(format!(
                    "{} timed out after {}s",
                    program, self.config.command_timeout_secs
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayError::Extraction(format!(
                "{} failed (exit {}): {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn extract_with_tool(&self, data: &[u8], suffix: &str, kind: MediaKind) -> Result<String> {
        let mut tmpfile = TempFileBuilder::new().suffix(suffix).tempfile()?;
        tmpfile.write_all(data)?;
        let path = tmpfile.path().to_string_lossy().to_string();

        match kind {
            MediaKind::Pdf => {
                self.run_tool(&self.config.pdftotext_bin, &[&path, "-"])
                    .await
            }
            MediaKind::Image => {
                self.run_tool(&self.config.tesseract_bin, &[&path, "stdout"])
                    .await
            }
            MediaKind::Text | MediaKind::Unsupported => Ok(String::new()),
        }
    }
}

/// Resolve the effective content type: declared unless missing or generic
pub fn resolve_content_type(declared: &str, data: &[u8]) -> String {
    let declared = declared.trim();
    if !declared.is_empty() && declared != "application/octet-stream" {
        return declared.to_string();
    }
    infer::get(data)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[async_trait]
impl MediaExtractor for HttpMediaExtractor {
    async fn extract(&self, item: &MediaItem) -> Result<ExtractedMedia> {
        let data = self.download(&item.url).await?;
        let content_type = resolve_content_type(&item.content_type, &data);
        let kind = MediaKind::from_mime(&content_type);
        debug!(url = %item.url, content_type = %content_type, bytes = data.len(), "Downloaded media");

        let text = match kind {
            MediaKind::Text => String::from_utf8_lossy(&data).trim().to_string(),
            MediaKind::Pdf => self.extract_with_tool(&data, ".pdf", kind).await?,
            MediaKind::Image => self.extract_with_tool(&data, ".img", kind).await?,
            MediaKind::Unsupported => {
                warn!(url = %item.url, content_type = %content_type, "Unsupported media type");
                String::new()
            }
        };

        Ok(ExtractedMedia {
            url: item.url.clone(),
            content_type,
            kind,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("text/plain; charset=utf-8"), MediaKind::Text);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Pdf);
        assert_eq!(MediaKind::from_mime("IMAGE/JPEG"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("audio/ogg"), MediaKind::Unsupported);
    }

    #[test]
    fn test_declared_type_wins_over_sniffing() {
        let pdf = b"%PDF-1.7\n...";
        assert_eq!(resolve_content_type("image/png", pdf), "image/png");
        assert_eq!(resolve_content_type("", pdf), "application/pdf");
        assert_eq!(
            resolve_content_type("application/octet-stream", pdf),
            "application/pdf"
        );
    }
}
