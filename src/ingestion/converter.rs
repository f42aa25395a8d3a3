use crate::config::ConverterConfig;
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("converter service returned status {status}: {body}")]
    Service { status: u16, body: String },
    #[error("invalid converter response: {0}")]
    BadResponse(String),
    #[error("text extraction failed: {0}")]
    Extract(String),
}

/// Turns a PDF into markdown. With a configured service URL the document
/// bytes go to the remote converter; without one a local plain-text
/// extractor stands in, which loses header structure but keeps the
/// pipeline usable offline.
pub struct ConverterClient {
    url: Option<String>,
    client: Client,
}

impl ConverterClient {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            url: config.url,
            client: Client::new(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    pub async fn convert_pdf(&self, path: &Path) -> Result<String, ConvertError> {
        match &self.url {
            Some(url) => self.convert_remote(url, path).await,
            None => convert_local(path).await,
        }
    }

    async fn convert_remote(&self, url: &str, path: &Path) -> Result<String, ConvertError> {
        let bytes = tokio::fs::read(path).await?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/pdf")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConvertError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = response.json().await?;
        response_json
            .get("markdown")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ConvertError::BadResponse("missing markdown field".to_string()))
    }
}

async fn convert_local(path: &Path) -> Result<String, ConvertError> {
    let path = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| ConvertError::Extract(e.to_string()))?
        .map_err(|e| ConvertError::Extract(e.to_string()))?;
    Ok(text)
}
