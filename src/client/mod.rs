//! External analysis client
//!
//! Builds prompts, calls the model through a [`ModelBackend`], and turns the
//! reply into an [`AnalysisResult`]. Analysis never fails from the caller's
//! point of view: every failure becomes a renderable fallback. Code
//! extraction from images is the exception and surfaces [`OcrError`].

pub mod fallback;
pub mod gemini;
pub mod parser;
pub mod prompt;

use crate::types::AnalysisResult;
use crate::{log_debug, log_error, log_warn};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use fallback::FailureClass;
pub use gemini::GeminiBackend;
pub use parser::{clean_json_string, parse_analysis};
pub use prompt::{DEFAULT_MAX_DIAGRAM_NODES, OCR_PROMPT, create_analysis_prompt};

/// Errors raised while talking to the model
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("No API key configured. Set GEMINI_API_KEY or run `codeflow config --api-key <KEY>`")]
    MissingApiKey,
    #[error("Model request failed with status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Model request failed: {0}")]
    Transport(String),
    #[error("Model returned an empty reply")]
    EmptyReply,
    #[error("Failed to parse model reply ({reason}). Raw reply: {preview}")]
    MalformedResponse { reason: String, preview: String },
}

/// Errors raised while extracting code from an image
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Could not read image '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unsupported image format '{0}'. Use png, jpg, webp, gif or heic")]
    UnsupportedFormat(String),
    #[error("Could not extract code from the image: {0}")]
    Upstream(#[from] ClientError),
    #[error("No code was found in the image")]
    NoCodeFound,
}

/// Image bytes sent inline with a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Read an image file, inferring the MIME type from its extension
    pub async fn from_path(path: &Path) -> Result<Self, OcrError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let mime_type = mime_type_for_extension(&extension)
            .ok_or_else(|| OcrError::UnsupportedFormat(extension.clone()))?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|source| OcrError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data,
        })
    }
}

fn mime_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// A single text-in/text-out request to the model
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    /// Ask the provider for JSON output mode
    pub json_output: bool,
}

impl ModelRequest {
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            json_output: true,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: InlineImage) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
            json_output: false,
        }
    }
}

/// Seam between the client and a hosted model provider
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send a request and return the model's raw reply text
    async fn generate(&self, request: &ModelRequest) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: ModelBackend + ?Sized> ModelBackend for Arc<T> {
    async fn generate(&self, request: &ModelRequest) -> Result<String, ClientError> {
        (**self).generate(request).await
    }
}

/// Anything that can turn source code into an analysis.
///
/// The orchestrator depends on this rather than on [`AnalysisClient`] so the
/// request lifecycle can be driven without a model.
#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn request_analysis(&self, source: &str) -> AnalysisResult;
}

/// Client that asks the model for an analysis and never fails
pub struct AnalysisClient<B> {
    backend: B,
    max_diagram_nodes: usize,
}

impl<B: ModelBackend> AnalysisClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_diagram_nodes: DEFAULT_MAX_DIAGRAM_NODES,
        }
    }

    pub fn with_max_diagram_nodes(mut self, max_nodes: usize) -> Self {
        self.max_diagram_nodes = max_nodes.max(1);
        self
    }

    /// Analyze source code, substituting a fallback result on any failure
    pub async fn request_analysis(&self, source: &str) -> AnalysisResult {
        match self.try_request_analysis(source).await {
            Ok(result) => result,
            Err(e) => {
                let class = FailureClass::classify(&e);
                log_error!("Analysis failed ({}): {}", class, e);
                class.result()
            }
        }
    }

    async fn try_request_analysis(&self, source: &str) -> Result<AnalysisResult, ClientError> {
        let prompt = create_analysis_prompt(source, self.max_diagram_nodes);
        let reply = self.backend.generate(&ModelRequest::json(prompt)).await?;
        parse_analysis(&reply)
    }

    /// Extract source code from an image; no fallback text is synthesized
    pub async fn extract_code(&self, image: InlineImage) -> Result<String, OcrError> {
        log_debug!(
            "Extracting code from {} image ({} bytes)",
            image.mime_type,
            image.data.len()
        );
        let reply = self
            .backend
            .generate(&ModelRequest::with_image(OCR_PROMPT, image))
            .await
            .map_err(|e| {
                log_warn!("Code extraction failed: {}", e);
                OcrError::from(e)
            })?;

        let code = reply.trim();
        if code.is_empty() {
            return Err(OcrError::NoCodeFound);
        }
        Ok(code.to_string())
    }
}

#[async_trait]
impl<B: ModelBackend + 'static> Analyzer for AnalysisClient<B> {
    async fn request_analysis(&self, source: &str) -> AnalysisResult {
        AnalysisClient::request_analysis(self, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for_extension() {
        assert_eq!(mime_type_for_extension("png"), Some("image/png"));
        assert_eq!(mime_type_for_extension("jpeg"), Some("image/jpeg"));
        assert_eq!(mime_type_for_extension("bmp"), None);
    }

    #[tokio::test]
    async fn test_from_path_rejects_unknown_extension() {
        let err = InlineImage::from_path(Path::new("snippet.bmp"))
            .await
            .expect_err("bmp should be rejected");
        assert!(matches!(err, OcrError::UnsupportedFormat(ext) if ext == "bmp"));
    }

    #[tokio::test]
    async fn test_from_path_reports_missing_file() {
        let err = InlineImage::from_path(Path::new("/definitely/not/here.png"))
            .await
            .expect_err("missing file should fail");
        assert!(matches!(err, OcrError::Unreadable { .. }));
    }
}
