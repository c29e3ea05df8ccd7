//! Result composition.
//!
//! Handlers build a [`ToolOutput`]; the dispatcher turns it into the MCP
//! `CallToolResult`. Successful outputs always carry at least one block.

use base64::Engine;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::BridgeError;

/// One unit of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    /// Rendered as pretty-printed JSON text
    Json(Value),
    Image { bytes: Vec<u8>, mime_type: String },
}

impl ContentBlock {
    fn into_content(self) -> Content {
        match self {
            ContentBlock::Text(text) => Content::text(text),
            ContentBlock::Json(value) => Content::text(
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            ),
            ContentBlock::Image { bytes, mime_type } => Content::image(
                base64::engine::general_purpose::STANDARD.encode(bytes),
                mime_type,
            ),
        }
    }
}

/// Ordered content blocks plus the error flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    blocks: Vec<ContentBlock>,
    is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![ContentBlock::Text(text.into())],
            is_error: false,
        }
    }

    /// Narrative text followed by the same data as pretty JSON.
    pub fn with_json<T: Serialize>(narrative: impl Into<String>, data: &T) -> Result<Self, BridgeError> {
        Ok(Self {
            blocks: vec![
                ContentBlock::Text(narrative.into()),
                ContentBlock::Json(serde_json::to_value(data)?),
            ],
            is_error: false,
        })
    }

    /// List rendering: "No <noun> found." when empty, otherwise a header,
    /// one line per item, and the JSON view.
    pub fn listing<T, F>(noun: &str, items: &[T], line: F) -> Result<Self, BridgeError>
    where
        T: Serialize,
        F: Fn(&T) -> String,
    {
        if items.is_empty() {
            return Ok(Self::text(format!("No {} found.", noun)));
        }
        let mut narrative = format!("Found {} {}:", items.len(), noun);
        for item in items {
            narrative.push_str("\n- ");
            narrative.push_str(&line(item));
        }
        Self::with_json(narrative, &items)
    }

    /// Image block followed by its caption.
    pub fn image(bytes: Vec<u8>, mime_type: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            blocks: vec![
                ContentBlock::Image {
                    bytes,
                    mime_type: mime_type.into(),
                },
                ContentBlock::Text(caption.into()),
            ],
            is_error: false,
        }
    }

    /// Flagged result for an action the backend attempted and failed.
    pub fn failed(message: impl Into<String>, partial_output: Option<String>) -> Self {
        let mut blocks = vec![ContentBlock::Text(message.into())];
        if let Some(partial) = partial_output.filter(|p| !p.trim().is_empty()) {
            blocks.push(ContentBlock::Text(format!("Partial output:\n{}", partial)));
        }
        Self {
            blocks,
            is_error: true,
        }
    }

    pub fn push_text(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(ContentBlock::Text(text.into()));
        self
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn into_call_result(self) -> CallToolResult {
        let mut contents: Vec<Content> = self
            .blocks
            .into_iter()
            .map(ContentBlock::into_content)
            .collect();
        if contents.is_empty() {
            contents.push(Content::text("Done."));
        }
        if self.is_error {
            CallToolResult::error(contents)
        } else {
            CallToolResult::success(contents)
        }
    }
}

/// A request-scoped temporary file, removed when dropped.
///
/// Used to bridge binary results the backend writes to disk into memory.
/// Dropping happens on every exit path, including early `?` returns.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub async fn new(dir: &Path, prefix: &str, suffix: &str) -> Result<Self, BridgeError> {
        tokio::fs::create_dir_all(dir).await?;
        let (dir, prefix, suffix) = (dir.to_path_buf(), prefix.to_string(), suffix.to_string());
        let path = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .tempfile_in(&dir)
                .map(|file| file.into_temp_path())
        })
        .await
        .map_err(|e| BridgeError::backend("scratch file", e.to_string()))??;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }
}
