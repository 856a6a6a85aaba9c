// Text extraction module
// Turns uploaded plain-text formats into the raw text that gets chunked


use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::{QaError, Result};

/// File extensions accepted for upload
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "text", "log", "md", "markdown", "csv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Csv,
}

impl DocumentFormat {
    /// Detect the format from the file extension, case-insensitively
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "text" | "log" => Ok(Self::PlainText),
            "md" | "markdown" => Ok(Self::Markdown),
            "csv" => Ok(Self::Csv),
            _ => Err(QaError::UnsupportedFileType(format!(
                "{} (supported: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }

    #[inline]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Csv => "text/csv",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.content_type())
    }
}

/// Read a saved upload and return its full text
#[inline]
pub async fn process_document(path: &Path, format: DocumentFormat) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            QaError::NotFound(format!("File not found: {}", path.display()))
        } else {
            QaError::Io(e)
        }
    })?;

    let raw = String::from_utf8(bytes).map_err(|_| {
        QaError::Extraction(format!("{} is not valid UTF-8 text", path.display()))
    })?;
    let raw = raw.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(raw);

    let text = match format {
        DocumentFormat::PlainText | DocumentFormat::Csv => raw,
        DocumentFormat::Markdown => markdown_to_text(&raw),
    };

    debug!(
        "Extracted {} characters of {} from {}",
        text.chars().count(),
        format,
        path.display()
    );
    Ok(text)
}

/// Render markdown as plain text, keeping block structure as blank-line separated paragraphs
#[inline]
pub fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();
    let mut item_depth = 0_usize;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Item => {
                    end_line(&mut text);
                    item_depth += 1;
                    text.push_str(&"  ".repeat(item_depth - 1));
                    text.push_str("- ");
                }
                Tag::Paragraph | Tag::List(_) if item_depth > 0 => {}
                Tag::Paragraph | Tag::Heading { .. } | Tag::CodeBlock(_) | Tag::List(_) => {
                    end_block(&mut text);
                }
                _ => {}
            },
            Event::End(tag_end) => match tag_end {
                TagEnd::Item => {
                    item_depth = item_depth.saturating_sub(1);
                    end_line(&mut text);
                }
                TagEnd::Paragraph | TagEnd::List(_) if item_depth > 0 => {}
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock | TagEnd::List(_) => {
                    end_block(&mut text);
                }
                _ => {}
            },
            Event::Text(content) | Event::Code(content) => {
                text.push_str(&content);
            }
            Event::SoftBreak | Event::HardBreak => {
                text.push('\n');
            }
            _ => {}
        }
    }

    text.trim().to_string()
}

fn end_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Terminate the current block with a blank line
fn end_block(text: &mut String) {
    if text.is_empty() || text.ends_with("\n\n") {
        return;
    }
    if text.ends_with('\n') {
        text.push('\n');
    } else {
        text.push_str("\n\n");
    }
}
