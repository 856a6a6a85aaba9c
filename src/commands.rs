use anyhow::{Context, Result};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::answer::SourceReference;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::library::DocumentLibrary;

const SNIPPET_CHARS: usize = 160;

/// Open the document library from the configured application directory
#[inline]
pub async fn open_library() -> Result<DocumentLibrary> {
    let config = Config::load_default().context("Failed to load configuration")?;
    DocumentLibrary::open(config)
        .await
        .context("Failed to open document library")
}

/// Upload a file and index its contents
#[inline]
pub async fn add_document(library: &DocumentLibrary, path: &Path) -> Result<()> {
    info!("Adding document: {}", path.display());

    let bar = spinner(&format!("Indexing {}", path.display()));
    let result = library.upload(path).await;
    bar.finish_and_clear();

    let outcome = result.with_context(|| format!("Failed to add {}", path.display()))?;

    println!(
        "Added {} (ID: {})",
        outcome.document.filename, outcome.document.id
    );
    match outcome.index_error {
        None => println!("   Indexed {} chunks", outcome.chunks_indexed),
        Some(error) => {
            println!("   ⚠️  Stored but not indexed: {}", error);
            println!("   Questions will not draw on this document until it is re-added.");
        }
    }

    Ok(())
}

/// List all uploaded documents
#[inline]
pub async fn list_documents(library: &DocumentLibrary) -> Result<()> {
    let documents = library.list().await?;

    if documents.is_empty() {
        println!("No documents have been uploaded yet.");
        println!("Use 'doc-qa add <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();

    for document in &documents {
        println!("📄 {} (ID: {})", document.filename, document.id);
        println!("   Type: {}", document.file_type);
        println!(
            "   Uploaded: {}",
            document.uploaded_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
    }

    Ok(())
}

#[inline]
pub async fn delete_document(library: &DocumentLibrary, document_id: i64) -> Result<()> {
    let bar = spinner("Rebuilding index");
    let result = library.delete(document_id).await;
    bar.finish_and_clear();

    let outcome = result?;
    println!(
        "Deleted {} (ID: {})",
        outcome.document.filename, outcome.document.id
    );
    match outcome.index_error {
        None => println!("   Removed {} chunks from the index", outcome.chunks_removed),
        Some(error) => println!("   ⚠️  Index not updated: {}", error),
    }

    Ok(())
}

/// Remove every document, asking first unless `assume_yes` is set
#[inline]
pub async fn clear_all(library: &DocumentLibrary, assume_yes: bool) -> Result<()> {
    if !assume_yes {
        let confirmed = Confirm::new()
            .with_prompt("Delete all documents and the search index? This cannot be undone.")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Nothing deleted.");
            return Ok(());
        }
    }

    let outcome = library.clear_all().await?;
    println!("✓ {} document records deleted", outcome.documents_removed);
    println!("✓ {} uploaded files deleted", outcome.files_removed);
    match outcome.index_error {
        None => println!("✓ Search index cleared"),
        Some(error) => println!("⚠️  Search index not cleared: {}", error),
    }

    Ok(())
}

#[inline]
pub async fn ask_question(library: &DocumentLibrary, question: &str) -> Result<()> {
    let bar = spinner("Thinking");
    let answer = library.ask(question).await;
    bar.finish_and_clear();

    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        print!("{}", format_sources(&answer.sources));
    }

    Ok(())
}

/// Show configuration, provider health, and index consistency
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    println!("📊 doc-qa Status Report");
    println!("{}", "=".repeat(50));
    println!();
    println!("📁 Data directory: {}", config.get_base_dir().display());
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let health = tokio::task::spawn_blocking(move || client.health_check())
                .await
                .context("Health check task failed")?;
            match health {
                Ok(()) => println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                ),
                Err(e) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
    }
    println!("   📋 Embedding model: {}", config.ollama.embedding_model);
    println!("   💬 Chat model: {}", config.ollama.chat_model);
    println!();

    let library = DocumentLibrary::open(config)
        .await
        .context("Failed to open document library")?;

    println!("🗄️  Documents: {}", library.database().count_documents().await?);

    println!("🔍 Vector Index:");
    match library.index_stats().await {
        Ok(Some(stats)) => {
            println!("   Chunks: {}", stats.chunks);
            println!("   Documents covered: {}", stats.documents);
            println!("   Dimension: {}", stats.dimension);
            if stats.legacy_chunks > 0 {
                println!("   Chunks without provenance: {}", stats.legacy_chunks);
            }
        }
        Ok(None) => println!("   No index yet"),
        Err(e) => println!("   ❌ Failed to load index - {}", e),
    }

    match library.consistency_report().await {
        Ok(report) if report.is_consistent => println!("   ✅ Consistent with document records"),
        Ok(report) => {
            if !report.orphaned_document_ids.is_empty() {
                println!(
                    "   ⚠️  Chunks for deleted documents: {:?}",
                    report.orphaned_document_ids
                );
            }
            if !report.unindexed_documents.is_empty() {
                println!(
                    "   ⚠️  Documents with nothing indexed: {:?}",
                    report.unindexed_documents
                );
            }
        }
        Err(e) => warn!("Consistency check failed: {}", e),
    }

    Ok(())
}

/// Render sources as a numbered list with a short excerpt of each chunk
#[inline]
pub fn format_sources(sources: &[SourceReference]) -> String {
    let mut out = String::from("Sources:\n");
    for (i, source) in sources.iter().enumerate() {
        let location = match (source.document_id, source.chunk_index) {
            (Some(id), Some(chunk)) => format!(" (ID: {}, chunk {})", id, chunk),
            (Some(id), None) => format!(" (ID: {})", id),
            _ => String::new(),
        };
        out.push_str(&format!("  [{}] {}{}\n", i + 1, source.filename, location));
        out.push_str(&format!("      {}\n", snippet(&source.text)));
    }
    out
}

fn snippet(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= SNIPPET_CHARS {
        return flattened;
    }
    let cut: String = flattened.chars().take(SNIPPET_CHARS).collect();
    format!("{}…", cut.trim_end())
}

fn spinner(message: &str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg} ({elapsed})")
            .expect("style template is valid"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(document_id: Option<i64>, chunk_index: Option<usize>, text: &str) -> SourceReference {
        SourceReference {
            document_id,
            filename: "sky.txt".to_string(),
            text: text.to_string(),
            chunk_index,
        }
    }

    #[test]
    fn sources_are_numbered() {
        let rendered = format_sources(&[
            source(Some(1), Some(0), "The sky is blue."),
            source(None, None, "Legacy\n\ntext."),
        ]);

        assert_eq!(
            rendered,
            "Sources:\n  [1] sky.txt (ID: 1, chunk 0)\n      The sky is blue.\n  [2] sky.txt\n      Legacy text.\n"
        );
    }

    #[test]
    fn long_snippets_are_truncated() {
        let text = "word ".repeat(100);
        let cut = snippet(&text);

        assert!(cut.ends_with('…'));
        assert!(cut.chars().count() <= SNIPPET_CHARS + 1);
    }
}
