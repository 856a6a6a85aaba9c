use super::*;
use std::path::PathBuf;
use crate::answer::{MISSING_SOURCE_PLACEHOLDER, NO_DOCUMENTS_MESSAGE};
use crate::testing::{CannedCompleter, FailingEmbedder, HashEmbedder};
use tempfile::TempDir;

async fn open_library(temp_dir: &TempDir) -> DocumentLibrary {
    DocumentLibrary::with_providers(
        Config::with_base_dir(temp_dir.path().join("home")),
        Arc::new(HashEmbedder::new()),
        Arc::new(CannedCompleter::new("Blue.")),
    )
    .await
    .expect("library should open")
}

fn write_source(temp_dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content).expect("write source file");
    path
}

#[tokio::test]
async fn upload_stores_copy_record_and_chunks() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let source = write_source(&temp_dir, "sky.txt", "The sky is blue.");

    let outcome = library.upload(&source).await.expect("upload should succeed");

    assert_eq!(outcome.document.filename, "sky.txt");
    assert_eq!(outcome.document.file_type, "text/plain");
    assert_eq!(outcome.chunks_indexed, 1);
    assert_eq!(outcome.index_error, None);

    let stored = PathBuf::from(&outcome.document.file_path);
    assert!(stored.starts_with(library.config().uploads_path()));
    assert!(stored.exists());
    assert!(source.exists());

    let listed = library.list().await.expect("list");
    assert_eq!(listed, vec![outcome.document]);
}

#[tokio::test]
async fn same_filename_twice_keeps_both_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let source = write_source(&temp_dir, "notes.md", "# Notes\n\nFirst draft.");

    let first = library.upload(&source).await.expect("first upload");
    let second = library.upload(&source).await.expect("second upload");

    assert_ne!(first.document.file_path, second.document.file_path);
    assert!(Path::new(&first.document.file_path).exists());
    assert!(Path::new(&second.document.file_path).exists());
}

#[tokio::test]
async fn unsupported_upload_is_rejected_before_copying() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let source = write_source(&temp_dir, "report.pdf", "%PDF-1.7");

    let result = library.upload(&source).await;

    assert!(matches!(result, Err(QaError::UnsupportedFileType(_))));
    assert!(library.list().await.expect("list").is_empty());
    let uploads = std::fs::read_dir(library.config().uploads_path())
        .expect("uploads dir exists")
        .count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;

    let result = library.upload(&temp_dir.path().join("absent.txt")).await;
    assert!(matches!(result, Err(QaError::NotFound(_))));
}

#[tokio::test]
async fn failed_extraction_removes_the_copy() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let source = temp_dir.path().join("binary.txt");
    std::fs::write(&source, [0xff, 0xfe, 0xfd]).expect("write source");

    let result = library.upload(&source).await;

    assert!(matches!(result, Err(QaError::Extraction(_))));
    assert!(library.list().await.expect("list").is_empty());
    let uploads = std::fs::read_dir(library.config().uploads_path())
        .expect("uploads dir exists")
        .count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn index_failure_does_not_fail_upload() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = DocumentLibrary::with_providers(
        Config::with_base_dir(temp_dir.path().join("home")),
        Arc::new(FailingEmbedder),
        Arc::new(CannedCompleter::new("unused")),
    )
    .await
    .expect("library should open");
    let source = write_source(&temp_dir, "sky.txt", "The sky is blue.");

    let outcome = library.upload(&source).await.expect("upload still succeeds");

    assert_eq!(outcome.chunks_indexed, 0);
    assert!(outcome.index_error.is_some());
    assert_eq!(library.list().await.expect("list").len(), 1);
    assert!(!library.index().has_index());
}

#[tokio::test]
async fn delete_removes_file_record_and_chunks() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let sky = library
        .upload(&write_source(&temp_dir, "sky.txt", "The sky is blue."))
        .await
        .expect("upload");
    let grass = library
        .upload(&write_source(&temp_dir, "grass.txt", "Grass is green."))
        .await
        .expect("upload");

    let outcome = library.delete(sky.document.id).await.expect("delete");

    assert_eq!(outcome.chunks_removed, 1);
    assert_eq!(outcome.index_error, None);
    assert!(!Path::new(&sky.document.file_path).exists());
    assert_eq!(library.list().await.expect("list"), vec![grass.document.clone()]);

    let answer = library.ask("What color is the sky?").await;
    assert!(
        answer
            .sources
            .iter()
            .all(|s| s.document_id != Some(sky.document.id))
    );
    assert!(
        answer
            .sources
            .iter()
            .any(|s| s.document_id == Some(grass.document.id))
    );
}

#[tokio::test]
async fn delete_unknown_document_is_not_found() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;

    assert!(matches!(
        library.delete(404).await,
        Err(QaError::NotFound(_))
    ));
}

#[tokio::test]
async fn clear_all_twice_succeeds() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    for name in ["a.txt", "b.txt"] {
        library
            .upload(&write_source(&temp_dir, name, "Some text to index."))
            .await
            .expect("upload");
    }

    let first = library.clear_all().await.expect("first clear");
    assert_eq!(first.documents_removed, 2);
    assert_eq!(first.files_removed, 2);
    assert_eq!(first.index_error, None);

    let second = library.clear_all().await.expect("second clear");
    assert_eq!(second.documents_removed, 0);
    assert_eq!(second.files_removed, 0);

    assert!(!library.index().has_index());
    assert_eq!(
        library.ask("anything?").await.text,
        NO_DOCUMENTS_MESSAGE
    );
}

#[tokio::test]
async fn blank_question_is_rejected_politely() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;

    let answer = library.ask("   ").await;
    assert_eq!(answer, Answer::message(EMPTY_QUESTION_MESSAGE));
}

#[tokio::test]
async fn ask_uses_record_store_for_missing_filenames() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let uploaded = library
        .upload(&write_source(&temp_dir, "sky.txt", "The sky is blue."))
        .await
        .expect("upload");

    let index = library
        .index()
        .load()
        .await
        .expect("load")
        .expect("index exists");
    let vectors: Vec<Vec<f32>> = index
        .chunks()
        .iter()
        .map(|c| HashEmbedder::vector_for(&c.text))
        .collect();
    let chunks = index
        .into_chunks()
        .into_iter()
        .map(|mut c| {
            if let Some(metadata) = c.metadata.as_mut() {
                metadata.filename = None;
            }
            c
        })
        .collect();
    let mut stripped = crate::index::VectorIndex::new(crate::testing::TEST_DIMENSION);
    stripped.append(vectors, chunks).expect("append");
    library.index().store().save(&stripped).expect("save");

    let answer = library.ask("sky").await;
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].filename, "sky.txt");
    assert_eq!(answer.sources[0].document_id, Some(uploaded.document.id));

    library
        .database()
        .delete_document(uploaded.document.id)
        .await
        .expect("delete record only");
    let answer = library.ask("sky").await;
    assert_eq!(answer.sources[0].filename, MISSING_SOURCE_PLACEHOLDER);
}

#[tokio::test]
async fn consistency_report_and_cleanup() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let library = open_library(&temp_dir).await;
    let uploaded = library
        .upload(&write_source(&temp_dir, "sky.txt", "The sky is blue."))
        .await
        .expect("upload");

    assert!(library.consistency_report().await.expect("report").is_consistent);

    library
        .database()
        .delete_document(uploaded.document.id)
        .await
        .expect("delete record only");
    let report = library.consistency_report().await.expect("report");
    assert_eq!(report.orphaned_document_ids, vec![uploaded.document.id]);

    assert_eq!(library.cleanup_orphans().await.expect("cleanup"), 1);
    assert!(!library.index().has_index());
    assert!(library.index_stats().await.expect("stats").is_none());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let mut config = Config::with_base_dir(temp_dir.path());
    config.retrieval.top_k = 0;

    let result = DocumentLibrary::with_providers(
        config,
        Arc::new(HashEmbedder::new()),
        Arc::new(CannedCompleter::new("")),
    )
    .await;
    assert!(matches!(result, Err(QaError::Config(_))));
}
