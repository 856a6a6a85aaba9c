// On-disk persistence for the vector index
// Two artifacts live side by side: a bincode vector table and a JSON chunk sidecar


use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FlatIndex, StoredChunk, VectorIndex};
use crate::{QaError, Result};

pub const VECTORS_FILE: &str = "index.vectors";
pub const METADATA_FILE: &str = "index.json";
const TMP_EXTENSION: &str = "tmp";

#[derive(Debug, Serialize, Deserialize)]
struct VectorsArtifact {
    generation: Uuid,
    index: FlatIndex,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataArtifact {
    generation: Uuid,
    dimension: usize,
    chunks: Vec<StoredChunk>,
}

/// Directory holding the single persisted index of a deployment
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    #[inline]
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// An index exists only when both artifacts are present
    #[inline]
    pub fn exists(&self) -> bool {
        self.vectors_path().is_file() && self.metadata_path().is_file()
    }

    /// Load the persisted index, or `None` when either artifact is missing.
    ///
    /// A save that stopped between its two renames is completed first. Artifacts
    /// from different saves, or whose sizes disagree, are rejected as corrupt.
    #[inline]
    pub fn load(&self) -> Result<Option<VectorIndex>> {
        self.finish_interrupted_save()?;

        if !self.exists() {
            debug!("No persisted index under {}", self.dir.display());
            return Ok(None);
        }

        let vectors = read_vectors(&self.vectors_path())?;
        let metadata = read_metadata(&self.metadata_path())?;

        if vectors.generation != metadata.generation {
            return Err(QaError::Index(format!(
                "{} and {} were written by different saves ({} vs {})",
                VECTORS_FILE, METADATA_FILE, vectors.generation, metadata.generation
            )));
        }
        if vectors.index.dimension() != metadata.dimension {
            return Err(QaError::Index(format!(
                "Dimension disagreement between artifacts: {} vs {}",
                vectors.index.dimension(),
                metadata.dimension
            )));
        }

        let index = VectorIndex::from_parts(vectors.index, metadata.chunks)?;
        debug!(
            "Loaded index generation {} with {} chunks",
            vectors.generation,
            index.len()
        );
        Ok(Some(index))
    }

    /// Persist `index`, replacing whatever was saved before.
    ///
    /// Both artifacts are fully written and synced to temporary files before either
    /// is renamed into place.
    #[inline]
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.finish_interrupted_save()?;

        let generation = Uuid::new_v4();
        let vectors = VectorsArtifact {
            generation,
            index: index.vectors().clone(),
        };
        let metadata = MetadataArtifact {
            generation,
            dimension: index.dimension(),
            chunks: index.chunks().to_vec(),
        };

        let vectors_tmp = tmp_path(&self.vectors_path());
        let metadata_tmp = tmp_path(&self.metadata_path());

        write_synced(&vectors_tmp, |writer| {
            vectors_codec()
                .serialize_into(writer, &vectors)
                .map_err(|e| QaError::Index(format!("Failed to encode vectors: {}", e)))
        })?;
        write_synced(&metadata_tmp, |writer| {
            serde_json::to_writer_pretty(writer, &metadata)
                .map_err(|e| QaError::Index(format!("Failed to encode chunk metadata: {}", e)))
        })?;

        fs::rename(&vectors_tmp, self.vectors_path())?;
        fs::rename(&metadata_tmp, self.metadata_path())?;

        info!(
            "Saved index generation {} ({} chunks) to {}",
            generation,
            index.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Complete a save that renamed its vector table but not its chunk sidecar.
    ///
    /// The pending `index.json.tmp` is only promoted when it carries the same
    /// generation as the live `index.vectors`; anything else is a leftover from a
    /// save that never renamed either artifact and is left for the next save.
    fn finish_interrupted_save(&self) -> Result<()> {
        let pending = tmp_path(&self.metadata_path());
        if !pending.is_file() || !self.vectors_path().is_file() {
            return Ok(());
        }

        let pending_generation = match read_metadata(&pending) {
            Ok(metadata) => metadata.generation,
            Err(e) => {
                debug!("Ignoring unreadable {}: {}", pending.display(), e);
                return Ok(());
            }
        };
        let live_generation = match read_vectors(&self.vectors_path()) {
            Ok(vectors) => vectors.generation,
            Err(e) => {
                debug!("Not completing interrupted save: {}", e);
                return Ok(());
            }
        };
        if pending_generation != live_generation {
            return Ok(());
        }

        match fs::rename(&pending, self.metadata_path()) {
            Ok(()) => {
                warn!(
                    "Completed interrupted save of index generation {} under {}",
                    live_generation,
                    self.dir.display()
                );
                Ok(())
            }
            // Another reader finished it first
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove both artifacts; a missing index is not an error
    #[inline]
    pub fn delete(&self) -> Result<()> {
        let mut removed = 0;
        for path in [self.vectors_path(), self.metadata_path()] {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        for stale in [tmp_path(&self.vectors_path()), tmp_path(&self.metadata_path())] {
            match fs::remove_file(&stale) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    warn!("Failed to remove stale {}: {}", stale.display(), e);
                }
                _ => {}
            }
        }

        if removed > 0 {
            info!("Deleted persisted index under {}", self.dir.display());
        } else {
            debug!("No persisted index to delete under {}", self.dir.display());
        }
        Ok(())
    }
}

/// Encoding of `index.vectors`; reads are capped at the file length so a corrupt
/// length prefix fails instead of allocating
fn vectors_codec() -> impl Options {
    bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn read_vectors(path: &Path) -> Result<VectorsArtifact> {
    let file = File::open(path)?;
    let limit = file.metadata()?.len();
    vectors_codec()
        .with_limit(limit)
        .deserialize_from(BufReader::new(file))
        .map_err(|e| QaError::Index(format!("Failed to decode {}: {}", VECTORS_FILE, e)))
}

fn read_metadata(path: &Path) -> Result<MetadataArtifact> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .map_err(|e| QaError::Index(format!("Failed to decode {}: {}", METADATA_FILE, e)))
}

/// `index.json` becomes `index.json.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TMP_EXTENSION);
    PathBuf::from(name)
}

fn write_synced<F>(path: &Path, encode: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let result = encode(&mut writer).and_then(|()| {
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    });

    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}
