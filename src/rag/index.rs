use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::major::Major;

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const META_FILE: &str = "index_meta.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn from_source(path: &Path, text: String) -> Self {
        Self {
            id: document_id(path),
            text,
            source: path.to_string_lossy().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    pub major: String,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub document_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocStore {
    documents: BTreeMap<String, Document>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChunkStore {
    chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Searchable form of one major's curriculum. Immutable once built or loaded.
#[derive(Debug)]
pub struct Index {
    major: Major,
    documents: BTreeMap<String, Document>,
    chunks: Vec<Chunk>,
    meta: IndexMeta,
}

/// First 8 bytes of the SHA-256 of the source path, hex encoded.
pub fn document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl Index {
    pub fn new(
        major: Major,
        documents: Vec<Document>,
        chunks: Vec<Chunk>,
        embedding_model: &str,
    ) -> Self {
        let documents: BTreeMap<String, Document> =
            documents.into_iter().map(|d| (d.id.clone(), d)).collect();
        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            major: major.label().to_string(),
            embedding_model: embedding_model.to_string(),
            created_at: Utc::now(),
            document_count: documents.len(),
            chunk_count: chunks.len(),
        };

        Self {
            major,
            documents,
            chunks,
            meta,
        }
    }

    pub fn major(&self) -> Major {
        self.major
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.documents.keys().map(String::as_str).collect()
    }

    pub fn first_document(&self) -> Option<&Document> {
        self.documents.values().next()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Chunks ranked by cosine similarity to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(query, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(top_k);
        scored
    }

    /// Writes into a sibling staging directory and renames it into place, so
    /// an interrupted build never leaves a half-written `dir` behind.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let staging = staging_dir(dir);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .with_context(|| format!("Failed to clear {}", staging.display()))?;
        }
        std::fs::create_dir_all(&staging)
            .with_context(|| format!("Failed to create {}", staging.display()))?;

        let docstore = DocStore {
            documents: self.documents.clone(),
        };
        let chunk_store = ChunkStore {
            chunks: self.chunks.clone(),
        };
        write_json(&staging.join(DOCSTORE_FILE), &docstore)?;
        write_json(&staging.join(VECTOR_STORE_FILE), &chunk_store)?;
        write_json(&staging.join(META_FILE), &self.meta)?;

        std::fs::rename(&staging, dir)
            .with_context(|| format!("Failed to move index into {}", dir.display()))?;
        Ok(())
    }

    pub fn load(dir: &Path, major: Major) -> Result<Self> {
        let meta: IndexMeta = read_json(&dir.join(META_FILE))?;
        if meta.format_version != FORMAT_VERSION {
            anyhow::bail!(
                "Unsupported index format {} in {}",
                meta.format_version,
                dir.display()
            );
        }
        let docstore: DocStore = read_json(&dir.join(DOCSTORE_FILE))?;
        let chunk_store: ChunkStore = read_json(&dir.join(VECTOR_STORE_FILE))?;

        Ok(Self {
            major,
            documents: docstore.documents,
            chunks: chunk_store.chunks,
            meta,
        })
    }
}

fn staging_dir(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    dir.with_file_name(name)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec(value)?;
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("Failed to parse {}", path.display()))
}
