use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::OnceCell;

use super::chunker::chunk_text;
use super::embeddings::Embedder;
use super::index::{Chunk, Document, Index};
use crate::config::CorpusSettings;
use crate::error::{AppError, Result};
use crate::major::Major;

/// Process-wide owner of one index per major. Each major has its own
/// `OnceCell`, so concurrent first requests for a major build it once while
/// other majors proceed independently. A failed build leaves the cell empty.
///
/// Builds run on a spawned task that owns the cell, so a request that is
/// abandoned (timeout, client disconnect) does not cancel a build in flight;
/// the next request for that major waits on the same build.
pub struct IndexRegistry {
    builder: Arc<IndexBuilder>,
    slots: HashMap<Major, Arc<OnceCell<Arc<Index>>>>,
}

struct IndexBuilder {
    corpus: CorpusSettings,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl IndexRegistry {
    pub fn new(corpus: CorpusSettings, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        let slots = Major::ALL
            .iter()
            .map(|m| (*m, Arc::new(OnceCell::new())))
            .collect();
        Self {
            builder: Arc::new(IndexBuilder {
                corpus,
                embedder,
                batch_size: batch_size.max(1),
            }),
            slots,
        }
    }

    pub fn is_cached(&self, major: Major) -> bool {
        self.slots.get(&major).is_some_and(|slot| slot.initialized())
    }

    pub async fn get_or_build_label(&self, label: &str) -> Result<Arc<Index>> {
        let major: Major = label.parse()?;
        self.get_or_build(major).await
    }

    pub async fn get_or_build(&self, major: Major) -> Result<Arc<Index>> {
        let slot = self
            .slots
            .get(&major)
            .ok_or_else(|| AppError::UnsupportedMajor(major.label().to_string()))?;

        if let Some(index) = slot.get() {
            tracing::info!(major = %major, "Using cached index");
            return Ok(Arc::clone(index));
        }

        let slot = Arc::clone(slot);
        let builder = Arc::clone(&self.builder);
        let task = tokio::spawn(async move {
            slot.get_or_try_init(|| builder.load_or_build(major))
                .await
                .map(Arc::clone)
        });

        task.await
            .map_err(|e| AppError::Index(anyhow::Error::new(e).context("Index build task failed")))?
    }
}

impl IndexBuilder {
    async fn load_or_build(&self, major: Major) -> Result<Arc<Index>> {
        tracing::info!(major = %major, "Initializing index");
        let storage_dir = self.corpus.storage_dir(major);

        let index = if tokio::fs::try_exists(&storage_dir).await.unwrap_or(false) {
            tracing::info!("Loading index from storage: {}", storage_dir.display());
            let dir = storage_dir.clone();
            let index = tokio::task::spawn_blocking(move || Index::load(&dir, major))
                .await
                .context("Index load task failed")??;
            if index.meta().embedding_model != self.embedder.model_name() {
                tracing::warn!(
                    "Index {} was built with embedding model {}, current model is {}",
                    storage_dir.display(),
                    index.meta().embedding_model,
                    self.embedder.model_name()
                );
            }
            index
        } else {
            let document_path = self.corpus.document_path(major);
            let index = self.build(major, &document_path).await?;
            let dir = storage_dir.clone();
            let index = tokio::task::spawn_blocking(move || index.persist(&dir).map(|_| index))
                .await
                .context("Index persist task failed")??;
            tracing::info!("Persisted index to {}", storage_dir.display());
            index
        };

        tracing::info!(
            major = %major,
            documents = index.meta().document_count,
            chunks = index.meta().chunk_count,
            "Index ready"
        );
        Ok(Arc::new(index))
    }

    async fn build(&self, major: Major, document_path: &Path) -> Result<Index> {
        if !tokio::fs::try_exists(document_path).await.unwrap_or(false) {
            return Err(AppError::DocumentNotFound(document_path.display().to_string()));
        }

        tracing::info!("Reading markdown file: {}", document_path.display());
        let text = tokio::fs::read_to_string(document_path)
            .await
            .with_context(|| format!("Failed to read {}", document_path.display()))?;

        let document = Document::from_source(document_path, text);
        let pieces = chunk_text(
            &document.text,
            self.corpus.chunk_size,
            self.corpus.chunk_overlap,
        );
        tracing::info!("Embedding {} chunks", pieces.len());

        let mut chunks = Vec::with_capacity(pieces.len());
        for batch in pieces.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(texts)
                .await
                .map_err(|e| AppError::Embedding(format!("{:#}", e)))?;

            for (piece, embedding) in batch.iter().zip(vectors) {
                chunks.push(Chunk {
                    id: format!("{}_{}", document.id, piece.chunk_index),
                    doc_id: document.id.clone(),
                    chunk_index: piece.chunk_index,
                    text: piece.text.clone(),
                    embedding,
                });
            }
        }

        Ok(Index::new(
            major,
            vec![document],
            chunks,
            self.embedder.model_name(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn write_doc(root: &Path, major: Major, text: &str) {
        let path = root.join(major.document_file());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn registry(root: &Path, embedder: Arc<KeywordEmbedder>) -> IndexRegistry {
        let mut corpus = CorpusSettings::with_root(root);
        corpus.chunk_size = 40;
        corpus.chunk_overlap = 5;
        IndexRegistry::new(corpus, embedder, 2)
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let tmp = tempfile::tempdir().unwrap();
        for major in Major::ALL {
            write_doc(tmp.path(), major, &format!("Chương trình {}: 150 tín chỉ.", major));
        }
        let embedder = Arc::new(KeywordEmbedder::default());
        let registry = registry(tmp.path(), embedder.clone());

        for major in Major::ALL {
            assert!(!registry.is_cached(major));
            let first = registry.get_or_build(major).await.unwrap();
            let calls = embedder.calls.load(Ordering::SeqCst);
            let second = registry.get_or_build(major).await.unwrap();

            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(first.major(), major);
            assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
            assert!(registry.is_cached(major));
        }
    }

    #[tokio::test]
    async fn test_abandoned_request_does_not_cancel_build() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), Major::SoftwareEngineering, "Thực tập doanh nghiệp tám tuần.");
        let embedder =
            Arc::new(KeywordEmbedder::default().with_delay(Duration::from_millis(300)));
        let registry = registry(tmp.path(), embedder.clone());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            registry.get_or_build(Major::SoftwareEngineering),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(registry.is_cached(Major::SoftwareEngineering));
        assert!(tmp.path().join("storage_ktpm").join("index_meta.json").exists());

        registry.get_or_build(Major::SoftwareEngineering).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_build_persists_then_reloads() {
        let tmp = tempfile::tempdir().unwrap();
        let text = "Mục tiêu đào tạo kỹ sư phần mềm.\n\nThời gian đào tạo bốn năm, thực tập cuối khóa.";
        write_doc(tmp.path(), Major::SoftwareEngineering, text);

        let built = registry(tmp.path(), Arc::new(KeywordEmbedder::default()))
            .get_or_build(Major::SoftwareEngineering)
            .await
            .unwrap();
        assert!(tmp.path().join("storage_ktpm").join("docstore.json").exists());
        assert!(built.chunks().len() > 1);

        // A fresh registry must load from storage even with the source gone.
        std::fs::remove_file(tmp.path().join("md/ktpm.md")).unwrap();
        let embedder = Arc::new(KeywordEmbedder::default());
        let loaded = registry(tmp.path(), embedder.clone())
            .get_or_build(Major::SoftwareEngineering)
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loaded.document_ids(), built.document_ids());
        assert_eq!(loaded.first_document().unwrap().text, text);
    }

    #[tokio::test]
    async fn test_missing_document() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path(), Arc::new(KeywordEmbedder::default()));
        let err = registry.get_or_build(Major::InformationTechnology).await.unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound(ref p) if p.ends_with("cntt.md")));
        assert!(!registry.is_cached(Major::InformationTechnology));
        assert!(!tmp.path().join("storage_cntt").exists());
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path(), Arc::new(KeywordEmbedder::default()));
        assert!(registry.get_or_build(Major::InformationTechnology).await.is_err());

        write_doc(tmp.path(), Major::InformationTechnology, "Chuẩn đầu ra CNTT.");
        assert!(registry.get_or_build(Major::InformationTechnology).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_labels_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(tmp.path(), Arc::new(KeywordEmbedder::default()));
        for label in ["Y khoa", "", "Kinh tế", "storage_ai"] {
            let err = registry.get_or_build_label(label).await.unwrap_err();
            assert!(matches!(err, AppError::UnsupportedMajor(_)));
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_build_once() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), Major::ArtificialIntelligence, "Học máy. Thị giác máy tính.");
        let embedder = Arc::new(KeywordEmbedder::default());
        let registry = Arc::new(registry(tmp.path(), embedder.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry.get_or_build(Major::ArtificialIntelligence).await.unwrap()
                })
            })
            .collect();

        let mut indexes = Vec::new();
        for handle in handles {
            indexes.push(handle.await.unwrap());
        }

        assert!(indexes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }
}
