use std::sync::Arc;

use super::embeddings::Embedder;
use super::index::Index;
use crate::config::{RetrievalMode, RetrievalSettings};
use crate::error::{AppError, Result};
use crate::llm::Generator;
use crate::major::Major;
use crate::prompt::PromptTemplate;

/// Longest prefix of `text` holding at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    template: PromptTemplate,
    retrieval: RetrievalSettings,
}

impl AnswerGenerator {
    pub fn new(
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        template: PromptTemplate,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            generator,
            embedder,
            template,
            retrieval,
        }
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub async fn answer(&self, index: &Index, question: &str, major: Major) -> Result<String> {
        tracing::info!(major = %major, "Processing question: {}", question);

        let excerpt = self.excerpt(index, question).await?;
        tracing::debug!(
            "Excerpt ({} chars): {}...",
            excerpt.chars().count(),
            truncate_chars(&excerpt, 300)
        );

        let prompt = self.template.render(&excerpt, question, major);

        tracing::info!("Sending prompt to generation backend");
        let completion = self.generator.complete(&prompt).await.map_err(|e| {
            tracing::error!("Generation backend error: {:#}", e);
            AppError::GenerationBackend(format!("{:#}", e))
        })?;

        let answer = completion.text.trim().to_string();
        tracing::info!("Received answer: {}", answer);
        Ok(answer)
    }

    /// The document text handed to the model, never longer than
    /// `excerpt_chars` characters.
    pub async fn excerpt(&self, index: &Index, question: &str) -> Result<String> {
        if index.is_empty() {
            return Err(AppError::EmptyIndex);
        }

        let selected = match self.retrieval.mode {
            RetrievalMode::Similarity if !index.chunks().is_empty() => {
                self.similar_passages(index, question).await?
            }
            _ => leading_passage(index)?,
        };

        Ok(truncate_chars(&selected, self.retrieval.excerpt_chars).to_string())
    }

    async fn similar_passages(&self, index: &Index, question: &str) -> Result<String> {
        let query = self
            .embedder
            .embed_one(question)
            .await
            .map_err(|e| AppError::Embedding(format!("{:#}", e)))?;

        let hits = index.search(&query, self.retrieval.top_k.max(1));
        for hit in &hits {
            tracing::debug!(chunk = %hit.chunk.id, score = hit.score, "Retrieved chunk");
        }

        Ok(hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn leading_passage(index: &Index) -> Result<String> {
    let document = index.first_document().ok_or(AppError::EmptyIndex)?;
    Ok(document.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::{Chunk, Document};
    use crate::testing::{KeywordEmbedder, ScriptedGenerator};
    use std::path::Path;

    fn index_with(text: &str, chunks: &[&str]) -> Index {
        let doc = Document::from_source(Path::new("md/cntt.md"), text.to_string());
        let chunks = chunks
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                id: format!("{}_{}", doc.id, i),
                doc_id: doc.id.clone(),
                chunk_index: i,
                text: t.to_string(),
                embedding: KeywordEmbedder::vector(t),
            })
            .collect();
        Index::new(Major::InformationTechnology, vec![doc], chunks, "keyword-hash")
    }

    fn answers(generator: Arc<ScriptedGenerator>, mode: RetrievalMode, top_k: usize) -> AnswerGenerator {
        AnswerGenerator::new(
            generator,
            Arc::new(KeywordEmbedder::default()),
            PromptTemplate::default(),
            RetrievalSettings {
                mode,
                top_k,
                excerpt_chars: 1500,
            },
        )
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("tín chỉ", 3), "tín");
        assert_eq!(truncate_chars("ngắn", 10), "ngắn");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn test_empty_index_skips_backend() {
        let generator = Arc::new(ScriptedGenerator::answering("không dùng"));
        let index = Index::new(Major::ArtificialIntelligence, Vec::new(), Vec::new(), "keyword-hash");

        let err = answers(generator.clone(), RetrievalMode::Similarity, 3)
            .answer(&index, "Học phí?", Major::ArtificialIntelligence)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::EmptyIndex));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_excerpt_never_exceeds_limit() {
        let long = "Chương trình đào tạo ngành Công nghệ thông tin. ".repeat(200);
        let index = index_with(&long, &[]);
        let generator = Arc::new(ScriptedGenerator::answering("ok"));

        for mode in [RetrievalMode::Leading, RetrievalMode::Similarity] {
            let excerpt = answers(generator.clone(), mode, 3)
                .excerpt(&index, "tín chỉ")
                .await
                .unwrap();
            assert_eq!(excerpt.chars().count(), 1500);
            assert!(long.starts_with(&excerpt));
        }
    }

    #[tokio::test]
    async fn test_similarity_picks_matching_chunk() {
        let index = index_with(
            "full text",
            &[
                "Mục tiêu đào tạo cử nhân",
                "Thực tập doanh nghiệp kéo dài tám tuần",
                "Điều kiện tốt nghiệp gồm chứng chỉ ngoại ngữ",
            ],
        );
        let generator = Arc::new(ScriptedGenerator::answering("ok"));

        let excerpt = answers(generator, RetrievalMode::Similarity, 1)
            .excerpt(&index, "thực tập kéo dài bao lâu")
            .await
            .unwrap();
        assert_eq!(excerpt, "Thực tập doanh nghiệp kéo dài tám tuần");
    }

    #[tokio::test]
    async fn test_answer_renders_prompt_and_trims() {
        let index = index_with("Tổng số tín chỉ toàn khóa: 150", &[]);
        let generator = Arc::new(ScriptedGenerator::answering(
            "  150 tín chỉ.\nTrích từ Chương trình đào tạo ngành Công nghệ thông tin.  ",
        ));

        let answer = answers(generator.clone(), RetrievalMode::Leading, 3)
            .answer(&index, "Bao nhiêu tín chỉ?", Major::InformationTechnology)
            .await
            .unwrap();

        assert!(answer.starts_with("150 tín chỉ."));
        assert!(answer.ends_with("Công nghệ thông tin."));
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Tổng số tín chỉ toàn khóa: 150"));
        assert!(prompts[0].contains("Câu hỏi: Bao nhiêu tín chỉ?"));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let index = index_with("nội dung", &[]);
        let generator = Arc::new(ScriptedGenerator::failing("connection refused"));

        let err = answers(generator, RetrievalMode::Leading, 3)
            .answer(&index, "câu hỏi", Major::InformationTechnology)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationBackend(ref m) if m.contains("connection refused")));
    }
}
