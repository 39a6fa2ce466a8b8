use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::major::Major;
use crate::models::QuestionRecord;

#[derive(Debug, Default)]
struct LogInner {
    next_id: u64,
    records: BTreeMap<u64, QuestionRecord>,
}

/// In-memory question log. Ids count up from zero and are never handed out
/// twice, even after deletion. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct QuestionLog {
    inner: Mutex<LogInner>,
}

impl QuestionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, question: String, answer: String, major: Major) -> QuestionRecord {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let record = QuestionRecord {
            id,
            question,
            answer,
            major,
            created_at: Utc::now(),
        };
        inner.records.insert(id, record.clone());
        record
    }

    pub async fn get(&self, id: u64) -> Result<QuestionRecord> {
        self.inner
            .lock()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Không tìm thấy câu hỏi".to_string()))
    }

    pub async fn delete(&self, id: u64) -> Result<QuestionRecord> {
        self.inner
            .lock()
            .await
            .records
            .remove(&id)
            .ok_or_else(|| AppError::NotFound("Không tìm thấy để xoá".to_string()))
    }

    pub async fn list(&self) -> Vec<QuestionRecord> {
        self.inner.lock().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}
