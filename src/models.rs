use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::major::Major;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub major: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub id: u64,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRecord {
    pub id: u64,
    pub question: String,
    pub answer: String,
    pub major: Major,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MajorInfo {
    pub label: &'static str,
    pub code: &'static str,
    pub cached: bool,
}
