use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::AppError;

/// Academic programmes the service answers curriculum questions about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Major {
    ArtificialIntelligence,
    SoftwareEngineering,
    InformationTechnology,
}

/// Keyword groups in detection order; the first group with a hit wins.
const KEYWORDS: &[(Major, &[&str])] = &[
    (Major::ArtificialIntelligence, &["trí tuệ nhân tạo", "ai"]),
    (Major::SoftwareEngineering, &["kỹ thuật phần mềm", "ktpm"]),
    (Major::InformationTechnology, &["công nghệ thông tin", "cntt"]),
];

impl Major {
    pub const ALL: [Major; 3] = [
        Major::ArtificialIntelligence,
        Major::InformationTechnology,
        Major::SoftwareEngineering,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Major::ArtificialIntelligence => "Trí tuệ nhân tạo",
            Major::SoftwareEngineering => "Kỹ thuật phần mềm",
            Major::InformationTechnology => "Công nghệ thông tin",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Major::ArtificialIntelligence => "ai",
            Major::SoftwareEngineering => "ktpm",
            Major::InformationTechnology => "cntt",
        }
    }

    pub fn storage_dir_name(self) -> String {
        format!("storage_{}", self.code())
    }

    pub fn document_file(self) -> String {
        format!("md/{}.md", self.code())
    }
}

impl fmt::Display for Major {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Major {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Major::ALL
            .into_iter()
            .find(|m| m.label().to_lowercase() == wanted || m.code() == wanted)
            .ok_or_else(|| AppError::UnsupportedMajor(s.trim().to_string()))
    }
}

impl Serialize for Major {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Major named by the question itself, if any keyword appears in it.
pub fn detect_keyword(question: &str) -> Option<Major> {
    let lowered = question.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(major, _)| *major)
}

pub fn detect(question: &str, declared: Major) -> Major {
    detect_keyword(question).unwrap_or(declared)
}

/// Keyword hit first; only then does the declared label have to be valid.
pub fn resolve(question: &str, declared: &str) -> Result<Major, AppError> {
    match detect_keyword(question) {
        Some(major) => Ok(major),
        None => declared.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_overrides_declared() {
        assert_eq!(
            detect("Tôi học ngành AI", Major::InformationTechnology),
            Major::ArtificialIntelligence
        );
    }

    #[test]
    fn test_no_keyword_keeps_declared() {
        assert_eq!(
            detect("không có từ khóa", Major::SoftwareEngineering),
            Major::SoftwareEngineering
        );
    }

    #[test]
    fn test_detection_order() {
        let question = "So sánh công nghệ thông tin và kỹ thuật phần mềm";
        assert_eq!(detect_keyword(question), Some(Major::SoftwareEngineering));

        let question = "CNTT hay trí tuệ nhân tạo?";
        assert_eq!(detect_keyword(question), Some(Major::ArtificialIntelligence));

        assert_eq!(detect_keyword("ngành KTPM học mấy năm"), Some(Major::SoftwareEngineering));
    }

    #[test]
    fn test_parse_labels_and_codes() {
        assert_eq!("Trí tuệ nhân tạo".parse::<Major>().unwrap(), Major::ArtificialIntelligence);
        assert_eq!("  công nghệ thông tin ".parse::<Major>().unwrap(), Major::InformationTechnology);
        assert_eq!("KTPM".parse::<Major>().unwrap(), Major::SoftwareEngineering);
    }

    #[test]
    fn test_parse_unknown_label() {
        let err = "Y khoa".parse::<Major>().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMajor(ref label) if label == "Y khoa"));
    }

    #[test]
    fn test_resolve_keyword_rescues_unknown_label() {
        assert_eq!(
            resolve("môn trí tuệ nhân tạo", "Y khoa").unwrap(),
            Major::ArtificialIntelligence
        );
        assert!(matches!(
            resolve("học phí bao nhiêu", "Y khoa"),
            Err(AppError::UnsupportedMajor(_))
        ));
        assert_eq!(
            resolve("học phí bao nhiêu", "Kỹ thuật phần mềm").unwrap(),
            Major::SoftwareEngineering
        );
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&Major::InformationTechnology).unwrap();
        assert_eq!(json, "\"Công nghệ thông tin\"");
    }

    #[test]
    fn test_storage_layout() {
        assert_eq!(Major::ArtificialIntelligence.storage_dir_name(), "storage_ai");
        assert_eq!(Major::InformationTechnology.document_file(), "md/cntt.md");
    }
}
