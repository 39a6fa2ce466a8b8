use std::path::Path;

use anyhow::Context;

use crate::config::PromptSettings;
use crate::error::AppError;
use crate::major::Major;

pub const DEFAULT_TEMPLATE: &str = r#"
Chỉ sử dụng thông tin trong phần TÀI LIỆU dưới đây để trả lời.

**YÊU CẦU NGHIÊM NGẶT**:
- **CHỈ TRẢ LỜI BẰNG TIẾNG VIỆT**
- **Dịch toàn bộ các thuật ngữ hoặc cụm từ tiếng Anh sang tiếng Việt nếu có**
- **Không được sử dụng bất kỳ từ tiếng Anh nào trong câu trả lời**
- **Trình bày ngắn gọn, rõ ràng, đúng nội dung tài liệu**
- **Không được tự bịa thêm nội dung**

Nếu không có thông tin trong tài liệu, hãy trả lời chính xác:
"Tôi không biết."

Cuối câu trả lời phải có dòng sau:
"Trích từ Chương trình đào tạo ngành {major}."

-------- TÀI LIỆU --------
{excerpt}
---------------------------

Câu hỏi: {question}
Trả lời:
"#;

/// Exact refusal the model is told to give when the excerpt has no answer.
pub const REFUSAL: &str = "Tôi không biết.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Excerpt,
    Question,
    Major,
}

impl Placeholder {
    pub const REQUIRED: [Placeholder; 3] =
        [Placeholder::Excerpt, Placeholder::Question, Placeholder::Major];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Excerpt => "{excerpt}",
            Placeholder::Question => "{question}",
            Placeholder::Major => "{major}",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, AppError> {
        let template = template.into();
        let missing: Vec<&str> = Placeholder::REQUIRED
            .iter()
            .filter(|p| !template.contains(p.token()))
            .map(|p| p.token())
            .collect();

        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "prompt template is missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self { template })
    }

    pub fn from_settings(settings: &PromptSettings) -> Result<Self, AppError> {
        if let Some(path) = &settings.template_file {
            return Self::from_file(path);
        }
        match &settings.template {
            Some(template) => Self::new(template.clone()),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt template: {}", path.display()))
            .map_err(|e| AppError::Config(format!("{:#}", e)))?;
        Self::new(template)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fills every placeholder in a single left-to-right pass. Substituted
    /// text is never scanned again, so braces inside the excerpt or the
    /// question come through verbatim.
    pub fn render(&self, excerpt: &str, question: &str, major: Major) -> String {
        let mut prompt =
            String::with_capacity(self.template.len() + excerpt.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            prompt.push_str(&rest[..pos]);
            rest = &rest[pos..];

            match Placeholder::REQUIRED
                .into_iter()
                .find(|p| rest.starts_with(p.token()))
            {
                Some(placeholder) => {
                    prompt.push_str(match placeholder {
                        Placeholder::Excerpt => excerpt,
                        Placeholder::Question => question,
                        Placeholder::Major => major.label(),
                    });
                    rest = &rest[placeholder.token().len()..];
                }
                None => {
                    prompt.push('{');
                    rest = &rest[1..];
                }
            }
        }

        prompt.push_str(rest);
        prompt
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}
