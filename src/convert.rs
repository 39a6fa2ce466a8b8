//! Converts curriculum sources (PDF, DOCX) into the markdown document store.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Docx,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

pub fn find_sources(dir: &Path) -> Vec<(PathBuf, SourceFormat)> {
    let mut sources: Vec<(PathBuf, SourceFormat)> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            let format = SourceFormat::from_path(&path)?;
            Some((path, format))
        })
        .collect();
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    sources
}

/// `CTDT_AI.pdf` becomes `ai.md`.
pub fn output_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let stem = stem.strip_prefix("ctdt_").unwrap_or(&stem);
    format!("{}.md", stem)
}

pub fn extract_text(path: &Path, format: SourceFormat) -> Result<String> {
    match format {
        SourceFormat::Pdf => extract_pdf(path),
        SourceFormat::Docx => extract_docx(path),
    }
}

/// Markdown body for `source`: a heading with the file name, then the text.
pub fn to_markdown(source: &Path) -> Result<String> {
    if !source.exists() {
        anyhow::bail!("Không tìm thấy file: {}", source.display());
    }
    let format = SourceFormat::from_path(source)
        .with_context(|| format!("Unsupported source format: {}", source.display()))?;

    let text = extract_text(source, format)?;
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(format!("# {}\n\n{}", name, text))
}

pub fn export(source: &Path, output: &Path) -> Result<()> {
    tracing::info!("Converting {}", source.display());
    let markdown = to_markdown(source)?;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output, markdown)
        .with_context(|| format!("Failed to write {}", output.display()))
}

fn extract_pdf(path: &Path) -> Result<String> {
    let text = pdf_extract::extract_text(path)
        .with_context(|| format!("Failed to extract PDF text: {}", path.display()))?;
    Ok(tidy(&text))
}

fn tidy(text: &str) -> String {
    let text = TRAILING_SPACE.replace_all(text, "\n");
    BLANK_RUNS.replace_all(&text, "\n\n").trim().to_string()
}

fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("No word/document.xml found in DOCX")?
        .read_to_string(&mut xml)?;

    Ok(docx_paragraphs(&xml).join("\n\n"))
}

/// Non-empty, trimmed paragraph texts of a WordprocessingML body.
pub fn docx_paragraphs(xml: &str) -> Vec<String> {
    xml.split("</w:p>")
        .map(|paragraph| decode_entities(&run_texts(paragraph)))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Concatenated `<w:t>` contents; `<w:tab/>`, `<w:tbl>` and friends share the
/// prefix, so the tag name must end right after `w:t`.
fn run_texts(xml: &str) -> String {
    let mut text = String::new();
    let mut rest = xml;

    while let Some(pos) = rest.find("<w:t") {
        let after = &rest[pos + 4..];
        if !(after.starts_with('>') || after.starts_with(' ')) {
            rest = after;
            continue;
        }
        let Some(open_end) = after.find('>') else { break };
        if after[..open_end].ends_with('/') {
            rest = &after[open_end + 1..];
            continue;
        }
        let content = &after[open_end + 1..];
        let Some(close) = content.find("</w:t>") else { break };
        text.push_str(&content[..close]);
        rest = &content[close + "</w:t>".len()..];
    }

    text
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
