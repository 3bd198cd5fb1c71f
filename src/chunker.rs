//! Paragraph-aligned chunking of corpus documents.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Default chunk size cap, in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1000;

/// Blank-line separator between paragraphs.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

const SEPARATOR_CHARS: usize = 2;

/// Chunking tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Nominal chunk size cap in characters. A single paragraph longer than
    /// this still becomes one chunk.
    pub max_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

/// Raw corpus file read at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name used as the provenance label.
    pub name: String,
    /// Full file contents.
    pub text: String,
}

/// Labelled slice of a document, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Provenance label, e.g. `lag.txt (del 2)`.
    pub source: String,
    /// Chunk body.
    pub text: String,
}

impl Document {
    /// Builds a document from a label and its text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Splits the document, trims each chunk and labels the non-blank ones
    /// with their ordinal.
    pub fn chunks(&self, config: &ChunkerConfig) -> Vec<Chunk> {
        chunk_text(&self.text, config.max_chunk_chars)
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .enumerate()
            .map(|(idx, text)| Chunk {
                source: source_label(&self.name, idx + 1),
                text: text.to_string(),
            })
            .collect()
    }
}

/// Provenance label for the `ordinal`-th chunk (1-based) of a document.
pub fn source_label(document: &str, ordinal: usize) -> String {
    format!("{document} (del {ordinal})")
}

/// Splits `text` on blank lines and packs paragraphs into chunks of at most
/// `max_chunk_chars` characters.
///
/// Paragraphs are never broken: one longer than the cap is emitted alone.
/// Chunks are returned untrimmed, so joining them with
/// [`PARAGRAPH_SEPARATOR`] yields `text` again.
pub fn chunk_text(text: &str, max_chunk_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_chars = 0usize;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        let paragraph_chars = paragraph.chars().count();
        if !buffer.is_empty() && buffer_chars + SEPARATOR_CHARS + paragraph_chars > max_chunk_chars
        {
            flush_chunk(&mut chunks, &buffer);
            buffer.clear();
            buffer_chars = 0;
        }
        if !buffer.is_empty() {
            buffer_chars += SEPARATOR_CHARS;
        }
        buffer.push(paragraph);
        buffer_chars += paragraph_chars;
    }

    flush_chunk(&mut chunks, &buffer);
    chunks
}

fn flush_chunk(chunks: &mut Vec<String>, buffer: &[&str]) {
    if buffer.is_empty() {
        return;
    }
    chunks.push(buffer.join(PARAGRAPH_SEPARATOR));
}

/// Reads every regular, non-hidden file of a flat corpus directory in file
/// name order.
pub fn read_corpus_dir(dir: &Path) -> Result<Vec<Document>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list corpus dir {:?}", dir))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {:?}", dir))?;
        let file_type = entry.file_type()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !file_type.is_file() || name.starts_with('.') {
            continue;
        }
        paths.push((name, entry.path()));
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::with_capacity(paths.len());
    for (name, path) in paths {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read corpus file {:?}", path))?;
        documents.push(Document::new(name, text));
    }
    Ok(documents)
}
