use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ChunkingConfig;
use crate::types::Chunk;

/// Splits plain-text policy documents into overlapping chunks.
///
/// Paragraphs (blank-line separated) are the primary unit. Paragraphs shorter
/// than `min_chunk_chars` are merged forward; paragraphs longer than
/// `max_chunk_chars` are split on sentence boundaries and consecutive pieces
/// share `overlap_chars` of trailing context.
#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<(String, Vec<Chunk>)>> {
        self.process_files(data_dir, self.list_txt_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<(String, Vec<Chunk>)>> {
        let mut files = self.list_txt_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            tracing::info!(limit, "limited to first files");
        }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, root: &Path, files: Vec<PathBuf>) -> Result<Vec<(String, Vec<Chunk>)>> {
        if files.is_empty() {
            tracing::warn!("no .txt files found");
            return Ok(vec![]);
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), n = file_index + 1, total = files.len(), "processing file");
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(root, file_path);
            let chunks = self.chunk_document(&doc_id, &content);
            documents.push((doc_id, chunks));
        }
        let total: usize = documents.iter().map(|(_, c)| c.len()).sum();
        tracing::info!(files = files.len(), chunks = total, "processed documents");
        Ok(documents)
    }

    /// Chunks one document. Positions are assigned in reading order starting at 0.
    pub fn chunk_document(&self, document_id: &str, content: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        for paragraph in self.merge_small(split_paragraphs(content)) {
            let first_piece = chunks.len();
            for piece in self.split_paragraph_with_overlap(&paragraph) {
                chunks.push(Chunk::new(document_id, chunks.len(), piece));
            }
            if self.chunking_config.overlap_chars > 0 {
                for i in (first_piece + 1)..chunks.len() {
                    let prev_id = chunks[i - 1].id.clone();
                    let this_id = chunks[i].id.clone();
                    chunks[i - 1].overlap_with.insert(this_id);
                    chunks[i].overlap_with.insert(prev_id);
                }
            }
        }
        chunks
    }

    fn merge_small(&self, paragraphs: Vec<String>) -> Vec<String> {
        let min = self.chunking_config.min_chunk_chars;
        let max = self.chunking_config.max_chunk_chars;
        let mut merged: Vec<String> = Vec::new();
        let mut carry = String::new();
        for paragraph in paragraphs {
            let joined = if carry.is_empty() { paragraph } else { format!("{carry} {paragraph}") };
            if char_len(&joined) < min {
                carry = joined;
                continue;
            }
            merged.push(joined);
            carry.clear();
        }
        if !carry.is_empty() {
            match merged.last_mut() {
                Some(last) if char_len(last) + 1 + char_len(&carry) <= max => {
                    last.push(' ');
                    last.push_str(&carry);
                }
                _ => merged.push(carry),
            }
        }
        merged
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let max = self.chunking_config.max_chunk_chars;
        let overlap = self.chunking_config.overlap_chars;
        if char_len(paragraph) <= max { return vec![paragraph.to_string()]; }
        let budget = max.saturating_sub(overlap).max(1);

        let mut units = Vec::new();
        for sentence in split_sentences(paragraph) {
            if char_len(&sentence) > budget { units.extend(split_words(&sentence, budget)); } else { units.push(sentence); }
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();
        for unit in units {
            if !current.is_empty() && char_len(&current) + 1 + char_len(&unit) > budget {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() { current.push(' '); }
            current.push_str(&unit);
        }
        if !current.is_empty() { pieces.push(current); }

        let mut out = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            let tail = if i == 0 { "" } else { tail_overlap(&pieces[i - 1], overlap) };
            if tail.is_empty() { out.push(piece.clone()); } else { out.push(format!("{tail} {piece}")); }
        }
        out
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    /// Path below `root` without the extension, `/`-separated
    /// (`health/policy.txt` is `health/policy`).
    fn extract_doc_id(&self, root: &Path, file_path: &Path) -> String {
        let relative = file_path
            .strip_prefix(root)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| file_path.file_name().map_or(file_path, Path::new));
        relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(std::result::Result::ok).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}

fn char_len(s: &str) -> usize { s.chars().count() }

fn split_paragraphs(content: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() { paragraphs.push(current.join(" ")); current.clear(); }
        } else {
            current.extend(line.split_whitespace());
        }
    }
    if !current.is_empty() { paragraphs.push(current.join(" ")); }
    paragraphs
}

fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = paragraph.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            let sentence = current.trim();
            if !sentence.is_empty() { out.push(sentence.to_string()); }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() { out.push(rest.to_string()); }
    out
}

fn split_words(sentence: &str, budget: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if !current.is_empty() && char_len(&current) + 1 + char_len(word) > budget {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() { current.push(' '); }
        current.push_str(word);
    }
    if !current.is_empty() { out.push(current); }
    out
}

/// Last `overlap` characters of `text`, advanced to the next word start.
fn tail_overlap(text: &str, overlap: usize) -> &str {
    if overlap == 0 { return ""; }
    let Some((start, _)) = text.char_indices().rev().nth(overlap - 1) else { return text.trim(); };
    if start == 0 || text[..start].ends_with(char::is_whitespace) { return text[start..].trim(); }
    match text[start..].find(char::is_whitespace) {
        Some(offset) => text[start + offset..].trim(),
        None => "",
    }
}
