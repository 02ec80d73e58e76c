//! Live text of every open document.
//!
//! The store owns the text and nothing else: parse results are keyed by
//! content in the parse cache, so a text change invalidates nothing here.

use lsp_types::{Position, Range, Uri};
use std::collections::HashMap;

/// One edit of [`DocumentStore::apply_change`]: a half-open range in the
/// pre-edit text plus its replacement. `range == None` replaces the whole
/// document.
#[derive(Debug, Clone)]
pub struct ContentEdit {
    pub range: Option<Range>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<Uri, String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, uri: &Uri, text: String) {
        self.documents.insert(uri.clone(), text);
    }

    pub fn remove(&mut self, uri: &Uri) {
        self.documents.remove(uri);
    }

    pub fn is_open(&self, uri: &Uri) -> bool {
        self.documents.contains_key(uri)
    }

    /// Current text of `uri`. A document that is not open is read from the
    /// backing file; the disk read is never cached across calls.
    pub fn get_text(&self, uri: &Uri) -> Option<String> {
        if let Some(text) = self.documents.get(uri) {
            return Some(text.clone());
        }
        let path = uri.as_str().strip_prefix("file://")?;
        std::fs::read_to_string(path).ok()
    }

    /// Apply a batch of edits, all relative to the pre-edit text. Edits may
    /// arrive in any order but must not overlap. Sorting descending by start
    /// position and splicing back-to-front keeps every computed offset valid
    /// while earlier edits are applied.
    pub fn apply_change(&mut self, uri: &Uri, edits: &[ContentEdit]) {
        let Some(text) = self.documents.get_mut(uri) else {
            tracing::warn!(uri = uri.as_str(), "change for unknown document dropped");
            return;
        };

        let mut ranged: Vec<&ContentEdit> = Vec::new();
        for edit in edits {
            match edit.range {
                Some(_) => ranged.push(edit),
                None => {
                    *text = edit.text.clone();
                    ranged.clear();
                }
            }
        }

        ranged.sort_by(|a, b| {
            let ka = a.range.map(|r| (r.start.line, r.start.character));
            let kb = b.range.map(|r| (r.start.line, r.start.character));
            kb.cmp(&ka)
        });

        for edit in ranged {
            if let Some(range) = edit.range {
                let start = offset_at(text, range.start);
                let end = offset_at(text, range.end).max(start);
                text.replace_range(start..end, &edit.text);
            }
        }
    }
}

/// Byte offset of an LSP position: scan line separators to the target line,
/// then add the column (counted in characters). Positions past the end of
/// the text clamp to the end.
pub fn offset_at(text: &str, position: Position) -> usize {
    let mut remaining_lines = position.line;
    let mut line_start = 0usize;
    if remaining_lines > 0 {
        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                remaining_lines -= 1;
                if remaining_lines == 0 {
                    line_start = idx + 1;
                    break;
                }
            }
        }
        if remaining_lines > 0 {
            return text.len();
        }
    }

    let mut col = position.character;
    for (idx, ch) in text[line_start..].char_indices() {
        if col == 0 || ch == '\n' {
            return line_start + idx;
        }
        col -= 1;
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn uri(s: &str) -> Uri {
        Uri::from_str(s).unwrap()
    }

    fn edit(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> ContentEdit {
        ContentEdit {
            range: Some(Range {
                start: Position { line: sl, character: sc },
                end: Position { line: el, character: ec },
            }),
            text: text.to_string(),
        }
    }

    #[test]
    fn offsets_scan_lines_then_columns() {
        let text = "ab\ncd\n";
        assert_eq!(offset_at(text, Position { line: 0, character: 0 }), 0);
        assert_eq!(offset_at(text, Position { line: 0, character: 2 }), 2);
        assert_eq!(offset_at(text, Position { line: 1, character: 1 }), 4);
        assert_eq!(offset_at(text, Position { line: 9, character: 0 }), text.len());
    }

    #[test]
    fn batch_result_is_independent_of_input_order() {
        let original = "first line\nsecond line\n";
        let a = edit(0, 0, 0, 5, "1st");
        let b = edit(1, 7, 1, 11, "text");
        let expected = "1st line\nsecond text\n";

        for edits in [vec![a.clone(), b.clone()], vec![b, a]] {
            let mut store = DocumentStore::new();
            let u = uri("file:///confluence.lume");
            store.set_text(&u, original.to_string());
            store.apply_change(&u, &edits);
            assert_eq!(store.get_text(&u).unwrap(), expected);
        }
    }

    #[test]
    fn edits_on_the_same_line_do_not_invalidate_each_other() {
        let mut store = DocumentStore::new();
        let u = uri("file:///same-line.lume");
        store.set_text(&u, "aa bb cc\n".to_string());
        store.apply_change(&u, &[edit(0, 0, 0, 2, "XX"), edit(0, 6, 0, 8, "YY")]);
        assert_eq!(store.get_text(&u).unwrap(), "XX bb YY\n");
    }

    #[test]
    fn full_replacement_discards_pending_ranged_edits() {
        let mut store = DocumentStore::new();
        let u = uri("file:///replace.lume");
        store.set_text(&u, "old\n".to_string());
        store.apply_change(
            &u,
            &[
                edit(0, 0, 0, 3, "mid"),
                ContentEdit { range: None, text: "new\n".to_string() },
            ],
        );
        assert_eq!(store.get_text(&u).unwrap(), "new\n");
    }

    #[test]
    fn insertion_at_end_of_line() {
        let mut store = DocumentStore::new();
        let u = uri("file:///append.lume");
        store.set_text(&u, "say\n".to_string());
        store.apply_change(&u, &[edit(0, 3, 0, 3, " \"hi\"")]);
        assert_eq!(store.get_text(&u).unwrap(), "say \"hi\"\n");
    }

    #[test]
    fn unknown_document_reads_from_disk_without_caching() {
        let store = DocumentStore::new();
        let dir = std::env::temp_dir().join("lume-store-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fallback.lume");
        std::fs::write(&path, "one is\n").unwrap();
        let u = uri(&format!("file://{}", path.display()));

        assert_eq!(store.get_text(&u).unwrap(), "one is\n");
        std::fs::write(&path, "two is\n").unwrap();
        // A second read sees the new content: nothing was cached.
        assert_eq!(store.get_text(&u).unwrap(), "two is\n");
        std::fs::remove_file(&path).ok();
    }
}
