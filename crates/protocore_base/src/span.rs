//! Source files and byte-offset spans.
//!
//! A [`SourceFile`] is an immutable `(path, text)` pair plus a lazily-built
//! line index. A [`Span`] is `(file, start, end)` in byte offsets; spans
//! from different files can never be merged, since "the smallest covering
//! span" is meaningless across files.
//!
//! Offsets are always 0-indexed. [`Location`] (line, column) is 1-indexed,
//! matching how editors and `protoc`-style diagnostics report positions to
//! humans.

use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

/// A handle to a file registered with a [`SourceMap`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FileId(u32);

/// The unit in which [`Location::column`] is measured.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColumnUnit {
    /// Raw UTF-8 byte offset within the line.
    Bytes,
    /// Count of Unicode scalar values (`char`s) within the line.
    Runes,
    /// Count of UTF-16 code units within the line.
    Utf16,
    /// Terminal display width: each grapheme cluster counts as its
    /// rendered column width, and tabs advance to the next multiple of
    /// [`SourceFile::TAB_STOP`].
    Width,
}

/// A human-facing `(line, column)` position, both 1-indexed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// An immutable source file: a path and its full UTF-8 text.
pub struct SourceFile {
    path: String,
    text: String,
    line_starts: OnceLock<Vec<u32>>,
}

impl SourceFile {
    pub const TAB_STOP: usize = 8;

    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        SourceFile { path: path.into(), text: text.into(), line_starts: OnceLock::new() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte offsets where each line begins, index 0 is always offset 0.
    /// Computed once on first use, per the lazy-prefix-sum design.
    fn line_starts(&self) -> &[u32] {
        self.line_starts.get_or_init(|| {
            let mut starts = vec![0u32];
            for (i, b) in self.text.bytes().enumerate() {
                if b == b'\n' {
                    starts.push((i + 1) as u32);
                }
            }
            starts
        })
    }

    /// The 0-indexed line number containing byte offset `offset`: the
    /// unique `L` such that `line_start(L) <= offset < line_start(L+1)`.
    pub fn line_by_offset(&self, offset: u32) -> u32 {
        let starts = self.line_starts();
        match starts.binary_search(&offset) {
            Ok(exact) => exact as u32,
            Err(insertion) => (insertion - 1) as u32,
        }
    }

    fn line_span_bytes(&self, line: u32) -> (u32, u32) {
        let starts = self.line_starts();
        let start = starts[line as usize];
        let end = starts.get(line as usize + 1).copied().unwrap_or(self.text.len() as u32);
        (start, end)
    }

    fn line_text(&self, line: u32) -> &str {
        let (start, end) = self.line_span_bytes(line);
        let mut end = end as usize;
        // Exclude the trailing newline from the line's own text.
        if end > start as usize && self.text.as_bytes()[end - 1] == b'\n' {
            end -= 1;
        }
        &self.text[start as usize..end]
    }

    /// Converts a byte offset into a 1-indexed `(line, column)` location,
    /// with `column` measured in `unit`.
    pub fn location(&self, offset: u32, unit: ColumnUnit) -> Location {
        let line = self.line_by_offset(offset);
        let (line_start, _) = self.line_span_bytes(line);
        let prefix = &self.text[line_start as usize..offset as usize];
        let column = match unit {
            ColumnUnit::Bytes => prefix.len() as u32,
            ColumnUnit::Runes => prefix.chars().count() as u32,
            ColumnUnit::Utf16 => prefix.chars().map(char::len_utf16).sum::<usize>() as u32,
            ColumnUnit::Width => Self::display_width(prefix) as u32,
        };
        Location { line: line + 1, column: column + 1 }
    }

    /// The terminal display width of `text`, expanding tabs to the next
    /// multiple of [`Self::TAB_STOP`] and summing grapheme cluster widths.
    fn display_width(text: &str) -> usize {
        let mut width = 0usize;
        for grapheme in text.graphemes(true) {
            if grapheme == "\t" {
                width = (width / Self::TAB_STOP + 1) * Self::TAB_STOP;
            } else {
                width += unicode_width::UnicodeWidthStr::width(grapheme);
            }
        }
        width
    }

    /// The inverse of [`Self::location`]: recovers the byte offset for a
    /// given location. Not supported for [`ColumnUnit::Width`], since
    /// display width is not invertible (wide characters and tab stops both
    /// collapse multiple byte positions onto ambiguous columns).
    pub fn inverse_location(&self, loc: Location, unit: ColumnUnit) -> Option<u32> {
        if unit == ColumnUnit::Width {
            return None;
        }
        if loc.line == 0 {
            return None;
        }
        let line = loc.line - 1;
        let starts = self.line_starts();
        if line as usize >= starts.len() {
            return None;
        }
        let line_text = self.line_text(line);
        let (line_start, _) = self.line_span_bytes(line);
        let target_col = loc.column.checked_sub(1)?;

        let mut col = 0u32;
        for (byte_idx, ch) in line_text.char_indices() {
            if col == target_col {
                return Some(line_start + byte_idx as u32);
            }
            col += match unit {
                ColumnUnit::Bytes => ch.len_utf8() as u32,
                ColumnUnit::Runes => 1,
                ColumnUnit::Utf16 => ch.len_utf16() as u32,
                ColumnUnit::Width => unreachable!(),
            };
        }
        if col == target_col {
            Some(line_start + line_text.len() as u32)
        } else {
            None
        }
    }
}

/// Owns every [`SourceFile`] registered in a compilation session and hands
/// out stable [`FileId`]s for them.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap { files: Vec::new() }
    }

    pub fn add(&mut self, file: SourceFile) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(file);
        id
    }

    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }
}

/// A contiguous byte-offset region within one [`SourceFile`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Span { file, start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn text<'a>(&self, map: &'a SourceMap) -> &'a str {
        &map.get(self.file).text()[self.start as usize..self.end as usize]
    }

    /// The span from the start of the file to the start of `self`.
    pub fn before(&self) -> Span {
        Span::new(self.file, 0, self.start)
    }

    /// The span from the end of `self` to the end of `file`.
    pub fn after(&self, map: &SourceMap) -> Span {
        let file_len = map.get(self.file).len() as u32;
        Span::new(self.file, self.end, file_len)
    }

    /// A sub-span at byte offsets `i..j` relative to `self.start`.
    pub fn range(&self, i: u32, j: u32) -> Span {
        debug_assert!(self.start + j <= self.end, "sub-span out of bounds");
        Span::new(self.file, self.start + i, self.start + j)
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// # Panics
    /// Panics in debug builds if the spans belong to different files —
    /// spans from different files may never be joined.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(self.file, other.file, "cannot merge spans from different files");
        Span { file: self.file, start: self.start.min(other.start), end: self.end.max(other.end) }
    }

    /// Fallible variant of [`Self::merge`] for callers unsure whether both
    /// spans came from the same file.
    pub fn try_merge(self, other: Span) -> Option<Span> {
        if self.file != other.file {
            return None;
        }
        Some(Span { file: self.file, start: self.start.min(other.start), end: self.end.max(other.end) })
    }

    /// Extends `self` leftward one byte at a time while `predicate` holds
    /// on the byte now at the new start.
    pub fn grow_left(&self, map: &SourceMap, predicate: impl Fn(u8) -> bool) -> Span {
        let text = map.get(self.file).text().as_bytes();
        let mut start = self.start;
        while start > 0 && predicate(text[start as usize - 1]) {
            start -= 1;
        }
        Span::new(self.file, start, self.end)
    }

    /// Extends `self` rightward one byte at a time while `predicate` holds
    /// on the byte now at the new (exclusive) end.
    pub fn grow_right(&self, map: &SourceMap, predicate: impl Fn(u8) -> bool) -> Span {
        let text = map.get(self.file).text().as_bytes();
        let mut end = self.end;
        while (end as usize) < text.len() && predicate(text[end as usize]) {
            end += 1;
        }
        Span::new(self.file, self.start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_file(text: &str) -> (SourceMap, FileId) {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("test.proto", text));
        (map, id)
    }

    #[test]
    fn span_before_text_after_reconstructs_whole_file() {
        let (map, id) = one_file("hello world");
        let span = Span::new(id, 2, 7);
        let before = span.before();
        let after = span.after(&map);
        let reconstructed = format!("{}{}{}", before.text(&map), span.text(&map), after.text(&map));
        assert_eq!(reconstructed, "hello world");
    }

    #[test]
    fn range_is_substring_of_span_text() {
        let (map, id) = one_file("abcdefgh");
        let span = Span::new(id, 1, 7); // "bcdefg"
        let sub = span.range(1, 4); // "cde"
        assert_eq!(sub.text(&map), "cde");
        assert!(span.text(&map).contains(sub.text(&map)));
    }

    #[test]
    fn line_by_offset_finds_correct_line() {
        let (_, _) = one_file("");
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "abc\ndef\nghi"));
        let file = map.get(id);
        assert_eq!(file.line_by_offset(0), 0);
        assert_eq!(file.line_by_offset(3), 0); // the '\n' itself is still line 0
        assert_eq!(file.line_by_offset(4), 1);
        assert_eq!(file.line_by_offset(8), 2);
    }

    #[test]
    fn location_is_one_indexed() {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "abc\ndef"));
        let file = map.get(id);
        assert_eq!(file.location(0, ColumnUnit::Bytes), Location { line: 1, column: 1 });
        assert_eq!(file.location(4, ColumnUnit::Bytes), Location { line: 2, column: 1 });
        assert_eq!(file.location(5, ColumnUnit::Bytes), Location { line: 2, column: 2 });
    }

    #[test]
    fn inverse_location_round_trips_bytes_and_runes() {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "foo\nbar baz\nqux"));
        let file = map.get(id);
        for offset in [0u32, 3, 4, 8, 12, 15] {
            for unit in [ColumnUnit::Bytes, ColumnUnit::Runes, ColumnUnit::Utf16] {
                let loc = file.location(offset, unit);
                assert_eq!(file.inverse_location(loc, unit), Some(offset), "unit={unit:?} offset={offset}");
            }
        }
    }

    #[test]
    fn width_unit_has_no_inverse() {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "abc"));
        let file = map.get(id);
        let loc = file.location(1, ColumnUnit::Width);
        assert_eq!(file.inverse_location(loc, ColumnUnit::Width), None);
    }

    #[test]
    fn width_unit_expands_tabs_to_tab_stop() {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "\tx"));
        let file = map.get(id);
        let loc = file.location(1, ColumnUnit::Width); // offset of 'x', after one tab
        assert_eq!(loc.column, SourceFile::TAB_STOP as u32 + 1);
    }

    #[test]
    #[should_panic(expected = "different files")]
    fn merge_panics_across_files() {
        let mut map = SourceMap::new();
        let a = map.add(SourceFile::new("a", "hello"));
        let b = map.add(SourceFile::new("b", "world"));
        let span_a = Span::new(a, 0, 1);
        let span_b = Span::new(b, 0, 1);
        let _ = span_a.merge(span_b);
    }

    #[test]
    fn try_merge_across_files_is_none() {
        let mut map = SourceMap::new();
        let a = map.add(SourceFile::new("a", "hello"));
        let b = map.add(SourceFile::new("b", "world"));
        assert_eq!(Span::new(a, 0, 1).try_merge(Span::new(b, 0, 1)), None);
    }

    #[test]
    fn grow_left_and_right_respect_predicate() {
        let mut map = SourceMap::new();
        let id = map.add(SourceFile::new("t", "  hello  "));
        let file_span = Span::new(id, 2, 7); // "hello"
        let grown_left = file_span.grow_left(&map, |b| b == b' ');
        assert_eq!(grown_left.text(&map), "  hello");
        let grown_both = grown_left.grow_right(&map, |b| b == b' ');
        assert_eq!(grown_both.text(&map), "  hello  ");
    }
}
