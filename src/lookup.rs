//! Point and range queries over the flat tables.
use std::fmt;

use crate::index::MappingIndex;
use crate::types::{Order, RawToken};

/// Identifies the table a token was read from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableRef {
    /// The table ordered by generated position.
    Generated,
    /// The inverse table of a source, ordered by original position.
    Source(u32),
}

/// A mapping read from one of the tables of an index.
pub struct Token<'a> {
    index: &'a MappingIndex,
    table: TableRef,
    pos: usize,
    raw: RawToken,
}

/// The stretch of a line a mapping covers, for drawing and hit testing.
///
/// Columns are in UTF-16 code units and refer to the text the mapping's
/// table is ordered by (generated code or the original source).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MappingRange {
    pub start_column: u32,
    /// Exclusive end: the next mapping on the line or the end of the line.
    pub end_column: u32,
    /// Length of the line, or the start column if the text is unknown.
    pub end_of_line: u32,
    /// The mapping starts past the end of its line.  Lines the text does
    /// not have count as empty.
    pub is_bad_mapping: bool,
    /// Zero width mapping at the end of a line, shown as a caret.
    pub is_last_in_line: bool,
}

impl MappingRange {
    /// Returns `true` if `column` falls on this range.  Zero width mappings
    /// only match their own column.
    pub fn contains(&self, column: u32) -> bool {
        if self.is_last_in_line {
            column == self.start_column
        } else {
            column >= self.start_column && column < self.end_column
        }
    }
}

/// Finds the mapping at or before `(line, col)` on the same line.
///
/// `data` must be ordered by the key `order` selects.  Returns the row
/// number of the first of any mappings that share the found position.
pub fn find_mapping(data: &[i32], stride: usize, order: Order, line: u32, col: u32) -> Option<usize> {
    let count = data.len() / stride;
    let target = (line as i32, col as i32);
    let key = |idx: usize| order.key(data, idx * stride);

    // first mapping that is not before the target
    let mut first = 0;
    let mut remaining = count;
    while remaining > 0 {
        let step = remaining / 2;
        let mid = first + step;
        if key(mid) < target {
            first = mid + 1;
            remaining -= step + 1;
        } else {
            remaining = step;
        }
    }

    // back up if we overshot, but never onto an earlier line
    if first > 0 && key(first - 1).0 == target.0 && (first >= count || key(first) != target) {
        first -= 1;
    }
    if first >= count || key(first).0 != target.0 || key(first).1 > target.1 {
        return None;
    }

    let found = key(first);
    while first > 0 && key(first - 1) == found {
        first -= 1;
    }
    Some(first)
}

/// Computes the range covered by the mapping at row `pos`.
///
/// `line_len` is the length of the mapping's line if the text is known.
/// Returns `None` for the second and later of several mappings at the same
/// position since the first one already covers the range.
pub fn range_of_mapping(
    data: &[i32],
    stride: usize,
    order: Order,
    pos: usize,
    line_len: Option<u32>,
) -> Option<MappingRange> {
    let count = data.len() / stride;
    if pos >= count {
        return None;
    }
    let key = |idx: usize| order.key(data, idx * stride);
    let (line, start) = key(pos);

    if pos > 0 && key(pos - 1) == (line, start) {
        return None;
    }

    let start = start as u32;
    let end_of_line = line_len.unwrap_or(start);
    let mut end = start.max(end_of_line);
    let mut is_last_in_line = false;

    let mut last = pos;
    while last + 1 < count && key(last + 1) == (line, start as i32) {
        last += 1;
    }
    if last + 1 < count && key(last + 1).0 == line {
        end = key(last + 1).1 as u32;
    } else if end == start {
        is_last_in_line = true;
    }

    Some(MappingRange {
        start_column: start,
        end_column: end,
        end_of_line: end_of_line,
        is_bad_mapping: line_len.is_some() && start > end_of_line,
        is_last_in_line: is_last_in_line,
    })
}

impl MappingIndex {
    /// Looks up the mapping for a position in the generated code.
    pub fn lookup_token(&self, line: u32, col: u32) -> Option<Token<'_>> {
        self.lookup_in(TableRef::Generated, line, col)
    }

    /// Looks up the mapping for a position in an original source.
    pub fn lookup_original(&self, src_id: u32, line: u32, col: u32) -> Option<Token<'_>> {
        self.lookup_in(TableRef::Source(src_id), line, col)
    }

    /// Looks up a position in the text the given table is ordered by.
    pub fn lookup_in(&self, table: TableRef, line: u32, col: u32) -> Option<Token<'_>> {
        let (data, stride, order) = self.table_data(table)?;
        find_mapping(data, stride.len(), order, line, col)
            .and_then(|pos| self.get_token_in(table, pos))
    }

    /// The range a token covers in the text of its own table.
    ///
    /// Tokens of another index have no range here.
    pub fn range_of(&self, token: &Token<'_>) -> Option<MappingRange> {
        if !std::ptr::eq(self, token.index) {
            return None;
        }
        let (data, stride, order) = self.table_data(token.table)?;
        if token.pos >= data.len() / stride.len() {
            return None;
        }
        let line = order.key(data, token.pos * stride.len()).0 as u32;
        let line_len = self.line_lengths(token.table).map(|lines| lines.line_len(line));
        range_of_mapping(data, stride.len(), order, token.pos, line_len)
    }

    /// Where a token leads when clicked, see `Token::counterpart`.
    pub fn counterpart(&self, token: &Token<'_>) -> Option<(TableRef, u32, u32)> {
        token.counterpart()
    }
}

impl<'a> Token<'a> {
    pub(crate) fn new(index: &'a MappingIndex, table: TableRef, pos: usize, raw: RawToken) -> Token<'a> {
        Token {
            index: index,
            table: table,
            pos: pos,
            raw: raw,
        }
    }

    /// get the destination (generated) line number
    pub fn get_dst_line(&self) -> u32 {
        self.raw.dst_line
    }

    /// get the destination (generated) column number
    pub fn get_dst_col(&self) -> u32 {
        self.raw.dst_col
    }

    /// get the destination line and column
    pub fn get_dst(&self) -> (u32, u32) {
        (self.get_dst_line(), self.get_dst_col())
    }

    /// get the source id if the mapping has an original position
    pub fn get_src_id(&self) -> Option<u32> {
        if self.raw.has_source() {
            Some(self.raw.src_id as u32)
        } else {
            None
        }
    }

    /// get the source line and column if the mapping has one
    pub fn get_src(&self) -> Option<(u32, u32)> {
        self.get_src_id()
            .map(|_| (self.raw.src_line as u32, self.raw.src_col as u32))
    }

    pub fn get_src_line(&self) -> Option<u32> {
        self.get_src().map(|(line, _)| line)
    }

    pub fn get_src_col(&self) -> Option<u32> {
        self.get_src().map(|(_, col)| col)
    }

    /// get the source name if the mapping has one
    pub fn get_source(&self) -> Option<&'a str> {
        self.get_src_id().and_then(|id| self.index.get_source(id))
    }

    pub fn get_source_contents(&self) -> Option<&'a str> {
        self.get_src_id().and_then(|id| self.index.get_source_contents(id))
    }

    /// get the name if it exists as string
    pub fn get_name(&self) -> Option<&'a str> {
        if self.raw.has_name() {
            self.index.get_name(self.raw.name_id as u32)
        } else {
            None
        }
    }

    /// returns `true` if a name exists for this token
    pub fn has_name(&self) -> bool {
        self.get_name().is_some()
    }

    /// returns `true` if the mapping points into a source
    pub fn has_source(&self) -> bool {
        self.raw.has_source()
    }

    /// Converts the token into a `(source, line, column, name)` tuple if it
    /// has an original position.
    pub fn to_tuple(&self) -> Option<(&'a str, u32, u32, Option<&'a str>)> {
        let (line, col) = self.get_src()?;
        Some((self.get_source().unwrap_or(""), line, col, self.get_name()))
    }

    /// The table this token was read from.
    pub fn get_table(&self) -> TableRef {
        self.table
    }

    /// Row of the token in its table.
    pub fn get_position(&self) -> usize {
        self.pos
    }

    /// Get the underlying raw token
    pub fn get_raw_token(&self) -> RawToken {
        self.raw
    }

    /// The position on the other side of the mapping: the original position
    /// for a generated table token and the generated position for a source
    /// table token.  Returns `(table, line, column)`.
    pub fn counterpart(&self) -> Option<(TableRef, u32, u32)> {
        match self.table {
            TableRef::Generated => self.get_src_id().map(|id| {
                (TableRef::Source(id), self.raw.src_line as u32, self.raw.src_col as u32)
            }),
            TableRef::Source(_) => Some((TableRef::Generated, self.raw.dst_line, self.raw.dst_col)),
        }
    }

    pub fn range(&self) -> Option<MappingRange> {
        self.index.range_of(self)
    }
}

impl<'a> PartialEq for Token<'a> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.index, other.index)
            && self.table == other.table
            && self.pos == other.pos
    }
}

impl<'a> fmt::Debug for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Token {}>", self)
    }
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{} -> ", self.get_dst_line(), self.get_dst_col())?;
        match self.get_src() {
            Some((line, col)) => write!(f, "{}:{}:{}",
                                        self.get_source().unwrap_or(""), line, col)?,
            None => write!(f, "-")?,
        }
        if let Some(name) = self.get_name() {
            write!(f, " name={}", name)?;
        }
        Ok(())
    }
}


#[cfg(test)]
fn index_for(mappings: &str, text: Option<&str>) -> MappingIndex {
    let json = format!(
        r#"{{"version":3,"sources":["a.js","b.js"],"sourcesContent":["one\ntwo three\n"],"names":["foo"],"mappings":"{}"}}"#,
        mappings
    );
    let index = MappingIndex::from_slice(json.as_bytes()).unwrap();
    match text {
        Some(text) => index.with_generated_source(text),
        None => index,
    }
}

#[test]
fn test_forward_lookup() {
    // line 0: col 0 and col 4; line 1: col 2
    let index = index_for("AAAA,IAAE;ECCA", None);
    assert_eq!(index.lookup_token(0, 0).unwrap().get_dst(), (0, 0));
    assert_eq!(index.lookup_token(0, 3).unwrap().get_dst(), (0, 0));
    assert_eq!(index.lookup_token(0, 4).unwrap().get_dst(), (0, 4));
    assert_eq!(index.lookup_token(0, 100).unwrap().get_dst(), (0, 4));

    // never falls back onto an earlier line
    assert!(index.lookup_token(1, 1).is_none());
    assert_eq!(index.lookup_token(1, 2).unwrap().get_src(), Some((1, 2)));
    assert!(index.lookup_token(2, 0).is_none());
}

#[test]
fn test_forward_lookup_returns_first_duplicate() {
    let index = index_for("AAAA,AACA,AACA,EAAA", None);
    let tok = index.lookup_token(0, 0).unwrap();
    assert_eq!(tok.get_position(), 0);
    assert_eq!(tok.get_src(), Some((0, 0)));
    let tok = index.lookup_token(0, 1).unwrap();
    assert_eq!(tok.get_position(), 0);

    // only the first of the duplicates has a range
    assert!(index.get_token(1).unwrap().range().is_none());
    assert!(index.get_token(2).unwrap().range().is_none());
    let range = index.get_token(0).unwrap().range().unwrap();
    assert_eq!((range.start_column, range.end_column), (0, 2));
}

#[test]
fn test_reverse_lookup() {
    // generated (0, 0) -> a.js (1, 4); generated (0, 6) -> a.js (0, 0);
    // generated (1, 0) -> a.js (1, 0)
    let index = index_for("AACI,MADJ;AACA", None);
    let tok = index.lookup_original(0, 1, 5).unwrap();
    assert_eq!(tok.get_dst(), (0, 0));
    assert_eq!(tok.get_table(), TableRef::Source(0));
    assert_eq!(index.lookup_original(0, 1, 3).unwrap().get_dst(), (1, 0));
    assert_eq!(index.lookup_original(0, 0, 9).unwrap().get_dst(), (0, 6));
    assert!(index.lookup_original(1, 0, 0).is_none());
    assert!(index.lookup_original(7, 0, 0).is_none());
    assert_eq!(
        tok.counterpart(),
        Some((TableRef::Generated, 0, 0))
    );
    assert_eq!(
        index.lookup_token(0, 0).unwrap().counterpart(),
        Some((TableRef::Source(0), 1, 4))
    );
}

#[test]
fn test_ranges_in_generated_code() {
    // line 0: "abcdef" with mappings at 0 and 3 and a stale one at 9
    let index = index_for("AAAA,GAAC,MAAC", Some("abcdef\n"));
    let first = index.get_token(0).unwrap().range().unwrap();
    assert_eq!((first.start_column, first.end_column), (0, 3));
    assert!(!first.is_bad_mapping);
    assert!(!first.is_last_in_line);

    let second = index.get_token(1).unwrap().range().unwrap();
    assert_eq!((second.start_column, second.end_column), (3, 9));
    assert!(!second.is_bad_mapping);

    let bad = index.get_token(2).unwrap().range().unwrap();
    assert_eq!((bad.start_column, bad.end_column), (9, 9));
    assert!(bad.is_bad_mapping);
    assert!(bad.is_last_in_line);
    assert_eq!(bad.end_of_line, 6);
}

#[test]
fn test_ranges_extend_to_end_of_line() {
    let index = index_for("AAAA;AAAA,MAAA", Some("x = 1;\nabcdef"));
    let range = index.get_token(0).unwrap().range().unwrap();
    assert_eq!((range.start_column, range.end_column), (0, 6));
    assert!(!range.is_last_in_line);
    assert!(range.contains(5));
    assert!(!range.contains(6));

    // a mapping at the very end of a line is a caret
    let caret = index.get_token(2).unwrap().range().unwrap();
    assert_eq!((caret.start_column, caret.end_column), (6, 6));
    assert!(caret.is_last_in_line);
    assert!(!caret.is_bad_mapping);
    assert!(caret.contains(6));
    assert!(!caret.contains(5));
}

#[test]
fn test_ranges_without_text() {
    let index = index_for("AAAA,EAAA", None);
    let range = index.get_token(1).unwrap().range().unwrap();
    assert_eq!((range.start_column, range.end_column), (2, 2));
    assert!(range.is_last_in_line);
    assert!(!range.is_bad_mapping);
}

#[test]
fn test_ranges_in_original_source() {
    // a.js is "one\ntwo three\n"; mappings into (1, 0) and (1, 4)
    let index = index_for("AACA,CAAI", None);
    let tok = index.lookup_original(0, 1, 0).unwrap();
    let range = index.range_of(&tok).unwrap();
    assert_eq!((range.start_column, range.end_column), (0, 4));
    let tok = index.lookup_original(0, 1, 6).unwrap();
    let range = tok.range().unwrap();
    assert_eq!((range.start_column, range.end_column), (4, 9));
}

#[test]
fn test_range_of_foreign_token() {
    let small = index_for("AAAA", None);
    let big = index_for("AAAA,CAAA,CAAA,CAAA,CAAA", None);
    let token = big.get_token(3).unwrap();
    assert!(small.range_of(&token).is_none());
    assert!(big.range_of(&token).is_some());

    let token = big.lookup_original(0, 0, 0).unwrap();
    assert!(small.range_of(&token).is_none());
}

#[test]
fn test_token_display() {
    let index = index_for("AAAAA,CCAA", None);
    assert_eq!(index.get_token(0).unwrap().to_string(), "0:0 -> a.js:0:0 name=foo");
    assert_eq!(index.get_token(0).unwrap().get_name(), Some("foo"));
    assert_eq!(index.get_token(1).unwrap().get_source(), Some("b.js"));
    assert_eq!(index.get_token(0).unwrap().to_tuple(), Some(("a.js", 0, 0, Some("foo"))));
    assert!(!index.get_token(1).unwrap().has_name());
    let unmapped = index_for("AAAA,C", None);
    assert_eq!(unmapped.get_token(1).unwrap().to_string(), "0:1 -> -");
}
