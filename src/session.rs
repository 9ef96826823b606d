//! The state an interactive viewer keeps between loads.
use crate::decoder::{DecodeOptions, NoProgress, Progress};
use crate::errors::Error;
use crate::index::MappingIndex;
use crate::lookup::{MappingRange, TableRef};

/// One side of the viewer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Pane {
    Generated,
    Original(u32),
}

impl Pane {
    /// The table positions in this pane are looked up in.
    pub fn table(self) -> TableRef {
        match self {
            Pane::Generated => TableRef::Generated,
            Pane::Original(src_id) => TableRef::Source(src_id),
        }
    }
}

/// What is under the pointer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hover {
    pub pane: Pane,
    pub table: TableRef,
    /// Row of the mapping in `table`.
    pub position: usize,
    pub range: MappingRange,
    /// Position the mapping leads to in the other pane.
    pub counterpart: Option<(TableRef, u32, u32)>,
}

/// Holds the currently loaded map.
///
/// A failed load leaves the previous map in place and records the error.
#[derive(Debug, Default)]
pub struct Session {
    index: Option<MappingIndex>,
    last_error: Option<Error>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Decodes `json` and swaps it in if that worked.
    pub fn load(&mut self, json: &[u8], generated: Option<&str>) -> Result<&MappingIndex, &Error> {
        self.load_with_options(json, generated, &DecodeOptions::default(), &mut NoProgress)
    }

    pub fn load_with_options(
        &mut self,
        json: &[u8],
        generated: Option<&str>,
        opts: &DecodeOptions,
        progress: &mut dyn Progress,
    ) -> Result<&MappingIndex, &Error> {
        match MappingIndex::from_slice_with_options(json, opts, progress) {
            Ok(index) => {
                let index = match generated {
                    Some(text) => index.with_generated_source(text),
                    None => index,
                };
                self.last_error = None;
                Ok(&*self.index.insert(index))
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load source map, keeping previous one");
                Err(&*self.last_error.insert(err))
            }
        }
    }

    pub fn index(&self) -> Option<&MappingIndex> {
        self.index.as_ref()
    }

    /// The error of the most recent load, if it failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Finds the mapping whose range covers `(line, column)` in `pane`.
    pub fn hover_at(&self, pane: Pane, line: u32, column: u32) -> Option<Hover> {
        let index = self.index.as_ref()?;
        let token = index.lookup_in(pane.table(), line, column)?;
        let range = index.range_of(&token)?;
        if !range.contains(column) {
            return None;
        }
        Some(Hover {
            pane: pane,
            table: token.get_table(),
            position: token.get_position(),
            range: range,
            counterpart: token.counterpart(),
        })
    }
}


#[cfg(test)]
const MAP: &[u8] = br#"{
    "version": 3,
    "sources": ["a.js"],
    "sourcesContent": ["let x = 1;\nfoo();"],
    "mappings": "AAAA,IAAI;AACJ"
}"#;

#[test]
fn test_load_keeps_previous_index_on_error() {
    let mut session = Session::new();
    assert!(session.hover_at(Pane::Generated, 0, 0).is_none());

    assert_eq!(session.load(MAP, None).unwrap().get_token_count(), 3);
    assert!(session.last_error().is_none());

    assert!(session.load(br#"{"version":3,"sources":[],"mappings":"!"}"#, None).is_err());
    assert!(session.last_error().is_some());
    assert_eq!(session.index().unwrap().get_token_count(), 3);

    session.load(MAP, None).unwrap();
    assert!(session.last_error().is_none());
}

#[test]
fn test_hover_generated_pane() {
    let mut session = Session::new();
    session.load(MAP, Some("let x = 1;\nfoo();")).unwrap();

    let hover = session.hover_at(Pane::Generated, 0, 2).unwrap();
    assert_eq!(hover.table, TableRef::Generated);
    assert_eq!(hover.position, 0);
    assert_eq!((hover.range.start_column, hover.range.end_column), (0, 4));
    assert_eq!(hover.counterpart, Some((TableRef::Source(0), 0, 0)));

    let hover = session.hover_at(Pane::Generated, 0, 9).unwrap();
    assert_eq!(hover.position, 1);
    assert_eq!((hover.range.start_column, hover.range.end_column), (4, 10));
    assert!(session.hover_at(Pane::Generated, 0, 10).is_none());
    assert!(session.hover_at(Pane::Generated, 5, 0).is_none());
}

#[test]
fn test_hover_original_pane() {
    let mut session = Session::new();
    session.load(MAP, None).unwrap();

    let hover = session.hover_at(Pane::Original(0), 1, 3).unwrap();
    assert_eq!(hover.table, TableRef::Source(0));
    assert_eq!((hover.range.start_column, hover.range.end_column), (0, 6));
    assert_eq!(hover.counterpart, Some((TableRef::Generated, 1, 0)));
    assert!(session.hover_at(Pane::Original(1), 0, 0).is_none());
}
