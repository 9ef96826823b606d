use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap::Mmap;
use once_cell::sync::OnceCell;

use crate::decoder::{decode_regular, DecodeOptions, DecodedMap, NoProgress, Progress};
use crate::errors::Result;
use crate::inverse::{build_inverse, InverseTable};
use crate::jsontypes::{parse_slice, MapBody};
use crate::lines::LineLengths;
use crate::lookup::{TableRef, Token};
use crate::sections::merge_sections;
use crate::types::{MappingTable, Order, Stride};

/// An original source referenced by the map.
#[derive(Debug)]
pub struct Source {
    name: String,
    content: Option<String>,
    lines: OnceCell<Option<LineLengths>>,
    inverse: InverseTable,
}

impl Source {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_contents(&self) -> Option<&str> {
        self.content.as_ref().map(|x| &x[..])
    }

    /// The mappings into this source ordered by original position.  The
    /// first call sorts them.
    pub fn get_inverse(&self) -> &InverseTable {
        &self.inverse
    }

    pub fn get_line_lengths(&self) -> Option<&LineLengths> {
        self.lines
            .get_or_init(|| self.content.as_ref().map(|content| LineLengths::new(content)))
            .as_ref()
    }
}

/// A fully decoded source map that can be queried in both directions.
///
/// The index never changes after it was built.  Loading another map means
/// building a new index.
#[derive(Debug)]
pub struct MappingIndex {
    file: Option<String>,
    sources: Vec<Source>,
    names: Vec<String>,
    table: MappingTable,
    generated: Option<LineLengths>,
}

impl MappingIndex {
    pub fn from_slice(buffer: &[u8]) -> Result<MappingIndex> {
        MappingIndex::from_slice_with_options(buffer, &DecodeOptions::default(), &mut NoProgress)
    }

    /// Decodes a map, reporting progress while the mappings are decoded.
    pub fn from_slice_with_options(
        buffer: &[u8],
        opts: &DecodeOptions,
        progress: &mut dyn Progress,
    ) -> Result<MappingIndex> {
        let payload = parse_slice(buffer)?;
        let decoded = match payload.body {
            MapBody::Regular(map) => decode_regular(map, opts, progress)?,
            MapBody::Sections(sections) => {
                tracing::debug!(sections = sections.len(), "flattening index map");
                merge_sections(sections, opts, progress)?
            }
        };
        Ok(MappingIndex::from_decoded(decoded, payload.file))
    }

    pub fn from_reader<R: Read>(mut rdr: R) -> Result<MappingIndex> {
        let mut buffer = vec![];
        rdr.read_to_end(&mut buffer)?;
        MappingIndex::from_slice(&buffer)
    }

    /// Memory maps a file and decodes it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<MappingIndex> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return MappingIndex::from_slice(b"");
        }
        let mmap = unsafe { Mmap::map(&file)? };
        MappingIndex::from_slice(&mmap)
    }

    /// Builds the inverse tables for a decoded map.
    pub fn from_decoded(decoded: DecodedMap, file: Option<String>) -> MappingIndex {
        let inverse = build_inverse(&decoded.table, decoded.sources.len());
        let sources = decoded
            .sources
            .into_iter()
            .zip(decoded.sources_content.into_iter().chain(std::iter::repeat(None)))
            .zip(inverse)
            .map(|((name, content), inverse)| Source {
                name: name,
                content: content,
                lines: OnceCell::new(),
                inverse: inverse,
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            mappings = decoded.table.len(),
            sources = sources.len(),
            names = decoded.names.len(),
            "decoded source map"
        );

        MappingIndex {
            file: file,
            sources: sources,
            names: decoded.names,
            table: decoded.table,
            generated: None,
        }
    }

    /// Attaches the generated code so ranges can be clamped to its lines.
    pub fn with_generated_source(mut self, text: &str) -> MappingIndex {
        self.generated = Some(LineLengths::new(text));
        self
    }

    pub fn get_file(&self) -> Option<&str> {
        self.file.as_ref().map(|x| &x[..])
    }

    /// The generated order table.
    pub fn get_table(&self) -> &MappingTable {
        &self.table
    }

    pub fn get_stride(&self) -> Stride {
        self.table.stride()
    }

    pub fn get_token_count(&self) -> u32 {
        self.table.len() as u32
    }

    pub fn get_token(&self, idx: u32) -> Option<Token<'_>> {
        self.table
            .get(idx as usize)
            .map(|raw| Token::new(self, TableRef::Generated, idx as usize, raw))
    }

    /// Iterates over all mappings in generated order.
    pub fn tokens(&self) -> impl Iterator<Item = Token<'_>> {
        (0..self.get_token_count()).filter_map(move |idx| self.get_token(idx))
    }

    /// Iterates over the mappings into one source in original order.
    pub fn source_tokens(&self, src_id: u32) -> impl Iterator<Item = Token<'_>> {
        let count = self.get_source_at(src_id).map(|s| s.inverse.len()).unwrap_or(0);
        (0..count).filter_map(move |pos| self.get_token_in(TableRef::Source(src_id), pos))
    }

    /// Reads the mapping at `pos` of either table.
    pub fn get_token_in(&self, table: TableRef, pos: usize) -> Option<Token<'_>> {
        let (data, stride, _) = self.table_data(table)?;
        if pos >= data.len() / stride.len() {
            return None;
        }
        Some(Token::new(self, table, pos, crate::types::unpack(data, stride, pos)))
    }

    pub fn get_source_count(&self) -> u32 {
        self.sources.len() as u32
    }

    pub fn get_source_at(&self, src_id: u32) -> Option<&Source> {
        self.sources.get(src_id as usize)
    }

    pub fn get_source(&self, src_id: u32) -> Option<&str> {
        self.get_source_at(src_id).map(|source| source.get_name())
    }

    pub fn get_source_contents(&self, src_id: u32) -> Option<&str> {
        self.get_source_at(src_id).and_then(|source| source.get_contents())
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn get_name_count(&self) -> u32 {
        self.names.len() as u32
    }

    pub fn get_name(&self, name_id: u32) -> Option<&str> {
        self.names.get(name_id as usize).map(|x| &x[..])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|x| &x[..])
    }

    pub fn get_generated_lines(&self) -> Option<&LineLengths> {
        self.generated.as_ref()
    }

    /// Flat data, stride and ordering of a table.  Source tables are sorted
    /// on the way.
    pub(crate) fn table_data(&self, table: TableRef) -> Option<(&[i32], Stride, Order)> {
        match table {
            TableRef::Generated => Some((self.table.as_slice(), self.table.stride(), Order::Generated)),
            TableRef::Source(src_id) => self.get_source_at(src_id).map(|source| {
                (source.inverse.get_data(), source.inverse.stride(), Order::Original)
            }),
        }
    }

    /// Line lengths of the text a table's positions point into, if known.
    pub(crate) fn line_lengths(&self, table: TableRef) -> Option<&LineLengths> {
        match table {
            TableRef::Generated => self.generated.as_ref(),
            TableRef::Source(src_id) => self.get_source_at(src_id).and_then(|s| s.get_line_lengths()),
        }
    }
}


#[test]
fn test_index_from_slice() {
    let index = MappingIndex::from_slice(br#"{
        "version": 3,
        "file": "min.js",
        "sources": ["a.js", "b.js"],
        "sourcesContent": ["var a = 1;\nvar b;"],
        "names": ["a"],
        "mappings": "AAAAA,ICAA;AAAA"
    }"#).unwrap();
    assert_eq!(index.get_file(), Some("min.js"));
    assert_eq!(index.get_stride(), Stride::WithNames);
    assert_eq!(index.get_token_count(), 3);
    assert_eq!(index.get_source_count(), 2);
    assert_eq!(index.get_source(1), Some("b.js"));
    assert_eq!(index.get_source(2), None);
    assert_eq!(index.get_source_contents(0), Some("var a = 1;\nvar b;"));
    assert_eq!(index.get_source_contents(1), None);
    assert_eq!(index.get_name(0), Some("a"));
    assert_eq!(index.names().collect::<Vec<_>>(), vec!["a"]);

    let lines = index.get_source_at(0).unwrap().get_line_lengths().unwrap();
    assert_eq!(lines.line_len(0), 10);
    assert!(index.get_source_at(1).unwrap().get_line_lengths().is_none());

    assert_eq!(index.get_source_at(0).unwrap().get_inverse().len(), 1);
    assert_eq!(index.get_source_at(1).unwrap().get_inverse().len(), 2);
    assert_eq!(index.source_tokens(1).count(), 2);
}

#[test]
fn test_index_from_reader_and_path() {
    use std::io::Write;

    let json = br#"{"version":3,"sources":["a.js"],"mappings":"AAAA;AACA"}"#;
    let index = MappingIndex::from_reader(&json[..]).unwrap();
    assert_eq!(index.get_token_count(), 2);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json).unwrap();
    file.flush().unwrap();
    let index = MappingIndex::from_path(file.path()).unwrap();
    assert_eq!(index.get_token_count(), 2);
    assert_eq!(index.get_stride(), Stride::Basic);

    let empty = tempfile::NamedTempFile::new().unwrap();
    assert!(MappingIndex::from_path(empty.path()).is_err());
}
