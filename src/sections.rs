//! Flattening of index maps.
use std::ops::ControlFlow;

use crate::decoder::{decode_regular, DecodeOptions, DecodedMap, Progress};
use crate::errors::{ErrorKind, Result};
use crate::inverse::{is_sorted_by, sort_rows};
use crate::jsontypes::SectionPayload;
use crate::types::{MappingTable, Order, Stride, DST_COL, DST_LINE, MISSING, NAME_ID, SRC_ID};

/// Reports progress of one section as part of the whole index map.
struct SectionProgress<'a> {
    inner: &'a mut dyn Progress,
    base: usize,
    total: usize,
}

impl<'a> Progress for SectionProgress<'a> {
    fn report(&mut self, processed: usize, _total: usize) -> ControlFlow<()> {
        self.inner.report(self.base + processed, self.total)
    }
}

/// Decodes every section of an index map and merges them into one map.
///
/// Sections are ordered by offset first.  Generated lines of a section are
/// shifted by its line offset, and the column offset only applies to the
/// section's first line.  Source and name indexes are shifted by the number
/// of sources and names of the sections merged before.
pub fn merge_sections(
    mut sections: Vec<SectionPayload>,
    opts: &DecodeOptions,
    progress: &mut dyn Progress,
) -> Result<DecodedMap> {
    sections.sort_by_key(|section| (section.offset_line, section.offset_column));

    let with_names = opts.with_names && sections.iter().any(|section| section.map.names.is_some());
    let stride = if with_names {
        Stride::WithNames
    } else {
        Stride::Basic
    };
    let total = sections.iter().map(|section| section.map.mappings.len()).sum();

    let mut merged = DecodedMap {
        sources: vec![],
        sources_content: vec![],
        names: vec![],
        table: MappingTable::new(stride),
    };
    let mut data = vec![];
    let mut base = 0;

    for (idx, section) in sections.into_iter().enumerate() {
        let offset_line = section.offset_line as i32;
        let offset_column = section.offset_column as i32;
        let mappings_len = section.map.mappings.len();

        let decoded = {
            let mut section_progress = SectionProgress {
                inner: &mut *progress,
                base: base,
                total: total,
            };
            decode_regular(section.map, opts, &mut section_progress).map_err(|err| {
                tracing::debug!(section = idx, error = %err, "failed to decode section");
                err
            })?
        };
        base += mappings_len;

        let table = if with_names {
            decoded.table.with_names()
        } else {
            decoded.table
        };
        let sources_base = merged.sources.len() as i32;
        let names_base = merged.names.len() as i32;

        let mut rows = table.into_raw();
        for row in rows.chunks_mut(stride.len()) {
            if row[DST_LINE] == 0 {
                row[DST_COL] = rebase(row[DST_COL], offset_column, idx)?;
            }
            row[DST_LINE] = rebase(row[DST_LINE], offset_line, idx)?;
            if row[SRC_ID] != MISSING {
                row[SRC_ID] += sources_base;
            }
            if with_names && row[NAME_ID] != MISSING {
                row[NAME_ID] += names_base;
            }
            data.extend_from_slice(row);
        }

        merged.sources.extend(decoded.sources);
        merged.sources_content.extend(decoded.sources_content);
        merged.names.extend(decoded.names);
    }

    // overlapping sections leave the merged table out of generated order
    if !is_sorted_by(&data, stride.len(), Order::Generated) {
        tracing::debug!("index map sections overlap, resorting merged mappings");
        sort_rows(&mut data, stride, Order::Generated);
    }
    merged.table = MappingTable::from_raw(data, stride);

    Ok(merged)
}

fn rebase(value: i32, offset: i32, section: usize) -> Result<i32> {
    value
        .checked_add(offset)
        .ok_or_else(|| ErrorKind::InvalidSectionOffset(section).into())
}


#[cfg(test)]
fn section(line: u32, column: u32, json: &str) -> SectionPayload {
    use crate::jsontypes::{parse_slice, MapBody};

    match parse_slice(json.as_bytes()).unwrap().body {
        MapBody::Regular(map) => SectionPayload {
            offset_line: line,
            offset_column: column,
            map: map,
        },
        MapBody::Sections(_) => panic!("nested sections"),
    }
}

#[cfg(test)]
fn rows(table: &MappingTable) -> Vec<(u32, u32, i32, i32)> {
    (0..table.len())
        .map(|i| {
            let raw = table.get(i).unwrap();
            (raw.dst_line, raw.dst_col, raw.src_id, raw.name_id)
        })
        .collect()
}

#[test]
fn test_merge_applies_offsets() {
    let first = section(0, 0, r#"{"version":3,"sources":["a.js"],"mappings":"AAAA"}"#);
    // (0, 3) and (1, 3) relative to the section
    let second = section(10, 5, r#"{"version":3,"sources":["b.js"],"mappings":"GAAA;GAAA"}"#);

    let merged = merge_sections(
        vec![second, first],
        &DecodeOptions::default(),
        &mut crate::decoder::NoProgress,
    ).unwrap();
    assert_eq!(merged.sources, vec!["a.js", "b.js"]);
    assert_eq!(merged.table.stride(), Stride::Basic);
    assert_eq!(rows(&merged.table), vec![
        (0, 0, 0, -1),
        (10, 8, 1, -1),
        (11, 3, 1, -1),
    ]);
}

#[test]
fn test_merge_rebases_names_and_unmapped_entries() {
    let first = section(0, 0, r#"{"version":3,"sources":["a.js"],"names":["x","y"],"mappings":"AAAAC"}"#);
    let second = section(1, 0, r#"{"version":3,"sources":["b.js","c.js"],"names":["z"],"mappings":"ACAAA,C"}"#);
    let third = section(2, 0, r#"{"version":3,"sources":["d.js"],"mappings":"AAAA"}"#);

    let merged = merge_sections(
        vec![first, second, third],
        &DecodeOptions::default(),
        &mut crate::decoder::NoProgress,
    ).unwrap();
    assert_eq!(merged.table.stride(), Stride::WithNames);
    assert_eq!(merged.names, vec!["x", "y", "z"]);
    assert_eq!(merged.sources_content.len(), 4);
    assert_eq!(rows(&merged.table), vec![
        (0, 0, 0, 1),
        (1, 0, 2, 2),
        (1, 1, -1, -1),
        (2, 0, 3, -1),
    ]);
}

#[test]
fn test_merge_resorts_overlapping_sections() {
    let first = section(0, 0, r#"{"version":3,"sources":["a.js"],"mappings":";;AAAA"}"#);
    let second = section(1, 0, r#"{"version":3,"sources":["b.js"],"mappings":"AAAA"}"#);

    let merged = merge_sections(
        vec![first, second],
        &DecodeOptions::default(),
        &mut crate::decoder::NoProgress,
    ).unwrap();
    assert_eq!(rows(&merged.table), vec![(1, 0, 1, -1), (2, 0, 0, -1)]);
}

#[test]
fn test_merge_keeps_input_order_for_tied_offsets() {
    let first = section(2, 4, r#"{"version":3,"sources":["a.js"],"mappings":"AAAA"}"#);
    let second = section(2, 4, r#"{"version":3,"sources":["b.js"],"mappings":"AAAA"}"#);

    let merged = merge_sections(
        vec![first, second],
        &DecodeOptions::default(),
        &mut crate::decoder::NoProgress,
    ).unwrap();
    assert_eq!(merged.sources, vec!["a.js", "b.js"]);
    assert_eq!(rows(&merged.table), vec![(2, 4, 0, -1), (2, 4, 1, -1)]);
}

#[test]
fn test_merge_surfaces_section_errors() {
    let first = section(0, 0, r#"{"version":3,"sources":["a.js"],"mappings":"AAAA"}"#);
    let second = section(1, 0, r#"{"version":3,"sources":["b.js"],"mappings":"AA"}"#);

    let err = merge_sections(
        vec![first, second],
        &DecodeOptions::default(),
        &mut crate::decoder::NoProgress,
    ).unwrap_err();
    match *err.kind() {
        ErrorKind::UnexpectedEndOfData(2) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}
