//! Decoding of the `mappings` string into a flat table.
use std::ops::ControlFlow;

use crate::errors::{ErrorKind, Result};
use crate::jsontypes::RegularMap;
use crate::types::{MappingTable, RawToken, Stride, DST_COL, MISSING};
use crate::vlq::{decode_vlq, is_separator};

/// Options that control how a source map is decoded.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Keep name indexes in the tables (stride 6) when the map has names.
    pub with_names: bool,
    /// Number of mapping bytes between two progress reports.
    pub progress_interval: usize,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            with_names: true,
            progress_interval: 64 * 1024,
        }
    }
}

/// Receives progress while a mapping string is decoded.
///
/// Returning `ControlFlow::Break` aborts the decode with
/// `ErrorKind::Cancelled`.  No partially decoded data is handed out in that
/// case.
pub trait Progress {
    fn report(&mut self, processed: usize, total: usize) -> ControlFlow<()>;
}

/// Progress sink that never cancels.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _processed: usize, _total: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F: FnMut(usize, usize) -> ControlFlow<()>> Progress for F {
    fn report(&mut self, processed: usize, total: usize) -> ControlFlow<()> {
        self(processed, total)
    }
}

/// A decoded map: the generated order table and the lists it indexes.
#[derive(Debug, Clone)]
pub struct DecodedMap {
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub table: MappingTable,
}

/// Decodes the mappings of a regular (non index) map.
pub fn decode_regular(
    map: RegularMap,
    opts: &DecodeOptions,
    progress: &mut dyn Progress,
) -> Result<DecodedMap> {
    let names_count = match map.names {
        Some(ref names) if opts.with_names => Some(names.len()),
        _ => None,
    };
    let table = decode_mappings_with_progress(
        &map.mappings,
        map.sources.len(),
        names_count,
        opts,
        progress,
    )?;
    Ok(DecodedMap {
        sources: map.sources,
        sources_content: map.sources_content,
        names: map.names.unwrap_or_default(),
        table: table,
    })
}

/// Decodes a mappings string.
///
/// `names_count` switches on name tracking: when it is `Some`, the table
/// has stride 6 and name indexes are validated against the count.  When
/// it is `None` name fields are parsed and dropped.
pub fn decode_mappings(
    mappings: &str,
    sources_count: usize,
    names_count: Option<usize>,
) -> Result<MappingTable> {
    decode_mappings_with_progress(
        mappings,
        sources_count,
        names_count,
        &DecodeOptions::default(),
        &mut NoProgress,
    )
}

pub fn decode_mappings_with_progress(
    mappings: &str,
    sources_count: usize,
    names_count: Option<usize>,
    opts: &DecodeOptions,
    progress: &mut dyn Progress,
) -> Result<MappingTable> {
    let input = mappings.as_bytes();
    let n = input.len();
    let stride = if names_count.is_some() {
        Stride::WithNames
    } else {
        Stride::Basic
    };
    // a segment is rarely shorter than four bytes
    let mut table = MappingTable::with_capacity(stride, n / 4);

    let mut dst_line = 0i64;
    let mut dst_col = 0i64;
    let mut src_id = 0i64;
    let mut src_line = 0i64;
    let mut src_col = 0i64;
    let mut name_id = 0i64;

    let mut line_start = 0;
    let mut needs_sort = false;
    let interval = opts.progress_interval.max(1);
    let mut next_report = interval;
    let mut pos = 0;

    while pos < n {
        if pos >= next_report {
            report(progress, pos, n)?;
            next_report = pos + interval;
        }

        match input[pos] {
            b';' => {
                if needs_sort {
                    sort_line(&mut table, line_start, dst_line);
                }
                dst_line += 1;
                dst_col = 0;
                line_start = table.len();
                needs_sort = false;
                pos += 1;
                continue;
            }
            b',' => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        let field = pos;
        let delta = decode_vlq(input, &mut pos)?;
        if delta < 0 {
            needs_sort = true;
        }
        dst_col += i64::from(delta);
        let mut raw = RawToken::unmapped(
            position(dst_line, "generated line", field)? as u32,
            position(dst_col, "generated column", field)? as u32,
        );

        if pos < n && !is_separator(input[pos]) {
            let field = pos;
            src_id += i64::from(decode_vlq(input, &mut pos)?);
            // a map without sources may still carry the zero index
            if src_id < 0 || src_id >= sources_count.max(1) as i64 {
                return Err(ErrorKind::IndexOutOfRange("source", field).into());
            }

            let field = pos;
            src_line += i64::from(decode_vlq(input, &mut pos)?);
            let line = position(src_line, "original line", field)?;

            let field = pos;
            src_col += i64::from(decode_vlq(input, &mut pos)?);
            let col = position(src_col, "original column", field)?;

            // without declared sources there is nothing to point at
            if sources_count > 0 {
                raw.src_id = src_id as i32;
                raw.src_line = line;
                raw.src_col = col;
            }

            if pos < n && !is_separator(input[pos]) {
                let field = pos;
                name_id += i64::from(decode_vlq(input, &mut pos)?);
                if let Some(count) = names_count {
                    if name_id < 0 || name_id >= count as i64 {
                        return Err(ErrorKind::IndexOutOfRange("name", field).into());
                    }
                    raw.name_id = name_id as i32;
                }

                if pos < n && !is_separator(input[pos]) {
                    return Err(ErrorKind::TrailingSegmentData(pos).into());
                }
            }
        }

        table.push(&raw);
    }

    if needs_sort {
        sort_line(&mut table, line_start, dst_line);
    }
    report(progress, n, n)?;

    Ok(table)
}

fn report(progress: &mut dyn Progress, processed: usize, total: usize) -> Result<()> {
    match progress.report(processed, total) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => Err(ErrorKind::Cancelled.into()),
    }
}

fn position(value: i64, what: &'static str, offset: usize) -> Result<i32> {
    if value < 0 {
        Err(ErrorKind::NegativePosition(what, offset).into())
    } else if value > i64::from(i32::max_value()) {
        Err(ErrorKind::VlqOverflow(offset).into())
    } else {
        Ok(value as i32)
    }
}

/// Puts the mappings of one generated line back into column order.
///
/// Lines only end up out of order when a tool emitted a negative column
/// delta, and then they are nearly sorted, so a stable insertion sort
/// restricted to the line does the job in close to linear time.
fn sort_line(table: &mut MappingTable, line_start: usize, line: i64) {
    let stride = table.stride().len();
    let data = &mut table.as_mut_slice()[line_start * stride..];
    let count = data.len() / stride;
    tracing::trace!(line, count, "resorting generated line");

    let mut tmp = [MISSING; 6];
    for j in 1..count {
        tmp[..stride].copy_from_slice(&data[j * stride..(j + 1) * stride]);
        let col = tmp[DST_COL];
        let mut k = j;
        while k > 0 && data[(k - 1) * stride + DST_COL] > col {
            k -= 1;
        }
        if k != j {
            data.copy_within(k * stride..j * stride, (k + 1) * stride);
            data[k * stride..(k + 1) * stride].copy_from_slice(&tmp[..stride]);
        }
    }
}


#[test]
fn test_decode_basic_lines() {
    // line 0: col 0 -> src 0 (0, 0); col 4 -> src 0 (0, 4)
    // line 2: col 2 -> src 0 (1, 0)
    let table = decode_mappings("AAAA,IAAI;;EACJ", 1, None).unwrap();
    assert_eq!(table.stride(), Stride::Basic);
    assert_eq!(table.as_slice(), &[
        0, 0, 0, 0, 0,
        0, 4, 0, 0, 4,
        2, 2, 0, 1, 0,
    ][..]);
}

#[test]
fn test_decode_one_field_segments_are_unmapped() {
    let table = decode_mappings("AAAA,E;A", 1, None).unwrap();
    assert_eq!(table.as_slice(), &[
        0, 0, 0, 0, 0,
        0, 2, -1, -1, -1,
        1, 0, -1, -1, -1,
    ][..]);
}

#[test]
fn test_decode_accumulators_survive_line_breaks() {
    // the original line keeps counting across `;`, the column restarts
    let table = decode_mappings("ACAA;ACAA", 3, None).unwrap();
    assert_eq!(table.as_slice(), &[
        0, 0, 1, 0, 0,
        1, 0, 2, 0, 0,
    ][..]);
    let table = decode_mappings("AACA;AACA", 1, None).unwrap();
    assert_eq!(table.get(1).unwrap().src_line, 2);
}

#[test]
fn test_decode_names() {
    let table = decode_mappings("AAAAA,CAAAC", 1, Some(2)).unwrap();
    assert_eq!(table.stride(), Stride::WithNames);
    assert_eq!(table.get(0).unwrap().name_id, 0);
    assert_eq!(table.get(1).unwrap().name_id, 1);

    // names are skipped when not tracked
    let table = decode_mappings("AAAAA,CAAAC", 1, None).unwrap();
    assert_eq!(table.stride(), Stride::Basic);
    assert_eq!(table.len(), 2);

    match *decode_mappings("AAAAC", 1, Some(1)).unwrap_err().kind() {
        ErrorKind::IndexOutOfRange("name", 4) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_decode_tolerates_stray_commas() {
    let table = decode_mappings(",,AAAA,,,CAAA,;,", 1, None).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1).unwrap().dst_col, 1);
}

#[test]
fn test_decode_resorts_out_of_order_columns() {
    // columns 4, 2 (delta -2), 6 (delta +4) on line 0, then line 1
    let table = decode_mappings("IAAA,FACA,IACA;AAAA", 1, None).unwrap();
    let cols: Vec<_> = (0..table.len()).map(|i| {
        let raw = table.get(i).unwrap();
        (raw.dst_line, raw.dst_col, raw.src_line)
    }).collect();
    assert_eq!(cols, vec![(0, 2, 1), (0, 4, 0), (0, 6, 2), (1, 0, 2)]);
}

#[test]
fn test_decode_resort_is_stable() {
    // columns 2, 0, 2 (the two entries at column 2 keep their order)
    let table = decode_mappings("EAAA,FACA,EACA", 1, None).unwrap();
    let lines: Vec<_> = (0..table.len()).map(|i| {
        let raw = table.get(i).unwrap();
        (raw.dst_col, raw.src_line)
    }).collect();
    assert_eq!(lines, vec![(0, 1), (2, 0), (2, 2)]);
}

#[test]
fn test_decode_rejects_bad_input() {
    match *decode_mappings("AAAA,!AAA", 1, None).unwrap_err().kind() {
        ErrorKind::InvalidVlqCharacter(5) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *decode_mappings("ACAA", 1, None).unwrap_err().kind() {
        ErrorKind::IndexOutOfRange("source", 1) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *decode_mappings("D", 1, None).unwrap_err().kind() {
        ErrorKind::NegativePosition("generated column", 0) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *decode_mappings("AADA", 1, None).unwrap_err().kind() {
        ErrorKind::NegativePosition("original line", 2) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *decode_mappings("AAAAAA", 1, None).unwrap_err().kind() {
        ErrorKind::TrailingSegmentData(5) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *decode_mappings("AAg", 1, None).unwrap_err().kind() {
        ErrorKind::UnexpectedEndOfData(3) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_decode_without_sources_drops_original_positions() {
    let table = decode_mappings("AAAA", 0, None).unwrap();
    assert_eq!(table.as_slice(), &[0, 0, -1, -1, -1][..]);

    match *decode_mappings("AGAA", 0, None).unwrap_err().kind() {
        ErrorKind::IndexOutOfRange("source", 1) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *decode_mappings("AAAA,ACAA", 0, None).unwrap_err().kind() {
        ErrorKind::IndexOutOfRange("source", 6) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_decode_reports_progress_and_cancels() {
    let opts = DecodeOptions {
        with_names: false,
        progress_interval: 4,
    };
    let mut reports = vec![];
    let table = decode_mappings_with_progress(
        "AAAA,CAAA,CAAA,CAAA",
        1,
        None,
        &opts,
        &mut |processed: usize, total: usize| -> ControlFlow<()> {
            reports.push((processed, total));
            ControlFlow::Continue(())
        },
    ).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(reports.last(), Some(&(19, 19)));
    assert!(reports.len() > 1);

    let err = decode_mappings_with_progress(
        "AAAA,CAAA,CAAA,CAAA",
        1,
        None,
        &opts,
        &mut |processed: usize, _total: usize| -> ControlFlow<()> {
            if processed > 8 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        },
    ).unwrap_err();
    match *err.kind() {
        ErrorKind::Cancelled => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}
