//! Per source tables ordered by original position.
//!
//! The generated order table is scattered into one table per source right
//! after decoding.  Sorting by original position is deferred until a source
//! is first looked at since most sources of a large map are never opened.
use std::fmt;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::types::{MappingTable, Order, Stride, SRC_ID};
#[cfg(test)]
use crate::types::{SRC_COL, SRC_LINE};

/// The mappings of a single source, sorted on first access.
pub struct InverseTable {
    stride: Stride,
    len: usize,
    pending: Mutex<Option<Vec<i32>>>,
    sorted: OnceCell<Vec<i32>>,
}

impl InverseTable {
    fn new(stride: Stride, data: Vec<i32>) -> InverseTable {
        InverseTable {
            stride: stride,
            len: data.len() / stride.len(),
            pending: Mutex::new(Some(data)),
            sorted: OnceCell::new(),
        }
    }

    #[inline(always)]
    pub fn stride(&self) -> Stride {
        self.stride
    }

    /// Number of mappings pointing into this source.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` once the table has been sorted.
    pub fn is_sorted(&self) -> bool {
        self.sorted.get().is_some()
    }

    /// Sorts the table if that did not happen yet and returns the flat
    /// data ordered by original line and column.
    pub fn get_data(&self) -> &[i32] {
        self.sorted.get_or_init(|| {
            let data = self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take()
                .unwrap_or_default();
            tracing::trace!(mappings = self.len, "sorting inverse mappings");
            let mut data = data;
            sort_rows(&mut data, self.stride, Order::Original);
            data
        })
    }
}

impl fmt::Debug for InverseTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InverseTable")
            .field("stride", &self.stride)
            .field("len", &self.len)
            .field("sorted", &self.is_sorted())
            .finish()
    }
}

/// Scatters the generated order table into one table per source.
///
/// Mappings without a source are skipped.  Rows keep the layout of the
/// generated table so the same lookup code works on both.
pub fn build_inverse(table: &MappingTable, sources_count: usize) -> Vec<InverseTable> {
    let stride = table.stride();
    let mut buckets: Vec<Vec<i32>> = vec![vec![]; sources_count];

    for row in table.as_slice().chunks(stride.len()) {
        let src_id = row[SRC_ID];
        if src_id < 0 {
            continue;
        }
        if let Some(bucket) = buckets.get_mut(src_id as usize) {
            bucket.extend_from_slice(row);
        }
    }

    buckets
        .into_iter()
        .map(|data| InverseTable::new(stride, data))
        .collect()
}

/// Stable sort of flat rows by the key `order` selects.
///
/// Inverse tables are collected in generated order, which usually has
/// little to do with original order, so this is a merge sort.  Runs that
/// are already ordered are left alone.
pub(crate) fn sort_rows(data: &mut [i32], stride: Stride, order: Order) {
    let stride = stride.len();
    if is_sorted_by(data, stride, order) {
        return;
    }
    let mut scratch = vec![0; data.len()];
    merge_sort(data, &mut scratch, stride, order);
}

pub(crate) fn is_sorted_by(data: &[i32], stride: usize, order: Order) -> bool {
    let mut row = stride;
    while row < data.len() {
        if order.key(data, row - stride) > order.key(data, row) {
            return false;
        }
        row += stride;
    }
    true
}

fn merge_sort(data: &mut [i32], scratch: &mut [i32], stride: usize, order: Order) {
    let count = data.len() / stride;
    if count < 2 {
        return;
    }
    let mid = (count / 2) * stride;
    {
        let (left, right) = data.split_at_mut(mid);
        let (left_scratch, right_scratch) = scratch.split_at_mut(mid);
        merge_sort(left, left_scratch, stride, order);
        merge_sort(right, right_scratch, stride, order);
    }
    if order.key(data, mid - stride) <= order.key(data, mid) {
        return;
    }
    scratch.copy_from_slice(data);
    merge(&scratch[..mid], &scratch[mid..], data, stride, order);
}

fn merge(left: &[i32], right: &[i32], out: &mut [i32], stride: usize, order: Order) {
    let mut i = 0;
    let mut j = 0;
    let mut k = 0;
    while k < out.len() {
        let take_left =
            i < left.len() && (j >= right.len() || order.key(left, i) <= order.key(right, j));
        let row = if take_left {
            i += stride;
            &left[i - stride..i]
        } else {
            j += stride;
            &right[j - stride..j]
        };
        out[k..k + stride].copy_from_slice(row);
        k += stride;
    }
}

#[test]
fn test_inverse_scatter_and_sort() {
    use crate::decoder::decode_mappings;

    // generated order: src 1 (3, 0), src 0 (0, 0), src 1 (1, 5), unmapped,
    // src 1 (1, 7)
    let table = decode_mappings("ACGA,CDHA,CCCK,C,CAAE", 2, None).unwrap();
    let inverse = build_inverse(&table, 2);
    assert_eq!(inverse.len(), 2);
    assert_eq!(inverse[0].len(), 1);
    assert_eq!(inverse[1].len(), 3);
    assert!(!inverse[1].is_sorted());

    let keys: Vec<_> = inverse[1]
        .get_data()
        .chunks(5)
        .map(|row| (row[SRC_LINE], row[SRC_COL], row[1]))
        .collect();
    assert_eq!(keys, vec![(1, 5, 2), (1, 7, 4), (3, 0, 0)]);
    assert!(inverse[1].is_sorted());
    assert!(!inverse[0].is_sorted());
}

#[test]
fn test_inverse_sort_is_stable_and_memoized() {
    let mut table = MappingTable::new(Stride::WithNames);
    for (i, &(line, col)) in [(2, 0), (0, 1), (2, 0), (0, 1), (1, 9), (0, 1)].iter().enumerate() {
        table.push(&crate::types::RawToken {
            dst_line: 0,
            dst_col: i as u32,
            src_id: 0,
            src_line: line,
            src_col: col,
            name_id: i as i32,
        });
    }
    let inverse = build_inverse(&table, 1);
    let first = inverse[0].get_data();
    let names: Vec<_> = first.chunks(6).map(|row| row[5]).collect();
    assert_eq!(names, vec![1, 3, 5, 4, 0, 2]);

    let second = inverse[0].get_data();
    assert_eq!(first.as_ptr(), second.as_ptr());
    assert_eq!(first, second);
}

#[test]
fn test_merge_sort_matches_std_stable_sort() {
    let mut rows = vec![];
    let mut seed = 7u32;
    for i in 0..97 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let line = ((seed >> 16) % 13) as i32;
        let col = ((seed >> 8) % 5) as i32;
        rows.push([0, i, 0, line, col]);
    }
    let mut flat: Vec<i32> = rows.iter().flat_map(|row| row.iter().cloned()).collect();
    rows.sort_by_key(|row| (row[3], row[4]));
    let expected: Vec<i32> = rows.iter().flat_map(|row| row.iter().cloned()).collect();

    sort_rows(&mut flat, Stride::Basic, Order::Original);
    assert_eq!(flat, expected);
    assert!(is_sorted_by(&flat, 5, Order::Original));
}
