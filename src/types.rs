use std::fmt;

/// Marks a field that the mapping does not carry (no source, no name).
pub const MISSING: i32 = -1;

pub const DST_LINE: usize = 0;
pub const DST_COL: usize = 1;
pub const SRC_ID: usize = 2;
pub const SRC_LINE: usize = 3;
pub const SRC_COL: usize = 4;
pub const NAME_ID: usize = 5;

/// Which position of a row a table is ordered by.
///
/// Generated and inverse tables share the row layout and differ only in
/// the pair of fields they are sorted on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Order {
    Generated,
    Original,
}

impl Order {
    /// Offset of the line field, the column follows right after it.
    #[inline(always)]
    pub fn offset(self) -> usize {
        match self {
            Order::Generated => DST_LINE,
            Order::Original => SRC_LINE,
        }
    }

    /// The `(line, column)` key of the row starting at `row`.
    #[inline(always)]
    pub fn key(self, data: &[i32], row: usize) -> (i32, i32) {
        let offset = row + self.offset();
        (data[offset], data[offset + 1])
    }
}

/// Number of integers per mapping in a flat table.
///
/// The stride is decided once when a table is created and every query over
/// the table reads it from there.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stride {
    /// `dst_line, dst_col, src_id, src_line, src_col`
    Basic,
    /// `dst_line, dst_col, src_id, src_line, src_col, name_id`
    WithNames,
}

impl Stride {
    #[inline(always)]
    pub fn len(self) -> usize {
        match self {
            Stride::Basic => 5,
            Stride::WithNames => 6,
        }
    }

    pub fn has_names(self) -> bool {
        self == Stride::WithNames
    }
}

/// A single decoded mapping, unpacked from a flat table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RawToken {
    pub dst_line: u32,
    pub dst_col: u32,
    pub src_id: i32,
    pub src_line: i32,
    pub src_col: i32,
    pub name_id: i32,
}

impl RawToken {
    /// Creates a mapping that only has a generated position.
    pub fn unmapped(dst_line: u32, dst_col: u32) -> RawToken {
        RawToken {
            dst_line: dst_line,
            dst_col: dst_col,
            src_id: MISSING,
            src_line: MISSING,
            src_col: MISSING,
            name_id: MISSING,
        }
    }

    pub fn has_source(&self) -> bool {
        self.src_id != MISSING
    }

    pub fn has_name(&self) -> bool {
        self.name_id != MISSING
    }
}

/// Mappings stored back to back as integers with a fixed stride.
#[derive(Clone, PartialEq, Eq)]
pub struct MappingTable {
    data: Vec<i32>,
    stride: Stride,
}

impl MappingTable {
    pub fn new(stride: Stride) -> MappingTable {
        MappingTable {
            data: vec![],
            stride: stride,
        }
    }

    pub fn with_capacity(stride: Stride, entries: usize) -> MappingTable {
        MappingTable {
            data: Vec::with_capacity(entries * stride.len()),
            stride: stride,
        }
    }

    pub(crate) fn from_raw(data: Vec<i32>, stride: Stride) -> MappingTable {
        debug_assert_eq!(data.len() % stride.len(), 0);
        MappingTable {
            data: data,
            stride: stride,
        }
    }

    #[inline(always)]
    pub fn stride(&self) -> Stride {
        self.stride
    }

    /// Number of mappings (not integers) in the table.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len() / self.stride.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The flat integer view of the table.
    #[inline(always)]
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    pub(crate) fn into_raw(self) -> Vec<i32> {
        self.data
    }

    pub fn push(&mut self, raw: &RawToken) {
        self.data.push(raw.dst_line as i32);
        self.data.push(raw.dst_col as i32);
        self.data.push(raw.src_id);
        self.data.push(raw.src_line);
        self.data.push(raw.src_col);
        if self.stride.has_names() {
            self.data.push(raw.name_id);
        }
    }

    pub fn get(&self, idx: usize) -> Option<RawToken> {
        if idx >= self.len() {
            return None;
        }
        Some(unpack(&self.data, self.stride, idx))
    }

    /// Returns a copy of the table with room for name indexes.  Tables
    /// that already carry names are returned as is.
    pub(crate) fn with_names(self) -> MappingTable {
        if self.stride.has_names() {
            return self;
        }
        let mut data = Vec::with_capacity(self.len() * Stride::WithNames.len());
        for row in self.data.chunks(Stride::Basic.len()) {
            data.extend_from_slice(row);
            data.push(MISSING);
        }
        MappingTable::from_raw(data, Stride::WithNames)
    }
}

/// Reads the mapping at `idx` out of a flat slice.
#[inline(always)]
pub fn unpack(data: &[i32], stride: Stride, idx: usize) -> RawToken {
    let row = &data[idx * stride.len()..(idx + 1) * stride.len()];
    RawToken {
        dst_line: row[DST_LINE] as u32,
        dst_col: row[DST_COL] as u32,
        src_id: row[SRC_ID],
        src_line: row[SRC_LINE],
        src_col: row[SRC_COL],
        name_id: if stride.has_names() { row[NAME_ID] } else { MISSING },
    }
}

impl fmt::Debug for MappingTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MappingTable")
            .field("stride", &self.stride)
            .field("len", &self.len())
            .finish()
    }
}


#[test]
fn test_table_push_and_get() {
    let mut table = MappingTable::new(Stride::Basic);
    table.push(&RawToken::unmapped(0, 4));
    table.push(&RawToken {
        dst_line: 1,
        dst_col: 2,
        src_id: 0,
        src_line: 10,
        src_col: 3,
        name_id: 7,
    });
    assert_eq!(table.len(), 2);
    assert_eq!(table.as_slice(), &[0, 4, -1, -1, -1, 1, 2, 0, 10, 3][..]);

    // stride 5 tables drop the name
    let tok = table.get(1).unwrap();
    assert_eq!(tok.src_line, 10);
    assert!(!tok.has_name());
    assert!(table.get(2).is_none());

    let widened = table.with_names();
    assert_eq!(widened.stride(), Stride::WithNames);
    assert_eq!(widened.as_slice(), &[0, 4, -1, -1, -1, -1, 1, 2, 0, 10, 3, -1][..]);
}
