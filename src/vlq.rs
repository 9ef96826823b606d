//! Base64 VLQ decoding.
//!
//! Every character of the `mappings` alphabet carries five bits of payload
//! and a continuation flag.  Groups are little endian and the lowest bit of
//! the assembled number is the sign.
use crate::errors::{ErrorKind, Result};

const VLQ_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const INVALID: u8 = 0xff;
const CONTINUATION_BIT: u8 = 32;
const VALUE_MASK: u8 = 31;

static VLQ_TABLE: [u8; 128] = build_table();

const fn build_table() -> [u8; 128] {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < VLQ_CHARS.len() {
        table[VLQ_CHARS[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Looks up the 6 bit value of a single mapping character.
#[inline(always)]
fn lookup(c: u8) -> Option<u8> {
    if c & 0x80 != 0 {
        return None;
    }
    match VLQ_TABLE[c as usize] {
        INVALID => None,
        value => Some(value),
    }
}

/// Decodes one signed value starting at `*pos` and advances the cursor
/// past it.
///
/// On failure the error carries the byte offset of the offending character
/// (or the input length if the data ended mid value).
pub fn decode_vlq(input: &[u8], pos: &mut usize) -> Result<i32> {
    let mut shift = 0u32;
    let mut vlq = 0u64;

    loop {
        let c = match input.get(*pos) {
            Some(&c) => c,
            None => return Err(ErrorKind::UnexpectedEndOfData(*pos).into()),
        };
        let digit = match lookup(c) {
            Some(digit) => digit,
            None => return Err(ErrorKind::InvalidVlqCharacter(*pos).into()),
        };
        if shift > 30 {
            return Err(ErrorKind::VlqOverflow(*pos).into());
        }
        *pos += 1;

        vlq |= u64::from(digit & VALUE_MASK) << shift;
        shift += 5;

        if digit & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let magnitude = vlq >> 1;
    if magnitude > i32::max_value() as u64 {
        return Err(ErrorKind::VlqOverflow(*pos - 1).into());
    }
    let magnitude = magnitude as i32;
    Ok(if vlq & 1 != 0 { -magnitude } else { magnitude })
}

/// Returns `true` if the byte separates mapping segments (`,`) or
/// generated lines (`;`).
#[inline(always)]
pub fn is_separator(c: u8) -> bool {
    c == b',' || c == b';'
}


#[test]
fn test_decode_single_values() {
    let cases: &[(&str, i32)] = &[
        ("A", 0),
        ("C", 1),
        ("D", -1),
        ("E", 2),
        ("F", -2),
        ("e", 15),
        ("f", -15),
        ("gB", 16),
        ("hB", -16),
        ("2H", 123),
        ("+/D", 2047),
        ("+/////D", 2147483647),
        ("//////D", -2147483647),
    ];
    for &(text, expected) in cases {
        let mut pos = 0;
        assert_eq!(decode_vlq(text.as_bytes(), &mut pos).unwrap(), expected, "{}", text);
        assert_eq!(pos, text.len());
    }
}

#[test]
fn test_decode_stops_at_terminal_digit() {
    let input = b"CAAA";
    let mut pos = 0;
    assert_eq!(decode_vlq(input, &mut pos).unwrap(), 1);
    assert_eq!(pos, 1);
    assert_eq!(decode_vlq(input, &mut pos).unwrap(), 0);
    assert_eq!(pos, 2);
}

#[test]
fn test_decode_errors_carry_offsets() {
    let mut pos = 2;
    match *decode_vlq(b"AA!A", &mut pos).unwrap_err().kind() {
        ErrorKind::InvalidVlqCharacter(2) => {}
        ref other => panic!("unexpected error {:?}", other),
    }

    // a continuation digit at the end of input
    let mut pos = 0;
    match *decode_vlq(b"g", &mut pos).unwrap_err().kind() {
        ErrorKind::UnexpectedEndOfData(1) => {}
        ref other => panic!("unexpected error {:?}", other),
    }

    // bytes with the high bit set never alias into the table
    let mut pos = 0;
    match *decode_vlq("\u{e9}".as_bytes(), &mut pos).unwrap_err().kind() {
        ErrorKind::InvalidVlqCharacter(0) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_decode_rejects_oversized_values() {
    let mut pos = 0;
    assert!(decode_vlq(b"gggggggB", &mut pos).is_err());
}
