use proptest::prelude::*;
use sourcemap_explorer::{decode_vlq, MappingIndex, RawToken, MISSING};

const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// (dst_line, dst_col, src_id, src_line, src_col, name_id)
type Tok = (u32, u32, u32, u32, u32, Option<u32>);

fn encode_vlq(out: &mut String, value: i64) {
    let mut rest = if value < 0 { (-value << 1) | 1 } else { value << 1 };
    loop {
        let mut digit = rest & 31;
        rest >>= 5;
        if rest > 0 {
            digit |= 32;
        }
        out.push(B64[digit as usize] as char);
        if rest == 0 {
            break;
        }
    }
}

/// Encodes tokens in the order given.  Tokens must be grouped by line.
fn encode_mappings(tokens: &[Tok]) -> String {
    let mut out = String::new();
    let mut line = 0;
    let mut first_in_line = true;
    let (mut col, mut src, mut src_line, mut src_col, mut name) = (0i64, 0i64, 0i64, 0i64, 0i64);

    for tok in tokens {
        while line < tok.0 {
            out.push(';');
            line += 1;
            col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        encode_vlq(&mut out, tok.1 as i64 - col);
        col = tok.1 as i64;
        encode_vlq(&mut out, tok.2 as i64 - src);
        src = tok.2 as i64;
        encode_vlq(&mut out, tok.3 as i64 - src_line);
        src_line = tok.3 as i64;
        encode_vlq(&mut out, tok.4 as i64 - src_col);
        src_col = tok.4 as i64;
        if let Some(name_id) = tok.5 {
            encode_vlq(&mut out, name_id as i64 - name);
            name = name_id as i64;
        }
    }
    out
}

fn index_for(mappings: &str) -> MappingIndex {
    let json = format!(
        r#"{{"version":3,"sources":["a.js","b.js","c.js"],"names":["n0","n1"],"mappings":"{}"}}"#,
        mappings
    );
    MappingIndex::from_slice(json.as_bytes()).unwrap()
}

fn as_tok(raw: &RawToken) -> Tok {
    let name = if raw.name_id == MISSING {
        None
    } else {
        Some(raw.name_id as u32)
    };
    (raw.dst_line, raw.dst_col, raw.src_id as u32, raw.src_line as u32, raw.src_col as u32, name)
}

fn tokens() -> impl Strategy<Value = Vec<Tok>> {
    prop::collection::vec(
        (0u32..12, 0u32..120, 0u32..3, 0u32..40, 0u32..80, prop::option::of(0u32..2)),
        0..60,
    )
    .prop_map(|mut tokens| {
        tokens.sort_by_key(|tok| (tok.0, tok.1));
        tokens
    })
}

proptest! {
    #[test]
    fn test_vlq_round_trip(value in -(i32::max_value() as i64)..=(i32::max_value() as i64)) {
        let mut encoded = String::new();
        encode_vlq(&mut encoded, value);
        let mut pos = 0;
        prop_assert_eq!(decode_vlq(encoded.as_bytes(), &mut pos).unwrap() as i64, value);
        prop_assert_eq!(pos, encoded.len());
    }

    #[test]
    fn test_decode_reproduces_tokens(tokens in tokens()) {
        let index = index_for(&encode_mappings(&tokens));
        let decoded: Vec<Tok> = index.tokens().map(|tok| as_tok(&tok.get_raw_token())).collect();
        prop_assert_eq!(decoded, tokens);
    }

    #[test]
    fn test_decode_sorts_out_of_order_lines(tokens in tokens()) {
        // reverse every line so that column deltas go negative
        let mut shuffled = tokens.clone();
        shuffled.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        let index = index_for(&encode_mappings(&shuffled));

        let decoded: Vec<Tok> = index.tokens().map(|tok| as_tok(&tok.get_raw_token())).collect();
        for pair in decoded.windows(2) {
            prop_assert!((pair[0].0, pair[0].1) <= (pair[1].0, pair[1].1));
        }
        let mut decoded = decoded;
        let mut expected = tokens;
        decoded.sort();
        expected.sort();
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn test_inverse_index_complete_and_ordered(tokens in tokens()) {
        let index = index_for(&encode_mappings(&tokens));
        let mut total = 0;
        for src_id in 0..index.get_source_count() {
            let mut inverse: Vec<Tok> = index
                .source_tokens(src_id)
                .map(|tok| as_tok(&tok.get_raw_token()))
                .collect();
            for pair in inverse.windows(2) {
                prop_assert!((pair[0].3, pair[0].4) <= (pair[1].3, pair[1].4));
            }
            // reading again hands out the same rows
            let again: Vec<Tok> = index
                .source_tokens(src_id)
                .map(|tok| as_tok(&tok.get_raw_token()))
                .collect();
            prop_assert_eq!(&again, &inverse);

            let mut expected: Vec<Tok> = tokens.iter().cloned().filter(|tok| tok.2 == src_id).collect();
            inverse.sort();
            expected.sort();
            total += inverse.len();
            prop_assert_eq!(inverse, expected);
        }
        prop_assert_eq!(total, tokens.len());
    }

    #[test]
    fn test_lookups_find_every_token(tokens in tokens()) {
        let index = index_for(&encode_mappings(&tokens));
        for tok in &tokens {
            let found = index.lookup_token(tok.0, tok.1).unwrap();
            prop_assert_eq!(found.get_dst(), (tok.0, tok.1));
            if found.get_position() > 0 {
                let prev = index.get_token(found.get_position() as u32 - 1).unwrap();
                prop_assert!(prev.get_dst() != (tok.0, tok.1));
            }

            let found = index.lookup_original(tok.2, tok.3, tok.4).unwrap();
            prop_assert_eq!(found.get_src_id(), Some(tok.2));
            prop_assert_eq!(found.get_src(), Some((tok.3, tok.4)));
        }
    }

    #[test]
    fn test_section_offsets(tokens in tokens(), line in 0u32..100, column in 0u32..100) {
        let json = format!(
            r#"{{"version":3,"sections":[{{"offset":{{"line":{},"column":{}}},"map":{{"version":3,"sources":["a.js","b.js","c.js"],"names":["n0","n1"],"mappings":"{}"}}}}]}}"#,
            line, column, encode_mappings(&tokens)
        );
        let index = MappingIndex::from_slice(json.as_bytes()).unwrap();
        let decoded: Vec<(u32, u32)> = index.tokens().map(|tok| tok.get_dst()).collect();
        let expected: Vec<(u32, u32)> = tokens
            .iter()
            .map(|tok| if tok.0 == 0 { (line, tok.1 + column) } else { (tok.0 + line, tok.1) })
            .collect();
        prop_assert_eq!(decoded, expected);
    }
}
