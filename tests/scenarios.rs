use std::ops::ControlFlow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use sourcemap_explorer::{
    find_inline_sourcemap, DecodeOptions, ErrorKind, MappingIndex, Pane, Session, Stride, TableRef,
};

#[test]
fn test_single_unmapped_entry_without_sources() {
    let index = MappingIndex::from_slice(br#"{"version":3,"sources":[],"mappings":"AAAA"}"#).unwrap();
    assert_eq!(index.get_token_count(), 1);
    assert_eq!(index.get_table().as_slice(), &[0, 0, -1, -1, -1][..]);

    let token = index.lookup_token(0, 0).unwrap();
    assert!(!token.has_source());
    assert_eq!(token.get_source(), None);
    assert_eq!(token.counterpart(), None);
    assert_eq!(index.get_source_count(), 0);
    assert_eq!(index.source_tokens(0).count(), 0);
}

#[test]
fn test_duplicate_positions_resolve_to_first() {
    let index = MappingIndex::from_slice(
        br#"{"version":3,"sources":["a.js"],"mappings":"AAAA,AACA"}"#,
    ).unwrap();
    let token = index.lookup_token(0, 0).unwrap();
    assert_eq!(token.get_position(), 0);
    assert_eq!(token.get_src(), Some((0, 0)));
    assert!(index.range_of(&token).is_some());
    assert!(index.get_token(1).unwrap().range().is_none());
}

#[test]
fn test_unsupported_version() {
    let err = MappingIndex::from_slice(br#"{"version":2, "sources":[], "mappings":""}"#).unwrap_err();
    match *err.kind() {
        ErrorKind::UnsupportedVersion(2) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_invalid_vlq_character_offset() {
    let err = MappingIndex::from_slice(br#"{"version":3,"sources":["a.js"],"mappings":"AAAA;AA!A"}"#)
        .unwrap_err();
    match *err.kind() {
        ErrorKind::InvalidVlqCharacter(7) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains('7'));
}

#[test]
fn test_name_index_out_of_range() {
    let err = MappingIndex::from_slice(
        br#"{"version":3,"sources":["a.js"],"names":["x"],"mappings":"AAAAC"}"#,
    ).unwrap_err();
    match *err.kind() {
        ErrorKind::IndexOutOfRange("name", _) => {}
        ref other => panic!("unexpected error {:?}", other),
    }

    // without name tracking the name field is never looked at
    let index = MappingIndex::from_slice_with_options(
        br#"{"version":3,"sources":["a.js"],"names":["x"],"mappings":"AAAAC"}"#,
        &DecodeOptions {
            with_names: false,
            ..DecodeOptions::default()
        },
        &mut sourcemap_explorer::NoProgress,
    ).unwrap();
    assert_eq!(index.get_stride(), Stride::Basic);
    assert_eq!(index.get_token(0).unwrap().get_name(), None);
}

#[test]
fn test_index_map_round_trip_through_queries() {
    let index = MappingIndex::from_slice(br#"{
        "version": 3,
        "file": "bundle.js",
        "sections": [
            {"offset": {"line": 0, "column": 0},
             "map": {"version": 3, "sources": ["a.js"], "names": ["a"], "mappings": "AAAAA"}},
            {"offset": {"line": 10, "column": 5},
             "map": {"version": 3, "sources": ["b.js"], "sourcesContent": ["b();"], "mappings": "GAAA;GAAA"}}
        ]
    }"#).unwrap();
    assert_eq!(index.get_file(), Some("bundle.js"));
    assert_eq!(index.get_stride(), Stride::WithNames);
    assert_eq!(index.sources().map(|s| s.get_name()).collect::<Vec<_>>(), vec!["a.js", "b.js"]);
    assert_eq!(index.get_source_contents(1), Some("b();"));

    let token = index.lookup_token(10, 9).unwrap();
    assert_eq!(token.get_dst(), (10, 8));
    assert_eq!(token.get_source(), Some("b.js"));
    assert_eq!(index.lookup_token(11, 3).unwrap().get_dst(), (11, 3));
    assert!(index.lookup_token(11, 2).is_none());
    assert_eq!(index.lookup_token(0, 0).unwrap().get_name(), Some("a"));

    let back = index.lookup_original(1, 0, 0).unwrap();
    assert_eq!(back.get_table(), TableRef::Source(1));
    assert_eq!(back.get_dst(), (10, 8));
}

#[test]
fn test_progress_and_cancellation() {
    let json = format!(
        r#"{{"version":3,"sources":["a.js"],"mappings":"{}"}}"#,
        vec!["AAAA"; 200].join(";")
    );
    let opts = DecodeOptions {
        progress_interval: 100,
        ..DecodeOptions::default()
    };

    let mut reports = vec![];
    let mut record = |processed: usize, total: usize| -> ControlFlow<()> {
        reports.push((processed, total));
        ControlFlow::Continue(())
    };
    let index = MappingIndex::from_slice_with_options(json.as_bytes(), &opts, &mut record).unwrap();
    assert_eq!(index.get_token_count(), 200);
    assert!(reports.len() > 1);
    assert_eq!(reports.last(), Some(&(999, 999)));

    let mut cancel = |_processed: usize, _total: usize| -> ControlFlow<()> { ControlFlow::Break(()) };
    let err = MappingIndex::from_slice_with_options(json.as_bytes(), &opts, &mut cancel).unwrap_err();
    match *err.kind() {
        ErrorKind::Cancelled => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_session_with_inline_map() {
    let map = br#"{"version":3,"sources":["a.js"],"sourcesContent":["foo("],"mappings":"AAAA,IAAI"}"#;
    let js = format!(
        "foo();\n//# sourceMappingURL=data:application/json;base64,{}\n",
        STANDARD.encode(&map[..])
    );

    let json = find_inline_sourcemap(&js).unwrap().unwrap();
    assert_eq!(&json[..], &map[..]);

    let mut session = Session::new();
    session.load(&json, Some(js.as_str())).unwrap();
    let hover = session.hover_at(Pane::Generated, 0, 5).unwrap();
    assert_eq!(hover.position, 1);
    assert_eq!((hover.range.start_column, hover.range.end_column), (4, 6));
    assert_eq!(hover.counterpart, Some((TableRef::Source(0), 0, 4)));

    let hover = session.hover_at(Pane::Original(0), 0, 4).unwrap();
    assert!(hover.range.is_last_in_line);
    assert!(!hover.range.is_bad_mapping);
    assert_eq!(hover.counterpart, Some((TableRef::Generated, 0, 4)));

    assert!(session.load(b"{}", None).is_err());
    assert!(session.hover_at(Pane::Generated, 0, 0).is_some());
}
