//! The JSON shape of a source map and its validation.
//!
//! Fields are first read as loose JSON values so that a field with the
//! wrong type is reported by name instead of as a generic parse error.
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ErrorKind, Result};

#[derive(Debug, Deserialize)]
struct RawSourceMap {
    version: Option<Value>,
    file: Option<Value>,
    #[serde(rename = "sourceRoot")]
    source_root: Option<Value>,
    sources: Option<Value>,
    #[serde(rename = "sourcesContent")]
    sources_content: Option<Value>,
    names: Option<Value>,
    mappings: Option<Value>,
    sections: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    offset: Option<Value>,
    map: Option<Value>,
}

/// A source map whose fields have the expected types.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPayload {
    pub file: Option<String>,
    pub body: MapBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapBody {
    Regular(RegularMap),
    Sections(Vec<SectionPayload>),
}

/// A map with a top level `mappings` string.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularMap {
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    /// `None` if the map does not declare names at all.
    pub names: Option<Vec<String>>,
    pub mappings: String,
}

/// One entry of an index map.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionPayload {
    pub offset_line: u32,
    pub offset_column: u32,
    pub map: RegularMap,
}

/// Parses and validates a source map from JSON bytes.
pub fn parse_slice(slice: &[u8]) -> Result<MapPayload> {
    let value: Value = serde_json::from_slice(slice)?;
    parse_value(value)
}

pub fn parse_value(value: Value) -> Result<MapPayload> {
    if !value.is_object() {
        return Err(shape("", "<root>"));
    }
    let mut raw: RawSourceMap = serde_json::from_value(value)?;
    let file = match raw.file.take() {
        None => None,
        Some(Value::String(file)) => Some(file),
        Some(_) => return Err(shape("", "file")),
    };

    // sections win over a top level mappings string
    let body = match raw.sections.take() {
        Some(sections) => {
            check_version(&raw.version, "")?;
            MapBody::Sections(parse_sections(sections)?)
        }
        None => MapBody::Regular(parse_regular(raw, "")?),
    };

    Ok(MapPayload {
        file: file,
        body: body,
    })
}

fn shape(prefix: &str, field: &str) -> crate::errors::Error {
    ErrorKind::InvalidFieldShape(format!("{}{}", prefix, field)).into()
}

fn check_version(version: &Option<Value>, prefix: &str) -> Result<()> {
    match version.as_ref().and_then(Value::as_i64) {
        Some(3) => Ok(()),
        Some(other) => Err(ErrorKind::UnsupportedVersion(other).into()),
        None => Err(shape(prefix, "version")),
    }
}

fn parse_strings(value: Value, prefix: &str, field: &str) -> Result<Vec<Option<String>>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::String(s) => Ok(Some(s)),
                Value::Null => Ok(None),
                _ => Err(shape(prefix, &format!("{}[{}]", field, idx))),
            })
            .collect(),
        _ => Err(shape(prefix, field)),
    }
}

fn parse_regular(raw: RawSourceMap, prefix: &str) -> Result<RegularMap> {
    check_version(&raw.version, prefix)?;

    let source_root = match raw.source_root {
        None => None,
        Some(Value::String(root)) => Some(root).filter(|root| !root.is_empty()),
        Some(_) => return Err(shape(prefix, "sourceRoot")),
    };

    let sources = match raw.sources {
        Some(value) => parse_strings(value, prefix, "sources")?,
        None => return Err(shape(prefix, "sources")),
    };
    let sources: Vec<String> = sources
        .into_iter()
        .map(|source| {
            let source = source.unwrap_or_default();
            match source_root {
                Some(ref root) if root.ends_with('/') => format!("{}{}", root, source),
                Some(ref root) => format!("{}/{}", root, source),
                None => source,
            }
        })
        .collect();

    let mut sources_content = match raw.sources_content {
        Some(value) => parse_strings(value, prefix, "sourcesContent")?
            .into_iter()
            .map(|content| content.filter(|content| !content.is_empty()))
            .collect(),
        None => vec![],
    };
    sources_content.resize(sources.len(), None);

    let names = match raw.names {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(shape(prefix, &format!("names[{}]", idx))),
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(_) => return Err(shape(prefix, "names")),
        None => None,
    };

    let mappings = match raw.mappings {
        Some(Value::String(mappings)) => mappings,
        _ => return Err(shape(prefix, "mappings")),
    };

    Ok(RegularMap {
        sources: sources,
        sources_content: sources_content,
        names: names,
        mappings: mappings,
    })
}

fn parse_offset(offset: Option<Value>, section: usize) -> Result<(u32, u32)> {
    let offset = match offset {
        Some(Value::Object(offset)) => offset,
        _ => return Err(ErrorKind::InvalidSectionOffset(section).into()),
    };
    let field = |name: &str| {
        offset
            .get(name)
            .and_then(Value::as_u64)
            .filter(|&value| value <= u64::from(i32::max_value() as u32))
            .map(|value| value as u32)
    };
    match (field("line"), field("column")) {
        (Some(line), Some(column)) => Ok((line, column)),
        _ => Err(ErrorKind::InvalidSectionOffset(section).into()),
    }
}

fn parse_sections(sections: Value) -> Result<Vec<SectionPayload>> {
    let sections = match sections {
        Value::Array(sections) => sections,
        _ => return Err(shape("", "sections")),
    };

    let mut rv = Vec::with_capacity(sections.len());
    for (idx, section) in sections.into_iter().enumerate() {
        let prefix = format!("sections[{}].", idx);
        if !section.is_object() {
            return Err(shape(&prefix[..prefix.len() - 1], ""));
        }
        let section: RawSection = serde_json::from_value(section)?;
        let (offset_line, offset_column) = parse_offset(section.offset, idx)?;

        let map = match section.map {
            Some(map @ Value::Object(_)) => map,
            _ => return Err(shape(&prefix, "map")),
        };
        let map_prefix = format!("{}map.", prefix);
        let raw: RawSourceMap = serde_json::from_value(map)?;
        if raw.sections.is_some() {
            return Err(shape(&map_prefix, "sections"));
        }

        rv.push(SectionPayload {
            offset_line: offset_line,
            offset_column: offset_column,
            map: parse_regular(raw, &map_prefix)?,
        });
    }
    Ok(rv)
}


#[cfg(test)]
fn field_of(err: crate::errors::Error) -> String {
    match *err.kind() {
        ErrorKind::InvalidFieldShape(ref field) => field.clone(),
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_parse_regular_map() {
    let payload = parse_slice(br#"{
        "version": 3,
        "file": "out.js",
        "sourceRoot": "src",
        "sources": ["a.js", null, "c.js"],
        "sourcesContent": ["let a;", ""],
        "names": ["a"],
        "mappings": "AAAA"
    }"#).unwrap();
    assert_eq!(payload.file.as_ref().map(|x| &x[..]), Some("out.js"));
    let map = match payload.body {
        MapBody::Regular(map) => map,
        MapBody::Sections(_) => panic!("expected a regular map"),
    };
    assert_eq!(map.sources, vec!["src/a.js", "src/", "src/c.js"]);
    assert_eq!(map.sources_content, vec![Some("let a;".to_string()), None, None]);
    assert_eq!(map.names, Some(vec!["a".to_string()]));
    assert_eq!(map.mappings, "AAAA");
}

#[test]
fn test_parse_rejects_bad_shapes() {
    match *parse_slice(br#"{"version":2,"sources":[],"mappings":""}"#).unwrap_err().kind() {
        ErrorKind::UnsupportedVersion(2) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *parse_slice(br#"{"version":-1,"sources":[],"mappings":""}"#).unwrap_err().kind() {
        ErrorKind::UnsupportedVersion(-1) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(field_of(parse_slice(br#"{"sources":[],"mappings":""}"#).unwrap_err()), "version");
    assert_eq!(field_of(parse_slice(br#"{"version":"3","sources":[],"mappings":""}"#).unwrap_err()), "version");
    assert_eq!(field_of(parse_slice(br#"{"version":3,"sources":{},"mappings":""}"#).unwrap_err()), "sources");
    assert_eq!(field_of(parse_slice(br#"{"version":3,"sources":[1],"mappings":""}"#).unwrap_err()), "sources[0]");
    assert_eq!(field_of(parse_slice(br#"{"version":3,"sources":[],"mappings":7}"#).unwrap_err()), "mappings");
    assert_eq!(field_of(parse_slice(br#"{"version":3,"sources":[],"names":"x","mappings":""}"#).unwrap_err()), "names");
    assert_eq!(field_of(parse_slice(br#"[3]"#).unwrap_err()), "<root>");

    match *parse_slice(b"{\"version\":3,").unwrap_err().kind() {
        ErrorKind::MalformedJson(_) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_parse_sections() {
    let payload = parse_slice(br#"{
        "version": 3,
        "sections": [
            {"offset": {"line": 10, "column": 5}, "map": {"version": 3, "sources": ["b.js"], "mappings": "AAAA"}},
            {"offset": {"line": 0, "column": 0}, "map": {"version": 3, "sources": ["a.js"], "names": [], "mappings": ""}}
        ]
    }"#).unwrap();
    let sections = match payload.body {
        MapBody::Sections(sections) => sections,
        MapBody::Regular(_) => panic!("expected sections"),
    };
    assert_eq!(sections.len(), 2);
    assert_eq!((sections[0].offset_line, sections[0].offset_column), (10, 5));
    assert_eq!(sections[0].map.sources, vec!["b.js"]);
    assert_eq!(sections[1].map.names, Some(vec![]));
}

#[test]
fn test_parse_rejects_bad_sections() {
    match *parse_slice(br#"{"version":3,"sections":[{"offset":{"line":-1,"column":0},"map":{}}]}"#).unwrap_err().kind() {
        ErrorKind::InvalidSectionOffset(0) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    match *parse_slice(br#"{"version":3,"sections":[{"map":{}}]}"#).unwrap_err().kind() {
        ErrorKind::InvalidSectionOffset(0) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        field_of(parse_slice(br#"{"version":3,"sections":[{"offset":{"line":0,"column":0},"url":"x.map"}]}"#).unwrap_err()),
        "sections[0].map"
    );
    assert_eq!(
        field_of(parse_slice(br#"{"version":3,"sections":[{"offset":{"line":0,"column":0},"map":{"version":3,"sources":"a","mappings":""}}]}"#).unwrap_err()),
        "sections[0].map.sources"
    );
    match *parse_slice(br#"{"version":3,"sections":[{"offset":{"line":0,"column":0},"map":{"version":4,"sources":[],"mappings":""}}]}"#).unwrap_err().kind() {
        ErrorKind::UnsupportedVersion(4) => {}
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(field_of(parse_slice(br#"{"version":3,"sections":{}}"#).unwrap_err()), "sections");
}
