//! Extraction of source maps embedded in generated code.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{ErrorKind, Result};

static SOURCE_MAPPING_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"//[#@]\s*sourceMappingURL=data:([^,\s]*),(\S*)").unwrap()
});

/// Finds a `//# sourceMappingURL=data:...` comment and returns the map it
/// carries.
///
/// Only base64 data URLs are understood.  If the code carries several such
/// comments the last one wins.  Returns `Ok(None)` if there is none.
pub fn find_inline_sourcemap(source: &str) -> Result<Option<Vec<u8>>> {
    let caps = match SOURCE_MAPPING_URL.captures_iter(source).last() {
        Some(caps) => caps,
        None => return Ok(None),
    };
    let mime = caps.get(1).map_or("", |m| m.as_str());
    if !mime.ends_with(";base64") {
        tracing::debug!(mime = mime, "ignoring data url that is not base64");
        return Ok(None);
    }
    let payload = caps.get(2).map_or("", |m| m.as_str());
    STANDARD
        .decode(payload)
        .map(Some)
        .map_err(|err| {
            tracing::debug!(error = %err, "bad base64 in sourceMappingURL");
            ErrorKind::InvalidFieldShape("sourceMappingURL".into()).into()
        })
}

/// Returns the URL of a `sourceMappingURL` comment that points to an
/// external file.
pub fn find_sourcemap_reference(source: &str) -> Option<&str> {
    static REFERENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"//[#@]\s*sourceMappingURL=(\S+)").unwrap()
    });
    REFERENCE
        .captures_iter(source)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|url| !url.starts_with("data:"))
}


#[test]
fn test_find_inline_sourcemap() {
    // {"version":3}
    let js = "var a = 1;\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,eyJ2ZXJzaW9uIjozfQ==\n";
    assert_eq!(
        find_inline_sourcemap(js).unwrap(),
        Some(br#"{"version":3}"#.to_vec())
    );
    let legacy = "//@ sourceMappingURL=data:application/json;base64,eyJ2ZXJzaW9uIjozfQ==";
    assert!(find_inline_sourcemap(legacy).unwrap().is_some());

    // the comment may trail code on the same line
    let trailing = "foo();//# sourceMappingURL=data:application/json;base64,eyJ2ZXJzaW9uIjozfQ==";
    assert_eq!(
        find_inline_sourcemap(trailing).unwrap(),
        Some(br#"{"version":3}"#.to_vec())
    );
}

#[test]
fn test_find_inline_sourcemap_absent_or_bad() {
    assert_eq!(find_inline_sourcemap("var a = 1;").unwrap(), None);
    assert_eq!(find_inline_sourcemap("//# sourceMappingURL=a.js.map").unwrap(), None);
    assert_eq!(
        find_inline_sourcemap("//# sourceMappingURL=data:application/json,{}").unwrap(),
        None
    );
    match *find_inline_sourcemap("//# sourceMappingURL=data:application/json;base64,!!!")
        .unwrap_err()
        .kind()
    {
        ErrorKind::InvalidFieldShape(ref field) => assert_eq!(field, "sourceMappingURL"),
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_find_sourcemap_reference() {
    assert_eq!(find_sourcemap_reference("x();\n//# sourceMappingURL=x.js.map\n"), Some("x.js.map"));
    assert_eq!(
        find_sourcemap_reference("//# sourceMappingURL=data:application/json;base64,e30="),
        None
    );
    assert_eq!(find_sourcemap_reference("x();//# sourceMappingURL=x.js.map"), Some("x.js.map"));
    assert_eq!(find_sourcemap_reference("x();"), None);
}
