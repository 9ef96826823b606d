//! Decodes JavaScript source maps into flat integer tables and answers
//! position queries in both directions.
//!
//! ```
//! use sourcemap_explorer::MappingIndex;
//!
//! let index = MappingIndex::from_slice(br#"{
//!     "version": 3,
//!     "sources": ["app.js"],
//!     "names": [],
//!     "mappings": "AAAA,IAAI"
//! }"#).unwrap();
//! let token = index.lookup_token(0, 6).unwrap();
//! assert_eq!(token.get_src(), Some((0, 4)));
//! assert_eq!(token.get_source(), Some("app.js"));
//! ```
#[macro_use]
extern crate error_chain;

mod decoder;
mod detector;
mod errors;
mod index;
mod inverse;
mod jsontypes;
mod lines;
mod lookup;
mod sections;
mod session;
mod types;
mod vlq;

pub use decoder::{decode_mappings, decode_mappings_with_progress, DecodeOptions, NoProgress, Progress};
pub use detector::{find_inline_sourcemap, find_sourcemap_reference};
pub use errors::{Error, ErrorKind, Result};
pub use index::{MappingIndex, Source};
pub use inverse::InverseTable;
pub use lines::LineLengths;
pub use lookup::{MappingRange, TableRef, Token};
pub use session::{Hover, Pane, Session};
pub use types::{MappingTable, RawToken, Stride, MISSING};
pub use vlq::decode_vlq;
