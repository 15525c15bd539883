//! A resumable, DTD-aware XML pull reader.
//!
//! ## Description
//!
//! pullxml reads a document one character at a time and hands out one
//! [`Node`] per call. Parsing can stop after any character: a source that has
//! no data yet makes [`XmlReader::advance`] return `None`, and the next call
//! continues exactly where the last one stopped.
//!
//! Beyond elements and text, the reader understands document type
//! definitions: internal and external subsets, parameter and general
//! entities, conditional sections, attribute defaults and content models.
//! Entities are expanded by pushing their replacement text as a new input,
//! so the same state machine parses it.
//!
//! Memory held for names, declarations and entity expansion is metered
//! against [`ReaderBuilder::max_size`], which turns exponential entity
//! expansion into an ordinary error.
//!
//! ## Example
//!
//! ```
//! use pullxml::{Node, XmlReader};
//!
//! let xml = r#"<!DOCTYPE r [<!ENTITY who "world">]><r greeting="hello">&who;</r>"#;
//! let mut reader = XmlReader::from_str(xml);
//! let mut text = String::new();
//! loop {
//!     match reader.next().unwrap() {
//!         Node::StartElement(e) => {
//!             assert_eq!(e.attributes().find("greeting").unwrap().value(), "hello");
//!         }
//!         Node::Characters(t) => text.push_str(t.content()),
//!         Node::EndDocument => break,
//!         _ => {}
//!     }
//! }
//! assert_eq!(text, "world");
//! ```
//!
//! ## Features
//!
//! `pullxml` supports the following features:
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![recursion_limit = "1024"]
// Enable feature requirements in the docs from 1.57
// See https://stackoverflow.com/questions/61417452
#![cfg_attr(docs_rs, feature(doc_auto_cfg))]

mod attributes;
pub mod dtd;
mod errors;
pub mod name;
pub mod node;
pub mod reader;

pub use crate::attributes::{Attribute, AttributeList};
pub use crate::dtd::DocTypeDefinition;
pub use crate::errors::{Error, Result, SyntaxError};
pub use crate::name::QName;
pub use crate::node::{Node, NodeType};
pub use crate::reader::{ReaderBuilder, XmlReader};
