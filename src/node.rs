//! Defines nodes produced by the [`XmlReader`].
//!
//! A node borrows from the reader that produced it. The reader owns one
//! payload per node kind and overwrites it in place when it moves on, so a
//! node can never outlive the next call to [`XmlReader::next`] or
//! [`XmlReader::advance`]; the borrow checker enforces that.
//!
//! [`XmlReader`]: crate::XmlReader
//! [`XmlReader::next`]: crate::XmlReader::next
//! [`XmlReader::advance`]: crate::XmlReader::advance

use std::fmt;

use crate::attributes::AttributeList;
use crate::dtd::DocTypeDefinition;
use crate::name::{Namespace, QName};

/// Discriminant of a [`Node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Start of the document, reported only if enabled
    StartDocument,
    /// End of the document
    EndDocument,
    /// `<!DOCTYPE` with the root name and external identifiers known
    DocType,
    /// Both subsets of the document type definition are parsed
    EndDocType,
    /// Start tag or empty-element tag
    StartElement,
    /// End tag, also reported after an empty-element tag
    EndElement,
    /// Character data, possibly split into chunks
    Characters,
    /// `<!-- ... -->`
    Comment,
    /// `<?target data?>`
    ProcessingInstruction,
    /// An entity reference that was not expanded
    EntityReference,
}

/// Event produced by the reader.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    /// Start of the document
    StartDocument,
    /// End of the document
    EndDocument,
    /// `<!DOCTYPE`, with the definition as parsed so far
    DocType(&'a DocTypeDefinition),
    /// End of the DOCTYPE, with the complete definition
    EndDocType(&'a DocTypeDefinition),
    /// Start tag
    StartElement(&'a StartElement),
    /// End tag
    EndElement(&'a EndElement),
    /// Text or CDATA content
    Characters(&'a Characters),
    /// Comment text, without the delimiters
    Comment(&'a str),
    /// Processing instruction
    ProcessingInstruction(&'a ProcessingInstruction),
    /// Name of an entity reference reported instead of expanded
    EntityReference(&'a str),
}

impl<'a> Node<'a> {
    /// Kind of this node.
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::StartDocument => NodeType::StartDocument,
            Node::EndDocument => NodeType::EndDocument,
            Node::DocType(_) => NodeType::DocType,
            Node::EndDocType(_) => NodeType::EndDocType,
            Node::StartElement(_) => NodeType::StartElement,
            Node::EndElement(_) => NodeType::EndElement,
            Node::Characters(_) => NodeType::Characters,
            Node::Comment(_) => NodeType::Comment,
            Node::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
            Node::EntityReference(_) => NodeType::EntityReference,
        }
    }

    /// Returns `true` for [`Node::EndDocument`].
    pub fn is_end_document(&self) -> bool {
        matches!(self, Node::EndDocument)
    }
}

/// Payload of [`Node::StartElement`].
#[derive(Default)]
pub struct StartElement {
    pub(crate) name: QName,
    pub(crate) namespace: String,
    pub(crate) attributes: AttributeList,
    pub(crate) mappings: Vec<Namespace>,
    pub(crate) empty: bool,
}

impl StartElement {
    /// The qualified name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Local part of the name.
    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    /// Resolved namespace name, empty if the element is in no namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Attributes, without namespace declarations.
    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    /// Namespace declarations made by this tag.
    pub fn namespace_mappings(&self) -> &[Namespace] {
        &self.mappings
    }

    /// Whether the tag was an empty-element tag `<a/>`.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub(crate) fn clear(&mut self) {
        self.name.clear();
        self.namespace.clear();
        self.attributes.clear();
        self.mappings.clear();
        self.empty = false;
    }
}

impl fmt::Debug for StartElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StartElement")
            .field("name", &self.name.as_str())
            .field("namespace", &self.namespace)
            .field("attributes", &self.attributes)
            .field("empty", &self.empty)
            .finish()
    }
}

/// Payload of [`Node::EndElement`].
#[derive(Default)]
pub struct EndElement {
    pub(crate) name: QName,
    pub(crate) namespace: String,
    pub(crate) mappings: Vec<Namespace>,
}

impl EndElement {
    /// The qualified name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Local part of the name.
    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    /// Resolved namespace name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace bindings that go out of scope with this element.
    pub fn namespace_mappings(&self) -> &[Namespace] {
        &self.mappings
    }

    pub(crate) fn clear(&mut self) {
        self.name.clear();
        self.namespace.clear();
        self.mappings.clear();
    }
}

impl fmt::Debug for EndElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EndElement")
            .field("name", &self.name.as_str())
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Payload of [`Node::Characters`].
#[derive(Debug, Default)]
pub struct Characters {
    pub(crate) content: String,
    pub(crate) chunk: bool,
    pub(crate) cdata: bool,
}

impl Characters {
    /// The text, with line ends normalized to `\n` and references expanded.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the text run continues in the next `Characters` node.
    pub fn is_chunk(&self) -> bool {
        self.chunk
    }

    /// Whether the text comes from a CDATA section.
    pub fn is_cdata(&self) -> bool {
        self.cdata
    }

    /// Whether the text consists of whitespace only.
    pub fn is_whitespace(&self) -> bool {
        self.content.chars().all(crate::reader::is_whitespace)
    }

    pub(crate) fn clear(&mut self) {
        self.content.clear();
        self.chunk = false;
        self.cdata = false;
    }
}

/// Payload of [`Node::ProcessingInstruction`].
#[derive(Debug, Default)]
pub struct ProcessingInstruction {
    pub(crate) target: String,
    pub(crate) data: String,
}

impl ProcessingInstruction {
    /// The PI target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Everything after the target and the whitespace following it.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub(crate) fn clear(&mut self) {
        self.target.clear();
        self.data.clear();
    }
}

/// Contents of the `<?xml ...?>` declaration at the start of a document.
///
/// The declaration is not reported as a node; it is available from
/// [`XmlReader::declaration`](crate::XmlReader::declaration) once parsed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlDeclaration {
    version: String,
    encoding: Option<String>,
    standalone: Option<bool>,
}

impl XmlDeclaration {
    /// The `version` pseudo-attribute, `1.0` in practice.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `encoding` pseudo-attribute. The reader decodes its input before
    /// parsing, so this is informative only.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// The `standalone` pseudo-attribute.
    pub fn standalone(&self) -> Option<bool> {
        self.standalone
    }

    /// Parses the data of the declaration, everything after `xml`.
    pub(crate) fn parse(data: &str) -> Result<Self, &'static str> {
        let ws = crate::reader::is_whitespace;
        let mut decl = XmlDeclaration::default();
        // 0: nothing, 1: version, 2: encoding, 3: standalone
        let mut seen = 0;
        let mut rest = data.trim_start_matches(ws);
        while !rest.is_empty() {
            let eq = rest.find('=').ok_or("'=' expected in XML declaration")?;
            let name = rest[..eq].trim_end_matches(ws);
            rest = rest[eq + 1..].trim_start_matches(ws);
            let quote = match rest.chars().next() {
                Some(q @ '"') | Some(q @ '\'') => q,
                _ => return Err("quoted value expected in XML declaration"),
            };
            let end = rest[1..]
                .find(quote)
                .ok_or("unterminated value in XML declaration")?
                + 1;
            let value = &rest[1..end];
            rest = &rest[end + 1..];
            if rest.starts_with(|c: char| !ws(c)) {
                return Err("whitespace expected between XML declaration attributes");
            }
            rest = rest.trim_start_matches(ws);

            match name {
                "version" if seen == 0 => {
                    if !value.starts_with("1.") || value.len() < 3 {
                        return Err("unsupported XML version");
                    }
                    decl.version = value.to_owned();
                    seen = 1;
                }
                "encoding" if seen == 1 => {
                    decl.encoding = Some(value.to_owned());
                    seen = 2;
                }
                "standalone" if seen == 1 || seen == 2 => {
                    decl.standalone = Some(match value {
                        "yes" => true,
                        "no" => false,
                        _ => return Err("standalone must be 'yes' or 'no'"),
                    });
                    seen = 3;
                }
                _ => return Err("unexpected attribute in XML declaration"),
            }
        }
        if seen == 0 {
            return Err("version missing in XML declaration");
        }
        Ok(decl)
    }
}
