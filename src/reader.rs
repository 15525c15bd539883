//! A module to handle `XmlReader`

#[cfg(feature = "async")]
mod azync;
mod builder;
mod input;
mod parser;
mod resolver;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use delegate::delegate;

use crate::dtd::DocTypeDefinition;
use crate::errors::Result;
use crate::name::NamespaceContext;
use crate::node::{Node, XmlDeclaration};

use self::parser::Parser;

#[cfg(feature = "async")]
pub use self::azync::AsyncXmlReader;
pub use self::builder::ReaderBuilder;
pub use self::input::{FeedSource, Feeder, Fill, InputSource, NullInputSource, ReadSource, StrSource};
pub use self::resolver::{FileResolver, MemoryResolver, XmlResolver};

/// A pull reader producing one [`Node`] per call.
///
/// # Examples
///
/// ```
/// use pullxml::{Node, XmlReader};
///
/// let xml = r#"<tag1 att1 = "test">
///                 <tag2><!--Test comment-->Test</tag2>
///                 <tag2>Test 2</tag2>
///             </tag1>"#;
/// let mut reader = XmlReader::builder().report_comments(true).into_str_reader(xml);
/// let mut count = 0;
/// let mut txt = Vec::new();
/// loop {
///     match reader.next() {
///         Ok(Node::StartElement(e)) => {
///             if e.local_name() == "tag2" {
///                 count += 1;
///             }
///         }
///         Ok(Node::Characters(t)) if !t.is_whitespace() => txt.push(t.content().to_owned()),
///         Ok(Node::EndDocument) => break,
///         Err(e) => panic!("Error at line {}: {:?}", reader.line(), e),
///         _ => (),
///     }
/// }
/// assert_eq!(count, 2);
/// assert_eq!(txt, vec!["Test", "Test 2"]);
/// ```
pub struct XmlReader {
    parser: Parser,
}

impl XmlReader {
    /// Creates a reader with default options over `source`.
    pub fn new<S: InputSource + 'static>(source: S) -> Self {
        ReaderBuilder::new().into_reader(source)
    }

    /// Returns a builder to configure a reader.
    pub fn builder() -> ReaderBuilder {
        ReaderBuilder::new()
    }

    /// Creates a reader with default options over a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Self {
        ReaderBuilder::new().into_str_reader(text)
    }

    /// Creates a reader with default options over any [`Read`].
    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        ReaderBuilder::new().into_io_reader(reader)
    }

    /// Creates a reader with default options over a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        ReaderBuilder::new().into_file_reader(path)
    }

    pub(crate) fn from_parser(parser: Parser) -> Self {
        Self { parser }
    }

    /// Returns the current node, reading the first one if nothing was read
    /// yet. Blocks like [`next`](Self::next).
    pub fn get(&mut self) -> Result<Node> {
        if !self.parser.has_node() {
            self.parser.produce(true)?;
        }
        Ok(self.current())
    }

    /// Reads the next node.
    ///
    /// After [`Node::EndDocument`], every call returns `EndDocument` again.
    /// After an error, every call fails until the reader is [reset].
    ///
    /// # Errors
    ///
    /// [`Error::WouldBlock`] if the input has no data available right now.
    /// Parsing can continue with the next call once it has.
    ///
    /// [reset]: Self::reset
    /// [`Error::WouldBlock`]: crate::Error::WouldBlock
    pub fn next(&mut self) -> Result<Node> {
        self.parser.produce(true)?;
        Ok(self.current())
    }

    /// Non-blocking [`next`](Self::next): returns `None` when the input has
    /// no data available right now.
    pub fn advance(&mut self) -> Result<Option<Node>> {
        if self.parser.produce(false)? {
            Ok(Some(self.current()))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn produce(&mut self, blocking: bool) -> Result<bool> {
        self.parser.produce(blocking)
    }

    pub(crate) fn current(&self) -> Node {
        self.parser.node().unwrap_or(Node::EndDocument)
    }

    /// Drops the input and everything learned about the document, keeping
    /// options, resolver and allocated buffers. Sources obtained from the
    /// resolver are handed back to it.
    pub fn reset(&mut self) {
        self.parser.reset();
    }

    /// Resets the reader and starts reading `source`.
    pub fn reset_with<S: InputSource + 'static>(&mut self, source: S) {
        self.parser.reset();
        self.parser.push_document(Box::new(source));
    }

    delegate! {
        to self.parser {
            /// Current line of the input being read, 1-based. Inside an
            /// entity, this is the line of the replacement text.
            pub fn line(&self) -> usize;
            /// Number of open elements.
            pub fn depth(&self) -> usize;
            /// The document type definition read so far. It is empty for
            /// documents without `<!DOCTYPE`.
            pub fn dtd(&self) -> &DocTypeDefinition;
            /// The XML declaration, if the document starts with one.
            pub fn declaration(&self) -> Option<&XmlDeclaration>;
            /// Namespace bindings in scope.
            pub fn namespace_context(&self) -> &NamespaceContext;
            /// Characters currently charged against the size budget.
            pub fn used_size(&self) -> usize;
        }
    }

    /// Whether a [`Node::StartDocument`] is reported first.
    pub fn report_start_document(&self) -> bool {
        self.parser.config.report_start_document
    }

    /// See [`ReaderBuilder::report_start_document`].
    pub fn set_report_start_document(&mut self, val: bool) {
        self.parser.config.report_start_document = val;
    }

    /// Whether [`Node::DocType`] and [`Node::EndDocType`] are reported.
    pub fn report_doc_type(&self) -> bool {
        self.parser.config.report_doc_type
    }

    /// See [`ReaderBuilder::report_doc_type`].
    pub fn set_report_doc_type(&mut self, val: bool) {
        self.parser.config.report_doc_type = val;
    }

    /// Whether processing instructions are reported.
    pub fn report_processing_instructions(&self) -> bool {
        self.parser.config.report_processing_instructions
    }

    /// See [`ReaderBuilder::report_processing_instructions`].
    pub fn set_report_processing_instructions(&mut self, val: bool) {
        self.parser.config.report_processing_instructions = val;
    }

    /// Whether CDATA sections are reported as separate character nodes.
    pub fn report_cdata(&self) -> bool {
        self.parser.config.report_cdata
    }

    /// See [`ReaderBuilder::report_cdata`].
    pub fn set_report_cdata(&mut self, val: bool) {
        self.parser.config.report_cdata = val;
    }

    /// Whether comments are reported.
    pub fn report_comments(&self) -> bool {
        self.parser.config.report_comments
    }

    /// See [`ReaderBuilder::report_comments`].
    pub fn set_report_comments(&mut self, val: bool) {
        self.parser.config.report_comments = val;
    }

    /// Whether references to declared internal entities are reported
    /// instead of expanded.
    pub fn report_entity_references(&self) -> bool {
        self.parser.config.report_entity_references
    }

    /// See [`ReaderBuilder::report_entity_references`].
    pub fn set_report_entity_references(&mut self, val: bool) {
        self.parser.config.report_entity_references = val;
    }
}

impl std::fmt::Debug for XmlReader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("XmlReader")
            .field("line", &self.line())
            .field("depth", &self.depth())
            .finish()
    }
}

pub(crate) fn open_file<P: AsRef<Path>>(path: P) -> Result<ReadSource<BufReader<File>>> {
    Ok(ReadSource::new(BufReader::new(File::open(path)?)))
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// `S` of the XML grammar.
#[inline]
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\r' | '\n' | '\t')
}

/// `NameStartChar` of XML 1.0 (fifth edition), without the colon.
#[inline]
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'a'..='z' | 'A'..='Z' | '_'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// `NameChar` of XML 1.0 (fifth edition), without the colon.
#[inline]
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// `Char` of XML 1.0.
#[inline]
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_chars() {
        assert!(is_name_start_char('a'));
        assert!(is_name_start_char('é'));
        assert!(!is_name_start_char(':'));
        assert!(!is_name_start_char('-'));
        assert!(!is_name_start_char('1'));
        assert!(is_name_char('-'));
        assert!(is_name_char('1'));
        assert!(!is_name_char(' '));
    }

    #[test]
    fn xml_chars() {
        assert!(is_xml_char('\t'));
        assert!(!is_xml_char('\u{0}'));
        assert!(!is_xml_char('\u{1}'));
        assert!(!is_xml_char('\u{FFFE}'));
        assert!(is_xml_char('\u{1F600}'));
    }

    #[test]
    fn get_reads_first_node_once() {
        let mut reader = XmlReader::from_str("<a/>");
        assert_eq!(reader.get().unwrap().node_type(), crate::NodeType::StartElement);
        assert_eq!(reader.get().unwrap().node_type(), crate::NodeType::StartElement);
        assert_eq!(reader.next().unwrap().node_type(), crate::NodeType::EndElement);
    }

    #[test]
    fn feed_would_block() {
        let source = FeedSource::new();
        let feeder = source.feeder();
        let mut reader = XmlReader::new(source);

        feeder.feed("<a>te");
        assert!(matches!(reader.next(), Ok(Node::StartElement(_))));
        match reader.next() {
            Err(Error::WouldBlock) => {}
            x => panic!("Expected `Err(WouldBlock)`, but got `{:?}`", x),
        }
        assert!(reader.advance().unwrap().is_none());
        feeder.feed("xt</a>");
        feeder.finish().unwrap();
        match reader.next() {
            Ok(Node::Characters(t)) => assert_eq!(t.content(), "text"),
            x => panic!("Expected `Ok(Characters)`, but got `{:?}`", x),
        }
    }

    #[test]
    fn reset_with_new_source() {
        let mut reader = XmlReader::from_str("<a><b>");
        reader.next().unwrap();
        reader.next().unwrap();
        assert_eq!(reader.depth(), 2);
        reader.reset_with(StrSource::new("<c/>"));
        assert_eq!(reader.depth(), 0);
        match reader.next() {
            Ok(Node::StartElement(e)) => assert_eq!(e.name().as_str(), "c"),
            x => panic!("Expected `Ok(StartElement)`, but got `{:?}`", x),
        }
    }
}
