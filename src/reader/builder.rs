use std::io::Read;
use std::path::Path;

#[cfg(feature = "async")]
use tokio::io::AsyncBufRead;

use crate::{Result, XmlReader};

#[cfg(feature = "async")]
use super::AsyncXmlReader;
use super::{
    open_file,
    parser::{Config, Parser, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_INPUT_DEPTH, DEFAULT_MAX_SIZE},
    FeedSource, Feeder, InputSource, ReadSource, StrSource, XmlResolver,
};

/// Builder for configuring a new reader.
pub struct ReaderBuilder {
    config: Config,
    resolver: Option<Box<dyn XmlResolver>>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    /// Create a new default [`ReaderBuilder`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            resolver: None,
        }
    }

    /// Changes whether a [`StartDocument`] node is reported before anything
    /// else.
    ///
    /// (`false` by default)
    ///
    /// [`StartDocument`]: crate::Node::StartDocument
    pub fn report_start_document(mut self, val: bool) -> Self {
        self.config.report_start_document = val;
        self
    }

    /// Changes whether [`DocType`] and [`EndDocType`] nodes are reported.
    ///
    /// The declarations are parsed and used either way; this only controls
    /// whether the reader stops to show them.
    ///
    /// (`false` by default)
    ///
    /// [`DocType`]: crate::Node::DocType
    /// [`EndDocType`]: crate::Node::EndDocType
    pub fn report_doc_type(mut self, val: bool) -> Self {
        self.config.report_doc_type = val;
        self
    }

    /// Changes whether processing instructions are reported. Processing
    /// instructions inside the DTD are never reported.
    ///
    /// (`false` by default)
    pub fn report_processing_instructions(mut self, val: bool) -> Self {
        self.config.report_processing_instructions = val;
        self
    }

    /// Changes whether CDATA sections are reported on their own.
    ///
    /// When set to `true`, a CDATA section becomes a separate [`Characters`]
    /// node with [`is_cdata`] set. When set to `false`, its content is merged
    /// with the surrounding text.
    ///
    /// (`false` by default)
    ///
    /// [`Characters`]: crate::Node::Characters
    /// [`is_cdata`]: crate::node::Characters::is_cdata
    pub fn report_cdata(mut self, val: bool) -> Self {
        self.config.report_cdata = val;
        self
    }

    /// Changes whether comments are reported. Comments inside the DTD are
    /// never reported.
    ///
    /// (`false` by default)
    pub fn report_comments(mut self, val: bool) -> Self {
        self.config.report_comments = val;
        self
    }

    /// Changes whether references to declared parsed entities in content are
    /// reported as [`EntityReference`] nodes instead of being expanded.
    ///
    /// References to undeclared, unparsed or unresolvable entities are
    /// always reported.
    ///
    /// (`false` by default)
    ///
    /// [`EntityReference`]: crate::Node::EntityReference
    pub fn report_entity_references(mut self, val: bool) -> Self {
        self.config.report_entity_references = val;
        self
    }

    /// Sets the budget, in characters, for open element names, the node
    /// being reported, the DTD, and replacement text of expanded entities.
    /// Exceeding it is a syntax error.
    ///
    /// (16 Mi by default)
    pub fn max_size(mut self, val: usize) -> Self {
        self.config.max_size = val;
        self
    }

    /// Sets the number of characters after which text is reported in chunks,
    /// with [`is_chunk`] set on all but the last.
    ///
    /// (8 Ki by default)
    ///
    /// [`is_chunk`]: crate::node::Characters::is_chunk
    pub fn chunk_size(mut self, val: usize) -> Self {
        self.config.chunk_size = val.max(1);
        self
    }

    /// Sets how many inputs may be stacked: the document, the external
    /// subset and every entity being expanded count one each.
    ///
    /// (32 by default)
    pub fn max_input_depth(mut self, val: usize) -> Self {
        self.config.max_input_depth = val.max(1);
        self
    }

    /// Sets the resolver for the external subset and external entities.
    /// Without one, they are skipped.
    pub fn resolver<R: XmlResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Builds a reader over `source`.
    pub fn into_reader<S: InputSource + 'static>(self, source: S) -> XmlReader {
        let mut parser = Parser::new(self.config, self.resolver);
        parser.push_document(Box::new(source));
        XmlReader::from_parser(parser)
    }

    /// Builds a reader over a string.
    pub fn into_str_reader(self, text: &str) -> XmlReader {
        self.into_reader(StrSource::new(text))
    }

    /// Builds a reader over any [`Read`], decoding UTF-8 or, after a BOM,
    /// UTF-16.
    pub fn into_io_reader<R: Read + 'static>(self, reader: R) -> XmlReader {
        self.into_reader(ReadSource::new(reader))
    }

    /// Builds a reader over a file.
    pub fn into_file_reader<P: AsRef<Path>>(self, path: P) -> Result<XmlReader> {
        Ok(self.into_reader(open_file(path)?))
    }

    /// Builds a reader over a [`FeedSource`] and returns it with the
    /// [`Feeder`] that fills it.
    pub fn into_feed_reader(self) -> (XmlReader, Feeder) {
        let source = FeedSource::new();
        let feeder = source.feeder();
        (self.into_reader(source), feeder)
    }

    /// Builds a reader pulling from an async buffered reader.
    #[cfg(feature = "async")]
    pub fn into_async_reader<R: AsyncBufRead + Unpin>(self, reader: R) -> AsyncXmlReader<R> {
        let (inner, feeder) = self.into_feed_reader();
        AsyncXmlReader::new(inner, feeder, reader)
    }
}
