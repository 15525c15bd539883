//! Module for async-specific reader code.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::node::Node;
use crate::{Error, Result, XmlReader};

use super::{Feeder, ReaderBuilder};

/// Drives an [`XmlReader`] from a [`tokio::io::AsyncBufRead`].
///
/// Bytes are moved from the async reader into the reader's
/// [`FeedSource`](super::FeedSource) whenever parsing runs out of input, so
/// the parser itself never blocks.
///
/// ```
/// # tokio_test();
/// # fn tokio_test() {
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// use pullxml::reader::AsyncXmlReader;
/// use pullxml::Node;
///
/// let mut reader = AsyncXmlReader::from_reader(&b"<a>text</a>"[..]);
/// let mut text = String::new();
/// loop {
///     match reader.next().await.unwrap() {
///         Node::Characters(t) => text.push_str(t.content()),
///         Node::EndDocument => break,
///         _ => {}
///     }
/// }
/// assert_eq!(text, "text");
/// # });
/// # }
/// ```
pub struct AsyncXmlReader<R> {
    reader: XmlReader,
    feeder: Feeder,
    input: R,
}

impl<R: AsyncBufRead + Unpin> AsyncXmlReader<R> {
    pub(crate) fn new(reader: XmlReader, feeder: Feeder, input: R) -> Self {
        Self {
            reader,
            feeder,
            input,
        }
    }

    /// Creates a reader with default options.
    pub fn from_reader(input: R) -> Self {
        ReaderBuilder::new().into_async_reader(input)
    }

    /// Reads the next node, awaiting input as needed.
    pub async fn next(&mut self) -> Result<Node<'_>> {
        loop {
            if self.reader.produce(false)? {
                return Ok(self.reader.current());
            }
            let available = match self.input.fill_buf().await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            };
            if available.is_empty() {
                self.feeder.finish()?;
            } else {
                let used = available.len();
                self.feeder.feed_bytes(available)?;
                self.input.consume(used);
            }
        }
    }

    /// Gets a reference to the reader, to query its state.
    pub fn get_ref(&self) -> &XmlReader {
        &self.reader
    }

    /// Gets a mutable reference to the reader, to change its options.
    pub fn get_mut(&mut self) -> &mut XmlReader {
        &mut self.reader
    }

    /// Consumes this reader, returning the async input.
    pub fn into_inner(self) -> R {
        self.input
    }
}
