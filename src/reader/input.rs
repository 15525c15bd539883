//! Character sources the reader pulls from, and the stack of sources that
//! entity expansion and external subsets push on top of the document.

use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_8};

use crate::errors::{Error, Result};

/// Size of the byte buffer of [`ReadSource`].
const READ_BUF_SIZE: usize = 8 * 1024;

/// Outcome of [`InputSource::import`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    /// New characters are buffered; the count is informative only
    Imported(usize),
    /// Nothing is available right now, try again later
    Pending,
    /// The source has no more characters
    Exhausted,
}

/// A producer of characters.
///
/// The reader takes characters with [`get`](Self::get) until it returns
/// `None`, then asks for more with [`import`](Self::import). A source that
/// answers [`Fill::Pending`] suspends the non-blocking
/// [`XmlReader::advance`](crate::XmlReader::advance).
pub trait InputSource {
    /// Takes the next buffered character.
    fn get(&mut self) -> Option<char>;

    /// Number of bytes buffered and not yet taken; zero means that
    /// [`get`](Self::get) returns `None`.
    fn avail(&self) -> usize;

    /// Refills the buffer.
    fn import(&mut self) -> Result<Fill>;

    /// Current 1-based line.
    fn line(&self) -> usize;

    /// Overrides the line counter.
    fn set_line(&mut self, line: usize);
}

/// A source that never has anything. It sits at the bottom of every
/// [`InputStack`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInputSource;

impl InputSource for NullInputSource {
    fn get(&mut self) -> Option<char> {
        None
    }

    fn avail(&self) -> usize {
        0
    }

    fn import(&mut self) -> Result<Fill> {
        Ok(Fill::Exhausted)
    }

    fn line(&self) -> usize {
        0
    }

    fn set_line(&mut self, _line: usize) {}
}

/// Buffered decoded text with a read position, shared by the sources below.
#[derive(Default)]
struct TextBuffer {
    text: String,
    pos: usize,
    line: usize,
}

impl TextBuffer {
    fn new(text: String) -> Self {
        Self { text, pos: 0, line: 1 }
    }

    #[inline]
    fn get(&mut self) -> Option<char> {
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    #[inline]
    fn avail(&self) -> usize {
        self.text.len() - self.pos
    }

    /// Drops consumed text so the buffer can be refilled.
    fn compact(&mut self) {
        if self.pos == self.text.len() {
            self.text.clear();
            self.pos = 0;
        }
    }
}

/// Decodes `bytes` into `out`, failing on malformed input.
fn decode_into(decoder: &mut Decoder, mut bytes: &[u8], out: &mut String, last: bool) -> Result<()> {
    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        out.reserve(needed);
        let (result, read) = decoder.decode_to_string_without_replacement(bytes, out, last);
        bytes = &bytes[read..];
        match result {
            DecoderResult::InputEmpty => return Ok(()),
            DecoderResult::OutputFull => continue,
            DecoderResult::Malformed(_, _) => {
                return Err(Error::NonDecodable(decoder.encoding().name()))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A source over text that is completely in memory. Entity replacement
/// text is read through it as well.
pub struct StrSource {
    buf: TextBuffer,
}

impl StrSource {
    /// Creates a source over `text`.
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            buf: TextBuffer::new(text.into()),
        }
    }
}

impl InputSource for StrSource {
    #[inline]
    fn get(&mut self) -> Option<char> {
        self.buf.get()
    }

    fn avail(&self) -> usize {
        self.buf.avail()
    }

    fn import(&mut self) -> Result<Fill> {
        match self.buf.avail() {
            0 => Ok(Fill::Exhausted),
            n => Ok(Fill::Imported(n)),
        }
    }

    fn line(&self) -> usize {
        self.buf.line
    }

    fn set_line(&mut self, line: usize) {
        self.buf.line = line;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A source over any [`Read`], decoding its bytes incrementally.
///
/// Without an explicit encoding the bytes are UTF-8, or UTF-16 if they
/// start with a byte order mark. A reader returning
/// [`io::ErrorKind::WouldBlock`] makes the source report [`Fill::Pending`].
pub struct ReadSource<R> {
    reader: R,
    decoder: Decoder,
    bytes: Box<[u8]>,
    buf: TextBuffer,
    eof: bool,
}

impl<R: Read> ReadSource<R> {
    /// Creates a source that sniffs a BOM and defaults to UTF-8.
    pub fn new(reader: R) -> Self {
        Self::with_decoder(reader, UTF_8.new_decoder())
    }

    /// Creates a source decoding `encoding`, removing a BOM of that
    /// encoding if present.
    pub fn with_encoding(reader: R, encoding: &'static Encoding) -> Self {
        Self::with_decoder(reader, encoding.new_decoder_with_bom_removal())
    }

    fn with_decoder(reader: R, decoder: Decoder) -> Self {
        Self {
            reader,
            decoder,
            bytes: vec![0; READ_BUF_SIZE].into_boxed_slice(),
            buf: TextBuffer::new(String::new()),
            eof: false,
        }
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consumes the source, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> InputSource for ReadSource<R> {
    #[inline]
    fn get(&mut self) -> Option<char> {
        self.buf.get()
    }

    fn avail(&self) -> usize {
        self.buf.avail()
    }

    fn import(&mut self) -> Result<Fill> {
        if self.buf.avail() > 0 {
            return Ok(Fill::Imported(self.buf.avail()));
        }
        self.buf.compact();
        while !self.eof {
            let read = match self.reader.read(&mut self.bytes) {
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Fill::Pending),
                Err(e) => return Err(Error::Io(e)),
            };
            self.eof = read == 0;
            decode_into(
                &mut self.decoder,
                &self.bytes[..read],
                &mut self.buf.text,
                self.eof,
            )?;
            if self.buf.avail() > 0 {
                return Ok(Fill::Imported(self.buf.avail()));
            }
        }
        Ok(Fill::Exhausted)
    }

    fn line(&self) -> usize {
        self.buf.line
    }

    fn set_line(&mut self, line: usize) {
        self.buf.line = line;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

struct FeedState {
    decoder: Decoder,
    pending: String,
    finished: bool,
}

/// A source filled from the outside through its [`Feeder`].
///
/// This is the source for event-loop integration: whoever receives data
/// feeds it, then calls [`XmlReader::advance`](crate::XmlReader::advance)
/// until it returns `None`, which means everything fed so far is consumed.
pub struct FeedSource {
    shared: Rc<RefCell<FeedState>>,
    buf: TextBuffer,
}

/// Handle that pushes data into a [`FeedSource`].
#[derive(Clone)]
pub struct Feeder {
    shared: Rc<RefCell<FeedState>>,
}

impl Default for FeedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedSource {
    /// Creates an empty source expecting UTF-8 bytes.
    pub fn new() -> Self {
        Self::with_encoding(UTF_8)
    }

    /// Creates an empty source whose [`Feeder::feed_bytes`] decodes
    /// `encoding`.
    pub fn with_encoding(encoding: &'static Encoding) -> Self {
        Self {
            shared: Rc::new(RefCell::new(FeedState {
                decoder: encoding.new_decoder_with_bom_removal(),
                pending: String::new(),
                finished: false,
            })),
            buf: TextBuffer::new(String::new()),
        }
    }

    /// Returns a handle to feed this source.
    pub fn feeder(&self) -> Feeder {
        Feeder {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl Feeder {
    /// Appends decoded text.
    pub fn feed(&self, text: &str) {
        self.shared.borrow_mut().pending.push_str(text);
    }

    /// Appends raw bytes. A multi-byte sequence may be split across calls.
    pub fn feed_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.shared.borrow_mut();
        let FeedState {
            decoder, pending, ..
        } = &mut *state;
        decode_into(decoder, bytes, pending, false)
    }

    /// Marks the end of the data. An incomplete trailing byte sequence is an
    /// error.
    pub fn finish(&self) -> Result<()> {
        let mut state = self.shared.borrow_mut();
        if state.finished {
            return Ok(());
        }
        state.finished = true;
        let FeedState {
            decoder, pending, ..
        } = &mut *state;
        decode_into(decoder, &[], pending, true)
    }

    /// Whether [`finish`](Self::finish) was called.
    pub fn is_finished(&self) -> bool {
        self.shared.borrow().finished
    }
}

impl InputSource for FeedSource {
    #[inline]
    fn get(&mut self) -> Option<char> {
        self.buf.get()
    }

    fn avail(&self) -> usize {
        self.buf.avail()
    }

    fn import(&mut self) -> Result<Fill> {
        if self.buf.avail() > 0 {
            return Ok(Fill::Imported(self.buf.avail()));
        }
        self.buf.compact();
        let mut state = self.shared.borrow_mut();
        if !state.pending.is_empty() {
            std::mem::swap(&mut self.buf.text, &mut state.pending);
            return Ok(Fill::Imported(self.buf.avail()));
        }
        Ok(if state.finished {
            Fill::Exhausted
        } else {
            Fill::Pending
        })
    }

    fn line(&self) -> usize {
        self.buf.line
    }

    fn set_line(&mut self, line: usize) {
        self.buf.line = line;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// One entry of the [`InputStack`].
pub(crate) struct Input {
    pub source: Box<dyn InputSource>,
    /// `name` of a general or `%name` of a parameter entity being expanded
    pub entity: Option<String>,
    /// The source came from the resolver and goes back to it when popped
    pub resolved: bool,
    /// The source is an external entity or the external subset
    pub external: bool,
    /// The source is the external subset
    pub external_dtd: bool,
    /// Element depth when the input was pushed
    pub depth: usize,
}

impl Input {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            entity: None,
            resolved: false,
            external: false,
            external_dtd: false,
            depth: 0,
        }
    }
}

/// Stack of the inputs being read. A [`NullInputSource`] stays at the
/// bottom, so there always is a current input.
pub(crate) struct InputStack {
    inputs: Vec<Input>,
}

impl InputStack {
    pub fn new() -> Self {
        Self {
            inputs: vec![Input::new(Box::new(NullInputSource))],
        }
    }

    pub fn push(&mut self, input: Input) {
        self.inputs.push(input);
    }

    /// Pops the current input, never the sentinel.
    pub fn pop(&mut self) -> Option<Input> {
        if self.inputs.len() > 1 {
            self.inputs.pop()
        } else {
            None
        }
    }

    /// Number of inputs above the sentinel.
    #[inline]
    pub fn size(&self) -> usize {
        self.inputs.len() - 1
    }

    /// Whether only the sentinel remains.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn current(&self) -> &Input {
        // the sentinel is never removed
        &self.inputs[self.inputs.len() - 1]
    }

    #[inline]
    pub fn get(&mut self) -> Option<char> {
        let last = self.inputs.len() - 1;
        self.inputs[last].source.get()
    }

    pub fn import(&mut self) -> Result<Fill> {
        let last = self.inputs.len() - 1;
        self.inputs[last].source.import()
    }

    pub fn line(&self) -> usize {
        self.current().source.line()
    }

    /// Whether an external entity or the external subset is being read.
    pub fn in_external(&self) -> bool {
        self.inputs.iter().any(|i| i.external)
    }

    /// Whether the entity with the given key is being expanded.
    pub fn contains_entity(&self, key: &str) -> bool {
        self.inputs
            .iter()
            .any(|i| i.entity.as_deref() == Some(key))
    }

    /// Removes every input above the sentinel, topmost first.
    pub fn drain(&mut self) -> impl Iterator<Item = Input> + '_ {
        self.inputs.drain(1..).rev()
    }
}
