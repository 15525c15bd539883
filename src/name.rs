//! Module for handling names according to the W3C [Namespaces in XML 1.1 (Second Edition)][names]
//! specification
//!
//! [names]: https://www.w3.org/TR/xml-names11

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace name bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace name bound to the reserved `xmlns` prefix.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A [qualified name] of an element or an attribute, including an optional
/// namespace [prefix](Self::prefix) and a [local name](Self::local_name).
///
/// The name is stored as one string together with the position of the
/// prefix separator, so a name can be built one character at a time and
/// compared against an end tag without splitting it.
///
/// Equality and hashing only consider the textual form, which lets tables
/// keyed by `QName` be queried with a plain `&str`.
///
/// [qualified name]: https://www.w3.org/TR/xml-names11/#dt-qualname
#[derive(Clone, Default)]
pub struct QName {
    name: String,
    prefix_len: Option<usize>,
}

impl QName {
    /// Creates a name from its textual form, splitting at the first `:`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            prefix_len: memchr::memchr(b':', name.as_bytes()),
        }
    }

    /// The qualified name as written, `prefix:local` or `local`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The namespace prefix, or an empty string if the name has none.
    #[inline]
    pub fn prefix(&self) -> &str {
        match self.prefix_len {
            Some(len) => &self.name[..len],
            None => "",
        }
    }

    /// The part of the name after the prefix separator.
    #[inline]
    pub fn local_name(&self) -> &str {
        match self.prefix_len {
            Some(len) => &self.name[len + 1..],
            None => &self.name,
        }
    }

    /// Returns `true` if the name has a namespace prefix.
    #[inline]
    pub fn has_prefix(&self) -> bool {
        self.prefix_len.is_some()
    }

    /// Number of characters in the qualified name.
    pub fn size(&self) -> usize {
        self.name.chars().count()
    }

    /// Returns `true` if no character was collected yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.name.clear();
        self.prefix_len = None;
    }

    #[inline]
    pub(crate) fn push_char(&mut self, c: char) {
        self.name.push(c);
    }

    /// Turns the characters collected so far into the prefix. Fails if the
    /// name already has a prefix or nothing was collected.
    pub(crate) fn push_prefix(&mut self) -> bool {
        if self.prefix_len.is_some() || self.name.is_empty() {
            return false;
        }
        self.prefix_len = Some(self.name.len());
        self.name.push(':');
        true
    }

    /// A name ending in the separator (`p:`) has no local part.
    pub(crate) fn is_complete(&self) -> bool {
        !self.name.is_empty() && self.prefix_len.map_or(true, |len| len + 1 < self.name.len())
    }

    pub(crate) fn assign(&mut self, other: &QName) {
        self.name.clone_from(&other.name);
        self.prefix_len = other.prefix_len;
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl Borrow<str> for QName {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "QName({:?})", self.name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for QName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Number of name slots allocated up front.
const BUF_SIZE: usize = 16;

/// Stack of the names of currently opened elements.
///
/// Slots are never deallocated: a popped slot keeps its string capacity and
/// is reused by the next push, so documents whose nesting stays within the
/// preallocated slots do not allocate per element.
///
/// The slot directly above the top is the name currently being collected by
/// [`push_char`](Self::push_char).
pub struct QNameStack {
    names: Vec<QName>,
    len: usize,
}

impl Default for QNameStack {
    fn default() -> Self {
        Self::new()
    }
}

impl QNameStack {
    /// Creates a stack with [`BUF_SIZE`] preallocated slots.
    pub fn new() -> Self {
        Self {
            names: (0..BUF_SIZE).map(|_| QName::default()).collect(),
            len: 0,
        }
    }

    fn pending_mut(&mut self) -> &mut QName {
        if self.len == self.names.len() {
            self.names.push(QName::default());
        }
        &mut self.names[self.len]
    }

    /// Appends one character to the name being collected.
    #[inline]
    pub fn push_char(&mut self, c: char) {
        self.pending_mut().push_char(c);
    }

    /// Turns the text collected so far into the prefix of the pending name.
    /// Returns `false` if the pending name already has a prefix.
    pub fn push_prefix(&mut self) -> bool {
        self.pending_mut().push_prefix()
    }

    /// The name being collected.
    pub fn pending(&self) -> Option<&QName> {
        self.names.get(self.len)
    }

    /// Finishes the pending name and makes it the new top.
    pub fn push_name(&mut self) -> &QName {
        self.pending_mut();
        self.len += 1;
        &self.names[self.len - 1]
    }

    /// Removes the top name and returns the number of characters it held.
    pub fn pop(&mut self) -> usize {
        if self.len == 0 {
            return 0;
        }
        // an unfinished name above the top goes away with it
        if let Some(pending) = self.names.get_mut(self.len) {
            pending.clear();
        }
        self.len -= 1;
        let top = &mut self.names[self.len];
        let size = top.size();
        top.clear();
        size
    }

    /// The most recently pushed name.
    pub fn top(&self) -> Option<&QName> {
        self.len.checked_sub(1).map(|i| &self.names[i])
    }

    /// Drops all names, keeping the slots.
    pub fn clear(&mut self) {
        let used = (self.len + 1).min(self.names.len());
        for name in &mut self.names[..used] {
            name.clear();
        }
        self.len = 0;
    }

    /// Number of finished names on the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no finished name is on the stack.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A namespace declaration: `prefix` bound to `uri`. The default namespace
/// has an empty prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
    uri: String,
}

impl Namespace {
    /// Creates a binding.
    pub fn new<P: Into<String>, U: Into<String>>(prefix: P, uri: U) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    /// Bound prefix, empty for the default namespace.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Namespace name. An empty URI undeclares the default namespace.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Namespace bindings in scope, one group per element depth.
#[derive(Debug, Default)]
pub struct NamespaceContext {
    bindings: Vec<Namespace>,
    /// Index into `bindings` where each open element's declarations start
    scopes: Vec<usize>,
}

impl NamespaceContext {
    /// Creates an empty context. The `xml` and `xmlns` prefixes are always
    /// bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new element scope with the given declarations.
    pub fn start_element<'a, I>(&mut self, declarations: I)
    where
        I: IntoIterator<Item = &'a Namespace>,
    {
        self.scopes.push(self.bindings.len());
        self.bindings.extend(declarations.into_iter().cloned());
    }

    /// Closes the innermost element scope, moving the bindings that go out
    /// of scope into `removed`.
    pub fn end_element(&mut self, removed: &mut Vec<Namespace>) {
        if let Some(start) = self.scopes.pop() {
            removed.extend(self.bindings.drain(start..));
        }
    }

    /// Resolves a prefix to its namespace name. An empty prefix resolves to
    /// the default namespace, which is the empty string if none is declared.
    /// Returns `None` for an undeclared prefix.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE),
            "xmlns" => return Some(XMLNS_NAMESPACE),
            _ => {}
        }
        match self.bindings.iter().rev().find(|ns| ns.prefix == prefix) {
            Some(ns) if ns.uri.is_empty() && !prefix.is_empty() => None,
            Some(ns) => Some(&ns.uri),
            None if prefix.is_empty() => Some(""),
            None => None,
        }
    }

    /// Number of open element scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Forgets every binding.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.scopes.clear();
    }
}
