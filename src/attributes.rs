//! Xml Attributes module
//!
//! Attributes of a start tag, with their namespaces resolved

use std::fmt;

use crate::name::{Namespace, QName, XMLNS_NAMESPACE};

/// A single attribute of a start tag, after entity and character reference
/// expansion and, if declared so in the DTD, whitespace normalization.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    name: QName,
    namespace: String,
    value: String,
    /// `true` when the attribute was not written in the tag but defaulted
    /// from an `ATTLIST` declaration
    defaulted: bool,
}

impl Attribute {
    /// The qualified name as written in the tag.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Namespace name the prefix resolved to. Unprefixed attributes are in
    /// no namespace and return an empty string.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The attribute value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Local part of the name.
    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    /// Whether the value comes from a DTD default rather than the document.
    pub fn is_defaulted(&self) -> bool {
        self.defaulted
    }

    fn is_namespace_declaration(&self) -> bool {
        let name = self.name.as_str();
        name == "xmlns" || self.name.prefix() == "xmlns"
    }

    fn clear(&mut self) {
        self.name.clear();
        self.namespace.clear();
        self.value.clear();
        self.defaulted = false;
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name.as_str())
            .field("namespace", &self.namespace)
            .field("value", &self.value)
            .finish()
    }
}

/// Attributes of the current start tag.
///
/// The list is cleared between elements without giving back its slots, so
/// parsing a sequence of similar tags settles into reusing the same strings.
#[derive(Default)]
pub struct AttributeList {
    attrs: Vec<Attribute>,
    len: usize,
}

impl AttributeList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tag has no attributes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Attribute at `index`, in document order.
    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.as_slice().get(index)
    }

    /// First attribute whose local name is `local_name`, regardless of its
    /// namespace.
    pub fn find(&self, local_name: &str) -> Option<&Attribute> {
        self.iter().find(|a| a.local_name() == local_name)
    }

    /// Attribute with the given namespace name and local name.
    pub fn find_ns(&self, namespace: &str, local_name: &str) -> Option<&Attribute> {
        self.iter()
            .find(|a| a.namespace == namespace && a.local_name() == local_name)
    }

    /// Attribute with exactly this qualified name.
    pub fn find_qualified(&self, qname: &str) -> Option<&Attribute> {
        self.iter().find(|a| a.name.as_str() == qname)
    }

    /// Iterates attributes in document order, defaulted ones last.
    pub fn iter(&self) -> std::slice::Iter<Attribute> {
        self.as_slice().iter()
    }

    fn as_slice(&self) -> &[Attribute] {
        &self.attrs[..self.len]
    }

    pub(crate) fn clear(&mut self) {
        for attr in &mut self.attrs[..self.len] {
            attr.clear();
        }
        self.len = 0;
    }

    /// Starts a new attribute and returns it for the parser to fill in.
    pub(crate) fn push(&mut self) -> &mut Attribute {
        if self.len == self.attrs.len() {
            self.attrs.push(Attribute::default());
        }
        self.len += 1;
        &mut self.attrs[self.len - 1]
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Attribute> {
        match self.len {
            0 => None,
            n => Some(&mut self.attrs[n - 1]),
        }
    }

    pub(crate) fn push_defaulted(&mut self, name: &QName, value: &str) {
        let attr = self.push();
        attr.name.assign(name);
        attr.value.push_str(value);
        attr.defaulted = true;
    }

    /// Moves every `xmlns` and `xmlns:*` attribute into `out` and compacts
    /// the remaining ones in place.
    pub(crate) fn take_namespace_declarations(&mut self, out: &mut Vec<Namespace>) {
        let mut kept = 0;
        for i in 0..self.len {
            if self.attrs[i].is_namespace_declaration() {
                let attr = &self.attrs[i];
                let prefix = match attr.name.prefix() {
                    "" => "",
                    _ => attr.local_name(),
                };
                out.push(Namespace::new(prefix, attr.value.as_str()));
                self.attrs[i].clear();
            } else {
                if kept != i {
                    self.attrs.swap(kept, i);
                }
                kept += 1;
            }
        }
        self.len = kept;
    }

    pub(crate) fn set_namespace(&mut self, index: usize, namespace: &str) {
        let attr = &mut self.attrs[index];
        attr.namespace.clear();
        attr.namespace.push_str(namespace);
    }

    /// Returns `true` if an attribute other than the last one has the same
    /// qualified name as the last one.
    pub(crate) fn last_is_duplicate(&self) -> bool {
        match self.as_slice().split_last() {
            Some((last, rest)) => rest.iter().any(|a| a.name == last.name),
            None => false,
        }
    }
}

impl Attribute {
    pub(crate) fn name_mut(&mut self) -> &mut QName {
        &mut self.name
    }

    pub(crate) fn value_mut(&mut self) -> &mut String {
        &mut self.value
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for AttributeList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Returns `true` if `namespace` is the reserved namespace of `xmlns`
/// attributes, which may not be bound to any user prefix.
pub(crate) fn is_reserved_namespace(namespace: &str) -> bool {
    namespace == XMLNS_NAMESPACE
}
