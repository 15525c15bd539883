//! Tags, character data, CDATA sections and references

use log::debug;

use crate::attributes::is_reserved_namespace;
use crate::dtd::{normalize, AttributeModel, DefaultMode};
use crate::errors::Result;
use crate::name::{Namespace, QName, XML_NAMESPACE};
use crate::reader::input::{Input, StrSource};

use super::{
    is_name_char, is_name_start_char, is_whitespace, is_xml_char, NodeType, Parser, RefCtx, State,
};

/// Replacement of the five predefined entities.
fn predefined_entity(name: &str) -> Option<char> {
    Some(match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "apos" => '\'',
        "quot" => '"',
        _ => return None,
    })
}

/// Checks a namespace declaration of a start tag.
fn check_namespace(ns: &Namespace) -> Option<String> {
    let (prefix, uri) = (ns.prefix(), ns.uri());
    if prefix == "xmlns" {
        return Some("the xmlns prefix must not be declared".to_owned());
    }
    if is_reserved_namespace(uri) {
        return Some(format!("namespace {} must not be declared", uri));
    }
    if (prefix == "xml") != (uri == XML_NAMESPACE) {
        return Some(format!("prefix xml and namespace {} are bound to each other", XML_NAMESPACE));
    }
    if !prefix.is_empty() && uri.is_empty() {
        return Some(format!("prefix {} must not be bound to an empty namespace", prefix));
    }
    None
}

impl Parser {
    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Tags

    pub(super) fn begin_start_tag(&mut self, c: char) {
        self.names.push_char(c);
        self.state = State::StartTagName;
    }

    pub(super) fn on_tag(&mut self, c: char) -> Result<()> {
        match self.state {
            State::StartTagName => match c {
                ':' => {
                    if !self.names.push_prefix() {
                        return self.error("invalid element name");
                    }
                }
                c if is_name_char(c) => self.names.push_char(c),
                _ => {
                    self.finish_element_name()?;
                    self.state = State::BeforeAttr;
                    if !is_whitespace(c) {
                        return self.step(c);
                    }
                }
            },
            State::BeforeAttr => match c {
                '>' => return self.end_start_tag(false),
                '/' => self.state = State::EmptyTagEnd,
                c if is_name_start_char(c) => {
                    self.start_element.attributes.push().name_mut().push_char(c);
                    self.charge_transient()?;
                    self.state = State::AttrName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error(format!("unexpected {:?} in start tag", c)),
            },
            State::AttrName => match c {
                ':' => {
                    let pushed = self
                        .start_element
                        .attributes
                        .last_mut()
                        .map_or(false, |a| a.name_mut().push_prefix());
                    if !pushed {
                        return self.error("invalid attribute name");
                    }
                }
                c if is_name_char(c) => {
                    if let Some(attr) = self.start_element.attributes.last_mut() {
                        attr.name_mut().push_char(c);
                    }
                    self.charge_transient()?;
                }
                '=' | ' ' | '\t' | '\n' => {
                    self.finish_attribute_name()?;
                    self.state = if c == '=' {
                        State::AttrBeforeValue
                    } else {
                        State::AttrBeforeEq
                    };
                }
                _ => return self.error("'=' expected after attribute name"),
            },
            State::AttrBeforeEq => match c {
                '=' => self.state = State::AttrBeforeValue,
                c if is_whitespace(c) => {}
                _ => return self.error("'=' expected after attribute name"),
            },
            State::AttrBeforeValue => match c {
                '"' | '\'' => {
                    self.literal.clear();
                    self.literal_depth = self.inputs.size();
                    self.state = State::AttrValue(c);
                }
                c if is_whitespace(c) => {}
                _ => return self.error("quoted attribute value expected"),
            },
            State::AttrValue(quote) => match c {
                c if c == quote && self.inputs.size() == self.literal_depth => {
                    self.finish_attribute_value();
                    self.state = State::AfterAttrValue;
                }
                '<' => return self.error("'<' not allowed in attribute value"),
                '&' => {
                    self.parse_stack.push(self.state);
                    self.state = State::RefStart(RefCtx::Attribute);
                }
                '\t' | '\n' => {
                    self.literal.push(' ');
                    self.charge_transient()?;
                }
                c if is_xml_char(c) => {
                    self.literal.push(c);
                    self.charge_transient()?;
                }
                _ => return self.error(format!("invalid character {:?} in attribute value", c)),
            },
            State::AfterAttrValue => match c {
                '>' => return self.end_start_tag(false),
                '/' => self.state = State::EmptyTagEnd,
                c if is_whitespace(c) => self.state = State::BeforeAttr,
                _ => return self.error("whitespace expected between attributes"),
            },
            State::EmptyTagEnd => {
                if c != '>' {
                    return self.error("'>' expected after '/'");
                }
                return self.end_start_tag(true);
            }
            State::EndTagName => {
                let name = match self.names.top() {
                    Some(name) => name.as_str(),
                    None => return self.error("end tag without start tag"),
                };
                if name[self.back..].starts_with(c) {
                    self.back += c.len_utf8();
                    return Ok(());
                }
                if self.back == name.len() {
                    if c == '>' {
                        return self.close_element();
                    }
                    if is_whitespace(c) {
                        self.state = State::EndTagAfterName;
                        return Ok(());
                    }
                }
                let message = format!("unmatched element {}", name);
                return self.error(message);
            }
            State::EndTagAfterName => match c {
                '>' => return self.close_element(),
                c if is_whitespace(c) => {}
                _ => return self.error("'>' expected in end tag"),
            },
            _ => {}
        }
        Ok(())
    }

    /// Pushes the element name collected so far onto the name stack.
    fn finish_element_name(&mut self) -> Result<()> {
        if !self.names.pending().map_or(false, QName::is_complete) {
            return self.error("invalid element name");
        }
        let name = self.names.push_name();
        self.start_element.name.assign(name);
        let size = name.size();
        self.charge(size)
    }

    fn finish_attribute_name(&mut self) -> Result<()> {
        let complete = self
            .start_element
            .attributes
            .last_mut()
            .map_or(false, |a| a.name().is_complete());
        if !complete {
            return self.error("invalid attribute name");
        }
        if self.start_element.attributes.last_is_duplicate() {
            let attributes = &self.start_element.attributes;
            let name = attributes
                .get(attributes.len() - 1)
                .map(|a| a.name().to_string())
                .unwrap_or_default();
            return self.error(format!("duplicate attribute {}", name));
        }
        Ok(())
    }

    /// Stores the literal as the value of the last attribute, normalized if
    /// the DTD declares a type other than CDATA for it.
    fn finish_attribute_value(&mut self) {
        let element = self.start_element.name.as_str();
        let attributes = &self.start_element.attributes;
        let collapse = attributes
            .get(attributes.len().wrapping_sub(1))
            .and_then(|a| self.dtd.attribute(element, a.name().as_str()))
            .map_or(false, AttributeModel::is_normalize);
        if let Some(attr) = self.start_element.attributes.last_mut() {
            let value = attr.value_mut();
            if collapse {
                value.push_str(&normalize(&self.literal));
            } else {
                std::mem::swap(value, &mut self.literal);
            }
        }
        self.literal.clear();
    }

    /// Completes a start tag: adds DTD defaults, takes out namespace
    /// declarations and resolves prefixes.
    fn end_start_tag(&mut self, empty: bool) -> Result<()> {
        for model in self.dtd.attributes(self.start_element.name.as_str()) {
            let value = match (model.default_value(), model.mode()) {
                (Some(value), DefaultMode::Default) | (Some(value), DefaultMode::Fixed) => value,
                _ => continue,
            };
            let attributes = &mut self.start_element.attributes;
            if attributes.find_qualified(model.name().as_str()).is_none() {
                attributes.push_defaulted(model.name(), value);
            }
        }

        let element = &mut self.start_element;
        element
            .attributes
            .take_namespace_declarations(&mut element.mappings);
        let invalid = element.mappings.iter().find_map(check_namespace);
        if let Some(message) = invalid {
            return self.error(message);
        }
        self.namespaces.start_element(&self.start_element.mappings);

        let prefix = self.start_element.name.prefix();
        match self.namespaces.resolve(prefix) {
            Some(uri) => self.start_element.namespace.push_str(uri),
            None => {
                let message = format!("undeclared namespace prefix {}", prefix);
                return self.error(message);
            }
        }
        for i in 0..self.start_element.attributes.len() {
            let prefix = match self.start_element.attributes.get(i) {
                Some(attr) if attr.name().has_prefix() => attr.name().prefix(),
                _ => continue,
            };
            let uri = match self.namespaces.resolve(prefix) {
                Some(uri) => uri,
                None => {
                    let message = format!("undeclared namespace prefix {}", prefix);
                    return self.error(message);
                }
            };
            self.start_element.attributes.set_namespace(i, uri);
        }

        self.start_element.empty = empty;
        self.emit(NodeType::StartElement);
        if empty {
            self.close_element()
        } else {
            self.state = State::Content;
            Ok(())
        }
    }

    /// Reports the end of the innermost element.
    fn close_element(&mut self) -> Result<()> {
        let name = match self.names.top() {
            Some(name) => name,
            None => return self.error("end tag without start tag"),
        };
        self.end_element.name.assign(name);
        if let Some(uri) = self.namespaces.resolve(name.prefix()) {
            self.end_element.namespace.push_str(uri);
        }
        self.namespaces.end_element(&mut self.end_element.mappings);
        let size = self.names.pop();
        self.refund(size);
        self.emit(NodeType::EndElement);
        self.state = if self.names.is_empty() {
            State::Epilog
        } else {
            State::Content
        };
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Content

    pub(super) fn on_content(&mut self, c: char) -> Result<()> {
        match self.state {
            State::Content => match c {
                '<' => self.state = State::ContentLt,
                '&' => {
                    self.parse_stack.push(State::Content);
                    self.state = State::RefStart(RefCtx::Content);
                }
                ']' => {
                    self.push_text(c);
                    self.state = State::ContentRb1;
                }
                c if is_xml_char(c) => self.push_text(c),
                _ => return self.error(format!("invalid character {:?} in content", c)),
            },
            State::ContentRb1 | State::ContentRb2 => match c {
                ']' => {
                    self.push_text(c);
                    self.state = State::ContentRb2;
                }
                '>' if self.state == State::ContentRb2 => {
                    return self.error("']]>' is not allowed in content");
                }
                _ => {
                    self.state = State::Content;
                    return self.step(c);
                }
            },
            State::ContentLt => match c {
                '/' => {
                    self.flush_text();
                    self.back = 0;
                    self.state = State::EndTagName;
                }
                '?' => {
                    self.flush_text();
                    self.parse_stack.push(State::Content);
                    self.state = State::PiTarget;
                }
                '!' => self.state = State::ContentLtExclam,
                c if is_name_start_char(c) => {
                    self.flush_text();
                    self.begin_start_tag(c);
                }
                _ => return self.error(format!("unexpected {:?} after '<'", c)),
            },
            State::ContentLtExclam => match c {
                '-' => {
                    self.flush_text();
                    self.parse_stack.push(State::Content);
                    self.state = State::CommentStart;
                }
                '[' => {
                    if self.config.report_cdata {
                        self.flush_text();
                    }
                    self.token.clear();
                    self.state = State::CdataKeyword;
                }
                _ => return self.error("comment or CDATA section expected"),
            },
            State::CdataKeyword => match c {
                '[' if self.token == "CDATA" => self.state = State::CData,
                c if c.is_ascii_uppercase() && self.token.len() < 5 => self.token.push(c),
                _ => return self.error("CDATA section expected"),
            },
            State::CData => match c {
                ']' => self.state = State::CDataRb1,
                c if is_xml_char(c) => self.cdata_char(c),
                _ => return self.error(format!("invalid character {:?} in CDATA section", c)),
            },
            State::CDataRb1 => {
                if c == ']' {
                    self.state = State::CDataRb2;
                } else {
                    self.cdata_char(']');
                    self.state = State::CData;
                    return self.step(c);
                }
            }
            State::CDataRb2 => match c {
                '>' => {
                    if self.config.report_cdata {
                        self.flush_text();
                    }
                    self.state = State::Content;
                }
                ']' => self.cdata_char(']'),
                _ => {
                    self.cdata_char(']');
                    self.cdata_char(']');
                    self.state = State::CData;
                    return self.step(c);
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn cdata_char(&mut self, c: char) {
        self.characters.cdata = self.config.report_cdata;
        self.push_text(c);
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // &name; and &#n;

    pub(super) fn on_reference(&mut self, c: char, ctx: RefCtx) -> Result<()> {
        match self.state {
            State::RefStart(_) => match c {
                '#' => self.state = State::CharRefStart(ctx),
                c if is_name_start_char(c) => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::RefName(ctx);
                }
                _ => return self.error("entity name expected after '&'"),
            },
            State::CharRefStart(_) => {
                self.token.clear();
                match c {
                    'x' => self.state = State::CharRefHex(ctx),
                    c if c.is_ascii_digit() => {
                        self.token.push(c);
                        self.state = State::CharRefDec(ctx);
                    }
                    _ => return self.error("invalid character reference"),
                }
            }
            State::CharRefDec(_) | State::CharRefHex(_) => {
                let radix = if let State::CharRefHex(_) = self.state { 16 } else { 10 };
                if c == ';' && !self.token.is_empty() {
                    return self.finish_char_reference(radix, ctx);
                }
                if !c.is_digit(radix) || self.token.len() >= 8 {
                    return self.error("invalid character reference");
                }
                self.token.push(c);
            }
            State::RefName(_) => match c {
                ';' => return self.resolve_reference(ctx),
                c if is_name_char(c) || c == ':' => self.token.push(c),
                _ => return self.error("';' expected after entity name"),
            },
            _ => {}
        }
        Ok(())
    }

    fn finish_char_reference(&mut self, radix: u32, ctx: RefCtx) -> Result<()> {
        let c = u32::from_str_radix(&self.token, radix)
            .ok()
            .and_then(char::from_u32)
            .filter(|&c| is_xml_char(c));
        let c = match c {
            Some(c) => c,
            None => {
                let prefix = if radix == 16 { "#x" } else { "#" };
                return self.error(format!("invalid character reference &{}{};", prefix, self.token));
            }
        };
        self.pop_state()?;
        self.append_reference(c, ctx)
    }

    fn append_reference(&mut self, c: char, ctx: RefCtx) -> Result<()> {
        match ctx {
            RefCtx::Content => self.push_text(c),
            RefCtx::Attribute => {
                self.literal.push(c);
                self.charge_transient()?;
            }
            RefCtx::EntityValue => self.literal.push(c),
        }
        Ok(())
    }

    /// Expands `&name;`, or reports it when it cannot or must not be.
    fn resolve_reference(&mut self, ctx: RefCtx) -> Result<()> {
        let name = std::mem::take(&mut self.token);
        self.pop_state()?;
        if ctx == RefCtx::EntityValue {
            // general entities in entity values are expanded where used
            self.literal.push('&');
            self.literal.push_str(&name);
            self.literal.push(';');
            return Ok(());
        }
        if let Some(c) = predefined_entity(&name) {
            return self.append_reference(c, ctx);
        }
        if self.inputs.contains_entity(&name) {
            return self.error(format!("recursive reference to entity &{};", name));
        }
        let entity = match self.dtd.entity(&name) {
            Some(entity) => entity,
            None if ctx == RefCtx::Content => {
                debug!("undeclared entity &{}; reported", name);
                return self.report_reference(name);
            }
            None => return self.error(format!("undeclared entity &{}; in attribute value", name)),
        };
        if entity.is_unparsed() {
            if ctx == RefCtx::Content {
                return self.report_reference(name);
            }
            return self.error(format!("unparsed entity &{}; in attribute value", name));
        }
        if ctx == RefCtx::Content && self.config.report_entity_references {
            return self.report_reference(name);
        }
        let mut input = match entity.value() {
            Some(value) => Input::new(Box::new(StrSource::new(value))),
            None if ctx == RefCtx::Attribute => {
                return self.error(format!("external entity &{}; in attribute value", name));
            }
            None => {
                let source = match self.resolver.as_mut() {
                    Some(resolver) => {
                        resolver.resolve_input(entity.public_id(), entity.system_id())?
                    }
                    None => None,
                };
                match source {
                    Some(source) => {
                        let mut input = Input::new(source);
                        input.resolved = true;
                        input.external = true;
                        input
                    }
                    None => {
                        debug!("external entity &{}; not resolved, reported", name);
                        return self.report_reference(name);
                    }
                }
            }
        };
        input.entity = Some(name);
        self.push_input(input)
    }

    fn report_reference(&mut self, name: String) -> Result<()> {
        self.flush_text();
        self.entity_ref = name;
        self.emit(NodeType::EntityReference);
        Ok(())
    }
}
