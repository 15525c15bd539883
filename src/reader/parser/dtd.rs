//! DOCTYPE, markup declarations, conditional sections and parameter entity
//! references

use log::debug;

use crate::dtd::{AttributeModel, AttributeType, ContentModel, ContentModelError, DefaultMode};
use crate::errors::Result;
use crate::reader::input::{Input, StrSource};

use super::{
    is_name_char, is_name_start_char, is_whitespace, NodeType, Parser, RefCtx, State, Subset,
};

/// `PubidChar` of the XML grammar.
fn is_pubid_char(c: char) -> bool {
    matches!(c,
        ' ' | '\r' | '\n'
        | 'a'..='z' | 'A'..='Z' | '0'..='9'
        | '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':'
        | '=' | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%')
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

impl Parser {
    ////////////////////////////////////////////////////////////////////////////////////////////////
    // <!DOCTYPE

    pub(super) fn on_doctype(&mut self, c: char) -> Result<()> {
        match self.state {
            State::DoctypeBeforeName => {
                if is_whitespace(c) {
                    return Ok(());
                }
                if !is_name_start_char(c) {
                    return self.error("DOCTYPE name expected");
                }
                self.dtd.root_mut().push_char(c);
                self.state = State::DoctypeName;
            }
            State::DoctypeName => match c {
                ':' => {
                    if !self.dtd.root_mut().push_prefix() {
                        return self.error("invalid DOCTYPE name");
                    }
                }
                c if is_name_char(c) => self.dtd.root_mut().push_char(c),
                c if is_whitespace(c) || c == '[' || c == '>' => {
                    if !self.dtd.root().is_complete() {
                        return self.error("invalid DOCTYPE name");
                    }
                    self.state = State::DoctypeAfterName;
                    if !is_whitespace(c) {
                        return self.step(c);
                    }
                }
                _ => return self.error("invalid character in DOCTYPE name"),
            },
            State::DoctypeAfterName | State::DoctypeAfterExtId => match c {
                '[' => {
                    self.emit_doctype();
                    self.state = State::Subset(Subset::Internal);
                }
                '>' => {
                    self.emit_doctype();
                    return self.end_doctype();
                }
                'S' | 'P' if self.state == State::DoctypeAfterName => {
                    self.begin_external_id(c, State::DoctypeAfterExtId, false);
                }
                c if is_whitespace(c) => {}
                _ => return self.error("'[' or '>' expected in DOCTYPE"),
            },
            State::DoctypeAfterSubset => match c {
                '>' => return self.end_doctype(),
                c if is_whitespace(c) => {}
                _ => return self.error("'>' expected after internal subset"),
            },
            _ => {}
        }
        Ok(())
    }

    fn emit_doctype(&mut self) {
        let public_id = self.public_id.take();
        let system_id = self.system_id.take();
        self.dtd.set_external_id(public_id, system_id);
        if self.config.report_doc_type {
            self.emit(NodeType::DocType);
        }
    }

    /// Reads the external subset, if there is one and it resolves, after
    /// the internal one.
    fn end_doctype(&mut self) -> Result<()> {
        let has_external = self.dtd.system_id().is_some() || self.dtd.public_id().is_some();
        let source = match self.resolver.as_mut() {
            Some(resolver) if has_external => {
                resolver.resolve_input(self.dtd.public_id(), self.dtd.system_id())?
            }
            _ => None,
        };
        match source {
            Some(source) => {
                let mut input = Input::new(source);
                input.resolved = true;
                input.external = true;
                input.external_dtd = true;
                self.push_input(input)?;
                self.state = State::Subset(Subset::External);
            }
            None => {
                if has_external {
                    debug!("external subset {:?} not resolved", self.dtd.system_id());
                }
                self.finish_doctype();
            }
        }
        Ok(())
    }

    fn finish_doctype(&mut self) {
        self.in_dtd = false;
        if self.config.report_doc_type {
            self.emit(NodeType::EndDocType);
        }
        self.state = State::Prolog;
    }

    pub(super) fn end_external_subset(&mut self) -> Result<()> {
        if self.state != State::Subset(Subset::External) || !self.parse_stack.is_empty() {
            return self.error("unexpected end of external subset");
        }
        self.finish_doctype();
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // External identifiers

    /// Starts `SYSTEM "..."` or `PUBLIC "..." "..."`; parsing resumes in
    /// `next` with the identifiers in `public_id` and `system_id`. With
    /// `public_only`, the system literal may be omitted (notations).
    fn begin_external_id(&mut self, c: char, next: State, public_only: bool) {
        self.token.clear();
        self.token.push(c);
        self.public_only = public_only;
        self.parse_stack.push(next);
        self.state = State::ExtIdKeyword;
    }

    fn begin_literal(&mut self) {
        self.literal.clear();
        self.literal_depth = self.inputs.size();
    }

    /// Whether `c` closes the literal opened with `quote`; quotes coming
    /// from parameter entity replacement text do not.
    fn closes_literal(&self, c: char, quote: char) -> bool {
        c == quote && self.inputs.size() == self.literal_depth
    }

    pub(super) fn on_external_id(&mut self, c: char) -> Result<()> {
        match self.state {
            State::ExtIdKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                } else if is_whitespace(c) {
                    self.state = match self.token.as_str() {
                        "SYSTEM" => State::ExtIdBeforeSystemLiteral,
                        "PUBLIC" => State::ExtIdBeforePublicLiteral,
                        _ => return self.error("SYSTEM or PUBLIC expected"),
                    };
                } else {
                    return self.error("SYSTEM or PUBLIC expected");
                }
            }
            State::ExtIdBeforePublicLiteral => match c {
                c if is_quote(c) => {
                    self.begin_literal();
                    self.state = State::PublicLiteral(c);
                }
                c if is_whitespace(c) => {}
                _ => return self.error("quoted public identifier expected"),
            },
            State::PublicLiteral(quote) => {
                if self.closes_literal(c, quote) {
                    self.public_id = Some(std::mem::take(&mut self.literal));
                    self.state = State::ExtIdAfterPublic;
                } else if is_pubid_char(c) {
                    self.literal.push(c);
                } else {
                    return self.error(format!("invalid character {:?} in public identifier", c));
                }
            }
            State::ExtIdAfterPublic => {
                if is_whitespace(c) {
                    self.state = State::ExtIdBeforeSystemOpt;
                } else if self.public_only && c == '>' {
                    self.pop_state()?;
                    return self.step(c);
                } else {
                    return self.error("whitespace expected after public identifier");
                }
            }
            State::ExtIdBeforeSystemOpt | State::ExtIdBeforeSystemLiteral => match c {
                c if is_quote(c) => {
                    self.begin_literal();
                    self.state = State::SystemLiteral(c);
                }
                c if is_whitespace(c) => {}
                _ if self.state == State::ExtIdBeforeSystemOpt && self.public_only => {
                    self.pop_state()?;
                    return self.step(c);
                }
                _ => return self.error("quoted system identifier expected"),
            },
            State::SystemLiteral(quote) => {
                if self.closes_literal(c, quote) {
                    self.system_id = Some(std::mem::take(&mut self.literal));
                    self.pop_state()?;
                } else {
                    self.literal.push(c);
                }
            }
            _ => {}
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Subsets

    pub(super) fn on_subset(&mut self, c: char) -> Result<()> {
        match self.state {
            State::Subset(kind) => match c {
                '<' => {
                    self.parse_stack.push(self.state);
                    self.decl_consumed = 1;
                    self.state = State::DtdLt;
                }
                ']' => match kind {
                    Subset::Internal => self.state = State::DoctypeAfterSubset,
                    Subset::Include => self.state = State::IncludeEnd1,
                    Subset::External => return self.error("unexpected ']' in external subset"),
                },
                c if is_whitespace(c) => {}
                _ => return self.error("markup declaration expected"),
            },
            State::DtdLt => match c {
                '?' => self.state = State::PiTarget,
                '!' => self.state = State::DtdLtExclam,
                _ => return self.error("markup declaration expected"),
            },
            State::DtdLtExclam => match c {
                '-' => self.state = State::CommentStart,
                '[' => {
                    if !self.inputs.in_external() {
                        return self
                            .error("conditional sections are only allowed in the external subset");
                    }
                    self.state = State::CondBeforeKeyword;
                }
                c if c.is_ascii_uppercase() => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::DtdDeclKeyword;
                }
                _ => return self.error("markup declaration expected"),
            },
            State::DtdDeclKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                    return Ok(());
                }
                if !is_whitespace(c) {
                    return self.error(format!("unknown declaration <!{}", self.token));
                }
                self.state = match self.token.as_str() {
                    "ELEMENT" => State::ElementBeforeName,
                    "ATTLIST" => State::AttlistBeforeName,
                    "ENTITY" => {
                        self.entity.clear();
                        State::EntityBeforeName
                    }
                    "NOTATION" => State::NotationBeforeName,
                    _ => return self.error(format!("unknown declaration <!{}", self.token)),
                };
            }
            _ => {}
        }
        Ok(())
    }

    pub(super) fn on_conditional(&mut self, c: char) -> Result<()> {
        match self.state {
            State::CondBeforeKeyword => match c {
                c if c.is_ascii_uppercase() => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::CondKeyword;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("INCLUDE or IGNORE expected"),
            },
            State::CondKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                    return Ok(());
                }
                self.include = match self.token.as_str() {
                    "INCLUDE" => true,
                    "IGNORE" => false,
                    _ => return self.error("INCLUDE or IGNORE expected"),
                };
                self.state = State::CondBeforeBracket;
                return self.step(c);
            }
            State::CondBeforeBracket => match c {
                '[' if self.include => self.state = State::Subset(Subset::Include),
                '[' => self.state = State::IgnoreSection,
                c if is_whitespace(c) => {}
                _ => return self.error("'[' expected in conditional section"),
            },
            // ignored sections do not nest; the first "]]>" ends them
            State::IgnoreSection => {
                if c == ']' {
                    self.state = State::IgnoreEnd1;
                }
            }
            State::IgnoreEnd1 => {
                self.state = if c == ']' {
                    State::IgnoreEnd2
                } else {
                    State::IgnoreSection
                };
            }
            State::IgnoreEnd2 => match c {
                '>' => return self.pop_state(),
                ']' => {}
                _ => self.state = State::IgnoreSection,
            },
            State::IncludeEnd1 => {
                if c != ']' {
                    return self.error("']]>' expected");
                }
                self.state = State::IncludeEnd2;
            }
            State::IncludeEnd2 => {
                if c != '>' {
                    return self.error("']]>' expected");
                }
                return self.pop_state();
            }
            _ => {}
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // %name;

    pub(super) fn on_pe_reference(&mut self, c: char, literal: bool) -> Result<()> {
        if self.token.is_empty() && !is_name_start_char(c) {
            return self.error("parameter entity name expected after '%'");
        }
        if c == ';' {
            let name = std::mem::take(&mut self.token);
            self.pop_state()?;
            return self.expand_parameter_entity(name, literal);
        }
        if !is_name_char(c) && c != ':' {
            return self.error("';' expected after parameter entity name");
        }
        self.token.push(c);
        Ok(())
    }

    /// Pushes the replacement text of `%name;`. Outside of entity values the
    /// text is padded with one space on each side.
    fn expand_parameter_entity(&mut self, name: String, literal: bool) -> Result<()> {
        let key = format!("%{}", name);
        let recursive = self.inputs.contains_entity(&key)
            || (literal && self.entity.parameter && self.entity.name == name);
        if recursive {
            return self.error(format!("recursive reference to parameter entity {};", key));
        }
        let entity = match self.dtd.parameter_entity(&name) {
            Some(entity) => entity,
            None => return self.error(format!("undeclared parameter entity {};", key)),
        };
        let mut input = match entity.value() {
            Some(value) if literal => Input::new(Box::new(StrSource::new(value))),
            Some(value) => Input::new(Box::new(StrSource::new(format!(" {} ", value)))),
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
                        debug!("parameter entity {}; not resolved, skipped", key);
                        return Ok(());
                    }
                }
            }
        };
        input.entity = Some(key);
        self.push_input(input)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // <!ELEMENT

    fn check_content<T>(&self, result: std::result::Result<T, ContentModelError>) -> Result<T> {
        result.or_else(|e| self.error(format!("invalid content model: {}", e)))
    }

    pub(super) fn on_element_decl(&mut self, c: char) -> Result<()> {
        match self.state {
            State::ElementBeforeName => match c {
                c if is_name_start_char(c) => {
                    self.decl_name.clear();
                    self.decl_name.push_char(c);
                    self.state = State::ElementName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("element name expected"),
            },
            State::ElementName => match c {
                ':' => {
                    if !self.decl_name.push_prefix() {
                        return self.error("invalid element name");
                    }
                }
                c if is_name_char(c) => self.decl_name.push_char(c),
                c if is_whitespace(c) => {
                    if !self.decl_name.is_complete() {
                        return self.error("invalid element name");
                    }
                    self.state = State::ElementAfterName;
                }
                _ => return self.error("whitespace expected after element name"),
            },
            State::ElementAfterName => match c {
                '(' => {
                    self.content.clear();
                    self.element_model = None;
                    let result = self.content.push_scope();
                    self.check_content(result)?;
                    self.state = State::ElementContent;
                }
                c if c.is_ascii_uppercase() => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::ElementKeyword;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("content specification expected"),
            },
            State::ElementKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                    return Ok(());
                }
                self.element_model = Some(match self.token.as_str() {
                    "EMPTY" => ContentModel::Empty,
                    "ANY" => ContentModel::Any,
                    _ => return self.error(format!("unknown content specification {}", self.token)),
                });
                self.state = State::ElementBeforeEnd;
                return self.step(c);
            }
            State::ElementContent => {
                let result = match c {
                    '(' => self.content.push_scope(),
                    ',' | '|' | '?' | '*' | '+' => self.content.push_operator(c),
                    ')' => {
                        let result = self.content.reduce_scope();
                        self.state = if self.content.depth() == 0 {
                            State::ElementContentAfterGroup
                        } else {
                            State::ElementContentAfterParen
                        };
                        result
                    }
                    '#' => {
                        self.token.clear();
                        self.token.push(c);
                        self.state = State::ElementPcData;
                        Ok(())
                    }
                    c if is_name_start_char(c) => {
                        self.token.clear();
                        self.token.push(c);
                        self.state = State::ElementContentName;
                        Ok(())
                    }
                    c if is_whitespace(c) => Ok(()),
                    _ => return self.error(format!("unexpected {:?} in content model", c)),
                };
                self.check_content(result)?;
            }
            State::ElementContentAfterParen | State::ElementContentAfterGroup => {
                let next = if self.state == State::ElementContentAfterParen {
                    State::ElementContent
                } else {
                    State::ElementBeforeEnd
                };
                self.state = next;
                if matches!(c, '?' | '*' | '+') {
                    let result = self.content.push_operator(c);
                    self.check_content(result)?;
                } else {
                    return self.step(c);
                }
            }
            State::ElementPcData => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                    return Ok(());
                }
                if self.token != "#PCDATA" {
                    return self.error("#PCDATA expected");
                }
                let result = self.content.push_operand("#PCDATA");
                self.check_content(result)?;
                self.state = State::ElementContent;
                return self.step(c);
            }
            State::ElementContentName => {
                if is_name_char(c) || c == ':' {
                    self.token.push(c);
                    return Ok(());
                }
                let result = self.content.push_operand(&self.token);
                self.check_content(result)?;
                self.state = State::ElementContent;
                return self.step(c);
            }
            State::ElementBeforeEnd => match c {
                '>' => return self.finish_element_decl(),
                c if is_whitespace(c) => {}
                _ => return self.error("'>' expected at end of element declaration"),
            },
            _ => {}
        }
        Ok(())
    }

    fn finish_element_decl(&mut self) -> Result<()> {
        let model = match self.element_model.take() {
            Some(model) => model,
            None => {
                let result = self.content.finish();
                self.check_content(result)?
            }
        };
        if !self.dtd.declare_element(self.decl_name.clone(), model) {
            return self.error(format!("duplicate declaration of element {}", self.decl_name));
        }
        self.pop_state()
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // <!ATTLIST

    pub(super) fn on_attlist_decl(&mut self, c: char) -> Result<()> {
        match self.state {
            State::AttlistBeforeName => match c {
                c if is_name_start_char(c) => {
                    self.decl_name.clear();
                    self.decl_name.push_char(c);
                    self.state = State::AttlistName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("element name expected"),
            },
            State::AttlistName => match c {
                ':' => {
                    if !self.decl_name.push_prefix() {
                        return self.error("invalid element name");
                    }
                }
                c if is_name_char(c) => self.decl_name.push_char(c),
                c if is_whitespace(c) || c == '>' => {
                    if !self.decl_name.is_complete() {
                        return self.error("invalid element name");
                    }
                    self.state = State::AttlistBeforeAttr;
                    if c == '>' {
                        return self.pop_state();
                    }
                }
                _ => return self.error("invalid character in element name"),
            },
            State::AttlistBeforeAttr => match c {
                '>' => return self.pop_state(),
                c if is_name_start_char(c) => {
                    self.def_consumed = 1;
                    self.attr_name.clear();
                    self.attr_name.push_char(c);
                    self.state = State::AttlistAttrName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("attribute name expected"),
            },
            State::AttlistAttrName => match c {
                ':' => {
                    if !self.attr_name.push_prefix() {
                        return self.error("invalid attribute name");
                    }
                }
                c if is_name_char(c) => self.attr_name.push_char(c),
                c if is_whitespace(c) => {
                    if !self.attr_name.is_complete() {
                        return self.error("invalid attribute name");
                    }
                    self.state = State::AttlistBeforeType;
                }
                _ => return self.error("whitespace expected after attribute name"),
            },
            State::AttlistBeforeType => match c {
                '(' => {
                    let model = AttributeModel::new(
                        self.attr_name.clone(),
                        AttributeType::Enumeration(Vec::new()),
                    );
                    self.attr_model = Some(model);
                    self.state = State::AttlistEnumBefore;
                }
                c if c.is_ascii_uppercase() => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::AttlistType;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("attribute type expected"),
            },
            State::AttlistType => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                    return Ok(());
                }
                if !is_whitespace(c) {
                    return self.error("whitespace expected after attribute type");
                }
                let ty = match AttributeType::from_keyword(&self.token) {
                    Some(ty) => ty,
                    None => return self.error(format!("unknown attribute type {}", self.token)),
                };
                self.state = match ty {
                    AttributeType::Notation(_) => State::AttlistBeforeNotationList,
                    _ => State::AttlistBeforeDefault,
                };
                self.attr_model = Some(AttributeModel::new(self.attr_name.clone(), ty));
            }
            State::AttlistBeforeNotationList => match c {
                '(' => self.state = State::AttlistEnumBefore,
                c if is_whitespace(c) => {}
                _ => return self.error("'(' expected after NOTATION"),
            },
            State::AttlistEnumBefore => match c {
                c if is_name_char(c) || c == ':' => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::AttlistEnumValue;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("enumerated value expected"),
            },
            State::AttlistEnumValue => {
                if is_name_char(c) || c == ':' {
                    self.token.push(c);
                    return Ok(());
                }
                self.state = State::AttlistEnumAfter;
                if let Some(model) = self.attr_model.as_mut() {
                    if !model.add_value(&self.token) {
                        debug!("value {} listed twice", self.token);
                    }
                }
                return self.step(c);
            }
            State::AttlistEnumAfter => match c {
                '|' => self.state = State::AttlistEnumBefore,
                ')' => self.state = State::AttlistBeforeDefaultWs,
                c if is_whitespace(c) => {}
                _ => return self.error("'|' or ')' expected in enumeration"),
            },
            State::AttlistBeforeDefaultWs => {
                if !is_whitespace(c) {
                    return self.error("whitespace expected before default declaration");
                }
                self.state = State::AttlistBeforeDefault;
            }
            State::AttlistBeforeDefault => match c {
                '#' => {
                    self.token.clear();
                    self.state = State::AttlistDefaultKeyword;
                }
                c if is_quote(c) => {
                    if let Some(model) = self.attr_model.as_mut() {
                        model.set_mode(DefaultMode::Default);
                    }
                    self.begin_literal();
                    self.state = State::AttlistDefaultValue(c);
                }
                c if is_whitespace(c) => {}
                _ => return self.error("default declaration expected"),
            },
            State::AttlistDefaultKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                    return Ok(());
                }
                let mode = match DefaultMode::from_keyword(&self.token) {
                    Some(mode) => mode,
                    None => return self.error(format!("unknown default #{}", self.token)),
                };
                if let Some(model) = self.attr_model.as_mut() {
                    model.set_mode(mode);
                }
                if mode == DefaultMode::Fixed {
                    self.state = State::AttlistBeforeFixedValue;
                } else {
                    // the character after the keyword is not part of the definition
                    self.finish_attribute_def(1);
                    self.state = State::AttlistAfterDef;
                }
                return self.step(c);
            }
            State::AttlistBeforeFixedValue => match c {
                c if is_quote(c) => {
                    self.begin_literal();
                    self.state = State::AttlistDefaultValue(c);
                }
                c if is_whitespace(c) => {}
                _ => return self.error("quoted value expected after #FIXED"),
            },
            State::AttlistDefaultValue(quote) => match c {
                c if self.closes_literal(c, quote) => {
                    let value = std::mem::take(&mut self.literal);
                    if let Some(model) = self.attr_model.as_mut() {
                        model.set_default_value(&value);
                    }
                    self.finish_attribute_def(0);
                    self.state = State::AttlistAfterDef;
                }
                '<' => return self.error("'<' not allowed in attribute value"),
                '&' => {
                    self.parse_stack.push(self.state);
                    self.state = State::RefStart(RefCtx::Attribute);
                }
                c if is_whitespace(c) => self.literal.push(' '),
                _ => self.literal.push(c),
            },
            State::AttlistAfterDef => match c {
                '>' => return self.pop_state(),
                c if is_whitespace(c) => self.state = State::AttlistBeforeAttr,
                _ => return self.error("whitespace expected between attribute definitions"),
            },
            _ => {}
        }
        Ok(())
    }

    /// Installs the attribute definition just parsed. A definition for an
    /// attribute the element already has is dropped and its characters,
    /// except `trailing` ones that belong to what follows, are refunded.
    fn finish_attribute_def(&mut self, trailing: usize) {
        if let Some(model) = self.attr_model.take() {
            if !self.dtd.add_attribute(&self.decl_name, model) {
                debug!(
                    "duplicate definition of attribute {} of {} ignored",
                    self.attr_name, self.decl_name
                );
                self.refund(self.def_consumed.saturating_sub(trailing));
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // <!ENTITY

    pub(super) fn on_entity_decl(&mut self, c: char) -> Result<()> {
        match self.state {
            State::EntityBeforeName => match c {
                '%' => self.state = State::EntityPercent,
                c if is_name_start_char(c) => {
                    self.entity.name.push(c);
                    self.state = State::EntityName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("entity name expected"),
            },
            State::EntityPercent => {
                if is_whitespace(c) {
                    self.entity.parameter = true;
                    self.state = State::EntityBeforePeName;
                } else if is_name_start_char(c) {
                    // a reference, not the start of a parameter entity declaration
                    self.parse_stack.push(State::EntityBeforeName);
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::PeRefName { literal: false };
                } else {
                    return self.error("whitespace expected after '%'");
                }
            }
            State::EntityBeforePeName => match c {
                c if is_name_start_char(c) => {
                    self.entity.name.push(c);
                    self.state = State::EntityName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("entity name expected"),
            },
            State::EntityName => match c {
                c if is_name_char(c) || c == ':' => self.entity.name.push(c),
                c if is_whitespace(c) => self.state = State::EntityAfterName,
                _ => return self.error("whitespace expected after entity name"),
            },
            State::EntityAfterName => match c {
                c if is_quote(c) => {
                    self.begin_literal();
                    self.state = State::EntityValue(c);
                }
                'S' | 'P' => self.begin_external_id(c, State::EntityAfterExtId, false),
                c if is_whitespace(c) => {}
                _ => return self.error("entity value or external identifier expected"),
            },
            State::EntityValue(quote) => match c {
                c if self.closes_literal(c, quote) => {
                    self.entity.value = Some(std::mem::take(&mut self.literal));
                    self.state = State::EntityAfterValue;
                }
                '%' => {
                    self.parse_stack.push(self.state);
                    self.token.clear();
                    self.state = State::PeRefName { literal: true };
                }
                '&' => {
                    self.parse_stack.push(self.state);
                    self.state = State::RefStart(RefCtx::EntityValue);
                }
                _ => self.literal.push(c),
            },
            State::EntityAfterValue => match c {
                '>' => return self.finish_entity_decl(),
                c if is_whitespace(c) => {}
                _ => return self.error("'>' expected at end of entity declaration"),
            },
            State::EntityAfterExtId | State::EntityAfterExtIdWs => match c {
                '>' => return self.finish_entity_decl(),
                'N' if self.state == State::EntityAfterExtIdWs && !self.entity.parameter => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::EntityNdataKeyword;
                }
                c if is_whitespace(c) => self.state = State::EntityAfterExtIdWs,
                _ => return self.error("'>' expected at end of entity declaration"),
            },
            State::EntityNdataKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                } else if is_whitespace(c) && self.token == "NDATA" {
                    self.state = State::EntityBeforeNotation;
                } else {
                    return self.error("NDATA expected");
                }
            }
            State::EntityBeforeNotation => match c {
                c if is_name_start_char(c) => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::EntityNotationName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("notation name expected"),
            },
            State::EntityNotationName => {
                if is_name_char(c) || c == ':' {
                    self.token.push(c);
                    return Ok(());
                }
                self.entity.notation = Some(std::mem::take(&mut self.token));
                self.state = State::EntityAfterValue;
                return self.step(c);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_entity_decl(&mut self) -> Result<()> {
        let mut entity = std::mem::take(&mut self.entity);
        entity.public_id = self.public_id.take();
        entity.system_id = self.system_id.take();
        let name = entity.name.clone();
        let parameter = entity.parameter;
        if !self.dtd.add_entity(entity) {
            debug!(
                "duplicate declaration of entity {}{} ignored",
                if parameter { "%" } else { "" },
                name
            );
            self.refund(self.decl_consumed);
        }
        self.pop_state()
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // <!NOTATION

    pub(super) fn on_notation_decl(&mut self, c: char) -> Result<()> {
        match self.state {
            State::NotationBeforeName => match c {
                c if is_name_start_char(c) => {
                    self.notation.name.clear();
                    self.notation.name.push(c);
                    self.state = State::NotationName;
                }
                c if is_whitespace(c) => {}
                _ => return self.error("notation name expected"),
            },
            State::NotationName => match c {
                c if is_name_char(c) || c == ':' => self.notation.name.push(c),
                c if is_whitespace(c) => self.state = State::NotationAfterName,
                _ => return self.error("whitespace expected after notation name"),
            },
            State::NotationAfterName => match c {
                'S' | 'P' => self.begin_external_id(c, State::NotationAfterExtId, true),
                c if is_whitespace(c) => {}
                _ => return self.error("external identifier expected"),
            },
            State::NotationAfterExtId => match c {
                '>' => {
                    let mut notation = std::mem::take(&mut self.notation);
                    notation.public_id = self.public_id.take();
                    notation.system_id = self.system_id.take();
                    let name = notation.name.clone();
                    if !self.dtd.add_notation(notation) {
                        debug!("duplicate declaration of notation {} ignored", name);
                        self.refund(self.decl_consumed);
                    }
                    return self.pop_state();
                }
                c if is_whitespace(c) => {}
                _ => return self.error("'>' expected at end of notation declaration"),
            },
            _ => {}
        }
        Ok(())
    }
}
