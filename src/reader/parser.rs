//! The character-driven state machine behind [`XmlReader`](crate::XmlReader).
//!
//! Every character taken from the input stack is dispatched on the current
//! [`State`]. Productions that interrupt an enclosing one (comments, PIs,
//! references, markup declarations) push the state to resume onto an
//! explicit stack, so parsing can stop after any character and continue
//! later without relying on the call stack.

mod dtd;
mod element;

use std::collections::VecDeque;

use log::{debug, trace};

use crate::dtd::{AttributeModel, ContentModel, ContentModelBuilder, DocTypeDefinition, Entity, Notation};
use crate::errors::{Error, Result, SyntaxError};
use crate::name::{NamespaceContext, QName, QNameStack};
use crate::node::{
    Characters, EndElement, Node, NodeType, ProcessingInstruction, StartElement, XmlDeclaration,
};

use super::input::{Fill, Input, InputSource, InputStack};
use super::resolver::XmlResolver;
use super::{is_name_char, is_name_start_char, is_whitespace, is_xml_char};

/// Default of [`Config::max_size`]
pub(crate) const DEFAULT_MAX_SIZE: usize = 16 * 1024 * 1024;
/// Default of [`Config::chunk_size`]
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
/// Default of [`Config::max_input_depth`]
pub(crate) const DEFAULT_MAX_INPUT_DEPTH: usize = 32;

/// Reader options.
#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub report_start_document: bool,
    pub report_doc_type: bool,
    pub report_processing_instructions: bool,
    pub report_cdata: bool,
    pub report_comments: bool,
    pub report_entity_references: bool,
    pub max_size: usize,
    pub chunk_size: usize,
    pub max_input_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_start_document: false,
            report_doc_type: false,
            report_processing_instructions: false,
            report_cdata: false,
            report_comments: false,
            report_entity_references: false,
            max_size: DEFAULT_MAX_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_input_depth: DEFAULT_MAX_INPUT_DEPTH,
        }
    }
}

/// The three places markup declarations can appear in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Subset {
    Internal,
    External,
    Include,
}

/// Where the result of a reference goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RefCtx {
    /// Character data of an element
    Content,
    /// An attribute value or an attribute default value
    Attribute,
    /// An entity value: only character references are expanded
    EntityValue,
}

/// Parser states. Variants carrying a `char` remember the quote that opened
/// the literal being collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    DocumentBegin,
    Prolog,
    PrologLt,
    PrologLtExclam,
    DoctypeKeyword,
    Epilog,
    EpilogLt,
    EpilogLtExclam,
    Done,

    CommentStart,
    Comment,
    CommentDash,
    CommentDashDash,

    PiTarget,
    PiAfterTarget,
    PiData,
    PiDataQ,

    DoctypeBeforeName,
    DoctypeName,
    DoctypeAfterName,
    DoctypeAfterExtId,
    DoctypeAfterSubset,

    ExtIdKeyword,
    ExtIdBeforePublicLiteral,
    PublicLiteral(char),
    ExtIdAfterPublic,
    ExtIdBeforeSystemOpt,
    ExtIdBeforeSystemLiteral,
    SystemLiteral(char),

    Subset(Subset),
    DtdLt,
    DtdLtExclam,
    DtdDeclKeyword,
    CondBeforeKeyword,
    CondKeyword,
    CondBeforeBracket,
    IgnoreSection,
    IgnoreEnd1,
    IgnoreEnd2,
    IncludeEnd1,
    IncludeEnd2,
    /// `%name;`, inside an entity value when `literal` is set
    PeRefName { literal: bool },

    ElementBeforeName,
    ElementName,
    ElementAfterName,
    ElementKeyword,
    ElementContent,
    ElementContentAfterParen,
    ElementPcData,
    ElementContentName,
    ElementContentAfterGroup,
    ElementBeforeEnd,

    AttlistBeforeName,
    AttlistName,
    AttlistBeforeAttr,
    AttlistAttrName,
    AttlistBeforeType,
    AttlistType,
    AttlistBeforeNotationList,
    AttlistEnumBefore,
    AttlistEnumValue,
    AttlistEnumAfter,
    AttlistBeforeDefaultWs,
    AttlistBeforeDefault,
    AttlistDefaultKeyword,
    AttlistBeforeFixedValue,
    AttlistDefaultValue(char),
    AttlistAfterDef,

    EntityBeforeName,
    EntityPercent,
    EntityBeforePeName,
    EntityName,
    EntityAfterName,
    EntityValue(char),
    EntityAfterValue,
    EntityAfterExtId,
    EntityAfterExtIdWs,
    EntityNdataKeyword,
    EntityBeforeNotation,
    EntityNotationName,

    NotationBeforeName,
    NotationName,
    NotationAfterName,
    NotationAfterExtId,

    StartTagName,
    BeforeAttr,
    AttrName,
    AttrBeforeEq,
    AttrBeforeValue,
    AttrValue(char),
    AfterAttrValue,
    EmptyTagEnd,
    EndTagName,
    EndTagAfterName,

    Content,
    ContentLt,
    ContentLtExclam,
    ContentRb1,
    ContentRb2,
    CdataKeyword,
    CData,
    CDataRb1,
    CDataRb2,

    RefStart(RefCtx),
    RefName(RefCtx),
    CharRefStart(RefCtx),
    CharRefDec(RefCtx),
    CharRefHex(RefCtx),
}

impl State {
    /// States between two tokens of the DTD grammar, where a parameter
    /// entity reference may appear.
    fn accepts_pe_reference(self) -> bool {
        use State::*;
        matches!(
            self,
            Subset(_)
                | CondBeforeKeyword
                | CondBeforeBracket
                | ExtIdBeforePublicLiteral
                | ExtIdAfterPublic
                | ExtIdBeforeSystemOpt
                | ExtIdBeforeSystemLiteral
                | ElementBeforeName
                | ElementAfterName
                | ElementContent
                | ElementBeforeEnd
                | AttlistBeforeName
                | AttlistBeforeAttr
                | AttlistBeforeType
                | AttlistBeforeNotationList
                | AttlistEnumBefore
                | AttlistEnumAfter
                | AttlistBeforeDefault
                | AttlistBeforeFixedValue
                | AttlistAfterDef
                | EntityBeforePeName
                | EntityAfterName
                | EntityAfterValue
                | EntityAfterExtId
                | EntityAfterExtIdWs
                | EntityBeforeNotation
                | NotationBeforeName
                | NotationAfterName
                | NotationAfterExtId
        )
    }
}

/// The parser behind [`XmlReader`](crate::XmlReader): configuration, input
/// stack, state, and one reusable payload per node kind.
pub(crate) struct Parser {
    pub config: Config,
    pub resolver: Option<Box<dyn XmlResolver>>,
    inputs: InputStack,

    state: State,
    parse_stack: Vec<State>,
    /// Keywords, reference names, digits of character references
    token: String,
    /// Quoted literal being collected
    literal: String,
    /// Input depth at which the current literal was opened
    literal_depth: usize,
    names: QNameStack,
    /// Bytes of the open element name matched by the end tag so far
    back: usize,
    after_cr: bool,
    /// Only the XML declaration may still come
    at_start: bool,

    current: Option<NodeType>,
    pending: VecDeque<NodeType>,
    start_element: StartElement,
    end_element: EndElement,
    characters: Characters,
    text_len: usize,
    /// Start of the next chunk, held back while the previous one is reported
    carried: String,
    carried_cdata: bool,
    comment: String,
    pi: ProcessingInstruction,
    entity_ref: String,
    declaration: Option<XmlDeclaration>,

    dtd: DocTypeDefinition,
    has_doctype: bool,
    in_dtd: bool,
    /// Characters consumed by the markup declaration being parsed
    decl_consumed: usize,
    /// Characters consumed by the attribute definition being parsed
    def_consumed: usize,
    decl_name: QName,
    attr_name: QName,
    attr_model: Option<AttributeModel>,
    element_model: Option<ContentModel>,
    content: ContentModelBuilder,
    entity: Entity,
    notation: Notation,
    public_id: Option<String>,
    system_id: Option<String>,
    /// The external identifier being parsed may omit the system literal
    public_only: bool,
    include: bool,

    namespaces: NamespaceContext,

    used: usize,
    /// Part of `used` held by the current node's payload
    transient: usize,
    eof_line: usize,
    poisoned: bool,
}

impl Parser {
    pub fn new(config: Config, resolver: Option<Box<dyn XmlResolver>>) -> Self {
        Self {
            config,
            resolver,
            inputs: InputStack::new(),
            state: State::DocumentBegin,
            parse_stack: Vec::new(),
            token: String::new(),
            literal: String::new(),
            literal_depth: 0,
            names: QNameStack::new(),
            back: 0,
            after_cr: false,
            at_start: false,
            current: None,
            pending: VecDeque::new(),
            start_element: StartElement::default(),
            end_element: EndElement::default(),
            characters: Characters::default(),
            text_len: 0,
            carried: String::new(),
            carried_cdata: false,
            comment: String::new(),
            pi: ProcessingInstruction::default(),
            entity_ref: String::new(),
            declaration: None,
            dtd: DocTypeDefinition::new(),
            has_doctype: false,
            in_dtd: false,
            decl_consumed: 0,
            def_consumed: 0,
            decl_name: QName::default(),
            attr_name: QName::default(),
            attr_model: None,
            element_model: None,
            content: ContentModelBuilder::new(),
            entity: Entity::default(),
            notation: Notation::default(),
            public_id: None,
            system_id: None,
            public_only: false,
            include: false,
            namespaces: NamespaceContext::new(),
            used: 0,
            transient: 0,
            eof_line: 0,
            poisoned: false,
        }
    }

    /// Pushes the document source on top of the sentinel.
    pub fn push_document(&mut self, source: Box<dyn InputSource>) {
        self.inputs.push(Input::new(source));
    }

    /// Drops all inputs and per-document state, keeping buffers and options.
    pub fn reset(&mut self) {
        for input in self.inputs.drain() {
            if input.resolved {
                if let Some(resolver) = self.resolver.as_mut() {
                    resolver.release_input(input.source);
                }
            }
        }
        self.state = State::DocumentBegin;
        self.parse_stack.clear();
        self.token.clear();
        self.literal.clear();
        self.literal_depth = 0;
        self.names.clear();
        self.back = 0;
        self.after_cr = false;
        self.at_start = false;
        self.current = None;
        self.pending.clear();
        self.start_element.clear();
        self.end_element.clear();
        self.characters.clear();
        self.text_len = 0;
        self.carried.clear();
        self.comment.clear();
        self.pi.clear();
        self.entity_ref.clear();
        self.declaration = None;
        self.dtd.clear();
        self.has_doctype = false;
        self.in_dtd = false;
        self.decl_consumed = 0;
        self.def_consumed = 0;
        self.decl_name.clear();
        self.attr_name.clear();
        self.attr_model = None;
        self.element_model = None;
        self.content.clear();
        self.entity.clear();
        self.notation = Notation::default();
        self.public_id = None;
        self.system_id = None;
        self.namespaces.clear();
        self.used = 0;
        self.transient = 0;
        self.eof_line = 0;
        self.poisoned = false;
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Accessors

    pub fn line(&self) -> usize {
        if self.inputs.is_empty() {
            self.eof_line
        } else {
            self.inputs.line()
        }
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.names.len()
    }

    pub fn dtd(&self) -> &DocTypeDefinition {
        &self.dtd
    }

    pub fn declaration(&self) -> Option<&XmlDeclaration> {
        self.declaration.as_ref()
    }

    pub fn namespace_context(&self) -> &NamespaceContext {
        &self.namespaces
    }

    pub fn used_size(&self) -> usize {
        self.used
    }

    pub fn has_node(&self) -> bool {
        self.current.is_some()
    }

    /// View of the current node.
    pub fn node(&self) -> Option<Node> {
        Some(match self.current? {
            NodeType::StartDocument => Node::StartDocument,
            NodeType::EndDocument => Node::EndDocument,
            NodeType::DocType => Node::DocType(&self.dtd),
            NodeType::EndDocType => Node::EndDocType(&self.dtd),
            NodeType::StartElement => Node::StartElement(&self.start_element),
            NodeType::EndElement => Node::EndElement(&self.end_element),
            NodeType::Characters => Node::Characters(&self.characters),
            NodeType::Comment => Node::Comment(&self.comment),
            NodeType::ProcessingInstruction => Node::ProcessingInstruction(&self.pi),
            NodeType::EntityReference => Node::EntityReference(&self.entity_ref),
        })
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Run loop

    /// Moves to the next node. Returns `Ok(false)` when the input has no
    /// data right now and `blocking` is unset.
    pub fn produce(&mut self, blocking: bool) -> Result<bool> {
        if self.poisoned {
            return Err(SyntaxError::new("reader failed earlier and must be reset", self.line()).into());
        }
        match self.run(blocking) {
            Err(Error::WouldBlock) => Err(Error::WouldBlock),
            Err(e) => {
                debug!("parsing failed: {}", e);
                self.poisoned = true;
                Err(e)
            }
            ok => ok,
        }
    }

    fn run(&mut self, blocking: bool) -> Result<bool> {
        self.retire();
        if let Some(node) = self.pending.pop_front() {
            self.current = Some(node);
            return Ok(true);
        }
        if self.state == State::Done {
            self.current = Some(NodeType::EndDocument);
            return Ok(true);
        }
        loop {
            match self.inputs.get() {
                Some(c) => self.consume(c)?,
                None => match self.inputs.import()? {
                    Fill::Imported(_) => continue,
                    Fill::Pending if blocking => return Err(Error::WouldBlock),
                    Fill::Pending => return Ok(false),
                    Fill::Exhausted => self.end_of_input()?,
                },
            }
            if self.current.is_some() {
                return Ok(true);
            }
        }
    }

    /// Clears the payload of the node handed out last.
    fn retire(&mut self) {
        match self.current.take() {
            Some(NodeType::StartElement) => self.start_element.clear(),
            Some(NodeType::EndElement) => self.end_element.clear(),
            Some(NodeType::Characters) => {
                self.characters.clear();
                if !self.carried.is_empty() {
                    self.characters.cdata = self.carried_cdata;
                    self.text_len = self.carried.chars().count();
                    std::mem::swap(&mut self.characters.content, &mut self.carried);
                }
            }
            Some(NodeType::Comment) => self.comment.clear(),
            Some(NodeType::ProcessingInstruction) => self.pi.clear(),
            Some(NodeType::EntityReference) => self.entity_ref.clear(),
            _ => {}
        }
        let transient = std::mem::replace(&mut self.transient, 0);
        self.refund(transient);
    }

    /// Charges the budget and normalizes line ends before dispatching.
    fn consume(&mut self, c: char) -> Result<()> {
        if self.in_dtd {
            self.decl_consumed += 1;
            self.def_consumed += 1;
            self.charge(1)?;
        } else if self.inputs.current().entity.is_some() {
            self.charge(1)?;
        }
        match c {
            '\r' => {
                self.after_cr = true;
                self.step('\n')
            }
            '\n' if self.after_cr => {
                self.after_cr = false;
                Ok(())
            }
            _ => {
                self.after_cr = false;
                self.step(c)
            }
        }
    }

    /// Dispatches one character on the current state.
    fn step(&mut self, c: char) -> Result<()> {
        if c == '%' && self.in_dtd && self.state.accepts_pe_reference() {
            self.parse_stack.push(self.state);
            self.token.clear();
            self.state = State::PeRefName { literal: false };
            return Ok(());
        }
        use State::*;
        match self.state {
            DocumentBegin | Prolog | PrologLt | PrologLtExclam | DoctypeKeyword | Epilog
            | EpilogLt | EpilogLtExclam | Done => self.on_document(c),

            CommentStart | Comment | CommentDash | CommentDashDash => self.on_comment(c),

            PiTarget | PiAfterTarget | PiData | PiDataQ => self.on_processing_instruction(c),

            DoctypeBeforeName | DoctypeName | DoctypeAfterName | DoctypeAfterExtId
            | DoctypeAfterSubset => self.on_doctype(c),

            ExtIdKeyword | ExtIdBeforePublicLiteral | PublicLiteral(_) | ExtIdAfterPublic
            | ExtIdBeforeSystemOpt | ExtIdBeforeSystemLiteral | SystemLiteral(_) => {
                self.on_external_id(c)
            }

            Subset(_) | DtdLt | DtdLtExclam | DtdDeclKeyword => self.on_subset(c),

            CondBeforeKeyword | CondKeyword | CondBeforeBracket | IgnoreSection | IgnoreEnd1
            | IgnoreEnd2 | IncludeEnd1 | IncludeEnd2 => self.on_conditional(c),

            PeRefName { literal } => self.on_pe_reference(c, literal),

            ElementBeforeName | ElementName | ElementAfterName | ElementKeyword
            | ElementContent | ElementContentAfterParen | ElementPcData | ElementContentName
            | ElementContentAfterGroup | ElementBeforeEnd => self.on_element_decl(c),

            AttlistBeforeName | AttlistName | AttlistBeforeAttr | AttlistAttrName
            | AttlistBeforeType | AttlistType | AttlistBeforeNotationList | AttlistEnumBefore
            | AttlistEnumValue | AttlistEnumAfter | AttlistBeforeDefaultWs
            | AttlistBeforeDefault | AttlistDefaultKeyword | AttlistBeforeFixedValue
            | AttlistDefaultValue(_) | AttlistAfterDef => self.on_attlist_decl(c),

            EntityBeforeName | EntityPercent | EntityBeforePeName | EntityName
            | EntityAfterName | EntityValue(_) | EntityAfterValue | EntityAfterExtId
            | EntityAfterExtIdWs | EntityNdataKeyword | EntityBeforeNotation
            | EntityNotationName => self.on_entity_decl(c),

            NotationBeforeName | NotationName | NotationAfterName | NotationAfterExtId => {
                self.on_notation_decl(c)
            }

            StartTagName | BeforeAttr | AttrName | AttrBeforeEq | AttrBeforeValue
            | AttrValue(_) | AfterAttrValue | EmptyTagEnd | EndTagName | EndTagAfterName => {
                self.on_tag(c)
            }

            Content | ContentLt | ContentLtExclam | ContentRb1 | ContentRb2 | CdataKeyword
            | CData | CDataRb1 | CDataRb2 => self.on_content(c),

            RefStart(ctx) | RefName(ctx) | CharRefStart(ctx) | CharRefDec(ctx)
            | CharRefHex(ctx) => self.on_reference(c, ctx),
        }
    }

    /// Called when the current input has nothing more to give.
    fn end_of_input(&mut self) -> Result<()> {
        let line = self.inputs.line();
        let input = match self.inputs.pop() {
            Some(input) => input,
            None => return self.end_of_document(),
        };
        self.after_cr = false;
        debug!(
            "input {} finished at line {}",
            input.entity.as_deref().unwrap_or("(document)"),
            line
        );
        let Input {
            source,
            entity,
            resolved,
            external_dtd,
            depth,
            ..
        } = input;
        if resolved {
            if let Some(resolver) = self.resolver.as_mut() {
                resolver.release_input(source);
            }
        }
        if self.inputs.is_empty() {
            self.eof_line = line;
            return self.end_of_document();
        }
        if external_dtd {
            return self.end_external_subset();
        }
        if entity.is_some() && !self.in_dtd {
            let balanced = self.names.len() == depth
                && matches!(self.state, State::Content | State::AttrValue(_));
            if !balanced {
                return self.error(format!(
                    "replacement text of entity {} is not well-balanced",
                    entity.unwrap_or_default()
                ));
            }
        }
        Ok(())
    }

    fn end_of_document(&mut self) -> Result<()> {
        match self.state {
            State::Epilog | State::Done => {
                self.state = State::Done;
                self.emit(NodeType::EndDocument);
                Ok(())
            }
            State::DocumentBegin | State::Prolog => self.error("no root element"),
            _ if self.in_dtd => self.error("unexpected end of document inside DOCTYPE"),
            _ => self.error("unexpected end of document"),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Helpers

    pub(crate) fn error<T, S: Into<String>>(&self, message: S) -> Result<T> {
        Err(SyntaxError::new(message, self.line()).into())
    }

    fn emit(&mut self, node: NodeType) {
        trace!("{:?} at line {}", node, self.line());
        if self.current.is_none() {
            self.current = Some(node);
        } else {
            self.pending.push_back(node);
        }
    }

    /// Resumes the production that was interrupted last.
    fn pop_state(&mut self) -> Result<()> {
        match self.parse_stack.pop() {
            Some(state) => {
                self.state = state;
                Ok(())
            }
            None => self.error("unexpected end of markup"),
        }
    }

    fn charge(&mut self, size: usize) -> Result<()> {
        self.used += size;
        if self.used > self.config.max_size {
            debug!(
                "size budget of {} characters exceeded",
                self.config.max_size
            );
            return self.error(format!(
                "document exceeds the maximum size of {} characters",
                self.config.max_size
            ));
        }
        Ok(())
    }

    fn refund(&mut self, size: usize) {
        self.used = self.used.saturating_sub(size);
    }

    /// Charges one character of a node payload, refunded when the node is
    /// retired. Declarations are charged on their own.
    fn charge_transient(&mut self) -> Result<()> {
        if !self.in_dtd {
            self.transient += 1;
            self.charge(1)?;
        }
        Ok(())
    }

    fn push_input(&mut self, mut input: Input) -> Result<()> {
        if self.inputs.size() >= self.config.max_input_depth {
            debug!(
                "input depth of {} exceeded by {:?}",
                self.config.max_input_depth, input.entity
            );
            if input.resolved {
                if let Some(resolver) = self.resolver.as_mut() {
                    resolver.release_input(input.source);
                }
            }
            return self.error(format!(
                "maximum input depth of {} exceeded",
                self.config.max_input_depth
            ));
        }
        debug!(
            "reading {} at depth {}",
            input.entity.as_deref().unwrap_or("external subset"),
            self.inputs.size() + 1
        );
        input.depth = self.names.len();
        self.after_cr = false;
        self.inputs.push(input);
        Ok(())
    }

    /// Appends to the text run. A full chunk is reported as soon as one
    /// more character arrives, which then starts the next chunk.
    fn push_text(&mut self, c: char) {
        if !self.carried.is_empty() {
            self.carried.push(c);
            return;
        }
        if self.text_len >= self.config.chunk_size {
            self.carried.push(c);
            self.carried_cdata = self.characters.cdata;
            self.characters.chunk = true;
            self.flush_text();
            return;
        }
        self.characters.content.push(c);
        self.text_len += 1;
    }

    /// Reports the character data collected so far, if any.
    fn flush_text(&mut self) {
        if self.text_len > 0 {
            self.text_len = 0;
            self.emit(NodeType::Characters);
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Document level

    fn on_document(&mut self, c: char) -> Result<()> {
        match self.state {
            State::DocumentBegin => {
                if c == '\u{feff}' {
                    return Ok(());
                }
                if c != '<' && !is_whitespace(c) {
                    return self.error("document must start with markup");
                }
                if self.config.report_start_document {
                    self.emit(NodeType::StartDocument);
                }
                if c == '<' {
                    self.at_start = true;
                    self.state = State::PrologLt;
                } else {
                    self.state = State::Prolog;
                }
            }
            State::Prolog => match c {
                '<' => self.state = State::PrologLt,
                c if is_whitespace(c) => {}
                _ => return self.error("character data before the root element"),
            },
            State::PrologLt => {
                if c != '?' {
                    self.at_start = false;
                }
                match c {
                    '?' => {
                        self.parse_stack.push(State::Prolog);
                        self.state = State::PiTarget;
                    }
                    '!' => self.state = State::PrologLtExclam,
                    c if is_name_start_char(c) => self.begin_start_tag(c),
                    _ => return self.error("invalid markup in prolog"),
                }
            }
            State::PrologLtExclam => match c {
                '-' => {
                    self.parse_stack.push(State::Prolog);
                    self.state = State::CommentStart;
                }
                c if c.is_ascii_uppercase() => {
                    self.token.clear();
                    self.token.push(c);
                    self.state = State::DoctypeKeyword;
                }
                _ => return self.error("invalid markup in prolog"),
            },
            State::DoctypeKeyword => {
                if c.is_ascii_uppercase() {
                    self.token.push(c);
                } else if is_whitespace(c) && self.token == "DOCTYPE" {
                    if self.has_doctype {
                        return self.error("duplicate DOCTYPE declaration");
                    }
                    self.has_doctype = true;
                    self.in_dtd = true;
                    self.state = State::DoctypeBeforeName;
                } else {
                    return self.error("DOCTYPE declaration expected");
                }
            }
            State::Epilog => match c {
                '<' => self.state = State::EpilogLt,
                c if is_whitespace(c) => {}
                _ => return self.error("character data after the root element"),
            },
            State::EpilogLt => match c {
                '?' => {
                    self.parse_stack.push(State::Epilog);
                    self.state = State::PiTarget;
                }
                '!' => self.state = State::EpilogLtExclam,
                _ => return self.error("markup after the root element"),
            },
            State::EpilogLtExclam => match c {
                '-' => {
                    self.parse_stack.push(State::Epilog);
                    self.state = State::CommentStart;
                }
                _ => return self.error("markup after the root element"),
            },
            _ => {}
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Comments and processing instructions

    fn on_comment(&mut self, c: char) -> Result<()> {
        match self.state {
            State::CommentStart => {
                if c != '-' {
                    return self.error("malformed comment");
                }
                self.state = State::Comment;
            }
            State::Comment => {
                if c == '-' {
                    self.state = State::CommentDash;
                } else {
                    self.comment_char(c)?;
                }
            }
            State::CommentDash => {
                if c == '-' {
                    self.state = State::CommentDashDash;
                } else {
                    self.comment_char('-')?;
                    self.comment_char(c)?;
                    self.state = State::Comment;
                }
            }
            State::CommentDashDash => {
                if c != '>' {
                    return self.error("'--' is not allowed in comments");
                }
                if self.config.report_comments && !self.in_dtd {
                    self.emit(NodeType::Comment);
                }
                self.pop_state()?;
            }
            _ => {}
        }
        Ok(())
    }

    fn comment_char(&mut self, c: char) -> Result<()> {
        if !is_xml_char(c) {
            return self.error(format!("invalid character {:?} in comment", c));
        }
        if self.config.report_comments && !self.in_dtd {
            self.comment.push(c);
            self.charge_transient()?;
        }
        Ok(())
    }

    fn on_processing_instruction(&mut self, c: char) -> Result<()> {
        match self.state {
            State::PiTarget => {
                if self.pi.target.is_empty() {
                    if !is_name_start_char(c) {
                        return self.error("processing instruction target expected");
                    }
                    self.pi.target.push(c);
                    return self.charge_transient();
                }
                match c {
                    '?' => {
                        self.check_pi_target()?;
                        self.state = State::PiDataQ;
                    }
                    c if is_whitespace(c) => {
                        self.check_pi_target()?;
                        self.state = State::PiAfterTarget;
                    }
                    c if is_name_char(c) || c == ':' => {
                        self.pi.target.push(c);
                        self.charge_transient()?;
                    }
                    _ => return self.error("invalid processing instruction target"),
                }
            }
            State::PiAfterTarget => match c {
                '?' => self.state = State::PiDataQ,
                c if is_whitespace(c) => {}
                _ => {
                    self.pi_char(c)?;
                    self.state = State::PiData;
                }
            },
            State::PiData => {
                if c == '?' {
                    self.state = State::PiDataQ;
                } else {
                    self.pi_char(c)?;
                }
            }
            State::PiDataQ => match c {
                '>' => return self.end_processing_instruction(),
                '?' => self.pi_char('?')?,
                _ => {
                    self.pi_char('?')?;
                    self.pi_char(c)?;
                    self.state = State::PiData;
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn check_pi_target(&self) -> Result<()> {
        let target = self.pi.target.as_str();
        if target != "xml" && target.eq_ignore_ascii_case("xml") {
            return self.error(format!("reserved processing instruction target {}", target));
        }
        Ok(())
    }

    fn pi_char(&mut self, c: char) -> Result<()> {
        if !is_xml_char(c) {
            return self.error(format!("invalid character {:?} in processing instruction", c));
        }
        let keep = self.pi.target == "xml"
            || (self.config.report_processing_instructions && !self.in_dtd);
        if keep {
            self.pi.data.push(c);
            self.charge_transient()?;
        }
        Ok(())
    }

    fn end_processing_instruction(&mut self) -> Result<()> {
        let at_start = std::mem::replace(&mut self.at_start, false);
        if self.pi.target == "xml" {
            if at_start {
                match XmlDeclaration::parse(&self.pi.data) {
                    Ok(decl) => self.declaration = Some(decl),
                    Err(msg) => return self.error(msg),
                }
            } else if !self.inputs.current().external {
                return self.error("XML declaration is only allowed at the start of the document");
            }
            // text declarations of external entities carry nothing we use
            self.pi.clear();
        } else if self.config.report_processing_instructions && !self.in_dtd {
            self.emit(NodeType::ProcessingInstruction);
        } else {
            self.pi.clear();
        }
        self.pop_state()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::input::StrSource;
    use pretty_assertions::assert_eq;

    fn parser(text: &str, config: Config) -> Parser {
        let mut parser = Parser::new(config, None);
        parser.push_document(Box::new(StrSource::new(text)));
        parser
    }

    fn kinds(text: &str, config: Config) -> Vec<NodeType> {
        let mut parser = parser(text, config);
        let mut kinds = Vec::new();
        loop {
            parser.produce(true).unwrap();
            let kind = parser.node().unwrap().node_type();
            kinds.push(kind);
            if kind == NodeType::EndDocument {
                return kinds;
            }
        }
    }

    #[test]
    fn start_document_is_optional() {
        use NodeType::*;

        assert_eq!(
            kinds("<a/>", Config::default()),
            vec![StartElement, EndElement, EndDocument]
        );
        let config = Config {
            report_start_document: true,
            ..Config::default()
        };
        assert_eq!(
            kinds(" <a/>", config),
            vec![StartDocument, StartElement, EndElement, EndDocument]
        );
    }

    #[test]
    fn pe_reference_states() {
        assert!(State::Subset(Subset::Internal).accepts_pe_reference());
        assert!(State::AttlistAfterDef.accepts_pe_reference());
        assert!(!State::EntityBeforeName.accepts_pe_reference());
        assert!(!State::EntityValue('"').accepts_pe_reference());
        assert!(!State::IgnoreSection.accepts_pe_reference());
    }

    #[test]
    fn crlf_is_normalized() {
        let mut parser = parser("<a>x\r\ny\rz</a>", Config::default());
        parser.produce(true).unwrap();
        parser.produce(true).unwrap();
        match parser.node() {
            Some(Node::Characters(text)) => assert_eq!(text.content(), "x\ny\nz"),
            x => panic!("Expected `Some(Characters)`, but got `{:?}`", x),
        }
    }

    #[test]
    fn poisoned_after_error() {
        let mut parser = parser("<a></b>", Config::default());
        parser.produce(true).unwrap();
        assert!(parser.produce(true).is_err());
        match parser.produce(true) {
            Err(Error::Syntax(e)) => assert!(e.message().contains("reset")),
            x => panic!("Expected `Err(Syntax(_))`, but got `{:?}`", x),
        }
        parser.reset();
        parser.push_document(Box::new(StrSource::new("<b/>")));
        assert!(parser.produce(true).unwrap());
    }

    #[test]
    fn transient_budget_is_refunded() {
        let mut parser = parser("<a x='1234'></a>", Config::default());
        parser.produce(true).unwrap();
        // element name "a" plus attribute name and value
        assert_eq!(parser.used_size(), 1 + 5);
        parser.produce(true).unwrap();
        assert_eq!(parser.used_size(), 0);
    }
}
