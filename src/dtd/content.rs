//! Element content models declared with `<!ELEMENT ...>`

use std::fmt;

use crate::name::QName;

/// How many times a content particle may occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    /// Exactly once
    One,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Repeat {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '?' => Some(Repeat::Optional),
            '*' => Some(Repeat::ZeroOrMore),
            '+' => Some(Repeat::OneOrMore),
            _ => None,
        }
    }
}

/// A node of a content model expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Particle {
    /// A child element name
    Name(QName),
    /// `#PCDATA`, only valid as the first item of a mixed content model
    PcData,
    /// `(a, b, ...)`
    Seq(Vec<ContentParticle>),
    /// `(a | b | ...)`
    Choice(Vec<ContentParticle>),
}

/// A [`Particle`] together with its occurrence indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentParticle {
    /// What the particle matches
    pub particle: Particle,
    /// How often it may occur
    pub repeat: Repeat,
}

impl ContentParticle {
    fn new(particle: Particle) -> Self {
        Self {
            particle,
            repeat: Repeat::One,
        }
    }
}

/// The declared content of an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentModel {
    /// No `<!ELEMENT>` declaration seen yet
    Undeclared,
    /// `EMPTY`
    Empty,
    /// `ANY`
    Any,
    /// `(#PCDATA)` or `(#PCDATA | a | b)*`: character data mixed with the
    /// listed elements
    Mixed(Vec<QName>),
    /// Element-only content
    Children(ContentParticle),
}

impl Default for ContentModel {
    fn default() -> Self {
        ContentModel::Undeclared
    }
}

impl ContentModel {
    /// Returns `false` for [`ContentModel::Undeclared`].
    pub fn is_declared(&self) -> bool {
        !matches!(self, ContentModel::Undeclared)
    }
}

/// Reasons a content model expression is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentModelError {
    /// Parentheses do not balance
    Unbalanced,
    /// A name or a group appears where an operator was expected, or the
    /// other way around
    MisplacedOperand,
    /// An operator appears where a name or a group was expected
    MisplacedOperator,
    /// `,` and `|` are mixed in one group
    MixedOperators,
    /// `#PCDATA` is not the first item of the outermost group
    MisplacedPcData,
    /// A mixed content model with element names is not closed with `)*`,
    /// uses `,`, or repeats a single name
    InvalidMixedContent,
    /// A particle carries two occurrence indicators
    DoubleRepeat,
}

impl fmt::Display for ContentModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ContentModelError::Unbalanced => "unbalanced parentheses in content model",
            ContentModelError::MisplacedOperand => "operator expected in content model",
            ContentModelError::MisplacedOperator => "unexpected operator in content model",
            ContentModelError::MixedOperators => "',' and '|' mixed in one content model group",
            ContentModelError::MisplacedPcData => "#PCDATA must come first in a mixed content model",
            ContentModelError::InvalidMixedContent => "mixed content model must be (#PCDATA|name...)*",
            ContentModelError::DoubleRepeat => "more than one occurrence indicator",
        };
        f.write_str(msg)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Operator {
    Seq,
    Choice,
}

#[derive(Default)]
struct Scope {
    items: Vec<ContentParticle>,
    operator: Option<Operator>,
}

/// Incremental builder for the parenthesized part of an `<!ELEMENT>`
/// declaration.
///
/// The parser feeds it tokens as they are recognized: `(` opens a scope,
/// names and `#PCDATA` are operands, `,` `|` `?` `*` `+` are operators and
/// `)` reduces the innermost scope into its parent. Consistency is checked
/// at every step so an error can be reported on the line where it occurs.
#[derive(Default)]
pub struct ContentModelBuilder {
    scopes: Vec<Scope>,
    result: Option<ContentParticle>,
    expect_operand: bool,
    pcdata: bool,
}

impl ContentModelBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets any partially built expression.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.result = None;
        self.expect_operand = false;
        self.pcdata = false;
    }

    /// Nesting depth of open groups.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn check_operand_position(&self) -> Result<(), ContentModelError> {
        if self.result.is_some() {
            return Err(ContentModelError::Unbalanced);
        }
        if !self.scopes.is_empty() && !self.expect_operand {
            return Err(ContentModelError::MisplacedOperand);
        }
        Ok(())
    }

    /// Opens a group on `(`.
    pub fn push_scope(&mut self) -> Result<(), ContentModelError> {
        self.check_operand_position()?;
        if self.pcdata {
            return Err(ContentModelError::InvalidMixedContent);
        }
        self.scopes.push(Scope::default());
        self.expect_operand = true;
        Ok(())
    }

    /// Adds an element name or `#PCDATA` to the innermost group.
    pub fn push_operand(&mut self, name: &str) -> Result<(), ContentModelError> {
        self.check_operand_position()?;
        let depth = self.scopes.len();
        let scope = self
            .scopes
            .last_mut()
            .ok_or(ContentModelError::Unbalanced)?;
        let particle = if name == "#PCDATA" {
            if depth != 1 || !scope.items.is_empty() {
                return Err(ContentModelError::MisplacedPcData);
            }
            self.pcdata = true;
            Particle::PcData
        } else {
            Particle::Name(QName::new(name))
        };
        scope.items.push(ContentParticle::new(particle));
        self.expect_operand = false;
        Ok(())
    }

    /// Applies one of `,` `|` `?` `*` `+`.
    pub fn push_operator(&mut self, op: char) -> Result<(), ContentModelError> {
        if self.expect_operand {
            return Err(ContentModelError::MisplacedOperator);
        }
        if let Some(repeat) = Repeat::from_char(op) {
            return self.apply_repeat(repeat);
        }
        let operator = match op {
            ',' => Operator::Seq,
            '|' => Operator::Choice,
            _ => return Err(ContentModelError::MisplacedOperator),
        };
        if self.pcdata && operator == Operator::Seq {
            return Err(ContentModelError::InvalidMixedContent);
        }
        let scope = self
            .scopes
            .last_mut()
            .ok_or(ContentModelError::MisplacedOperator)?;
        match scope.operator {
            Some(current) if current != operator => return Err(ContentModelError::MixedOperators),
            _ => scope.operator = Some(operator),
        }
        self.expect_operand = true;
        Ok(())
    }

    fn apply_repeat(&mut self, repeat: Repeat) -> Result<(), ContentModelError> {
        let target = match self.scopes.last_mut() {
            Some(_) if self.pcdata => return Err(ContentModelError::InvalidMixedContent),
            Some(scope) => scope.items.last_mut(),
            None => self.result.as_mut(),
        };
        let target = target.ok_or(ContentModelError::MisplacedOperator)?;
        if target.repeat != Repeat::One {
            return Err(ContentModelError::DoubleRepeat);
        }
        if self.pcdata && repeat != Repeat::ZeroOrMore {
            return Err(ContentModelError::InvalidMixedContent);
        }
        target.repeat = repeat;
        Ok(())
    }

    /// Closes the innermost group on `)`.
    pub fn reduce_scope(&mut self) -> Result<(), ContentModelError> {
        if self.expect_operand {
            return Err(ContentModelError::MisplacedOperator);
        }
        let mut scope = self.scopes.pop().ok_or(ContentModelError::Unbalanced)?;
        let particle = match scope.operator {
            None if scope.items.len() == 1 && scope.items[0].repeat == Repeat::One => {
                match scope.items.pop() {
                    Some(item) => item,
                    None => return Err(ContentModelError::Unbalanced),
                }
            }
            Some(Operator::Choice) => ContentParticle::new(Particle::Choice(scope.items)),
            _ => ContentParticle::new(Particle::Seq(scope.items)),
        };
        match self.scopes.last_mut() {
            Some(parent) => parent.items.push(particle),
            None => self.result = Some(particle),
        }
        self.expect_operand = false;
        Ok(())
    }

    /// Validates the complete expression and returns the model, leaving the
    /// builder empty.
    pub fn finish(&mut self) -> Result<ContentModel, ContentModelError> {
        if !self.scopes.is_empty() {
            return Err(ContentModelError::Unbalanced);
        }
        let result = self.result.take().ok_or(ContentModelError::Unbalanced)?;
        let pcdata = std::mem::replace(&mut self.pcdata, false);
        if !pcdata {
            return Ok(ContentModel::Children(result));
        }
        let repeat = result.repeat;
        let items = match result.particle {
            Particle::PcData => Vec::new(),
            Particle::Choice(items) | Particle::Seq(items) => items,
            Particle::Name(_) => return Err(ContentModelError::MisplacedPcData),
        };
        if items.len() > 1 && repeat != Repeat::ZeroOrMore {
            return Err(ContentModelError::InvalidMixedContent);
        }
        let names = items
            .into_iter()
            .skip(1)
            .map(|cp| match cp.particle {
                Particle::Name(name) => Ok(name),
                _ => Err(ContentModelError::InvalidMixedContent),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ContentModel::Mixed(names))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Feeds a compact expression (no whitespace, single-letter names) to a
    /// builder.
    fn build(expr: &str) -> Result<ContentModel, ContentModelError> {
        let mut builder = ContentModelBuilder::new();
        let mut chars = expr.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '(' => builder.push_scope()?,
                ')' => builder.reduce_scope()?,
                '#' => {
                    let word: String = std::iter::once(c)
                        .chain(std::iter::from_fn(|| {
                            chars.next_if(|c| c.is_ascii_uppercase())
                        }))
                        .collect();
                    builder.push_operand(&word)?;
                }
                c if c.is_alphabetic() => builder.push_operand(&c.to_string())?,
                c => builder.push_operator(c)?,
            }
        }
        builder.finish()
    }

    fn name(n: &str, repeat: Repeat) -> ContentParticle {
        ContentParticle {
            particle: Particle::Name(QName::new(n)),
            repeat,
        }
    }

    #[test]
    fn sequence_with_repeats() {
        assert_eq!(
            build("(a,b?,c*)+"),
            Ok(ContentModel::Children(ContentParticle {
                particle: Particle::Seq(vec![
                    name("a", Repeat::One),
                    name("b", Repeat::Optional),
                    name("c", Repeat::ZeroOrMore),
                ]),
                repeat: Repeat::OneOrMore,
            }))
        );
    }

    #[test]
    fn nested_choice() {
        assert_eq!(
            build("(a,(b|c))"),
            Ok(ContentModel::Children(ContentParticle::new(Particle::Seq(
                vec![
                    name("a", Repeat::One),
                    ContentParticle::new(Particle::Choice(vec![
                        name("b", Repeat::One),
                        name("c", Repeat::One),
                    ])),
                ]
            ))))
        );
    }

    #[test]
    fn single_name() {
        assert_eq!(
            build("(a)"),
            Ok(ContentModel::Children(name("a", Repeat::One)))
        );
    }

    #[test]
    fn mixed() {
        assert_eq!(build("(#PCDATA)"), Ok(ContentModel::Mixed(vec![])));
        assert_eq!(build("(#PCDATA)*"), Ok(ContentModel::Mixed(vec![])));
        assert_eq!(
            build("(#PCDATA|a|b)*"),
            Ok(ContentModel::Mixed(vec![QName::new("a"), QName::new("b")]))
        );
    }

    #[test]
    fn errors() {
        assert_eq!(build("(a,b|c)"), Err(ContentModelError::MixedOperators));
        assert_eq!(build("(a,b"), Err(ContentModelError::Unbalanced));
        assert_eq!(build("(a))"), Err(ContentModelError::Unbalanced));
        assert_eq!(build("(a,)"), Err(ContentModelError::MisplacedOperator));
        assert_eq!(build("()"), Err(ContentModelError::MisplacedOperator));
        assert_eq!(build("(ab)"), Err(ContentModelError::MisplacedOperand));
        assert_eq!(build("(a#PCDATA)"), Err(ContentModelError::MisplacedOperand));
        assert_eq!(build("(a|#PCDATA)"), Err(ContentModelError::MisplacedPcData));
        assert_eq!(build("(#PCDATA|a)"), Err(ContentModelError::InvalidMixedContent));
        assert_eq!(build("(#PCDATA,a)*"), Err(ContentModelError::InvalidMixedContent));
        assert_eq!(build("(a*?)"), Err(ContentModelError::DoubleRepeat));
    }
}
