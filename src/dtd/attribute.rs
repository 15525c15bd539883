//! Attribute definitions declared with `<!ATTLIST ...>`

use crate::name::QName;

/// Declared type of an attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeType {
    /// `CDATA`
    CData,
    /// `ID`
    Id,
    /// `IDREF`
    IdRef,
    /// `IDREFS`
    IdRefs,
    /// `ENTITY`
    Entity,
    /// `ENTITIES`
    Entities,
    /// `NMTOKEN`
    NmToken,
    /// `NMTOKENS`
    NmTokens,
    /// `NOTATION (a|b)`, listing notation names
    Notation(Vec<String>),
    /// `(a|b)`, listing allowed values
    Enumeration(Vec<String>),
}

impl AttributeType {
    /// Maps a type keyword to the type. Enumerated types start out empty.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "CDATA" => AttributeType::CData,
            "ID" => AttributeType::Id,
            "IDREF" => AttributeType::IdRef,
            "IDREFS" => AttributeType::IdRefs,
            "ENTITY" => AttributeType::Entity,
            "ENTITIES" => AttributeType::Entities,
            "NMTOKEN" => AttributeType::NmToken,
            "NMTOKENS" => AttributeType::NmTokens,
            "NOTATION" => AttributeType::Notation(Vec::new()),
            _ => return None,
        })
    }
}

/// Default declaration of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultMode {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED "value"`
    Fixed,
    /// A bare `"value"`
    Default,
}

impl DefaultMode {
    /// Maps `REQUIRED`, `IMPLIED` or `FIXED` (after the `#`) to the mode.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "REQUIRED" => Some(DefaultMode::Required),
            "IMPLIED" => Some(DefaultMode::Implied),
            "FIXED" => Some(DefaultMode::Fixed),
            _ => None,
        }
    }
}

/// One attribute definition of an attribute list declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeModel {
    name: QName,
    ty: AttributeType,
    mode: DefaultMode,
    default_value: Option<String>,
}

impl AttributeModel {
    /// Creates a definition with `#IMPLIED` mode and no default.
    pub fn new(name: QName, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            mode: DefaultMode::Implied,
            default_value: None,
        }
    }

    /// Name of the attribute.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Declared type.
    pub fn attribute_type(&self) -> &AttributeType {
        &self.ty
    }

    /// Default mode.
    pub fn mode(&self) -> DefaultMode {
        self.mode
    }

    /// The default or fixed value, if any.
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Whether values of this attribute have leading and trailing spaces
    /// trimmed and inner runs collapsed. True for every type but `CDATA`.
    pub fn is_normalize(&self) -> bool {
        self.ty != AttributeType::CData
    }

    /// Sets the mode. A bare default value implies [`DefaultMode::Default`].
    pub fn set_mode(&mut self, mode: DefaultMode) {
        self.mode = mode;
    }

    /// Sets the default value, normalized the way the attribute values are.
    pub fn set_default_value(&mut self, value: &str) {
        let value = if self.is_normalize() {
            normalize(value)
        } else {
            value.to_owned()
        };
        self.default_value = Some(value);
    }

    /// Adds one value to an enumerated or `NOTATION` type. Returns `false`
    /// for other types or when the value is listed twice.
    pub fn add_value(&mut self, value: &str) -> bool {
        match &mut self.ty {
            AttributeType::Notation(values) | AttributeType::Enumeration(values) => {
                if values.iter().any(|v| v == value) {
                    return false;
                }
                values.push(value.to_owned());
                true
            }
            _ => false,
        }
    }
}

/// Collapses runs of spaces into one and trims both ends.
pub(crate) fn normalize(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for word in value.split(' ').filter(|w| !w.is_empty()) {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result
}
