//! Document type definition collected from the internal and external subsets
//!
//! All tables keep the first declaration of a name, as XML requires for
//! entities and attribute definitions: a later declaration of the same name
//! is parsed and then ignored.

mod attribute;
mod content;

use std::collections::HashMap;

use crate::name::QName;

pub use self::attribute::{AttributeModel, AttributeType, DefaultMode};
pub use self::content::{
    ContentModel, ContentModelBuilder, ContentModelError, ContentParticle, Particle, Repeat,
};
pub(crate) use self::attribute::normalize;

/// A general (`&name;`) or parameter (`%name;`) entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    pub(crate) name: String,
    pub(crate) public_id: Option<String>,
    pub(crate) system_id: Option<String>,
    pub(crate) value: Option<String>,
    pub(crate) notation: Option<String>,
    pub(crate) parameter: bool,
}

impl Entity {
    /// Creates an internal general entity with the given replacement text.
    pub fn internal<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Entity name, without the `%` of parameter entities.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public identifier of an external entity.
    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    /// System identifier of an external entity.
    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    /// Replacement text of an internal entity, with character references
    /// and parameter entity references already expanded.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Notation of an unparsed entity (`NDATA name`).
    pub fn notation(&self) -> Option<&str> {
        self.notation.as_deref()
    }

    /// Whether this is a parameter entity.
    pub fn is_parameter(&self) -> bool {
        self.parameter
    }

    /// Whether the replacement text lives in another resource.
    pub fn is_external(&self) -> bool {
        self.value.is_none()
    }

    /// Whether the entity is external and not XML (has an `NDATA` clause).
    pub fn is_unparsed(&self) -> bool {
        self.notation.is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.name.clear();
        self.public_id = None;
        self.system_id = None;
        self.value = None;
        self.notation = None;
        self.parameter = false;
    }
}

/// A notation declared with `<!NOTATION ...>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Notation {
    pub(crate) name: String,
    pub(crate) public_id: Option<String>,
    pub(crate) system_id: Option<String>,
}

impl Notation {
    /// Notation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public identifier.
    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    /// System identifier.
    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }
}

/// Declarations of a `<!DOCTYPE>`.
#[derive(Debug, Default)]
pub struct DocTypeDefinition {
    root: QName,
    public_id: Option<String>,
    system_id: Option<String>,
    /// Entities in declaration order
    entities: Vec<Entity>,
    general: HashMap<String, usize>,
    parameter: HashMap<String, usize>,
    notations: HashMap<String, Notation>,
    elements: HashMap<QName, ContentModel>,
    attributes: HashMap<QName, Vec<AttributeModel>>,
}

impl DocTypeDefinition {
    /// Creates an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the document element as given in the `<!DOCTYPE>`.
    pub fn root(&self) -> &QName {
        &self.root
    }

    /// Public identifier of the external subset.
    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    /// System identifier of the external subset.
    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub(crate) fn root_mut(&mut self) -> &mut QName {
        &mut self.root
    }

    pub(crate) fn set_external_id(&mut self, public_id: Option<String>, system_id: Option<String>) {
        self.public_id = public_id;
        self.system_id = system_id;
    }

    /// Adds an entity unless one with the same name and kind exists.
    /// Returns whether it was added.
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        let index = if entity.parameter {
            &mut self.parameter
        } else {
            &mut self.general
        };
        if index.contains_key(&entity.name) {
            return false;
        }
        index.insert(entity.name.clone(), self.entities.len());
        self.entities.push(entity);
        true
    }

    /// Looks up a general entity.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.general.get(name).map(|&i| &self.entities[i])
    }

    /// Looks up a parameter entity.
    pub fn parameter_entity(&self, name: &str) -> Option<&Entity> {
        self.parameter.get(name).map(|&i| &self.entities[i])
    }

    /// Whether an entity of this name and kind is declared.
    pub fn has_entity(&self, name: &str, parameter: bool) -> bool {
        if parameter {
            self.parameter.contains_key(name)
        } else {
            self.general.contains_key(name)
        }
    }

    /// All entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Adds a notation unless one with the same name exists.
    pub fn add_notation(&mut self, notation: Notation) -> bool {
        if self.notations.contains_key(&notation.name) {
            return false;
        }
        self.notations.insert(notation.name.clone(), notation);
        true
    }

    /// Looks up a notation.
    pub fn notation(&self, name: &str) -> Option<&Notation> {
        self.notations.get(name)
    }

    /// Content model of an element, `None` if it was never declared.
    pub fn element(&self, name: &str) -> Option<&ContentModel> {
        self.elements.get(name)
    }

    /// Whether an `<!ELEMENT>` declaration for `name` was seen.
    pub fn is_element_declared(&self, name: &str) -> bool {
        self.elements.get(name).map_or(false, ContentModel::is_declared)
    }

    /// Installs a content model. Returns `false` and keeps the existing one
    /// if the element is already declared.
    pub fn declare_element(&mut self, name: QName, model: ContentModel) -> bool {
        let slot = self.elements.entry(name).or_default();
        if slot.is_declared() {
            return false;
        }
        *slot = model;
        true
    }

    /// Whether `element` already has a definition for `attribute`.
    pub fn has_attribute(&self, element: &str, attribute: &str) -> bool {
        self.attribute(element, attribute).is_some()
    }

    /// Adds an attribute definition unless the element already has one with
    /// the same name.
    pub fn add_attribute(&mut self, element: &QName, model: AttributeModel) -> bool {
        if self.has_attribute(element.as_str(), model.name().as_str()) {
            return false;
        }
        match self.attributes.get_mut(element.as_str()) {
            Some(list) => list.push(model),
            None => {
                self.attributes.insert(element.clone(), vec![model]);
            }
        }
        true
    }

    /// Looks up one attribute definition.
    pub fn attribute(&self, element: &str, attribute: &str) -> Option<&AttributeModel> {
        self.attributes(element)
            .iter()
            .find(|a| a.name().as_str() == attribute)
    }

    /// All attribute definitions of an element in declaration order.
    pub fn attributes(&self, element: &str) -> &[AttributeModel] {
        self.attributes
            .get(element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Forgets every declaration.
    pub fn clear(&mut self) {
        self.root.clear();
        self.public_id = None;
        self.system_id = None;
        self.entities.clear();
        self.general.clear();
        self.parameter.clear();
        self.notations.clear();
        self.elements.clear();
        self.attributes.clear();
    }
}
