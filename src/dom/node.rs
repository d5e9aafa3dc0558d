//! Node types: NodeId, NodeData, PropValue.

use std::collections::BTreeMap;

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for an element. Copy, lightweight (u64).
    pub struct NodeId;
}

/// Value of an element property (the live state a binding can drive, such as
/// `checked` or `value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Bool(bool),
    Text(String),
}

impl PropValue {
    /// The boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(_) => None,
        }
    }

    /// The string payload, if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Data associated with a single element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeData {
    /// Element tag (e.g. "li", "input").
    pub tag: String,
    /// Markup attributes. Absent means unset.
    pub attributes: BTreeMap<String, String>,
    /// Live properties.
    pub properties: BTreeMap<String, PropValue>,
    /// Text content.
    pub text: Option<String>,
}

impl NodeData {
    /// Create a new element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set an attribute (builder).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the text content (builder).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attribute value, if set.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set (`Some`) or remove (`None`) an attribute.
    pub fn set_attribute(&mut self, name: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.attributes.insert(name.to_owned(), value);
            }
            None => {
                self.attributes.remove(name);
            }
        }
    }

    /// Property value, if set.
    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.properties.get(name)
    }

    /// Set a property.
    pub fn set_property(&mut self, name: &str, value: PropValue) {
        self.properties.insert(name.to_owned(), value);
    }
}
