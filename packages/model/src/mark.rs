use crate::attrs::{attr_str, Attrs};
use serde::{Deserialize, Serialize};

/// Inline annotation (strong, link, math...) attached to text and inline atoms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: String,

    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(mark_type: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs,
        }
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        attr_str(&self.attrs, name)
    }

    /// True if an identical mark (type and attrs) is in the set
    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }

    /// Find the mark of the given type in a set
    pub fn find_type<'a>(mark_type: &str, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|m| m.mark_type == mark_type)
    }

    /// Remove every mark of the given type from a set
    pub fn remove_type(mark_type: &str, set: &[Mark]) -> Vec<Mark> {
        set.iter()
            .filter(|m| m.mark_type != mark_type)
            .cloned()
            .collect()
    }
}
