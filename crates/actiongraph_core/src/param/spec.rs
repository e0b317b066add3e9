// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter creation attributes.
//!
//! A [`ParamSpec`] describes everything fixed when a parameter is created:
//! default, direction, ranges, items and UI hints. Only attributes that differ
//! from their defaults are serialized, which keeps documents small.

use crate::param::kind::ItemType;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Group of input parameters without an explicit group
pub const GROUP_DEFAULT: &str = "Basics";

/// Group of all output parameters
pub const GROUP_OUTPUT: &str = "Outputs";

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn default_items() -> Vec<String> {
    vec!["none".to_string()]
}

fn is_default_items(items: &[String]) -> bool {
    items.len() == 1 && items[0] == "none"
}

/// Creation attributes of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamSpec {
    /// User default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Created at runtime rather than declared by the action kind
    #[serde(skip_serializing_if = "is_false")]
    pub dynamic: bool,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Output parameter
    #[serde(skip_serializing_if = "is_false")]
    pub output: bool,
    /// Writable by users
    #[serde(skip_serializing_if = "is_true")]
    pub editable: bool,
    /// UI group of input parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// UI ordering priority
    #[serde(skip_serializing_if = "is_zero")]
    pub priority: i64,
    /// Numeric minimum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Numeric maximum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Enum items
    #[serde(skip_serializing_if = "is_default_items", default = "default_items")]
    pub items: Vec<String>,
    /// Allowed file extensions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ext: Vec<String>,
    /// Minimum list or dict size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_count: Option<usize>,
    /// Maximum list or dict size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
    /// List item or dict value type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    /// Dict key type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<ItemType>,
    /// Display label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_label: Option<String>,
    /// Shown in editors
    #[serde(skip_serializing_if = "is_true")]
    pub ui_visible: bool,
    /// Vector components are integers
    #[serde(skip_serializing_if = "is_false")]
    pub as_int: bool,
}

impl Default for ParamSpec {
    fn default() -> Self {
        Self {
            default: None,
            dynamic: false,
            doc: None,
            output: false,
            editable: true,
            group: None,
            priority: 0,
            min_value: None,
            max_value: None,
            items: default_items(),
            ext: Vec::new(),
            min_count: None,
            max_count: None,
            item_type: None,
            key_type: None,
            ui_label: None,
            ui_visible: true,
            as_int: false,
        }
    }
}

impl ParamSpec {
    /// Create a spec with default attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Mark as output
    pub fn output(mut self) -> Self {
        self.output = true;
        self
    }

    /// Mark as dynamic
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Mark as read-only
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Hide from editors
    pub fn hidden(mut self) -> Self {
        self.ui_visible = false;
        self
    }

    /// Set the description
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Set the group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set the numeric minimum
    pub fn with_min(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    /// Set the numeric maximum
    pub fn with_max(mut self, max: f64) -> Self {
        self.max_value = Some(max);
        self
    }

    /// Set enum items
    pub fn with_items(mut self, items: &[&str]) -> Self {
        self.items = items.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set allowed file extensions
    pub fn with_ext(mut self, ext: &[&str]) -> Self {
        self.ext = ext.iter().map(|s| s.trim_start_matches('.').to_string()).collect();
        self
    }

    /// Set list or dict cardinality
    pub fn with_count(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_count = min;
        self.max_count = max;
        self
    }

    /// Set the list item or dict value type
    pub fn with_item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    /// Set the dict key type
    pub fn with_key_type(mut self, key_type: ItemType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.ui_label = Some(label.into());
        self
    }

    /// Use integer vector components
    pub fn as_int(mut self) -> Self {
        self.as_int = true;
        self
    }

    /// Effective group name
    pub fn group_name(&self) -> &str {
        if self.output {
            GROUP_OUTPUT
        } else {
            self.group.as_deref().unwrap_or(GROUP_DEFAULT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_non_default_attributes_serialize() {
        let json = serde_json::to_value(ParamSpec::new()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let spec = ParamSpec::new().with_default(3).with_min(0.0).output();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, serde_json::json!({"default": 3, "output": true, "min_value": 0.0}));

        let back: ParamSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_group_name() {
        assert_eq!(ParamSpec::new().group_name(), GROUP_DEFAULT);
        assert_eq!(ParamSpec::new().with_group("Rig").output().group_name(), GROUP_OUTPUT);
    }
}
