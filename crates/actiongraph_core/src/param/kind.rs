// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter type tags.

use crate::error::ParameterError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Boolean
    Bool,
    /// Integer with optional range
    Int,
    /// Float with optional range
    Float,
    /// Two component vector
    Vector2,
    /// Three component vector
    Vector3,
    /// Color with components clamped to 0..=255
    Rgb,
    /// Index into a list of items
    Enum,
    /// String
    Str,
    /// Directory path
    Dir,
    /// File path
    File,
    /// List of values
    List,
    /// List with a cursor, drives graph iteration
    Iter,
    /// Ordered dict
    Dict,
    /// Object identity handle
    Message,
    /// Method binding
    Callback,
    /// Output-only value holder
    #[serde(rename = "pyobject", alias = "opaque")]
    Opaque,
}

impl ParamType {
    /// All parameter types
    pub const ALL: [ParamType; 16] = [
        ParamType::Bool,
        ParamType::Int,
        ParamType::Float,
        ParamType::Vector2,
        ParamType::Vector3,
        ParamType::Rgb,
        ParamType::Enum,
        ParamType::Str,
        ParamType::Dir,
        ParamType::File,
        ParamType::List,
        ParamType::Iter,
        ParamType::Dict,
        ParamType::Message,
        ParamType::Callback,
        ParamType::Opaque,
    ];

    /// Type name used in documents
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Vector2 => "vector2",
            ParamType::Vector3 => "vector3",
            ParamType::Rgb => "rgb",
            ParamType::Enum => "enum",
            ParamType::Str => "str",
            ParamType::Dir => "dir",
            ParamType::File => "file",
            ParamType::List => "list",
            ParamType::Iter => "iter",
            ParamType::Dict => "dict",
            ParamType::Message => "message",
            ParamType::Callback => "callback",
            ParamType::Opaque => "pyobject",
        }
    }

    /// Whether values are strings (these fall back to raw text substitution)
    pub fn is_str(self) -> bool {
        matches!(self, ParamType::Str | ParamType::Dir | ParamType::File)
    }

    /// Whether values are numbers with an optional range
    pub fn is_numeric(self) -> bool {
        matches!(self, ParamType::Int | ParamType::Float)
    }

    /// Whether values are lists or dicts with cardinality constraints
    pub fn is_container(self) -> bool {
        matches!(self, ParamType::List | ParamType::Iter | ParamType::Dict)
    }

    /// The value of a parameter that was never given a default
    pub fn internal_default(self, as_int: bool) -> Value {
        let zero = if as_int { Value::Int(0) } else { Value::Float(0.0) };
        match self {
            ParamType::Bool => Value::Bool(false),
            ParamType::Int | ParamType::Enum => Value::Int(0),
            ParamType::Float => Value::Float(0.0),
            ParamType::Vector2 => Value::List(vec![zero.clone(), zero]),
            ParamType::Vector3 => Value::List(vec![zero.clone(), zero.clone(), zero]),
            ParamType::Rgb => Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(0)]),
            ParamType::Str | ParamType::Dir | ParamType::File => Value::Str(String::new()),
            ParamType::List | ParamType::Iter => Value::List(Vec::new()),
            ParamType::Dict => Value::Dict(Default::default()),
            ParamType::Message | ParamType::Callback | ParamType::Opaque => Value::None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "opaque" {
            return Ok(ParamType::Opaque);
        }
        ParamType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ParameterError::UnknownType(s.to_string()))
    }
}

/// Item or key type of list and dict parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// String items
    Str,
    /// Integer items
    Int,
    /// Float items
    Float,
    /// Boolean items
    Bool,
}

impl ItemType {
    /// Scalar parameter type used to coerce items
    pub fn param_type(self) -> ParamType {
        match self {
            ItemType::Str => ParamType::Str,
            ItemType::Int => ParamType::Int,
            ItemType::Float => ParamType::Float,
            ItemType::Bool => ParamType::Bool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for ty in ParamType::ALL {
            assert_eq!(ty.name().parse::<ParamType>().unwrap(), ty);
        }
        assert_eq!("opaque".parse::<ParamType>().unwrap(), ParamType::Opaque);
        assert!("matrix".parse::<ParamType>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ParamType::Vector3).unwrap();
        assert_eq!(json, "\"vector3\"");
        let ty: ParamType = serde_json::from_str("\"pyobject\"").unwrap();
        assert_eq!(ty, ParamType::Opaque);
    }
}
