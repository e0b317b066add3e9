// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed parameters.
//!
//! A [`Parameter`] is a named, typed slot on an action or graph. Its
//! effective value is resolved by the owning [`Document`](crate::Document)
//! with the precedence script > stored value > default. This module holds
//! the per-parameter state; every operation that needs the rest of the
//! document (scripts, connections, editability) lives on the document.

pub mod coerce;
pub mod kind;
pub mod spec;

pub use coerce::Coercer;
pub use kind::{ItemType, ParamType};
pub use spec::{ParamSpec, GROUP_DEFAULT, GROUP_OUTPUT};

use crate::action::ActionContext;
use crate::error::{ParameterError, Result};
use crate::id::{ObjectId, ParamId};
use crate::script::Script;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Name of the builtin execution chaining input
pub const PARAM_EXECUTION: &str = "execution";
/// Name of the builtin enabled flag
pub const PARAM_ENABLED: &str = "enabled";
/// Name of the builtin break point flag
pub const PARAM_BREAK_POINT: &str = "break_point";
/// Name of the builtin object handle output
pub const PARAM_MESSAGE: &str = "message";

/// Function bound to a callback parameter
pub type CallbackFn = Rc<dyn Fn(&mut ActionContext<'_>) -> Result<()>>;

/// Target of a callback parameter
#[derive(Clone)]
pub enum Callback {
    /// Method of the owner's action kind, looked up when invoked
    Method(String),
    /// Pre-bound function
    Bound(CallbackFn),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Callback::Bound(_) => f.write_str("Bound(..)"),
        }
    }
}

/// A typed parameter owned by one object
#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) id: ParamId,
    pub(crate) name: String,
    pub(crate) owner: ObjectId,
    pub(crate) ty: ParamType,
    pub(crate) spec: ParamSpec,
    pub(crate) default: Value,
    pub(crate) value: Option<Value>,
    pub(crate) script: Option<Script>,
    pub(crate) script_enabled: bool,
    pub(crate) callback: Option<Callback>,
    pub(crate) iter_index: usize,
}

impl Parameter {
    /// Build a parameter, validating and coercing its creation attributes
    pub(crate) fn new(
        id: ParamId,
        owner: ObjectId,
        name: &str,
        ty: ParamType,
        spec: ParamSpec,
    ) -> std::result::Result<Self, ParameterError> {
        if ty == ParamType::Callback && spec.dynamic {
            return Err(ParameterError::Unsupported(format!(
                "Callback parameters cannot be dynamic: {name}"
            )));
        }
        if ty == ParamType::Iter && spec.output {
            return Err(ParameterError::Unsupported(format!(
                "Iterator parameters cannot be outputs: {name}"
            )));
        }
        let coercer = Coercer::new(name, ty, &spec);
        coercer.validate_spec()?;
        let default = coercer.default_value()?;
        if ty.is_container() {
            coercer.check_count(container_len(&default))?;
        }
        let callback = match (&ty, &spec.default) {
            (ParamType::Callback, Some(Value::Str(method))) => Some(Callback::Method(method.clone())),
            _ => None,
        };

        Ok(Self {
            id,
            name: name.to_string(),
            owner,
            ty,
            spec,
            default,
            value: None,
            script: None,
            script_enabled: false,
            callback,
            iter_index: 0,
        })
    }

    /// Parameter id
    pub fn id(&self) -> ParamId {
        self.id
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning object
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Type tag
    pub fn param_type(&self) -> ParamType {
        self.ty
    }

    /// Creation attributes
    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    /// Output parameter
    pub fn is_output(&self) -> bool {
        self.spec.output
    }

    /// Created at runtime
    pub fn is_dynamic(&self) -> bool {
        self.spec.dynamic
    }

    /// Default value, already coerced
    pub fn default(&self) -> &Value {
        &self.default
    }

    /// Stored override, if any
    pub fn stored_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Attached script, if any
    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    /// Whether the script drives the value
    pub fn script_enabled(&self) -> bool {
        self.script_enabled
    }

    /// Effective group name
    pub fn group(&self) -> &str {
        self.spec.group_name()
    }

    /// Display label
    pub fn label(&self) -> &str {
        self.spec.ui_label.as_deref().unwrap_or(&self.name)
    }

    /// Cursor position of an iterator parameter
    pub fn iter_index(&self) -> usize {
        self.iter_index
    }

    /// Callback target
    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    /// Whether the enabled script is exactly one reference
    pub fn has_direct_input(&self) -> bool {
        self.active_script().is_some_and(Script::is_direct)
    }

    /// Whether an enabled script references other parameters
    pub fn has_input(&self) -> bool {
        self.active_script().is_some_and(|s| !s.refs().is_empty())
    }

    pub(crate) fn active_script(&self) -> Option<&Script> {
        self.script.as_ref().filter(|_| self.script_enabled)
    }

    pub(crate) fn coercer(&self) -> Coercer<'_> {
        Coercer::new(&self.name, self.ty, &self.spec)
    }

    /// Stored value or default, ignoring scripts
    pub(crate) fn static_value(&self) -> &Value {
        self.value.as_ref().unwrap_or(&self.default)
    }

    /// Store a coerced value, clearing the override when it equals the default
    pub(crate) fn store(&mut self, value: Value) {
        if value == self.default {
            self.value = None;
        } else {
            self.value = Some(value);
        }
    }
}

/// Number of items in a list or dict value
pub(crate) fn container_len(value: &Value) -> usize {
    match value {
        Value::List(items) => items.len(),
        Value::Dict(map) => map.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdAllocator;

    fn make(ty: ParamType, spec: ParamSpec) -> std::result::Result<Parameter, ParameterError> {
        let mut ids = IdAllocator::new();
        Parameter::new(ids.param(), ids.object(), "p", ty, spec)
    }

    #[test]
    fn test_default_is_coerced() {
        let p = make(ParamType::Int, ParamSpec::new().with_default("12").with_max(10.0)).unwrap();
        assert_eq!(p.default(), &Value::Int(10));
        assert_eq!(p.static_value(), &Value::Int(10));
    }

    #[test]
    fn test_store_clears_override_at_default() {
        let mut p = make(ParamType::Str, ParamSpec::new().with_default("a")).unwrap();
        p.store(Value::from("b"));
        assert_eq!(p.stored_value(), Some(&Value::from("b")));
        p.store(Value::from("a"));
        assert_eq!(p.stored_value(), None);
    }

    #[test]
    fn test_invalid_creation() {
        assert!(make(ParamType::Callback, ParamSpec::new().dynamic()).is_err());
        assert!(make(ParamType::Iter, ParamSpec::new().output()).is_err());
        assert!(make(ParamType::Enum, ParamSpec::new().with_items(&[])).is_err());
        assert!(make(ParamType::List, ParamSpec::new().with_count(Some(1), None)).is_err());
    }

    #[test]
    fn test_callback_method_from_default() {
        let p = make(ParamType::Callback, ParamSpec::new().with_default("reload")).unwrap();
        assert!(matches!(p.callback(), Some(Callback::Method(m)) if m == "reload"));
        assert_eq!(p.default(), &Value::None);
    }
}
