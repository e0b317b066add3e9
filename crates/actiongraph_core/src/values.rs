// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reading and writing parameter values.

use crate::action::ActionContext;
use crate::document::Document;
use crate::error::{EngineError, ParameterError, Result, ScriptError};
use crate::id::ParamId;
use crate::object::EXEC_MAIN;
use crate::param::{container_len, Callback, Coercer, ParamType};
use crate::value::{DictKey, Value};
use tracing::{debug, warn};

impl Document {
    /// Effective value: script (if enabled) > stored value > default
    pub fn value(&self, id: ParamId) -> Result<Value> {
        self.value_at(id, 0)
    }

    pub(crate) fn value_at(&self, id: ParamId, depth: usize) -> Result<Value> {
        let param = self.param(id)?;
        let script = param.active_script();

        if param.ty == ParamType::Message && script.is_none() {
            return Ok(Value::Object(param.owner));
        }

        let Some(script) = script else {
            return Ok(param.static_value().clone());
        };

        match self.eval_script(id, script, depth) {
            Ok(value) => Ok(param.coercer().coerce(value)?),
            Err(err @ ScriptError::Recursion(_)) => Err(err.into()),
            Err(err) if param.ty.is_str() => {
                debug!(param = %self.param_path(id), %err, "Falling back to text substitution");
                let text = self.substitute_script(id, script, depth);
                Ok(param.coercer().coerce(Value::Str(text))?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Value seen by a script referencing `source`
    pub(crate) fn reference_value(&self, source: ParamId, depth: usize) -> std::result::Result<Value, ScriptError> {
        let value = self.value_at(source, depth).map_err(|err| match err {
            EngineError::Script(e) => e,
            other => ScriptError::Eval(other.to_string()),
        })?;
        let param = self
            .param(source)
            .map_err(|err| ScriptError::Eval(err.to_string()))?;
        if param.ty == ParamType::Iter {
            return Ok(value
                .as_list()
                .and_then(|items| items.get(param.iter_index))
                .cloned()
                .unwrap_or_default());
        }
        Ok(value)
    }

    /// Set the stored value of a parameter
    pub fn set_value(&mut self, id: ParamId, value: impl Into<Value>) -> Result<()> {
        self.check_param_editable(id)?;
        let param = self.param(id)?;
        if matches!(param.ty, ParamType::Message | ParamType::Callback) {
            return Err(ParameterError::Unsupported(format!(
                "Can't set the value of a {} parameter: {}",
                param.ty,
                self.param_path(id)
            ))
            .into());
        }
        let value = param.coercer().coerce(value.into())?;
        if param.active_script().is_some() {
            warn!(param = %self.param_path(id), "Value set while a script drives the parameter");
        }
        self.param_mut(id)?.store(value);
        Ok(())
    }

    /// Write an output without the editability check
    pub(crate) fn write_output(&mut self, id: ParamId, value: Value) -> Result<()> {
        let param = self.param(id)?;
        if param.ty == ParamType::Message {
            return Err(ParameterError::Unsupported(format!(
                "Can't set the value of a message parameter: {}",
                self.param_path(id)
            ))
            .into());
        }
        let value = param.coercer().coerce(value)?;
        self.param_mut(id)?.store(value);
        Ok(())
    }

    /// Clear the stored value so the default applies again
    pub fn reset_value(&mut self, id: ParamId) -> Result<()> {
        self.check_param_editable(id)?;
        self.param_mut(id)?.value = None;
        Ok(())
    }

    /// Item string of an enum parameter
    pub fn enum_value(&self, id: ParamId) -> Result<String> {
        let param = self.param(id)?;
        if param.ty != ParamType::Enum {
            return Err(ParameterError::Unsupported(format!("Not an enum parameter: {}", self.param_path(id))).into());
        }
        let index = self.value(id)?.as_i64().unwrap_or(0);
        let items = &param.spec.items;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or_default())
    }

    fn check_iter(&self, id: ParamId) -> Result<()> {
        if self.param(id)?.ty != ParamType::Iter {
            return Err(ParameterError::Unsupported(format!("Not an iterator parameter: {}", self.param_path(id))).into());
        }
        Ok(())
    }

    /// Element of an iterator parameter under its cursor
    pub fn iter_value(&self, id: ParamId) -> Result<Value> {
        self.check_iter(id)?;
        let index = self.param(id)?.iter_index;
        Ok(self
            .value(id)?
            .as_list()
            .and_then(|items| items.get(index))
            .cloned()
            .unwrap_or_default())
    }

    /// Replace the element under the cursor of an iterator parameter
    pub fn set_iter_value(&mut self, id: ParamId, value: impl Into<Value>) -> Result<()> {
        self.check_iter(id)?;
        let index = self.param(id)?.iter_index;
        self.list_set(id, index, value)
    }

    /// Move the cursor of an iterator parameter
    pub(crate) fn set_iter_index(&mut self, id: ParamId, index: usize) -> Result<()> {
        self.param_mut(id)?.iter_index = index;
        Ok(())
    }

    fn mutate_container<R>(
        &mut self,
        id: ParamId,
        f: impl FnOnce(&Coercer<'_>, &mut Value) -> std::result::Result<R, ParameterError>,
    ) -> Result<R> {
        self.check_param_editable(id)?;
        let param = self.param(id)?;
        if !param.ty.is_container() {
            return Err(ParameterError::Unsupported(format!(
                "Not a list or dict parameter: {}",
                self.param_path(id)
            ))
            .into());
        }
        let mut current = param.static_value().clone();
        let coercer = param.coercer();
        let out = f(&coercer, &mut current)?;
        coercer.check_count(container_len(&current))?;
        self.param_mut(id)?.store(current);
        Ok(out)
    }

    fn list_items(value: &mut Value) -> std::result::Result<&mut Vec<Value>, ParameterError> {
        match value {
            Value::List(items) => Ok(items),
            other => Err(unexpected_container(other)),
        }
    }

    /// Append an item to a list parameter
    pub fn list_append(&mut self, id: ParamId, item: impl Into<Value>) -> Result<()> {
        let item = item.into();
        self.mutate_container(id, |c, value| {
            let item = c.coerce_item(item)?;
            Self::list_items(value)?.push(item);
            Ok(())
        })
    }

    /// Insert an item into a list parameter
    pub fn list_insert(&mut self, id: ParamId, index: usize, item: impl Into<Value>) -> Result<()> {
        let item = item.into();
        self.mutate_container(id, |c, value| {
            let item = c.coerce_item(item)?;
            let items = Self::list_items(value)?;
            items.insert(index.min(items.len()), item);
            Ok(())
        })
    }

    /// Remove and return an item of a list parameter (the last one if no index)
    pub fn list_pop(&mut self, id: ParamId, index: Option<usize>) -> Result<Value> {
        self.mutate_container(id, |_, value| {
            let items = Self::list_items(value)?;
            let index = index.unwrap_or_else(|| items.len().saturating_sub(1));
            if index >= items.len() {
                return Err(ParameterError::Unsupported(format!("pop index {index} out of range")));
            }
            Ok(items.remove(index))
        })
    }

    /// Replace an item of a list parameter
    pub fn list_set(&mut self, id: ParamId, index: usize, item: impl Into<Value>) -> Result<()> {
        let item = item.into();
        self.mutate_container(id, |c, value| {
            let item = c.coerce_item(item)?;
            let items = Self::list_items(value)?;
            match items.get_mut(index) {
                Some(slot) => {
                    *slot = item;
                    Ok(())
                }
                None => Err(ParameterError::Unsupported(format!("list index {index} out of range"))),
            }
        })
    }

    /// Insert or replace an entry of a dict parameter
    pub fn dict_insert(&mut self, id: ParamId, key: impl Into<DictKey>, item: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let item = item.into();
        self.mutate_container(id, |c, value| {
            let key = c.coerce_key(key)?;
            let item = c.coerce_item(item)?;
            match value {
                Value::Dict(map) => {
                    map.insert(key, item);
                    Ok(())
                }
                other => Err(unexpected_container(other)),
            }
        })
    }

    /// Remove an entry of a dict parameter
    pub fn dict_remove(&mut self, id: ParamId, key: impl Into<DictKey>) -> Result<Option<Value>> {
        let key = key.into();
        self.mutate_container(id, |c, value| {
            let key = c.coerce_key(key)?;
            match value {
                Value::Dict(map) => Ok(map.shift_remove(&key)),
                other => Err(unexpected_container(other)),
            }
        })
    }

    /// Bind a callback parameter
    pub fn set_callback(&mut self, id: ParamId, callback: Callback) -> Result<()> {
        if self.param(id)?.ty != ParamType::Callback {
            return Err(ParameterError::Unsupported(format!("Not a callback parameter: {}", self.param_path(id))).into());
        }
        self.param_mut(id)?.callback = Some(callback);
        Ok(())
    }

    /// Run the function bound to a callback parameter
    pub fn invoke_callback(&mut self, id: ParamId) -> Result<()> {
        let param = self.param(id)?;
        if param.ty != ParamType::Callback {
            return Err(ParameterError::Unsupported(format!("Not a callback parameter: {}", self.param_path(id))).into());
        }
        let owner = param.owner;
        let callback = param
            .callback
            .clone()
            .ok_or_else(|| ParameterError::Unsupported(format!("Callback is not bound: {}", self.param_path(id))))?;
        match callback {
            Callback::Method(method) => {
                let kind = self.object(owner)?.action_kind().cloned().ok_or_else(|| {
                    ParameterError::Unsupported(format!("{} has no method {method}", self.long_name(owner)))
                })?;
                let mut cx = ActionContext::new(self, owner, EXEC_MAIN);
                kind.call_method(&method, &mut cx)
            }
            Callback::Bound(f) => {
                let mut cx = ActionContext::new(self, owner, EXEC_MAIN);
                f(&mut cx)
            }
        }
    }
}

fn unexpected_container(value: &Value) -> ParameterError {
    ParameterError::Unsupported(format!("Unexpected container value {}", value.type_name()))
}

#[cfg(test)]
mod tests {
    use crate::actions::NullAction;
    use crate::document::Document;
    use crate::param::{ItemType, ParamSpec, ParamType};
    use crate::value::Value;
    use std::rc::Rc;

    fn setup() -> (Document, crate::id::ObjectId) {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let leaf = doc.create_action(Rc::new(NullAction), "leaf", Some(root)).unwrap();
        (doc, leaf)
    }

    #[test]
    fn test_enum_scenario() {
        let (mut doc, leaf) = setup();
        let spec = ParamSpec::new().with_items(&["a", "b", "c"]).with_default("b");
        let p = doc.add_dynamic_param(leaf, "choice", ParamType::Enum, spec).unwrap();
        assert_eq!(doc.value(p).unwrap(), Value::Int(1));
        assert_eq!(doc.enum_value(p).unwrap(), "b");
        doc.set_value(p, 5).unwrap();
        assert_eq!(doc.value(p).unwrap(), Value::Int(2));
        assert_eq!(doc.enum_value(p).unwrap(), "c");
        assert!(doc.set_value(p, "d").is_err());
    }

    #[test]
    fn test_set_value_at_default_clears_override() {
        let (mut doc, leaf) = setup();
        let p = doc.add_dynamic_param(leaf, "count", ParamType::Int, ParamSpec::new().with_default(3)).unwrap();
        doc.set_value(p, 7).unwrap();
        assert_eq!(doc.param(p).unwrap().stored_value(), Some(&Value::Int(7)));
        doc.set_value(p, "3").unwrap();
        assert_eq!(doc.param(p).unwrap().stored_value(), None);
        doc.set_value(p, 9).unwrap();
        doc.reset_value(p).unwrap();
        assert_eq!(doc.value(p).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_non_editable_and_message() {
        let (mut doc, leaf) = setup();
        let p = doc
            .add_dynamic_param(leaf, "locked", ParamType::Int, ParamSpec::new().read_only())
            .unwrap();
        assert!(doc.set_value(p, 1).is_err());
        let message = doc.find_param(leaf, "message").unwrap();
        assert!(doc.set_value(message, 1).is_err());
        assert_eq!(doc.value(message).unwrap(), Value::Object(leaf));
    }

    #[test]
    fn test_list_cardinality() {
        let (mut doc, leaf) = setup();
        let spec = ParamSpec::new()
            .with_default(Value::from(vec![1, 2]))
            .with_item_type(ItemType::Int)
            .with_count(Some(1), Some(3));
        let p = doc.add_dynamic_param(leaf, "items", ParamType::List, spec).unwrap();
        doc.list_append(p, "3").unwrap();
        assert_eq!(doc.value(p).unwrap(), Value::from(vec![1, 2, 3]));
        assert!(doc.list_append(p, 4).is_err());
        assert_eq!(doc.list_pop(p, Some(0)).unwrap(), Value::Int(1));
        doc.list_pop(p, None).unwrap();
        assert!(doc.list_pop(p, None).is_err());
        doc.list_insert(p, 0, 5).unwrap();
        doc.list_set(p, 1, 6).unwrap();
        assert_eq!(doc.value(p).unwrap(), Value::from(vec![5, 6]));
        assert!(doc.set_value(p, Value::List(Vec::new())).is_err());
    }

    #[test]
    fn test_dict_mutation() {
        let (mut doc, leaf) = setup();
        let spec = ParamSpec::new().with_key_type(ItemType::Int).with_item_type(ItemType::Str);
        let p = doc.add_dynamic_param(leaf, "table", ParamType::Dict, spec).unwrap();
        doc.dict_insert(p, "1", 10).unwrap();
        assert_eq!(doc.value(p).unwrap().to_string(), "{1: '10'}");
        assert_eq!(doc.dict_remove(p, 1i64).unwrap(), Some(Value::from("10")));
        assert!(doc.set_value(p, 3).is_err());
    }

    #[test]
    fn test_iter_value() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let spec = ParamSpec::new().with_default(Value::from(vec![10, 20, 30]));
        let p = doc.add_dynamic_param(root, "items", ParamType::Iter, spec).unwrap();
        assert_eq!(doc.iter_value(p).unwrap(), Value::Int(10));
        doc.set_iter_index(p, 2).unwrap();
        assert_eq!(doc.iter_value(p).unwrap(), Value::Int(30));
        doc.set_iter_value(p, 35).unwrap();
        assert_eq!(doc.value(p).unwrap(), Value::from(vec![10, 20, 35]));
    }
}
