// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-kind value coercion and validation.

use crate::error::ParameterError;
use crate::param::kind::{ItemType, ParamType};
use crate::param::spec::ParamSpec;
use crate::value::{DictKey, Value};
use indexmap::IndexMap;

/// Coerces raw values into the canonical form of one parameter
pub struct Coercer<'a> {
    name: &'a str,
    ty: ParamType,
    spec: &'a ParamSpec,
}

impl<'a> Coercer<'a> {
    /// Create a coercer for a parameter
    pub fn new(name: &'a str, ty: ParamType, spec: &'a ParamSpec) -> Self {
        Self { name, ty, spec }
    }

    fn invalid(&self, reason: impl Into<String>) -> ParameterError {
        ParameterError::InvalidValue {
            param: self.name.to_string(),
            kind: self.ty.name(),
            reason: reason.into(),
        }
    }

    /// Check that the creation attributes make sense for this kind
    pub fn validate_spec(&self) -> Result<(), ParameterError> {
        if self.ty == ParamType::Enum && self.spec.items.is_empty() {
            return Err(self.invalid("enum items cannot be empty"));
        }
        if self.ty == ParamType::Dict {
            if let Some(key_type @ (ItemType::Bool | ItemType::Float)) = self.spec.key_type {
                return Err(ParameterError::Unsupported(format!(
                    "Dict key type {key_type:?} is not supported: {}",
                    self.name
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.spec.min_count, self.spec.max_count) {
            if min > max {
                return Err(self.invalid(format!("min_count {min} > max_count {max}")));
            }
        }
        Ok(())
    }

    /// The default value: the user default coerced, or the internal default
    pub fn default_value(&self) -> Result<Value, ParameterError> {
        match &self.spec.default {
            Some(v) if !matches!(self.ty, ParamType::Message | ParamType::Callback) => {
                self.coerce(v.clone())
            }
            _ => Ok(self.ty.internal_default(self.spec.as_int)),
        }
    }

    /// Coerce a value into this parameter's type
    pub fn coerce(&self, value: Value) -> Result<Value, ParameterError> {
        match self.ty {
            ParamType::Bool => self.to_bool(&value).map(Value::Bool),
            ParamType::Int => {
                let i = self.to_int(&value)?;
                Ok(Value::Int(self.clamp_int(i)))
            }
            ParamType::Float => {
                let f = self.to_float(&value)?;
                Ok(Value::Float(self.clamp_float(f)))
            }
            ParamType::Vector2 => self.to_vector(&value, 2, self.spec.as_int),
            ParamType::Vector3 => self.to_vector(&value, 3, self.spec.as_int),
            ParamType::Rgb => self.to_rgb(&value),
            ParamType::Enum => self.to_enum(&value).map(Value::Int),
            ParamType::Str => self.to_str(&value).map(Value::Str),
            ParamType::Dir => self.to_str(&value).map(|s| Value::Str(normalize_dir(&s))),
            ParamType::File => {
                let s = self.to_str(&value)?;
                self.to_file(&s).map(Value::Str)
            }
            ParamType::List | ParamType::Iter => self.to_list(value),
            ParamType::Dict => self.to_dict(value),
            ParamType::Message => match value {
                Value::Object(_) | Value::None => Ok(value),
                other => Err(self.invalid(format!("expected an object, got {}", other.type_name()))),
            },
            ParamType::Callback => match value {
                Value::Str(_) | Value::None => Ok(value),
                other => Err(self.invalid(format!("expected a method name, got {}", other.type_name()))),
            },
            ParamType::Opaque => Ok(value),
        }
    }

    /// Check list or dict cardinality
    pub fn check_count(&self, count: usize) -> Result<(), ParameterError> {
        let min = self.spec.min_count;
        let max = self.spec.max_count;
        if min.is_some_and(|m| count < m) || max.is_some_and(|m| count > m) {
            return Err(ParameterError::Cardinality {
                param: self.name.to_string(),
                count,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Coerce one list item or dict value
    pub fn coerce_item(&self, value: Value) -> Result<Value, ParameterError> {
        match self.spec.item_type {
            None => Ok(value),
            Some(item_type) => {
                let item_spec = ParamSpec::new();
                Coercer::new(self.name, item_type.param_type(), &item_spec).coerce(value)
            }
        }
    }

    fn to_bool(&self, value: &Value) -> Result<bool, ParameterError> {
        match value {
            Value::Str(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                other => Err(self.invalid(format!("not a boolean: {other:?}"))),
            },
            other => Ok(other.truthy()),
        }
    }

    fn to_int(&self, value: &Value) -> Result<i64, ParameterError> {
        match value {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(i) => Ok(*i),
            Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                    .ok_or_else(|| self.invalid(format!("not a number: {s:?}")))
            }
            other => Err(self.invalid(format!("expected a number, got {}", other.type_name()))),
        }
    }

    fn to_float(&self, value: &Value) -> Result<f64, ParameterError> {
        match value {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.invalid(format!("not a number: {s:?}"))),
            other => other
                .as_f64()
                .ok_or_else(|| self.invalid(format!("expected a number, got {}", other.type_name()))),
        }
    }

    fn clamp_float(&self, mut f: f64) -> f64 {
        if let Some(min) = self.spec.min_value {
            if f < min {
                tracing::warn!("{} clamped to minimum {}", self.name, min);
                f = min;
            }
        }
        if let Some(max) = self.spec.max_value {
            if f > max {
                tracing::warn!("{} clamped to maximum {}", self.name, max);
                f = max;
            }
        }
        f
    }

    fn clamp_int(&self, mut i: i64) -> i64 {
        if let Some(min) = self.spec.min_value {
            let min = min.ceil() as i64;
            if i < min {
                tracing::warn!("{} clamped to minimum {}", self.name, min);
                i = min;
            }
        }
        if let Some(max) = self.spec.max_value {
            let max = max.floor() as i64;
            if i > max {
                tracing::warn!("{} clamped to maximum {}", self.name, max);
                i = max;
            }
        }
        i
    }

    fn component(&self, value: &Value, as_int: bool) -> Result<Value, ParameterError> {
        if as_int {
            self.to_int(value).map(Value::Int)
        } else {
            self.to_float(value).map(Value::Float)
        }
    }

    fn to_vector(&self, value: &Value, len: usize, as_int: bool) -> Result<Value, ParameterError> {
        let zero = if as_int { Value::Int(0) } else { Value::Float(0.0) };
        let mut out = vec![zero; len];
        match value {
            Value::List(items) => {
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = self.component(item, as_int)?;
                }
            }
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
                out[0] = self.component(value, as_int)?;
            }
            other => {
                return Err(self.invalid(format!("expected a vector, got {}", other.type_name())));
            }
        }
        Ok(Value::List(out))
    }

    fn to_rgb(&self, value: &Value) -> Result<Value, ParameterError> {
        let Value::List(items) = self.to_vector(value, 3, true)? else {
            return Err(self.invalid("expected a color"));
        };
        let items = items
            .into_iter()
            .map(|c| Value::Int(c.as_i64().unwrap_or(0).clamp(0, 255)))
            .collect();
        Ok(Value::List(items))
    }

    fn to_enum(&self, value: &Value) -> Result<i64, ParameterError> {
        let items = &self.spec.items;
        let index = match value {
            Value::Str(s) => {
                return items.iter().position(|item| item == s).map(|i| i as i64).ok_or_else(|| {
                    ParameterError::InvalidEnumItem {
                        param: self.name.to_string(),
                        item: s.clone(),
                        items: items.clone(),
                    }
                });
            }
            other => self.to_int(other)?,
        };
        let max = items.len() as i64 - 1;
        if index < 0 || index > max {
            let clamped = index.clamp(0, max.max(0));
            tracing::warn!(
                "Enum index {} out of range on {}, clamped to {}",
                index,
                self.name,
                clamped
            );
            return Ok(clamped);
        }
        Ok(index)
    }

    fn to_str(&self, value: &Value) -> Result<String, ParameterError> {
        match value {
            Value::None => Ok(String::new()),
            Value::Str(s) => Ok(s.clone()),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(value.to_string()),
            other => Err(self.invalid(format!("expected a string, got {}", other.type_name()))),
        }
    }

    fn to_file(&self, path: &str) -> Result<String, ParameterError> {
        let path = path.replace('\\', "/");
        if path.is_empty() {
            return Ok(path);
        }
        let file_name = path.rsplit('/').next().unwrap_or_default();
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return Err(self.invalid(format!("not a file path: {path}")));
        };
        if !self.spec.ext.is_empty() && !self.spec.ext.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return Err(self.invalid(format!(
                "extension \"{ext}\" not in {:?}: {path}",
                self.spec.ext
            )));
        }
        Ok(path)
    }

    fn to_list(&self, value: Value) -> Result<Value, ParameterError> {
        let items = match value {
            Value::None => Vec::new(),
            Value::List(items) => items,
            other => vec![other],
        };
        let items = items
            .into_iter()
            .map(|item| self.coerce_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        self.check_count(items.len())?;
        Ok(Value::List(items))
    }

    /// Coerce a dict key
    pub fn coerce_key(&self, key: DictKey) -> Result<DictKey, ParameterError> {
        match (self.spec.key_type, key) {
            (Some(ItemType::Str), DictKey::Int(i)) => Ok(DictKey::Str(i.to_string())),
            (Some(ItemType::Int), DictKey::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(DictKey::Int)
                .map_err(|_| self.invalid(format!("dict key is not an integer: {s:?}"))),
            (_, key) => Ok(key),
        }
    }

    fn to_dict(&self, value: Value) -> Result<Value, ParameterError> {
        let entries = match value {
            Value::None => IndexMap::new(),
            Value::Dict(entries) => entries,
            other => {
                return Err(self.invalid(format!("expected a dict, got {}", other.type_name())));
            }
        };
        let mut out = IndexMap::with_capacity(entries.len());
        for (k, v) in entries {
            out.insert(self.coerce_key(k)?, self.coerce_item(v)?);
        }
        self.check_count(out.len())?;
        Ok(Value::Dict(out))
    }
}

/// Normalize a directory path: forward slashes, no file component, no
/// trailing slash.
pub fn normalize_dir(path: &str) -> String {
    let mut path = path.replace('\\', "/");
    if let Some(pos) = path.rfind('/') {
        if path[pos + 1..].matches('.').count() == 1 {
            path.truncate(pos);
        }
    } else if path.matches('.').count() == 1 {
        path.clear();
    }
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn coerce(ty: ParamType, spec: &ParamSpec, value: impl Into<Value>) -> Result<Value, ParameterError> {
        Coercer::new("p", ty, spec).coerce(value.into())
    }

    #[test]
    fn test_numeric_coercion() {
        let spec = ParamSpec::new().with_min(0.0).with_max(10.0);
        assert_eq!(coerce(ParamType::Int, &spec, 3.7).unwrap(), Value::Int(3));
        assert_eq!(coerce(ParamType::Int, &spec, "12").unwrap(), Value::Int(10));
        assert_eq!(coerce(ParamType::Float, &spec, -2).unwrap(), Value::Float(0.0));
        assert!(coerce(ParamType::Int, &spec, "abc").is_err());
        assert!(coerce(ParamType::Float, &ParamSpec::new(), Value::None).is_err());
    }

    struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

    impl<S: tracing::Subscriber> Layer<S> for LevelRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[test]
    fn test_clamps_warn() {
        let levels = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(LevelRecorder(Arc::clone(&levels)));
        let spec = ParamSpec::new().with_min(0.0).with_max(10.0);
        let enum_spec = ParamSpec::new().with_items(&["a", "b"]);
        tracing::subscriber::with_default(subscriber, || {
            coerce(ParamType::Int, &spec, 11).unwrap();
            coerce(ParamType::Int, &spec, -1).unwrap();
            coerce(ParamType::Float, &spec, 10.5).unwrap();
            coerce(ParamType::Float, &spec, -0.5).unwrap();
            coerce(ParamType::Enum, &enum_spec, 5).unwrap();
            coerce(ParamType::Int, &spec, 5).unwrap();
        });
        assert_eq!(*levels.lock().unwrap(), vec![Level::WARN; 5]);
    }

    #[test]
    fn test_bool_coercion() {
        let spec = ParamSpec::new();
        assert_eq!(coerce(ParamType::Bool, &spec, 2).unwrap(), Value::Bool(true));
        assert_eq!(coerce(ParamType::Bool, &spec, "False").unwrap(), Value::Bool(false));
        assert!(coerce(ParamType::Bool, &spec, "maybe").is_err());
    }

    #[test]
    fn test_vector_and_rgb() {
        let spec = ParamSpec::new();
        assert_eq!(
            coerce(ParamType::Vector3, &spec, 2.0).unwrap(),
            Value::from(vec![2.0, 0.0, 0.0])
        );
        assert_eq!(
            coerce(ParamType::Vector2, &spec, vec![1.0, 2.0, 3.0]).unwrap(),
            Value::from(vec![1.0, 2.0])
        );
        assert_eq!(
            coerce(ParamType::Vector2, &ParamSpec::new().as_int(), vec![1.5]).unwrap(),
            Value::from(vec![1, 0])
        );
        assert_eq!(
            coerce(ParamType::Rgb, &spec, vec![300, -5, 20]).unwrap(),
            Value::from(vec![255, 0, 20])
        );
    }

    #[test]
    fn test_enum_coercion() {
        let spec = ParamSpec::new().with_items(&["a", "b", "c"]);
        assert_eq!(coerce(ParamType::Enum, &spec, "b").unwrap(), Value::Int(1));
        assert_eq!(coerce(ParamType::Enum, &spec, 5).unwrap(), Value::Int(2));
        assert_eq!(coerce(ParamType::Enum, &spec, -1).unwrap(), Value::Int(0));
        assert!(matches!(
            coerce(ParamType::Enum, &spec, "d"),
            Err(ParameterError::InvalidEnumItem { .. })
        ));
        let empty = ParamSpec::new().with_items(&[]);
        assert!(Coercer::new("p", ParamType::Enum, &empty).validate_spec().is_err());
    }

    #[test]
    fn test_dir_normalization() {
        assert_eq!(normalize_dir("\\a\\b\\c\\"), "/a/b/c");
        assert_eq!(normalize_dir("\\a\\b\\c/d.txt"), "/a/b/c");
        assert_eq!(normalize_dir("\\a.b.c\\d"), "/a.b.c/d");
        assert_eq!(normalize_dir("/"), "/");
    }

    #[test]
    fn test_file_validation() {
        let spec = ParamSpec::new().with_ext(&["json", ".agraph"]);
        assert_eq!(
            coerce(ParamType::File, &spec, "c:\\data\\a.agraph").unwrap(),
            Value::from("c:/data/a.agraph")
        );
        assert!(coerce(ParamType::File, &spec, "c:/data/a.txt").is_err());
        assert!(coerce(ParamType::File, &ParamSpec::new(), "c:/data/folder").is_err());
        assert_eq!(coerce(ParamType::File, &spec, "").unwrap(), Value::from(""));
    }

    #[test]
    fn test_list_coercion() {
        let spec = ParamSpec::new().with_item_type(ItemType::Int).with_count(Some(1), Some(3));
        assert_eq!(coerce(ParamType::List, &spec, 4).unwrap(), Value::from(vec![4]));
        assert_eq!(
            coerce(ParamType::List, &spec, vec!["1", "2"]).unwrap(),
            Value::from(vec![1, 2])
        );
        assert!(matches!(
            coerce(ParamType::List, &spec, Value::List(Vec::new())),
            Err(ParameterError::Cardinality { .. })
        ));
        assert!(coerce(ParamType::List, &spec, vec![1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_dict_coercion() {
        let spec = ParamSpec::new().with_key_type(ItemType::Int).with_item_type(ItemType::Str);
        let mut entries = IndexMap::new();
        entries.insert(DictKey::from("1"), Value::Int(5));
        let dict = coerce(ParamType::Dict, &spec, Value::Dict(entries)).unwrap();
        let Value::Dict(dict) = dict else { panic!("expected dict") };
        assert_eq!(dict.get(&DictKey::Int(1)), Some(&Value::from("5")));
        assert!(coerce(ParamType::Dict, &spec, vec![1]).is_err());

        let bool_keys = ParamSpec::new().with_key_type(ItemType::Bool);
        assert!(Coercer::new("p", ParamType::Dict, &bool_keys).validate_spec().is_err());
    }
}
