// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scripts and connections between parameters.
//!
//! A connection is a script consisting of a single canonical reference.
//! Every resolved reference registers the driven parameter in the
//! document's dependents index, which is what renames, deletes and
//! upstream walks use.

use crate::document::Document;
use crate::error::{ConnectionError, ParameterError, Result, ScriptError};
use crate::id::{ObjectId, ParamId};
use crate::param::{ParamType, PARAM_EXECUTION, PARAM_MESSAGE};
use crate::script::{is_execution_chain, parse_program, read_env, Interpreter, Script};
use crate::value::Value;
use indexmap::IndexSet;
use tracing::{debug, warn};

/// Maximum nesting of script evaluations through references
pub const MAX_SCRIPT_DEPTH: usize = 64;

impl Document {
    /// Evaluate `script` as if it were installed on `driven`
    pub(crate) fn eval_script(
        &self,
        driven: ParamId,
        script: &Script,
        depth: usize,
    ) -> std::result::Result<Value, ScriptError> {
        if depth > MAX_SCRIPT_DEPTH {
            return Err(ScriptError::Recursion(self.param_path(driven)));
        }
        let program = parse_program(script.code())?;
        let resolve = |token: &str| -> std::result::Result<Value, ScriptError> {
            if let Some(name) = token.strip_prefix('$') {
                return Ok(Value::Str(read_env(name)));
            }
            let source = script
                .refs()
                .iter()
                .find(|r| r.token == token)
                .and_then(|r| r.param)
                .or_else(|| self.lookup_token(driven, token))
                .ok_or_else(|| ScriptError::Unresolved {
                    param: self.param_path(driven),
                    token: token.to_string(),
                })?;
            self.reference_value(source, depth + 1)
        };
        Interpreter::new(&resolve).run(&program)
    }

    /// Script text with references replaced by their current values
    pub(crate) fn substitute_script(&self, driven: ParamId, script: &Script, depth: usize) -> String {
        script.substitute(|r| {
            let source = r.param.or_else(|| self.lookup_token(driven, &r.token))?;
            self.reference_value(source, depth + 1).ok().map(|v| v.to_string())
        })
    }

    fn resolve_refs(&self, driven: ParamId, script: &mut Script) {
        for r in script.refs_mut() {
            if r.param.is_none() {
                r.param = self.lookup_token(driven, &r.token);
            }
        }
    }

    fn canonicalize(&self, driven: ParamId, script: &mut Script) {
        let renames: Vec<(String, String)> = script
            .refs()
            .iter()
            .filter_map(|r| {
                let canonical = self.canonical_token(driven, r.param?)?;
                (canonical != r.token).then(|| (r.token.clone(), canonical))
            })
            .collect();
        for (old, new) in renames {
            script.replace_token(&old, &new);
        }
    }

    pub(crate) fn unregister_inputs(&mut self, driven: ParamId, script: Option<&Script>) {
        let Some(script) = script else {
            return;
        };
        for source in script.input_params() {
            if let Some(set) = self.dependents.get_mut(&source) {
                set.shift_remove(&driven);
                if set.is_empty() {
                    self.dependents.remove(&source);
                }
            }
        }
    }

    fn register_inputs(&mut self, driven: ParamId, script: &Script) {
        for source in script.input_params() {
            self.dependents.entry(source).or_default().insert(driven);
        }
    }

    /// Replace the script of `driven`, keeping the dependents index in sync
    fn install_script(&mut self, driven: ParamId, script: Script) -> Result<()> {
        let old = self.param_mut(driven)?.script.take();
        self.unregister_inputs(driven, old.as_ref());
        self.register_inputs(driven, &script);
        let param = self.param_mut(driven)?;
        param.script = Some(script);
        param.script_enabled = true;
        Ok(())
    }

    /// Install a script without checks or evaluation; unresolved references
    /// stay pending
    pub(crate) fn attach_script(&mut self, id: ParamId, code: &str, enabled: bool) -> Result<()> {
        let mut script = Script::parse(code);
        self.resolve_refs(id, &mut script);
        self.canonicalize(id, &mut script);
        self.install_script(id, script)?;
        self.param_mut(id)?.script_enabled = enabled;
        Ok(())
    }

    fn check_scriptable(&self, id: ParamId) -> Result<()> {
        let param = self.param(id)?;
        if param.ty == ParamType::Callback {
            return Err(ConnectionError::Callback(self.param_path(id)).into());
        }
        if param.name == PARAM_MESSAGE && !param.is_dynamic() {
            return Err(ParameterError::Unsupported(format!(
                "Parameter \"message\" can't be scripted: {}",
                self.param_path(id)
            ))
            .into());
        }
        self.check_param_editable(id)
    }

    /// Attach an expression to a parameter.
    ///
    /// Unless `quiet`, every reference must resolve and the expression must
    /// evaluate; quiet scripts resolve lazily. An empty `code` clears the
    /// script.
    pub fn set_script(&mut self, id: ParamId, code: &str, quiet: bool) -> Result<()> {
        self.check_scriptable(id)?;
        if code.trim().is_empty() {
            return self.clear_script(id, false);
        }
        let param = self.param(id)?;
        if param.name == PARAM_EXECUTION && !param.is_dynamic() && !is_execution_chain(code) {
            return Err(ConnectionError::ExecutionChain(self.param_path(id)).into());
        }

        let mut script = Script::parse(code);
        self.resolve_refs(id, &mut script);
        if !quiet {
            if let Some(r) = script.refs().iter().find(|r| r.param.is_none()) {
                return Err(ScriptError::Unresolved {
                    param: self.param_path(id),
                    token: r.token.clone(),
                }
                .into());
            }
            if let Err(err) = self.eval_script(id, &script, 0) {
                if !param.ty.is_str() {
                    return Err(err.into());
                }
            }
        }
        self.canonicalize(id, &mut script);
        self.install_script(id, script)?;
        debug!(param = %self.param_path(id), code, "Script set");
        Ok(())
    }

    /// Remove the script of a parameter, optionally keeping its last value
    pub fn clear_script(&mut self, id: ParamId, bake: bool) -> Result<()> {
        if self.param(id)?.script.is_none() {
            return Ok(());
        }
        self.check_param_editable(id)?;
        let baked = if bake {
            match self.value(id) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(param = %self.param_path(id), %err, "Can't bake script value");
                    None
                }
            }
        } else {
            None
        };
        let param = self.param_mut(id)?;
        let old = param.script.take();
        param.script_enabled = false;
        if let Some(value) = baked.filter(|_| param.ty != ParamType::Message) {
            param.store(value);
        }
        self.unregister_inputs(id, old.as_ref());
        Ok(())
    }

    /// Enable or disable the script of a parameter
    pub fn set_script_enabled(&mut self, id: ParamId, enabled: bool) -> Result<()> {
        self.check_param_editable(id)?;
        let param = self.param_mut(id)?;
        param.script_enabled = enabled && param.script.is_some();
        Ok(())
    }

    /// Resolve pending references of quiet scripts on every parameter
    pub fn resolve_scripts(&mut self) {
        let mut pending: Vec<ParamId> = self
            .params
            .values()
            .filter(|p| p.script.as_ref().is_some_and(|s| !s.is_complete()))
            .map(|p| p.id)
            .collect();
        pending.sort();
        for id in pending {
            let Some(mut script) = self.params.get(&id).and_then(|p| p.script.clone()) else {
                continue;
            };
            self.resolve_refs(id, &mut script);
            self.canonicalize(id, &mut script);
            let enabled = self.params.get(&id).is_some_and(|p| p.script_enabled);
            if self.install_script(id, script).is_ok() {
                if let Some(param) = self.params.get_mut(&id) {
                    param.script_enabled = enabled;
                }
            }
        }
    }

    /// Whether any enabled script references this parameter
    pub fn has_output(&self, id: ParamId) -> bool {
        self.dependents(id)
            .into_iter()
            .any(|d| self.params.get(&d).is_some_and(|p| p.active_script().is_some()))
    }

    /// Whether `source` values can flow into `target`
    pub fn is_compatible(&self, source: ParamId, target: ParamId) -> bool {
        let (Ok(source), Ok(target)) = (self.param(source), self.param(target)) else {
            return false;
        };
        let probe = match source.ty {
            ParamType::Message => Value::None,
            ty => ty.internal_default(source.spec.as_int),
        };
        target.coercer().coerce(probe).is_ok()
    }

    /// Sibling objects feeding `object` through enabled scripts
    pub fn input_objects(&self, object: ObjectId) -> Vec<ObjectId> {
        let Ok(obj) = self.object(object) else {
            return Vec::new();
        };
        let mut out: IndexSet<ObjectId> = IndexSet::new();
        for param in obj.params.iter().filter_map(|p| self.params.get(p)) {
            let Some(script) = param.active_script() else {
                continue;
            };
            for source in script.input_params() {
                let Some(owner) = self.params.get(&source).map(|p| p.owner) else {
                    continue;
                };
                if owner != object && Some(owner) != obj.parent && self.parent(owner) == obj.parent {
                    out.insert(owner);
                }
            }
        }
        out.into_iter().collect()
    }

    /// Sibling objects fed by `object` through enabled scripts
    pub fn output_objects(&self, object: ObjectId) -> Vec<ObjectId> {
        let Ok(obj) = self.object(object) else {
            return Vec::new();
        };
        let mut out: IndexSet<ObjectId> = IndexSet::new();
        for param in &obj.params {
            for dep in self.dependents(*param) {
                let Some(driven) = self.params.get(&dep).filter(|p| p.active_script().is_some()) else {
                    continue;
                };
                let owner = driven.owner;
                if owner != object && Some(owner) != obj.parent && self.parent(owner) == obj.parent {
                    out.insert(owner);
                }
            }
        }
        out.into_iter().collect()
    }

    /// Every object `object` transitively depends on within its graph
    pub fn upstream_objects(&self, object: ObjectId) -> IndexSet<ObjectId> {
        let mut seen = IndexSet::new();
        let mut stack = vec![object];
        while let Some(current) = stack.pop() {
            for input in self.input_objects(current) {
                if seen.insert(input) {
                    stack.push(input);
                }
            }
        }
        seen
    }

    /// Drive `target` from `source` with a single canonical reference
    pub fn connect(&mut self, source: ParamId, target: ParamId, force: bool) -> Result<()> {
        let source_path = self.param_path(source);
        let target_path = self.param_path(target);
        let src = self.param(source)?;
        let dst = self.param(target)?;

        if src.ty == ParamType::Callback {
            return Err(ConnectionError::Callback(source_path).into());
        }
        self.check_scriptable(target)?;

        let src_is_exec = src.name == PARAM_EXECUTION && !src.is_dynamic();
        let dst_is_exec = dst.name == PARAM_EXECUTION && !dst.is_dynamic();
        if src_is_exec != dst_is_exec {
            return Err(ConnectionError::ExecutionChain(target_path).into());
        }
        if !self.is_compatible(source, target) {
            return Err(ConnectionError::Incompatible { source_param: source_path, target: target_path }.into());
        }
        if dst.has_input() && !force {
            return Err(ConnectionError::AlreadyConnected(target_path).into());
        }

        let src_owner = src.owner;
        let dst_owner = dst.owner;
        let dst_is_graph = self.object(dst_owner)?.is_graph();
        if dst.is_output() && !dst_is_graph {
            return Err(ConnectionError::OutputTarget(target_path).into());
        }

        let scope = self.scope_of(target);
        let from_scope = scope.is_some() && Some(src_owner) == scope;
        let into_graph_output = dst.is_output() && dst_is_graph && Some(dst_owner) == scope;
        let sibling = scope.is_some() && self.parent(src_owner) == scope;
        if src_owner != dst_owner && !from_scope && !sibling {
            return Err(ConnectionError::CrossGraph { source_param: source_path, target: target_path }.into());
        }
        if into_graph_output && sibling && !src.is_output() {
            return Err(ConnectionError::CrossGraph { source_param: source_path, target: target_path }.into());
        }
        if src_owner != dst_owner
            && !from_scope
            && !into_graph_output
            && self.upstream_objects(src_owner).contains(&dst_owner)
        {
            return Err(ConnectionError::Cycle { source_param: source_path, target: target_path }.into());
        }

        let token = self
            .canonical_token(target, source)
            .ok_or_else(|| ParameterError::NotFound(source_path.clone()))?;
        let mut script = Script::parse(&format!("{{{token}}}"));
        for r in script.refs_mut() {
            r.param = Some(source);
        }
        self.install_script(target, script)?;
        debug!(source = %source_path, target = %target_path, "Connected");
        Ok(())
    }

    /// Remove the input connection of `target`
    pub fn disconnect(&mut self, target: ParamId) -> Result<()> {
        self.clear_script(target, false)
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::NullAction;
    use crate::document::Document;
    use crate::error::{ConnectionError, EngineError, ScriptError};
    use crate::id::ObjectId;
    use crate::param::{ParamSpec, ParamType};
    use crate::value::Value;
    use std::rc::Rc;

    fn setup() -> (Document, ObjectId, ObjectId, ObjectId) {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let a = doc.create_action(Rc::new(NullAction), "a", Some(root)).unwrap();
        let b = doc.create_action(Rc::new(NullAction), "b", Some(root)).unwrap();
        for obj in [a, b] {
            doc.add_dynamic_param(obj, "x", ParamType::Int, ParamSpec::new()).unwrap();
            doc.add_dynamic_param(obj, "out", ParamType::Int, ParamSpec::new().output()).unwrap();
            doc.add_dynamic_param(obj, "label", ParamType::Str, ParamSpec::new()).unwrap();
        }
        (doc, root, a, b)
    }

    fn p(doc: &Document, obj: ObjectId, name: &str) -> crate::id::ParamId {
        doc.find_param(obj, name).unwrap()
    }

    #[test]
    fn test_script_evaluation_and_clear() {
        let (mut doc, _, a, b) = setup();
        doc.set_value(p(&doc, a, "x"), 4).unwrap();
        doc.set_value(p(&doc, b, "x"), 1).unwrap();
        let bx = p(&doc, b, "x");
        doc.set_script(bx, "{a.x} * 2 + {__this__.out}", false).unwrap();
        assert_eq!(doc.value(bx).unwrap(), Value::Int(8));
        assert_eq!(doc.value(bx).unwrap(), Value::Int(8));
        assert!(doc.param(bx).unwrap().has_input());
        assert!(doc.has_output(p(&doc, a, "x")));

        doc.clear_script(bx, false).unwrap();
        assert_eq!(doc.value(bx).unwrap(), Value::Int(1));
        assert!(!doc.has_output(p(&doc, a, "x")));

        doc.set_script(bx, "{a.x} + 1", false).unwrap();
        doc.clear_script(bx, true).unwrap();
        assert_eq!(doc.value(bx).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_unresolved_reference() {
        let (mut doc, _, _, b) = setup();
        let bx = p(&doc, b, "x");
        let err = doc.set_script(bx, "{missing.x}", false).unwrap_err();
        assert!(matches!(err, EngineError::Script(ScriptError::Unresolved { .. })));
        assert!(doc.param(bx).unwrap().script().is_none());

        doc.set_script(bx, "{later.x}", true).unwrap();
        assert!(matches!(doc.value(bx), Err(EngineError::Script(ScriptError::Unresolved { .. }))));
    }

    #[test]
    fn test_string_fallback() {
        let (mut doc, _, a, b) = setup();
        doc.set_value(p(&doc, a, "x"), 3).unwrap();
        let label = p(&doc, b, "label");
        doc.set_script(label, "take {a.x} items", false).unwrap();
        assert_eq!(doc.value(label).unwrap(), Value::from("take 3 items"));
    }

    #[test]
    fn test_connect_then_disconnect_restores() {
        let (mut doc, _, a, b) = setup();
        let (ax, bx) = (p(&doc, a, "x"), p(&doc, b, "x"));
        doc.set_value(ax, 5).unwrap();
        doc.set_value(bx, 2).unwrap();
        doc.connect(ax, bx, false).unwrap();
        assert_eq!(doc.param(bx).unwrap().script().unwrap().code(), "{a.x}");
        assert!(doc.param(bx).unwrap().has_direct_input());
        assert_eq!(doc.value(bx).unwrap(), Value::Int(5));
        doc.disconnect(bx).unwrap();
        assert_eq!(doc.value(bx).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_connect_failures() {
        let (mut doc, _, a, b) = setup();
        let (ax, bx) = (p(&doc, a, "x"), p(&doc, b, "x"));
        doc.connect(ax, bx, false).unwrap();
        assert!(matches!(
            doc.connect(p(&doc, a, "out"), bx, false),
            Err(EngineError::Connection(ConnectionError::AlreadyConnected(_)))
        ));
        doc.connect(p(&doc, a, "out"), bx, true).unwrap();

        assert!(matches!(
            doc.connect(p(&doc, b, "x"), p(&doc, a, "x"), false),
            Err(EngineError::Connection(ConnectionError::Cycle { .. }))
        ));
        assert!(matches!(
            doc.connect(ax, p(&doc, b, "out"), false),
            Err(EngineError::Connection(ConnectionError::OutputTarget(_)))
        ));
        let list = doc
            .add_dynamic_param(b, "items", ParamType::Dict, ParamSpec::new())
            .unwrap();
        assert!(matches!(
            doc.connect(ax, list, false),
            Err(EngineError::Connection(ConnectionError::Incompatible { .. }))
        ));

        let other = doc.create_graph("other", None).unwrap();
        let c = doc.create_action(Rc::new(NullAction), "c", Some(other)).unwrap();
        assert!(matches!(
            doc.connect(ax, p(&doc, c, "enabled"), false),
            Err(EngineError::Connection(ConnectionError::CrossGraph { .. }))
        ));
        assert!(matches!(
            doc.connect(p(&doc, a, "enabled"), p(&doc, b, "execution"), false),
            Err(EngineError::Connection(ConnectionError::ExecutionChain(_)))
        ));
        assert!(doc.set_script(p(&doc, b, "message"), "{a}", false).is_err());
    }

    #[test]
    fn test_self_and_graph_connections() {
        let (mut doc, root, a, _) = setup();
        doc.connect(p(&doc, a, "out"), p(&doc, a, "x"), false).unwrap();
        assert_eq!(doc.param(p(&doc, a, "x")).unwrap().script().unwrap().code(), "{__this__.out}");

        let gin = doc.add_dynamic_param(root, "speed", ParamType::Int, ParamSpec::new()).unwrap();
        let gout = doc
            .add_dynamic_param(root, "result", ParamType::Int, ParamSpec::new().output())
            .unwrap();
        doc.set_value(gin, 9).unwrap();
        doc.connect(gin, p(&doc, a, "label"), false).unwrap();
        assert_eq!(doc.value(p(&doc, a, "label")).unwrap(), Value::from("9"));
        doc.connect(p(&doc, a, "out"), gout, false).unwrap();
        assert_eq!(doc.param(gout).unwrap().script().unwrap().code(), "{a.out}");
    }

    #[test]
    fn test_rename_keeps_scripts_valid() {
        let (mut doc, _, a, b) = setup();
        let bx = p(&doc, b, "x");
        doc.set_value(p(&doc, a, "x"), 2).unwrap();
        doc.set_script(bx, "{a.x} + {a.out}", false).unwrap();
        let before = doc.value(bx).unwrap();
        doc.rename_object(a, "source").unwrap();
        let x = p(&doc, a, "x");
        doc.rename_param(x, "amount").unwrap();
        assert_eq!(doc.param(bx).unwrap().script().unwrap().code(), "{source.amount} + {source.out}");
        assert_eq!(doc.value(bx).unwrap(), before);
    }

    #[test]
    fn test_deleted_source_invalidates_reference() {
        let (mut doc, _, a, b) = setup();
        let bx = p(&doc, b, "x");
        doc.connect(p(&doc, a, "x"), bx, false).unwrap();
        doc.remove_dynamic_param(p(&doc, a, "x"), true).unwrap();
        assert!(!doc.param(bx).unwrap().script().unwrap().is_complete());
        assert!(doc.value(bx).is_err());
    }

    #[test]
    fn test_env_reference() {
        let (mut doc, _, _, b) = setup();
        let label = p(&doc, b, "label");
        std::env::set_var("ACTIONGRAPH_TEST_ENV_REF", "abc");
        doc.set_script(label, "{$ACTIONGRAPH_TEST_ENV_REF} + '!'", false).unwrap();
        assert_eq!(doc.value(label).unwrap(), Value::from("abc!"));
        doc.set_script(label, "{$ACTIONGRAPH_TEST_ENV_MISSING}", false).unwrap();
        assert_eq!(doc.value(label).unwrap(), Value::from(""));
    }
}
