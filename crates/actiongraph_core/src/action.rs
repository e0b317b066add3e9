// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action prototypes and per-object parameter management.
//!
//! An [`ActionKind`] is the library prototype of a leaf action: it declares
//! static parameters and implements the behavior run during execution. The
//! kind itself is stateless; all state lives in the document and is reached
//! through an [`ActionContext`].

use crate::document::Document;
use crate::error::{ActionError, ConnectionError, ParameterError, Result};
use crate::id::{ObjectId, ParamId};
use crate::object::{ObjectKind, EXEC_MAIN};
use crate::param::{
    ParamSpec, ParamType, GROUP_OUTPUT, PARAM_BREAK_POINT, PARAM_ENABLED, PARAM_EXECUTION, PARAM_MESSAGE,
};
use crate::value::Value;
use indexmap::IndexSet;
use std::fmt::Write as _;
use std::rc::Rc;
use tracing::{debug, info};

/// Declaration of a static parameter
#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// Parameter name
    pub name: String,
    /// Type tag
    pub ty: ParamType,
    /// Creation attributes
    pub spec: ParamSpec,
}

impl ParamDecl {
    /// Declare a parameter
    pub fn new(name: impl Into<String>, ty: ParamType, spec: ParamSpec) -> Self {
        Self { name: name.into(), ty, spec }
    }
}

/// Parameters every action and graph carries, in order
pub(crate) fn builtin_params() -> Vec<ParamDecl> {
    vec![
        ParamDecl::new(
            PARAM_EXECUTION,
            ParamType::Message,
            ParamSpec::new().with_doc("Run after the connected object"),
        ),
        ParamDecl::new(
            PARAM_ENABLED,
            ParamType::Bool,
            ParamSpec::new().with_default(true).with_priority(-1),
        ),
        ParamDecl::new(
            PARAM_BREAK_POINT,
            ParamType::Bool,
            ParamSpec::new().with_default(false).with_priority(-1).hidden(),
        ),
        ParamDecl::new(
            PARAM_MESSAGE,
            ParamType::Message,
            ParamSpec::new().output().read_only().with_priority(-1),
        ),
    ]
}

/// Library prototype of a leaf action
pub trait ActionKind {
    /// Library source id, `team:Name`
    fn source(&self) -> &str;

    /// Short type name
    fn name(&self) -> &str {
        let source = self.source();
        source.rsplit(':').next().unwrap_or(source)
    }

    /// Description
    fn doc(&self) -> &str {
        ""
    }

    /// Search tags
    fn tags(&self) -> &[&str] {
        &[]
    }

    /// Host application this action requires
    fn app(&self) -> Option<&str> {
        None
    }

    /// Display color
    fn ui_color(&self) -> Option<[u8; 3]> {
        None
    }

    /// Static parameters declared after the builtin ones
    fn params(&self) -> Vec<ParamDecl> {
        Vec::new()
    }

    /// Exec names supported besides `main`
    fn exec_names(&self) -> &[&str] {
        &[]
    }

    /// Run the action for `cx.exec_name()`
    fn run(&self, cx: &mut ActionContext<'_>) -> Result<()>;

    /// Run a named method bound to a callback parameter
    fn call_method(&self, method: &str, cx: &mut ActionContext<'_>) -> Result<()> {
        Err(ParameterError::NotFound(format!(
            "{} has no method {method}",
            cx.doc().long_name(cx.object())
        ))
        .into())
    }

    /// Called before every pass of the owning graph. Flow-control actions
    /// force-disable the branches they will not take.
    fn disable_unselected(&self, _cx: &mut ActionContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Access to the document from inside an action
pub struct ActionContext<'a> {
    doc: &'a mut Document,
    object: ObjectId,
    exec_name: &'a str,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(doc: &'a mut Document, object: ObjectId, exec_name: &'a str) -> Self {
        Self { doc, object, exec_name }
    }

    /// The object being run
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Exec name of the current run
    pub fn exec_name(&self) -> &str {
        self.exec_name
    }

    /// The document
    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    /// The document, mutably
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    /// Parameter of the current object
    pub fn param(&self, name: &str) -> Result<ParamId> {
        self.doc.find_param(self.object, name)
    }

    /// Effective value of a parameter of the current object
    pub fn value(&self, name: &str) -> Result<Value> {
        self.doc.value(self.param(name)?)
    }

    /// Write a parameter of the current object, bypassing editability
    pub fn set_output(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let id = self.param(name)?;
        self.doc.write_output(id, value.into())
    }

    /// Dynamic inputs or outputs of the current object
    pub fn dynamic_params(&self, output: bool) -> Vec<ParamId> {
        let filter = ParamFilter {
            input: !output,
            output,
            static_params: false,
            ..ParamFilter::default()
        };
        self.doc.get_params(self.object, &filter).unwrap_or_default()
    }
}

/// Selection of parameters returned by [`Document::get_params`]
#[derive(Debug, Clone)]
pub struct ParamFilter {
    /// Include inputs
    pub input: bool,
    /// Include outputs
    pub output: bool,
    /// Include static parameters
    pub static_params: bool,
    /// Include dynamic parameters
    pub dynamic: bool,
    /// Only this group
    pub group: Option<String>,
    /// Sort by group (outputs last), then priority
    pub sort: bool,
}

impl Default for ParamFilter {
    fn default() -> Self {
        Self {
            input: true,
            output: true,
            static_params: true,
            dynamic: true,
            group: None,
            sort: false,
        }
    }
}

impl Document {
    /// Instantiate a leaf action, optionally adding it to `graph`
    pub fn create_action(
        &mut self,
        kind: Rc<dyn ActionKind>,
        name: &str,
        graph: Option<ObjectId>,
    ) -> Result<ObjectId> {
        if let Some(graph) = graph {
            self.check_structural(graph)?;
        }
        let id = self.new_object(name, ObjectKind::Action(kind))?;
        if let Some(graph) = graph {
            if let Err(err) = self.add_object(graph, id) {
                self.delete_object(id);
                return Err(err);
            }
        }
        debug!(action = %self.long_name(id), "Created action");
        Ok(id)
    }

    /// Parameters of `object` matching `filter`
    pub fn get_params(&self, object: ObjectId, filter: &ParamFilter) -> Result<Vec<ParamId>> {
        let obj = self.object(object)?;
        let mut params: Vec<&crate::param::Parameter> = obj
            .params
            .iter()
            .filter_map(|id| self.params.get(id))
            .filter(|p| if p.is_output() { filter.output } else { filter.input })
            .filter(|p| if p.is_dynamic() { filter.dynamic } else { filter.static_params })
            .filter(|p| filter.group.as_deref().map_or(true, |g| p.group() == g))
            .collect();

        if filter.sort {
            let mut groups: Vec<&str> = Vec::new();
            for p in &params {
                let group = p.group();
                if group != GROUP_OUTPUT && !groups.contains(&group) {
                    groups.push(group);
                }
            }
            groups.push(GROUP_OUTPUT);
            params.sort_by_key(|p| {
                let rank = groups.iter().position(|g| *g == p.group()).unwrap_or(groups.len());
                (rank, -p.spec.priority)
            });
        }
        Ok(params.into_iter().map(|p| p.id).collect())
    }

    /// Add a parameter created at runtime
    pub fn add_dynamic_param(
        &mut self,
        object: ObjectId,
        name: &str,
        ty: ParamType,
        spec: ParamSpec,
    ) -> Result<ParamId> {
        let obj = self.object(object)?;
        if ty == ParamType::Iter && !obj.is_graph() {
            return Err(ParameterError::Unsupported(format!(
                "Iterator parameters are only allowed on graphs: {}",
                self.long_name(object)
            ))
            .into());
        }
        if self.is_inside_referenced(object) {
            return Err(ActionError::Referenced(self.long_name(object)).into());
        }
        self.add_param(object, name, ty, spec.dynamic())
    }

    /// Remove a dynamic parameter; `force` is required when it drives others
    pub fn remove_dynamic_param(&mut self, id: ParamId, force: bool) -> Result<()> {
        let param = self.param(id)?;
        if !param.is_dynamic() {
            return Err(ParameterError::NotDynamic(self.param_path(id)).into());
        }
        if self.is_inside_referenced(param.owner) {
            return Err(ActionError::Referenced(self.param_path(id)).into());
        }
        if !force && self.has_output(id) {
            return Err(ConnectionError::HasOutputs(self.param_path(id)).into());
        }
        self.drop_param(id);
        Ok(())
    }

    /// Remove every dynamic parameter of an object
    pub fn clear_dynamic_params(&mut self, object: ObjectId, force: bool) -> Result<()> {
        let filter = ParamFilter { static_params: false, ..ParamFilter::default() };
        let params = self.get_params(object, &filter)?;
        if !force {
            if let Some(id) = params.iter().copied().find(|p| self.has_output(*p)) {
                return Err(ConnectionError::HasOutputs(self.param_path(id)).into());
            }
        }
        for id in params {
            self.remove_dynamic_param(id, true)?;
        }
        Ok(())
    }

    /// Objects connected to `object` within its graph.
    ///
    /// `param` restricts the search to connections of one parameter of
    /// `object`; `recursive` follows connections transitively.
    pub fn get_connected_objects(
        &self,
        object: ObjectId,
        input: bool,
        output: bool,
        param: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<ObjectId>> {
        let obj = self.object(object)?;
        let parent = obj.parent;
        let sibling = |o: ObjectId| o != object && Some(o) != parent && self.parent(o) == parent;

        let mut found: IndexSet<ObjectId> = IndexSet::new();
        if let Some(name) = param {
            let id = self.find_param(object, name)?;
            let p = self.param(id)?;
            if input {
                for source in p.active_script().into_iter().flat_map(|s| s.input_params()) {
                    if let Some(owner) = self.params.get(&source).map(|s| s.owner).filter(|o| sibling(*o)) {
                        found.insert(owner);
                    }
                }
            }
            if output {
                for dep in self.dependents(id) {
                    if let Some(owner) = self.params.get(&dep).map(|d| d.owner).filter(|o| sibling(*o)) {
                        found.insert(owner);
                    }
                }
            }
        } else {
            if input {
                found.extend(self.input_objects(object));
            }
            if output {
                found.extend(self.output_objects(object));
            }
        }

        if recursive {
            let mut stack: Vec<ObjectId> = found.iter().copied().collect();
            while let Some(current) = stack.pop() {
                let mut next = Vec::new();
                if input {
                    next.extend(self.input_objects(current));
                }
                if output {
                    next.extend(self.output_objects(current));
                }
                for o in next {
                    if o != object && found.insert(o) {
                        stack.push(o);
                    }
                }
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Expose a member's parameter on its owning graph and connect the two.
    ///
    /// Inputs are driven by the new graph parameter; outputs drive it.
    pub fn promote(&mut self, param: ParamId, name: Option<&str>, force: bool) -> Result<ParamId> {
        let p = self.param(param)?;
        let owner = p.owner;
        let graph = self
            .parent(owner)
            .ok_or_else(|| ActionError::NoGraph(self.long_name(owner)))?;
        if p.ty == ParamType::Callback || p.ty == ParamType::Message {
            return Err(ParameterError::Unsupported(format!(
                "Can't promote {} parameter {}",
                p.ty,
                self.param_path(param)
            ))
            .into());
        }
        if !p.is_output() && p.has_input() && !force {
            return Err(ConnectionError::AlreadyConnected(self.param_path(param)).into());
        }

        let ty = if p.ty == ParamType::Iter { ParamType::List } else { p.ty };
        let mut spec = p.spec.clone();
        spec.dynamic = true;
        spec.editable = true;
        let output = p.is_output();
        let value = self.value(param)?;
        let name = name.map_or_else(|| p.name.clone(), str::to_string);

        let promoted = self.add_param(graph, &name, ty, spec)?;
        let result = if output {
            self.connect(param, promoted, true)
        } else {
            self.param_mut(promoted)?.store(value);
            self.connect(promoted, param, true)
        };
        if let Err(err) = result {
            self.drop_param(promoted);
            return Err(err);
        }
        debug!(param = %self.param_path(param), promoted = %self.param_path(promoted), "Promoted");
        Ok(promoted)
    }

    /// Graph parameter a member's parameter was promoted to
    pub fn get_promoted_param(&self, param: ParamId) -> Option<ParamId> {
        let p = self.params.get(&param)?;
        let graph = self.parent(p.owner)?;
        if p.is_output() {
            self.dependents(param).into_iter().find(|d| {
                self.params
                    .get(d)
                    .is_some_and(|dp| dp.owner == graph && dp.is_output() && dp.has_direct_input())
            })
        } else {
            let script = p.active_script().filter(|s| s.is_direct())?;
            script
                .input_params()
                .find(|s| self.params.get(s).is_some_and(|sp| sp.owner == graph))
        }
    }

    /// Copy an object (recursively for graphs) into `graph`.
    ///
    /// With `bake_scripts` the copy stores evaluated values instead of
    /// scripts.
    pub fn copy_object(
        &mut self,
        object: ObjectId,
        name: Option<&str>,
        graph: Option<ObjectId>,
        bake_scripts: bool,
    ) -> Result<ObjectId> {
        if let Some(graph) = graph {
            self.check_structural(graph)?;
        }
        let name = name.map_or_else(|| self.object(object).map(|o| o.name.clone()), |n| Ok(n.to_string()))?;
        let mut scripts = Vec::new();
        let copy = self.copy_tree(object, &name, bake_scripts, &mut scripts)?;
        if let Some(graph) = graph {
            if let Err(err) = self.add_object(graph, copy) {
                self.delete_object(copy);
                return Err(err);
            }
        }
        for (id, code, enabled) in scripts {
            self.attach_script(id, &code, enabled)?;
        }
        self.resolve_scripts();
        Ok(copy)
    }

    fn copy_tree(
        &mut self,
        object: ObjectId,
        name: &str,
        bake: bool,
        scripts: &mut Vec<(ParamId, String, bool)>,
    ) -> Result<ObjectId> {
        let src = self.object(object)?;
        let (kind, referenced, children) = match &src.kind {
            ObjectKind::Action(kind) => (ObjectKind::Action(Rc::clone(kind)), false, Vec::new()),
            ObjectKind::Graph(data) => {
                let mut data = data.clone();
                let children = std::mem::take(&mut data.children);
                let referenced = std::mem::replace(&mut data.referenced, false);
                data.app = None;
                (ObjectKind::Graph(data), referenced, children)
            }
        };
        let src_params = src.params.clone();
        let copy = self.new_object(name, kind)?;

        for pid in src_params {
            let p = self.param(pid)?.clone();
            let target = if p.is_dynamic() {
                self.add_param(copy, &p.name, p.ty, p.spec.clone())?
            } else {
                self.find_param(copy, &p.name)?
            };
            let value = if bake && p.active_script().is_some() {
                Some(self.value(pid)?)
            } else {
                p.value.clone()
            };
            let t = self.param_mut(target)?;
            if let Some(value) = value.filter(|_| t.ty != ParamType::Message) {
                t.store(value);
            }
            t.callback = p.callback.clone();
            if !bake {
                if let Some(script) = &p.script {
                    scripts.push((target, script.code().to_string(), p.script_enabled));
                }
            }
        }

        for child in children {
            let child_name = self.object(child)?.name.clone();
            let child_copy = self.copy_tree(child, &child_name, bake, scripts)?;
            self.attach_child(copy, child_copy)?;
        }
        self.refresh_app(copy);
        if let Some(data) = self.object_mut(copy)?.graph_mut() {
            data.referenced = referenced;
        }
        Ok(copy)
    }

    /// Whether two objects have the same source, parameter values and
    /// scripts, recursively for graph members
    pub fn is_equivalent(&self, a: ObjectId, b: ObjectId) -> bool {
        let (Ok(oa), Ok(ob)) = (self.object(a), self.object(b)) else {
            return false;
        };
        if oa.source() != ob.source() || oa.is_graph() != ob.is_graph() || oa.params.len() != ob.params.len() {
            return false;
        }
        let params_match = oa.params.iter().zip(&ob.params).all(|(pa, pb)| {
            let (Some(pa), Some(pb)) = (self.params.get(pa), self.params.get(pb)) else {
                return false;
            };
            pa.name == pb.name
                && pa.ty == pb.ty
                && pa.spec == pb.spec
                && pa.value == pb.value
                && pa.script_enabled == pb.script_enabled
                && pa.script.as_ref().map(|s| s.code()) == pb.script.as_ref().map(|s| s.code())
        });
        if !params_match {
            return false;
        }
        match (oa.graph(), ob.graph()) {
            (Some(ga), Some(gb)) => {
                ga.referenced == gb.referenced
                    && ga.children.len() == gb.children.len()
                    && ga.children.iter().all(|ca| {
                        let name = self.objects.get(ca).map(|o| o.name.as_str()).unwrap_or_default();
                        self.child_by_name(b, name).is_some_and(|cb| self.is_equivalent(*ca, cb))
                    })
            }
            _ => true,
        }
    }

    /// Multi-line description of an object and its parameters, also logged
    pub fn describe(&self, object: ObjectId) -> Result<String> {
        let obj = self.object(object)?;
        let mut out = String::new();
        let kind = if obj.is_graph() { "ActionGraph" } else { "Action" };
        let _ = writeln!(out, "{kind} {}", self.long_name(object));
        let _ = writeln!(out, "  source: {}", obj.source().unwrap_or("-"));
        if let Some(app) = obj.app() {
            let _ = writeln!(out, "  app: {app}");
        }
        if let Some(kind) = obj.action_kind() {
            if !kind.doc().is_empty() {
                let _ = writeln!(out, "  doc: {}", kind.doc());
            }
        }
        let _ = writeln!(out, "  status: {}", self.status(object, EXEC_MAIN));
        if let Some(data) = obj.graph() {
            let _ = writeln!(out, "  referenced: {}", data.referenced);
            let names: Vec<&str> = data
                .children
                .iter()
                .filter_map(|c| self.objects.get(c).map(|o| o.name.as_str()))
                .collect();
            let _ = writeln!(out, "  objects: {}", names.join(", "));
        }
        let filter = ParamFilter { sort: true, ..ParamFilter::default() };
        for id in self.get_params(object, &filter)? {
            let p = self.param(id)?;
            let value = self.value(id).map_or_else(|e| format!("<{e}>"), |v| v.repr());
            let _ = write!(out, "  {} ({}{}) = {value}", p.name, p.ty, if p.is_output() { ", output" } else { "" });
            if let Some(script) = p.script() {
                let state = if p.script_enabled { "" } else { " (disabled)" };
                let _ = write!(out, "  <- {}{state}", script.code());
            }
            out.push('\n');
        }
        info!("{out}");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NullAction;

    fn setup() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let a = doc.create_action(Rc::new(NullAction), "a", Some(root)).unwrap();
        (doc, root, a)
    }

    #[test]
    fn test_dynamic_params() {
        let (mut doc, _, a) = setup();
        let x = doc.add_dynamic_param(a, "x", ParamType::Int, ParamSpec::new()).unwrap();
        let x1 = doc.add_dynamic_param(a, "x", ParamType::Int, ParamSpec::new()).unwrap();
        assert_eq!(doc.param(x1).unwrap().name(), "x1");
        assert!(doc.param(x).unwrap().is_dynamic());
        assert!(doc.add_dynamic_param(a, "it", ParamType::Iter, ParamSpec::new()).is_err());
        assert!(doc.add_dynamic_param(a, "cb", ParamType::Callback, ParamSpec::new()).is_err());

        let enabled = doc.find_param(a, "enabled").unwrap();
        assert!(doc.remove_dynamic_param(enabled, false).is_err());
        doc.clear_dynamic_params(a, false).unwrap();
        assert!(doc.param(x).is_err());
        assert_eq!(doc.object(a).unwrap().params().len(), 4);
    }

    #[test]
    fn test_remove_param_with_outputs_needs_force() {
        let (mut doc, root, a) = setup();
        let b = doc.create_action(Rc::new(NullAction), "b", Some(root)).unwrap();
        let x = doc.add_dynamic_param(a, "x", ParamType::Int, ParamSpec::new()).unwrap();
        let y = doc.add_dynamic_param(b, "y", ParamType::Int, ParamSpec::new()).unwrap();
        doc.connect(x, y, false).unwrap();
        assert!(doc.remove_dynamic_param(x, false).is_err());
        assert!(doc.clear_dynamic_params(a, false).is_err());
        doc.remove_dynamic_param(x, true).unwrap();
    }

    #[test]
    fn test_get_params_sorted() {
        let (mut doc, _, a) = setup();
        doc.add_dynamic_param(a, "result", ParamType::Int, ParamSpec::new().output()).unwrap();
        doc.add_dynamic_param(a, "speed", ParamType::Float, ParamSpec::new().with_priority(5)).unwrap();
        let filter = ParamFilter { sort: true, ..ParamFilter::default() };
        let names: Vec<String> = doc
            .get_params(a, &filter)
            .unwrap()
            .into_iter()
            .map(|id| doc.param(id).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["speed", "execution", "enabled", "break_point", "result", "message"]);

        let outputs = ParamFilter { input: false, ..ParamFilter::default() };
        assert_eq!(doc.get_params(a, &outputs).unwrap().len(), 2);
    }

    #[test]
    fn test_connected_objects() {
        let (mut doc, root, a) = setup();
        let b = doc.create_action(Rc::new(NullAction), "b", Some(root)).unwrap();
        let c = doc.create_action(Rc::new(NullAction), "c", Some(root)).unwrap();
        let exec = |doc: &Document, o| doc.find_param(o, "execution").unwrap();
        doc.connect(exec(&doc, a), exec(&doc, b), false).unwrap();
        doc.connect(exec(&doc, b), exec(&doc, c), false).unwrap();

        assert_eq!(doc.get_connected_objects(b, true, false, None, false).unwrap(), vec![a]);
        assert_eq!(doc.get_connected_objects(b, false, true, None, false).unwrap(), vec![c]);
        assert_eq!(doc.get_connected_objects(a, false, true, None, true).unwrap(), vec![b, c]);
        assert_eq!(
            doc.get_connected_objects(c, true, false, Some("execution"), false).unwrap(),
            vec![b]
        );
    }

    #[test]
    fn test_promote_input_and_output() {
        let (mut doc, root, a) = setup();
        let x = doc.add_dynamic_param(a, "x", ParamType::Int, ParamSpec::new()).unwrap();
        let out = doc.add_dynamic_param(a, "out", ParamType::Int, ParamSpec::new().output()).unwrap();
        doc.set_value(x, 4).unwrap();

        let gx = doc.promote(x, None, false).unwrap();
        assert_eq!(doc.param(gx).unwrap().owner(), root);
        assert_eq!(doc.value(gx).unwrap(), Value::Int(4));
        assert_eq!(doc.get_promoted_param(x), Some(gx));
        doc.set_value(gx, 6).unwrap();
        assert_eq!(doc.value(x).unwrap(), Value::Int(6));

        let gout = doc.promote(out, Some("total"), false).unwrap();
        assert!(doc.param(gout).unwrap().is_output());
        assert_eq!(doc.param(gout).unwrap().name(), "total");
        assert_eq!(doc.get_promoted_param(out), Some(gout));
    }

    #[test]
    fn test_copy_and_equivalence() {
        let (mut doc, root, a) = setup();
        let b = doc.create_action(Rc::new(NullAction), "b", Some(root)).unwrap();
        let x = doc.add_dynamic_param(a, "x", ParamType::Int, ParamSpec::new()).unwrap();
        let y = doc.add_dynamic_param(b, "y", ParamType::Int, ParamSpec::new()).unwrap();
        doc.set_value(x, 3).unwrap();
        doc.set_script(y, "{a.x} + 1", false).unwrap();

        let copy = doc.copy_object(b, None, Some(root), false).unwrap();
        assert_eq!(doc.object(copy).unwrap().name(), "b1");
        let y1 = doc.find_param(copy, "y").unwrap();
        assert_eq!(doc.value(y1).unwrap(), Value::Int(4));
        assert!(doc.is_equivalent(b, copy));

        let baked = doc.copy_object(b, Some("baked"), Some(root), true).unwrap();
        let y2 = doc.find_param(baked, "y").unwrap();
        assert!(doc.param(y2).unwrap().script().is_none());
        assert_eq!(doc.value(y2).unwrap(), Value::Int(4));
        assert!(!doc.is_equivalent(b, baked));
    }

    #[test]
    fn test_describe_lists_params() {
        let (mut doc, _, a) = setup();
        doc.add_dynamic_param(a, "speed", ParamType::Float, ParamSpec::new()).unwrap();
        let text = doc.describe(a).unwrap();
        assert!(text.starts_with("Action root/a"));
        assert!(text.contains("speed (float) = 0.0"));
    }
}
