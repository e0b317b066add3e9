// SPDX-License-Identifier: MIT OR Apache-2.0
//! The document arena.
//!
//! A [`Document`] owns every object and parameter of one editing session.
//! Objects and parameters refer to each other by id only, and the reverse
//! dependents index records which parameters are driven by a given source.
//! Operations on parameters, scripts, graphs and execution are all methods
//! of the document, split across the modules that own each concern.

use crate::action::{builtin_params, ParamDecl};
use crate::error::{ActionError, ParameterError, Result};
use crate::id::{IdAllocator, ObjectId, ParamId};
use crate::naming::{next_available_name, sanitize_name};
use crate::object::{ActionObject, ObjectKind};
use crate::param::{ParamSpec, ParamType, Parameter};
use crate::script::{make_token, GRAPH, THIS};
use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::debug;

/// Separator of object names in long names
pub const LONG_NAME_SEPARATOR: char = '/';

/// Arena owning objects, parameters and their relationships
#[derive(Debug)]
pub struct Document {
    ids: IdAllocator,
    pub(crate) objects: HashMap<ObjectId, ActionObject>,
    pub(crate) params: HashMap<ParamId, Parameter>,
    pub(crate) dependents: HashMap<ParamId, IndexSet<ParamId>>,
    pub(crate) executing: Vec<ObjectId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            objects: HashMap::new(),
            params: HashMap::new(),
            dependents: HashMap::new(),
            executing: Vec::new(),
        }
    }

    /// Look up an object
    pub fn object(&self, id: ObjectId) -> Result<&ActionObject> {
        self.objects
            .get(&id)
            .ok_or_else(|| ActionError::NotFound(id.to_string()).into())
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Result<&mut ActionObject> {
        self.objects
            .get_mut(&id)
            .ok_or_else(|| ActionError::NotFound(id.to_string()).into())
    }

    /// Look up a parameter
    pub fn param(&self, id: ParamId) -> Result<&Parameter> {
        self.params
            .get(&id)
            .ok_or_else(|| ParameterError::NotFound(id.to_string()).into())
    }

    pub(crate) fn param_mut(&mut self, id: ParamId) -> Result<&mut Parameter> {
        self.params
            .get_mut(&id)
            .ok_or_else(|| ParameterError::NotFound(id.to_string()).into())
    }

    /// Whether the object still exists
    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Parameter of `object` called `name`, if any
    pub fn param_id(&self, object: ObjectId, name: &str) -> Option<ParamId> {
        let object = self.objects.get(&object)?;
        object
            .params
            .iter()
            .copied()
            .find(|p| self.params.get(p).is_some_and(|param| param.name == name))
    }

    /// Parameter of `object` called `name`
    pub fn find_param(&self, object: ObjectId, name: &str) -> Result<ParamId> {
        self.object(object)?;
        self.param_id(object, name).ok_or_else(|| {
            ParameterError::NotFound(format!("{}.{name}", self.long_name(object))).into()
        })
    }

    /// Owning graph of an object
    pub fn parent(&self, object: ObjectId) -> Option<ObjectId> {
        self.objects.get(&object).and_then(|o| o.parent)
    }

    /// Outermost graph containing `object` (or the object itself)
    pub fn root_graph(&self, object: ObjectId) -> ObjectId {
        let mut current = object;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Slash-separated path from the root graph
    pub fn long_name(&self, object: ObjectId) -> String {
        let mut names = Vec::new();
        let mut current = Some(object);
        while let Some(id) = current {
            match self.objects.get(&id) {
                Some(o) => {
                    names.push(o.name.as_str());
                    current = o.parent;
                }
                None => break,
            }
        }
        if names.is_empty() {
            return object.to_string();
        }
        names.reverse();
        names.join(&LONG_NAME_SEPARATOR.to_string())
    }

    /// `long_name.param` of a parameter
    pub fn param_path(&self, id: ParamId) -> String {
        match self.params.get(&id) {
            Some(p) => format!("{}.{}", self.long_name(p.owner), p.name),
            None => id.to_string(),
        }
    }

    /// Member of `graph` called `name`
    pub fn child_by_name(&self, graph: ObjectId, name: &str) -> Option<ObjectId> {
        let data = self.objects.get(&graph)?.graph()?;
        data.children
            .iter()
            .copied()
            .find(|c| self.objects.get(c).is_some_and(|o| o.name == name))
    }

    /// Ancestors of `object`, nearest first
    pub(crate) fn ancestors(&self, object: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut current = self.parent(object);
        while let Some(id) = current {
            out.push(id);
            current = self.parent(id);
        }
        out
    }

    /// Whether `object` sits inside a referenced graph
    pub fn is_inside_referenced(&self, object: ObjectId) -> bool {
        self.ancestors(object)
            .into_iter()
            .any(|a| self.objects.get(&a).and_then(ActionObject::graph).is_some_and(|g| g.referenced))
    }

    /// Whether `object` or one of its ancestors is currently executing
    pub fn is_executing(&self, object: ObjectId) -> bool {
        self.executing.contains(&object)
            || self.ancestors(object).iter().any(|a| self.executing.contains(a))
    }

    /// Fail unless `graph` is a graph whose member set may change
    pub(crate) fn check_structural(&self, graph: ObjectId) -> Result<()> {
        let object = self.object(graph)?;
        let data = object
            .graph()
            .ok_or_else(|| ActionError::NotGraph(self.long_name(graph)))?;
        if data.referenced || self.is_inside_referenced(graph) {
            return Err(ActionError::Referenced(self.long_name(graph)).into());
        }
        if self.is_executing(graph) {
            return Err(ActionError::Executing(self.long_name(graph)).into());
        }
        Ok(())
    }

    /// Whether users may write a parameter
    pub fn is_param_editable(&self, id: ParamId) -> bool {
        self.check_param_editable(id).is_ok()
    }

    pub(crate) fn check_param_editable(&self, id: ParamId) -> Result<()> {
        let param = self.param(id)?;
        if !param.spec.editable {
            return Err(ParameterError::NotEditable(self.param_path(id)).into());
        }
        if !param.is_output() && self.is_inside_referenced(param.owner) {
            return Err(ParameterError::Referenced(self.param_path(id)).into());
        }
        Ok(())
    }

    /// Graph whose members a script on `id` may reference
    pub(crate) fn scope_of(&self, id: ParamId) -> Option<ObjectId> {
        let param = self.params.get(&id)?;
        let owner = self.objects.get(&param.owner)?;
        if param.is_output() && owner.is_graph() {
            Some(owner.id)
        } else {
            owner.parent
        }
    }

    /// Resolve a reference token written on `driven`
    pub(crate) fn lookup_token(&self, driven: ParamId, token: &str) -> Option<ParamId> {
        let (object_name, param_name) = crate::script::split_token(token);
        let owner = self.params.get(&driven)?.owner;
        let object = match object_name {
            THIS => owner,
            GRAPH => self.scope_of(driven)?,
            name => self.child_by_name(self.scope_of(driven)?, name)?,
        };
        self.param_id(object, param_name)
    }

    /// Canonical token for a reference from `driven` to `source`
    pub(crate) fn canonical_token(&self, driven: ParamId, source: ParamId) -> Option<String> {
        let driven_owner = self.params.get(&driven)?.owner;
        let source = self.params.get(&source)?;
        let object = if source.owner == driven_owner {
            THIS.to_string()
        } else if Some(source.owner) == self.scope_of(driven) {
            GRAPH.to_string()
        } else {
            self.objects.get(&source.owner)?.name.clone()
        };
        Some(make_token(&object, &source.name))
    }

    /// Parameters whose scripts reference `id`
    pub fn dependents(&self, id: ParamId) -> Vec<ParamId> {
        self.dependents
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Create a detached object with its builtin and declared parameters
    pub(crate) fn new_object(&mut self, name: &str, kind: ObjectKind) -> Result<ObjectId> {
        let fallback = match &kind {
            ObjectKind::Action(k) => k.name().to_string(),
            ObjectKind::Graph(_) => "ActionGraph".to_string(),
        };
        let mut name = sanitize_name(name);
        if name.is_empty() {
            name = sanitize_name(&fallback);
        }
        let mut decls: Vec<ParamDecl> = builtin_params();
        if let ObjectKind::Action(k) = &kind {
            decls.extend(k.params());
        }

        let id = self.ids.object();
        self.objects.insert(id, ActionObject::new(id, name, kind));
        for decl in decls {
            if let Err(err) = self.add_param(id, &decl.name, decl.ty, decl.spec) {
                self.delete_object(id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Create a parameter on `object`, renaming it if the name is taken
    pub(crate) fn add_param(
        &mut self,
        object: ObjectId,
        name: &str,
        ty: ParamType,
        spec: ParamSpec,
    ) -> Result<ParamId> {
        self.object(object)?;
        let name = next_available_name(name, |n| self.param_id(object, n).is_some());
        if name.is_empty() {
            return Err(ActionError::InvalidName(name).into());
        }
        let id = self.ids.param();
        let param = Parameter::new(id, object, &name, ty, spec)?;
        self.params.insert(id, param);
        self.object_mut(object)?.params.push(id);
        Ok(id)
    }

    /// Remove a parameter, invalidating references to it
    pub(crate) fn drop_param(&mut self, id: ParamId) {
        if let Some(deps) = self.dependents.remove(&id) {
            for dep in deps {
                if let Some(script) = self.params.get_mut(&dep).and_then(|p| p.script.as_mut()) {
                    for r in script.refs_mut().iter_mut().filter(|r| r.param == Some(id)) {
                        r.param = None;
                    }
                }
            }
        }
        if let Some(param) = self.params.remove(&id) {
            self.unregister_inputs(id, param.script.as_ref());
            if let Some(owner) = self.objects.get_mut(&param.owner) {
                owner.params.retain(|p| *p != id);
            }
        }
    }

    /// Remove an object, its members and parameters
    pub(crate) fn delete_object(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get(&id) else {
            return;
        };
        let children = object.graph().map(|g| g.children.clone()).unwrap_or_default();
        let params = object.params.clone();
        let parent = object.parent;
        for child in children {
            self.delete_object(child);
        }
        for param in params {
            self.drop_param(param);
        }
        if let Some(data) = parent.and_then(|p| self.objects.get_mut(&p)).and_then(ActionObject::graph_mut) {
            data.children.retain(|c| *c != id);
        }
        self.objects.remove(&id);
    }

    /// Rewrite tokens of every script that references `source`
    pub(crate) fn refresh_dependent_tokens(&mut self, source: ParamId) {
        for dep in self.dependents(source) {
            let Some(new_token) = self.canonical_token(dep, source) else {
                continue;
            };
            let Some(script) = self.params.get_mut(&dep).and_then(|p| p.script.as_mut()) else {
                continue;
            };
            let old: Vec<String> = script
                .refs()
                .iter()
                .filter(|r| r.param == Some(source))
                .map(|r| r.token.clone())
                .collect();
            for token in old {
                script.replace_token(&token, &new_token);
            }
        }
    }

    /// Rename an object; returns the unique name actually assigned
    pub fn rename_object(&mut self, id: ObjectId, name: &str) -> Result<String> {
        let object = self.object(id)?;
        let old = object.name.clone();
        let parent = object.parent;
        if let Some(graph) = parent {
            if self.is_inside_referenced(id) {
                return Err(ActionError::Referenced(self.long_name(graph)).into());
            }
        }
        let sanitized = sanitize_name(name);
        if sanitized.is_empty() {
            return Err(ActionError::InvalidName(name.to_string()).into());
        }
        let new_name = match parent {
            Some(graph) => next_available_name(&sanitized, |n| {
                n != old && self.child_by_name(graph, n).is_some()
            }),
            None => sanitized,
        };
        self.object_mut(id)?.name = new_name.clone();
        for param in self.object(id)?.params.clone() {
            self.refresh_dependent_tokens(param);
        }
        debug!(from = %old, to = %new_name, "Renamed object");
        Ok(new_name)
    }

    /// Rename a dynamic parameter; returns the unique name actually assigned
    pub fn rename_param(&mut self, id: ParamId, name: &str) -> Result<String> {
        let param = self.param(id)?;
        if !param.is_dynamic() {
            return Err(ParameterError::NotDynamic(self.param_path(id)).into());
        }
        let owner = param.owner;
        let old = param.name.clone();
        let sanitized = sanitize_name(name);
        if sanitized.is_empty() {
            return Err(ActionError::InvalidName(name.to_string()).into());
        }
        let new_name = next_available_name(&sanitized, |n| {
            n != old && self.param_id(owner, n).is_some()
        });
        self.param_mut(id)?.name = new_name.clone();
        self.refresh_dependent_tokens(id);
        debug!(from = %old, to = %new_name, "Renamed parameter");
        Ok(new_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NullAction;
    use std::rc::Rc;

    #[test]
    fn test_builtin_params_in_order() {
        let mut doc = Document::new();
        let graph = doc.create_graph("root", None).unwrap();
        let names: Vec<_> = doc
            .object(graph)
            .unwrap()
            .params()
            .iter()
            .map(|p| doc.param(*p).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["execution", "enabled", "break_point", "message"]);
    }

    #[test]
    fn test_long_name_and_lookup() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let sub = doc.create_graph("sub", Some(root)).unwrap();
        let leaf = doc.create_action(Rc::new(NullAction), "leaf", Some(sub)).unwrap();
        assert_eq!(doc.long_name(leaf), "root/sub/leaf");
        assert_eq!(doc.root_graph(leaf), root);
        assert_eq!(doc.child_by_name(sub, "leaf"), Some(leaf));
        assert!(doc.find_param(leaf, "enabled").is_ok());
        assert!(doc.find_param(leaf, "missing").is_err());
    }

    #[test]
    fn test_rename_object_is_unique() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let a = doc.create_action(Rc::new(NullAction), "a", Some(root)).unwrap();
        let b = doc.create_action(Rc::new(NullAction), "b", Some(root)).unwrap();
        assert_eq!(doc.rename_object(b, "a").unwrap(), "a1");
        assert_eq!(doc.rename_object(a, "a").unwrap(), "a");
        assert_eq!(doc.rename_object(a, "new name!").unwrap(), "new_name");
        assert!(doc.rename_object(a, "!!").is_err());
    }

    #[test]
    fn test_delete_object_removes_params() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let leaf = doc.create_action(Rc::new(NullAction), "leaf", Some(root)).unwrap();
        let param = doc.find_param(leaf, "enabled").unwrap();
        doc.delete_object(leaf);
        assert!(doc.param(param).is_err());
        assert!(doc.object(root).unwrap().graph().unwrap().children().is_empty());
    }
}
