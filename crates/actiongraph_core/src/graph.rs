// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph membership and queries.

use crate::document::{Document, LONG_NAME_SEPARATOR};
use crate::error::{ActionError, ConnectionError, Result};
use crate::id::ObjectId;
use crate::naming::{match_name, next_available_name};
use crate::object::{ActionObject, GraphData, ObjectKind};
use crate::param::ParamType;
use tracing::debug;

impl Document {
    /// Create an empty graph, optionally inside `graph`
    pub fn create_graph(&mut self, name: &str, graph: Option<ObjectId>) -> Result<ObjectId> {
        if let Some(graph) = graph {
            self.check_structural(graph)?;
        }
        let id = self.new_object(name, ObjectKind::Graph(GraphData::default()))?;
        if let Some(graph) = graph {
            if let Err(err) = self.add_object(graph, id) {
                self.delete_object(id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Add `object` to `graph`, renaming it on collision and moving it out of
    /// its previous graph.
    pub fn add_object(&mut self, graph: ObjectId, object: ObjectId) -> Result<()> {
        self.check_structural(graph)?;
        let obj = self.object(object)?;
        if object == graph || self.ancestors(graph).contains(&object) {
            return Err(ActionError::Failed(format!(
                "Can't add {} to its own member {}",
                self.long_name(object),
                self.long_name(graph)
            ))
            .into());
        }
        let old_parent = obj.parent;
        if old_parent == Some(graph) {
            return Ok(());
        }
        if let Some(old) = old_parent {
            self.check_structural(old)?;
        }

        let object_app = obj.app().map(str::to_string);
        let graph_app = self.object(graph)?.app().map(str::to_string);
        if let (Some(graph_app), Some(object_app)) = (&graph_app, &object_app) {
            if graph_app != object_app {
                return Err(ActionError::AppConflict {
                    graph: self.long_name(graph),
                    graph_app: graph_app.clone(),
                    object: self.long_name(object),
                    object_app: object_app.clone(),
                }
                .into());
            }
        }

        if let Some(old) = old_parent {
            self.drop_object_connections(object);
            if let Some(data) = self.object_mut(old)?.graph_mut() {
                data.children.retain(|c| *c != object);
            }
            self.refresh_app(old);
        }

        let name = self.object(object)?.name.clone();
        let unique = next_available_name(&name, |n| self.child_by_name(graph, n).is_some());
        self.object_mut(object)?.name = unique;
        self.attach_child(graph, object)?;
        if graph_app.is_none() && object_app.is_some() {
            if let Some(data) = self.object_mut(graph)?.graph_mut() {
                data.app = object_app;
            }
        }
        debug!(object = %self.long_name(object), "Added to graph");
        Ok(())
    }

    /// Append `child` to `graph` without any checks
    pub(crate) fn attach_child(&mut self, graph: ObjectId, child: ObjectId) -> Result<()> {
        let data = self
            .object_mut(graph)?
            .graph_mut()
            .ok_or_else(|| ActionError::NotGraph(graph.to_string()))?;
        data.children.push(child);
        self.object_mut(child)?.parent = Some(graph);
        Ok(())
    }

    /// Clear scripts linking `object` to other objects
    fn drop_object_connections(&mut self, object: ObjectId) {
        let params = self.objects.get(&object).map(|o| o.params.clone()).unwrap_or_default();
        let mut driven = Vec::new();
        for id in &params {
            let Some(param) = self.params.get(id) else {
                continue;
            };
            let external_input = param
                .script()
                .is_some_and(|s| s.input_params().any(|src| self.params.get(&src).is_some_and(|p| p.owner != object)));
            if external_input {
                driven.push(*id);
            }
            driven.extend(
                self.dependents(*id)
                    .into_iter()
                    .filter(|d| self.params.get(d).is_some_and(|p| p.owner != object)),
            );
        }
        for id in driven {
            if let Some(param) = self.params.get(&id) {
                let old = param.script.clone();
                self.unregister_inputs(id, old.as_ref());
                if let Some(param) = self.params.get_mut(&id) {
                    param.script = None;
                    param.script_enabled = false;
                }
            }
        }
    }

    /// Recompute the shared app tag of a graph from its members
    pub(crate) fn refresh_app(&mut self, graph: ObjectId) {
        let app = self
            .objects
            .get(&graph)
            .and_then(ActionObject::graph)
            .and_then(|data| {
                data.children
                    .iter()
                    .find_map(|c| self.objects.get(c).and_then(|o| o.app().map(str::to_string)))
            });
        if let Some(data) = self.objects.get_mut(&graph).and_then(ActionObject::graph_mut) {
            data.app = app;
        }
    }

    /// Delete a member; `force` is required when it drives other objects
    pub fn remove_object(&mut self, object: ObjectId, force: bool) -> Result<()> {
        let obj = self.object(object)?;
        let parent = obj.parent;
        if let Some(graph) = parent {
            self.check_structural(graph)?;
        }
        if !force && !self.output_objects(object).is_empty() {
            return Err(ConnectionError::HasOutputs(self.long_name(object)).into());
        }
        debug!(object = %self.long_name(object), "Removing object");
        self.delete_object(object);
        if let Some(graph) = parent {
            self.refresh_app(graph);
        }
        Ok(())
    }

    /// Delete every member of a graph
    pub fn clear_objects(&mut self, graph: ObjectId, force: bool) -> Result<()> {
        self.check_structural(graph)?;
        let children = self.iter_objects(graph, false)?;
        if !force {
            if let Some(c) = children.iter().find(|c| {
                self.output_objects(**c).iter().any(|o| !children.contains(o))
            }) {
                return Err(ConnectionError::HasOutputs(self.long_name(*c)).into());
            }
        }
        for child in children {
            self.delete_object(child);
        }
        self.refresh_app(graph);
        Ok(())
    }

    /// Reorder members so `objects` sit right before (or after) `target`
    pub fn move_objects(&mut self, objects: &[ObjectId], target: ObjectId, after: bool) -> Result<()> {
        let graph = self
            .parent(target)
            .ok_or_else(|| ActionError::NoGraph(self.long_name(target)))?;
        self.check_structural(graph)?;
        if let Some(stray) = objects.iter().find(|o| self.parent(**o) != Some(graph)) {
            return Err(ActionError::NotFound(format!(
                "{} in {}",
                self.long_name(*stray),
                self.long_name(graph)
            ))
            .into());
        }
        let data = self
            .object_mut(graph)?
            .graph_mut()
            .ok_or_else(|| ActionError::NotGraph(graph.to_string()))?;
        let moving: Vec<ObjectId> = data.children.iter().copied().filter(|c| objects.contains(c)).collect();
        if moving.contains(&target) {
            return Ok(());
        }
        data.children.retain(|c| !objects.contains(c));
        let index = data.children.iter().position(|c| *c == target).unwrap_or(data.children.len());
        let index = if after { index + 1 } else { index };
        data.children.splice(index..index, moving);
        Ok(())
    }

    /// Member by name, or by a slash-separated path through sub-graphs
    pub fn get_object(&self, graph: ObjectId, path: &str) -> Option<ObjectId> {
        path.split(LONG_NAME_SEPARATOR)
            .try_fold(graph, |current, name| self.child_by_name(current, name))
    }

    /// Members of a graph, depth first when `recursive`
    pub fn iter_objects(&self, graph: ObjectId, recursive: bool) -> Result<Vec<ObjectId>> {
        let data = self
            .object(graph)?
            .graph()
            .ok_or_else(|| ActionError::NotGraph(self.long_name(graph)))?;
        let mut out = Vec::new();
        for child in &data.children {
            out.push(*child);
            if recursive && self.objects.get(child).is_some_and(ActionObject::is_graph) {
                out.extend(self.iter_objects(*child, true)?);
            }
        }
        Ok(out)
    }

    /// Objects whose source and name match wildcard patterns.
    ///
    /// With `from_root` the search starts at the root graph of `graph`.
    pub fn find_actions(
        &self,
        graph: ObjectId,
        source: Option<&str>,
        name: Option<&str>,
        recursive: bool,
        from_root: bool,
    ) -> Result<Vec<ObjectId>> {
        let start = if from_root { self.root_graph(graph) } else { graph };
        Ok(self
            .iter_objects(start, recursive)?
            .into_iter()
            .filter(|id| {
                let Some(obj) = self.objects.get(id) else {
                    return false;
                };
                source.map_or(true, |pattern| obj.source().is_some_and(|s| match_name(s, pattern)))
                    && name.map_or(true, |pattern| match_name(&obj.name, pattern))
            })
            .collect())
    }

    /// Number of passes: the shortest iterator parameter, 1 without any
    pub fn iter_count(&self, graph: ObjectId) -> Result<usize> {
        let obj = self.object(graph)?;
        let mut count: Option<usize> = None;
        for id in &obj.params {
            let Some(param) = self.params.get(id).filter(|p| p.param_type() == ParamType::Iter) else {
                continue;
            };
            let len = self.value(param.id)?.as_list().map_or(0, <[_]>::len);
            count = Some(count.map_or(len, |c| c.min(len)));
        }
        Ok(count.unwrap_or(1))
    }

    /// Number of leaf actions supporting `exec_name`
    pub fn action_count(&self, graph: ObjectId, exec_name: &str, recursive: bool) -> Result<usize> {
        Ok(self
            .iter_objects(graph, recursive)?
            .into_iter()
            .filter_map(|id| self.objects.get(&id))
            .filter(|o| !o.is_graph() && o.supports_exec_name(exec_name))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::actions::NullAction;
    use crate::error::EngineError;
    use crate::param::ParamSpec;
    use crate::value::Value;
    use std::rc::Rc;

    struct MayaOnly;

    impl ActionKind for MayaOnly {
        fn source(&self) -> &str {
            "test:MayaOnly"
        }

        fn app(&self) -> Option<&str> {
            Some("maya")
        }

        fn run(&self, _cx: &mut crate::action::ActionContext<'_>) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct HoudiniOnly;

    impl ActionKind for HoudiniOnly {
        fn source(&self) -> &str {
            "test:HoudiniOnly"
        }

        fn app(&self) -> Option<&str> {
            Some("houdini")
        }

        fn run(&self, _cx: &mut crate::action::ActionContext<'_>) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_add_object_renames_and_reparents() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let sub = doc.create_graph("sub", Some(root)).unwrap();
        let a = doc.create_action(Rc::new(NullAction), "a", Some(root)).unwrap();
        let other = doc.create_action(Rc::new(NullAction), "a", Some(sub)).unwrap();
        doc.add_object(sub, a).unwrap();
        assert_eq!(doc.parent(a), Some(sub));
        assert_eq!(doc.object(a).unwrap().name(), "a1");
        assert_eq!(doc.iter_objects(root, false).unwrap(), vec![sub]);
        assert_eq!(doc.iter_objects(root, true).unwrap(), vec![sub, other, a]);
        assert_eq!(doc.get_object(root, "sub/a1"), Some(a));
        assert!(doc.add_object(sub, root).is_err());
    }

    #[test]
    fn test_app_conflict() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let maya = doc.create_action(Rc::new(MayaOnly), "m", Some(root)).unwrap();
        assert_eq!(doc.object(root).unwrap().app(), Some("maya"));
        let err = doc.create_action(Rc::new(HoudiniOnly), "h", Some(root)).unwrap_err();
        assert!(matches!(err, EngineError::Action(ActionError::AppConflict { .. })));
        doc.remove_object(maya, false).unwrap();
        assert_eq!(doc.object(root).unwrap().app(), None);
        doc.create_action(Rc::new(HoudiniOnly), "h", Some(root)).unwrap();
    }

    #[test]
    fn test_remove_with_outputs_needs_force() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let a = doc.create_action(Rc::new(NullAction), "a", Some(root)).unwrap();
        let b = doc.create_action(Rc::new(NullAction), "b", Some(root)).unwrap();
        let ea = doc.find_param(a, "execution").unwrap();
        let eb = doc.find_param(b, "execution").unwrap();
        doc.connect(ea, eb, false).unwrap();
        assert!(doc.remove_object(a, false).is_err());
        assert!(doc.clear_objects(root, false).is_ok());
        assert!(doc.iter_objects(root, false).unwrap().is_empty());
    }

    #[test]
    fn test_move_objects() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let ids: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| doc.create_action(Rc::new(NullAction), n, Some(root)).unwrap())
            .collect();
        doc.move_objects(&[ids[3]], ids[0], false).unwrap();
        assert_eq!(doc.iter_objects(root, false).unwrap(), vec![ids[3], ids[0], ids[1], ids[2]]);
        doc.move_objects(&[ids[3], ids[0]], ids[2], true).unwrap();
        assert_eq!(doc.iter_objects(root, false).unwrap(), vec![ids[1], ids[2], ids[3], ids[0]]);
    }

    #[test]
    fn test_find_and_count() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let sub = doc.create_graph("sub", Some(root)).unwrap();
        doc.create_action(Rc::new(NullAction), "first", Some(root)).unwrap();
        let deep = doc.create_action(Rc::new(MayaOnly), "deep", Some(sub)).unwrap();
        assert_eq!(doc.find_actions(sub, Some("maya*"), None, true, true).unwrap(), vec![deep]);
        assert_eq!(doc.find_actions(root, None, Some("F*"), false, false).unwrap().len(), 1);
        assert_eq!(doc.action_count(root, "main", true).unwrap(), 2);
        assert_eq!(doc.action_count(root, "main", false).unwrap(), 1);
        assert_eq!(doc.action_count(root, "cleanup", true).unwrap(), 0);
    }

    #[test]
    fn test_iter_count() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        assert_eq!(doc.iter_count(root).unwrap(), 1);
        let spec = ParamSpec::new().with_default(Value::from(vec![1, 2, 3]));
        doc.add_dynamic_param(root, "a", ParamType::Iter, spec).unwrap();
        let spec = ParamSpec::new().with_default(Value::from(vec!["x", "y"]));
        doc.add_dynamic_param(root, "b", ParamType::Iter, spec).unwrap();
        assert_eq!(doc.iter_count(root).unwrap(), 2);
    }
}
