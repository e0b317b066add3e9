// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON documents and referenced graph templates.
//!
//! A graph serializes to a tree of [`ObjectData`]. Loading runs in two
//! passes: the first creates objects and dynamic parameters, the second
//! applies values and scripts once every object a script may reference
//! exists. Members of a referenced graph are not written; they come from
//! the library template when the document is loaded.

use crate::document::Document;
use crate::error::{ActionError, ParameterError, Result};
use crate::id::{ObjectId, ParamId};
use crate::library::ActionLibrary;
use crate::object::ActionObject;
use crate::param::{ParamSpec, ParamType};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// File extension of graph documents
pub const GRAPH_EXT: &str = "agraph";

/// Source id of the placeholder for actions missing from the library
const NULL_ACTION: &str = "default:NullAction";

/// Persisted parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamData {
    /// Type tag
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Parameter name
    pub name: String,
    /// Whether the script drives the value
    pub script_enabled: bool,
    /// Script code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Stored value, absent when the default applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Creation attributes of dynamic parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<ParamSpec>,
}

/// Persisted action or graph. Graphs always carry `objects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    /// Object name
    pub name: String,
    /// Library source id
    #[serde(default)]
    pub source: Option<String>,
    /// Graph description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Graph tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Graph display color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_color: Option<[u8; 3]>,
    /// Graph display icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_icon: Option<String>,
    /// Whether the graph mirrors its library template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced: Option<bool>,
    /// Parameters in declaration order
    pub parameters: Vec<ParamData>,
    /// Graph members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectData>>,
}

impl ObjectData {
    /// Whether this is graph data
    pub fn is_graph(&self) -> bool {
        self.objects.is_some()
    }

    fn is_referenced(&self) -> bool {
        self.referenced.unwrap_or(false) && self.source.is_some()
    }
}

fn check_extension(path: &Path) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some(GRAPH_EXT) {
        return Err(ActionError::InvalidFile(path.display().to_string()).into());
    }
    Ok(())
}

/// Parse a graph document
pub fn read_data(path: &Path) -> Result<ObjectData> {
    check_extension(path)?;
    let data: ObjectData = serde_json::from_str(&fs::read_to_string(path)?)?;
    if !data.is_graph() {
        return Err(ActionError::InvalidFile(path.display().to_string()).into());
    }
    Ok(data)
}

impl Document {
    /// Serialize an object and, for graphs, its members
    pub fn data(&self, object: ObjectId) -> Result<ObjectData> {
        let obj = self.object(object)?;
        let mut parameters = Vec::with_capacity(obj.params.len());
        for param in obj.params.iter().filter_map(|id| self.params.get(id)) {
            if param.is_output() && !param.is_dynamic() {
                continue;
            }
            let value = match param.param_type() {
                ParamType::Message | ParamType::Callback => None,
                _ => param.stored_value().cloned(),
            };
            parameters.push(ParamData {
                ty: param.param_type(),
                name: param.name().to_string(),
                script_enabled: param.script_enabled(),
                script: param.script().map(|s| s.code().to_string()),
                value,
                creation: param.is_dynamic().then(|| param.spec().clone()),
            });
        }

        let mut data = ObjectData {
            name: obj.name.clone(),
            source: obj.source().map(str::to_string),
            doc: None,
            tags: Vec::new(),
            ui_color: None,
            ui_icon: None,
            referenced: None,
            parameters,
            objects: None,
        };
        if let Some(graph) = obj.graph() {
            data.doc = graph.doc.clone();
            data.tags = graph.tags.clone();
            data.ui_color = graph.ui_color;
            data.ui_icon = graph.ui_icon.clone();
            data.referenced = Some(graph.referenced);
            let objects = if graph.referenced {
                Vec::new()
            } else {
                graph.children.iter().map(|c| self.data(*c)).collect::<Result<_>>()?
            };
            data.objects = Some(objects);
        }
        Ok(data)
    }

    /// Write a graph to a `.agraph` JSON file
    pub fn write(&self, graph: ObjectId, path: &Path) -> Result<()> {
        check_extension(path)?;
        if !self.object(graph)?.is_graph() {
            return Err(ActionError::NotGraph(self.long_name(graph)).into());
        }
        let data = self.data(graph)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(&data)?)?;
        info!(graph = %self.long_name(graph), path = %path.display(), "Saved action graph");
        Ok(())
    }

    /// Replace the content of `graph` with a `.agraph` file
    pub fn read<L>(&mut self, graph: ObjectId, path: &Path, library: &L) -> Result<()>
    where
        L: ActionLibrary + ?Sized,
    {
        let data = read_data(path)?;
        self.load_data(graph, &data, library)?;
        info!(graph = %self.long_name(graph), path = %path.display(), "Loaded action graph");
        Ok(())
    }

    /// Apply serialized data to an existing object
    pub fn load_data<L>(&mut self, object: ObjectId, data: &ObjectData, library: &L) -> Result<()>
    where
        L: ActionLibrary + ?Sized,
    {
        self.apply_structure(object, data, library)?;
        self.apply_values(object, data)?;
        self.resolve_scripts();
        Ok(())
    }

    /// Fill `graph` from a library template and mark it referenced
    pub(crate) fn load_template<L>(
        &mut self,
        graph: ObjectId,
        source: &str,
        template: &ObjectData,
        library: &L,
    ) -> Result<()>
    where
        L: ActionLibrary + ?Sized,
    {
        self.set_referenced(graph, false)?;
        self.apply_structure(graph, template, library)?;
        self.apply_values(graph, template)?;
        if let Some(data) = self.object_mut(graph)?.graph_mut() {
            data.source = Some(source.to_string());
            data.referenced = true;
        }
        Ok(())
    }

    /// Detach a referenced graph from its template so it can be edited
    pub fn import_reference(&mut self, graph: ObjectId) -> Result<()> {
        let data = self
            .object(graph)?
            .graph()
            .ok_or_else(|| ActionError::NotGraph(self.long_name(graph)))?;
        if data.referenced {
            self.set_referenced(graph, false)?;
        } else {
            warn!(graph = %self.long_name(graph), "Graph is not referenced");
        }
        Ok(())
    }

    /// Rebuild a graph from its template, dropping member edits but keeping
    /// the graph's own parameter overrides
    pub fn revert_reference<L>(&mut self, graph: ObjectId, library: &L) -> Result<()>
    where
        L: ActionLibrary + ?Sized,
    {
        let obj = self.object(graph)?;
        let Some(source) = obj.graph().and_then(|g| g.source.clone()) else {
            warn!(graph = %self.long_name(graph), "Graph is not associated with a template");
            return Ok(());
        };
        if self.is_executing(graph) {
            return Err(ActionError::Executing(self.long_name(graph)).into());
        }
        if self.is_inside_referenced(graph) {
            return Err(ActionError::Referenced(self.long_name(graph)).into());
        }
        if !library.has_graph(&source) {
            warn!(graph = %self.long_name(graph), %source, "Graph template not found");
            return Ok(());
        }
        let template = library.graph_template(&source)?;

        self.set_referenced(graph, true)?;
        let overrides = self.data(graph)?;
        self.load_template(graph, &source, &template, library)?;
        self.apply_values(graph, &overrides)?;
        self.resolve_scripts();
        info!(graph = %self.long_name(graph), %source, "Reverted graph to its template");
        Ok(())
    }

    fn set_referenced(&mut self, graph: ObjectId, referenced: bool) -> Result<()> {
        let name = self.long_name(graph);
        let data = self
            .object_mut(graph)?
            .graph_mut()
            .ok_or(ActionError::NotGraph(name))?;
        data.referenced = referenced;
        Ok(())
    }

    /// First pass: objects, dynamic parameters and graph attributes
    fn apply_structure<L>(&mut self, object: ObjectId, data: &ObjectData, library: &L) -> Result<()>
    where
        L: ActionLibrary + ?Sized,
    {
        let referenced = data.is_referenced();
        let Some(objects) = data.objects.as_ref().filter(|_| self.object(object).is_ok_and(ActionObject::is_graph))
        else {
            return self.apply_params(object, &data.parameters);
        };

        if !referenced {
            self.set_referenced(object, false)?;
            self.clear_objects(object, true)?;
            self.apply_params(object, &data.parameters)?;
            for child in objects {
                self.load_child(object, child, library)?;
            }
        }
        if let Some(graph) = self.object_mut(object)?.graph_mut() {
            graph.doc = data.doc.clone();
            graph.tags = data.tags.clone();
            graph.ui_color = data.ui_color;
            graph.ui_icon = data.ui_icon.clone();
            graph.source = data.source.clone();
            graph.referenced = referenced;
        }
        Ok(())
    }

    fn load_child<L>(&mut self, graph: ObjectId, data: &ObjectData, library: &L) -> Result<()>
    where
        L: ActionLibrary + ?Sized,
    {
        let id = if data.is_graph() {
            let mut data = data.clone();
            let mut source = data.source.clone().filter(|_| data.is_referenced());
            if let Some(src) = source.as_deref().filter(|s| !library.has_graph(s)) {
                warn!(graph = %data.name, source = src, "Graph template not found, loading an empty graph");
                source = None;
                data.source = None;
                data.referenced = Some(false);
            }
            let id = library.create_graph(self, source.as_deref(), Some(&data.name), Some(graph))?;
            self.apply_structure(id, &data, library)?;
            id
        } else {
            let mut source = data.source.clone().unwrap_or_default();
            if !library.has_action(&source) {
                warn!(action = %data.name, %source, "Action not found, loading a NullAction");
                source = NULL_ACTION.to_string();
            }
            let id = library.create_action(self, &source, Some(&data.name), Some(graph))?;
            self.apply_structure(id, data, library)?;
            id
        };
        if self.object(id)?.name() != data.name {
            warn!(expected = %data.name, actual = %self.long_name(id), "Object renamed while loading");
        }
        Ok(())
    }

    fn apply_params(&mut self, object: ObjectId, params: &[ParamData]) -> Result<()> {
        self.clear_dynamic_params(object, true)?;
        for pdata in params {
            match self.param_id(object, &pdata.name) {
                Some(id) => {
                    let ty = self.param(id)?.param_type();
                    if ty != pdata.ty {
                        return Err(ParameterError::InvalidValue {
                            param: self.param_path(id),
                            kind: ty.name(),
                            reason: format!("type changed from {}", pdata.ty.name()),
                        }
                        .into());
                    }
                }
                None => match &pdata.creation {
                    Some(spec) => {
                        self.add_dynamic_param(object, &pdata.name, pdata.ty, spec.clone())?;
                    }
                    None => {
                        warn!(object = %self.long_name(object), param = %pdata.name, "Unknown parameter skipped");
                    }
                },
            }
        }
        Ok(())
    }

    /// Second pass: values and scripts, recursively by member name
    fn apply_values(&mut self, object: ObjectId, data: &ObjectData) -> Result<()> {
        for pdata in &data.parameters {
            if let Some(id) = self.param_id(object, &pdata.name) {
                self.apply_param_values(id, pdata)?;
            }
        }
        for child in data.objects.iter().flatten() {
            if let Some(id) = self.child_by_name(object, &child.name) {
                self.apply_values(id, child)?;
            }
        }
        Ok(())
    }

    fn apply_param_values(&mut self, id: ParamId, pdata: &ParamData) -> Result<()> {
        let ty = self.param(id)?.param_type();
        if ty == ParamType::Callback || !self.is_param_editable(id) {
            return Ok(());
        }
        match &pdata.script {
            Some(code) => self.set_script(id, code, true)?,
            None => self.clear_script(id, false)?,
        }
        self.set_script_enabled(id, pdata.script_enabled)?;
        if ty == ParamType::Message {
            return Ok(());
        }
        let value = match &pdata.value {
            Some(value) => Some(self.param(id)?.coercer().coerce(value.clone())?),
            None => None,
        };
        let param = self.param_mut(id)?;
        match value {
            Some(value) => param.store(value),
            None => param.value = None,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::object::EXEC_MAIN;
    use crate::execution::ExecMode;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("actiongraph_serialize_{}", std::process::id()))
            .join(name)
    }

    fn build(doc: &mut Document, library: &Library) -> ObjectId {
        let root = doc.create_graph("root", None).unwrap();
        let limit = doc
            .add_dynamic_param(root, "limit", ParamType::Int, ParamSpec::new().with_min(0.0).with_default(3))
            .unwrap();
        doc.set_value(limit, 7).unwrap();
        let sub = doc.create_graph("sub", Some(root)).unwrap();
        let a = library.create_action(doc, "NullAction", Some("a"), Some(root)).unwrap();
        let b = library.create_action(doc, "default:NullAction", Some("b"), Some(sub)).unwrap();
        let count = doc.add_dynamic_param(a, "count", ParamType::Int, ParamSpec::new()).unwrap();
        doc.set_script(count, "{__graph__.limit} * 2", false).unwrap();
        let names = doc
            .add_dynamic_param(b, "names", ParamType::List, ParamSpec::new().with_count(None, Some(4)))
            .unwrap();
        doc.set_value(names, vec!["x", "y"]).unwrap();
        let ea = doc.find_param(a, "execution").unwrap();
        let esub = doc.find_param(sub, "execution").unwrap();
        doc.connect(ea, esub, false).unwrap();
        let enabled = doc.find_param(b, "enabled").unwrap();
        doc.set_script(enabled, "{__this__.names} != []", false).unwrap();
        doc.set_script_enabled(enabled, false).unwrap();
        root
    }

    #[test]
    fn test_write_read_round_trip() {
        let library = Library::new();
        let mut doc = Document::new();
        let root = build(&mut doc, &library);
        let path = scratch("round_trip.agraph");
        doc.write(root, &path).unwrap();

        let mut loaded = Document::new();
        let root2 = loaded.create_graph("root", None).unwrap();
        loaded.read(root2, &path, &library).unwrap();
        assert_eq!(doc.data(root).unwrap(), loaded.data(root2).unwrap());

        let a = loaded.get_object(root2, "a").unwrap();
        let count = loaded.find_param(a, "count").unwrap();
        assert_eq!(loaded.value(count).unwrap(), Value::Int(14));
        let b = loaded.get_object(root2, "sub/b").unwrap();
        let enabled = loaded.find_param(b, "enabled").unwrap();
        assert!(!loaded.param(enabled).unwrap().script_enabled());
        assert!(loaded.execute(root2, ExecMode::New, EXEC_MAIN, false).unwrap().is_completed());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_static_outputs_are_not_written() {
        let library = Library::new();
        let mut doc = Document::new();
        let root = build(&mut doc, &library);
        let data = doc.data(root).unwrap();
        assert!(data.parameters.iter().all(|p| p.name != "message"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["referenced"], serde_json::json!(false));
        assert_eq!(json["parameters"][3]["name"], "limit");
        assert_eq!(json["parameters"][3]["value"], 7);
        assert_eq!(json["parameters"][3]["creation"]["default"], 3);
        assert!(json["objects"][1].get("objects").is_none());
    }

    #[test]
    fn test_missing_library_entries_load_as_placeholders() {
        let library = Library::new();
        let json = r#"{
            "name": "root", "source": null, "referenced": false,
            "parameters": [],
            "objects": [
                {"name": "gone", "source": "nope:Missing", "parameters": [
                    {"type": "str", "name": "extra", "script_enabled": false, "value": "kept",
                     "creation": {"dynamic": true}}
                ]},
                {"name": "tpl", "source": "nope:Template", "referenced": true,
                 "parameters": [], "objects": []}
            ]
        }"#;
        let data: ObjectData = serde_json::from_str(json).unwrap();
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        doc.load_data(root, &data, &library).unwrap();

        let gone = doc.get_object(root, "gone").unwrap();
        assert_eq!(doc.object(gone).unwrap().source(), Some("default:NullAction"));
        let extra = doc.find_param(gone, "extra").unwrap();
        assert_eq!(doc.value(extra).unwrap(), Value::from("kept"));
        let tpl = doc.get_object(root, "tpl").unwrap();
        let graph = doc.object(tpl).unwrap().graph().unwrap();
        assert!(!graph.is_referenced());
        assert_eq!(graph.source(), None);
    }

    #[test]
    fn test_extension_is_checked() {
        let library = Library::new();
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let path = scratch("graph.json");
        assert!(doc.write(root, &path).is_err());
        assert!(doc.read(root, &path, &library).is_err());
    }
}
