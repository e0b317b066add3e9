// SPDX-License-Identifier: MIT OR Apache-2.0
//! Actions and graphs stored in a document.

use crate::action::ActionKind;
use crate::id::{ObjectId, ParamId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Exec name every object supports
pub const EXEC_MAIN: &str = "main";

/// Execution status of an object for one exec name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    /// Not executed since the last reset
    #[default]
    None,
    /// Currently executing
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Fail,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecStatus::None => "none",
            ExecStatus::Running => "running",
            ExecStatus::Success => "success",
            ExecStatus::Fail => "fail",
        };
        f.write_str(name)
    }
}

/// Graph-specific state
#[derive(Debug, Clone, Default)]
pub struct GraphData {
    pub(crate) children: Vec<ObjectId>,
    pub(crate) referenced: bool,
    pub(crate) source: Option<String>,
    pub(crate) app: Option<String>,
    pub(crate) doc: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) ui_color: Option<[u8; 3]>,
    pub(crate) ui_icon: Option<String>,
    pub(crate) iteration: usize,
}

impl GraphData {
    /// Member objects in execution tie-break order
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Whether this graph mirrors a library template
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    /// Template source id
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Shared app tag of the members
    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }
}

/// What an object is
#[derive(Clone)]
pub enum ObjectKind {
    /// Leaf action backed by a library prototype
    Action(Rc<dyn ActionKind>),
    /// Container of other objects
    Graph(GraphData),
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Action(kind) => f.debug_tuple("Action").field(&kind.source()).finish(),
            ObjectKind::Graph(data) => f.debug_tuple("Graph").field(data).finish(),
        }
    }
}

/// An action or graph
#[derive(Debug, Clone)]
pub struct ActionObject {
    pub(crate) id: ObjectId,
    pub(crate) name: String,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) params: Vec<ParamId>,
    pub(crate) kind: ObjectKind,
    pub(crate) status: HashMap<String, ExecStatus>,
    pub(crate) force_disabled: bool,
}

impl ActionObject {
    pub(crate) fn new(id: ObjectId, name: String, kind: ObjectKind) -> Self {
        Self {
            id,
            name,
            parent: None,
            params: Vec::new(),
            kind,
            status: HashMap::new(),
            force_disabled: false,
        }
    }

    /// Object id
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Object name, unique within its graph
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning graph
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Parameters in declaration order
    pub fn params(&self) -> &[ParamId] {
        &self.params
    }

    /// Action or graph
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Whether this object is a graph
    pub fn is_graph(&self) -> bool {
        matches!(self.kind, ObjectKind::Graph(_))
    }

    /// Graph state, if this is a graph
    pub fn graph(&self) -> Option<&GraphData> {
        match &self.kind {
            ObjectKind::Graph(data) => Some(data),
            ObjectKind::Action(_) => None,
        }
    }

    pub(crate) fn graph_mut(&mut self) -> Option<&mut GraphData> {
        match &mut self.kind {
            ObjectKind::Graph(data) => Some(data),
            ObjectKind::Action(_) => None,
        }
    }

    /// Library prototype, if this is a leaf action
    pub fn action_kind(&self) -> Option<&Rc<dyn ActionKind>> {
        match &self.kind {
            ObjectKind::Action(kind) => Some(kind),
            ObjectKind::Graph(_) => None,
        }
    }

    /// Library source id (`team:Name`)
    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Action(kind) => Some(kind.source()),
            ObjectKind::Graph(data) => data.source.as_deref(),
        }
    }

    /// App tag of a leaf action, or the shared tag of a graph's members
    pub fn app(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Action(kind) => kind.app(),
            ObjectKind::Graph(data) => data.app.as_deref(),
        }
    }

    /// Whether the object supports an exec name
    pub fn supports_exec_name(&self, exec_name: &str) -> bool {
        exec_name == EXEC_MAIN
            || match &self.kind {
                ObjectKind::Action(kind) => kind.exec_names().iter().any(|name| *name == exec_name),
                ObjectKind::Graph(_) => true,
            }
    }

    /// Disabled for the current pass by an upstream switch
    pub fn is_force_disabled(&self) -> bool {
        self.force_disabled
    }

    /// Stored status of a leaf action
    pub(crate) fn stored_status(&self, exec_name: &str) -> ExecStatus {
        self.status.get(exec_name).copied().unwrap_or_default()
    }
}
