// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution: ordering, breakpoints, stepping and iteration.
//!
//! A graph runs its members in dependency order. Each member's status is
//! tracked per exec name, so a halted run can continue with
//! [`ExecMode::Resume`] or advance one object at a time with
//! [`ExecMode::Step`]. Iterator parameters on a graph repeat the whole pass
//! once per element.

use crate::action::ActionContext;
use crate::document::Document;
use crate::error::{ActionError, Result};
use crate::id::{ObjectId, ParamId};
use crate::object::{ActionObject, ExecStatus, EXEC_MAIN};
use crate::param::{ParamType, PARAM_BREAK_POINT, PARAM_ENABLED, PARAM_EXECUTION};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// How [`Document::execute`] treats previous results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Reset every status and run from the start
    #[default]
    New,
    /// Skip objects that already succeeded
    Resume,
    /// Run the next pending object and stop
    Step,
}

impl FromStr for ExecMode {
    type Err = ActionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "new" => Ok(ExecMode::New),
            "resume" => Ok(ExecMode::Resume),
            "step" => Ok(ExecMode::Step),
            other => Err(ActionError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecMode::New => "new",
            ExecMode::Resume => "resume",
            ExecMode::Step => "step",
        };
        f.write_str(name)
    }
}

/// Where an execution stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Every pending object ran
    Completed,
    /// Halted before an object with a breakpoint
    Breakpoint(ObjectId),
    /// One object ran in step mode
    Stepped,
    /// An action failed
    Failed(ObjectId),
}

impl ExecOutcome {
    /// Whether the run reached the end
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecOutcome::Completed)
    }
}

impl Document {
    /// Execute an action or graph
    pub fn execute(&mut self, object: ObjectId, mode: ExecMode, exec_name: &str, no_break: bool) -> Result<ExecOutcome> {
        if self.executing.is_empty() {
            self.resolve_scripts();
        }
        let obj = self.object(object)?;
        info!(object = %self.long_name(object), %mode, exec_name, "Executing");
        if !obj.is_graph() {
            if mode == ExecMode::Resume && obj.stored_status(exec_name) == ExecStatus::Success {
                return Ok(ExecOutcome::Completed);
            }
            return Ok(match self.run_action(object, exec_name)? {
                ExecStatus::Fail => ExecOutcome::Failed(object),
                _ => ExecOutcome::Completed,
            });
        }
        self.execute_graph(object, mode, exec_name, no_break)
    }

    fn execute_graph(&mut self, graph: ObjectId, mode: ExecMode, exec_name: &str, no_break: bool) -> Result<ExecOutcome> {
        if self.executing.contains(&graph) {
            return Err(ActionError::Executing(self.long_name(graph)).into());
        }
        self.executing.push(graph);
        let result = self.run_graph(graph, mode, exec_name, no_break);
        self.executing.retain(|g| *g != graph);
        result
    }

    fn run_graph(&mut self, graph: ObjectId, mode: ExecMode, exec_name: &str, no_break: bool) -> Result<ExecOutcome> {
        let children = self.iter_objects(graph, false)?;
        for child in &children {
            self.object_mut(*child)?.force_disabled = false;
        }
        for child in &children {
            let Some(kind) = self.object(*child)?.action_kind().cloned() else {
                continue;
            };
            let mut cx = ActionContext::new(self, *child, exec_name);
            kind.disable_unselected(&mut cx)?;
        }

        if mode == ExecMode::New {
            self.reset_status(graph, exec_name)?;
        }

        let order = self.sorted_objects(graph, true)?;
        let iter_params: Vec<ParamId> = self
            .object(graph)?
            .params
            .iter()
            .copied()
            .filter(|p| self.params.get(p).is_some_and(|p| p.param_type() == ParamType::Iter))
            .collect();
        let count = self.iter_count(graph)?;
        let start = self.object(graph)?.graph().map_or(0, |g| g.iteration);
        let mut is_first = true;

        for i in start..count {
            if let Some(data) = self.object_mut(graph)?.graph_mut() {
                data.iteration = i;
            }
            for param in &iter_params {
                self.set_iter_index(*param, i)?;
            }
            if i > start {
                for child in &children {
                    self.reset_status(*child, exec_name)?;
                }
            }
            debug!(graph = %self.long_name(graph), iteration = i, count, "Graph pass");

            for object in &order {
                let obj = self.object(*object)?;
                if !obj.supports_exec_name(exec_name) {
                    continue;
                }
                if mode != ExecMode::New && self.status(*object, exec_name) == ExecStatus::Success {
                    continue;
                }
                let break_point = self.flag(*object, PARAM_BREAK_POINT, false);
                if !no_break && break_point && mode != ExecMode::Step && (mode == ExecMode::New || !is_first) {
                    warn!(object = %self.long_name(*object), "Breakpoint");
                    return Ok(ExecOutcome::Breakpoint(*object));
                }
                is_first = false;

                if self.object(*object)?.is_graph() {
                    match self.execute_graph(*object, mode, exec_name, no_break)? {
                        ExecOutcome::Completed => {}
                        other => return Ok(other),
                    }
                } else if self.run_action(*object, exec_name)? == ExecStatus::Fail {
                    return Ok(ExecOutcome::Failed(*object));
                }
                if mode == ExecMode::Step {
                    return Ok(ExecOutcome::Stepped);
                }
            }
        }
        info!(graph = %self.long_name(graph), "Graph completed");
        Ok(ExecOutcome::Completed)
    }

    /// Run one leaf action and record its status
    fn run_action(&mut self, object: ObjectId, exec_name: &str) -> Result<ExecStatus> {
        let obj = self.object(object)?;
        if !obj.supports_exec_name(exec_name) {
            return Ok(obj.stored_status(exec_name));
        }
        let Some(kind) = obj.action_kind().cloned() else {
            return Err(ActionError::Failed(format!("{} is not an action", self.long_name(object))).into());
        };
        self.reset_status(object, exec_name)?;
        if !self.is_enabled(object) {
            debug!(object = %self.long_name(object), "Skipping disabled action");
            return Ok(ExecStatus::None);
        }

        self.set_status(object, exec_name, ExecStatus::Running)?;
        info!(action = %self.long_name(object), exec_name, "Running");
        let result = {
            let mut cx = ActionContext::new(self, object, exec_name);
            kind.run(&mut cx)
        };
        let status = match result {
            Ok(()) => {
                info!(action = %self.long_name(object), "Success");
                ExecStatus::Success
            }
            Err(err) => {
                error!(action = %self.long_name(object), "Failed: {err}");
                ExecStatus::Fail
            }
        };
        self.set_status(object, exec_name, status)?;
        Ok(status)
    }

    fn set_status(&mut self, object: ObjectId, exec_name: &str, status: ExecStatus) -> Result<()> {
        self.object_mut(object)?.status.insert(exec_name.to_string(), status);
        Ok(())
    }

    /// Status of an object. A graph is running or failed when any member
    /// is, and succeeded when all of its enabled members did.
    pub fn status(&self, object: ObjectId, exec_name: &str) -> ExecStatus {
        let Some(obj) = self.objects.get(&object) else {
            return ExecStatus::None;
        };
        if !obj.is_graph() {
            return obj.stored_status(exec_name);
        }
        let statuses: Vec<ExecStatus> = self
            .sorted_objects(object, true)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| self.objects.get(m).is_some_and(|o| o.supports_exec_name(exec_name)))
            .map(|m| self.status(m, exec_name))
            .collect();
        if statuses.contains(&ExecStatus::Running) {
            ExecStatus::Running
        } else if statuses.contains(&ExecStatus::Fail) {
            ExecStatus::Fail
        } else if !statuses.is_empty() && statuses.iter().all(|s| *s == ExecStatus::Success) {
            ExecStatus::Success
        } else {
            ExecStatus::None
        }
    }

    /// Forget the status of an object and its members. Resetting `main`
    /// also clears the outputs written by actions.
    pub fn reset_status(&mut self, object: ObjectId, exec_name: &str) -> Result<()> {
        let obj = self.object_mut(object)?;
        obj.status.remove(exec_name);
        if let Some(data) = obj.graph_mut() {
            data.iteration = 0;
            for child in data.children.clone() {
                self.reset_status(child, exec_name)?;
            }
            return Ok(());
        }
        if exec_name == EXEC_MAIN {
            let params = obj.params.clone();
            for id in params {
                if let Some(param) = self.params.get_mut(&id).filter(|p| p.is_output()) {
                    param.value = None;
                }
            }
        }
        Ok(())
    }

    /// Members of a graph in execution order.
    ///
    /// Inputs come before the objects they feed; unrelated objects keep
    /// their member order. With `skip_disabled`, disabled objects and
    /// everything chained after them through `execution` are left out.
    pub fn sorted_objects(&self, graph: ObjectId, skip_disabled: bool) -> Result<Vec<ObjectId>> {
        let children = self.iter_objects(graph, false)?;
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(children.len());
        for child in children {
            self.visit_inputs(child, &mut visited, &mut order);
        }
        if !skip_disabled {
            return Ok(order);
        }

        let mut skipped = HashSet::new();
        for object in &order {
            let chained_after_skipped = self
                .param_id(*object, PARAM_EXECUTION)
                .and_then(|p| self.params.get(&p))
                .and_then(|p| p.active_script())
                .is_some_and(|s| {
                    s.input_params()
                        .filter_map(|src| self.params.get(&src))
                        .any(|src| skipped.contains(&src.owner))
                });
            if chained_after_skipped || !self.is_enabled(*object) {
                skipped.insert(*object);
            }
        }
        Ok(order.into_iter().filter(|o| !skipped.contains(o)).collect())
    }

    fn visit_inputs(&self, object: ObjectId, visited: &mut HashSet<ObjectId>, order: &mut Vec<ObjectId>) {
        if !visited.insert(object) {
            return;
        }
        for input in self.input_objects(object) {
            self.visit_inputs(input, visited, order);
        }
        order.push(object);
    }

    fn is_enabled(&self, object: ObjectId) -> bool {
        !self.objects.get(&object).is_some_and(ActionObject::is_force_disabled)
            && self.flag(object, PARAM_ENABLED, true)
    }

    fn flag(&self, object: ObjectId, name: &str, default: bool) -> bool {
        let Some(id) = self.param_id(object, name) else {
            return default;
        };
        match self.value(id) {
            Ok(value) => value.truthy(),
            Err(err) => {
                warn!(param = %self.param_path(id), "Can't evaluate flag: {err}");
                default
            }
        }
    }
}
