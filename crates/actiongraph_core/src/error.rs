// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types shared by the engine.
//!
//! Each concern has its own error enum; [`EngineError`] wraps all of them so
//! operations that touch several concerns can use `?` freely.

use thiserror::Error;

/// Invalid parameter mutation or lookup
#[derive(Debug, Error)]
pub enum ParameterError {
    /// Parameter not found on an object
    #[error("Parameter not found: {0}")]
    NotFound(String),

    /// A value could not be coerced into the parameter type
    #[error("Invalid value for {param} ({kind}): {reason}")]
    InvalidValue {
        /// Parameter name
        param: String,
        /// Parameter type name
        kind: &'static str,
        /// What went wrong
        reason: String,
    },

    /// The parameter is read-only
    #[error("Parameter is not editable: {0}")]
    NotEditable(String),

    /// The parameter belongs to a member of a referenced graph
    #[error("Parameter belongs to a referenced graph: {0}")]
    Referenced(String),

    /// Unknown enum member
    #[error("Invalid enum item \"{item}\" on {param}, expected one of {items:?}")]
    InvalidEnumItem {
        /// Parameter name
        param: String,
        /// Requested item
        item: String,
        /// Valid items
        items: Vec<String>,
    },

    /// List or dict size outside the allowed range
    #[error("Item count {count} out of range on {param} (min {min:?}, max {max:?})")]
    Cardinality {
        /// Parameter name
        param: String,
        /// Resulting count
        count: usize,
        /// Minimum count
        min: Option<usize>,
        /// Maximum count
        max: Option<usize>,
    },

    /// Operation not allowed for this parameter kind
    #[error("{0}")]
    Unsupported(String),

    /// Static parameters cannot be removed or renamed
    #[error("Parameter is not dynamic: {0}")]
    NotDynamic(String),

    /// Unknown parameter type name
    #[error("Unknown parameter type: {0}")]
    UnknownType(String),
}

/// Invalid connection between two parameters
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The source value cannot be coerced into the target type
    #[error("Incompatible parameters: {source_param} -> {target}")]
    Incompatible {
        /// Source parameter
        source_param: String,
        /// Target parameter
        target: String,
    },

    /// The target already has an input connection
    #[error("Parameter already connected: {0}")]
    AlreadyConnected(String),

    /// Callback parameters cannot be connected
    #[error("Callback parameters cannot be connected: {0}")]
    Callback(String),

    /// Outputs of leaf actions are written by the action itself
    #[error("Cannot drive an output parameter of an action: {0}")]
    OutputTarget(String),

    /// Endpoints live in different graphs
    #[error("Parameters are not in the same graph: {source_param} -> {target}")]
    CrossGraph {
        /// Source parameter
        source_param: String,
        /// Target parameter
        target: String,
    },

    /// The connection would close a loop between objects
    #[error("Connection would create a cycle: {source_param} -> {target}")]
    Cycle {
        /// Source parameter
        source_param: String,
        /// Target parameter
        target: String,
    },

    /// `execution` parameters may only be chained to each other
    #[error("Parameter \"execution\" can only be chained together: {0}")]
    ExecutionChain(String),

    /// Object still has downstream connections
    #[error("{0} has output connections")]
    HasOutputs(String),
}

/// Expression parse, resolve, or evaluation failure
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Syntax error
    #[error("Syntax error at {pos}: {message}")]
    Syntax {
        /// Byte offset in the source
        pos: usize,
        /// What went wrong
        message: String,
    },

    /// A `{reference}` token did not resolve to a live parameter
    #[error("Parameter reference not found on {param}: {token}")]
    Unresolved {
        /// Driven parameter
        param: String,
        /// Token text
        token: String,
    },

    /// Runtime evaluation failure
    #[error("Script evaluation failed: {0}")]
    Eval(String),

    /// The script references itself through a chain of parameters
    #[error("Script recursion limit reached on {0}")]
    Recursion(String),
}

/// Structural or execution error on actions and graphs
#[derive(Debug, Error)]
pub enum ActionError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Structural mutation of a referenced graph
    #[error("Can't modify referenced graph: {0}")]
    Referenced(String),

    /// Structural mutation while the graph is executing
    #[error("Can't modify graph while it is executing: {0}")]
    Executing(String),

    /// Name is empty after sanitizing
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Unknown execution mode
    #[error("Invalid execution mode: {0}")]
    InvalidMode(String),

    /// Library entry not found
    #[error("Not found in library: {0}")]
    Library(String),

    /// Object app tags conflict
    #[error("Target app conflicts: {graph} ({graph_app}) - {object} ({object_app})")]
    AppConflict {
        /// Graph name
        graph: String,
        /// Graph app tag
        graph_app: String,
        /// Object name
        object: String,
        /// Object app tag
        object_app: String,
    },

    /// The object is not a graph
    #[error("Not an action graph: {0}")]
    NotGraph(String),

    /// The object is not inside a graph
    #[error("{0} is not in a graph")]
    NoGraph(String),

    /// The file is not an action graph document
    #[error("Not an action graph file: {0}")]
    InvalidFile(String),

    /// Failure raised by an action's own behavior
    #[error("Action failed: {0}")]
    Failed(String),
}

/// Any engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Parameter error
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Script error
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Action error
    #[error(transparent)]
    Action(#[from] ActionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON config error
    #[error("Config error: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] ron::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
