// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action graph engine.
//!
//! This crate runs graphs of actions that exchange data through typed
//! parameters:
//! - Parameters with type coercion, ranges and container cardinality
//! - Expression scripts connecting parameters across objects
//! - Dependency-ordered execution with breakpoints, stepping and iteration
//! - Graph templates that instances reference from a library
//!
//! ## Architecture
//!
//! A [`Document`] owns every object and parameter of a session and hands
//! out [`ObjectId`] and [`ParamId`] handles. Operations are methods on the
//! document, grouped by concern:
//! - [`values`]: reading and writing parameter values
//! - [`connect`]: scripts and connections
//! - [`action`]: action kinds, dynamic parameters, promotion and copies
//! - [`graph`]: graph membership and queries
//! - [`execution`]: running graphs
//! - [`serialize`]: JSON documents and referenced templates
//!
//! Action kinds and graph templates come from an [`ActionLibrary`].

pub mod action;
pub mod actions;
pub mod config;
pub mod connect;
pub mod document;
pub mod error;
pub mod execution;
pub mod graph;
pub mod id;
pub mod library;
pub mod naming;
pub mod object;
pub mod param;
pub mod script;
pub mod serialize;
pub mod value;
pub mod values;

pub use action::{ActionContext, ActionKind, ParamDecl, ParamFilter};
pub use config::LibraryConfig;
pub use document::Document;
pub use error::{ActionError, ConnectionError, EngineError, ParameterError, Result, ScriptError};
pub use execution::{ExecMode, ExecOutcome};
pub use id::{ObjectId, ParamId};
pub use library::{ActionLibrary, Library};
pub use object::{ActionObject, ExecStatus, EXEC_MAIN};
pub use param::{ParamSpec, ParamType, Parameter};
pub use serialize::{ObjectData, ParamData};
pub use value::{DictKey, Value};
