// SPDX-License-Identifier: MIT OR Apache-2.0
//! Select one of several inputs by index.

use crate::action::{ActionContext, ActionKind, ParamDecl};
use crate::document::Document;
use crate::error::{ActionError, Result};
use crate::id::ObjectId;
use crate::param::{ParamSpec, ParamType};
use crate::value::Value;
use std::collections::HashSet;
use tracing::debug;

/// Copies `inputs[selector]` to `output`.
///
/// When the inputs are `message` parameters of sibling objects, the
/// unselected objects and the upstream objects feeding only them are
/// skipped for the pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchAction;

impl SwitchAction {
    fn inputs(cx: &ActionContext<'_>) -> Result<(usize, Vec<Value>)> {
        let selector = cx.value("selector")?.as_i64().unwrap_or_default();
        let inputs = cx.value("inputs")?.as_list().map(<[Value]>::to_vec).unwrap_or_default();
        Ok((usize::try_from(selector).unwrap_or(usize::MAX), inputs))
    }

    fn out_of_range(cx: &ActionContext<'_>, selector: usize) -> ActionError {
        ActionError::Failed(format!(
            "Selector value {selector} out of range on {}",
            cx.doc().long_name(cx.object())
        ))
    }
}

impl ActionKind for SwitchAction {
    fn source(&self) -> &str {
        "default:SwitchAction"
    }

    fn doc(&self) -> &str {
        "Switches a list of input values based on a selector index"
    }

    fn tags(&self) -> &[&str] {
        &["util"]
    }

    fn params(&self) -> Vec<ParamDecl> {
        vec![
            ParamDecl::new(
                "selector",
                ParamType::Int,
                ParamSpec::new().with_min(0.0).with_doc("The selector index"),
            ),
            ParamDecl::new("inputs", ParamType::List, ParamSpec::new().with_doc("Values to switch")),
            ParamDecl::new(
                "output",
                ParamType::Opaque,
                ParamSpec::new().output().with_doc("The selected input"),
            ),
        ]
    }

    fn run(&self, cx: &mut ActionContext<'_>) -> Result<()> {
        let (selector, inputs) = Self::inputs(cx)?;
        let Some(value) = inputs.into_iter().nth(selector) else {
            return Err(Self::out_of_range(cx, selector).into());
        };
        cx.set_output("output", value)
    }

    fn disable_unselected(&self, cx: &mut ActionContext<'_>) -> Result<()> {
        let (selector, inputs) = Self::inputs(cx)?;
        if inputs.is_empty() {
            return Ok(());
        }
        if selector >= inputs.len() {
            return Err(Self::out_of_range(cx, selector).into());
        }
        let switch = cx.object();
        let graph = cx.doc().parent(switch);
        let mut skipped = HashSet::new();
        for (i, input) in inputs.iter().enumerate() {
            let Some(object) = input.as_object().filter(|_| i != selector) else {
                continue;
            };
            if object != switch && cx.doc().parent(object) == graph {
                skip_object(cx.doc_mut(), object, &mut skipped)?;
            }
        }
        Ok(())
    }
}

/// Force-disable `object`, then every upstream object whose outputs all
/// lead to skipped objects
fn skip_object(doc: &mut Document, object: ObjectId, skipped: &mut HashSet<ObjectId>) -> Result<()> {
    doc.object_mut(object)?.force_disabled = true;
    skipped.insert(object);
    debug!(object = %doc.long_name(object), "Skipping unselected branch");
    for upstream in doc.input_objects(object) {
        if skipped.contains(&upstream) {
            continue;
        }
        if doc.output_objects(upstream).iter().all(|o| skipped.contains(o)) {
            skip_object(doc, upstream, skipped)?;
        }
    }
    Ok(())
}
