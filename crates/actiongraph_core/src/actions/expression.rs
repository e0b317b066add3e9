// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run a short script over the dynamic parameters of an action.

use crate::action::{ActionContext, ActionKind, ParamDecl};
use crate::error::{ParameterError, Result, ScriptError};
use crate::param::{ParamSpec, ParamType};
use crate::script::parser::parse_body;
use crate::script::{Interpreter, Program};
use crate::value::Value;
use std::fs;
use std::path::Path;

/// Runs `input_script` (or the contents of `input_script_file`) as a
/// function body.
///
/// Dynamic inputs are visible as local variables. After the body runs,
/// every dynamic output is set from the local of the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionAction;

impl ExpressionAction {
    fn body(cx: &ActionContext<'_>) -> Result<Option<String>> {
        let script = cx.value("input_script")?.as_str().unwrap_or_default().to_string();
        let file = cx.value("input_script_file")?.as_str().unwrap_or_default().to_string();
        match (script.is_empty(), file.is_empty()) {
            (true, true) => Ok(None),
            (false, false) => Err(ParameterError::Unsupported(
                "Both input_script and input_script_file are set, use only one of them".into(),
            )
            .into()),
            (false, true) => Ok(Some(script)),
            (true, false) => {
                if !Path::new(&file).is_file() {
                    return Err(ParameterError::InvalidValue {
                        param: "input_script_file".into(),
                        kind: ParamType::File.name(),
                        reason: format!("Script file not found: {file}"),
                    }
                    .into());
                }
                Ok(Some(fs::read_to_string(&file)?))
            }
        }
    }
}

impl ActionKind for ExpressionAction {
    fn source(&self) -> &str {
        "default:ExpressionAction"
    }

    fn doc(&self) -> &str {
        "Evaluates a script with dynamic inputs as variables and writes \
         matching variables back to dynamic outputs"
    }

    fn tags(&self) -> &[&str] {
        &["util"]
    }

    fn params(&self) -> Vec<ParamDecl> {
        vec![
            ParamDecl::new("input_script", ParamType::Str, ParamSpec::new().with_doc("A script to run")),
            ParamDecl::new(
                "input_script_file",
                ParamType::File,
                ParamSpec::new().with_ext(&["agx", "txt"]).with_doc("An external script file to run"),
            ),
        ]
    }

    fn run(&self, cx: &mut ActionContext<'_>) -> Result<()> {
        let Some(code) = Self::body(cx)? else {
            return Ok(());
        };
        let body = parse_body(&code)?;

        let resolve = |token: &str| -> std::result::Result<Value, ScriptError> {
            Err(ScriptError::Eval(format!("references are not available here: {{{token}}}")))
        };
        let mut interp = Interpreter::new(&resolve);
        for id in cx.dynamic_params(false) {
            let param = cx.doc().param(id)?;
            let value = if param.param_type() == ParamType::Iter && param.active_script().is_none() {
                cx.doc().iter_value(id)?
            } else {
                cx.doc().value(id)?
            };
            interp = interp.with_local(param.name(), value);
        }
        interp.run(&Program::Body(body))?;
        let mut locals = interp.into_locals();

        for id in cx.dynamic_params(true) {
            let name = cx.doc().param(id)?.name().to_string();
            if let Some(value) = locals.shift_remove(&name) {
                cx.set_output(&name, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::execution::{ExecMode, ExecOutcome};
    use crate::object::{ExecStatus, EXEC_MAIN};
    use std::rc::Rc;

    #[test]
    fn test_locals_flow_to_outputs() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let expr = doc.create_action(Rc::new(ExpressionAction), "expr", Some(root)).unwrap();
        let count = doc.add_dynamic_param(expr, "count", ParamType::Int, ParamSpec::new()).unwrap();
        doc.set_value(count, 4).unwrap();
        doc.add_dynamic_param(expr, "label", ParamType::Str, ParamSpec::new().output()).unwrap();
        let total = doc.add_dynamic_param(expr, "total", ParamType::Int, ParamSpec::new().output()).unwrap();
        let script = doc.find_param(expr, "input_script").unwrap();
        doc.set_value(script, "total = count * 2\nif total > 5:\n    label = 'big'\nelse:\n    label = 'small'")
            .unwrap();

        let outcome = doc.execute(root, ExecMode::New, EXEC_MAIN, false).unwrap();
        assert_eq!(outcome, ExecOutcome::Completed);
        assert_eq!(doc.value(total).unwrap(), Value::Int(8));
        let label = doc.find_param(expr, "label").unwrap();
        assert_eq!(doc.value(label).unwrap(), Value::from("big"));
    }

    #[test]
    fn test_script_error_fails_action() {
        let mut doc = Document::new();
        let root = doc.create_graph("root", None).unwrap();
        let expr = doc.create_action(Rc::new(ExpressionAction), "expr", Some(root)).unwrap();
        let script = doc.find_param(expr, "input_script").unwrap();
        doc.set_value(script, "x = missing + 1").unwrap();
        let outcome = doc.execute(root, ExecMode::New, EXEC_MAIN, false).unwrap();
        assert_eq!(outcome, ExecOutcome::Failed(expr));
        assert_eq!(doc.status(expr, EXEC_MAIN), ExecStatus::Fail);
    }

    #[test]
    fn test_empty_script_is_a_no_op() {
        let mut doc = Document::new();
        let expr = doc.create_action(Rc::new(ExpressionAction), "expr", None).unwrap();
        let outcome = doc.execute(expr, ExecMode::New, EXEC_MAIN, false).unwrap();
        assert_eq!(outcome, ExecOutcome::Completed);
        assert_eq!(doc.status(expr, EXEC_MAIN), ExecStatus::Success);
    }
}
