// SPDX-License-Identifier: MIT OR Apache-2.0
//! An action that does nothing.

use crate::action::{ActionContext, ActionKind};
use crate::error::Result;

/// Does nothing when run. Also stands in for actions missing from the
/// library when a document is loaded, and can hold user data in dynamic
/// parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAction;

impl ActionKind for NullAction {
    fn source(&self) -> &str {
        "default:NullAction"
    }

    fn doc(&self) -> &str {
        "An empty action that does nothing when executed"
    }

    fn tags(&self) -> &[&str] {
        &["util"]
    }

    fn run(&self, _cx: &mut ActionContext<'_>) -> Result<()> {
        Ok(())
    }
}
