// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builtin actions of the `default` team.

mod expression;
mod null;
mod switch;

pub use expression::ExpressionAction;
pub use null::NullAction;
pub use switch::SwitchAction;

use crate::action::ActionKind;
use std::rc::Rc;

/// Team every library starts with
pub const DEFAULT_TEAM: &str = "default";

/// Prototypes of all builtin actions
pub fn builtin_actions() -> Vec<Rc<dyn ActionKind>> {
    vec![Rc::new(NullAction), Rc::new(SwitchAction), Rc::new(ExpressionAction)]
}
