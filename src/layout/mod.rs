//! Column layout of a gadget group.
//!
//! Callers build a [`LayoutEngine`] from a group spec and render it into a
//! page container; the implementation lives in the private `core` and `drag`
//! modules.

mod core;
mod drag;

pub use core::{
    CLOSE_CLASS, COLUMN_CLASS, CUSTOMIZABLE_CLASS, Column, Confirm, FRAME_CONTAINER_CLASS,
    FRAME_HEIGHT, HEADER_HEIGHT, LayoutEngine, MINIMIZE_CLASS, MoveOutcome, MoveTicket,
    PORTLET_CLASS, REMOVE_PROMPT, RESTORE_CLASS, RemoveCallback, SPACER_CLASS,
};
pub use drag::PLACEHOLDER_CLASS;
