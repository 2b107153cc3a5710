//! In-memory model of the host page: its element tree and top-level location.
//!
//! The layout engine writes gadget markup here and the bridge applies widget
//! requests against it. An embedding inside a real browser mirrors the same
//! operations onto its document.

mod core;
mod location;

pub use core::{Document, Element, NodeId};
pub use location::Location;

use crate::error::{CanvasError, Result};

#[derive(Debug, Clone)]
pub struct HostPage {
    pub document: Document,
    pub location: Location,
    rpc_bound: bool,
}

impl HostPage {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            document: Document::new(),
            location: Location::new(href),
            rpc_bound: false,
        }
    }

    /// Create an empty `div` with the given id under the body, the usual
    /// mount point for a gadget group.
    pub fn add_container(&mut self, id: &str) -> Result<NodeId> {
        if self.document.element_by_id(id).is_some() {
            return Err(CanvasError::invalid_argument(format!(
                "element `{id}` already exists"
            )));
        }
        let node = self.document.create_element(Element::new("div").with_id(id));
        self.document.append_child(self.document.body(), node)?;
        Ok(node)
    }

    /// Claim the page's single RPC dispatch slot.
    pub(crate) fn bind_rpc(&mut self) -> Result<()> {
        if self.rpc_bound {
            return Err(CanvasError::state(
                "an rpc dispatch table is already bound to this page",
            ));
        }
        self.rpc_bound = true;
        Ok(())
    }

    pub fn rpc_bound(&self) -> bool {
        self.rpc_bound
    }
}
