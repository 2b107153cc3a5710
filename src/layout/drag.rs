//! Drag-reordering of rendered gadgets between columns.
//!
//! While an item is dragged it is detached from its column and a placeholder
//! of the same height marks where it would land. Every column is pinned to
//! the tallest column's height for the duration so empty columns stay valid
//! drop targets; dropping or cancelling restores automatic heights.

use serde_json::json;

use crate::error::{CanvasError, Result};
use crate::logging::{LogLevel, json_kv, json_str};
use crate::page::{Element, HostPage, NodeId};
use crate::transport::{RequestId, Transport};

use super::core::{LayoutEngine, MoveTicket, PORTLET_CLASS};

pub const PLACEHOLDER_CLASS: &str = "ui-sortable-placeholder";

#[derive(Debug, Clone)]
pub(super) struct DragState {
    instance_id: String,
    item: NodeId,
    placeholder: NodeId,
    origin_column: usize,
    origin_index: usize,
}

impl LayoutEngine {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pick up a gadget by its instance id.
    pub fn begin_drag(&mut self, page: &mut HostPage, instance_id: &str) -> Result<()> {
        self.require_customizable("drag")?;
        if self.drag.is_some() {
            return Err(CanvasError::state("a drag is already in progress"));
        }
        let columns = self.mounted_columns()?;
        let item = self.portlet_node(page, instance_id)?;
        let column_node = page
            .document
            .parent(item)
            .ok_or_else(|| CanvasError::state(format!("gadget `{instance_id}` is not placed")))?;
        let origin_column = column_of(&columns, column_node)?;
        let origin_index = gadget_position(page, column_node, item);
        let slot = page.document.index_in_parent(item).unwrap_or(0);

        let height = page.document.height(item);
        page.document.detach(item);
        let placeholder = page.document.create_element(
            Element::new("div")
                .with_class(PLACEHOLDER_CLASS)
                .with_height(height),
        );
        page.document.insert_child(column_node, slot, placeholder)?;
        equalize_columns(page, &columns);

        self.drag = Some(DragState {
            instance_id: instance_id.to_string(),
            item,
            placeholder,
            origin_column,
            origin_index,
        });
        self.log(
            LogLevel::Trace,
            "drag_started",
            [
                json_str("gadget", instance_id),
                json_kv("column", json!(origin_column)),
                json_kv("position", json!(origin_index)),
            ],
        );
        Ok(())
    }

    /// Move the placeholder to `position` in `column`. Positions past the end
    /// land last.
    pub fn drag_over(&mut self, page: &mut HostPage, column: usize, position: usize) -> Result<()> {
        let placeholder = self
            .drag
            .as_ref()
            .map(|drag| drag.placeholder)
            .ok_or_else(|| CanvasError::state("no drag in progress"))?;
        let columns = self.mounted_columns()?;
        let target = columns.get(column).copied().ok_or_else(|| {
            CanvasError::invalid_argument(format!(
                "column {column} is outside a {}-column group",
                columns.len()
            ))
        })?;

        page.document.insert_child(target, position, placeholder)?;
        equalize_columns(page, &columns);
        Ok(())
    }

    /// Put the dragged gadget where the placeholder is and persist the new
    /// position. Returns `None` when the gadget ended where it started.
    pub fn drop_gadget(
        &mut self,
        page: &mut HostPage,
        transport: &mut dyn Transport,
        request_id: RequestId,
    ) -> Result<Option<MoveTicket>> {
        let drag = self
            .drag
            .take()
            .ok_or_else(|| CanvasError::state("no drag in progress"))?;
        let columns = self.mounted_columns()?;
        // Columns are unpinned even when the move below fails.
        release_columns(page, &columns);

        let target = page
            .document
            .parent(drag.placeholder)
            .ok_or_else(|| CanvasError::ElementNotFound(PLACEHOLDER_CLASS.to_string()))?;
        let slot = page.document.index_in_parent(drag.placeholder).unwrap_or(0);
        page.document.remove(drag.placeholder);
        page.document.insert_child(target, slot, drag.item)?;

        let new_column = stored_column_number(page, target)
            .map_or_else(|| column_of(&columns, target), Ok)?;
        let new_position = gadget_position(page, target, drag.item);
        self.sync_positions(page, &columns);

        if (new_column, new_position) == (drag.origin_column, drag.origin_index) {
            self.log(
                LogLevel::Trace,
                "drag_unchanged",
                [json_str("gadget", drag.instance_id.as_str())],
            );
            return Ok(None);
        }
        self.move_gadget(transport, request_id, &drag.instance_id, new_column, new_position)
            .map(Some)
    }

    /// Abandon the drag and put the gadget back where it was.
    pub fn cancel_drag(&mut self, page: &mut HostPage) -> Result<()> {
        let drag = self
            .drag
            .take()
            .ok_or_else(|| CanvasError::state("no drag in progress"))?;
        let columns = self.mounted_columns()?;
        release_columns(page, &columns);

        page.document.remove(drag.placeholder);
        let origin = columns
            .get(drag.origin_column)
            .copied()
            .ok_or_else(|| CanvasError::state("origin column vanished"))?;
        let slot = nth_gadget_slot(page, origin, drag.origin_index);
        page.document.insert_child(origin, slot, drag.item)?;
        Ok(())
    }

    fn mounted_columns(&self) -> Result<Vec<NodeId>> {
        self.mount
            .as_ref()
            .map(|mount| mount.columns.clone())
            .ok_or_else(|| CanvasError::state("layout has not been rendered"))
    }

    /// Read every instance's column and order back from the page.
    fn sync_positions(&mut self, page: &HostPage, columns: &[NodeId]) {
        for (column, node) in columns.iter().enumerate() {
            let gadgets = gadget_children(page, *node);
            for (order, child) in gadgets.into_iter().enumerate() {
                let Some(element_id) = page.document.get(child).and_then(|e| e.id.as_deref()) else {
                    continue;
                };
                if let Some(instance) = self
                    .instances
                    .iter_mut()
                    .find(|g| g.gadget_element_id() == element_id)
                {
                    instance.column = column;
                    instance.order = order;
                }
            }
        }
    }
}

fn column_of(columns: &[NodeId], node: NodeId) -> Result<usize> {
    columns
        .iter()
        .position(|column| *column == node)
        .ok_or_else(|| CanvasError::state("element is not one of the group's columns"))
}

fn stored_column_number(page: &HostPage, column: NodeId) -> Option<usize> {
    page.document
        .get(column)
        .and_then(|element| element.attr("data-column-number"))
        .and_then(|raw| raw.parse().ok())
}

fn gadget_children(page: &HostPage, column: NodeId) -> Vec<NodeId> {
    page.document
        .children(column)
        .iter()
        .copied()
        .filter(|child| {
            page.document
                .get(*child)
                .is_some_and(|element| element.has_class(PORTLET_CLASS))
        })
        .collect()
}

/// 0-based index of `item` among the gadgets of `column`.
fn gadget_position(page: &HostPage, column: NodeId, item: NodeId) -> usize {
    gadget_children(page, column)
        .iter()
        .position(|child| *child == item)
        .unwrap_or(0)
}

/// Child slot in front of the `n`th gadget, or the end of the column.
fn nth_gadget_slot(page: &HostPage, column: NodeId, n: usize) -> usize {
    gadget_children(page, column)
        .get(n)
        .and_then(|gadget| page.document.index_in_parent(*gadget))
        .unwrap_or_else(|| page.document.children(column).len())
}

fn equalize_columns(page: &mut HostPage, columns: &[NodeId]) {
    release_columns(page, columns);
    let tallest = columns
        .iter()
        .map(|column| page.document.height(*column))
        .max()
        .unwrap_or(0);
    for column in columns {
        if let Some(element) = page.document.get_mut(*column) {
            element.fixed_height = Some(tallest);
        }
    }
}

fn release_columns(page: &mut HostPage, columns: &[NodeId]) {
    for column in columns {
        if let Some(element) = page.document.get_mut(*column) {
            element.fixed_height = None;
        }
    }
}
