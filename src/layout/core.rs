use std::collections::HashMap;

use serde_json::json;

use crate::bridge::{ContainerBridge, escape_title};
use crate::config::CanvasConfig;
use crate::error::{CanvasError, Result};
use crate::gadget::{GadgetInstance, GroupSpec};
use crate::logging::{LAYOUT_TARGET, LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::page::{Element, HostPage, NodeId};
use crate::transport::{BackendRequest, RequestId, Transport};

use super::drag::DragState;

pub const PORTLET_CLASS: &str = "gadgetPortlet";
pub const COLUMN_CLASS: &str = "canvasColumn";
pub const SPACER_CLASS: &str = "columnSpacer";
pub const CUSTOMIZABLE_CLASS: &str = "customizable";
pub const MINIMIZE_CLASS: &str = "minimizeButton";
pub const RESTORE_CLASS: &str = "restoreButton";
pub const CLOSE_CLASS: &str = "closeButton";
pub const FRAME_CONTAINER_CLASS: &str = "iframeContainer";
pub const REMOVE_PROMPT: &str = "Remove this gadget ?";

pub const HEADER_HEIGHT: u32 = 24;
pub const FRAME_HEIGHT: u32 = 150;

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

/// Runs against the page once the backend acknowledged a removal.
pub type RemoveCallback = Box<dyn FnOnce(&mut HostPage)>;

/// One column of the group. Its index never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    index: usize,
    width_percent: f64,
    spacer: bool,
}

impl Column {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width_percent(&self) -> f64 {
        self.width_percent
    }

    /// Every column but the last leaves a gap after itself.
    pub fn is_spacer(&self) -> bool {
        self.spacer
    }
}

/// Persistence request issued for a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTicket {
    pub request_id: RequestId,
    pub version: u64,
    pub instance_id: String,
    pub column: usize,
    pub order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Applied { version: u64 },
    /// A newer move was already acknowledged.
    Stale { version: u64, newest: u64 },
}

#[derive(Debug, Clone)]
pub(super) struct Mount {
    pub(super) container: NodeId,
    pub(super) columns: Vec<NodeId>,
}

struct PendingRemove {
    instance_id: String,
    callback: RemoveCallback,
}

/// Owns a gadget group's columns and instances, renders them into a
/// container and keeps positions in sync with the backend.
pub struct LayoutEngine {
    config: CanvasConfig,
    logger: Logger,
    group_name: String,
    customizable: bool,
    pub(super) instances: Vec<GadgetInstance>,
    columns: Vec<Column>,
    pub(super) mount: Option<Mount>,
    pub(super) drag: Option<DragState>,
    issued_version: u64,
    applied_version: u64,
    pending_moves: HashMap<RequestId, u64>,
    pending_removes: HashMap<RequestId, PendingRemove>,
}

impl LayoutEngine {
    pub fn build(group: &GroupSpec, config: CanvasConfig) -> Result<Self> {
        let count = group.number_of_columns;
        if count == 0 {
            return Err(CanvasError::precondition(
                "a gadget group needs at least one column",
            ));
        }

        let width = (96.0 - count as f64) / count as f64;
        let columns = (0..count)
            .map(|index| Column {
                index,
                width_percent: width,
                spacer: index + 1 < count,
            })
            .collect();

        let context = group.context();
        let mut instances = Vec::with_capacity(group.gadgets.len());
        for spec in &group.gadgets {
            if spec.column >= count {
                return Err(CanvasError::precondition(format!(
                    "gadget `{}` targets column {} of a {}-column group",
                    spec.id, spec.column, count
                )));
            }
            instances.push(GadgetInstance::from_spec(spec, &context, &config)?);
        }

        Ok(Self {
            config,
            logger: Logger::disabled(),
            group_name: group.name.clone(),
            customizable: group.customizable,
            instances,
            columns,
            mount: None,
            drag: None,
            issued_version: 0,
            applied_version: 0,
            pending_moves: HashMap::new(),
            pending_removes: HashMap::new(),
        })
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn is_customizable(&self) -> bool {
        self.customizable
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn instances(&self) -> &[GadgetInstance] {
        &self.instances
    }

    pub fn instance(&self, instance_id: &str) -> Option<&GadgetInstance> {
        self.instances.iter().find(|g| g.id() == instance_id)
    }

    /// Instances placed in `column`, top to bottom.
    pub fn column_members(&self, column: usize) -> Vec<&GadgetInstance> {
        let mut members: Vec<_> = self
            .instances
            .iter()
            .filter(|g| g.column == column)
            .collect();
        members.sort_by_key(|g| g.order);
        members
    }

    pub fn is_rendered(&self) -> bool {
        self.mount.is_some()
    }

    /// Latest layout version issued to the backend.
    pub fn issued_version(&self) -> u64 {
        self.issued_version
    }

    /// Newest version the backend acknowledged.
    pub fn applied_version(&self) -> u64 {
        self.applied_version
    }

    /// Write the group into the element `container_id`, one frame per
    /// instance, and register every frame with `rpc` when given.
    pub fn render(
        &mut self,
        page: &mut HostPage,
        container_id: &str,
        mut rpc: Option<&mut ContainerBridge>,
    ) -> Result<()> {
        let container = page
            .document
            .element_by_id(container_id)
            .ok_or_else(|| CanvasError::ElementNotFound(container_id.to_string()))?;

        self.instances.sort_by_key(|g| (g.column, g.order));

        let mut column_nodes = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut element = Element::new("div")
                .with_class(COLUMN_CLASS)
                .with_attr("style", format!("width:{}%", column.width_percent))
                .with_attr("data-column-number", column.index.to_string());
            if column.spacer {
                element.add_class(SPACER_CLASS);
            }
            column_nodes.push(page.document.create_element(element));
        }

        for instance in &self.instances {
            let column = column_nodes.get(instance.column).copied().ok_or_else(|| {
                CanvasError::precondition(format!(
                    "gadget `{}` sits in missing column {}",
                    instance.id(),
                    instance.column
                ))
            })?;
            let portlet = self.render_gadget(page, instance)?;
            page.document.append_child(column, portlet)?;
        }

        if self.customizable {
            if let Some(element) = page.document.get_mut(container) {
                element.add_class(CUSTOMIZABLE_CLASS);
            }
        }
        for column in &column_nodes {
            page.document.append_child(container, *column)?;
        }
        let clear = page.document.create_element(
            Element::new("div")
                .with_attr("style", "clear:both;")
                .with_text("<!-- empty div -->"),
        );
        page.document.append_child(container, clear)?;

        if let Some(bridge) = rpc.as_deref_mut() {
            for instance in &self.instances {
                bridge.setup_receiver(instance.application_id());
            }
        }

        self.mount = Some(Mount {
            container,
            columns: column_nodes,
        });
        self.log(
            LogLevel::Info,
            "group_rendered",
            [
                json_str("group", self.group_name.as_str()),
                json_str("container", container_id),
                json_kv("gadgets", json!(self.instances.len())),
                json_kv("columns", json!(self.columns.len())),
            ],
        );
        Ok(())
    }

    fn render_gadget(&self, page: &mut HostPage, instance: &GadgetInstance) -> Result<NodeId> {
        let doc = &mut page.document;
        let application_id = instance.application_id();

        let mut portlet = Element::new("div")
            .with_id(instance.gadget_element_id())
            .with_class(PORTLET_CLASS);
        let title_class = instance.title_class();
        if !title_class.is_empty() {
            portlet.add_class(title_class);
        }
        let portlet = doc.create_element(portlet);

        let title_bar = doc.create_element(Element::new("div").with_class("titleBar"));
        if self.customizable {
            let buttons = doc.create_element(Element::new("div"));
            let minimize =
                doc.create_element(Element::new("a").with_class(MINIMIZE_CLASS).with_text("^"));
            let close =
                doc.create_element(Element::new("a").with_class(CLOSE_CLASS).with_text("X"));
            doc.append_child(buttons, minimize)?;
            doc.append_child(buttons, close)?;
            doc.append_child(title_bar, buttons)?;
        }
        if let Some(icon) = instance.icon() {
            let icon_box = doc.create_element(Element::new("div").with_class("icon"));
            let image = doc.create_element(
                Element::new("img")
                    .with_attr("width", "16")
                    .with_attr("height", "16")
                    .with_attr("src", icon),
            );
            doc.append_child(icon_box, image)?;
            doc.append_child(title_bar, icon_box)?;
        }
        let header = doc.create_element(
            Element::new("h2")
                .with_id(instance.header_element_id())
                .with_text(escape_title(instance.title()))
                .with_height(HEADER_HEIGHT),
        );
        doc.append_child(title_bar, header)?;

        let frame_box = doc.create_element(Element::new("div").with_class(FRAME_CONTAINER_CLASS));
        let frame = doc.create_element(
            Element::new("iframe")
                .with_id(application_id)
                .with_attr("src", instance.sandbox_url(&self.config))
                .with_attr("name", application_id)
                .with_attr("frameborder", "0")
                .with_height(FRAME_HEIGHT),
        );
        doc.append_child(frame_box, frame)?;

        doc.append_child(portlet, title_bar)?;
        doc.append_child(portlet, frame_box)?;
        Ok(portlet)
    }

    /// Persist a new position. The in-memory instance moves right away; the
    /// request carries the next layout version.
    pub fn move_gadget(
        &mut self,
        transport: &mut dyn Transport,
        request_id: RequestId,
        instance_id: &str,
        column: usize,
        order: usize,
    ) -> Result<MoveTicket> {
        if column >= self.columns.len() {
            return Err(CanvasError::invalid_argument(format!(
                "column {column} is outside a {}-column group",
                self.columns.len()
            )));
        }
        let instance = self
            .instances
            .iter_mut()
            .find(|g| g.id() == instance_id)
            .ok_or_else(|| CanvasError::GadgetNotFound(instance_id.to_string()))?;
        instance.column = column;
        instance.order = order;

        self.issued_version += 1;
        let version = self.issued_version;
        transport.send(BackendRequest::MoveGadget {
            request_id,
            group_name: self.group_name.clone(),
            gadget_instance_id: instance_id.to_string(),
            column,
            order,
            version,
        });
        self.pending_moves.insert(request_id, version);
        self.log(
            LogLevel::Debug,
            "move_requested",
            [
                json_str("gadget", instance_id),
                json_kv("column", json!(column)),
                json_kv("order", json!(order)),
                json_kv("version", json!(version)),
            ],
        );

        Ok(MoveTicket {
            request_id,
            version,
            instance_id: instance_id.to_string(),
            column,
            order,
        })
    }

    pub fn owns_move(&self, request_id: RequestId) -> bool {
        self.pending_moves.contains_key(&request_id)
    }

    pub fn owns_remove(&self, request_id: RequestId) -> bool {
        self.pending_removes.contains_key(&request_id)
    }

    pub fn on_move_acknowledged(&mut self, request_id: RequestId) -> Result<MoveOutcome> {
        let version = self.pending_moves.remove(&request_id).ok_or_else(|| {
            CanvasError::protocol(format!("no move pending for request {request_id}"))
        })?;

        if version <= self.applied_version {
            self.log(
                LogLevel::Warn,
                "stale_move_ack",
                [
                    json_kv("version", json!(version)),
                    json_kv("newest", json!(self.applied_version)),
                ],
            );
            return Ok(MoveOutcome::Stale {
                version,
                newest: self.applied_version,
            });
        }
        self.applied_version = version;
        Ok(MoveOutcome::Applied { version })
    }

    /// Ask for confirmation, then request removal. `callback` runs once the
    /// backend acknowledges. Returns `None` when the user declined.
    pub fn remove(
        &mut self,
        transport: &mut dyn Transport,
        request_id: RequestId,
        instance_id: &str,
        confirm: &mut dyn Confirm,
        callback: RemoveCallback,
    ) -> Result<Option<RequestId>> {
        if self.instance(instance_id).is_none() {
            return Err(CanvasError::GadgetNotFound(instance_id.to_string()));
        }
        if !confirm.confirm(REMOVE_PROMPT) {
            return Ok(None);
        }

        transport.send(BackendRequest::RemoveGadget {
            request_id,
            group_name: self.group_name.clone(),
            gadget_id: instance_id.to_string(),
        });
        self.pending_removes.insert(
            request_id,
            PendingRemove {
                instance_id: instance_id.to_string(),
                callback,
            },
        );
        self.log(
            LogLevel::Debug,
            "remove_requested",
            [json_str("gadget", instance_id)],
        );
        Ok(Some(request_id))
    }

    /// The close control: remove, then take the gadget's element off the page.
    pub fn close_gadget(
        &mut self,
        transport: &mut dyn Transport,
        request_id: RequestId,
        instance_id: &str,
        confirm: &mut dyn Confirm,
    ) -> Result<Option<RequestId>> {
        self.require_customizable("close")?;
        let element_id = self
            .instance(instance_id)
            .map(GadgetInstance::gadget_element_id)
            .ok_or_else(|| CanvasError::GadgetNotFound(instance_id.to_string()))?;

        let callback: RemoveCallback = Box::new(move |page: &mut HostPage| {
            if let Some(node) = page.document.element_by_id(&element_id) {
                page.document.remove(node);
            }
        });
        self.remove(transport, request_id, instance_id, confirm, callback)
    }

    /// Drop the instance and run the removal callback. Returns the removed
    /// instance.
    pub fn on_remove_acknowledged(
        &mut self,
        page: &mut HostPage,
        request_id: RequestId,
    ) -> Result<GadgetInstance> {
        let pending = self.pending_removes.remove(&request_id).ok_or_else(|| {
            CanvasError::protocol(format!("no removal pending for request {request_id}"))
        })?;
        let index = self
            .instances
            .iter()
            .position(|g| g.id() == pending.instance_id)
            .ok_or_else(|| CanvasError::GadgetNotFound(pending.instance_id.clone()))?;
        let removed = self.instances.remove(index);
        (pending.callback)(page);
        self.log(
            LogLevel::Info,
            "gadget_removed",
            [json_str("gadget", removed.id())],
        );
        Ok(removed)
    }

    /// The minimize control: hide or show the frame and flip the button.
    /// Returns whether the gadget is now minimized.
    pub fn toggle_minimize(&mut self, page: &mut HostPage, instance_id: &str) -> Result<bool> {
        self.require_customizable("minimize")?;
        let portlet = self.portlet_node(page, instance_id)?;

        let frame_box = page
            .document
            .find_by_class(portlet, FRAME_CONTAINER_CLASS)
            .first()
            .copied()
            .ok_or_else(|| CanvasError::ElementNotFound(FRAME_CONTAINER_CLASS.to_string()))?;
        let minimized = page
            .document
            .get_mut(frame_box)
            .map(|element| {
                element.hidden = !element.hidden;
                element.hidden
            })
            .unwrap_or(false);

        let (from, to) = if minimized {
            (MINIMIZE_CLASS, RESTORE_CLASS)
        } else {
            (RESTORE_CLASS, MINIMIZE_CLASS)
        };
        if let Some(button) = page.document.find_by_class(portlet, from).first().copied() {
            if let Some(element) = page.document.get_mut(button) {
                element.remove_class(from);
                element.add_class(to);
            }
        }
        Ok(minimized)
    }

    pub(super) fn portlet_node(&self, page: &HostPage, instance_id: &str) -> Result<NodeId> {
        let element_id = self
            .instance(instance_id)
            .map(GadgetInstance::gadget_element_id)
            .ok_or_else(|| CanvasError::GadgetNotFound(instance_id.to_string()))?;
        page.document
            .element_by_id(&element_id)
            .ok_or(CanvasError::ElementNotFound(element_id))
    }

    pub(super) fn require_customizable(&self, action: &str) -> Result<()> {
        if self.customizable {
            Ok(())
        } else {
            Err(CanvasError::state(format!(
                "cannot {action}: group `{}` is not customizable",
                self.group_name
            )))
        }
    }

    pub(super) fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let _ = self
            .logger
            .log_event(event_with_fields(level, LAYOUT_TARGET, message, fields));
    }
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("group_name", &self.group_name)
            .field("customizable", &self.customizable)
            .field("instances", &self.instances.len())
            .field("columns", &self.columns.len())
            .field("issued_version", &self.issued_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadget::GadgetSpec;
    use crate::render::HtmlRenderer;
    use crate::transport::OutboxTransport;

    fn group(columns: usize, customizable: bool, gadgets: Vec<GadgetSpec>) -> GroupSpec {
        GroupSpec {
            number_of_columns: columns,
            customizable,
            name: "main".into(),
            viewer_id: "1".into(),
            owner_id: "1".into(),
            view: "default".into(),
            gadgets,
        }
    }

    fn rendered(spec: &GroupSpec) -> (LayoutEngine, HostPage) {
        let mut page = HostPage::new("http://localhost:8098/");
        page.add_container("canvas").unwrap();
        let mut layout = LayoutEngine::build(spec, CanvasConfig::default()).unwrap();
        layout.render(&mut page, "canvas", None).unwrap();
        (layout, page)
    }

    fn gadget_ids_in_column(page: &HostPage, layout: &LayoutEngine, column: usize) -> Vec<String> {
        let node = layout.mount.as_ref().unwrap().columns[column];
        page.document
            .children(node)
            .iter()
            .filter_map(|child| page.document.get(*child))
            .filter_map(|element| element.id.clone())
            .collect()
    }

    #[test]
    fn column_widths_and_spacers() {
        let layout = LayoutEngine::build(&group(3, false, vec![]), CanvasConfig::default()).unwrap();
        let columns = layout.columns();
        assert_eq!(columns.len(), 3);
        assert!((columns[0].width_percent() - 31.0).abs() < f64::EPSILON);
        assert!(columns[0].is_spacer() && columns[1].is_spacer());
        assert!(!columns[2].is_spacer());
    }

    #[test]
    fn out_of_range_column_is_rejected() {
        let spec = group(2, false, vec![GadgetSpec::new("1", "http://g/a.xml", 2, 0)]);
        let err = LayoutEngine::build(&spec, CanvasConfig::default()).unwrap_err();
        assert!(matches!(err, CanvasError::Precondition(_)));
    }

    #[test]
    fn render_sorts_and_builds_markup() {
        let spec = group(
            2,
            false,
            vec![
                GadgetSpec::new("1", "http://g/a.xml", 1, 1).with_title("One"),
                GadgetSpec::new("2", "http://g/b.xml", 1, 0).with_title("Two"),
                GadgetSpec::new("3", "http://g/c.xml", 0, 0).with_icon("/i.png"),
            ],
        );
        let (layout, page) = rendered(&spec);

        assert_eq!(
            gadget_ids_in_column(&page, &layout, 1),
            vec!["gadget_Application-2", "gadget_Application-1"]
        );
        assert_eq!(gadget_ids_in_column(&page, &layout, 0), vec!["gadget_Application-3"]);

        let container = page.document.element_by_id("canvas").unwrap();
        let children = page.document.children(container);
        assert_eq!(children.len(), 3);
        let clear = page.document.get(children[2]).unwrap();
        assert_eq!(clear.attr("style"), Some("clear:both;"));
        assert!(!page.document.get(container).unwrap().has_class(CUSTOMIZABLE_CLASS));
        assert!(page.document.find_by_class(container, CLOSE_CLASS).is_empty());
        assert_eq!(page.document.find_by_class(container, "icon").len(), 1);

        let frame = page.document.element_by_id("Application-1").unwrap();
        let frame = page.document.get(frame).unwrap();
        assert_eq!(frame.attr("name"), Some("Application-1"));
        assert_eq!(frame.attr("frameborder"), Some("0"));
        assert!(frame.attr("src").unwrap().contains("#rpctoken=Application-1"));

        let html = HtmlRenderer::with_default()
            .render_to_string(&page.document, container)
            .unwrap();
        assert!(html.contains("class=\"canvasColumn columnSpacer\""));
        assert!(html.contains("style=\"width:47%\""));
        assert!(html.contains("<h2 id=\"header_Application-1\">One</h2>"));
    }

    #[test]
    fn customizable_group_gets_controls_and_registers_frames() {
        let spec = group(1, true, vec![GadgetSpec::new("5", "http://g/a.xml", 0, 0)]);
        let mut page = HostPage::new("http://localhost:8098/");
        page.add_container("canvas").unwrap();
        let mut bridge =
            ContainerBridge::install(&mut page, CanvasConfig::default(), Logger::disabled()).unwrap();
        let mut layout = LayoutEngine::build(&spec, CanvasConfig::default()).unwrap();
        layout.render(&mut page, "canvas", Some(&mut bridge)).unwrap();

        let container = page.document.element_by_id("canvas").unwrap();
        assert!(page.document.get(container).unwrap().has_class(CUSTOMIZABLE_CLASS));
        assert_eq!(page.document.find_by_class(container, MINIMIZE_CLASS).len(), 1);
        assert_eq!(page.document.find_by_class(container, CLOSE_CLASS).len(), 1);
        assert_eq!(bridge.registered_frames(), &["Application-5".to_string()]);
    }

    #[test]
    fn missing_container_is_an_error() {
        let mut page = HostPage::new("http://localhost/");
        let mut layout = LayoutEngine::build(&group(1, false, vec![]), CanvasConfig::default()).unwrap();
        let err = layout.render(&mut page, "nope", None).unwrap_err();
        assert!(matches!(err, CanvasError::ElementNotFound(_)));
    }

    #[test]
    fn stale_move_acknowledgements_are_rejected() {
        let spec = group(2, true, vec![GadgetSpec::new("1", "http://g/a.xml", 0, 0)]);
        let (mut layout, _page) = rendered(&spec);
        let mut outbox = OutboxTransport::new();

        let first = layout.move_gadget(&mut outbox, 10, "1", 1, 0).unwrap();
        let second = layout.move_gadget(&mut outbox, 11, "1", 0, 0).unwrap();
        assert!(second.version > first.version);

        assert_eq!(
            layout.on_move_acknowledged(11).unwrap(),
            MoveOutcome::Applied { version: second.version }
        );
        assert_eq!(
            layout.on_move_acknowledged(10).unwrap(),
            MoveOutcome::Stale { version: first.version, newest: second.version }
        );
        assert!(layout.on_move_acknowledged(10).is_err());
        assert_eq!(outbox.pending(), 2);
    }

    #[test]
    fn remove_waits_for_confirmation_and_acknowledgement() {
        let spec = group(1, true, vec![GadgetSpec::new("4", "http://g/a.xml", 0, 0)]);
        let (mut layout, mut page) = rendered(&spec);
        let mut outbox = OutboxTransport::new();

        let mut decline = |_: &str| false;
        assert_eq!(layout.close_gadget(&mut outbox, 1, "4", &mut decline).unwrap(), None);
        assert_eq!(outbox.pending(), 0);

        let mut prompts = Vec::new();
        let mut accept = |message: &str| {
            prompts.push(message.to_string());
            true
        };
        let request = layout.close_gadget(&mut outbox, 2, "4", &mut accept).unwrap();
        assert_eq!(request, Some(2));
        assert_eq!(prompts, vec![REMOVE_PROMPT.to_string()]);
        assert!(page.document.element_by_id("gadget_Application-4").is_some());

        assert_eq!(layout.on_remove_acknowledged(&mut page, 2).unwrap().id(), "4");
        assert!(page.document.element_by_id("gadget_Application-4").is_none());
        assert!(layout.instances().is_empty());
    }

    #[test]
    fn minimize_toggles_frame_and_button() {
        let spec = group(1, true, vec![GadgetSpec::new("4", "http://g/a.xml", 0, 0)]);
        let (mut layout, mut page) = rendered(&spec);
        let portlet = page.document.element_by_id("gadget_Application-4").unwrap();

        assert!(layout.toggle_minimize(&mut page, "4").unwrap());
        assert_eq!(page.document.height(portlet), HEADER_HEIGHT);
        assert_eq!(page.document.find_by_class(portlet, RESTORE_CLASS).len(), 1);

        assert!(!layout.toggle_minimize(&mut page, "4").unwrap());
        assert_eq!(page.document.height(portlet), HEADER_HEIGHT + FRAME_HEIGHT);
        assert_eq!(page.document.find_by_class(portlet, MINIMIZE_CLASS).len(), 1);
    }

    #[test]
    fn fixed_groups_reject_controls() {
        let spec = group(1, false, vec![GadgetSpec::new("4", "http://g/a.xml", 0, 0)]);
        let (mut layout, mut page) = rendered(&spec);
        let err = layout.toggle_minimize(&mut page, "4").unwrap_err();
        assert!(matches!(err, CanvasError::State(_)));
    }
}
