//! Single-threaded event loop driving a host page.
//!
//! Everything the host reacts to arrives as a [`HostEvent`]: backend
//! responses, gadget RPC calls, script completion signals and user input on
//! the layout. Events are handled one at a time, to completion, in arrival
//! order. Plugins observe every event first and may consume it.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::bridge::{ContainerBridge, RpcCall};
use crate::config::CanvasConfig;
use crate::error::{CanvasError, Result};
use crate::layout::{Confirm, LayoutEngine, MoveOutcome};
use crate::loader::{AssetLoader, DependencyService, ScriptEvent};
use crate::logging::{LogLevel, Logger, RUNTIME_TARGET, event_with_fields, json_kv, json_str};
use crate::metrics::CanvasMetrics;
use crate::page::HostPage;
use crate::transport::{BackendRequest, BackendResponse, RequestId, RequestIds, Transport};

pub mod diagnostics;

/// Configuration knobs for the runtime loop.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Optional structured logger used by the runtime.
    pub logger: Option<Logger>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "gadget_canvas::runtime.metrics".to_string(),
        }
    }
}

/// Inbound events, in the order the host observed them.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Backend(BackendResponse),
    Rpc(RpcCall),
    ScriptSignal { url: String, event: ScriptEvent },
    DragStart { container: String, instance_id: String },
    DragOver { container: String, column: usize, position: usize },
    Drop { container: String },
    DragCancel { container: String },
    MinimizeClicked { container: String, instance_id: String },
    CloseClicked { container: String, instance_id: String },
}

impl HostEvent {
    pub fn describe(&self) -> &'static str {
        match self {
            HostEvent::Backend(BackendResponse::GroupFetched { .. }) => "backend.group_fetched",
            HostEvent::Backend(BackendResponse::MoveAcknowledged { .. }) => "backend.move_ack",
            HostEvent::Backend(BackendResponse::RemoveAcknowledged { .. }) => "backend.remove_ack",
            HostEvent::Backend(BackendResponse::DependenciesResolved { .. }) => {
                "backend.dependencies_resolved"
            }
            HostEvent::Rpc(_) => "rpc",
            HostEvent::ScriptSignal { .. } => "script_signal",
            HostEvent::DragStart { .. } => "drag_start",
            HostEvent::DragOver { .. } => "drag_over",
            HostEvent::Drop { .. } => "drop",
            HostEvent::DragCancel { .. } => "drag_cancel",
            HostEvent::MinimizeClicked { .. } => "minimize_clicked",
            HostEvent::CloseClicked { .. } => "close_clicked",
        }
    }
}

/// Control the propagation of an event across plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Consumed,
}

/// What a plugin may see and do while handling an event.
pub struct RuntimeContext<'a> {
    page: &'a HostPage,
    posted: Vec<HostEvent>,
    stop_requested: bool,
}

impl<'a> RuntimeContext<'a> {
    fn new(page: &'a HostPage) -> Self {
        Self {
            page,
            posted: Vec::new(),
            stop_requested: false,
        }
    }

    pub fn page(&self) -> &HostPage {
        self.page
    }

    /// Queue an event behind the ones already pending.
    pub fn post(&mut self, event: HostEvent) {
        self.posted.push(event);
    }

    /// Stop draining once the current event completes.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    fn into_outcome(self) -> ContextOutcome {
        ContextOutcome {
            posted: self.posted,
            stop_requested: self.stop_requested,
        }
    }
}

struct ContextOutcome {
    posted: Vec<HostEvent>,
    stop_requested: bool,
}

/// Behaviour injection point for the runtime.
pub trait CanvasPlugin {
    fn name(&self) -> &str {
        "canvas_plugin"
    }

    fn init(&mut self, _ctx: &mut RuntimeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_event(&mut self, _ctx: &mut RuntimeContext<'_>, _event: &HostEvent) -> Result<EventFlow> {
        Ok(EventFlow::Continue)
    }

    /// Runs after the runtime handled an event no plugin consumed.
    fn after_event(&mut self, _ctx: &mut RuntimeContext<'_>, _event: &HostEvent) -> Result<()> {
        Ok(())
    }
}

/// Sends requests out, answering dependency resolution in process when a
/// local service is attached.
struct Outbound<'a> {
    transport: &'a mut dyn Transport,
    resolver: Option<&'a mut (dyn DependencyService + 'static)>,
    queue: &'a mut VecDeque<HostEvent>,
    logger: Option<&'a Logger>,
}

impl Transport for Outbound<'_> {
    fn send(&mut self, request: BackendRequest) {
        let Some(resolver) = self.resolver.as_deref_mut() else {
            self.transport.send(request);
            return;
        };
        match request {
            BackendRequest::ResolveDependencies {
                request_id, files, ..
            } => match resolver.resolve_request(files) {
                Ok(manifest) => self.queue.push_back(HostEvent::Backend(
                    BackendResponse::DependenciesResolved {
                        request_id,
                        manifest,
                    },
                )),
                Err(err) => {
                    if let Some(logger) = self.logger {
                        let _ = logger.log_event(event_with_fields(
                            LogLevel::Error,
                            RUNTIME_TARGET,
                            "resolution_failed",
                            [
                                json_kv("request_id", json!(request_id)),
                                json_str("error", err.to_string()),
                            ],
                        ));
                    }
                }
            },
            other => self.transport.send(other),
        }
    }
}

/// Owns the page and everything rendered into it.
pub struct CanvasRuntime {
    config: CanvasConfig,
    runtime_config: RuntimeConfig,
    page: HostPage,
    bridge: ContainerBridge,
    transport: Box<dyn Transport>,
    resolver: Option<Box<dyn DependencyService>>,
    confirm: Box<dyn Confirm>,
    ids: RequestIds,
    layouts: HashMap<String, LayoutEngine>,
    pending_groups: HashMap<RequestId, String>,
    loaders: Vec<AssetLoader>,
    plugins: Vec<Box<dyn CanvasPlugin>>,
    queue: VecDeque<HostEvent>,
    metrics: CanvasMetrics,
    stop_requested: bool,
    start_instant: Option<Instant>,
    last_metrics_emit: Option<Instant>,
}

impl CanvasRuntime {
    /// Install the RPC bridge on `page` and take ownership of it.
    pub fn new<T>(mut page: HostPage, config: CanvasConfig, transport: T) -> Result<Self>
    where
        T: Transport + 'static,
    {
        config.validate()?;
        let bridge = ContainerBridge::install(&mut page, config.clone(), Logger::disabled())?;
        Ok(Self {
            config,
            runtime_config: RuntimeConfig::default(),
            page,
            bridge,
            transport: Box::new(transport),
            resolver: None,
            confirm: Box::new(|_: &str| true),
            ids: RequestIds::new(),
            layouts: HashMap::new(),
            pending_groups: HashMap::new(),
            loaders: Vec::new(),
            plugins: Vec::new(),
            queue: VecDeque::new(),
            metrics: CanvasMetrics::new(),
            stop_requested: false,
            start_instant: None,
            last_metrics_emit: None,
        })
    }

    /// Route logging through `logger`, at the level the canvas config asks for.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        let logger = logger.with_min_level(self.config.log_level());
        self.bridge.set_logger(logger.clone());
        self.runtime_config.logger = Some(logger);
        self
    }

    /// Answer dependency resolution in process instead of over the transport.
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: DependencyService + 'static,
    {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Collaborator asked before a gadget is closed. Defaults to yes.
    pub fn with_confirm<C>(mut self, confirm: C) -> Self
    where
        C: Confirm + 'static,
    {
        self.confirm = Box::new(confirm);
        self
    }

    pub fn config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.runtime_config
    }

    pub fn register_plugin<P>(&mut self, plugin: P)
    where
        P: CanvasPlugin + 'static,
    {
        self.plugins.push(Box::new(plugin));
    }

    pub fn page(&self) -> &HostPage {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut HostPage {
        &mut self.page
    }

    pub fn bridge(&self) -> &ContainerBridge {
        &self.bridge
    }

    pub fn layout(&self, container: &str) -> Option<&LayoutEngine> {
        self.layouts.get(container)
    }

    pub fn loaders(&self) -> &[AssetLoader] {
        &self.loaders
    }

    pub fn metrics(&self) -> &CanvasMetrics {
        &self.metrics
    }

    /// Fetch the group `group_name` and render it into `container` once the
    /// backend answers.
    pub fn render_gadget_group(
        &mut self,
        container: &str,
        group_name: &str,
        owner_id: Option<&str>,
    ) -> RequestId {
        let request_id = self.ids.next_id();
        let request = BackendRequest::FetchGroup {
            request_id,
            group_name: group_name.to_string(),
            owner_id: owner_id.map(str::to_string),
        };
        let url = request.url(&self.config);
        self.transport.send(request);
        self.pending_groups.insert(request_id, container.to_string());
        self.log(
            LogLevel::Debug,
            "group_requested",
            [
                json_str("url", url),
                json_str("group", group_name),
                json_str("container", container),
                json_kv("request_id", json!(request_id)),
            ],
        );
        request_id
    }

    /// Start `loader`. Its imports and ready subscribers must already be
    /// registered.
    pub fn start_loader(&mut self, mut loader: AssetLoader) -> Result<RequestId> {
        let request_id = self.ids.next_id();
        let mut outbound = Outbound {
            transport: self.transport.as_mut(),
            resolver: self.resolver.as_deref_mut(),
            queue: &mut self.queue,
            logger: self.runtime_config.logger.as_ref(),
        };
        loader.load(&mut outbound, request_id)?;
        self.loaders.push(loader);
        Ok(request_id)
    }

    /// Queue an event for the next drain.
    pub fn post(&mut self, event: HostEvent) {
        self.queue.push_back(event);
    }

    /// Handle queued events until none are left or a plugin asks to stop.
    pub fn run_until_idle(&mut self) -> Result<()> {
        while let Some(event) = self.queue.pop_front() {
            self.dispatch_event(event)?;
            if self.stop_requested {
                break;
            }
        }
        Ok(())
    }

    /// Initialise plugins, feed `events` one by one and drain whatever they
    /// cause, then shut down.
    pub fn run_scripted<I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = HostEvent>,
    {
        self.bootstrap()?;
        self.run_until_idle()?;
        for event in events {
            if self.stop_requested {
                break;
            }
            self.queue.push_back(event);
            self.run_until_idle()?;
        }
        self.finalize();
        Ok(())
    }

    pub fn bootstrap(&mut self) -> Result<()> {
        self.stop_requested = false;
        let now = Instant::now();
        self.start_instant = Some(now);
        self.last_metrics_emit = Some(now);
        self.log(
            LogLevel::Info,
            "runtime_started",
            [json_kv("plugins", json!(self.plugins.len()))],
        );

        for idx in 0..self.plugins.len() {
            let outcome = {
                let plugin = &mut self.plugins[idx];
                let mut ctx = RuntimeContext::new(&self.page);
                plugin.init(&mut ctx)?;
                ctx.into_outcome()
            };
            let name = self.plugins[idx].name().to_string();
            self.log(
                LogLevel::Debug,
                "plugin_initialized",
                [json_str("plugin", name)],
            );
            self.apply_outcome(outcome);
        }
        Ok(())
    }

    fn dispatch_event(&mut self, event: HostEvent) -> Result<()> {
        let mut consumed = false;
        for idx in 0..self.plugins.len() {
            let (flow, outcome) = {
                let plugin = &mut self.plugins[idx];
                let mut ctx = RuntimeContext::new(&self.page);
                let flow = plugin.on_event(&mut ctx, &event)?;
                (flow, ctx.into_outcome())
            };
            self.apply_outcome(outcome);
            if flow == EventFlow::Consumed {
                consumed = true;
                break;
            }
        }

        if !consumed {
            // Handler failures come from untrusted input or late responses;
            // they are logged and never stop the loop.
            if let Err(err) = self.handle(&event) {
                self.metrics.record_rejected_event();
                self.log(
                    LogLevel::Warn,
                    "event_rejected",
                    [
                        json_str("event", event.describe()),
                        json_str("error", err.to_string()),
                    ],
                );
            }
            for idx in 0..self.plugins.len() {
                let outcome = {
                    let plugin = &mut self.plugins[idx];
                    let mut ctx = RuntimeContext::new(&self.page);
                    plugin.after_event(&mut ctx, &event)?;
                    ctx.into_outcome()
                };
                self.apply_outcome(outcome);
            }
        }

        self.metrics.record_event();
        self.log(
            LogLevel::Trace,
            "event_dispatched",
            [
                json_str("event", event.describe()),
                json_kv("consumed", json!(consumed)),
            ],
        );
        self.maybe_emit_metrics();
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent) -> Result<()> {
        match event {
            HostEvent::Backend(response) => self.handle_backend(response.clone()),
            HostEvent::Rpc(call) => {
                // The bridge logs its own rejections.
                let accepted = self.bridge.dispatch(&mut self.page, call).is_ok();
                self.metrics.record_rpc(accepted);
                Ok(())
            }
            HostEvent::ScriptSignal { url, event } => {
                for loader in self.loaders.iter_mut() {
                    if loader.on_script_event(url, event, &mut self.page) {
                        self.metrics.record_scripts_loaded(1);
                        break;
                    }
                }
                Ok(())
            }
            HostEvent::DragStart {
                container,
                instance_id,
            } => {
                let layout = Self::layout_mut(&mut self.layouts, container)?;
                layout.begin_drag(&mut self.page, instance_id)
            }
            HostEvent::DragOver {
                container,
                column,
                position,
            } => {
                let layout = Self::layout_mut(&mut self.layouts, container)?;
                layout.drag_over(&mut self.page, *column, *position)
            }
            HostEvent::Drop { container } => {
                let request_id = self.ids.next_id();
                let layout = Self::layout_mut(&mut self.layouts, container)?;
                let ticket =
                    layout.drop_gadget(&mut self.page, self.transport.as_mut(), request_id)?;
                if ticket.is_some() {
                    self.metrics.record_move();
                }
                Ok(())
            }
            HostEvent::DragCancel { container } => {
                let layout = Self::layout_mut(&mut self.layouts, container)?;
                layout.cancel_drag(&mut self.page)
            }
            HostEvent::MinimizeClicked {
                container,
                instance_id,
            } => {
                let layout = Self::layout_mut(&mut self.layouts, container)?;
                layout.toggle_minimize(&mut self.page, instance_id).map(|_| ())
            }
            HostEvent::CloseClicked {
                container,
                instance_id,
            } => {
                let request_id = self.ids.next_id();
                let layout = Self::layout_mut(&mut self.layouts, container)?;
                layout
                    .close_gadget(
                        self.transport.as_mut(),
                        request_id,
                        instance_id,
                        self.confirm.as_mut(),
                    )
                    .map(|_| ())
            }
        }
    }

    fn handle_backend(&mut self, response: BackendResponse) -> Result<()> {
        match response {
            BackendResponse::GroupFetched { request_id, group } => {
                let container = self.pending_groups.remove(&request_id).ok_or_else(|| {
                    CanvasError::protocol(format!("no group request {request_id} pending"))
                })?;
                let mut layout = LayoutEngine::build(&group, self.config.clone())?;
                if let Some(logger) = self.runtime_config.logger.as_ref() {
                    layout = layout.with_logger(logger.clone());
                }
                layout.render(&mut self.page, &container, Some(&mut self.bridge))?;
                self.layouts.insert(container, layout);
                self.metrics.record_render();
                Ok(())
            }
            BackendResponse::MoveAcknowledged { request_id, .. } => {
                let layout = self
                    .layouts
                    .values_mut()
                    .find(|layout| layout.owns_move(request_id))
                    .ok_or_else(|| {
                        CanvasError::protocol(format!("no move request {request_id} pending"))
                    })?;
                if let MoveOutcome::Stale { .. } = layout.on_move_acknowledged(request_id)? {
                    self.metrics.record_stale_ack();
                }
                Ok(())
            }
            BackendResponse::RemoveAcknowledged { request_id, .. } => {
                let layout = self
                    .layouts
                    .values_mut()
                    .find(|layout| layout.owns_remove(request_id))
                    .ok_or_else(|| {
                        CanvasError::protocol(format!("no removal request {request_id} pending"))
                    })?;
                let removed = layout.on_remove_acknowledged(&mut self.page, request_id)?;
                self.bridge.remove_receiver(removed.application_id());
                self.metrics.record_remove();
                Ok(())
            }
            BackendResponse::DependenciesResolved {
                request_id,
                manifest,
            } => {
                let loader = self
                    .loaders
                    .iter_mut()
                    .find(|loader| loader.pending_request() == Some(request_id))
                    .ok_or_else(|| {
                        CanvasError::protocol(format!(
                            "no dependency request {request_id} pending"
                        ))
                    })?;
                loader.on_manifest(manifest, &mut self.page)
            }
        }
    }

    fn layout_mut<'a>(
        layouts: &'a mut HashMap<String, LayoutEngine>,
        container: &str,
    ) -> Result<&'a mut LayoutEngine> {
        layouts
            .get_mut(container)
            .ok_or_else(|| CanvasError::ElementNotFound(container.to_string()))
    }

    fn apply_outcome(&mut self, outcome: ContextOutcome) {
        self.queue.extend(outcome.posted);
        if outcome.stop_requested {
            self.stop_requested = true;
            self.log(LogLevel::Info, "stop_requested", std::iter::empty());
        }
    }

    fn finalize(&mut self) {
        let uptime = self
            .start_instant
            .map(|start| start.elapsed())
            .unwrap_or_default();
        if let Some(logger) = self.runtime_config.logger.as_ref() {
            let target = self.runtime_config.metrics_target.as_str();
            let _ = logger.log_event(self.metrics.snapshot(uptime).to_log_event(target));
        }
        self.log(
            LogLevel::Info,
            "runtime_stopped",
            [json_kv("uptime_ms", json!(uptime.as_millis() as u64))],
        );
    }

    fn maybe_emit_metrics(&mut self) {
        if self.runtime_config.metrics_interval == Duration::from_millis(0) {
            return;
        }

        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.runtime_config.metrics_interval => {
                return;
            }
            _ => {
                self.last_metrics_emit = Some(now);
            }
        }

        let uptime = self
            .start_instant
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        if let Some(logger) = self.runtime_config.logger.as_ref() {
            let target = self.runtime_config.metrics_target.as_str();
            let _ = logger.log_event(self.metrics.snapshot(uptime).to_log_event(target));
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.runtime_config.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, RUNTIME_TARGET, message, fields));
        }
    }
}
