use serde_json::json;

use crate::Result;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::transport::BackendResponse;

use super::{CanvasPlugin, EventFlow, HostEvent, RuntimeContext};

pub const LIFECYCLE_TARGET: &str = "gadget_canvas::runtime.lifecycle";

/// Logs every host event the runtime sees. Script signals and drag-over
/// events are noisy and off by default.
pub struct LifecycleLoggerPlugin {
    logger: Logger,
    level: LogLevel,
    log_rpc: bool,
    log_script_signals: bool,
    log_drag_over: bool,
}

impl LifecycleLoggerPlugin {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            log_rpc: true,
            log_script_signals: false,
            log_drag_over: false,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn log_rpc(mut self, enabled: bool) -> Self {
        self.log_rpc = enabled;
        self
    }

    pub fn log_script_signals(mut self, enabled: bool) -> Self {
        self.log_script_signals = enabled;
        self
    }

    pub fn log_drag_over(mut self, enabled: bool) -> Self {
        self.log_drag_over = enabled;
        self
    }

    fn emit(&self, message: &str, fields: impl IntoIterator<Item = (String, serde_json::Value)>) {
        let event = event_with_fields(self.level, LIFECYCLE_TARGET, message, fields);
        let _ = self.logger.log_event(event);
    }
}

impl CanvasPlugin for LifecycleLoggerPlugin {
    fn name(&self) -> &str {
        "diagnostics.lifecycle_logger"
    }

    fn init(&mut self, _ctx: &mut RuntimeContext<'_>) -> Result<()> {
        self.emit(
            "plugin_initialized",
            [json_kv("logger_level", json!(format!("{:?}", self.level)))],
        );
        Ok(())
    }

    fn on_event(&mut self, _ctx: &mut RuntimeContext<'_>, event: &HostEvent) -> Result<EventFlow> {
        match event {
            HostEvent::Backend(response) => {
                let mut fields = vec![json_kv("request_id", json!(response.request_id()))];
                if let BackendResponse::GroupFetched { group, .. } = response {
                    fields.push(json_str("group", group.name.as_str()));
                    fields.push(json_kv("gadgets", json!(group.gadgets.len())));
                }
                self.emit(&format!("event.{}", event.describe()), fields);
            }
            HostEvent::Rpc(call) if self.log_rpc => {
                self.emit(
                    "event.rpc",
                    [
                        json_str("method", call.method.as_str()),
                        json_str("sender", call.context.sender_id().unwrap_or("")),
                        json_kv("args", json!(call.args.len())),
                    ],
                );
            }
            HostEvent::ScriptSignal { url, event } if self.log_script_signals => {
                self.emit(
                    "event.script_signal",
                    [
                        json_str("url", url.as_str()),
                        json_str("signal", format!("{event:?}")),
                    ],
                );
            }
            HostEvent::DragOver {
                container,
                column,
                position,
            } if self.log_drag_over => {
                self.emit(
                    "event.drag_over",
                    [
                        json_str("container", container.as_str()),
                        json_kv("column", json!(column)),
                        json_kv("position", json!(position)),
                    ],
                );
            }
            HostEvent::DragStart {
                container,
                instance_id,
            }
            | HostEvent::MinimizeClicked {
                container,
                instance_id,
            }
            | HostEvent::CloseClicked {
                container,
                instance_id,
            } => {
                self.emit(
                    &format!("event.{}", event.describe()),
                    [
                        json_str("container", container.as_str()),
                        json_str("instance", instance_id.as_str()),
                    ],
                );
            }
            HostEvent::Drop { container } | HostEvent::DragCancel { container } => {
                self.emit(
                    &format!("event.{}", event.describe()),
                    [json_str("container", container.as_str())],
                );
            }
            _ => {}
        }

        Ok(EventFlow::Continue)
    }
}
