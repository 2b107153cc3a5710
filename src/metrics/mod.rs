use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct CanvasMetrics {
    events: u64,
    events_rejected: u64,
    renders: u64,
    rpc_calls: u64,
    rpc_rejected: u64,
    moves_issued: u64,
    stale_acks: u64,
    removes: u64,
    scripts_loaded: u64,
}

impl CanvasMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self) {
        self.events = self.events.saturating_add(1);
    }

    pub fn record_rejected_event(&mut self) {
        self.events_rejected = self.events_rejected.saturating_add(1);
    }

    pub fn record_render(&mut self) {
        self.renders = self.renders.saturating_add(1);
    }

    pub fn record_rpc(&mut self, accepted: bool) {
        self.rpc_calls = self.rpc_calls.saturating_add(1);
        if !accepted {
            self.rpc_rejected = self.rpc_rejected.saturating_add(1);
        }
    }

    pub fn record_move(&mut self) {
        self.moves_issued = self.moves_issued.saturating_add(1);
    }

    pub fn record_stale_ack(&mut self) {
        self.stale_acks = self.stale_acks.saturating_add(1);
    }

    pub fn record_remove(&mut self) {
        self.removes = self.removes.saturating_add(1);
    }

    pub fn record_scripts_loaded(&mut self, count: usize) {
        self.scripts_loaded = self.scripts_loaded.saturating_add(count as u64);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            events: self.events,
            events_rejected: self.events_rejected,
            renders: self.renders,
            rpc_calls: self.rpc_calls,
            rpc_rejected: self.rpc_rejected,
            moves_issued: self.moves_issued,
            stale_acks: self.stale_acks,
            removes: self.removes,
            scripts_loaded: self.scripts_loaded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub events: u64,
    pub events_rejected: u64,
    pub renders: u64,
    pub rpc_calls: u64,
    pub rpc_rejected: u64,
    pub moves_issued: u64,
    pub stale_acks: u64,
    pub removes: u64,
    pub scripts_loaded: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("events".to_string(), json!(self.events));
        map.insert("events_rejected".to_string(), json!(self.events_rejected));
        map.insert("renders".to_string(), json!(self.renders));
        map.insert("rpc_calls".to_string(), json!(self.rpc_calls));
        map.insert("rpc_rejected".to_string(), json!(self.rpc_rejected));
        map.insert("moves_issued".to_string(), json!(self.moves_issued));
        map.insert("stale_acks".to_string(), json!(self.stale_acks));
        map.insert("removes".to_string(), json!(self.removes));
        map.insert("scripts_loaded".to_string(), json!(self.scripts_loaded));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "canvas_metrics", self.as_fields())
    }
}
