//! Host side of a gadget dashboard.
//!
//! A host page renders a group of sandboxed gadgets into columns, answers
//! the calls those gadgets make through the RPC bridge, persists
//! drag-and-drop placement, and loads host scripts in dependency order.
//! Everything runs on one thread and reacts to events fed through
//! [`CanvasRuntime`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod gadget;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod page;
pub mod render;
pub mod runtime;
pub mod transport;

pub use bridge::{CallContext, ContainerBridge, GadgetHost, PageHost, RpcCall};
pub use config::{CanvasConfig, LoaderConfig};
pub use error::{CanvasError, Result};
pub use gadget::{GadgetInstance, GadgetSpec, GroupSpec};
pub use layout::{Column, Confirm, LayoutEngine, MoveOutcome, MoveTicket};
pub use loader::{
    AssetLoader, AssetManifest, CompletionSignal, DepFileFinder, DependencyResolver,
    DependencyService, LoaderState, ResolutionService, ScriptEvent,
};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{CanvasMetrics, MetricSnapshot};
pub use page::{Document, Element, HostPage, Location, NodeId};
pub use render::{HtmlRenderer, RendererSettings};
pub use runtime::diagnostics::LifecycleLoggerPlugin;
pub use runtime::{CanvasPlugin, CanvasRuntime, EventFlow, HostEvent, RuntimeConfig, RuntimeContext};
pub use transport::{BackendRequest, BackendResponse, OutboxTransport, RequestId, Transport};
