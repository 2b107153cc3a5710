//! RPC bridge between sandboxed gadget frames and the host page.
//!
//! Gadget code never runs in the host. It sends named calls carrying the
//! sender's frame identity; the bridge validates arguments and maps each call
//! onto a [`GadgetHost`] effect. Nothing in a call is trusted: heights are
//! clamped, titles escaped, and navigation is limited to a fixed view table.

mod core;
mod host;

pub use core::{
    CallContext, ContainerBridge, REQUEST_NAVIGATE_TO, RESIZE_IFRAME, RpcCall, SET_PREF, SET_TITLE,
};
pub use host::{GadgetHost, PageHost, escape_title, parse_frame_url, url_for_view};
