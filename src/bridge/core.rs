use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CanvasConfig;
use crate::error::{CanvasError, Result};
use crate::logging::{BRIDGE_TARGET, LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::page::HostPage;

use super::host::{GadgetHost, PageHost};

pub const RESIZE_IFRAME: &str = "resize_iframe";
pub const SET_PREF: &str = "set_pref";
pub const SET_TITLE: &str = "set_title";
pub const REQUEST_NAVIGATE_TO: &str = "requestNavigateTo";

/// Identity of the frame that issued a call. Older sandbox runtimes leave the
/// frame id empty and only fill in the rpc token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub rpc_token: Option<String>,
}

impl CallContext {
    pub fn from_frame(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: Some(frame_id.into()),
            rpc_token: None,
        }
    }

    pub fn from_token(rpc_token: impl Into<String>) -> Self {
        Self {
            frame_id: None,
            rpc_token: Some(rpc_token.into()),
        }
    }

    /// Frame id when present and non-empty, otherwise the rpc token.
    pub fn sender_id(&self) -> Option<&str> {
        self.frame_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.rpc_token.as_deref().filter(|t| !t.is_empty()))
    }
}

/// One inbound call from a sandboxed gadget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcCall {
    pub method: String,
    #[serde(default)]
    pub context: CallContext,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RpcCall {
    pub fn new(method: impl Into<String>, context: CallContext, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            context,
            args,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

type RpcHandler = fn(&CanvasConfig, &mut dyn GadgetHost, &CallContext, &[Value]) -> Result<()>;

/// Dispatch table between gadget calls and host effects. One per page.
pub struct ContainerBridge {
    config: CanvasConfig,
    logger: Logger,
    handlers: HashMap<&'static str, RpcHandler>,
    receivers: Vec<String>,
}

impl ContainerBridge {
    /// Bind the dispatch table to `page`. Fails if the page already has one.
    pub fn install(page: &mut HostPage, config: CanvasConfig, logger: Logger) -> Result<Self> {
        page.bind_rpc()?;

        let mut handlers: HashMap<&'static str, RpcHandler> = HashMap::new();
        handlers.insert(RESIZE_IFRAME, resize_iframe);
        handlers.insert(SET_PREF, set_pref);
        handlers.insert(SET_TITLE, set_title);
        handlers.insert(REQUEST_NAVIGATE_TO, request_navigate_to);

        let _ = logger.log_event(event_with_fields(
            LogLevel::Debug,
            BRIDGE_TARGET,
            "rpc_installed",
            [json_kv("methods", json!(handlers.len()))],
        ));

        Ok(Self {
            config,
            logger,
            handlers,
            receivers: Vec::new(),
        })
    }

    /// Accept calls from the frame with this application id.
    pub fn setup_receiver(&mut self, application_id: &str) {
        if !self.receivers.iter().any(|r| r == application_id) {
            self.receivers.push(application_id.to_string());
        }
    }

    /// Stop accepting calls from a frame that left the page.
    pub fn remove_receiver(&mut self, application_id: &str) {
        self.receivers.retain(|r| r != application_id);
    }

    pub fn registered_frames(&self) -> &[String] {
        &self.receivers
    }

    pub fn is_registered(&self, application_id: &str) -> bool {
        self.receivers.iter().any(|r| r == application_id)
    }

    pub fn methods(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    /// Run `call` against the page.
    pub fn dispatch(&self, page: &mut HostPage, call: &RpcCall) -> Result<()> {
        self.dispatch_to(&mut PageHost::new(page), call)
    }

    /// Run `call` against any host. Unknown methods and malformed arguments
    /// are logged and returned; the host is not touched.
    pub fn dispatch_to(&self, host: &mut dyn GadgetHost, call: &RpcCall) -> Result<()> {
        let sender = call.context.sender_id().unwrap_or("").to_string();
        let outcome = match self.handlers.get(call.method.as_str()) {
            Some(handler) => handler(&self.config, host, &call.context, &call.args),
            None => Err(CanvasError::UnknownRpcMethod(call.method.clone())),
        };

        let (level, message) = match &outcome {
            Ok(()) => (LogLevel::Debug, "rpc_dispatched"),
            Err(_) => (LogLevel::Warn, "rpc_rejected"),
        };
        let mut fields = vec![
            json_str("method", call.method.as_str()),
            json_str("sender", sender),
        ];
        if let Err(err) = &outcome {
            fields.push(json_str("error", err.to_string()));
        }
        let _ = self
            .logger
            .log_event(event_with_fields(level, BRIDGE_TARGET, message, fields));

        outcome
    }
}

impl std::fmt::Debug for ContainerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBridge")
            .field("methods", &self.methods())
            .field("receivers", &self.receivers)
            .finish()
    }
}

fn resize_iframe(
    config: &CanvasConfig,
    host: &mut dyn GadgetHost,
    context: &CallContext,
    args: &[Value],
) -> Result<()> {
    let requested = args
        .first()
        .and_then(Value::as_f64)
        .ok_or_else(|| CanvasError::invalid_argument("resize_iframe expects a numeric height"))?;
    let height = requested.clamp(0.0, f64::from(config.max_height)) as u32;
    host.resize_iframe(context, height)
}

fn set_pref(
    _config: &CanvasConfig,
    host: &mut dyn GadgetHost,
    context: &CallContext,
    args: &[Value],
) -> Result<()> {
    let edit_token = string_arg(args, 0, SET_PREF)?;
    let name = string_arg(args, 1, SET_PREF)?;
    let value = string_arg(args, 2, SET_PREF)?;
    host.set_pref(context, edit_token, name, value)
}

fn set_title(
    _config: &CanvasConfig,
    host: &mut dyn GadgetHost,
    context: &CallContext,
    args: &[Value],
) -> Result<()> {
    let title = string_arg(args, 0, SET_TITLE)?;
    host.set_title(context, title)
}

fn request_navigate_to(
    _config: &CanvasConfig,
    host: &mut dyn GadgetHost,
    context: &CallContext,
    args: &[Value],
) -> Result<()> {
    let view = string_arg(args, 0, REQUEST_NAVIGATE_TO)?;
    host.request_navigate_to(context, view, args.get(1))
}

fn string_arg<'a>(args: &'a [Value], index: usize, method: &str) -> Result<&'a str> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        CanvasError::invalid_argument(format!("{method} expects a string at position {index}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::page::{Element, Location};

    fn page_with_frame() -> HostPage {
        let mut page = HostPage::new("http://host/portal");
        let frame = page.document.create_element(
            Element::new("iframe")
                .with_id("Application-3")
                .with_attr(
                    "src",
                    "http://host/ifr?view=home&url=http://g/a.xml#rpctoken=Application-3\
                     &st=&mid=3&synd=0&container=default&viewer=9&owner=9&aid=3&parent=http://host",
                )
                .with_height(150),
        );
        let header = page
            .document
            .create_element(Element::new("h2").with_id("header_Application-3"));
        let body = page.document.body();
        page.document.append_child(body, frame).unwrap();
        page.document.append_child(body, header).unwrap();
        page
    }

    fn bridge(page: &mut HostPage) -> ContainerBridge {
        ContainerBridge::install(page, CanvasConfig::default().with_max_height(500), Logger::disabled())
            .unwrap()
    }

    fn call(method: &str, sender: CallContext, args: Vec<Value>) -> RpcCall {
        RpcCall::new(method, sender, args)
    }

    #[test]
    fn receivers_can_be_dropped() {
        let mut page = page_with_frame();
        let mut bridge = bridge(&mut page);
        bridge.setup_receiver("Application-3");
        bridge.setup_receiver("Application-3");
        bridge.setup_receiver("Application-4");
        assert_eq!(bridge.registered_frames().len(), 2);

        bridge.remove_receiver("Application-3");
        assert!(!bridge.is_registered("Application-3"));
        assert!(bridge.is_registered("Application-4"));
    }

    #[test]
    fn second_install_on_same_page_fails() {
        let mut page = page_with_frame();
        let _first = bridge(&mut page);
        let err = ContainerBridge::install(&mut page, CanvasConfig::default(), Logger::disabled())
            .unwrap_err();
        assert!(matches!(err, CanvasError::State(_)));
    }

    #[test]
    fn resize_is_clamped_to_max_height() {
        let mut page = page_with_frame();
        let bridge = bridge(&mut page);

        bridge
            .dispatch(&mut page, &call(RESIZE_IFRAME, CallContext::from_frame("Application-3"), vec![json!(9000)]))
            .unwrap();
        let frame = page.document.element_by_id("Application-3").unwrap();
        assert_eq!(page.document.get(frame).unwrap().attr("height"), Some("500"));

        bridge
            .dispatch(&mut page, &call(RESIZE_IFRAME, CallContext::from_frame("Application-3"), vec![json!(-20)]))
            .unwrap();
        assert_eq!(page.document.height(frame), 0);
    }

    #[test]
    fn token_is_the_fallback_sender() {
        let mut page = page_with_frame();
        let bridge = bridge(&mut page);
        let context = CallContext {
            frame_id: Some(String::new()),
            rpc_token: Some("Application-3".into()),
        };

        bridge
            .dispatch(&mut page, &call(RESIZE_IFRAME, context, vec![json!(320)]))
            .unwrap();
        let frame = page.document.element_by_id("Application-3").unwrap();
        assert_eq!(page.document.height(frame), 320);
    }

    #[test]
    fn unknown_sender_is_a_no_op() {
        let mut page = page_with_frame();
        let bridge = bridge(&mut page);
        bridge
            .dispatch(&mut page, &call(RESIZE_IFRAME, CallContext::from_frame("nobody"), vec![json!(10)]))
            .unwrap();
        bridge
            .dispatch(&mut page, &call(SET_TITLE, CallContext::default(), vec![json!("x")]))
            .unwrap();
    }

    #[test]
    fn title_is_escaped_into_header() {
        let mut page = page_with_frame();
        let bridge = bridge(&mut page);
        bridge
            .dispatch(
                &mut page,
                &call(SET_TITLE, CallContext::from_frame("Application-3"), vec![json!("<b>Tom & Jerry</b>")]),
            )
            .unwrap();
        let header = page.document.element_by_id("header_Application-3").unwrap();
        assert_eq!(
            page.document.get(header).unwrap().text.as_deref(),
            Some("&lt;b>Tom &amp; Jerry&lt;/b>")
        );
    }

    #[test]
    fn navigation_follows_view_table() {
        let mut page = page_with_frame();
        let bridge = bridge(&mut page);
        let sender = CallContext::from_frame("Application-3");

        bridge
            .dispatch(&mut page, &call(REQUEST_NAVIGATE_TO, sender.clone(), vec![json!("profile")]))
            .unwrap();
        assert_eq!(page.location.href(), "http://host/profile/9");

        // Already there: no second navigation.
        bridge
            .dispatch(&mut page, &call(REQUEST_NAVIGATE_TO, sender.clone(), vec![json!("profile")]))
            .unwrap();
        assert_eq!(page.location.navigations().len(), 1);

        bridge
            .dispatch(&mut page, &call(REQUEST_NAVIGATE_TO, sender.clone(), vec![json!("unknown")]))
            .unwrap();
        assert_eq!(page.location.navigations().len(), 1);

        bridge
            .dispatch(
                &mut page,
                &call(REQUEST_NAVIGATE_TO, sender, vec![json!("canvas"), json!({"tab": "a b"})]),
            )
            .unwrap();
        assert_eq!(
            page.location.href(),
            "http://host/profile/application/9/3/3?appParams=%7B%22tab%22%3A%22a%20b%22%7D"
        );
    }

    #[test]
    fn home_navigation_leaves_a_dashboard() {
        let mut page = page_with_frame();
        page.location = Location::new("http://host/portal/dashboard");
        let bridge = bridge(&mut page);

        bridge
            .dispatch(
                &mut page,
                &call(REQUEST_NAVIGATE_TO, CallContext::from_frame("Application-3"), vec![json!("home")]),
            )
            .unwrap();
        assert_eq!(page.location.href(), "http://host/home");
        assert_eq!(page.location.navigations(), ["http://host/home"]);
    }

    #[test]
    fn navigation_skips_hrefs_that_contain_the_target() {
        let mut page = page_with_frame();
        page.location = Location::new("http://host/profile/91");
        let bridge = bridge(&mut page);

        bridge
            .dispatch(
                &mut page,
                &call(REQUEST_NAVIGATE_TO, CallContext::from_frame("Application-3"), vec![json!("profile")]),
            )
            .unwrap();
        assert_eq!(page.location.href(), "http://host/profile/91");
        assert!(page.location.navigations().is_empty());
    }

    #[test]
    fn unknown_method_and_bad_args_are_errors() {
        let sink = MemorySink::new();
        let mut page = page_with_frame();
        let bridge = ContainerBridge::install(
            &mut page,
            CanvasConfig::default(),
            Logger::new(sink.clone()).with_min_level(LogLevel::Debug),
        )
        .unwrap();
        let sender = CallContext::from_frame("Application-3");

        let err = bridge
            .dispatch(&mut page, &call("eval", sender.clone(), vec![]))
            .unwrap_err();
        assert!(matches!(err, CanvasError::UnknownRpcMethod(_)));

        let err = bridge
            .dispatch(&mut page, &call(RESIZE_IFRAME, sender, vec![json!("tall")]))
            .unwrap_err();
        assert!(matches!(err, CanvasError::InvalidArgument(_)));

        assert_eq!(sink.messages().iter().filter(|m| *m == "rpc_rejected").count(), 2);
        assert!(sink.contains("rpc_installed"));
    }

    #[test]
    fn set_pref_is_accepted_and_ignored() {
        let mut page = page_with_frame();
        let bridge = bridge(&mut page);
        let before = page.document.clone();
        bridge
            .dispatch(
                &mut page,
                &call(SET_PREF, CallContext::from_frame("Application-3"), vec![json!("tok"), json!("color"), json!("red")]),
            )
            .unwrap();
        assert_eq!(
            page.document.get(page.document.body()),
            before.get(before.body())
        );
    }

    #[test]
    fn calls_parse_from_json() {
        let raw = r#"{"method": "resize_iframe", "context": {"f": "", "t": "Application-1"}, "args": [200]}"#;
        let call = RpcCall::from_json_str(raw).unwrap();
        assert_eq!(call.context.sender_id(), Some("Application-1"));
        assert_eq!(call.args, vec![json!(200)]);
    }
}
