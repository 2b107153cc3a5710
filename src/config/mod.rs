//! Startup configuration read once when the host page boots.
//!
//! Both structs deserialize from camelCase JSON with every field optional, so a
//! host can inject only what differs from the defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CanvasError, Result};
use crate::logging::LogLevel;

pub const DEFAULT_MAX_HEIGHT: u32 = 4096;
pub const DEFAULT_APPLICATION_PREFIX: &str = "Application-";
pub const IFRAME_PATH: &str = "/module/shindig/gadgets/ifr";
pub const RELAY_PATH: &str = "/module/gadgetcontainer/assets/rpc_relay.html";
pub const GADGET_CONTAINER_PATH: &str = "/module/gadgetcontainer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    /// Scheme, host and port of the page, e.g. `http://localhost:8098`.
    pub host: String,
    /// Web application context path prepended to every backend endpoint.
    pub base_path: String,
    /// Endpoint rendering a gadget inside its sandbox frame.
    pub iframe_base: String,
    /// Relay page used by older sandbox runtimes for cross-frame messaging.
    pub relay_file: String,
    pub social_container: String,
    pub default_view: String,
    pub sync_id: String,
    pub debug: bool,
    pub max_height: u32,
    pub application_id_prefix: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self::for_host("http://localhost:8098", "")
    }
}

impl CanvasConfig {
    /// Derive the sandbox and relay endpoints from the host origin and context path.
    pub fn for_host(host: impl Into<String>, base_path: impl Into<String>) -> Self {
        let host = host.into();
        let base_path = base_path.into();
        Self {
            iframe_base: format!("{host}{base_path}{IFRAME_PATH}"),
            relay_file: format!("{host}{base_path}{RELAY_PATH}"),
            host,
            base_path,
            social_container: "default".to_string(),
            default_view: "default".to_string(),
            sync_id: "0".to_string(),
            debug: false,
            max_height: DEFAULT_MAX_HEIGHT,
            application_id_prefix: DEFAULT_APPLICATION_PREFIX.to_string(),
        }
    }

    /// Parse startup JSON. Sandbox and relay endpoints left out of the input
    /// are derived from its `host` and `basePath`, not the default host.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let mut config: Self = serde_json::from_value(value.clone())?;
        let derived = Self::for_host(config.host.as_str(), config.base_path.as_str());
        if value.get("iframeBase").is_none() {
            config.iframe_base = derived.iframe_base;
        }
        if value.get("relayFile").is_none() {
            config.relay_file = derived.relay_file;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.max_height = max_height;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CanvasError::precondition("host cannot be blank"));
        }
        if self.iframe_base.trim().is_empty() {
            return Err(CanvasError::precondition("iframe base cannot be blank"));
        }
        if self.application_id_prefix.is_empty() {
            return Err(CanvasError::precondition(
                "application id prefix cannot be empty",
            ));
        }
        Ok(())
    }

    /// Absolute url of a gadget container endpoint, e.g. `moveGadget.do`.
    pub fn endpoint(&self, action: &str) -> String {
        format!(
            "{}{}{}/{}",
            self.host, self.base_path, GADGET_CONTAINER_PATH, action
        )
    }

    /// Debug hosts log everything; production hosts only log notable events.
    pub fn log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderConfig {
    pub base_path: String,
    /// Path under which script modules are served.
    pub module_path: String,
    /// Action resolving a file list into its dependency manifest.
    pub resolve_action: String,
    /// Files already present on the page; they are never fetched again.
    pub skip_files: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            module_path: "/module/jsmodule".to_string(),
            resolve_action: "/action/resolveDependencies.do".to_string(),
            skip_files: Vec::new(),
        }
    }
}

impl LoaderConfig {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn with_skip_file(mut self, file: impl Into<String>) -> Self {
        self.skip_files.push(file.into());
        self
    }

    pub fn script_url(&self, file: &str) -> String {
        format!("{}{}{}", self.base_path, self.module_path, file)
    }

    pub fn resolve_endpoint(&self) -> String {
        format!("{}{}{}", self.base_path, self.module_path, self.resolve_action)
    }

    pub fn skips(&self, file: &str) -> bool {
        self.skip_files.iter().any(|skip| skip == file)
    }
}
