//! Gadget specs as served by the backend and the instances built from them.

use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;
use crate::error::{CanvasError, Result};

/// One gadget entry of a group, as returned by the group endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GadgetSpec {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub security_token: String,
    pub column: usize,
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl GadgetSpec {
    pub fn new(id: impl Into<String>, url: impl Into<String>, column: usize, order: usize) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            security_token: String::new(),
            column,
            order,
            title: None,
            icon: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = token.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub number_of_columns: usize,
    #[serde(default)]
    pub customizable: bool,
    pub name: String,
    #[serde(default)]
    pub viewer_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub view: String,
    #[serde(default)]
    pub gadgets: Vec<GadgetSpec>,
}

impl GroupSpec {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn context(&self) -> GroupContext {
        GroupContext {
            viewer_id: self.viewer_id.clone(),
            owner_id: self.owner_id.clone(),
            view: self.view.clone(),
        }
    }
}

/// Group-level values every instance of the group shares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupContext {
    pub viewer_id: String,
    pub owner_id: String,
    pub view: String,
}

/// A gadget placed in a group. Identity, source and token never change;
/// column and order follow drag-and-drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GadgetInstance {
    id: String,
    application_id: String,
    url: String,
    title: String,
    icon: Option<String>,
    security_token: String,
    viewer_id: String,
    owner_id: String,
    view: String,
    pub column: usize,
    pub order: usize,
}

impl GadgetInstance {
    pub fn from_spec(spec: &GadgetSpec, context: &GroupContext, config: &CanvasConfig) -> Result<Self> {
        if spec.id.trim().is_empty() {
            return Err(CanvasError::precondition("gadget id cannot be blank"));
        }
        if spec.url.trim().is_empty() {
            return Err(CanvasError::precondition(format!(
                "gadget `{}` has no source url",
                spec.id
            )));
        }
        Ok(Self {
            application_id: format!("{}{}", config.application_id_prefix, spec.id),
            id: spec.id.clone(),
            url: spec.url.clone(),
            title: spec.title.clone().unwrap_or_default(),
            icon: spec.icon.clone(),
            security_token: spec.security_token.clone(),
            viewer_id: context.viewer_id.clone(),
            owner_id: context.owner_id.clone(),
            view: if context.view.is_empty() {
                config.default_view.clone()
            } else {
                context.view.clone()
            },
            column: spec.column,
            order: spec.order,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Element id of the sandbox frame, also the frame's rpc token.
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn security_token(&self) -> &str {
        &self.security_token
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn gadget_element_id(&self) -> String {
        format!("gadget_{}", self.application_id)
    }

    pub fn header_element_id(&self) -> String {
        format!("header_{}", self.application_id)
    }

    /// Class derived from the title, with anything outside `[A-Za-z0-9_]`
    /// replaced by `_`.
    pub fn title_class(&self) -> String {
        self.title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }

    /// Source of the sandbox frame. The sandbox runtime reads these keys in
    /// this exact order, so neither order nor names may change.
    pub fn sandbox_url(&self, config: &CanvasConfig) -> String {
        let mut url = String::with_capacity(256);
        url.push_str(&config.iframe_base);
        if config.debug {
            url.push_str("?debug=true&nocache=1&");
        } else {
            url.push('?');
        }
        let params: [(&str, &str); 11] = [
            ("view=", self.view.as_str()),
            ("&url=", self.url.as_str()),
            ("#rpctoken=", self.application_id.as_str()),
            ("&st=", self.security_token.as_str()),
            ("&mid=", self.id.as_str()),
            ("&synd=", config.sync_id.as_str()),
            ("&container=", config.social_container.as_str()),
            ("&viewer=", self.viewer_id.as_str()),
            ("&owner=", self.owner_id.as_str()),
            ("&aid=", self.id.as_str()),
            ("&parent=", config.host.as_str()),
        ];
        for (key, value) in params {
            url.push_str(key);
            url.push_str(value);
        }
        url
    }
}
