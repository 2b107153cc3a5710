use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::page::HostPage;

use super::core::CallContext;

/// Host-side effects a sandboxed gadget may request. Arguments arrive already
/// validated; implementations decide what an unknown sender means.
pub trait GadgetHost {
    fn resize_iframe(&mut self, context: &CallContext, height: u32) -> Result<()>;

    fn set_title(&mut self, context: &CallContext, title: &str) -> Result<()>;

    fn set_pref(
        &mut self,
        context: &CallContext,
        edit_token: &str,
        name: &str,
        value: &str,
    ) -> Result<()>;

    /// Navigates the top window to the page for `view`. The navigation is
    /// skipped whenever the current href already contains the target as a
    /// substring, so a page at `/profile/91` also suppresses a request for
    /// `/profile/9`.
    fn request_navigate_to(
        &mut self,
        context: &CallContext,
        view: &str,
        params: Option<&Value>,
    ) -> Result<()>;
}

/// Applies gadget requests to an in-memory [`HostPage`]. Requests naming a
/// frame that is not on the page are ignored.
pub struct PageHost<'a> {
    page: &'a mut HostPage,
}

impl<'a> PageHost<'a> {
    pub fn new(page: &'a mut HostPage) -> Self {
        Self { page }
    }
}

impl GadgetHost for PageHost<'_> {
    fn resize_iframe(&mut self, context: &CallContext, height: u32) -> Result<()> {
        let Some(sender) = context.sender_id() else {
            return Ok(());
        };
        let Some(node) = self.page.document.element_by_id(sender) else {
            return Ok(());
        };
        if let Some(frame) = self.page.document.get_mut(node) {
            frame.set_attr("height", height.to_string());
            frame.intrinsic_height = height;
        }
        Ok(())
    }

    fn set_title(&mut self, context: &CallContext, title: &str) -> Result<()> {
        let Some(sender) = context.sender_id() else {
            return Ok(());
        };
        let header_id = format!("header_{sender}");
        let Some(node) = self.page.document.element_by_id(&header_id) else {
            return Ok(());
        };
        if let Some(header) = self.page.document.get_mut(node) {
            header.text = Some(escape_title(title));
        }
        Ok(())
    }

    fn set_pref(&mut self, _: &CallContext, _: &str, _: &str, _: &str) -> Result<()> {
        Ok(())
    }

    fn request_navigate_to(
        &mut self,
        context: &CallContext,
        view: &str,
        params: Option<&Value>,
    ) -> Result<()> {
        let Some(sender) = context.sender_id() else {
            return Ok(());
        };
        let Some(src) = self
            .page
            .document
            .element_by_id(sender)
            .and_then(|node| self.page.document.get(node))
            .and_then(|frame| frame.attr("src"))
        else {
            return Ok(());
        };

        let frame_params = parse_frame_url(src);
        let lookup = |key: &str| frame_params.get(key).map(String::as_str).unwrap_or("");
        let Some(mut target) = url_for_view(view, lookup("owner"), lookup("aid"), lookup("mid"))
        else {
            return Ok(());
        };

        if let Some(params) = params.filter(|p| has_content(p)) {
            let encoded = serde_json::to_string(params)?;
            target.push_str("?appParams=");
            target.push_str(&urlencoding::encode(&encoded));
        }

        if !self.page.location.href().contains(&target) {
            self.page.location.navigate(&target);
        }
        Ok(())
    }
}

/// Only `&` and `<` are escaped, in that order.
pub fn escape_title(title: &str) -> String {
    title.replace('&', "&amp;").replace('<', "&lt;")
}

/// Split a sandbox url into its key/value pieces. Pieces are separated by
/// `?`, `#` and `&`; the first `=` separates key and value. Pieces without
/// `=` are dropped.
pub fn parse_frame_url(url: &str) -> HashMap<String, String> {
    url.split(['?', '#', '&'])
        .filter_map(|piece| piece.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn url_for_view(view: &str, person: &str, app: &str, module: &str) -> Option<String> {
    match view {
        "home" => Some("/home".to_string()),
        "profile" => Some(format!("/profile/{person}")),
        "canvas" => Some(format!("/profile/application/{person}/{app}/{module}")),
        _ => None,
    }
}

fn has_content(params: &Value) -> bool {
    match params {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}
