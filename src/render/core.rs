use std::io::Write;

use crate::error::Result;
use crate::page::{Document, NodeId};

/// Renderer runtime parameters.
#[derive(Debug, Clone, Default)]
pub struct RendererSettings {
    /// Put every element on its own line, indented by depth.
    pub pretty: bool,
}

/// Serializes a page subtree as HTML markup.
pub struct HtmlRenderer {
    settings: RendererSettings,
}

impl HtmlRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self { settings }
    }

    pub fn with_default() -> Self {
        Self::new(RendererSettings::default())
    }

    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    pub fn render(&self, writer: &mut impl Write, document: &Document, root: NodeId) -> Result<()> {
        self.render_node(writer, document, root, 0)?;
        writer.flush()?;
        Ok(())
    }

    pub fn render_to_string(&self, document: &Document, root: NodeId) -> Result<String> {
        let mut output = Vec::new();
        self.render(&mut output, document, root)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn render_node(
        &self,
        writer: &mut impl Write,
        document: &Document,
        node: NodeId,
        depth: usize,
    ) -> Result<()> {
        let Some(element) = document.get(node) else {
            return Ok(());
        };

        if self.settings.pretty {
            write!(writer, "{}", "  ".repeat(depth))?;
        }
        write!(writer, "<{}", element.tag)?;
        if let Some(id) = element.id.as_ref() {
            write!(writer, " id=\"{}\"", escape_attr(id))?;
        }
        if !element.classes.is_empty() {
            write!(writer, " class=\"{}\"", escape_attr(&element.classes.join(" ")))?;
        }
        for (name, value) in element.attrs.iter().filter(|(name, _)| name != "style") {
            write!(writer, " {}=\"{}\"", name, escape_attr(value))?;
        }
        if let Some(style) = style_of(element.attr("style"), element.hidden, element.fixed_height) {
            write!(writer, " style=\"{}\"", escape_attr(&style))?;
        }
        write!(writer, ">")?;

        if let Some(text) = element.text.as_ref() {
            write!(writer, "{}", text)?;
        }

        let children = document.children(node);
        if self.settings.pretty && !children.is_empty() {
            writeln!(writer)?;
        }
        for child in children {
            self.render_node(writer, document, *child, depth + 1)?;
        }
        if self.settings.pretty && !children.is_empty() {
            write!(writer, "{}", "  ".repeat(depth))?;
        }

        write!(writer, "</{}>", element.tag)?;
        if self.settings.pretty {
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// Inline style followed by the visibility and height overrides.
fn style_of(inline: Option<&str>, hidden: bool, fixed_height: Option<u32>) -> Option<String> {
    let mut parts: Vec<String> = inline
        .map(|style| style.trim_end_matches(';'))
        .filter(|style| !style.is_empty())
        .map(str::to_string)
        .into_iter()
        .collect();
    if hidden {
        parts.push("display:none".to_string());
    }
    if let Some(height) = fixed_height {
        parts.push(format!("height:{height}px"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(";"))
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
