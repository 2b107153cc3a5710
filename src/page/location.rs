/// Top-level browsing location of the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    href: String,
    history: Vec<String>,
}

impl Location {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            history: Vec::new(),
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// `scheme://host[:port]` part of the current href.
    pub fn origin(&self) -> &str {
        let after_scheme = self.href.find("://").map(|idx| idx + 3).unwrap_or(0);
        match self.href[after_scheme..].find('/') {
            Some(slash) => &self.href[..after_scheme + slash],
            None => &self.href,
        }
    }

    /// Full navigation. Root-relative targets resolve against the origin.
    pub fn navigate(&mut self, target: &str) {
        let resolved = if target.starts_with('/') {
            format!("{}{}", self.origin(), target)
        } else {
            target.to_string()
        };
        self.history.push(resolved.clone());
        self.href = resolved;
    }

    /// Every navigation performed, oldest first.
    pub fn navigations(&self) -> &[String] {
        &self.history
    }
}
