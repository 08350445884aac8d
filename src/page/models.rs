//! Page node handles and markup trees

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Non-owning handle to a node in the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Detached markup, inserted with [`crate::page::Page::replace_children`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markup {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Markup>,
}

impl Markup {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: Markup) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first search for any node with this tag, including `self`
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tag == tag || self.children.iter().any(|c| c.contains_tag(tag))
    }

    /// All nodes with this tag, depth-first
    pub fn find_all<'a>(&'a self, tag: &str) -> Vec<&'a Markup> {
        let mut found = Vec::new();
        self.collect(tag, &mut found);
        found
    }

    fn collect<'a>(&'a self, tag: &str, out: &mut Vec<&'a Markup>) {
        if self.tag == tag {
            out.push(self);
        }
        for child in &self.children {
            child.collect(tag, out);
        }
    }

    /// Serialize as HTML for diagnostics. Attribute values are escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        if !self.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape(&self.classes.join(" "))));
        }
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text));
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str(&format!("</{}>", self.tag));
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Element lookup. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub tag: Option<String>,
    pub class: Option<String>,
    /// Restrict to descendants of this node
    pub within: Option<ElementId>,
}

impl Query {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn within(mut self, root: ElementId) -> Self {
        self.within = Some(root);
        self
    }
}
