//! In-memory page model
//!
//! Backs the headless CLI and the test suite. It keeps just enough of a
//! document tree to answer the [`Page`] queries: tags, classes, attributes,
//! text and parent/child links, plus click subscriptions and a record of
//! injected scripts.

use crate::page::models::{ElementId, Markup, Query};
use crate::page::traits::Page;
use crate::player::loader::{ReadySlot, ScriptInjector};
use crate::utils::error::EmbedError;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;
use url::Url;

const BODY: ElementId = ElementId(0);

#[derive(Debug)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

#[derive(Debug)]
struct Dom {
    nodes: HashMap<ElementId, Node>,
    next_id: u64,
    listeners: HashMap<ElementId, mpsc::Sender<()>>,
    removal_watchers: HashMap<ElementId, Vec<oneshot::Sender<()>>>,
}

impl Dom {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            BODY,
            Node {
                tag: "body".to_string(),
                classes: Vec::new(),
                attributes: BTreeMap::new(),
                text: None,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            next_id: 1,
            listeners: HashMap::new(),
            removal_watchers: HashMap::new(),
        }
    }

    fn insert(&mut self, parent: ElementId, markup: Markup) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            Node {
                tag: markup.tag,
                classes: markup.classes,
                attributes: markup.attributes,
                text: markup.text,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        for child in markup.children {
            self.insert(id, child);
        }
        id
    }

    /// Remove `id` and its subtree from the document
    fn detach(&mut self, id: ElementId) {
        if let Some(node) = self.nodes.remove(&id) {
            self.listeners.remove(&id);
            for watcher in self.removal_watchers.remove(&id).unwrap_or_default() {
                let _ = watcher.send(());
            }
            for child in node.children {
                self.detach(child);
            }
        }
    }

    fn descendants(&self, root: ElementId, out: &mut Vec<ElementId>) {
        if let Some(node) = self.nodes.get(&root) {
            for child in &node.children {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }

    fn snapshot(&self, id: ElementId) -> Option<Markup> {
        let node = self.nodes.get(&id)?;
        Some(Markup {
            tag: node.tag.clone(),
            classes: node.classes.clone(),
            attributes: node.attributes.clone(),
            text: node.text.clone(),
            children: node
                .children
                .iter()
                .filter_map(|c| self.snapshot(*c))
                .collect(),
        })
    }
}

/// A document held entirely in memory
pub struct MemoryPage {
    url: Url,
    dom: Mutex<Dom>,
    scripts: Mutex<Vec<String>>,
    hold_scripts: bool,
    held_slots: Mutex<Vec<ReadySlot>>,
}

impl MemoryPage {
    /// Empty `<body>` at `url`
    pub fn new(url: Url) -> Self {
        Self {
            url,
            dom: Mutex::new(Dom::new()),
            scripts: Mutex::new(Vec::new()),
            hold_scripts: false,
            held_slots: Mutex::new(Vec::new()),
        }
    }

    /// Document whose body holds `body`
    pub fn with_body(url: Url, body: Vec<Markup>) -> Self {
        let mut dom = Dom::new();
        for markup in body {
            dom.insert(BODY, markup);
        }
        Self {
            dom: Mutex::new(dom),
            ..Self::new(url)
        }
    }

    /// Keep injected scripts pending until [`MemoryPage::finish_script_loads`]
    pub fn holding_scripts(mut self) -> Self {
        self.hold_scripts = true;
        self
    }

    pub fn body(&self) -> ElementId {
        BODY
    }

    /// Script sources injected so far, in order
    pub async fn scripts(&self) -> Vec<String> {
        self.scripts.lock().await.clone()
    }

    /// Fire the ready callback of every held script load
    pub async fn finish_script_loads(&self) -> usize {
        let slots: Vec<ReadySlot> = self.held_slots.lock().await.drain(..).collect();
        slots.iter().filter(|slot| slot.resolve()).count()
    }

    /// Deliver a click; false when nobody listens on `element`
    pub async fn click(&self, element: ElementId) -> bool {
        let sender = self.dom.lock().await.listeners.get(&element).cloned();
        match sender {
            Some(tx) => tx.try_send(()).is_ok(),
            None => false,
        }
    }

    /// Remove `element` and its subtree, as a page script would
    pub async fn remove(&self, element: ElementId) -> bool {
        let mut dom = self.dom.lock().await;
        let parent = match dom.nodes.get(&element) {
            Some(node) => node.parent,
            None => return false,
        };
        if let Some(parent) = parent.and_then(|p| dom.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != element);
        }
        dom.detach(element);
        true
    }

    pub async fn snapshot(&self, element: ElementId) -> Option<Markup> {
        self.dom.lock().await.snapshot(element)
    }

    /// The body's children as HTML
    pub async fn render_html(&self) -> String {
        let dom = self.dom.lock().await;
        dom.snapshot(BODY)
            .map(|body| {
                body.children
                    .iter()
                    .map(Markup::to_html)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Page for MemoryPage {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn find_all(&self, query: &Query) -> Vec<ElementId> {
        let dom = self.dom.lock().await;
        let mut candidates = Vec::new();
        dom.descendants(query.within.unwrap_or(BODY), &mut candidates);

        candidates
            .into_iter()
            .filter(|id| {
                let Some(node) = dom.nodes.get(id) else {
                    return false;
                };
                let tag_ok = query.tag.as_ref().map_or(true, |t| node.tag == *t);
                let class_ok = query
                    .class
                    .as_ref()
                    .map_or(true, |c| node.classes.iter().any(|nc| nc == c));
                tag_ok && class_ok
            })
            .collect()
    }

    async fn contains(&self, element: ElementId) -> bool {
        self.dom.lock().await.nodes.contains_key(&element)
    }

    async fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        let dom = self.dom.lock().await;
        dom.nodes.get(&element)?.attributes.get(name).cloned()
    }

    async fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<()> {
        let mut dom = self.dom.lock().await;
        let node = dom
            .nodes
            .get_mut(&element)
            .ok_or_else(|| EmbedError::ElementDetached(element.to_string()))?;
        node.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn has_class(&self, element: ElementId, class: &str) -> bool {
        let dom = self.dom.lock().await;
        dom.nodes
            .get(&element)
            .map_or(false, |n| n.classes.iter().any(|c| c == class))
    }

    async fn closest(&self, element: ElementId, class: &str) -> Option<ElementId> {
        let dom = self.dom.lock().await;
        let mut cursor = Some(element);
        while let Some(id) = cursor {
            let node = dom.nodes.get(&id)?;
            if node.classes.iter().any(|c| c == class) {
                return Some(id);
            }
            cursor = node.parent;
        }
        None
    }

    async fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.dom.lock().await.nodes.get(&element)?.parent
    }

    async fn replace_children(
        &self,
        element: ElementId,
        content: Vec<Markup>,
    ) -> Result<Vec<ElementId>> {
        let mut dom = self.dom.lock().await;
        let old_children = match dom.nodes.get_mut(&element) {
            Some(node) => std::mem::take(&mut node.children),
            None => return Err(EmbedError::ElementDetached(element.to_string()).into()),
        };
        for child in old_children {
            dom.detach(child);
        }
        Ok(content
            .into_iter()
            .map(|markup| dom.insert(element, markup))
            .collect())
    }

    async fn activations(&self, element: ElementId) -> Result<mpsc::Receiver<()>> {
        let mut dom = self.dom.lock().await;
        if !dom.nodes.contains_key(&element) {
            return Err(EmbedError::ElementDetached(element.to_string()).into());
        }
        let (tx, rx) = mpsc::channel(4);
        dom.listeners.insert(element, tx);
        Ok(rx)
    }

    async fn removal(&self, element: ElementId) -> Result<oneshot::Receiver<()>> {
        let mut dom = self.dom.lock().await;
        if !dom.nodes.contains_key(&element) {
            return Err(EmbedError::ElementDetached(element.to_string()).into());
        }
        let (tx, rx) = oneshot::channel();
        dom.removal_watchers.entry(element).or_default().push(tx);
        Ok(rx)
    }
}

#[async_trait]
impl ScriptInjector for MemoryPage {
    async fn inject(&self, src: &str, slot: ReadySlot) -> Result<()> {
        debug!("Injecting script {}", src);
        self.scripts.lock().await.push(src.to_string());
        if self.hold_scripts {
            self.held_slots.lock().await.push(slot);
        } else {
            // The ready callback runs on a later turn of the event loop
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                slot.resolve();
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MemoryPage {
        MemoryPage::with_body(
            Url::parse("https://example.com/").unwrap(),
            vec![Markup::new("section").class("video-embed").child(
                Markup::new("iframe")
                    .class("js-video-embed")
                    .attr("src", "https://www.youtube.com/embed/abc123XYZ"),
            )],
        )
    }

    #[tokio::test]
    async fn queries_match_tag_and_class() {
        let page = page();
        let iframes = page.find_all(&Query::tag("iframe")).await;
        assert_eq!(iframes.len(), 1);
        let marked = page
            .find_all(&Query::tag("iframe").with_class("js-video-embed"))
            .await;
        assert_eq!(marked, iframes);
        assert!(page.find_all(&Query::class("missing")).await.is_empty());
    }

    #[tokio::test]
    async fn closest_walks_ancestors_and_replace_detaches_subtree() {
        let page = page();
        let iframe = page.find_all(&Query::tag("iframe")).await[0];
        let section = page.closest(iframe, "video-embed").await.unwrap();
        assert_eq!(page.parent(iframe).await, Some(section));

        let inserted = page
            .replace_children(section, vec![Markup::new("p").text("gone")])
            .await
            .unwrap();
        assert_eq!(inserted.len(), 1);
        assert!(!page.contains(iframe).await);
        assert!(page.set_attribute(iframe, "src", "x").await.is_err());
        assert_eq!(page.render_html().await, "<section class=\"video-embed\"><p>gone</p></section>");
    }

    #[tokio::test]
    async fn click_reaches_latest_subscriber() {
        let page = page();
        let iframe = page.find_all(&Query::tag("iframe")).await[0];
        assert!(!page.click(iframe).await);
        let mut rx = page.activations(iframe).await.unwrap();
        assert!(page.click(iframe).await);
        assert_eq!(rx.recv().await, Some(()));
    }

    #[tokio::test]
    async fn removal_fires_for_removed_subtree() {
        let page = page();
        let iframe = page.find_all(&Query::tag("iframe")).await[0];
        let section = page.parent(iframe).await.unwrap();
        let mut removed = page.removal(iframe).await.unwrap();
        assert!(removed.try_recv().is_err());

        assert!(page.remove(section).await);
        assert_eq!(removed.await, Ok(()));
        assert!(page.removal(iframe).await.is_err());
    }

    #[tokio::test]
    async fn origin_comes_from_url() {
        let page = MemoryPage::new(Url::parse("https://example.com:8443/a/b?q=1").unwrap());
        assert_eq!(page.origin(), "https://example.com:8443");
    }
}
