use crate::page::models::{ElementId, Markup, Query};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use url::Url;

/// DOM primitives the embed pipeline needs from the hosting page
///
/// This trait isolates controllers and presenters from the concrete page
/// (a browser document, a headless fixture, a test double).
#[async_trait]
pub trait Page: Send + Sync {
    /// URL of the document; relative locators resolve against it
    fn url(&self) -> &Url;

    /// Serialized origin, passed to the player API for cross-frame control
    fn origin(&self) -> String {
        self.url().origin().ascii_serialization()
    }

    /// Elements matching `query`, in document order
    async fn find_all(&self, query: &Query) -> Vec<ElementId>;

    /// Whether the node is still attached to the document
    async fn contains(&self, element: ElementId) -> bool;

    async fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    async fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<()>;

    async fn has_class(&self, element: ElementId, class: &str) -> bool;

    /// Nearest inclusive ancestor carrying `class`
    async fn closest(&self, element: ElementId, class: &str) -> Option<ElementId>;

    async fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Drop every child of `element` and insert `content` in their place.
    ///
    /// Returns the ids of the inserted top-level nodes.
    async fn replace_children(&self, element: ElementId, content: Vec<Markup>)
        -> Result<Vec<ElementId>>;

    /// Click/tap stream for an element. Only the latest subscriber is notified.
    async fn activations(&self, element: ElementId) -> Result<mpsc::Receiver<()>>;

    /// Resolves when `element` leaves the document, directly or with an
    /// ancestor. Fails when it is already gone.
    async fn removal(&self, element: ElementId) -> Result<oneshot::Receiver<()>>;
}
