//! Element ownership across supervision scopes

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::controller::policy::Scope;
use crate::page::ElementId;

/// Who is responsible for an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Controller(Scope),
    /// A player created by a lazy preview; nobody supervises it
    LazyPlayer,
}

#[derive(Debug, Default)]
struct Claims {
    by_element: HashMap<ElementId, (String, Owner)>,
    by_identity: HashMap<String, ElementId>,
    /// Identities promised to an owner before their element exists
    reserved: HashMap<String, Owner>,
}

/// Records which owner holds each element.
///
/// Claims are keyed by the node, so two elements that happen to share an
/// `id` attribute are still told apart. The first scope to claim an element
/// supervises it; later scans by any scope leave it alone.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claims: Mutex<Claims>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh element identity, e.g. `embed-3f2a9c1d`
    pub fn new_identity(prefix: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", prefix, &suffix[..8])
    }

    /// Promise `identity` to `owner` ahead of inserting the element carrying it.
    /// False when the identity is already reserved or held.
    pub async fn reserve(&self, identity: &str, owner: Owner) -> bool {
        let mut claims = self.claims.lock().await;
        if claims.reserved.contains_key(identity) || claims.by_identity.contains_key(identity) {
            debug!("Identity {} is already taken", identity);
            return false;
        }
        claims.reserved.insert(identity.to_string(), owner);
        true
    }

    /// True when `owner` now holds `element` under `identity`.
    ///
    /// Refused when the element is already claimed, when another element
    /// holds the identity, or when the identity is reserved for someone else.
    pub async fn try_claim(&self, element: ElementId, identity: &str, owner: Owner) -> bool {
        let mut claims = self.claims.lock().await;
        if let Some((held, current)) = claims.by_element.get(&element) {
            debug!("{} ({}) already claimed by {:?}", element, held, current);
            return false;
        }
        if let Some(holder) = claims.by_identity.get(identity) {
            debug!("Identity {} already held by {}", identity, holder);
            return false;
        }
        match claims.reserved.get(identity).copied() {
            Some(reserved) if reserved != owner => {
                debug!("Identity {} is reserved for {:?}", identity, reserved);
                return false;
            }
            Some(_) => {
                claims.reserved.remove(identity);
            }
            None => {}
        }

        claims
            .by_element
            .insert(element, (identity.to_string(), owner));
        claims.by_identity.insert(identity.to_string(), element);
        true
    }

    pub async fn owner(&self, element: ElementId) -> Option<Owner> {
        self.claims
            .lock()
            .await
            .by_element
            .get(&element)
            .map(|(_, owner)| *owner)
    }

    /// Element claimed under `identity`, if any
    pub async fn holder(&self, identity: &str) -> Option<ElementId> {
        self.claims.lock().await.by_identity.get(identity).copied()
    }

    pub async fn len(&self) -> usize {
        self.claims.lock().await.by_element.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.claims.lock().await.by_element.is_empty()
    }
}
