//! Client pages controlled by the engine.
//!
//! The host owns the real pages; the engine only needs to claim them on
//! activation and to release and reload them on unregister.

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Host-side view of open client pages.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Take control of every open page. Returns the number claimed.
    async fn claim(&self) -> usize;

    /// Give up control of every page.
    async fn release(&self);

    /// Reload every open page. Returns the number reloaded.
    async fn reload_all(&self) -> usize;
}

/// An open page as tracked by [`PageRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: u64,
    pub url: String,
    pub controlled: bool,
    pub reloads: u32,
}

/// In-memory [`ClientHost`].
#[derive(Debug, Default)]
pub struct PageRegistry {
    pages: RwLock<Vec<Page>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open page. Returns its id.
    pub async fn open_page(&self, url: impl Into<String>) -> u64 {
        let mut pages = self.pages.write().await;
        let id = pages.last().map_or(1, |p| p.id + 1);
        pages.push(Page { id, url: url.into(), controlled: false, reloads: 0 });
        id
    }

    pub async fn close_page(&self, id: u64) -> bool {
        let mut pages = self.pages.write().await;
        let before = pages.len();
        pages.retain(|p| p.id != id);
        pages.len() != before
    }

    pub async fn pages(&self) -> Vec<Page> {
        self.pages.read().await.clone()
    }
}

#[async_trait]
impl ClientHost for PageRegistry {
    async fn claim(&self) -> usize {
        let mut pages = self.pages.write().await;
        pages.iter_mut().for_each(|p| p.controlled = true);
        pages.len()
    }

    async fn release(&self) {
        let mut pages = self.pages.write().await;
        pages.iter_mut().for_each(|p| p.controlled = false);
    }

    async fn reload_all(&self) -> usize {
        let mut pages = self.pages.write().await;
        for page in pages.iter_mut() {
            page.reloads += 1;
            tracing::debug!(page = page.id, url = %page.url, "reloading page");
        }
        pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_controls_all_pages() {
        let registry = PageRegistry::new();
        registry.open_page("/static/").await;
        registry.open_page("/dashboard").await;

        assert_eq!(registry.claim().await, 2);
        assert!(registry.pages().await.iter().all(|p| p.controlled));
    }

    #[tokio::test]
    async fn test_release_and_reload() {
        let registry = PageRegistry::new();
        let id = registry.open_page("/static/").await;
        registry.claim().await;

        registry.release().await;
        assert_eq!(registry.reload_all().await, 1);

        let page = &registry.pages().await[0];
        assert_eq!(page.id, id);
        assert!(!page.controlled);
        assert_eq!(page.reloads, 1);
    }

    #[tokio::test]
    async fn test_close_page() {
        let registry = PageRegistry::new();
        let a = registry.open_page("/a").await;
        let b = registry.open_page("/b").await;
        assert_ne!(a, b);

        assert!(registry.close_page(a).await);
        assert!(!registry.close_page(a).await);
        assert_eq!(registry.pages().await.len(), 1);
    }
}
