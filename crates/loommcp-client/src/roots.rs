//! Client-exposed roots: URI boundaries the server may explore.
//!
//! The server reads them with `roots/list`; mutations fire the installed
//! change callback, which the client gates on the advertised
//! `roots.listChanged` capability and handshake completion.

use loommcp_protocol::types::{ListRootsResult, Root};
use loommcp_protocol::{Error, Result};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Callback fired when the root set changes
pub type RootsChangedFn = std::sync::Arc<dyn Fn() + Send + Sync>;

/// The client's current root set
#[derive(Default)]
pub struct RootsManager {
    roots: RwLock<Vec<Root>>,
    notify: Mutex<Option<RootsChangedFn>>,
}

impl RootsManager {
    /// Create an empty root set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root
    ///
    /// # Errors
    ///
    /// Rejects duplicate URIs.
    pub fn add(&self, root: Root) -> Result<()> {
        {
            let mut roots = self.roots.write();
            if roots.iter().any(|r| r.uri == root.uri) {
                return Err(Error::InvalidParams(format!(
                    "root already present: {}",
                    root.uri
                )));
            }
            debug!(uri = %root.uri, "root added");
            roots.push(root);
        }
        self.notify_changed();
        Ok(())
    }

    /// Remove a root by URI; returns whether it existed
    pub fn remove(&self, uri: &str) -> bool {
        let removed = {
            let mut roots = self.roots.write();
            let before = roots.len();
            roots.retain(|r| r.uri != uri);
            roots.len() != before
        };
        if removed {
            debug!(%uri, "root removed");
            self.notify_changed();
        }
        removed
    }

    /// Replace the entire root set
    pub fn set(&self, roots: Vec<Root>) {
        *self.roots.write() = roots;
        self.notify_changed();
    }

    /// The current root set
    pub fn list(&self) -> ListRootsResult {
        ListRootsResult {
            roots: self.roots.read().clone(),
        }
    }

    /// Install the change callback
    pub fn set_notify_changed(&self, callback: RootsChangedFn) {
        *self.notify.lock() = Some(callback);
    }

    fn notify_changed(&self) {
        if let Some(notify) = self.notify.lock().clone() {
            notify();
        }
    }
}

impl std::fmt::Debug for RootsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootsManager")
            .field("roots", &self.roots.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn root(uri: &str) -> Root {
        Root {
            uri: uri.to_string(),
            name: None,
        }
    }

    #[test]
    fn add_remove_and_list() {
        let roots = RootsManager::new();
        roots.add(root("file:///home/a")).unwrap();
        roots.add(root("file:///home/b")).unwrap();
        assert!(roots.add(root("file:///home/a")).is_err());

        assert_eq!(roots.list().roots.len(), 2);
        assert!(roots.remove("file:///home/a"));
        assert!(!roots.remove("file:///home/a"));
        assert_eq!(roots.list().roots.len(), 1);
    }

    #[test]
    fn mutations_fire_notify() {
        let roots = RootsManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        roots.set_notify_changed(Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        roots.add(root("file:///x")).unwrap();
        roots.remove("file:///x");
        roots.set(vec![root("file:///y")]);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
