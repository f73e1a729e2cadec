//! Widget handles and the render capability.
//!
//! # Responsibility
//! - Give every live UI unit a shared handle with identity semantics.
//! - Notify observers exactly once when the widget is disposed.
//!
//! # Invariants
//! - Two handles are equal only when they point at the same widget.
//! - `dispose()` is idempotent; disposal listeners run on the first call only.
//! - No internal lock is held while a listener runs.

use crate::shared::lock;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Render capability implemented by concrete widget content.
pub trait Render: Send + Sync {
    /// Produces the widget's current fragment.
    fn render(&self) -> String;
}

impl Render for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl Render for &'static str {
    fn render(&self) -> String {
        (*self).to_string()
    }
}

type DisposeListener = Box<dyn FnOnce(&Widget) + Send>;

struct WidgetInner {
    id: String,
    title: Mutex<String>,
    content: Box<dyn Render>,
    disposed: AtomicBool,
    listeners: Mutex<Vec<DisposeListener>>,
}

/// Shared widget handle.
#[derive(Clone)]
pub struct Widget {
    inner: Arc<WidgetInner>,
}

impl Widget {
    /// Creates a widget whose title defaults to its id.
    pub fn new(id: impl Into<String>, content: impl Render + 'static) -> Self {
        let id = id.into();
        Self {
            inner: Arc::new(WidgetInner {
                title: Mutex::new(id.clone()),
                id,
                content: Box::new(content),
                disposed: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn title(&self) -> String {
        lock(&self.inner.title).clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *lock(&self.inner.title) = title.into();
    }

    pub fn render(&self) -> String {
        self.inner.content.render()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Registers a one-shot disposal listener.
    ///
    /// Returns `false` (and drops the listener) when the widget is already
    /// disposed.
    pub fn on_disposed(&self, listener: impl FnOnce(&Widget) + Send + 'static) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        if self.is_disposed() {
            return false;
        }
        listeners.push(Box::new(listener));
        true
    }

    /// Disposes the widget. Repeated calls are no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = std::mem::take(&mut *lock(&self.inner.listeners));
        for listener in listeners {
            listener(self);
        }
    }

    /// Returns whether both handles point at the same widget.
    pub fn same(&self, other: &Widget) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Widget {}

impl Debug for Widget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Widget;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn dispose_is_idempotent_and_notifies_once() {
        let widget = Widget::new("editor-1", "body");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        assert!(widget.on_disposed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        widget.dispose();
        widget.dispose();

        assert!(widget.is_disposed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_listener_after_disposal() {
        let widget = Widget::new("editor-1", "body");
        widget.dispose();
        assert!(!widget.on_disposed(|_| {}));
    }

    #[test]
    fn equality_is_identity() {
        let first = Widget::new("same-id", "a");
        let second = Widget::new("same-id", "a");
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }

    #[test]
    fn renders_content_and_tracks_title() {
        let widget = Widget::new("editor-1", String::from("<p>hi</p>"));
        assert_eq!(widget.render(), "<p>hi</p>");
        assert_eq!(widget.title(), "editor-1");
        widget.set_title("Notes");
        assert_eq!(widget.title(), "Notes");
    }
}
