//! Page lifecycle hooks
//!
//! The wiki reports saves, deletions and purges; [`InvalidationTrigger`]
//! forwards each one unchanged to whatever tracks dependent pages.

use rawcss_page::PageTitle;
use std::sync::Arc;
use tracing::trace;

/// A page lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A new revision was saved
    Saved(PageTitle),
    /// The page was deleted
    Deleted(PageTitle),
    /// The page's rendered output was purged
    Purged(PageTitle),
}

impl PageEvent {
    /// Page the event is about
    #[inline]
    #[must_use]
    pub fn title(&self) -> &PageTitle {
        match self {
            Self::Saved(title) | Self::Deleted(title) | Self::Purged(title) => title,
        }
    }
}

/// Receives notice that a page may have changed
pub trait DependencySink: Send + Sync {
    /// Returns `true` if cached state was invalidated
    fn on_dependent_page_changed(&self, title: &PageTitle) -> bool;
}

impl<T: DependencySink + ?Sized> DependencySink for Arc<T> {
    fn on_dependent_page_changed(&self, title: &PageTitle) -> bool {
        (**self).on_dependent_page_changed(title)
    }
}

impl<T: DependencySink + ?Sized> DependencySink for &T {
    fn on_dependent_page_changed(&self, title: &PageTitle) -> bool {
        (**self).on_dependent_page_changed(title)
    }
}

/// Forwards page events to a [`DependencySink`]
#[derive(Debug, Clone)]
pub struct InvalidationTrigger<T> {
    sink: T,
}

impl<T: DependencySink> InvalidationTrigger<T> {
    /// Create trigger
    #[inline]
    #[must_use]
    pub fn new(sink: T) -> Self {
        Self { sink }
    }

    /// Forward `event`; `true` if it invalidated anything
    pub fn handle(&self, event: &PageEvent) -> bool {
        trace!(?event, "page event");
        self.sink.on_dependent_page_changed(event.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawcss_page::Namespace;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<PageTitle>>,
    }

    impl DependencySink for Recorder {
        fn on_dependent_page_changed(&self, title: &PageTitle) -> bool {
            self.seen.lock().unwrap().push(title.clone());
            title.text().ends_with(".css")
        }
    }

    #[test]
    fn every_event_kind_is_forwarded() {
        let recorder = Arc::new(Recorder::default());
        let trigger = InvalidationTrigger::new(Arc::clone(&recorder));
        let css = PageTitle::new(Namespace::RAWCSS, "A.css").unwrap();
        let other = PageTitle::new(Namespace::MAIN, "Talk").unwrap();

        assert!(trigger.handle(&PageEvent::Saved(css.clone())));
        assert!(trigger.handle(&PageEvent::Deleted(css.clone())));
        assert!(!trigger.handle(&PageEvent::Purged(other.clone())));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![css.clone(), css, other]);
    }
}
