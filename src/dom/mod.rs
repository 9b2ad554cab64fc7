//! Host DOM substrate
//!
//! Components never reach into a global document. They receive a [`SharedDom`]
//! at construction and go through the [`Dom`] trait for everything: element
//! lookup inside their fragment, value and attribute access, region
//! replacement, script execution, error presentation and native listeners.
//!
//! [`MemoryDom`] is the in-process implementation used by the harness binary
//! and the tests.

mod memory;

pub use memory::MemoryDom;

use std::cell::RefCell;
use std::rc::Rc;

/// DOM handle shared by every component on a page (single UI thread)
pub type SharedDom = Rc<RefCell<dyn Dom>>;

/// Native listener: `(element, event) -> allow default/propagation`
///
/// Component callbacks return `false` to claim the event.
pub type NativeListener = Rc<dyn Fn(&ElementRef, &NativeEvent) -> bool>;

/// Reference to an element by its DOM id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Native events components subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEventKind {
    Click,
    Change,
    Submit,
}

/// A native event as delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEvent {
    pub kind: NativeEventKind,
    pub target: ElementRef,
}

/// Operations the host document must provide
pub trait Dom {
    /// Look up `id` inside the fragment rooted at `scope`
    fn find(&self, scope: &ElementRef, id: &str) -> Option<ElementRef>;

    /// Lower-case tag name (`"a"`, `"select"`, ...)
    fn tag_name(&self, element: &ElementRef) -> Option<String>;

    fn value(&self, element: &ElementRef) -> Option<String>;

    fn set_value(&mut self, element: &ElementRef, value: &str);

    fn is_disabled(&self, element: &ElementRef) -> bool;

    fn set_disabled(&mut self, element: &ElementRef, disabled: bool);

    fn attribute(&self, element: &ElementRef, name: &str) -> Option<String>;

    fn set_attribute(&mut self, element: &ElementRef, name: &str, value: &str);

    /// Swap the region out for `markup`
    ///
    /// The old subtree and its listeners are gone before the new markup is
    /// attached; nothing can observe both at once.
    fn replace_with(&mut self, region: &ElementRef, markup: &str);

    fn execute_script(&mut self, script: &str);

    /// Show a server-provided or generic failure message to the user
    fn present_error(&mut self, message: &str);

    fn navigate(&mut self, url: &str);

    fn listen(&mut self, element: &ElementRef, kind: NativeEventKind, listener: NativeListener);

    /// Listeners currently attached to `element` for `kind`
    fn listeners(&self, element: &ElementRef, kind: NativeEventKind) -> Vec<NativeListener>;
}

/// Deliver a native event to an element's listeners
///
/// The listener list is copied out and the DOM borrow released before any
/// listener runs, so listeners are free to borrow the DOM themselves.
/// Returns `false` if any listener claimed the event.
pub fn dispatch(dom: &SharedDom, target: &ElementRef, kind: NativeEventKind) -> bool {
    let listeners = dom.borrow().listeners(target, kind);
    let event = NativeEvent {
        kind,
        target: target.clone(),
    };

    tracing::debug!(element = %target, ?kind, listeners = listeners.len(), "native event");
    listeners
        .iter()
        .fold(true, |proceed, listener| listener(target, &event) && proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_dispatch_without_listeners_proceeds() {
        let dom: SharedDom = Rc::new(RefCell::new(MemoryDom::new()));
        assert!(dispatch(&dom, &ElementRef::new("missing"), NativeEventKind::Click));
    }

    #[test]
    fn test_dispatch_runs_all_listeners_and_combines_result() {
        let memory = MemoryDom::with_region("form", r#"<form id="form"><a id="go">Go</a></form>"#);
        let dom: SharedDom = Rc::new(RefCell::new(memory));
        let link = ElementRef::new("go");
        let calls = Rc::new(Cell::new(0));

        for verdict in [false, true] {
            let calls = Rc::clone(&calls);
            dom.borrow_mut().listen(
                &link,
                NativeEventKind::Click,
                Rc::new(move |_: &ElementRef, _: &NativeEvent| {
                    calls.set(calls.get() + 1);
                    verdict
                }),
            );
        }

        assert!(!dispatch(&dom, &link, NativeEventKind::Click));
        assert_eq!(calls.get(), 2);
        assert!(dispatch(&dom, &link, NativeEventKind::Change));
    }

    #[test]
    fn test_listener_may_borrow_dom() {
        let memory = MemoryDom::with_region("f", r#"<input id="name" value="a">"#);
        let dom: SharedDom = Rc::new(RefCell::new(memory));
        let input = ElementRef::new("name");

        let handle = Rc::clone(&dom);
        dom.borrow_mut().listen(
            &input,
            NativeEventKind::Change,
            Rc::new(move |element: &ElementRef, _: &NativeEvent| {
                handle.borrow_mut().set_value(element, "changed");
                true
            }),
        );

        dispatch(&dom, &input, NativeEventKind::Change);
        assert_eq!(dom.borrow().value(&input).as_deref(), Some("changed"));
    }
}
