//! Callback binding for components
//!
//! External schedulers (the upload engine, native DOM listeners, transport
//! completions) call back with their own arguments. A `CallbackBinder` turns a
//! component method into a closure those schedulers can hold, forwarding the
//! caller and the native arguments positionally and running the method with the
//! component as receiver.
//!
//! The binder only holds a weak reference. Once the component is discarded
//! (its fragment was replaced) the bound callbacks become no-ops.
//!
//! [`CallbackBinder::wrap`] borrows the component for the whole call. Methods
//! that call out while running (sending a request, triggering listeners) are
//! bound with [`CallbackBinder::wrap_shared`] instead: they get the shared
//! handle and borrow it only around their own state changes, so a transport
//! that completes synchronously or a listener that reads the component finds
//! it free.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Weak handle to a component, able to produce bound callbacks
pub struct CallbackBinder<C> {
    target: Weak<RefCell<C>>,
    label: &'static str,
}

impl<C> Clone for CallbackBinder<C> {
    fn clone(&self) -> Self {
        Self {
            target: Weak::clone(&self.target),
            label: self.label,
        }
    }
}

impl<C: 'static> CallbackBinder<C> {
    /// `label` names the component in log output
    pub fn new(component: &Rc<RefCell<C>>, label: &'static str) -> Self {
        Self {
            target: Rc::downgrade(component),
            label,
        }
    }

    /// Binder for a component still under construction (`Rc::new_cyclic`)
    pub fn from_weak(target: Weak<RefCell<C>>, label: &'static str) -> Self {
        Self { target, label }
    }

    /// Run `f` against the component
    ///
    /// Returns `None` when the component is gone, or when it is already
    /// borrowed further up the stack (a listener calling back into the
    /// component that is currently dispatching).
    pub fn call<R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let Some(component) = self.target.upgrade() else {
            tracing::debug!(component = self.label, "callback after component was discarded");
            return None;
        };
        let Ok(mut component) = component.try_borrow_mut() else {
            tracing::warn!(component = self.label, "re-entrant callback ignored");
            return None;
        };
        Some(f(&mut component))
    }

    /// Run `f` with the shared component, without borrowing it
    ///
    /// Returns `None` when the component is gone.
    pub fn call_shared<R>(&self, f: impl FnOnce(&Rc<RefCell<C>>) -> R) -> Option<R> {
        let Some(component) = self.target.upgrade() else {
            tracing::debug!(component = self.label, "callback after component was discarded");
            return None;
        };
        Some(f(&component))
    }

    /// Bind `method` so it can be handed to a scheduler
    ///
    /// The scheduler's caller object comes first, followed by its native
    /// arguments, exactly as the scheduler passed them. When the call cannot
    /// reach the component the callback yields `R::default()` (`false` for
    /// event callbacks, i.e. "stop here").
    pub fn wrap<W: ?Sized + 'static, A: ?Sized + 'static, R: Default + 'static>(
        &self,
        method: fn(&mut C, &W, &A) -> R,
    ) -> impl Fn(&W, &A) -> R + 'static {
        let binder = self.clone();
        move |caller: &W, args: &A| {
            binder
                .call(|component| method(component, caller, args))
                .unwrap_or_default()
        }
    }

    /// Like [`CallbackBinder::wrap`], for methods taking the shared component
    pub fn wrap_shared<W: ?Sized + 'static, A: ?Sized + 'static, R: Default + 'static>(
        &self,
        method: fn(&Rc<RefCell<C>>, &W, &A) -> R,
    ) -> impl Fn(&W, &A) -> R + 'static {
        let binder = self.clone();
        move |caller: &W, args: &A| {
            binder
                .call_shared(|component| method(component, caller, args))
                .unwrap_or_default()
        }
    }

    /// Bind a method that takes no arguments from its scheduler
    pub fn wrap0<R: Default + 'static>(&self, method: fn(&mut C) -> R) -> impl Fn() -> R + 'static {
        let binder = self.clone();
        move || binder.call(method).unwrap_or_default()
    }

    /// Whether the component is still alive
    pub fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}
