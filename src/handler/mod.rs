//! Component handlers - live behavior bound to server-rendered fragments
//!
//! Every handler composes a [`HandlerCore`]: the fragment's root element, the
//! page DOM, the component's own [`EventBus`] and its lifecycle state.
//!
//! ```text
//!   attach()            user interaction             content replaces fragment
//! ──────────▶ Attached ───────────▶ Active ──────────────────────────▶ Replaced
//! ```
//!
//! Once `Replaced`, the core refuses further work and the bus is emptied.
//! Attaching with bad options fails with a configuration error instead of
//! producing a half-initialized component.
//!
//! # Envelope handling
//!
//! [`HandlerCore::handle_json`] applies a response envelope:
//! 1. `status == false`: show `content` as an error, stop, report failure
//! 2. non-empty `content`: run it as script, or replace the targeted region
//!    (the component's own fragment when `elementId` is `"0"`)
//! 3. `event` present: trigger it on the bus, whether or not step 2 ran
//!
//! Components living behind `Rc<RefCell<_>>` go through [`handle_shared`],
//! which runs the same steps but releases the component before listeners run.

mod form;
mod link_action;
mod upload;


pub use form::{FormOptions, FormWorkflow};
pub use link_action::{LinkActionComponent, LinkActionOptions};
pub use upload::{Id, RevisionChoice, UploadOutcome, UploadWorkflow, UploadWorkflowOptions, NEW_FILE};

use crate::dom::{ElementRef, SharedDom};
use crate::envelope::{Envelope, Route};
use crate::error::{HandlerError, Result, TransportError};
use crate::events::{names, EventBus, ListenerId};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Shown when a request failed without a server-provided explanation
pub const GENERIC_FAILURE: &str = "The request could not be completed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Attached,
    Active,
    Replaced,
}

/// What applying an envelope's content did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Empty content: nothing to apply, terminal success
    NoContent,
    ScriptExecuted,
    /// Another region was replaced; this component lives on
    RegionReplaced(String),
    /// The component's own fragment was replaced
    Replaced,
}

/// Shared delegate every component handler is built on
pub struct HandlerCore {
    element: ElementRef,
    dom: SharedDom,
    bus: EventBus,
    state: Lifecycle,
}

impl HandlerCore {
    pub fn new(dom: SharedDom, element: ElementRef) -> Self {
        tracing::debug!(element = %element, "component attached");
        Self {
            element,
            dom,
            bus: EventBus::new(),
            state: Lifecycle::Attached,
        }
    }

    /// Attachment finished; the component now takes interaction
    pub fn activate(&mut self) {
        if self.state == Lifecycle::Attached {
            self.state = Lifecycle::Active;
        }
    }

    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    pub fn dom(&self) -> &SharedDom {
        &self.dom
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn ensure_live(&self) -> Result<()> {
        if self.state == Lifecycle::Replaced {
            return Err(HandlerError::Replaced(self.element.id().to_string()));
        }
        Ok(())
    }

    pub fn trigger(&self, name: &str, payload: &Value) -> usize {
        self.bus.trigger(name, payload)
    }

    /// Parse a transport outcome into an envelope
    ///
    /// Failures get the generic presentation; they are never mistaken for a
    /// server-reported failure.
    pub fn receive(&self, response: std::result::Result<String, TransportError>) -> Result<Envelope> {
        self.ensure_live()?;
        let parsed = response.and_then(|body| Envelope::parse(&body).map_err(TransportError::from));
        parsed.map_err(|err| {
            tracing::error!(element = %self.element, error = %err, "request failed");
            self.dom.borrow_mut().present_error(GENERIC_FAILURE);
            HandlerError::from(err)
        })
    }

    /// Step 1: stop on `status == false`, showing the server's message
    pub fn check_status(&self, envelope: &Envelope) -> Result<()> {
        if let Route::Failure(message) = envelope.route() {
            tracing::warn!(element = %self.element, reason = message, "server reported failure");
            self.dom.borrow_mut().present_error(message);
            return Err(HandlerError::Application(message.to_string()));
        }
        Ok(())
    }

    /// Step 2: apply content
    ///
    /// Replacing the component's own fragment moves it to `Replaced`; the bus
    /// stays usable until [`HandlerCore::settle`] so the rest of the pass can
    /// still notify listeners.
    pub fn apply_content(&mut self, envelope: &Envelope) -> Outcome {
        match envelope.route() {
            Route::Failure(_) | Route::Terminal => Outcome::NoContent,
            Route::Script(script) => {
                self.dom.borrow_mut().execute_script(script);
                Outcome::ScriptExecuted
            }
            Route::Replace { region, markup } => match region {
                Some(region) if region != self.element.id() => {
                    let target = ElementRef::new(region);
                    let engulfed = {
                        let mut dom = self.dom.borrow_mut();
                        let engulfed = dom.find(&target, self.element.id()).is_some();
                        dom.replace_with(&target, markup);
                        engulfed
                    };
                    if engulfed {
                        // An enclosing region went, taking this fragment with it
                        self.state = Lifecycle::Replaced;
                        tracing::debug!(element = %self.element, region, "component replaced with its container");
                        Outcome::Replaced
                    } else {
                        Outcome::RegionReplaced(region.to_string())
                    }
                }
                _ => {
                    self.replace_fragment(markup);
                    Outcome::Replaced
                }
            },
        }
    }

    /// Step 3: re-dispatch the envelope's event
    pub fn dispatch_event(&self, envelope: &Envelope) {
        announce(&self.bus, envelope);
    }

    /// Swap the own fragment for `markup` and stop taking calls
    pub fn replace_fragment(&mut self, markup: &str) {
        self.dom.borrow_mut().replace_with(&self.element, markup);
        self.state = Lifecycle::Replaced;
        tracing::debug!(element = %self.element, "component replaced");
    }

    /// End of an envelope pass: a replaced component drops its listeners
    pub fn settle(&mut self) {
        if self.state == Lifecycle::Replaced {
            self.bus.clear();
        }
    }

    /// Steps 1-3 in order
    pub fn handle_json(&mut self, envelope: &Envelope) -> Result<Outcome> {
        self.ensure_live()?;
        self.check_status(envelope)?;
        let outcome = self.apply_content(envelope);
        self.dispatch_event(envelope);
        self.settle();
        Ok(outcome)
    }
}

fn announce(bus: &EventBus, envelope: &Envelope) {
    if let Some(event) = envelope.event() {
        bus.trigger(&event.name, &Value::Object(event.data.clone()));
    }
}

/// [`HandlerCore::handle_json`] for a shared component
///
/// The component is borrowed around each step but not while the envelope's
/// event is dispatched, so listeners may read it or call into it.
pub fn handle_shared<C: ComponentHandler>(
    component: &Rc<RefCell<C>>,
    envelope: &Envelope,
) -> Result<Outcome> {
    let bus = {
        let this = component.borrow();
        this.core().ensure_live()?;
        this.core().check_status(envelope)?;
        this.bus().clone()
    };
    let outcome = component.borrow_mut().core_mut().apply_content(envelope);
    announce(&bus, envelope);
    component.borrow_mut().core_mut().settle();
    Ok(outcome)
}

impl std::fmt::Debug for HandlerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCore")
            .field("element", &self.element)
            .field("state", &self.state)
            .field("bus", &self.bus)
            .finish()
    }
}

/// Contract shared by every component handler
pub trait ComponentHandler {
    fn core(&self) -> &HandlerCore;

    fn core_mut(&mut self) -> &mut HandlerCore;

    fn element(&self) -> &ElementRef {
        self.core().element()
    }

    fn state(&self) -> Lifecycle {
        self.core().state()
    }

    fn bus(&self) -> &EventBus {
        self.core().bus()
    }

    /// Subscribe to one of this component's events
    fn on(&self, name: &str, listener: impl Fn(&Value) + 'static) -> ListenerId
    where
        Self: Sized,
    {
        self.core().bus().on(name, listener)
    }

    fn trigger(&self, name: &str, payload: &Value) -> usize {
        self.core().trigger(name, payload)
    }

    fn handle_json(&mut self, envelope: &Envelope) -> Result<Outcome> {
        self.core_mut().handle_json(envelope)
    }

    /// Signal that the component's current action is complete
    fn finish(&mut self) -> Result<()> {
        self.core().ensure_live()?;
        self.core().trigger(names::ACTION_FINISHED, &Value::Null);
        Ok(())
    }
}
