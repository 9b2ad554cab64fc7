//! Link action component
//!
//! Binds a trigger element's click to an [`ActionRequest`]. Requests that
//! complete on activation finish right away; remote requests finish once their
//! response envelope has been handled. Finishing runs the request's finish
//! callback and then announces `actionFinished` on the component's bus.
//!
//! The request runs with the component unborrowed, so a transport answering
//! from inside `send` lands in `handle_response` right away.

use super::{handle_shared, ComponentHandler, HandlerCore, Outcome};
use crate::action::{build_request, ActionOptions, ActionRequest, RequestContext, RequestKind};
use crate::binder::CallbackBinder;
use crate::dom::{ElementRef, NativeEvent, NativeEventKind, SharedDom};
use crate::error::{ConfigurationError, HandlerError, Result, TransportError};
use crate::events::names;
use crate::transport::SharedTransport;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Options the server renders for a link action
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkActionOptions {
    pub action_request: RequestKind,
    #[serde(default)]
    pub action_request_options: Map<String, Value>,
}

impl LinkActionOptions {
    pub fn from_json(raw: &str) -> std::result::Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(raw)?)
    }
}

pub struct LinkActionComponent {
    core: HandlerCore,
    request: Option<Rc<dyn ActionRequest>>,
}

impl LinkActionComponent {
    /// Attach to `element`, building its request from `options`
    pub fn attach(
        dom: SharedDom,
        transport: Option<SharedTransport>,
        element: ElementRef,
        options: LinkActionOptions,
    ) -> Result<Rc<RefCell<Self>>> {
        if dom.borrow().tag_name(&element).is_none() {
            return Err(ConfigurationError::Invalid {
                option: "element",
                reason: format!("{element} is not in the document"),
            }
            .into());
        }
        let action_options = ActionOptions::from_map(options.action_request_options)?;

        let component = Rc::new(RefCell::new(Self {
            core: HandlerCore::new(Rc::clone(&dom), element.clone()),
            request: None,
        }));
        let binder = CallbackBinder::new(&component, "link-action");

        let responder = binder.clone();
        let ctx = RequestContext {
            dom: Rc::clone(&dom),
            transport,
            bus: component.borrow().core.bus().clone(),
            on_response: Rc::new(move |result| {
                responder.call_shared(move |component| {
                    if let Err(err) = Self::handle_response(component, result) {
                        tracing::debug!(error = %err, "action response not applied");
                    }
                });
            }),
        };
        let request = build_request(options.action_request, element.clone(), action_options, ctx)?;

        {
            let mut this = component.borrow_mut();
            this.request = Some(Rc::from(request));
            this.core.activate();
        }
        dom.borrow_mut()
            .listen(&element, NativeEventKind::Click, Rc::new(binder.wrap_shared(Self::activate)));

        Ok(component)
    }

    /// Click callback
    pub fn activate(component: &Rc<RefCell<Self>>, element: &ElementRef, event: &NativeEvent) -> bool {
        let request = {
            let this = component.borrow();
            if this.core.ensure_live().is_err() {
                return false;
            }
            this.request.clone()
        };
        let Some(request) = request else {
            return false;
        };
        let verdict = request.activate(element, event);
        if request.completes_on_activate() {
            Self::finish_action(component, &Value::Null);
        }
        verdict
    }

    /// Apply the response of a remote request, then finish
    pub fn handle_response(
        component: &Rc<RefCell<Self>>,
        response: std::result::Result<String, TransportError>,
    ) -> Result<Outcome> {
        let received = component.borrow().core.receive(response);
        let outcome = received.and_then(|envelope| handle_shared(component, &envelope));
        // Failures finish too; the user may trigger again
        if !matches!(outcome, Err(HandlerError::Replaced(_))) {
            Self::finish_action(component, &Value::Null);
        }
        outcome
    }

    fn finish_action(component: &Rc<RefCell<Self>>, payload: &Value) -> bool {
        let (request, element, bus) = {
            let this = component.borrow();
            (this.request.clone(), this.core.element().clone(), this.core.bus().clone())
        };
        let verdict = request.map_or(false, |request| request.finish(&element, payload));
        bus.trigger(names::ACTION_FINISHED, payload);
        verdict
    }

    pub fn request(&self) -> Option<&dyn ActionRequest> {
        self.request.as_deref()
    }
}

impl ComponentHandler for LinkActionComponent {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn finish(&mut self) -> Result<()> {
        self.core.ensure_live()?;
        if let Some(request) = &self.request {
            request.finish(self.core.element(), &Value::Null);
        }
        self.core.trigger(names::ACTION_FINISHED, &Value::Null);
        Ok(())
    }
}
