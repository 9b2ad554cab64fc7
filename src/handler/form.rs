//! Generic server form
//!
//! On submit the form's fields are posted to `url`. The answer is handled as an
//! envelope: empty content means the form is done (`formSubmitted`), anything
//! else replaces the form, typically with the same form showing validation
//! errors.
//!
//! The form is never borrowed while the transport or a listener runs: a
//! transport may complete inside `send` (cached answers, immediate failures).

use super::{handle_shared, ComponentHandler, HandlerCore, Outcome};
use crate::binder::CallbackBinder;
use crate::dom::{ElementRef, NativeEvent, NativeEventKind, SharedDom};
use crate::error::{ConfigurationError, Result, TransportError};
use crate::events::names;
use crate::transport::{RemoteCall, SharedTransport};
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOptions {
    /// Where the form is posted
    pub url: String,
    /// Ids of the fields to send
    #[serde(default)]
    pub fields: Vec<String>,
}

impl FormOptions {
    pub fn from_json(raw: &str) -> std::result::Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(raw)?)
    }
}

pub struct FormWorkflow {
    core: HandlerCore,
    transport: SharedTransport,
    options: FormOptions,
    binder: CallbackBinder<Self>,
    submitting: bool,
}

impl FormWorkflow {
    pub fn attach(
        dom: SharedDom,
        transport: SharedTransport,
        element: ElementRef,
        options: FormOptions,
    ) -> Result<Rc<RefCell<Self>>> {
        if options.url.is_empty() {
            return Err(ConfigurationError::Missing("url").into());
        }
        {
            let dom = dom.borrow();
            if let Some(missing) = options.fields.iter().find(|f| dom.find(&element, f).is_none()) {
                return Err(ConfigurationError::Invalid {
                    option: "fields",
                    reason: format!("no field '{missing}' in {element}"),
                }
                .into());
            }
        }

        let form = Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                core: HandlerCore::new(Rc::clone(&dom), element.clone()),
                transport,
                options,
                binder: CallbackBinder::from_weak(weak.clone(), "form"),
                submitting: false,
            })
        });

        let on_submit = form.borrow().binder.wrap_shared(Self::on_submit);
        dom.borrow_mut()
            .listen(&element, NativeEventKind::Submit, Rc::new(on_submit));
        form.borrow_mut().core.activate();
        Ok(form)
    }

    /// Native submit callback; the form never submits natively
    pub fn on_submit(form: &Rc<RefCell<Self>>, _element: &ElementRef, _event: &NativeEvent) -> bool {
        if let Err(err) = Self::submit(form) {
            tracing::debug!(error = %err, "submit ignored");
        }
        false
    }

    /// Post the form's fields
    ///
    /// A submit while the previous one is still in flight is dropped.
    pub fn submit(form: &Rc<RefCell<Self>>) -> Result<()> {
        let (transport, call, binder) = {
            let mut this = form.borrow_mut();
            this.core.ensure_live()?;
            if this.submitting {
                tracing::debug!(element = %this.core.element(), "submit already in flight");
                return Ok(());
            }
            this.submitting = true;
            let call = RemoteCall::post(this.options.url.clone(), this.field_values());
            (Rc::clone(&this.transport), call, this.binder.clone())
        };

        transport.send(
            call,
            Box::new(move |result| {
                binder.call_shared(move |form| {
                    if let Err(err) = Self::handle_response(form, result) {
                        tracing::debug!(error = %err, "form response not applied");
                    }
                });
            }),
        );
        Ok(())
    }

    /// Values of the configured fields, skipping disabled ones
    pub fn field_values(&self) -> BTreeMap<String, String> {
        let dom = self.core.dom().borrow();
        self.options
            .fields
            .iter()
            .filter_map(|id| dom.find(self.core.element(), id))
            .filter(|field| !dom.is_disabled(field))
            .filter_map(|field| {
                let value = dom.value(&field)?;
                Some((field.id().to_string(), value))
            })
            .collect()
    }

    /// Apply the answer to a submit
    pub fn handle_response(
        form: &Rc<RefCell<Self>>,
        response: std::result::Result<String, TransportError>,
    ) -> Result<Outcome> {
        let (envelope, bus) = {
            let mut this = form.borrow_mut();
            this.submitting = false;
            (this.core.receive(response)?, this.core.bus().clone())
        };
        let outcome = handle_shared(form, &envelope)?;
        if outcome == Outcome::NoContent {
            bus.trigger(names::FORM_SUBMITTED, &Value::Null);
        }
        Ok(outcome)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }
}

impl ComponentHandler for FormWorkflow {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }
}
