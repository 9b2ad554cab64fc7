//! Action requests - what happens when a trigger element is activated
//!
//! An [`ActionRequest`] is created once per trigger element when its component
//! is attached. `activate` runs on the native event; `finish` runs once the
//! request's work is done. Both return `false`: the request owns the event's
//! default action and propagation. No other return value means anything.
//!
//! # Variants
//!
//! - [`NullAction`] - does nothing; finishing just runs the finish callback
//! - [`RedirectRequest`] - navigates to `url`
//! - [`AjaxRequest`] - calls `url` through the transport, hands the body on
//! - [`EventAction`] - triggers a named event on the owning component's bus

mod variants;

pub use variants::{AjaxRequest, EventAction, RedirectRequest, ResponseHandler};

use crate::dom::{ElementRef, NativeEvent, SharedDom};
use crate::error::ConfigurationError;
use crate::events::EventBus;
use crate::transport::SharedTransport;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::rc::Rc;

/// Called when a request finishes
pub type FinishCallback = Rc<dyn Fn()>;

/// Configuration of a single action request
#[derive(Clone, Default)]
pub struct ActionOptions {
    /// Target of the request; also written to `href` on anchors
    pub url: Option<String>,
    pub finish_callback: Option<FinishCallback>,
    /// Request-specific fields, passed through untouched
    pub extra: Map<String, Value>,
}

impl ActionOptions {
    /// Read options from the server-supplied JSON object
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, ConfigurationError> {
        let url = match map.remove("url") {
            None | Some(Value::Null) => None,
            Some(Value::String(url)) if url.is_empty() => None,
            Some(Value::String(url)) => Some(url),
            Some(other) => {
                return Err(ConfigurationError::Invalid {
                    option: "url",
                    reason: format!("expected a string, got {other}"),
                })
            }
        };
        Ok(Self {
            url,
            finish_callback: None,
            extra: map,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_finish_callback(mut self, callback: impl Fn() + 'static) -> Self {
        self.finish_callback = Some(Rc::new(callback));
        self
    }

    pub(crate) fn require_url(&self) -> Result<&str, ConfigurationError> {
        self.url.as_deref().ok_or(ConfigurationError::Missing("url"))
    }
}

impl std::fmt::Debug for ActionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionOptions")
            .field("url", &self.url)
            .field("finish_callback", &self.finish_callback.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}

/// State every request carries: its trigger element and options
#[derive(Debug)]
pub struct LinkActionRequest {
    element: ElementRef,
    options: ActionOptions,
}

impl LinkActionRequest {
    /// Anchors get `href` set to the request URL, so the target shows up in
    /// the document even though activation is intercepted.
    pub fn new(dom: &SharedDom, element: ElementRef, options: ActionOptions) -> Self {
        if let Some(url) = options.url.as_deref() {
            let mut dom = dom.borrow_mut();
            if dom.tag_name(&element).as_deref() == Some("a") {
                dom.set_attribute(&element, "href", url);
            }
        }
        Self { element, options }
    }

    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    pub fn options(&self) -> &ActionOptions {
        &self.options
    }
}

/// Capability set shared by every request variant
pub trait ActionRequest {
    fn base(&self) -> &LinkActionRequest;

    /// Whether `finish` is due as soon as `activate` returns
    fn completes_on_activate(&self) -> bool {
        true
    }

    fn activate(&self, _element: &ElementRef, _event: &NativeEvent) -> bool {
        false
    }

    fn finish(&self, _element: &ElementRef, _event: &Value) -> bool {
        if let Some(callback) = &self.base().options().finish_callback {
            callback();
        }
        false
    }

    fn element(&self) -> &ElementRef {
        self.base().element()
    }

    fn options(&self) -> &ActionOptions {
        self.base().options()
    }
}

/// Request that does nothing on activation
#[derive(Debug)]
pub struct NullAction {
    base: LinkActionRequest,
}

impl NullAction {
    pub fn new(dom: &SharedDom, element: ElementRef, options: ActionOptions) -> Self {
        Self {
            base: LinkActionRequest::new(dom, element, options),
        }
    }
}

impl ActionRequest for NullAction {
    fn base(&self) -> &LinkActionRequest {
        &self.base
    }
}

/// Which request a link action should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Null,
    Redirect,
    Ajax,
    Event,
}

/// Collaborators a request may need
pub struct RequestContext {
    pub dom: SharedDom,
    pub transport: Option<SharedTransport>,
    pub bus: EventBus,
    pub on_response: ResponseHandler,
}

/// Build the request for `kind`, failing loudly on missing options
pub fn build_request(
    kind: RequestKind,
    element: ElementRef,
    options: ActionOptions,
    ctx: RequestContext,
) -> Result<Box<dyn ActionRequest>, ConfigurationError> {
    Ok(match kind {
        RequestKind::Null => Box::new(NullAction::new(&ctx.dom, element, options)),
        RequestKind::Redirect => Box::new(RedirectRequest::new(ctx.dom, element, options)?),
        RequestKind::Ajax => {
            let transport = ctx.transport.ok_or(ConfigurationError::Missing("transport"))?;
            Box::new(AjaxRequest::new(
                &ctx.dom,
                transport,
                element,
                options,
                ctx.on_response,
            )?)
        }
        RequestKind::Event => Box::new(EventAction::new(&ctx.dom, ctx.bus, element, options)?),
    })
}
