// Concrete action requests

use super::{ActionOptions, ActionRequest, LinkActionRequest};
use crate::dom::{ElementRef, NativeEvent, SharedDom};
use crate::error::{ConfigurationError, TransportError};
use crate::events::EventBus;
use crate::transport::{Method, RemoteCall, SharedTransport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Receives the raw outcome of a remote call (body or transport failure)
pub type ResponseHandler = Rc<dyn Fn(Result<String, TransportError>)>;

/// Navigates the page to `url`
pub struct RedirectRequest {
    base: LinkActionRequest,
    dom: SharedDom,
}

impl RedirectRequest {
    pub fn new(
        dom: SharedDom,
        element: ElementRef,
        options: ActionOptions,
    ) -> Result<Self, ConfigurationError> {
        options.require_url()?;
        Ok(Self {
            base: LinkActionRequest::new(&dom, element, options),
            dom,
        })
    }
}

impl ActionRequest for RedirectRequest {
    fn base(&self) -> &LinkActionRequest {
        &self.base
    }

    fn activate(&self, _element: &ElementRef, _event: &NativeEvent) -> bool {
        if let Some(url) = self.base.options().url.as_deref() {
            self.dom.borrow_mut().navigate(url);
        }
        false
    }
}

/// Calls `url` and forwards the response body
///
/// `requestType` (`"get"` or `"post"`, default post) picks the method; every
/// other string-valued extra option is sent as a request parameter. The
/// request finishes when the owner has handled the response, not on
/// activation.
pub struct AjaxRequest {
    base: LinkActionRequest,
    transport: SharedTransport,
    method: Method,
    on_response: ResponseHandler,
}

impl AjaxRequest {
    pub fn new(
        dom: &SharedDom,
        transport: SharedTransport,
        element: ElementRef,
        options: ActionOptions,
        on_response: ResponseHandler,
    ) -> Result<Self, ConfigurationError> {
        options.require_url()?;
        let method = match options.extra.get("requestType").and_then(Value::as_str) {
            None | Some("post") => Method::Post,
            Some("get") => Method::Get,
            Some(other) => {
                return Err(ConfigurationError::Invalid {
                    option: "requestType",
                    reason: format!("unknown request type '{other}'"),
                })
            }
        };
        Ok(Self {
            base: LinkActionRequest::new(dom, element, options),
            transport,
            method,
            on_response,
        })
    }

    fn params(&self) -> BTreeMap<String, String> {
        self.base
            .options()
            .extra
            .iter()
            .filter(|(key, _)| key.as_str() != "requestType")
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect()
    }
}

impl ActionRequest for AjaxRequest {
    fn base(&self) -> &LinkActionRequest {
        &self.base
    }

    fn completes_on_activate(&self) -> bool {
        false
    }

    fn activate(&self, _element: &ElementRef, _event: &NativeEvent) -> bool {
        let Some(url) = self.base.options().url.clone() else {
            return false;
        };
        let call = RemoteCall {
            method: self.method,
            url,
            params: self.params(),
        };
        let on_response = Rc::clone(&self.on_response);
        self.transport
            .send(call, Box::new(move |result| on_response(result)));
        false
    }
}

/// Triggers `event` (with optional `data`) on the owning component's bus
pub struct EventAction {
    base: LinkActionRequest,
    bus: EventBus,
    event: String,
}

impl EventAction {
    pub fn new(
        dom: &SharedDom,
        bus: EventBus,
        element: ElementRef,
        options: ActionOptions,
    ) -> Result<Self, ConfigurationError> {
        let event = options
            .extra
            .get("event")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(ConfigurationError::Missing("event"))?
            .to_string();
        Ok(Self {
            base: LinkActionRequest::new(dom, element, options),
            bus,
            event,
        })
    }
}

impl ActionRequest for EventAction {
    fn base(&self) -> &LinkActionRequest {
        &self.base
    }

    fn activate(&self, _element: &ElementRef, _event: &NativeEvent) -> bool {
        let payload = self
            .base
            .options()
            .extra
            .get("data")
            .cloned()
            .unwrap_or(Value::Null);
        self.bus.trigger(&self.event, &payload);
        false
    }
}
