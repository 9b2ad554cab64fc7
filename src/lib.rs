// fraghand - client-side half of a server-rendered fragment protocol
//
// The server renders markup fragments plus JSON options; this crate turns
// them into live components and handles every asynchronous answer through one
// envelope format.
//
// Architecture:
// - Envelope: the JSON answer to every request (status, content, event, extras)
// - EventBus: per-component signals (`fileUploaded`, `formSubmitted`, ...)
// - CallbackBinder: lets external schedulers call component methods
// - ActionRequest: what a trigger element does when activated
// - Handlers: link actions, generic forms and the file upload workflow
// - Collaborators: DOM, upload engine and transport, injected as traits

pub mod action;
pub mod binder;
pub mod config;
pub mod dom;
pub mod envelope;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod transport;
pub mod uploader;

pub use envelope::{Envelope, EnvelopeEvent, Route};
pub use error::{ConfigurationError, EnvelopeError, HandlerError, Result, TransportError};
pub use events::EventBus;
pub use handler::{
    ComponentHandler, FormWorkflow, HandlerCore, Lifecycle, LinkActionComponent, Outcome,
    UploadWorkflow, UploadWorkflowOptions,
};
