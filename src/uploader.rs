//! Upload engine collaborator
//!
//! Byte transport for file uploads belongs to an external engine. The engine
//! owns a mutable file queue and a `multipart_params` setting, and calls back
//! on three events:
//!
//! - `FilesAdded`   - the user picked one or more files
//! - `BeforeUpload` - a transfer is about to start; last chance to set params
//! - `FileUploaded` - the server answered; carries the raw response body
//!
//! Callbacks receive the engine handle first (the caller), then the event.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Engine handle shared between the page and the component driving it
pub type SharedUploader = Rc<RefCell<dyn UploadEngine>>;

/// Engine callback: `(engine, event)`
pub type UploaderCallback = Rc<dyn Fn(&SharedUploader, &UploaderEvent)>;

/// Form fields sent alongside the file bytes
pub type MultipartParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
}

impl QueuedFile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploaderEventKind {
    FilesAdded,
    BeforeUpload,
    FileUploaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploaderEvent {
    FilesAdded(Vec<QueuedFile>),
    BeforeUpload(QueuedFile),
    FileUploaded { file: QueuedFile, response: String },
}

impl UploaderEvent {
    pub fn kind(&self) -> UploaderEventKind {
        match self {
            Self::FilesAdded(_) => UploaderEventKind::FilesAdded,
            Self::BeforeUpload(_) => UploaderEventKind::BeforeUpload,
            Self::FileUploaded { .. } => UploaderEventKind::FileUploaded,
        }
    }
}

/// What a component needs from an upload engine
pub trait UploadEngine {
    /// Apply widget options forwarded verbatim from the component's config
    fn configure(&mut self, options: &Map<String, Value>);

    /// Current queue, oldest first
    fn files(&self) -> &[QueuedFile];

    fn add_file(&mut self, file: QueuedFile);

    /// Remove `count` files starting at `start`, returning them
    fn splice(&mut self, start: usize, count: usize) -> Vec<QueuedFile>;

    /// Re-render the engine's file list after the queue changed
    fn refresh(&mut self);

    fn multipart_params(&self) -> &MultipartParams;

    fn set_multipart_params(&mut self, params: MultipartParams);

    fn bind(&mut self, kind: UploaderEventKind, callback: UploaderCallback);

    fn callbacks(&self, kind: UploaderEventKind) -> Vec<UploaderCallback>;
}

/// Invoke the callbacks bound for `event`
///
/// The engine borrow is released before callbacks run; callbacks borrow the
/// engine again through the handle they are given.
pub fn fire(uploader: &SharedUploader, event: &UploaderEvent) {
    let callbacks = uploader.borrow().callbacks(event.kind());
    tracing::debug!(kind = ?event.kind(), callbacks = callbacks.len(), "uploader event");
    for callback in &callbacks {
        callback(uploader, event);
    }
}

/// Queue files the way a file picker does, then announce them
pub fn add_files(uploader: &SharedUploader, files: Vec<QueuedFile>) {
    {
        let mut engine = uploader.borrow_mut();
        for file in &files {
            engine.add_file(file.clone());
        }
    }
    fire(uploader, &UploaderEvent::FilesAdded(files));
}

/// Transfer the oldest queued file
///
/// `server` plays the remote end: it sees the file and the multipart params
/// as they stood after `BeforeUpload`, and returns the response body.
/// Returns `None` when the queue is empty.
pub fn upload_next(
    uploader: &SharedUploader,
    server: impl FnOnce(&QueuedFile, &MultipartParams) -> String,
) -> Option<QueuedFile> {
    let file = uploader.borrow().files().first().cloned()?;
    fire(uploader, &UploaderEvent::BeforeUpload(file.clone()));

    let response = {
        let engine = uploader.borrow();
        server(&file, engine.multipart_params())
    };
    uploader.borrow_mut().splice(0, 1);

    fire(
        uploader,
        &UploaderEvent::FileUploaded {
            file: file.clone(),
            response,
        },
    );
    Some(file)
}

/// Engine that keeps everything in memory
#[derive(Default)]
pub struct MemoryUploader {
    options: Option<Map<String, Value>>,
    files: Vec<QueuedFile>,
    params: MultipartParams,
    callbacks: Vec<(UploaderEventKind, UploaderCallback)>,
    refreshes: usize,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options passed to `configure`, if it was called
    pub fn options(&self) -> Option<&Map<String, Value>> {
        self.options.as_ref()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes
    }
}

impl UploadEngine for MemoryUploader {
    fn configure(&mut self, options: &Map<String, Value>) {
        self.options = Some(options.clone());
    }

    fn files(&self) -> &[QueuedFile] {
        &self.files
    }

    fn add_file(&mut self, file: QueuedFile) {
        self.files.push(file);
    }

    fn splice(&mut self, start: usize, count: usize) -> Vec<QueuedFile> {
        let start = start.min(self.files.len());
        let end = start.saturating_add(count).min(self.files.len());
        self.files.drain(start..end).collect()
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn multipart_params(&self) -> &MultipartParams {
        &self.params
    }

    fn set_multipart_params(&mut self, params: MultipartParams) {
        self.params = params;
    }

    fn bind(&mut self, kind: UploaderEventKind, callback: UploaderCallback) {
        self.callbacks.push((kind, callback));
    }

    fn callbacks(&self, kind: UploaderEventKind) -> Vec<UploaderCallback> {
        self.callbacks
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, c)| Rc::clone(c))
            .collect()
    }
}
