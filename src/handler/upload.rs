//! File upload workflow
//!
//! ```text
//!  Empty ──FilesAdded──▶ Queued ──BeforeUpload──▶ Uploading ──FileUploaded──▶ Acknowledged
//!                          ▲ (queue capped at one)                              │
//!                          └────────────────────────────────────────────────────┘
//!                                      status == false: stays put
//! ```
//!
//! Acknowledged ends in `formSubmitted` (empty content) or in the component's
//! fragment being replaced by a revision confirmation form.
//!
//! The revision selector (`#revisedFileId`) works independently: picking
//! [`NEW_FILE`] frees the genre selector (`#genreId`), picking an existing file
//! forces the genre to that file's genre and locks it.

use super::{announce, ComponentHandler, HandlerCore};
use crate::binder::CallbackBinder;
use crate::dom::{ElementRef, NativeEvent, NativeEventKind, SharedDom};
use crate::envelope::Route;
use crate::error::{ConfigurationError, Result};
use crate::events::names;
use crate::uploader::{MultipartParams, SharedUploader, UploaderEvent, UploaderEventKind};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Revision selector value meaning "upload a new file, not a revision"
pub const NEW_FILE: &str = "0";

const REVISED_FILE_SELECTOR: &str = "revisedFileId";
const GENRE_SELECTOR: &str = "genreId";

/// Server-side identifier (file, genre)
///
/// Servers send ids as strings or as numbers; both become the same `Id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "RawId")]
pub struct Id(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for Id {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => Self(text),
            RawId::Number(n) => Self(n.to_string()),
        }
    }
}

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the revision selector currently says
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionChoice {
    NewFile,
    Revision(Id),
}

impl RevisionChoice {
    /// `"0"` and an empty selection both mean a new file
    pub fn from_selector(value: &str) -> Self {
        match value.trim() {
            "" | NEW_FILE => Self::NewFile,
            id => Self::Revision(Id::new(id)),
        }
    }
}

/// Construction options rendered by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadWorkflowOptions {
    /// The form renders a `#revisedFileId` selector
    pub has_file_selector: bool,
    /// The form renders a `#genreId` selector
    pub has_genre_selector: bool,
    /// Revision target when there is no selector
    #[serde(default)]
    pub preset_revised_file_id: Option<Id>,
    /// Genre of every file that can be revised
    #[serde(default, deserialize_with = "deserialize_genres")]
    pub file_genres: HashMap<Id, Id>,
    /// Handed to the upload engine untouched
    #[serde(default)]
    pub uploader_options: Map<String, Value>,
    /// Id of the upload widget's root element
    #[serde(rename = "$uploader", alias = "uploader")]
    pub uploader: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGenres {
    Map(HashMap<Id, Id>),
    // An empty or sequential mapping may arrive as a JSON array
    List(Vec<Id>),
}

fn deserialize_genres<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<HashMap<Id, Id>, D::Error> {
    Ok(match Option::<RawGenres>::deserialize(deserializer)? {
        None => HashMap::new(),
        Some(RawGenres::Map(genres)) => genres,
        Some(RawGenres::List(genres)) => genres
            .into_iter()
            .enumerate()
            .map(|(index, genre)| (Id::new(index.to_string()), genre))
            .collect(),
    })
}

impl UploadWorkflowOptions {
    pub fn from_json(raw: &str) -> std::result::Result<Self, ConfigurationError> {
        let options: Self = serde_json::from_str(raw)?;
        options.validate()
    }

    /// Check required options and normalize the preset revision
    ///
    /// A preset of `"0"` or `""` is no preset at all.
    pub fn validate(mut self) -> std::result::Result<Self, ConfigurationError> {
        if self.uploader.trim().is_empty() {
            return Err(ConfigurationError::Missing("$uploader"));
        }
        if self
            .preset_revised_file_id
            .as_ref()
            .is_some_and(|id| matches!(id.as_str(), "" | NEW_FILE))
        {
            self.preset_revised_file_id = None;
        }
        Ok(self)
    }
}

/// How an upload response was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Empty content: the wizard step is complete
    Submitted,
    ScriptExecuted,
    /// The fragment now shows the revision confirmation form
    ConfirmationShown,
}

pub struct UploadWorkflow {
    core: HandlerCore,
    options: UploadWorkflowOptions,
    uploader: SharedUploader,
    binder: CallbackBinder<Self>,
}

impl UploadWorkflow {
    /// Attach to the upload form at `element`
    ///
    /// Fails when the options name selectors or an uploader element the
    /// fragment does not contain.
    pub fn attach(
        dom: SharedDom,
        uploader: SharedUploader,
        element: ElementRef,
        options: UploadWorkflowOptions,
    ) -> Result<Rc<RefCell<Self>>> {
        let options = options.validate()?;
        let revised_selector = {
            let dom = dom.borrow();
            let require = |id: &str, option: &'static str| {
                dom.find(&element, id).ok_or_else(|| ConfigurationError::Invalid {
                    option,
                    reason: format!("no #{id} in {element}"),
                })
            };
            require(&options.uploader, "$uploader")?;
            if options.has_file_selector {
                require(REVISED_FILE_SELECTOR, "hasFileSelector")?;
            }
            if options.has_genre_selector {
                require(GENRE_SELECTOR, "hasGenreSelector")?;
            }
            dom.find(&element, REVISED_FILE_SELECTOR)
        };

        let workflow = Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                core: HandlerCore::new(Rc::clone(&dom), element),
                options,
                uploader: Rc::clone(&uploader),
                binder: CallbackBinder::from_weak(weak.clone(), "upload"),
            })
        });

        {
            let this = workflow.borrow();
            this.uploader_setup(&this.options.uploader_options, &uploader);
        }
        if let Some(selector) = revised_selector {
            let on_change = workflow.borrow().binder.wrap(Self::revised_file_change);
            dom.borrow_mut()
                .listen(&selector, NativeEventKind::Change, Rc::new(on_change));
        }

        workflow.borrow_mut().core.activate();
        Ok(workflow)
    }

    /// Configure the engine and subscribe to its events
    pub fn uploader_setup(&self, uploader_options: &Map<String, Value>, uploader: &SharedUploader) {
        let mut engine = uploader.borrow_mut();
        engine.configure(uploader_options);
        engine.bind(
            UploaderEventKind::FilesAdded,
            Rc::new(self.binder.wrap(Self::limit_queue_size)),
        );
        engine.bind(
            UploaderEventKind::BeforeUpload,
            Rc::new(self.binder.wrap(Self::prepare_file_upload_request)),
        );
        engine.bind(
            UploaderEventKind::FileUploaded,
            Rc::new(self.binder.wrap_shared(Self::handle_upload_response)),
        );
    }

    /// Keep only the most recently added file in the queue
    pub fn limit_queue_size(&mut self, uploader: &SharedUploader, _event: &UploaderEvent) {
        let mut engine = uploader.borrow_mut();
        let queued = engine.files().len();
        if queued > 1 {
            let evicted = engine.splice(0, queued - 1);
            engine.refresh();
            tracing::debug!(
                element = %self.core.element(),
                evicted = evicted.len(),
                "upload queue limited to one file"
            );
        }
    }

    /// Set `revisedFileId` and `genreId` for the transfer about to start
    pub fn prepare_file_upload_request(&mut self, uploader: &SharedUploader, _event: &UploaderEvent) {
        let params = self.multipart_params();
        tracing::debug!(element = %self.core.element(), ?params, "upload parameters");
        uploader.borrow_mut().set_multipart_params(params);
    }

    /// Parameters sent with the file
    ///
    /// Selectors that are read get disabled: the value is in flight and must
    /// not change under the transfer.
    pub fn multipart_params(&self) -> MultipartParams {
        let revised_file_id = if self.options.has_file_selector {
            self.lock_selector(REVISED_FILE_SELECTOR)
        } else {
            self.options
                .preset_revised_file_id
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default()
        };
        let genre_id = if self.options.has_genre_selector {
            self.lock_selector(GENRE_SELECTOR)
        } else {
            String::new()
        };

        MultipartParams::from([
            ("revisedFileId".to_string(), revised_file_id),
            ("genreId".to_string(), genre_id),
        ])
    }

    fn lock_selector(&self, id: &str) -> String {
        let mut dom = self.core.dom().borrow_mut();
        let Some(selector) = dom.find(self.core.element(), id) else {
            return String::new();
        };
        dom.set_disabled(&selector, true);
        dom.value(&selector).unwrap_or_default()
    }

    /// Engine callback for `FileUploaded`
    pub fn handle_upload_response(
        workflow: &Rc<RefCell<Self>>,
        _uploader: &SharedUploader,
        event: &UploaderEvent,
    ) {
        let UploaderEvent::FileUploaded { file, response } = event else {
            return;
        };
        match Self::handle_upload_body(workflow, response) {
            Ok(outcome) => tracing::debug!(file = %file.name, ?outcome, "upload acknowledged"),
            Err(err) => tracing::debug!(file = %file.name, error = %err, "upload not acknowledged"),
        }
    }

    /// Apply the server's answer to an upload
    ///
    /// `fileUploaded` is announced exactly once, before `formSubmitted` or the
    /// replacement: by the envelope's own event when it carries one, otherwise
    /// with the `uploadedFile` attribute as payload. Listeners run while the
    /// workflow is not borrowed.
    pub fn handle_upload_body(workflow: &Rc<RefCell<Self>>, raw: &str) -> Result<UploadOutcome> {
        let (envelope, bus) = {
            let this = workflow.borrow();
            let envelope = this.core.receive(Ok(raw.to_string()))?;
            this.core.check_status(&envelope)?;
            (envelope, this.core.bus().clone())
        };

        announce(&bus, &envelope);
        if envelope.event().map_or(true, |e| e.name != names::FILE_UPLOADED) {
            let uploaded = envelope.attribute("uploadedFile").cloned().unwrap_or(Value::Null);
            bus.trigger(names::FILE_UPLOADED, &uploaded);
        }

        let outcome = match envelope.route() {
            Route::Script(_) => {
                workflow.borrow_mut().core.apply_content(&envelope);
                UploadOutcome::ScriptExecuted
            }
            Route::Replace { markup, .. } => {
                workflow.borrow_mut().core.replace_fragment(markup);
                UploadOutcome::ConfirmationShown
            }
            Route::Failure(_) | Route::Terminal => {
                bus.trigger(names::FORM_SUBMITTED, &Value::Null);
                UploadOutcome::Submitted
            }
        };
        workflow.borrow_mut().core.settle();
        Ok(outcome)
    }

    /// Native change callback of the revision selector
    pub fn revised_file_change(&mut self, _selector: &ElementRef, _event: &NativeEvent) -> bool {
        if self.core.ensure_live().is_ok() {
            self.apply_revision_choice();
        }
        true
    }

    /// Sync the genre selector with the revision selector
    pub fn apply_revision_choice(&mut self) -> Option<RevisionChoice> {
        let mut dom = self.core.dom().borrow_mut();
        let revised = dom.find(self.core.element(), REVISED_FILE_SELECTOR)?;
        let choice = RevisionChoice::from_selector(&dom.value(&revised).unwrap_or_default());
        let Some(genre) = dom.find(self.core.element(), GENRE_SELECTOR) else {
            return Some(choice);
        };

        match &choice {
            RevisionChoice::NewFile => dom.set_disabled(&genre, false),
            RevisionChoice::Revision(file) => {
                match self.options.file_genres.get(file) {
                    Some(genre_id) => dom.set_value(&genre, genre_id.as_str()),
                    None => tracing::warn!(file = %file, "no genre known for revised file"),
                }
                dom.set_disabled(&genre, true);
            }
        }
        Some(choice)
    }

    pub fn options(&self) -> &UploadWorkflowOptions {
        &self.options
    }

    pub fn uploader(&self) -> &SharedUploader {
        &self.uploader
    }
}

impl ComponentHandler for UploadWorkflow {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }
}
