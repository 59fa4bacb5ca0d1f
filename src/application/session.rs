//! Edit session controller.
//!
//! A single-slot state machine for the post currently being edited:
//!
//! ```text
//! Closed --begin_edit--> Open --submit--> Committing --ok--> Closed
//!                         ^  |                  |
//!                         |  +--cancel--> Closed +--err--> Open (draft kept)
//!                         +-- begin_edit (previous draft discarded)
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::error::FieldError;
use crate::domain::posts::{Post, PostFields, normalize_fields, validate_fields};

use super::gateway::GatewayError;
use super::lock::mutex_lock;
use super::store::CollectionStore;

const SOURCE: &str = "application::session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no post is being edited")]
    NotEditing,
    #[error("a save is already in progress")]
    Committing,
    #[error("draft is invalid: {0}")]
    Invalid(#[from] FieldError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Editable fields of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Author,
    Content,
    ImageUrl,
}

impl DraftField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Content => "content",
            Self::ImageUrl => "image",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field `{0}` (expected author, content or image)")]
pub struct UnknownField(String);

impl FromStr for DraftField {
    type Err = UnknownField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(Self::Author),
            "content" => Ok(Self::Content),
            "image" | "imageurl" | "image_url" | "image-url" => Ok(Self::ImageUrl),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// Buffered copy of a post's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub author: String,
    pub content: String,
    /// Empty means no image.
    pub image_url: String,
}

impl Draft {
    pub fn from_post(post: &Post) -> Self {
        Self {
            author: post.author.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone().unwrap_or_default(),
        }
    }

    pub fn set(&mut self, field: DraftField, value: impl Into<String>) {
        let value = value.into();
        match field {
            DraftField::Author => self.author = value,
            DraftField::Content => self.content = value,
            DraftField::ImageUrl => self.image_url = value,
        }
    }

    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::Author => &self.author,
            DraftField::Content => &self.content,
            DraftField::ImageUrl => &self.image_url,
        }
    }

    /// Full field set sent with the update request.
    pub fn to_fields(&self) -> PostFields {
        normalize_fields(
            PostFields::new(self.author.clone(), self.content.clone())
                .with_image_url(self.image_url.clone()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Closed,
    Open,
    Committing,
}

/// Read-only view of the active session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub target: Post,
    pub draft: Draft,
    pub saving: bool,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    generation: u64,
    target: Post,
    draft: Draft,
}

#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Closed,
    Open(ActiveSession),
    Committing(ActiveSession),
}

pub struct EditSession {
    store: Arc<CollectionStore>,
    state: Mutex<SessionState>,
    generations: AtomicU64,
}

impl EditSession {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self {
            store,
            state: Mutex::new(SessionState::Closed),
            generations: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match &*mutex_lock(&self.state, SOURCE, "phase") {
            SessionState::Closed => SessionPhase::Closed,
            SessionState::Open(_) => SessionPhase::Open,
            SessionState::Committing(_) => SessionPhase::Committing,
        }
    }

    pub fn view(&self) -> Option<SessionView> {
        match &*mutex_lock(&self.state, SOURCE, "view") {
            SessionState::Closed => None,
            SessionState::Open(active) => Some(SessionView {
                target: active.target.clone(),
                draft: active.draft.clone(),
                saving: false,
            }),
            SessionState::Committing(active) => Some(SessionView {
                target: active.target.clone(),
                draft: active.draft.clone(),
                saving: true,
            }),
        }
    }

    /// Open a session on `post`, discarding any uncommitted draft.
    pub fn begin_edit(&self, post: Post) -> Result<SessionView, SessionError> {
        let mut state = mutex_lock(&self.state, SOURCE, "begin_edit");
        match &*state {
            SessionState::Open(previous) if previous.draft != Draft::from_post(&previous.target) => {
                info!(
                    post_id = %previous.target.id,
                    "Discarding unsaved draft to edit another post"
                );
            }
            SessionState::Committing(_) => return Err(SessionError::Committing),
            SessionState::Open(_) | SessionState::Closed => {}
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let draft = Draft::from_post(&post);
        debug!(post_id = %post.id, generation, "Edit session opened");
        *state = SessionState::Open(ActiveSession {
            generation,
            target: post.clone(),
            draft: draft.clone(),
        });

        Ok(SessionView {
            target: post,
            draft,
            saving: false,
        })
    }

    /// Replace one draft field. No validation happens until [`submit`](Self::submit).
    pub fn set_draft_field(
        &self,
        field: DraftField,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        match &mut *mutex_lock(&self.state, SOURCE, "set_draft_field") {
            SessionState::Open(active) => {
                active.draft.set(field, value);
                Ok(())
            }
            SessionState::Committing(_) => Err(SessionError::Committing),
            SessionState::Closed => Err(SessionError::NotEditing),
        }
    }

    /// Drop the draft without contacting the remote store.
    pub fn cancel(&self) -> Result<(), SessionError> {
        let mut state = mutex_lock(&self.state, SOURCE, "cancel");
        match &*state {
            SessionState::Open(active) => {
                debug!(post_id = %active.target.id, "Edit session cancelled");
            }
            SessionState::Committing(_) => return Err(SessionError::Committing),
            SessionState::Closed => return Err(SessionError::NotEditing),
        }
        *state = SessionState::Closed;
        Ok(())
    }

    /// Close unconditionally, for when the owning view goes away.
    ///
    /// A commit still in flight keeps running, but its result no longer
    /// changes this controller.
    pub fn close(&self) {
        *mutex_lock(&self.state, SOURCE, "close") = SessionState::Closed;
    }

    /// Validate the draft and send it as an update of the target post.
    ///
    /// On success the session closes; the collection store has already
    /// reloaded by the time this returns. On failure the session reopens with
    /// the draft untouched so the user can correct it and retry.
    pub async fn submit(&self) -> Result<Post, SessionError> {
        let (generation, id, fields) = {
            let mut state = mutex_lock(&self.state, SOURCE, "submit.start");
            let active = match &*state {
                SessionState::Open(active) => active.clone(),
                SessionState::Committing(_) => return Err(SessionError::Committing),
                SessionState::Closed => return Err(SessionError::NotEditing),
            };
            let fields = active.draft.to_fields();
            validate_fields(&fields)?;

            let request = (active.generation, active.target.id.clone(), fields);
            *state = SessionState::Committing(active);
            request
        };
        debug!(post_id = %id, generation, "Committing edit session");

        let result = self.store.update(&id, &fields).await;

        let mut state = mutex_lock(&self.state, SOURCE, "submit.settle");
        let current = match &*state {
            SessionState::Committing(active) if active.generation == generation => {
                Some(active.clone())
            }
            _ => None,
        };

        match (current, result) {
            (Some(_), Ok(post)) => {
                *state = SessionState::Closed;
                info!(post_id = %post.id, "Edit saved");
                Ok(post)
            }
            (Some(active), Err(err)) => {
                warn!(post_id = %id, error = %err, "Edit failed; draft kept for retry");
                *state = SessionState::Open(active);
                Err(err.into())
            }
            (None, result) => {
                debug!(
                    post_id = %id,
                    generation,
                    "Edit session closed while saving; result not applied"
                );
                result.map_err(SessionError::from)
            }
        }
    }
}
