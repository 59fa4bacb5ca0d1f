//! Post composer: the creation flow.
//!
//! The composer writes through the gateway directly and announces the change
//! on the refresh signal instead of calling the collection store, so the form
//! that creates posts does not need to know who displays them.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::error::FieldError;
use crate::domain::posts::{Post, PostFields, normalize_fields, validate_fields};

use super::gateway::{GatewayError, PostsGateway};
use super::refresh::RefreshSignal;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("post is invalid: {0}")]
    Invalid(#[from] FieldError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Clone)]
pub struct PostComposer {
    gateway: Arc<dyn PostsGateway>,
    signal: RefreshSignal,
}

impl PostComposer {
    pub fn new(gateway: Arc<dyn PostsGateway>, signal: RefreshSignal) -> Self {
        Self { gateway, signal }
    }

    /// Create a post and ask listeners to refresh.
    #[instrument(skip(self, fields))]
    pub async fn publish(&self, fields: PostFields) -> Result<Post, ComposeError> {
        let fields = normalize_fields(fields);
        validate_fields(&fields)?;

        let post = self.gateway.create(&fields).await.inspect_err(|err| {
            warn!(error = %err, kind = err.kind(), "Failed to create post");
        })?;
        let receivers = self.signal.posts_updated();
        info!(post_id = %post.id, receivers, "Post created");
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::application::store::{CollectionStore, LoadStatus};
    use crate::application::test_support::{ScriptedGateway, post};

    #[tokio::test]
    async fn publish_creates_and_signals() {
        let gateway = Arc::new(ScriptedGateway::default());
        let signal = RefreshSignal::default();
        let mut receiver = signal.subscribe();
        let composer = PostComposer::new(gateway.clone(), signal.clone());

        let created = composer
            .publish(PostFields::new(" A ", "hi").with_image_url(""))
            .await
            .expect("publish");

        assert_eq!(created.author, "A");
        assert_eq!(created.image_url, None);
        assert_eq!(gateway.create_calls(), 1);
        assert!(receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn invalid_post_is_not_sent() {
        let gateway = Arc::new(ScriptedGateway::default());
        let signal = RefreshSignal::default();
        let composer = PostComposer::new(gateway.clone(), signal.clone());

        let err = composer
            .publish(PostFields::new("", "hi"))
            .await
            .expect_err("author required");

        assert!(matches!(err, ComposeError::Invalid(FieldError::MissingAuthor)));
        assert_eq!(gateway.create_calls(), 0);
        assert_eq!(signal.published(), 0);
    }

    #[tokio::test]
    async fn failed_create_does_not_signal() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.fail_next_create(GatewayError::transport("offline"));
        let signal = RefreshSignal::default();
        let composer = PostComposer::new(gateway, signal.clone());

        let err = composer
            .publish(PostFields::new("ana", "hi"))
            .await
            .expect_err("offline");

        assert!(matches!(err, ComposeError::Gateway(GatewayError::Transport(_))));
        assert_eq!(signal.published(), 0);
    }

    #[tokio::test]
    async fn listening_store_picks_up_composed_posts() {
        let gateway = Arc::new(ScriptedGateway::with_posts(vec![
            post("1", datetime!(2024-01-01 09:00 UTC)),
            post("2", datetime!(2024-01-02 09:00 UTC)),
        ]));
        let signal = RefreshSignal::default();
        let store = Arc::new(CollectionStore::new(gateway.clone()));
        let _listener = store.listen(&signal);
        let composer = PostComposer::new(gateway.clone(), signal);
        let mut updates = store.subscribe();

        let created = composer
            .publish(PostFields::new("A", "hi"))
            .await
            .expect("publish");

        let state = tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|state| state.status == LoadStatus::Ready),
        )
        .await
        .expect("reload within timeout")
        .expect("store alive")
        .clone();
        assert_eq!(state.items.len(), 3);
        assert_eq!(state.items[0].id, created.id);
        assert!(gateway.stored(created.id.as_str()).is_some());
    }
}
