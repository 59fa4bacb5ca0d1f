//! In-memory gateway used by unit tests to script remote behavior.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime, macros::datetime};
use tokio::sync::oneshot;

use crate::domain::posts::{Post, PostFields, PostId};

use super::gateway::{GatewayError, PostsGateway};

pub(crate) type ListReply = Result<Vec<Post>, GatewayError>;

pub(crate) fn post(id: &str, created_at: OffsetDateTime) -> Post {
    Post {
        id: PostId::from(id),
        author: "ana".to_string(),
        content: format!("post {id}"),
        image_url: None,
        created_at,
        modified_at: None,
    }
}

/// Behaves like a small remote store unless a reply is scripted.
///
/// Gated calls wait for the test to release them, which lets tests pick the
/// order in which overlapping requests complete.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    posts: Mutex<Vec<Post>>,
    list_gates: Mutex<VecDeque<oneshot::Receiver<ListReply>>>,
    list_failures: Mutex<VecDeque<GatewayError>>,
    create_failures: Mutex<VecDeque<GatewayError>>,
    update_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    update_failures: Mutex<VecDeque<GatewayError>>,
    delete_failures: Mutex<VecDeque<GatewayError>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Self::default()
        }
    }

    pub(crate) fn gate_list(&self, reply: oneshot::Receiver<ListReply>) {
        self.list_gates
            .lock()
            .expect("list gates lock")
            .push_back(reply);
    }

    pub(crate) fn gate_update(&self, release: oneshot::Receiver<()>) {
        self.update_gates
            .lock()
            .expect("update gates lock")
            .push_back(release);
    }

    pub(crate) fn fail_next_list(&self, err: GatewayError) {
        self.list_failures
            .lock()
            .expect("list failures lock")
            .push_back(err);
    }

    pub(crate) fn fail_next_create(&self, err: GatewayError) {
        self.create_failures
            .lock()
            .expect("create failures lock")
            .push_back(err);
    }

    pub(crate) fn fail_next_update(&self, err: GatewayError) {
        self.update_failures
            .lock()
            .expect("update failures lock")
            .push_back(err);
    }

    pub(crate) fn fail_next_delete(&self, err: GatewayError) {
        self.delete_failures
            .lock()
            .expect("delete failures lock")
            .push_back(err);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, id: &str) -> Option<Post> {
        self.posts
            .lock()
            .expect("posts lock")
            .iter()
            .find(|post| post.id.as_str() == id)
            .cloned()
    }

    fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        queue.lock().expect("script queue lock").pop_front()
    }
}

#[async_trait]
impl PostsGateway for ScriptedGateway {
    async fn list(&self) -> Result<Vec<Post>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = Self::pop(&self.list_gates);
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(GatewayError::transport("list gate dropped")));
        }
        let failure = Self::pop(&self.list_failures);
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.posts.lock().expect("posts lock").clone())
    }

    async fn create(&self, fields: &PostFields) -> Result<Post, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let failure = Self::pop(&self.create_failures);
        if let Some(err) = failure {
            return Err(err);
        }

        let mut posts = self.posts.lock().expect("posts lock");
        let next_id = posts
            .iter()
            .filter_map(|post| post.id.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let created_at = posts
            .iter()
            .map(|post| post.created_at)
            .max()
            .map_or(datetime!(2024-01-01 00:00 UTC), |latest| {
                latest + Duration::minutes(1)
            });
        let post = Post {
            id: PostId::from(next_id),
            author: fields.author.clone(),
            content: fields.content.clone(),
            image_url: fields.image_url.clone(),
            created_at,
            modified_at: None,
        };
        posts.push(post.clone());
        Ok(post)
    }

    async fn update(&self, id: &PostId, fields: &PostFields) -> Result<Post, GatewayError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let gate = Self::pop(&self.update_gates);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let failure = Self::pop(&self.update_failures);
        if let Some(err) = failure {
            return Err(err);
        }

        let mut posts = self.posts.lock().expect("posts lock");
        let post = posts
            .iter_mut()
            .find(|post| &post.id == id)
            .ok_or_else(|| GatewayError::NotFound { id: id.clone() })?;
        post.author = fields.author.clone();
        post.content = fields.content.clone();
        post.image_url = fields.image_url.clone();
        post.modified_at = Some(post.created_at + Duration::hours(1));
        Ok(post.clone())
    }

    async fn delete(&self, id: &PostId) -> Result<(), GatewayError> {
        let failure = Self::pop(&self.delete_failures);
        if let Some(err) = failure {
            return Err(err);
        }
        self.posts
            .lock()
            .expect("posts lock")
            .retain(|post| &post.id != id);
        Ok(())
    }
}
