use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    application::gateway::{GatewayError, PostsGateway},
    domain::posts::{Post, PostFields, PostId},
    infra::error::InfraError,
};

/// `PostsGateway` backed by a JSON-over-HTTP collection resource.
#[derive(Clone, Debug)]
pub struct HttpPostsGateway {
    client: Client,
    collection: Url,
}

impl HttpPostsGateway {
    pub fn new(collection: Url) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client, collection })
    }

    pub fn user_agent() -> &'static str {
        concat!("postwall/", env!("CARGO_PKG_VERSION"))
    }

    /// `{collection}/{id}` with the id encoded as one path segment.
    fn item_url(&self, id: &PostId) -> Result<Url, GatewayError> {
        let mut url = self.collection.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::transport("collection URL cannot carry a path"))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
        request.send().await.map_err(GatewayError::transport)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(GatewayError::transport)?;
        serde_json::from_slice(&bytes).map_err(|err| {
            GatewayError::response(status.as_u16(), format!("failed to parse body: {err}"))
        })
    }
}

/// Status code and a human-readable reason for a non-success response.
async fn failure(resp: Response) -> (StatusCode, String) {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let text = text.trim();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        text.to_string()
    };
    (status, message)
}

#[async_trait]
impl PostsGateway for HttpPostsGateway {
    #[instrument(skip(self), fields(url = %self.collection))]
    async fn list(&self) -> Result<Vec<Post>, GatewayError> {
        let resp = Self::send(self.request(Method::GET, self.collection.clone())).await?;
        if !resp.status().is_success() {
            let (status, message) = failure(resp).await;
            return Err(GatewayError::response(status.as_u16(), message));
        }
        Self::decode(resp).await
    }

    #[instrument(skip(self, fields), fields(url = %self.collection))]
    async fn create(&self, fields: &PostFields) -> Result<Post, GatewayError> {
        let request = self
            .request(Method::POST, self.collection.clone())
            .json(fields);
        let resp = Self::send(request).await?;
        if !resp.status().is_success() {
            let (status, message) = failure(resp).await;
            return Err(GatewayError::validation(status.as_u16(), message));
        }
        Self::decode(resp).await
    }

    #[instrument(skip(self, id, fields), fields(post_id = %id))]
    async fn update(&self, id: &PostId, fields: &PostFields) -> Result<Post, GatewayError> {
        let url = self.item_url(id)?;
        let resp = Self::send(self.request(Method::PUT, url).json(fields)).await?;
        match resp.status() {
            status if status.is_success() => Self::decode(resp).await,
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound { id: id.clone() }),
            _ => {
                let (status, message) = failure(resp).await;
                Err(GatewayError::validation(status.as_u16(), message))
            }
        }
    }

    #[instrument(skip(self, id), fields(post_id = %id))]
    async fn delete(&self, id: &PostId) -> Result<(), GatewayError> {
        let url = self.item_url(id)?;
        let resp = Self::send(self.request(Method::DELETE, url)).await?;
        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(post_id = %id, "post already absent on delete");
                Ok(())
            }
            _ => {
                let (status, message) = failure(resp).await;
                Err(GatewayError::response(status.as_u16(), message))
            }
        }
    }
}
