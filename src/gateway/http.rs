//! REST client for the remote cart service.
//!
//! Routes (relative to [`HttpGatewayConfig::base_url`]):
//! - `GET    /users/{user}/cart`
//! - `POST   /users/{user}/cart/items`
//! - `PATCH  /users/{user}/cart/items/{line}`
//! - `DELETE /users/{user}/cart/items/{line}`
//! - `DELETE /users/{user}/cart`
//!
//! Ids are percent-encoded as single path segments. Non-2xx bodies are read as
//! `{"message": ..., "availableQuantity": ...}`.

use super::{AddLineRequest, GatewayError, GatewayResult, HttpGatewayConfig, RemoteCartGateway};
use crate::core::{CartError, CartSnapshot, Result, ServerLineId, UserId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default, alias = "error")]
    message: Option<String>,
    #[serde(default)]
    available_quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
struct QuantityBody {
    quantity: u32,
}

pub struct HttpCartGateway {
    client: Client,
    config: HttpGatewayConfig,
    base: Url,
}

impl HttpCartGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(&config.base_url())
            .map_err(|err| CartError::config(format!("Invalid cart service URL: {}", err)))?;
        if base.cannot_be_a_base() {
            return Err(CartError::config(format!(
                "Cart service URL '{}' cannot carry a path",
                base
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| CartError::config(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self {
            client,
            config,
            base,
        })
    }

    pub fn config(&self) -> &HttpGatewayConfig {
        &self.config
    }

    /// Appends `segments` to the base URL, encoding each one.
    fn url(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport(format!("'{}' cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    fn cart_url(&self, user: &UserId) -> GatewayResult<Url> {
        self.url(&["users", user.as_str(), "cart"])
    }

    fn items_url(&self, user: &UserId) -> GatewayResult<Url> {
        self.url(&["users", user.as_str(), "cart", "items"])
    }

    fn line_url(&self, user: &UserId, line: &ServerLineId) -> GatewayResult<Url> {
        self.url(&["users", user.as_str(), "cart", "items", line.as_str()])
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let request = match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        debug!(status = %status, url = %response.url(), "cart gateway response");
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| format!("cart service responded with {}", status));

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized(message));
        }

        Err(GatewayError::Rejected {
            message,
            available_quantity: body.available_quantity,
        })
    }

    async fn read_snapshot(response: Response) -> GatewayResult<CartSnapshot> {
        response
            .json::<CartSnapshot>()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn read_optional_snapshot(response: Response) -> GatewayResult<Option<CartSnapshot>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl RemoteCartGateway for HttpCartGateway {
    async fn fetch(&self, user: &UserId) -> GatewayResult<CartSnapshot> {
        let response = self.send(self.client.get(self.cart_url(user)?)).await?;
        Self::read_snapshot(response).await
    }

    async fn add(&self, user: &UserId, request: AddLineRequest) -> GatewayResult<CartSnapshot> {
        let url = self.items_url(user)?;
        let response = self.send(self.client.post(url).json(&request)).await?;
        Self::read_snapshot(response).await
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        line: &ServerLineId,
        quantity: u32,
    ) -> GatewayResult<Option<CartSnapshot>> {
        let response = self
            .send(
                self.client
                    .patch(self.line_url(user, line)?)
                    .json(&QuantityBody { quantity }),
            )
            .await?;
        Self::read_optional_snapshot(response).await
    }

    async fn remove(&self, user: &UserId, line: &ServerLineId) -> GatewayResult<()> {
        self.send(self.client.delete(self.line_url(user, line)?))
            .await
            .map(|_| ())
    }

    async fn clear(&self, user: &UserId) -> GatewayResult<()> {
        self.send(self.client.delete(self.cart_url(user)?))
            .await
            .map(|_| ())
    }
}
