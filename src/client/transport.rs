use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::middleware_layer::auth::TOKEN_HEADER;
use crate::models::{
    auth::{
        AuthResponse, DataResponse, ErrorResponse, LoginRequest, RegisterRequest,
        UpdateDetailsRequest, UpdatePasswordRequest,
    },
    user::UserProfile,
};

/// A failed identity call, as seen by the client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error status.
    #[error("Server responded with {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        message: Option<String>,
    },

    /// The request never got a usable answer.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The credential store failed.
    #[error("Credential store error: {0}")]
    Store(#[from] std::io::Error),

    /// The operation needs an authenticated session.
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// The server's message when it sent one, `fallback` otherwise.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ClientError::Api {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// True when the server rejected the request outright, as opposed to the
    /// request failing to arrive.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Api { .. })
    }
}

/// The identity calls the session manager makes. The transport owns the
/// attached credential and sends it with every call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attaches (`Some`) or detaches (`None`) the credential.
    fn set_token(&self, token: Option<String>);
    /// The currently attached credential.
    fn token(&self) -> Option<String>;

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError>;
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError>;
    async fn me(&self) -> Result<UserProfile, ClientError>;
    async fn update_details(&self, req: &UpdateDetailsRequest) -> Result<UserProfile, ClientError>;
    async fn update_password(&self, req: &UpdatePasswordRequest)
    -> Result<AuthResponse, ClientError>;
}

/// HTTP transport over `reqwest`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Creates a client for the server at `base_url`, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a request to `path` with the attached credential, if any.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.token() {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        decode(builder.send().await?).await
    }
}

/// Turns a response into `T`, or into `ClientError::Api` carrying the
/// server's `error` message.
pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = response
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(|body| body.error);
    tracing::debug!("Request failed with {}: {:?}", status, message);

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Transport for ApiClient {
    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.send(Method::POST, "/api/auth/register", Some(req)).await
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.send(Method::POST, "/api/auth/login", Some(req)).await
    }

    async fn me(&self) -> Result<UserProfile, ClientError> {
        let body: DataResponse<UserProfile> =
            self.send::<(), _>(Method::GET, "/api/auth/me", None).await?;
        Ok(body.data)
    }

    async fn update_details(&self, req: &UpdateDetailsRequest) -> Result<UserProfile, ClientError> {
        let body: DataResponse<UserProfile> = self
            .send(Method::PUT, "/api/auth/updatedetails", Some(req))
            .await?;
        Ok(body.data)
    }

    async fn update_password(
        &self,
        req: &UpdatePasswordRequest,
    ) -> Result<AuthResponse, ClientError> {
        self.send(Method::PUT, "/api/auth/updatepassword", Some(req))
            .await
    }
}
