// ABOUTME: HTTP surface accepting POSTed JSON messages and handing them to an SMS transmitter
// ABOUTME: Optional basic auth, fixed status mapping, pretty JSON results and a Server header on every response

use crate::client::{GsmError, OutboundMessage, SmsTransmitter};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, SERVER, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Address the server binds when none is given.
pub const DEFAULT_BIND: &str = "0.0.0.0:38164";

/// Value of the `Server` header.
pub const SERVER_NAME: &str = concat!("gsm-sender/", env!("CARGO_PKG_VERSION"));

/// Credentials required when basic auth is enabled
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BasicCredentials {
    /// Auth is only enabled when both values are non-empty.
    pub fn from_options(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BasicCredentials { username, password })
            }
            _ => None,
        }
    }

    fn accepts(&self, header: Option<&HeaderValue>) -> bool {
        let Some(encoded) = header
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Basic "))
        else {
            return false;
        };

        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };

        match decoded.split_once(':') {
            Some((username, password)) => username == self.username && password == self.password,
            None => false,
        }
    }
}

/// Shared handler state
pub struct AppState<T> {
    pub transmitter: Arc<T>,
    pub credentials: Option<Arc<BasicCredentials>>,
}

impl<T> AppState<T> {
    pub fn new(transmitter: T, credentials: Option<BasicCredentials>) -> Self {
        AppState {
            transmitter: Arc::new(transmitter),
            credentials: credentials.map(Arc::new),
        }
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        AppState {
            transmitter: Arc::clone(&self.transmitter),
            credentials: self.credentials.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Body of every 200 response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub status: ResponseStatus,
    pub message: String,
}

impl SendResponse {
    pub fn success() -> Self {
        SendResponse {
            status: ResponseStatus::Ok,
            message: "success".to_string(),
        }
    }

    pub fn error(err: &GsmError) -> Self {
        SendResponse {
            status: ResponseStatus::Error,
            message: err.to_string(),
        }
    }

    fn to_pretty_json(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        // Two string fields cannot fail to serialize
        let _ = self.serialize(&mut serializer);
        out
    }
}

impl IntoResponse for SendResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/json; charset=utf-8")],
            self.to_pretty_json(),
        )
            .into_response()
    }
}

fn plain(status: StatusCode) -> Response {
    let text = format!(
        "{} {}\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    (status, text).into_response()
}

/// Every path, every method, one handler.
pub fn router<T: SmsTransmitter>(state: AppState<T>) -> Router {
    Router::new().fallback(handle_sms::<T>).with_state(state)
}

async fn handle_sms<T: SmsTransmitter>(
    State(state): State<AppState<T>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut response = respond(&state, method, &headers, &body).await;
    response
        .headers_mut()
        .insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

async fn respond<T: SmsTransmitter>(
    state: &AppState<T>,
    method: Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    if method != Method::POST {
        return plain(StatusCode::METHOD_NOT_ALLOWED);
    }

    if let Some(credentials) = &state.credentials {
        if !credentials.accepts(headers.get(AUTHORIZATION)) {
            warn!("rejected request with bad credentials");
            let mut response = plain(StatusCode::UNAUTHORIZED);
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"gsm-sender\""),
            );
            return response;
        }
    }

    // A JSON `null` carries no fields, so it is treated like an empty object
    let fields = match serde_json::from_slice::<Option<HashMap<String, String>>>(body) {
        Ok(fields) => fields.unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "undecodable request body");
            return plain(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (Some(text), Some(number)) = (fields.get("text"), fields.get("number")) else {
        return plain(StatusCode::BAD_REQUEST);
    };

    let message = match OutboundMessage::encode(text, number) {
        Ok(message) => message,
        Err(e) => return SendResponse::error(&e).into_response(),
    };

    match state.transmitter.submit(message).await {
        Ok(reference) => {
            info!(reference, "message submitted over HTTP");
            SendResponse::success().into_response()
        }
        Err(e) => {
            warn!(error = %e, "message failed");
            SendResponse::error(&e).into_response()
        }
    }
}

/// Serves `state` on `listener` until `shutdown` resolves.
pub async fn serve<T, F>(listener: TcpListener, state: AppState<T>, shutdown: F) -> io::Result<()>
where
    T: SmsTransmitter,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
