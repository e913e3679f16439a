//! Shared fixtures: an in-memory transport with canned replies per path.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use platform_client::{
    Client, ClientProps, Environment, Transport, TransportError, TransportErrorKind,
    TransportRequest, TransportResponse, resolve,
};
use serde_json::{Value, json};

pub const CREATED_AT: &str = "2024-05-01T12:00:00.000Z";

#[derive(Clone)]
pub enum Reply {
    Status {
        status: StatusCode,
        body: Bytes,
        delay: Duration,
    },
    Error {
        kind: TransportErrorKind,
        message: String,
    },
}

impl Reply {
    pub fn json(status: u16, body: &Value) -> Self {
        Self::Status {
            status: StatusCode::from_u16(status).unwrap(),
            body: Bytes::from(serde_json::to_vec(body).unwrap()),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &'static str) -> Self {
        Self::Status {
            status: StatusCode::from_u16(status).unwrap(),
            body: Bytes::from_static(body.as_bytes()),
            delay: Duration::ZERO,
        }
    }

    pub fn error(kind: TransportErrorKind, message: &str) -> Self {
        Self::Error {
            kind,
            message: message.to_owned(),
        }
    }

    pub fn delayed(self, after: Duration) -> Self {
        match self {
            Self::Status { status, body, .. } => Self::Status {
                status,
                body,
                delay: after,
            },
            other @ Self::Error { .. } => other,
        }
    }
}

/// Records every request and answers from a table keyed by URI path.
/// Unknown paths answer `404` with an empty body.
#[derive(Default)]
pub struct StubTransport {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(path.to_owned(), reply);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> TransportRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let reply = self.replies.lock().unwrap().get(request.uri.path()).cloned();
        self.requests.lock().unwrap().push(request);

        match reply {
            Some(Reply::Status {
                status,
                body,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse {
                    status,
                    headers: HeaderMap::new(),
                    body,
                })
            }
            Some(Reply::Error { kind, message }) => Err(TransportError::new(kind, message)),
            None => Ok(TransportResponse {
                status: StatusCode::NOT_FOUND,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            }),
        }
    }
}

pub fn client_with(stub: &Arc<StubTransport>, props: &ClientProps) -> Client {
    let config = resolve(props, &Environment::isolated());
    Client::with_transport(config, Arc::clone(stub) as Arc<dyn Transport>)
}

pub fn file_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "botId": "bot_1",
        "size": 5,
        "contentType": "text/plain",
        "tags": [],
        "url": format!("https://files.example.com/{id}"),
        "createdAt": CREATED_AT,
        "updatedAt": CREATED_AT,
    })
}

pub fn bot_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "tags": { "env": "test" },
        "createdAt": CREATED_AT,
        "updatedAt": CREATED_AT,
    })
}

pub fn account_json() -> Value {
    json!({
        "id": "acc_1",
        "email": "dev@example.com",
        "displayName": "Dev",
        "emailVerified": true,
        "createdAt": CREATED_AT,
    })
}
