//! # Firebase Realtime Database
//!
//! REST mapping, every node is reachable at `<base>/<path>.json`.
//!
//! | Operation | Request |
//! |---|---|
//! | get | `GET` |
//! | set | `PUT` |
//! | update | `PATCH` |
//! | delete | `DELETE` |
//! | push | `POST`, reply is `{"name": <key>}` |
//! | get_versioned | `GET` + `X-Firebase-ETag: true`, version in the `ETag` reply header |
//! | set_if | `PUT` + `if-match`, `412` when the node changed |
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header::ETAG};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{RecordStore, StoreError, Version, Versioned, credentials::Credentials, normalize};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const IF_MATCH_HEADER: &str = "if-match";

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

pub struct FirebaseStore {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl FirebaseStore {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, normalize(path))
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        debug!("{method} /{}", normalize(path));

        let mut request = self.client.request(method, self.url(path));

        if let Some((key, value)) = self.credentials.query_param(&self.client).await? {
            request = request.query(&[(key, value)]);
        }

        Ok(request)
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

async fn read_value(response: Response) -> Result<Option<Value>, StoreError> {
    let text = response.text().await?;

    match serde_json::from_str(&text)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

#[async_trait]
impl RecordStore for FirebaseStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self.request(Method::GET, path).await?.send().await?;

        read_value(check(response).await?).await
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let response = self.request(Method::PUT, path).await?.json(value).send().await?;
        check(response).await?;

        Ok(())
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let response = self.request(Method::PATCH, path).await?.json(fields).send().await?;
        check(response).await?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self.request(Method::DELETE, path).await?.send().await?;
        check(response).await?;

        Ok(())
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let response = self.request(Method::POST, path).await?.json(value).send().await?;
        let text = check(response).await?.text().await?;
        let pushed: PushResponse = serde_json::from_str(&text)?;

        Ok(pushed.name)
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, StoreError> {
        let response = self
            .request(Method::GET, path)
            .await?
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let response = check(response).await?;

        let version = response
            .headers()
            .get(ETAG)
            .and_then(|tag| tag.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Versioned {
            value: read_value(response).await?,
            version: Version(version),
        })
    }

    async fn set_if(
        &self,
        path: &str,
        value: &Value,
        version: &Version,
    ) -> Result<bool, StoreError> {
        let response = self
            .request(Method::PUT, path)
            .await?
            .header(IF_MATCH_HEADER, &version.0)
            .json(value)
            .send()
            .await?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            debug!("Conditional write to /{} lost the race", normalize(path));
            return Ok(false);
        }

        check(response).await?;
        Ok(true)
    }
}
