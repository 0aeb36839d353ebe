//! This module provides a client to store jCal resources on a CalDAV server

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LOCATION, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Method, RequestBuilder, Response};
use url::Url;

use crate::config::CALENDAR_JSON;
use crate::error::{PollError, Result};
use crate::jcal::JcalComponent;
use crate::resource::{StoredResource, VersionTag};
use crate::traits::ResourceStore;

/// A [`ResourceStore`] that talks HTTP to a CalDAV server. Failed requests are not retried
pub struct HttpStore {
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
}

impl HttpStore {
    /// Create a store. This does not start a connection
    pub fn new() -> Self {
        Self { client: reqwest::Client::new(), username: None, password: None }
    }

    pub fn with_credentials<T: ToString, U: ToString>(username: T, password: U) -> Self {
        Self {
            client: reqwest::Client::new(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        }
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let builder = self.client
            .request(method, url.as_str())
            .header(ACCEPT, CALENDAR_JSON);
        match &self.username {
            Some(username) => builder.basic_auth(username.clone(), self.password.clone()),
            None => builder,
        }
    }

    fn with_etag(builder: RequestBuilder, etag: Option<&VersionTag>) -> RequestBuilder {
        match etag {
            Some(etag) => builder.header(IF_MATCH, etag.as_str()),
            None => builder,
        }
    }
}

impl Default for HttpStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let url = res.url().clone();
    let text = res.text().await.unwrap_or_default();
    log::warn!("{} replied {}: {}", url, status, text);
    let message = status.canonical_reason().unwrap_or("unexpected status").to_string();
    Err(PollError::transport(Some(status.as_u16()), message))
}

fn etag_of(res: &Response) -> Option<VersionTag> {
    res.headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(|value| VersionTag::from(value.to_string()))
}

/// Parse a response body, which may legitimately be empty
async fn body_of(res: Response) -> Result<Option<JcalComponent>> {
    let text = res.text().await?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(text.parse()?))
}

#[async_trait]
impl ResourceStore for HttpStore {
    async fn fetch(&self, url: &Url) -> Result<StoredResource> {
        let res = self.request(Method::GET, url).send().await?;
        let res = check_status(res).await?;
        let etag = etag_of(&res);
        let data = body_of(res).await?;
        Ok(StoredResource { url: url.clone(), etag, data })
    }

    async fn create(&self, add_member: &Url, body: &JcalComponent) -> Result<StoredResource> {
        let res = self.request(Method::POST, add_member)
            .header(CONTENT_TYPE, CALENDAR_JSON)
            .header("Prefer", "return=representation")
            .body(body.to_string())
            .send()
            .await?;
        let res = check_status(res).await?;

        let location = res.headers()
            .get(CONTENT_LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| PollError::transport(Some(res.status().as_u16()), "the server did not tell where the new resource is"))?;
        let url = add_member.join(location)?;
        let etag = etag_of(&res);
        let data = body_of(res).await?;
        log::debug!("Created {}", url);
        Ok(StoredResource { url, etag, data })
    }

    async fn put(&self, url: &Url, etag: Option<&VersionTag>, body: &JcalComponent) -> Result<StoredResource> {
        let builder = self.request(Method::PUT, url)
            .header(CONTENT_TYPE, CALENDAR_JSON)
            .body(body.to_string());
        let res = Self::with_etag(builder, etag).send().await?;
        let res = check_status(res).await?;
        let etag = etag_of(&res);
        let data = body_of(res).await?;
        Ok(StoredResource { url: url.clone(), etag, data })
    }

    async fn delete(&self, url: &Url, etag: Option<&VersionTag>) -> Result<()> {
        let res = Self::with_etag(self.request(Method::DELETE, url), etag).send().await?;
        check_status(res).await?;
        Ok(())
    }
}
