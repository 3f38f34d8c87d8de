//! This module provides a client to fetch and publish free/busy information over HTTP

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::FetchError;
use crate::freebusy::FreeBusy;
use crate::ical::{decode_free_busy, encode_free_busy};
use crate::itip::Method;
use crate::resource::Resource;
use crate::traits::{FreeBusySource, FreeBusyTarget};

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// A free/busy source and target that talks to an HTTP server (e.g. a groupware `freebusy` endpoint)
pub struct Client {
    resource: Resource,
    http: reqwest::Client,
}

impl Client {
    /// Create a client. This does not start a connection
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            http: reqwest::Client::new(),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    fn request(&self, method: reqwest::Method, url: &Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url.as_str());
        if self.resource.has_credentials() {
            builder.basic_auth(self.resource.username().clone(), Some(self.resource.password().clone()))
        } else {
            builder
        }
    }
}

fn check_status(url: &Url, response: &reqwest::Response) -> Result<(), FetchError> {
    let status = response.status();
    if status.is_success() == false {
        return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
    }
    Ok(())
}

#[async_trait]
impl FreeBusySource for Client {
    async fn fetch_free_busy(&self, email: &str) -> Result<FreeBusy, FetchError> {
        let url = self.resource.url_for(email)?;
        log::debug!("Fetching free/busy of {} from {}", email, url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        check_status(&url, &response)?;
        let text = response.text().await?;

        let mut free_busy = decode_free_busy(&text)?;
        if free_busy.owner.is_empty() {
            free_busy.owner = email.to_string();
        }
        Ok(free_busy)
    }
}

#[async_trait]
impl FreeBusyTarget for Client {
    async fn publish_free_busy(&self, free_busy: &FreeBusy) -> Result<(), FetchError> {
        let url = self.resource.url_for(&free_busy.owner)?;
        log::info!("Publishing free/busy of {} to {}", free_busy.owner, url);

        let response = self.request(reqwest::Method::PUT, &url)
            .header(CONTENT_TYPE, CALENDAR_CONTENT_TYPE)
            .body(encode_free_busy(free_busy, Some(Method::Publish)))
            .send()
            .await?;
        check_status(&url, &response)
    }
}
