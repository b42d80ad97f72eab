use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result, format_api_error};

/// One blocking JSON `GET`.
///
/// Both clients go through this trait so they can be driven by something
/// other than a live HTTP connection.
pub trait Transport {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        (**self).get_json(url, query)
    }
}

/// [`Transport`] backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.build_http()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        debug!(url, ?query, "GET");

        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(|source| Error::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let text = resp.text().map_err(|source| Error::Http {
            url: final_url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(format_api_error(status, &final_url, &text));
        }

        serde_json::from_str(&text).map_err(|source| Error::Json {
            url: final_url,
            source,
        })
    }
}
