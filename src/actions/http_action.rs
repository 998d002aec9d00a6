use crate::errors::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Remote action: the arguments are POSTed as JSON, the reply body is the result
#[derive(Debug, Clone)]
pub struct HttpAction {
    client: Client,
    url: Url,
}

impl HttpAction {
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// # Errors
    /// * `Error::HttpError` - the request could not be sent
    /// * `Error::Delegate` - the endpoint answered with a non-success status
    pub async fn call(&self, args: &Value) -> Result<Value> {
        debug!("POST {} with {}", self.url, args);
        let res = self.client.post(self.url.clone()).json(args).send().await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(Error::Delegate(format!(
                "action endpoint {} answered {}: {}",
                self.url, status, body
            )));
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
