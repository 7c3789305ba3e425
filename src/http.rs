//! HTTP calls against the panel data API.
//!
//! `GET` reads are retried on connect errors and timeouts; `DELETE` and the
//! multipart `POST` are sent once. A 401 from any call fires the session's
//! logout callback.

use crate::auth::AuthSession;
use crate::error::{PanelLinkError, Result};
use crate::models::{QueryDescription, RecordForm, SaveResponse};
use crate::query::{encode_component, serialize};
use log::{debug, warn};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Instant;

#[derive(Clone)]
pub struct HttpExecutor {
    base_url: String,
    api_prefix: String,
    http_client: reqwest::Client,
    auth: AuthSession,
    max_retries: u32,
}

impl HttpExecutor {
    pub(crate) fn new(
        base_url: String,
        api_prefix: String,
        http_client: reqwest::Client,
        auth: AuthSession,
        max_retries: u32,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: api_prefix.trim_matches('/').to_string(),
            http_client,
            auth,
            max_retries,
        }
    }

    /// `{base}/{prefix}/{model}`
    pub fn model_url(&self, model: &str) -> String {
        if self.api_prefix.is_empty() {
            format!("{}/{}", self.base_url, model)
        } else {
            format!("{}/{}/{}", self.base_url, self.api_prefix, model)
        }
    }

    /// Fetch one grid page and return the raw envelope.
    pub async fn fetch_grid(&self, query: &QueryDescription) -> Result<Value> {
        let url = format!("{}?{}", self.model_url(&query.model), serialize(query)?);
        let mut retries = 0;
        let overall_start = Instant::now();

        loop {
            let request = self.auth.provider().apply_to_request(self.http_client.get(&url))?;
            let attempt_start = Instant::now();
            debug!(
                "[LINK_HTTP] Sending GET to {} (attempt {}/{})",
                url,
                retries + 1,
                self.max_retries + 1
            );

            match request.send().await {
                Ok(response) => {
                    debug!(
                        "[LINK_HTTP] Response received: status={} duration_ms={}",
                        response.status(),
                        attempt_start.elapsed().as_millis()
                    );
                    let response = self.check_status(response).await?;
                    let body: Value = response.json().await?;
                    debug!(
                        "[LINK_HTTP] Grid '{}' page {} loaded in {} ms",
                        query.model,
                        query.pagination.page_number,
                        overall_start.elapsed().as_millis()
                    );
                    return Ok(body);
                },
                Err(e) if retries < self.max_retries && Self::is_retriable(&e) => {
                    warn!(
                        "[LINK_HTTP] Retriable error (attempt {}/{}): {} duration_ms={}",
                        retries + 1,
                        self.max_retries + 1,
                        e,
                        attempt_start.elapsed().as_millis()
                    );
                    retries += 1;
                    tokio::time::sleep(std::time::Duration::from_millis(100 * retries as u64)).await;
                },
                Err(e) => {
                    warn!(
                        "[LINK_HTTP] Fatal error: {} total_ms={}",
                        e,
                        overall_start.elapsed().as_millis()
                    );
                    return Err(e.into());
                },
            }
        }
    }

    /// `DELETE {model_url}/{id}`
    pub async fn delete_record(&self, model: &str, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(PanelLinkError::InvalidQuery("record id must not be empty".to_string()));
        }
        let url = format!("{}/{}", self.model_url(model), encode_component(id));
        debug!("[LINK_HTTP] Sending DELETE to {}", url);
        let request = self.auth.provider().apply_to_request(self.http_client.delete(&url))?;
        let response = request.send().await?;
        self.check_status(response).await?;
        Ok(())
    }

    /// Multipart `POST {model_url}` with the form's fields.
    pub async fn save_record(&self, model: &str, form: &RecordForm) -> Result<SaveResponse> {
        let url = self.model_url(model);
        let multipart = form
            .fields()
            .iter()
            .fold(reqwest::multipart::Form::new(), |acc, (name, value)| {
                acc.text(name.clone(), value.clone())
            });
        debug!(
            "[LINK_HTTP] Sending POST to {} ({} field(s), new={})",
            url,
            form.fields().len(),
            form.is_new()
        );
        let request = self
            .auth
            .provider()
            .apply_to_request(self.http_client.post(&url).multipart(multipart))?;
        let response = self.check_status(request.send().await?).await?;
        let status_code = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(SaveResponse { status_code, body })
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.auth.logout();
            return Err(PanelLinkError::AuthenticationError(
                "Session expired or credentials rejected".to_string(),
            ));
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!("[LINK_HTTP] Server error: status={} message=\"{}\"", status, message);
        Err(PanelLinkError::ServerError {
            status_code: status.as_u16(),
            message,
        })
    }

    fn is_retriable(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(prefix: &str) -> HttpExecutor {
        HttpExecutor::new(
            "http://localhost:4000/".to_string(),
            prefix.to_string(),
            reqwest::Client::new(),
            AuthSession::default(),
            0,
        )
    }

    #[test]
    fn test_model_url() {
        assert_eq!(executor("api").model_url("devices"), "http://localhost:4000/api/devices");
        assert_eq!(executor("/svt_api/").model_url("devices"), "http://localhost:4000/svt_api/devices");
        assert_eq!(executor("").model_url("devices"), "http://localhost:4000/devices");
    }

    #[tokio::test]
    async fn test_delete_requires_id() {
        let err = executor("api").delete_record("devices", "").await.unwrap_err();
        assert!(matches!(err, PanelLinkError::InvalidQuery(_)));
    }
}
