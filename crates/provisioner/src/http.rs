//! HTTP provisioner: creates accounts through a provisioning endpoint
//!
//! POSTs `{"queue": "<queue>"}` to the configured URL and expects a JSON body
//! with the new account id in its `account` field. 401/403 are reported as
//! `Rejected` so operators can tell bad credentials apart from a flaky upstream.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api_key::ApiKey;
use crate::error::{Error, Result};
use crate::{Provisioner, normalize_account_id};

#[derive(Debug, Serialize)]
struct CreateAccountRequest<'a> {
    queue: &'a str,
}

/// Response body from the provisioning endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateAccountResponse {
    pub account: String,
}

/// Provisioner backed by a single HTTP endpoint.
pub struct HttpProvisioner {
    client: reqwest::Client,
    url: String,
    queue: String,
    api_key: Option<ApiKey>,
    timeout: Duration,
}

impl HttpProvisioner {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        queue: impl Into<String>,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            queue: queue.into(),
            api_key,
            timeout,
        }
    }

    async fn request(&self) -> Result<String> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&CreateAccountRequest { queue: &self.queue });
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key.bearer());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("create account request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::Rejected(format!(
                    "provisioning endpoint returned {status}: {body}"
                )));
            }

            return Err(Error::Http(format!(
                "provisioning endpoint returned {status}: {body}"
            )));
        }

        let body = response
            .json::<CreateAccountResponse>()
            .await
            .map_err(|e| Error::InvalidResponse(format!("decoding create account response: {e}")))?;

        normalize_account_id(&body.account)
    }
}

impl Provisioner for HttpProvisioner {
    fn id(&self) -> &str {
        "http"
    }

    fn create_account(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            match self.request().await {
                Ok(account_id) => {
                    info!(account_id = %account_id, "provisioning endpoint created account");
                    Ok(account_id)
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "provisioning request failed");
                    Err(e)
                }
            }
        })
    }
}
