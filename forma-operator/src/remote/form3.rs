//! Client for the Form3 organisation accounts API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AccountClient, CreateAccountRequest, RemoteAccount, RemoteError, Result};

const ACCOUNTS_PATH: &str = "/v1/organisation/accounts";

/// Connection settings for [`Form3Client`].
#[derive(Debug, Clone)]
pub struct Form3Config {
    /// Base URL, e.g. `https://api.staging-form3.tech`.
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one.
    pub token: Option<String>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for Form3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct AccountEnvelope<'a> {
    data: AccountData<'a>,
}

#[derive(Serialize)]
struct AccountData<'a> {
    id: String,
    organisation_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    attributes: AccountAttributes<'a>,
}

#[derive(Serialize)]
struct AccountAttributes<'a> {
    country: &'a str,
    bank_id: &'a str,
    bank_id_code: &'a str,
    bic: &'a str,
}

#[derive(Deserialize)]
struct CreatedEnvelope {
    data: CreatedData,
}

#[derive(Deserialize)]
struct CreatedData {
    id: String,
    #[serde(default)]
    attributes: CreatedAttributes,
}

#[derive(Deserialize, Default)]
struct CreatedAttributes {
    #[serde(default)]
    iban: Option<String>,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    base_currency: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error_message: String,
}

/// HTTP client for Form3 accounts.
#[derive(Debug, Clone)]
pub struct Form3Client {
    endpoint: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl Form3Client {
    pub fn new(config: Form3Config) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token,
            http,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-success response into [`RemoteError::Api`].
async fn api_error(response: reqwest::Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error_message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                body
            }
        });
    RemoteError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl AccountClient for Form3Client {
    async fn create_account(&self, req: &CreateAccountRequest) -> Result<RemoteAccount> {
        let body = AccountEnvelope {
            data: AccountData {
                id: uuid::Uuid::new_v4().to_string(),
                organisation_id: &req.organisation_id,
                kind: "accounts",
                attributes: AccountAttributes {
                    country: &req.country,
                    bank_id: &req.bank_id,
                    bank_id_code: &req.bank_id_code,
                    bic: &req.bic,
                },
            },
        };
        debug!(
            "Creating Form3 account {} for organisation {}",
            body.data.id, req.organisation_id
        );

        let url = format!("{}{}", self.endpoint, ACCOUNTS_PATH);
        let response = self
            .authorize(self.http.post(url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let created: CreatedEnvelope = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        if created.data.id.is_empty() {
            return Err(RemoteError::Decode("account id missing".to_string()));
        }

        let attrs = created.data.attributes;
        Ok(RemoteAccount {
            id: created.data.id,
            iban: attrs.iban.unwrap_or_default(),
            account_number: attrs.account_number.unwrap_or_default(),
            base_currency: attrs.base_currency.unwrap_or_default(),
        })
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        debug!("Deleting Form3 account {}", id);
        let url = format!("{}{}/{}", self.endpoint, ACCOUNTS_PATH, id);
        let response = self
            .authorize(self.http.delete(url))
            .query(&[("version", "0")])
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!("Form3 account {} already gone", id);
                Ok(())
            }
            _ => Err(api_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CreateAccountRequest {
        CreateAccountRequest {
            organisation_id: "org-1".to_string(),
            country: "GB".to_string(),
            bank_id: "400300".to_string(),
            bank_id_code: "GBDSC".to_string(),
            bic: "NWBKGB22".to_string(),
        }
    }

    fn client(server: &MockServer, token: Option<&str>) -> Form3Client {
        Form3Client::new(Form3Config {
            endpoint: format!("{}/", server.uri()),
            token: token.map(str::to_string),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/organisation/accounts"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "data": {
                    "organisation_id": "org-1",
                    "type": "accounts",
                    "attributes": {
                        "country": "GB",
                        "bank_id": "400300",
                        "bank_id_code": "GBDSC",
                        "bic": "NWBKGB22"
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {
                    "id": "acc-1",
                    "type": "accounts",
                    "attributes": {
                        "iban": "GB11NWBK40030041426819",
                        "account_number": "41426819",
                        "base_currency": "GBP"
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let account = client(&server, Some("secret"))
            .create_account(&request())
            .await
            .unwrap();
        assert_eq!(
            account,
            RemoteAccount {
                id: "acc-1".to_string(),
                iban: "GB11NWBK40030041426819".to_string(),
                account_number: "41426819".to_string(),
                base_currency: "GBP".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_create_account_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/organisation/accounts"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error_message": "Account cannot be created as it violates a duplicate constraint"
            })))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .create_account(&request())
            .await
            .unwrap_err();
        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 409);
                assert!(message.contains("duplicate constraint"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_account_missing_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "data": { "id": "" } })),
            )
            .mount(&server)
            .await;

        let err = client(&server, None)
            .create_account(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn test_delete_account() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/organisation/accounts/acc-1"))
            .and(query_param("version", "0"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, None).delete_account("acc-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_account_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/organisation/accounts/acc-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client(&server, None).delete_account("acc-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_account_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .delete_account("acc-1")
            .await
            .unwrap_err();
        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
