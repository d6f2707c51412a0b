use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::account::{Account, AccountSpec, ObjectKey};
use crate::store::{AccountStore, StoreError};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
}

/// API error response
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: u32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            404 => StatusCode::NOT_FOUND,
            409 => StatusCode::CONFLICT,
            400 => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::NotFound(_) => 404,
            StoreError::AlreadyExists(_) | StoreError::Conflict { .. } => 409,
            StoreError::Invalid(_) => 400,
        };
        ApiError {
            error: e.to_string(),
            code,
        }
    }
}

// === Version ===

/// Version information
#[derive(Serialize, ToSchema)]
pub struct VersionInfo {
    pub version: String,
}

/// Get service version
#[utoipa::path(
    get,
    path = "/api/v1/version",
    responses(
        (status = 200, description = "Service version", body = VersionInfo)
    ),
    tag = "system"
)]
pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// === Accounts ===

/// Desired account fields
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AccountSpecBody {
    #[serde(rename = "organisationID")]
    pub organisation_id: String,
    /// ISO 3166-1 country code, e.g. "GB"
    pub country: String,
    #[serde(rename = "bankID")]
    pub bank_id: String,
    #[serde(rename = "bankIDCode")]
    pub bank_id_code: String,
    pub bic: String,
}

impl From<AccountSpecBody> for AccountSpec {
    fn from(body: AccountSpecBody) -> Self {
        AccountSpec {
            organisation_id: body.organisation_id,
            country: body.country,
            bank_id: body.bank_id,
            bank_id_code: body.bank_id_code,
            bic: body.bic,
        }
    }
}

/// Observed account state
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusBody {
    /// Form3 account ID, empty until created
    pub id: String,
    pub iban: String,
    pub account_number: String,
    pub base_currency: String,
    /// "", "Pending", "Ready" or "Failed"
    pub state: String,
    pub message: String,
}

/// Request to create or replace an account's desired state
#[derive(Deserialize, ToSchema)]
pub struct ApplyAccountRequest {
    pub spec: AccountSpecBody,
}

/// Account resource
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResource {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub resource_version: u64,
    pub created_at: Option<String>,
    /// Set while deletion waits for finalizers
    pub deletion_requested_at: Option<String>,
    pub finalizers: Vec<String>,
    pub spec: AccountSpecBody,
    pub status: AccountStatusBody,
}

impl From<Account> for AccountResource {
    fn from(account: Account) -> Self {
        let meta = account.metadata;
        AccountResource {
            finalizers: meta.finalizers.iter().map(str::to_string).collect(),
            namespace: meta.namespace,
            name: meta.name,
            uid: meta.uid,
            resource_version: meta.resource_version,
            created_at: meta.creation_timestamp.map(|t| t.to_rfc3339()),
            deletion_requested_at: meta.deletion_timestamp.map(|t| t.to_rfc3339()),
            spec: AccountSpecBody {
                organisation_id: account.spec.organisation_id,
                country: account.spec.country,
                bank_id: account.spec.bank_id,
                bank_id_code: account.spec.bank_id_code,
                bic: account.spec.bic,
            },
            status: AccountStatusBody {
                state: account.status.state.as_str().to_string(),
                id: account.status.id,
                iban: account.status.iban,
                account_number: account.status.account_number,
                base_currency: account.status.base_currency,
                message: account.status.message,
            },
        }
    }
}

/// Response for account deletion
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DeleteAccountResponse {
    pub namespace: String,
    pub name: String,
    /// True while finalizers still hold the object
    pub finalizing: bool,
}

fn validate_spec(spec: &AccountSpecBody) -> Result<(), ApiError> {
    let fields = [
        ("organisationID", &spec.organisation_id),
        ("country", &spec.country),
        ("bankID", &spec.bank_id),
        ("bankIDCode", &spec.bank_id_code),
        ("bic", &spec.bic),
    ];
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(ApiError {
            error: format!("{} is required", field),
            code: 400,
        }),
        None => Ok(()),
    }
}

/// List accounts in all namespaces
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "List of accounts", body = Vec<AccountResource>)
    ),
    tag = "accounts"
)]
pub async fn list_all_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountResource>>, ApiError> {
    let accounts = state.store.list().await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// List accounts in a namespace
#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{namespace}/accounts",
    params(
        ("namespace" = String, Path, description = "Namespace")
    ),
    responses(
        (status = 200, description = "List of accounts", body = Vec<AccountResource>)
    ),
    tag = "accounts"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<AccountResource>>, ApiError> {
    let accounts = state.store.list_namespace(&namespace).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// Get an account
#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{namespace}/accounts/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("name" = String, Path, description = "Account name")
    ),
    responses(
        (status = 200, description = "Account found", body = AccountResource),
        (status = 404, description = "Account not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<AccountResource>, ApiError> {
    let key = ObjectKey::new(namespace, name);
    let account = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
    Ok(Json(account.into()))
}

/// Create an account or replace its desired state
#[utoipa::path(
    put,
    path = "/api/v1/namespaces/{namespace}/accounts/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("name" = String, Path, description = "Account name")
    ),
    request_body = ApplyAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResource),
        (status = 200, description = "Account updated", body = AccountResource),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 409, description = "Concurrent modification", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn apply_account(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<ApplyAccountRequest>,
) -> Result<(StatusCode, Json<AccountResource>), ApiError> {
    validate_spec(&req.spec)?;
    let key = ObjectKey::new(namespace, name);
    let spec = AccountSpec::from(req.spec);

    match state.store.get(&key).await? {
        Some(mut account) => {
            account.spec = spec;
            let updated = state.store.update(account).await?;
            Ok((StatusCode::OK, Json(updated.into())))
        }
        None => {
            let created = state
                .store
                .create(Account::new(key.namespace, key.name, spec))
                .await?;
            Ok((StatusCode::CREATED, Json(created.into())))
        }
    }
}

/// Request deletion of an account
#[utoipa::path(
    delete,
    path = "/api/v1/namespaces/{namespace}/accounts/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("name" = String, Path, description = "Account name")
    ),
    responses(
        (status = 202, description = "Deletion accepted", body = DeleteAccountResponse),
        (status = 404, description = "Account not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<DeleteAccountResponse>), ApiError> {
    let key = ObjectKey::new(namespace, name);
    state.store.delete(&key).await?;
    let finalizing = state.store.get(&key).await?.is_some();

    Ok((
        StatusCode::ACCEPTED,
        Json(DeleteAccountResponse {
            namespace: key.namespace,
            name: key.name,
            finalizing,
        }),
    ))
}
