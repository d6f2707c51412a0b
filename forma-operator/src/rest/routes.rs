use axum::{
    Router,
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{self, AppState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "forma operator API",
        version = "0.1.0",
        description = "REST API for declaring Form3 accounts. The operator reconciles every declared account with the Form3 account service.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "system", description = "System information"),
        (name = "accounts", description = "Account desired state")
    ),
    paths(
        handlers::get_version,
        handlers::list_all_accounts,
        handlers::list_accounts,
        handlers::get_account,
        handlers::apply_account,
        handlers::delete_account,
    ),
    components(schemas(
        handlers::VersionInfo,
        handlers::ApiError,
        handlers::AccountSpecBody,
        handlers::AccountStatusBody,
        handlers::ApplyAccountRequest,
        handlers::AccountResource,
        handlers::DeleteAccountResponse,
    ))
)]
pub struct ApiDoc;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // System
        .route("/version", get(handlers::get_version))
        // Accounts
        .route("/accounts", get(handlers::list_all_accounts))
        .route(
            "/namespaces/{namespace}/accounts",
            get(handlers::list_accounts),
        )
        .route(
            "/namespaces/{namespace}/accounts/{name}",
            get(handlers::get_account)
                .put(handlers::apply_account)
                .delete(handlers::delete_account),
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
