//! REST API for applying and inspecting Account objects.

mod handlers;
mod routes;

pub use handlers::{
    AccountResource, AccountSpecBody, AccountStatusBody, ApiError, AppState,
    ApplyAccountRequest, DeleteAccountResponse,
};
pub use routes::create_router;
