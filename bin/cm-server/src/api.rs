//! HTTP routes for the customer lifecycle.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use cm_customer::customer::operations::{
    CompleteSignupCommand, CompleteSignupResult, EmailVerifyCommand, EmailVerifyResult,
    FreezeCustomerCommand, RecoverCustomerCommand, SignupCommand, SignupResult,
};
use cm_customer::{Customer, CustomerError, CustomerService};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub struct ApiError(CustomerError);

impl From<CustomerError> for ApiError {
    fn from(err: CustomerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "Request failed");
        }

        let body = ErrorResponse {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: Arc<CustomerService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/signup", post(signup))
        .route("/v1/email-verify", post(email_verify))
        .route("/v1/complete-signup", post(complete_signup))
        .route("/v1/customers/{id}/freeze", post(freeze))
        .route("/v1/customers/{id}/recover", post(recover))
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP" }))
}

async fn signup(
    State(service): State<Arc<CustomerService>>,
    Json(command): Json<SignupCommand>,
) -> ApiResult<SignupResult> {
    Ok(Json(service.signup(command).await?))
}

async fn email_verify(
    State(service): State<Arc<CustomerService>>,
    Json(command): Json<EmailVerifyCommand>,
) -> ApiResult<EmailVerifyResult> {
    Ok(Json(service.email_verify(command).await?))
}

async fn complete_signup(
    State(service): State<Arc<CustomerService>>,
    Json(command): Json<CompleteSignupCommand>,
) -> ApiResult<CompleteSignupResult> {
    Ok(Json(service.complete_signup(command).await?))
}

async fn freeze(
    State(service): State<Arc<CustomerService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Customer> {
    let command = FreezeCustomerCommand { customer_id: id };
    Ok(Json(service.freeze(command).await?))
}

async fn recover(
    State(service): State<Arc<CustomerService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Customer> {
    let command = RecoverCustomerCommand { customer_id: id };
    Ok(Json(service.recover(command).await?))
}
