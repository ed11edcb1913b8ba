use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use storage::{
    dto::{
        common::{ApiResponse, ErrorResponse},
        payment::{
            CreateOrderRequest, CreateOrderResponse, SavePaymentRequest, SavePaymentResponse,
            WebhookAck,
        },
        webhook::WebhookEvent,
    },
    models::Principal,
};
use validator::Validate;

use crate::error::WebError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Gateway order opened for the team fee", body = ApiResponse<CreateOrderResponse>),
        (status = 400, description = "Team not confirmed, already paid, or caller is not the team leader", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse),
        (status = 500, description = "Gateway refused or timed out", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "payments"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response, WebError> {
    request.validate()?;

    let order = state
        .settlement
        .create_order(principal.user_id, request.team_id, &request.payment_type)
        .await?;

    Ok(Json(ApiResponse::ok(CreateOrderResponse::from(order))).into_response())
}

#[utoipa::path(
    post,
    path = "/api/payments/save-payment",
    request_body = SavePaymentRequest,
    responses(
        (status = 200, description = "Payment settled, or already settled", body = ApiResponse<SavePaymentResponse>),
        (status = 400, description = "Signature does not match", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "payments"
)]
pub async fn save_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<SavePaymentRequest>,
) -> Result<Response, WebError> {
    request.validate()?;

    tracing::info!(
        user_id = %principal.user_id,
        order_id = %request.razorpay_order_id,
        "Client confirmed a payment"
    );
    let settled = state
        .settlement
        .confirm_payment(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        )
        .await?;

    Ok(Json(ApiResponse::ok(SavePaymentResponse::from(settled))).into_response())
}

/// The signature covers the exact bytes received, so the body is taken raw
/// and only parsed after it verifies.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body(content = String, description = "Raw gateway event JSON", content_type = "application/json"),
    params(
        ("x-razorpay-signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body")
    ),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature", body = ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state.settlement.verify_webhook(&body, signature)?;
    let signature = signature.unwrap_or_default();

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| WebError::BadRequest(format!("Malformed webhook body: {e}")))?;

    match event.capture(signature) {
        Some(notice) => {
            let outcome = state.settlement.webhook_capture(&notice).await?;
            tracing::info!(
                order_id = %notice.order_id,
                payment_id = %notice.payment_id,
                outcome = ?outcome,
                "Processed captured payment"
            );
        }
        None => tracing::debug!(event = %event.event, "Ignoring webhook event"),
    }

    Ok(Json(WebhookAck { success: true }).into_response())
}
