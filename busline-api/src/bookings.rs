use axum::{
    extract::{Path, State},
    Extension, Json,
};
use busline_core::booking::{BookingConfirmation, BookingRecord, BookingStatus};
use busline_core::payment::PaymentSignal;
use busline_order::ReservationRequest;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::CustomerClaims, state::AppState};

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub booking_id: Uuid,
    pub pnr: String,
    pub status: BookingStatus,
}

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<BookingConfirmation>, AppError> {
    let confirmation = state.bookings.reserve(&claims.sub, &request).await?;
    Ok(Json(confirmation))
}

/// GET /v1/bookings/{booking_id}
/// Only the customer who made the booking can read it.
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingRecord>, AppError> {
    let customer_id = state.customers.resolve_customer(&claims.sub).await?;
    let record = state.bookings.get_booking(booking_id).await?;

    if record.booking.customer_id != customer_id {
        return Err(AppError::AuthorizationError(format!(
            "booking {} belongs to another customer",
            booking_id
        )));
    }
    Ok(Json(record))
}

/// POST /v1/bookings/{booking_id}/payment
/// Payment gateway callback carrying the charge outcome.
pub async fn record_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(signal): Json<PaymentSignal>,
) -> Result<Json<PaymentResponse>, AppError> {
    tracing::info!(
        "Received payment {} for booking {} (success: {})",
        signal.payment_reference_id,
        booking_id,
        signal.success
    );
    let record = state.bookings.confirm(booking_id, &signal).await?;

    Ok(Json(PaymentResponse {
        booking_id: record.booking.id,
        pnr: record.booking.pnr,
        status: record.booking.status,
    }))
}
