//! DTOs de reservas
//!
//! Requests y responses de la API de reservas. Las fechas viajan en
//! RFC 3339 y se deserializan directo a `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::payment::{PaymentChannel, PaymentMethod, PaymentRecord, PaymentStatus};
use crate::models::reservation::{BookingStatus, Reservation, ReservationNote};

/// Request para crear una reserva
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    pub vehicle_id: Uuid,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[validate(
        length(min = 2, max = 200),
        custom = "crate::utils::validation::validate_not_empty"
    )]
    pub pickup_location: String,

    #[validate(
        length(min = 2, max = 200),
        custom = "crate::utils::validation::validate_not_empty"
    )]
    pub return_location: String,

    pub payment_method: PaymentMethod,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Request para cambiar el estado de una reserva
#[derive(Debug, Deserialize, Validate)]
pub struct ChangeStatusRequest {
    pub target_status: BookingStatus,

    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Resultado que reporta la confirmación de pago
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

/// Request con el efecto de la confirmación de pago externa
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentResultRequest {
    pub outcome: PaymentOutcome,

    #[validate(length(max = 200))]
    pub external_ref: Option<String>,
}

/// Query de pre-chequeo de disponibilidad
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub vehicle_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Response del sub-registro de pago
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub channel: PaymentChannel,
    pub status: PaymentStatus,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(payment: PaymentRecord) -> Self {
        Self {
            id: payment.id,
            amount: payment.amount,
            method: payment.method,
            channel: payment.channel,
            status: payment.status,
            external_ref: payment.external_ref,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Entrada de la bitácora en la response de detalle
#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub actor_role: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReservationNote> for NoteResponse {
    fn from(note: ReservationNote) -> Self {
        Self {
            actor_role: note.actor_role,
            note: note.note,
            created_at: note.created_at,
        }
    }
}

/// Response de reserva con el pago anidado
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub renter_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_location: String,
    pub return_location: String,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payment: PaymentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<NoteResponse>>,
}

impl ReservationResponse {
    pub fn new(reservation: Reservation, payment: PaymentRecord) -> Self {
        Self {
            id: reservation.id,
            vehicle_id: reservation.vehicle_id,
            renter_id: reservation.renter_id,
            start_date: reservation.start_at,
            end_date: reservation.end_at,
            pickup_location: reservation.pickup_location,
            return_location: reservation.return_location,
            total_price: reservation.total_price,
            status: reservation.status,
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
            payment: PaymentResponse::from(payment),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: Vec<ReservationNote>) -> Self {
        self.notes = Some(notes.into_iter().map(NoteResponse::from).collect());
        self
    }
}

/// Listado resumido de reservas propias
#[derive(Debug, Serialize)]
pub struct ReservationListItem {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationListItem {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            vehicle_id: reservation.vehicle_id,
            start_date: reservation.start_at,
            end_date: reservation.end_at,
            total_price: reservation.total_price,
            status: reservation.status,
            created_at: reservation.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_deserializes_rfc3339() {
        let body = serde_json::json!({
            "vehicle_id": "6f2c0a4e-9d31-4b5f-8a77-2c4e1b9d0f3a",
            "start_date": "2025-03-10T09:00:00Z",
            "end_date": "2025-03-12T17:00:00Z",
            "pickup_location": "Aeropuerto CDG",
            "return_location": "Gare de Lyon",
            "payment_method": "cash",
            "notes": "llamar al llegar"
        });
        let req: CreateReservationRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Cash);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_short_locations() {
        let body = serde_json::json!({
            "vehicle_id": "6f2c0a4e-9d31-4b5f-8a77-2c4e1b9d0f3a",
            "start_date": "2025-03-10T09:00:00Z",
            "end_date": "2025-03-12T17:00:00Z",
            "pickup_location": "x",
            "return_location": "Gare de Lyon",
            "payment_method": "card"
        });
        let req: CreateReservationRequest = serde_json::from_value(body).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_blank_locations() {
        // "   " pasa el largo mínimo pero no la validación custom
        let body = serde_json::json!({
            "vehicle_id": "6f2c0a4e-9d31-4b5f-8a77-2c4e1b9d0f3a",
            "start_date": "2025-03-10T09:00:00Z",
            "end_date": "2025-03-12T17:00:00Z",
            "pickup_location": "   ",
            "return_location": "Gare de Lyon",
            "payment_method": "card"
        });
        let req: CreateReservationRequest = serde_json::from_value(body).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_change_status_request_tokens() {
        let req: ChangeStatusRequest =
            serde_json::from_value(serde_json::json!({ "target_status": "cancelled" })).unwrap();
        assert_eq!(req.target_status, BookingStatus::Cancelled);

        let bad = serde_json::from_value::<ChangeStatusRequest>(
            serde_json::json!({ "target_status": "teleported" }),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_payment_outcome_tokens() {
        let req: PaymentResultRequest =
            serde_json::from_value(serde_json::json!({ "outcome": "paid", "external_ref": "tx-99" }))
                .unwrap();
        assert_eq!(req.outcome, PaymentOutcome::Paid);
    }
}
