//! Modelo de Reservation
//!
//! Este módulo contiene el aggregate root del motor de reservas y el enum
//! de estados del ciclo de vida. Mapea exactamente al schema PostgreSQL.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado de la reserva - mapea al ENUM booking_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    AwaitingPayment,
    OnDeliveryPending,
    Confirmed,
    Completed,
    Cancelled,
    PaymentFailed,
    NoShow,
}

impl BookingStatus {
    /// Estados que retienen el vehículo: una reserva en cualquiera de ellos
    /// bloquea el intervalo frente a nuevas reservas solapadas.
    pub fn holds_vehicle(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending
                | BookingStatus::AwaitingPayment
                | BookingStatus::OnDeliveryPending
                | BookingStatus::Confirmed
        )
    }

    /// Estados terminales: sin transiciones salientes salvo override de admin.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::PaymentFailed
                | BookingStatus::NoShow
        )
    }

    /// Token estable del estado, el mismo que viaja por la API y la DB.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::AwaitingPayment => "awaiting_payment",
            BookingStatus::OnDeliveryPending => "on_delivery_pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::PaymentFailed => "payment_failed",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn all() -> [BookingStatus; 8] {
        [
            BookingStatus::Pending,
            BookingStatus::AwaitingPayment,
            BookingStatus::OnDeliveryPending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::PaymentFailed,
            BookingStatus::NoShow,
        ]
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation principal - mapea exactamente a la tabla reservations
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub renter_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub pickup_location: String,
    pub return_location: String,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entrada de la bitácora de auditoría - tabla reservation_notes, append-only
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReservationNote {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_role: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holding_subset() {
        assert!(BookingStatus::Pending.holds_vehicle());
        assert!(BookingStatus::AwaitingPayment.holds_vehicle());
        assert!(BookingStatus::OnDeliveryPending.holds_vehicle());
        assert!(BookingStatus::Confirmed.holds_vehicle());

        assert!(!BookingStatus::Completed.holds_vehicle());
        assert!(!BookingStatus::Cancelled.holds_vehicle());
        assert!(!BookingStatus::PaymentFailed.holds_vehicle());
        assert!(!BookingStatus::NoShow.holds_vehicle());
    }

    #[test]
    fn test_terminal_states() {
        for status in BookingStatus::all() {
            // Un estado retiene el vehículo o es terminal, nunca ambas cosas
            assert_ne!(status.holds_vehicle(), status.is_terminal());
        }
    }

    #[test]
    fn test_status_tokens_roundtrip() {
        for status in BookingStatus::all() {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: BookingStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }
}
