//! Modelo de PaymentRecord
//!
//! Sub-registro de pago 1:1 con la reserva. El motor solo registra el
//! *estado* del pago; el procesamiento real vive en la pasarela externa.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Método de pago elegido por el renter - ENUM payment_method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    Wallet,
}

impl PaymentMethod {
    /// Canal de cobro que implica el método: efectivo se liquida contra
    /// entrega, el resto pasa por la pasarela online.
    pub fn channel(&self) -> PaymentChannel {
        match self {
            PaymentMethod::Cash => PaymentChannel::OnDelivery,
            PaymentMethod::Card | PaymentMethod::MobileMoney | PaymentMethod::Wallet => {
                PaymentChannel::Online
            }
        }
    }
}

/// Canal de cobro - ENUM payment_channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_channel", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Online,
    OnDelivery,
}

/// Estado del pago - ENUM payment_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// PaymentRecord - mapea exactamente a la tabla payments
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub channel: PaymentChannel,
    pub status: PaymentStatus,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_to_channel() {
        assert_eq!(PaymentMethod::Cash.channel(), PaymentChannel::OnDelivery);
        assert_eq!(PaymentMethod::Card.channel(), PaymentChannel::Online);
        assert_eq!(PaymentMethod::MobileMoney.channel(), PaymentChannel::Online);
        assert_eq!(PaymentMethod::Wallet.channel(), PaymentChannel::Online);
    }
}
