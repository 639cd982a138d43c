//! Modelo de Vehicle
//!
//! El catálogo de vehículos pertenece a otro servicio; el motor de reservas
//! solo lee las columnas que necesita para validar y autorizar una reserva.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Vista de solo lectura de la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub daily_rate: Decimal,
    pub is_active: bool,
    pub is_verified: bool,
    pub available_from: Option<DateTime<Utc>>,
    pub available_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// Un vehículo solo admite reservas si está activo y verificado
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.is_verified
    }

    /// Verificar que el intervalo pedido cae dentro de la ventana de
    /// disponibilidad del vehículo, cuando el dueño definió una.
    pub fn window_contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if let Some(from) = self.available_from {
            if start < from {
                return false;
            }
        }
        if let Some(to) = self.available_to {
            if end > to {
                return false;
            }
        }
        true
    }
}
