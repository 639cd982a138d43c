//! Servicio de cálculo de precio
//!
//! Convierte un intervalo validado y la tarifa diaria del vehículo en el
//! precio total de la reserva. Sin prorrateo por horas: cualquier fracción
//! de día se cobra como día completo y todo alquiler positivo factura al
//! menos un día.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::utils::errors::{AppError, AppResult};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Días facturables del intervalo: ceil(duración / 24h), mínimo 1.
///
/// Devuelve error para duraciones no positivas; el orquestador ya las
/// rechaza antes, esto solo cierra la puerta.
pub fn rental_days(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<i64> {
    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return Err(AppError::BadRequest(
            "The rental interval must have a positive duration".to_string(),
        ));
    }

    let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    Ok(days.max(1))
}

/// Precio total = días facturables * tarifa diaria
pub fn compute_price(
    daily_rate: Decimal,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AppResult<Decimal> {
    let days = rental_days(start, end)?;
    let amount = Decimal::from(days) * daily_rate;

    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "The computed rental price must be positive".to_string(),
        ));
    }

    Ok(amount)
}
