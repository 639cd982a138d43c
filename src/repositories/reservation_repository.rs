//! Repositorio de reservas
//!
//! Todo el SQL de reservations/payments/reservation_notes vive aquí. Las
//! operaciones de la sección crítica reciben la conexión de la transacción
//! abierta por el orquestador; las lecturas sueltas usan el pool.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::payment::{PaymentRecord, PaymentStatus};
use crate::models::reservation::{BookingStatus, Reservation, ReservationNote};
use crate::utils::errors::{map_persistence_error, AppResult};

/// Reserva cargada junto con el dueño del vehículo, para autorizar
/// transiciones sin una segunda consulta.
#[derive(Debug, sqlx::FromRow)]
pub struct ReservationWithOwner {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub renter_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub pickup_location: String,
    pub return_location: String,
    pub total_price: rust_decimal::Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub vehicle_owner_id: Uuid,
}

impl From<ReservationWithOwner> for Reservation {
    fn from(row: ReservationWithOwner) -> Self {
        Reservation {
            id: row.id,
            vehicle_id: row.vehicle_id,
            renter_id: row.renter_id,
            start_at: row.start_at,
            end_at: row.end_at,
            pickup_location: row.pickup_location,
            return_location: row.return_location,
            total_price: row.total_price,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Clave del advisory lock por vehículo: los primeros 8 bytes del UUID.
///
/// Estable entre procesos, así dos instancias del servicio serializan las
/// creaciones sobre el mismo vehículo.
pub fn vehicle_lock_key(vehicle_id: Uuid) -> i64 {
    let bytes = vehicle_id.as_bytes();
    i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Tomar el lock transaccional por vehículo. Se libera solo al terminar la
/// transacción, cubriendo el check de solape y el insert como una unidad.
pub async fn lock_vehicle(conn: &mut PgConnection, vehicle_id: Uuid) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(vehicle_lock_key(vehicle_id))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Contar reservas del vehículo que retienen el recurso y solapan
/// [start, end). Mismo predicado semiabierto que el servicio de
/// disponibilidad: existente.start < propuesto.end && propuesto.start <
/// existente.end.
pub async fn count_overlapping(
    conn: &mut PgConnection,
    vehicle_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_reservation_id: Option<Uuid>,
) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM reservations
        WHERE vehicle_id = $1
        AND status IN ('pending', 'awaiting_payment', 'on_delivery_pending', 'confirmed')
        AND start_at < $3
        AND $2 < end_at
        AND ($4::uuid IS NULL OR id <> $4)
        "#,
    )
    .bind(vehicle_id)
    .bind(start)
    .bind(end)
    .bind(exclude_reservation_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

pub async fn insert_reservation(
    conn: &mut PgConnection,
    reservation: &Reservation,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations (
            id, vehicle_id, renter_id, start_at, end_at,
            pickup_location, return_location, total_price, status,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(reservation.id)
    .bind(reservation.vehicle_id)
    .bind(reservation.renter_id)
    .bind(reservation.start_at)
    .bind(reservation.end_at)
    .bind(&reservation.pickup_location)
    .bind(&reservation.return_location)
    .bind(reservation.total_price)
    .bind(reservation.status)
    .bind(reservation.created_at)
    .bind(reservation.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_persistence_error)?;

    Ok(())
}

pub async fn insert_payment(conn: &mut PgConnection, payment: &PaymentRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, reservation_id, amount, method, channel, status,
            external_ref, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(payment.id)
    .bind(payment.reservation_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(payment.channel)
    .bind(payment.status)
    .bind(&payment.external_ref)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_persistence_error)?;

    Ok(())
}

/// Agregar una entrada a la bitácora. Solo INSERT: las notas nunca se
/// actualizan ni se borran.
pub async fn insert_note(
    conn: &mut PgConnection,
    reservation_id: Uuid,
    actor_id: Option<Uuid>,
    actor_role: &str,
    note: &str,
    at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reservation_notes (id, reservation_id, actor_id, actor_role, note, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(reservation_id)
    .bind(actor_id)
    .bind(actor_role)
    .bind(note)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(map_persistence_error)?;

    Ok(())
}

/// Cargar la reserva con lock de fila, junto con el dueño del vehículo.
///
/// `FOR UPDATE OF r` serializa los cambios de estado concurrentes sobre la
/// misma reserva sin bloquear la fila del vehículo.
pub async fn find_for_update(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> AppResult<Option<ReservationWithOwner>> {
    let row = sqlx::query_as::<_, ReservationWithOwner>(
        r#"
        SELECT
            r.id, r.vehicle_id, r.renter_id, r.start_at, r.end_at,
            r.pickup_location, r.return_location, r.total_price, r.status,
            r.created_at, r.updated_at,
            v.owner_id AS vehicle_owner_id
        FROM reservations r
        JOIN vehicles v ON v.id = r.vehicle_id
        WHERE r.id = $1
        FOR UPDATE OF r
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn find_by_id(pool: &PgPool, reservation_id: Uuid) -> AppResult<Option<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE id = $1",
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?;

    Ok(reservation)
}

/// Dueño del vehículo de una reserva, para autorizar lecturas
pub async fn vehicle_owner_of(pool: &PgPool, reservation_id: Uuid) -> AppResult<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT v.owner_id FROM reservations r
        JOIN vehicles v ON v.id = r.vehicle_id
        WHERE r.id = $1
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(owner_id,)| owner_id))
}

pub async fn find_payment(pool: &PgPool, reservation_id: Uuid) -> AppResult<Option<PaymentRecord>> {
    let payment = sqlx::query_as::<_, PaymentRecord>(
        "SELECT * FROM payments WHERE reservation_id = $1",
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?;

    Ok(payment)
}

pub async fn find_payment_for_update(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> AppResult<Option<PaymentRecord>> {
    let payment = sqlx::query_as::<_, PaymentRecord>(
        "SELECT * FROM payments WHERE reservation_id = $1 FOR UPDATE",
    )
    .bind(reservation_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(payment)
}

pub async fn update_status(
    conn: &mut PgConnection,
    reservation_id: Uuid,
    status: BookingStatus,
    at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("UPDATE reservations SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(reservation_id)
        .bind(status)
        .bind(at)
        .execute(&mut *conn)
        .await
        .map_err(map_persistence_error)?;

    Ok(())
}

pub async fn update_payment_status(
    conn: &mut PgConnection,
    reservation_id: Uuid,
    status: PaymentStatus,
    external_ref: Option<&str>,
    at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE payments
        SET status = $2, external_ref = COALESCE($3, external_ref), updated_at = $4
        WHERE reservation_id = $1
        "#,
    )
    .bind(reservation_id)
    .bind(status)
    .bind(external_ref)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(map_persistence_error)?;

    Ok(())
}

pub async fn list_by_renter(pool: &PgPool, renter_id: Uuid) -> AppResult<Vec<Reservation>> {
    let reservations = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE renter_id = $1 ORDER BY created_at DESC",
    )
    .bind(renter_id)
    .fetch_all(pool)
    .await?;

    Ok(reservations)
}

pub async fn list_notes(pool: &PgPool, reservation_id: Uuid) -> AppResult<Vec<ReservationNote>> {
    let notes = sqlx::query_as::<_, ReservationNote>(
        "SELECT * FROM reservation_notes WHERE reservation_id = $1 ORDER BY created_at",
    )
    .bind(reservation_id)
    .fetch_all(pool)
    .await?;

    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_lock_key_is_stable() {
        let id = Uuid::parse_str("6f2c0a4e-9d31-4b5f-8a77-2c4e1b9d0f3a").unwrap();
        let a = vehicle_lock_key(id);
        let b = vehicle_lock_key(id);
        assert_eq!(a, b);

        let other = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        assert_ne!(vehicle_lock_key(id), vehicle_lock_key(other));
    }
}
