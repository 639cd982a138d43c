//! Orquestador de reservas
//!
//! Punto de entrada transaccional del motor: valida la entrada, consulta
//! disponibilidad y precio, y persiste reserva + pago como una sola unidad.
//! También es la entrada de los cambios de estado posteriores, que
//! re-validan la autorización del actor e invocan la máquina de estados.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::dto::reservation_dto::{
    AvailabilityQuery, ChangeStatusRequest, CreateReservationRequest, PaymentOutcome,
    PaymentResultRequest, ReservationListItem, ReservationResponse,
};
use crate::models::actor::{ActorContext, TransitionActor};
use crate::models::payment::{PaymentChannel, PaymentRecord, PaymentStatus};
use crate::models::reservation::{BookingStatus, Reservation};
use crate::repositories::reservation_repository;
use crate::repositories::vehicle_repository::VehicleRepository;
use crate::services::availability_service;
use crate::services::events::{self, BookingEvent};
use crate::services::payment_coordinator;
use crate::services::pricing_service;
use crate::services::transition::{self, BookingCommand, TransitionContext};
use crate::utils::errors::{is_transient, map_persistence_error, AppError, AppResult};

pub struct ReservationController {
    pool: PgPool,
    cancellation_window: Duration,
}

impl ReservationController {
    pub fn new(pool: PgPool, cancellation_window: Duration) -> Self {
        Self {
            pool,
            cancellation_window,
        }
    }

    /// Crear una reserva: valida intervalo y vehículo, calcula el precio y
    /// persiste reserva + pago atómicamente. La sección crítica (check de
    /// solape hasta el insert) corre bajo el advisory lock del vehículo.
    pub async fn create(
        &self,
        actor: ActorContext,
        request: CreateReservationRequest,
    ) -> AppResult<ReservationResponse> {
        request.validate().map_err(AppError::Validation)?;

        let now = Utc::now();
        validate_interval(request.start_date, request.end_date, now)?;

        let vehicle = VehicleRepository::new(self.pool.clone())
            .find_by_id(request.vehicle_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

        if !vehicle.is_bookable() {
            return Err(AppError::BadRequest(
                "The vehicle is not available for booking".to_string(),
            ));
        }
        if !vehicle.window_contains(request.start_date, request.end_date) {
            return Err(AppError::BadRequest(
                "The requested interval is outside the vehicle availability window".to_string(),
            ));
        }

        let total_price =
            pricing_service::compute_price(vehicle.daily_rate, request.start_date, request.end_date)?;

        let channel = request.payment_method.channel();
        let initial_status = initial_status_for(channel);

        let mut attempted = false;
        let (reservation, payment) = loop {
            match self
                .persist_creation(&actor, &request, total_price, initial_status, channel)
                .await
            {
                Ok(created) => break created,
                Err(e) if is_transient(&e) && !attempted => {
                    attempted = true;
                    tracing::warn!("Transient persistence error creating reservation, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
        };

        events::emit(&BookingEvent::ReservationCreated {
            reservation_id: reservation.id,
            vehicle_id: reservation.vehicle_id,
            renter_id: reservation.renter_id,
            status: reservation.status,
        });

        Ok(ReservationResponse::new(reservation, payment))
    }

    async fn persist_creation(
        &self,
        actor: &ActorContext,
        request: &CreateReservationRequest,
        total_price: rust_decimal::Decimal,
        initial_status: BookingStatus,
        channel: PaymentChannel,
    ) -> AppResult<(Reservation, PaymentRecord)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Serializa las creaciones concurrentes sobre el mismo vehículo;
        // la restricción de exclusión en la tabla respalda el invariante
        reservation_repository::lock_vehicle(&mut tx, request.vehicle_id).await?;

        let available = availability_service::is_available(
            &mut tx,
            request.vehicle_id,
            request.start_date,
            request.end_date,
            None,
        )
        .await?;

        if !available {
            return Err(AppError::Conflict(
                "The vehicle is already reserved for an overlapping interval".to_string(),
            ));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            vehicle_id: request.vehicle_id,
            renter_id: actor.id,
            start_at: request.start_date,
            end_at: request.end_date,
            pickup_location: request.pickup_location.clone(),
            return_location: request.return_location.clone(),
            total_price,
            status: initial_status,
            created_at: now,
            updated_at: now,
        };

        let payment = PaymentRecord {
            id: Uuid::new_v4(),
            reservation_id: reservation.id,
            amount: total_price,
            method: request.payment_method,
            channel,
            status: PaymentStatus::Pending,
            external_ref: None,
            created_at: now,
            updated_at: now,
        };

        reservation_repository::insert_reservation(&mut tx, &reservation).await?;
        reservation_repository::insert_payment(&mut tx, &payment).await?;

        if let Some(notes) = request.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            reservation_repository::insert_note(
                &mut tx,
                reservation.id,
                Some(actor.id),
                actor.role.as_str(),
                notes.trim(),
                now,
            )
            .await?;
        }

        tx.commit().await.map_err(map_persistence_error)?;

        Ok((reservation, payment))
    }

    /// Cambiar el estado de una reserva a pedido de un usuario autenticado
    pub async fn change_status(
        &self,
        actor: ActorContext,
        reservation_id: Uuid,
        request: ChangeStatusRequest,
    ) -> AppResult<ReservationResponse> {
        request.validate().map_err(AppError::Validation)?;

        self.apply_transition(reservation_id, TransitionActor::User(actor), move |current| {
            command_for(&actor, current, request.target_status, request.reason.clone())
        })
        .await
    }

    /// Aplicar el efecto de la confirmación de pago externa. El webhook en
    /// sí vive fuera del motor; aquí solo entra su resultado autoritativo.
    pub async fn record_payment_result(
        &self,
        reservation_id: Uuid,
        request: PaymentResultRequest,
    ) -> AppResult<ReservationResponse> {
        request.validate().map_err(AppError::Validation)?;

        let external_ref = request.external_ref.clone();
        self.apply_transition(reservation_id, TransitionActor::PaymentEvent, move |_| {
            Ok(match request.outcome {
                PaymentOutcome::Paid => BookingCommand::PaymentConfirmed {
                    external_ref: external_ref.clone(),
                },
                PaymentOutcome::Failed => BookingCommand::PaymentFailed {
                    external_ref: external_ref.clone(),
                },
            })
        })
        .await
    }

    /// Núcleo transaccional de los cambios de estado: cargar con lock de
    /// fila, validar contra la máquina de estados, aplicar el efecto de
    /// pago y persistir todo junto con la nota de auditoría.
    async fn apply_transition<F>(
        &self,
        reservation_id: Uuid,
        actor: TransitionActor,
        build_command: F,
    ) -> AppResult<ReservationResponse>
    where
        F: Fn(BookingStatus) -> AppResult<BookingCommand>,
    {
        let mut attempted = false;
        let (reservation, payment, plan_to, payment_effect) = loop {
            match self
                .try_transition(reservation_id, &actor, &build_command)
                .await
            {
                Ok(done) => break done,
                Err(e) if is_transient(&e) && !attempted => {
                    attempted = true;
                    tracing::warn!("Transient persistence error changing status, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
        };

        events::emit(&BookingEvent::StatusChanged {
            reservation_id,
            from: reservation.status,
            to: plan_to,
            actor_role: actor.role_label(),
        });
        if let Some(status) = payment_effect {
            events::emit(&BookingEvent::PaymentStatusChanged {
                reservation_id,
                status,
            });
        }

        let mut reservation = reservation;
        let mut payment = payment;
        reservation.status = plan_to;
        if let Some(status) = payment_effect {
            payment.status = status;
        }

        Ok(ReservationResponse::new(reservation, payment))
    }

    async fn try_transition<F>(
        &self,
        reservation_id: Uuid,
        actor: &TransitionActor,
        build_command: &F,
    ) -> AppResult<(Reservation, PaymentRecord, BookingStatus, Option<PaymentStatus>)>
    where
        F: Fn(BookingStatus) -> AppResult<BookingCommand>,
    {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = reservation_repository::find_for_update(&mut tx, reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;

        let vehicle_owner_id = row.vehicle_owner_id;
        let reservation: Reservation = row.into();

        let payment = reservation_repository::find_payment_for_update(&mut tx, reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Reservation {} has no payment record",
                    reservation_id
                ))
            })?;

        let command = build_command(reservation.status)?;

        let ctx = TransitionContext {
            current: reservation.status,
            renter_id: reservation.renter_id,
            vehicle_owner_id,
            start_at: reservation.start_at,
            end_at: reservation.end_at,
            now,
            cancellation_window: self.cancellation_window,
        };

        let plan = transition::authorize(actor, &ctx, &command)?;
        let effect = payment_coordinator::payment_effect(plan.from, plan.to, payment.status);

        let external_ref = match &command {
            BookingCommand::PaymentConfirmed { external_ref }
            | BookingCommand::PaymentFailed { external_ref } => external_ref.as_deref(),
            _ => None,
        };

        reservation_repository::update_status(&mut tx, reservation_id, plan.to, now).await?;
        if let Some(status) = effect {
            reservation_repository::update_payment_status(
                &mut tx,
                reservation_id,
                status,
                external_ref,
                now,
            )
            .await?;
        }
        reservation_repository::insert_note(
            &mut tx,
            reservation_id,
            actor.actor_id(),
            actor.role_label(),
            &plan.note,
            now,
        )
        .await?;

        if matches!(command, BookingCommand::Override { .. }) {
            tracing::warn!(
                %reservation_id,
                from = %plan.from,
                to = %plan.to,
                "Admin override applied to reservation status"
            );
        }

        tx.commit().await.map_err(map_persistence_error)?;

        Ok((reservation, payment, plan.to, effect))
    }

    /// Marcar como pagado un cobro contra-entrega, sin tocar el estado de
    /// la reserva. Solo el dueño del vehículo o un admin.
    pub async fn mark_paid(
        &self,
        actor: ActorContext,
        reservation_id: Uuid,
    ) -> AppResult<ReservationResponse> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = reservation_repository::find_for_update(&mut tx, reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;

        if !actor.is_admin() && actor.id != row.vehicle_owner_id {
            return Err(AppError::Forbidden(
                "Only the vehicle owner or an administrator can mark a payment as received"
                    .to_string(),
            ));
        }

        let reservation: Reservation = row.into();
        let payment = reservation_repository::find_payment_for_update(&mut tx, reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Reservation {} has no payment record",
                    reservation_id
                ))
            })?;

        if !payment_coordinator::can_mark_paid(reservation.status, payment.status) {
            return Err(AppError::InvalidTransition(
                "The payment cannot be marked as received in the current state".to_string(),
            ));
        }

        reservation_repository::update_payment_status(
            &mut tx,
            reservation_id,
            PaymentStatus::Paid,
            None,
            now,
        )
        .await?;
        reservation_repository::insert_note(
            &mut tx,
            reservation_id,
            Some(actor.id),
            actor.role.as_str(),
            "payment collected on delivery, marked as paid",
            now,
        )
        .await?;

        tx.commit().await.map_err(map_persistence_error)?;

        events::emit(&BookingEvent::PaymentStatusChanged {
            reservation_id,
            status: PaymentStatus::Paid,
        });

        let mut payment = payment;
        payment.status = PaymentStatus::Paid;
        Ok(ReservationResponse::new(reservation, payment))
    }

    /// Pre-chequeo de disponibilidad para la UI: idempotente, sin efectos
    pub async fn check_availability(&self, query: AvailabilityQuery) -> AppResult<bool> {
        if query.start >= query.end {
            return Err(AppError::BadRequest(
                "The interval start must be before its end".to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        availability_service::is_available(&mut conn, query.vehicle_id, query.start, query.end, None)
            .await
    }

    /// Detalle de una reserva con su bitácora, para el renter que la creó,
    /// el dueño del vehículo o un admin
    pub async fn get(
        &self,
        actor: ActorContext,
        reservation_id: Uuid,
    ) -> AppResult<ReservationResponse> {
        let reservation = reservation_repository::find_by_id(&self.pool, reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;

        if !actor.is_admin() && actor.id != reservation.renter_id {
            let owner = reservation_repository::vehicle_owner_of(&self.pool, reservation_id).await?;
            if owner != Some(actor.id) {
                return Err(AppError::Forbidden(
                    "You are not allowed to view this reservation".to_string(),
                ));
            }
        }

        let payment = reservation_repository::find_payment(&self.pool, reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Reservation {} has no payment record",
                    reservation_id
                ))
            })?;
        let notes = reservation_repository::list_notes(&self.pool, reservation_id).await?;

        Ok(ReservationResponse::new(reservation, payment).with_notes(notes))
    }

    /// Reservas propias del actor, más reciente primero
    pub async fn list_mine(&self, actor: ActorContext) -> AppResult<Vec<ReservationListItem>> {
        let reservations =
            reservation_repository::list_by_renter(&self.pool, actor.id).await?;
        Ok(reservations.into_iter().map(ReservationListItem::from).collect())
    }
}

/// Estado inicial según el canal de cobro: online espera a la pasarela,
/// efectivo espera el handshake de entrega
fn initial_status_for(channel: PaymentChannel) -> BookingStatus {
    match channel {
        PaymentChannel::Online => BookingStatus::AwaitingPayment,
        PaymentChannel::OnDelivery => BookingStatus::OnDeliveryPending,
    }
}

/// Validar la forma del intervalo pedido
fn validate_interval(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if start >= end {
        return Err(AppError::BadRequest(
            "The interval start must be before its end".to_string(),
        ));
    }
    if start < now {
        return Err(AppError::BadRequest(
            "The interval cannot start in the past".to_string(),
        ));
    }
    Ok(())
}

/// Traducir el estado destino pedido por la API al comando explícito.
///
/// Los pares que existen en la tabla normal usan su comando (con sus
/// reglas temporales, también para admins); un par fuera de tabla solo
/// prospera como override administrativo.
fn command_for(
    actor: &ActorContext,
    current: BookingStatus,
    target: BookingStatus,
    reason: Option<String>,
) -> AppResult<BookingCommand> {
    let command = match target {
        BookingStatus::Cancelled if current.holds_vehicle() => BookingCommand::Cancel { reason },
        BookingStatus::Confirmed if current == BookingStatus::OnDeliveryPending => {
            BookingCommand::Confirm
        }
        BookingStatus::Completed if current == BookingStatus::Confirmed => {
            BookingCommand::MarkCompleted
        }
        BookingStatus::NoShow if current == BookingStatus::Confirmed => BookingCommand::MarkNoShow,
        _ if actor.is_admin() => BookingCommand::Override {
            target,
            reason: reason.unwrap_or_else(|| "manual status override".to_string()),
        },
        _ => {
            return Err(AppError::InvalidTransition(format!(
                "Cannot move a reservation from '{}' to '{}'",
                current, target
            )))
        }
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::ActorRole;

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_interval() {
        let now = dt("2025-03-01T00:00:00Z");
        assert!(validate_interval(dt("2025-03-10T09:00:00Z"), dt("2025-03-12T09:00:00Z"), now).is_ok());
        // inicio == fin
        assert!(validate_interval(dt("2025-03-10T09:00:00Z"), dt("2025-03-10T09:00:00Z"), now).is_err());
        // invertido
        assert!(validate_interval(dt("2025-03-12T09:00:00Z"), dt("2025-03-10T09:00:00Z"), now).is_err());
        // en el pasado
        assert!(validate_interval(dt("2025-02-01T00:00:00Z"), dt("2025-02-02T00:00:00Z"), now).is_err());
        // empieza exactamente ahora
        assert!(validate_interval(now, dt("2025-03-02T00:00:00Z"), now).is_ok());
    }

    #[test]
    fn test_initial_status_follows_payment_channel() {
        use crate::models::payment::PaymentMethod;

        // Efectivo se liquida contra entrega; el resto espera a la pasarela
        assert_eq!(
            initial_status_for(PaymentMethod::Cash.channel()),
            BookingStatus::OnDeliveryPending
        );
        for method in [PaymentMethod::Card, PaymentMethod::MobileMoney, PaymentMethod::Wallet] {
            assert_eq!(
                initial_status_for(method.channel()),
                BookingStatus::AwaitingPayment
            );
        }
    }

    #[test]
    fn test_command_for_maps_table_pairs() {
        let renter = ActorContext::new(Uuid::new_v4(), ActorRole::Renter);

        let cmd = command_for(&renter, BookingStatus::Confirmed, BookingStatus::Cancelled, None).unwrap();
        assert!(matches!(cmd, BookingCommand::Cancel { .. }));

        let cmd = command_for(&renter, BookingStatus::OnDeliveryPending, BookingStatus::Confirmed, None).unwrap();
        assert!(matches!(cmd, BookingCommand::Confirm));

        let cmd = command_for(&renter, BookingStatus::Confirmed, BookingStatus::Completed, None).unwrap();
        assert!(matches!(cmd, BookingCommand::MarkCompleted));

        let cmd = command_for(&renter, BookingStatus::Confirmed, BookingStatus::NoShow, None).unwrap();
        assert!(matches!(cmd, BookingCommand::MarkNoShow));
    }

    #[test]
    fn test_command_for_out_of_table_pairs() {
        let renter = ActorContext::new(Uuid::new_v4(), ActorRole::Renter);
        let admin = ActorContext::new(Uuid::new_v4(), ActorRole::Admin);

        // Un usuario normal no puede pedir un par fuera de tabla
        let err =
            command_for(&renter, BookingStatus::Cancelled, BookingStatus::Confirmed, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        // El mismo par, pedido por un admin, se vuelve override auditado
        let cmd =
            command_for(&admin, BookingStatus::Cancelled, BookingStatus::Confirmed, None).unwrap();
        assert!(matches!(cmd, BookingCommand::Override { .. }));

        // Nadie fabrica el resultado del pago vía change_status: el destino
        // awaiting_payment -> confirmed no está en la tabla de usuarios
        let err = command_for(&renter, BookingStatus::AwaitingPayment, BookingStatus::Confirmed, None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }
}
