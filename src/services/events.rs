//! Eventos de reserva
//!
//! El motor emite eventos post-commit en el target `booking_events` para
//! que el colaborador de notificaciones los consuma. La entrega real de
//! notificaciones queda fuera del motor.

use uuid::Uuid;

use crate::models::payment::PaymentStatus;
use crate::models::reservation::BookingStatus;

/// Evento observable del ciclo de vida de una reserva
#[derive(Debug, Clone)]
pub enum BookingEvent {
    ReservationCreated {
        reservation_id: Uuid,
        vehicle_id: Uuid,
        renter_id: Uuid,
        status: BookingStatus,
    },
    StatusChanged {
        reservation_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        actor_role: &'static str,
    },
    PaymentStatusChanged {
        reservation_id: Uuid,
        status: PaymentStatus,
    },
}

/// Emitir el evento una vez que la transacción quedó confirmada.
///
/// Nunca se llama con la transacción abierta: el emisor no puede bloquear
/// ni abortar la persistencia.
pub fn emit(event: &BookingEvent) {
    match event {
        BookingEvent::ReservationCreated {
            reservation_id,
            vehicle_id,
            renter_id,
            status,
        } => {
            tracing::info!(
                target: "booking_events",
                event = "reservation_created",
                %reservation_id,
                %vehicle_id,
                %renter_id,
                status = %status,
            );
        }
        BookingEvent::StatusChanged {
            reservation_id,
            from,
            to,
            actor_role,
        } => {
            tracing::info!(
                target: "booking_events",
                event = "status_changed",
                %reservation_id,
                from = %from,
                to = %to,
                actor_role,
            );
        }
        BookingEvent::PaymentStatusChanged {
            reservation_id,
            status,
        } => {
            tracing::info!(
                target: "booking_events",
                event = "payment_status_changed",
                %reservation_id,
                status = ?status,
            );
        }
    }
}
