//! Máquina de estados de la reserva
//!
//! Toda la lógica de transiciones vive en este módulo: qué pares
//! (origen, destino) son legales, qué actor puede disparar cada uno y las
//! reglas temporales (ventana de cancelación, cierre del intervalo). Los
//! handlers nunca mutan el estado por su cuenta.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::actor::TransitionActor;
use crate::models::reservation::BookingStatus;
use crate::utils::errors::{AppError, AppResult};

/// Comando explícito de transición. Cada operación valida lo suyo; no hay
/// "parches de campos" genéricos.
#[derive(Debug, Clone)]
pub enum BookingCommand {
    /// Handshake de entrega: el dueño confirma una reserva contra-entrega
    Confirm,
    Cancel {
        reason: Option<String>,
    },
    MarkCompleted,
    MarkNoShow,
    /// Evento autoritativo de la pasarela: el pago online se acreditó
    PaymentConfirmed {
        external_ref: Option<String>,
    },
    /// Evento autoritativo de la pasarela: el pago online falló
    PaymentFailed {
        external_ref: Option<String>,
    },
    /// Override administrativo: cualquier destino, siempre auditado
    Override {
        target: BookingStatus,
        reason: String,
    },
}

impl BookingCommand {
    /// Estado destino que produce el comando
    pub fn target(&self) -> BookingStatus {
        match self {
            BookingCommand::Confirm => BookingStatus::Confirmed,
            BookingCommand::Cancel { .. } => BookingStatus::Cancelled,
            BookingCommand::MarkCompleted => BookingStatus::Completed,
            BookingCommand::MarkNoShow => BookingStatus::NoShow,
            BookingCommand::PaymentConfirmed { .. } => BookingStatus::Confirmed,
            BookingCommand::PaymentFailed { .. } => BookingStatus::PaymentFailed,
            BookingCommand::Override { target, .. } => *target,
        }
    }
}

/// Hechos de la reserva contra los que se valida la transición
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub current: BookingStatus,
    pub renter_id: Uuid,
    pub vehicle_owner_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    /// Antelación mínima con la que un renter puede cancelar
    pub cancellation_window: Duration,
}

/// Transición aprobada, lista para persistir junto con su nota de auditoría
#[derive(Debug, Clone)]
pub struct PlannedTransition {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub note: String,
}

fn is_vehicle_owner(actor: &TransitionActor, ctx: &TransitionContext) -> bool {
    matches!(actor, TransitionActor::User(u) if u.id == ctx.vehicle_owner_id)
}

fn is_admin(actor: &TransitionActor) -> bool {
    matches!(actor, TransitionActor::User(u) if u.is_admin())
}

fn is_reservation_renter(actor: &TransitionActor, ctx: &TransitionContext) -> bool {
    matches!(actor, TransitionActor::User(u) if u.id == ctx.renter_id)
}

fn audit_note(actor: &TransitionActor, from: BookingStatus, to: BookingStatus, reason: Option<&str>) -> String {
    match reason {
        Some(r) if !r.trim().is_empty() => format!(
            "status {} -> {} by {}: {}",
            from,
            to,
            actor.role_label(),
            r.trim()
        ),
        _ => format!("status {} -> {} by {}", from, to, actor.role_label()),
    }
}

/// Validar un comando contra la tabla de transiciones.
///
/// Devuelve la transición planificada o el error que corresponde:
/// `InvalidTransition` cuando el par (origen, destino) no existe en la
/// tabla o una regla temporal lo bloquea, `Forbidden` cuando el par existe
/// pero el actor no tiene permiso. En ambos casos el estado queda intacto.
pub fn authorize(actor: &TransitionActor, ctx: &TransitionContext, command: &BookingCommand) -> AppResult<PlannedTransition> {
    let from = ctx.current;
    let to = command.target();

    // El override administrativo es la única salida de un estado terminal
    if let BookingCommand::Override { target, reason } = command {
        if !is_admin(actor) {
            return Err(AppError::Forbidden(
                "Only an administrator can override a reservation status".to_string(),
            ));
        }
        if *target == from {
            return Err(AppError::InvalidTransition(format!(
                "Reservation is already in status '{}'",
                from
            )));
        }
        return Ok(PlannedTransition {
            from,
            to: *target,
            note: format!("admin override {} -> {}: {}", from, target, reason),
        });
    }

    match command {
        BookingCommand::Confirm => {
            if from != BookingStatus::OnDeliveryPending {
                return Err(invalid_pair(from, to));
            }
            if !is_admin(actor) && !is_vehicle_owner(actor, ctx) {
                return Err(AppError::Forbidden(
                    "Only the vehicle owner or an administrator can confirm this reservation"
                        .to_string(),
                ));
            }
            Ok(PlannedTransition {
                from,
                to,
                note: audit_note(actor, from, to, None),
            })
        }

        BookingCommand::Cancel { reason } => {
            if !from.holds_vehicle() {
                return Err(invalid_pair(from, to));
            }
            if is_admin(actor) || is_vehicle_owner(actor, ctx) {
                return Ok(PlannedTransition {
                    from,
                    to,
                    note: audit_note(actor, from, to, reason.as_deref()),
                });
            }
            if is_reservation_renter(actor, ctx) {
                // Ventana de cancelación: el renter solo cancela con
                // suficiente antelación; el dueño y el admin no tienen límite
                if ctx.start_at - ctx.now < ctx.cancellation_window {
                    return Err(AppError::Forbidden(format!(
                        "Reservations can no longer be cancelled within {} minutes of the start",
                        ctx.cancellation_window.num_minutes()
                    )));
                }
                return Ok(PlannedTransition {
                    from,
                    to,
                    note: audit_note(actor, from, to, reason.as_deref()),
                });
            }
            Err(AppError::Forbidden(
                "You are not allowed to cancel this reservation".to_string(),
            ))
        }

        BookingCommand::MarkCompleted => {
            if from != BookingStatus::Confirmed {
                return Err(invalid_pair(from, to));
            }
            if !is_admin(actor) && !is_vehicle_owner(actor, ctx) {
                return Err(AppError::Forbidden(
                    "Only the vehicle owner or an administrator can complete this reservation"
                        .to_string(),
                ));
            }
            if ctx.now < ctx.end_at {
                return Err(AppError::InvalidTransition(
                    "The rental interval has not ended yet".to_string(),
                ));
            }
            Ok(PlannedTransition {
                from,
                to,
                note: audit_note(actor, from, to, None),
            })
        }

        BookingCommand::MarkNoShow => {
            if from != BookingStatus::Confirmed {
                return Err(invalid_pair(from, to));
            }
            if !is_admin(actor) && !is_vehicle_owner(actor, ctx) {
                return Err(AppError::Forbidden(
                    "Only the vehicle owner or an administrator can mark a no-show".to_string(),
                ));
            }
            Ok(PlannedTransition {
                from,
                to,
                note: audit_note(actor, from, to, None),
            })
        }

        BookingCommand::PaymentConfirmed { external_ref } | BookingCommand::PaymentFailed { external_ref } => {
            if from != BookingStatus::AwaitingPayment {
                return Err(invalid_pair(from, to));
            }
            if !matches!(actor, TransitionActor::PaymentEvent) {
                return Err(AppError::Forbidden(
                    "Payment results are only accepted from the payment confirmation event"
                        .to_string(),
                ));
            }
            let reason = external_ref.as_deref().map(|r| format!("external ref {}", r));
            Ok(PlannedTransition {
                from,
                to,
                note: audit_note(actor, from, to, reason.as_deref()),
            })
        }

        BookingCommand::Override { .. } => unreachable!("handled above"),
    }
}

fn invalid_pair(from: BookingStatus, to: BookingStatus) -> AppError {
    AppError::InvalidTransition(format!(
        "Cannot move a reservation from '{}' to '{}'",
        from, to
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::{ActorContext, ActorRole};

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    struct Ids {
        renter: Uuid,
        owner: Uuid,
        admin: Uuid,
        stranger: Uuid,
    }

    fn ids() -> Ids {
        Ids {
            renter: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            admin: Uuid::new_v4(),
            stranger: Uuid::new_v4(),
        }
    }

    fn ctx(ids: &Ids, current: BookingStatus) -> TransitionContext {
        TransitionContext {
            current,
            renter_id: ids.renter,
            vehicle_owner_id: ids.owner,
            start_at: dt("2025-03-10T09:00:00Z"),
            end_at: dt("2025-03-12T09:00:00Z"),
            now: dt("2025-03-01T00:00:00Z"),
            cancellation_window: Duration::hours(1),
        }
    }

    fn renter(ids: &Ids) -> TransitionActor {
        TransitionActor::User(ActorContext::new(ids.renter, ActorRole::Renter))
    }

    fn owner(ids: &Ids) -> TransitionActor {
        TransitionActor::User(ActorContext::new(ids.owner, ActorRole::Owner))
    }

    fn admin(ids: &Ids) -> TransitionActor {
        TransitionActor::User(ActorContext::new(ids.admin, ActorRole::Admin))
    }

    fn stranger(ids: &Ids) -> TransitionActor {
        TransitionActor::User(ActorContext::new(ids.stranger, ActorRole::Renter))
    }

    #[test]
    fn test_on_delivery_confirm_by_owner_and_admin() {
        let ids = ids();
        let c = ctx(&ids, BookingStatus::OnDeliveryPending);

        assert!(authorize(&owner(&ids), &c, &BookingCommand::Confirm).is_ok());
        assert!(authorize(&admin(&ids), &c, &BookingCommand::Confirm).is_ok());

        let err = authorize(&renter(&ids), &c, &BookingCommand::Confirm).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_confirm_only_from_on_delivery_pending() {
        let ids = ids();
        for status in BookingStatus::all() {
            if status == BookingStatus::OnDeliveryPending {
                continue;
            }
            let c = ctx(&ids, status);
            let err = authorize(&owner(&ids), &c, &BookingCommand::Confirm).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)), "{:?}", status);
        }
    }

    #[test]
    fn test_payment_events_only_from_awaiting_payment() {
        let ids = ids();
        let confirmed = BookingCommand::PaymentConfirmed { external_ref: None };
        let failed = BookingCommand::PaymentFailed { external_ref: None };

        let c = ctx(&ids, BookingStatus::AwaitingPayment);
        let plan = authorize(&TransitionActor::PaymentEvent, &c, &confirmed).unwrap();
        assert_eq!(plan.to, BookingStatus::Confirmed);
        let plan = authorize(&TransitionActor::PaymentEvent, &c, &failed).unwrap();
        assert_eq!(plan.to, BookingStatus::PaymentFailed);

        // Un usuario nunca puede fabricar el resultado del pago
        for actor in [renter(&ids), owner(&ids), admin(&ids)] {
            let err = authorize(&actor, &c, &confirmed).unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }

        for status in BookingStatus::all() {
            if status == BookingStatus::AwaitingPayment {
                continue;
            }
            let c = ctx(&ids, status);
            let err = authorize(&TransitionActor::PaymentEvent, &c, &confirmed).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[test]
    fn test_cancel_from_holding_states_only() {
        let ids = ids();
        let cancel = BookingCommand::Cancel { reason: None };

        for status in BookingStatus::all() {
            let c = ctx(&ids, status);
            let result = authorize(&owner(&ids), &c, &cancel);
            if status.holds_vehicle() {
                assert!(result.is_ok(), "{:?}", status);
            } else {
                assert!(
                    matches!(result.unwrap_err(), AppError::InvalidTransition(_)),
                    "{:?}",
                    status
                );
            }
        }
    }

    #[test]
    fn test_renter_cancellation_window() {
        let ids = ids();
        let cancel = BookingCommand::Cancel { reason: Some("change of plans".to_string()) };

        // 30 minutos antes del inicio: el renter ya no puede, el dueño sí
        let mut c = ctx(&ids, BookingStatus::Confirmed);
        c.now = c.start_at - Duration::minutes(30);

        let err = authorize(&renter(&ids), &c, &cancel).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(authorize(&owner(&ids), &c, &cancel).is_ok());
        assert!(authorize(&admin(&ids), &c, &cancel).is_ok());

        // Exactamente en el límite de la ventana sí se permite
        c.now = c.start_at - Duration::hours(1);
        assert!(authorize(&renter(&ids), &c, &cancel).is_ok());

        // Un tercero no relacionado nunca puede
        let err = authorize(&stranger(&ids), &c, &cancel).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_mark_completed_requires_interval_end() {
        let ids = ids();
        let mut c = ctx(&ids, BookingStatus::Confirmed);

        // Antes de que termine el intervalo: bloqueado aunque sea el dueño
        c.now = c.end_at - Duration::hours(1);
        let err = authorize(&owner(&ids), &c, &BookingCommand::MarkCompleted).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        c.now = c.end_at;
        assert!(authorize(&owner(&ids), &c, &BookingCommand::MarkCompleted).is_ok());
        assert!(authorize(&admin(&ids), &c, &BookingCommand::MarkCompleted).is_ok());

        let err = authorize(&renter(&ids), &c, &BookingCommand::MarkCompleted).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_no_show_from_confirmed_by_owner_or_admin() {
        let ids = ids();
        let c = ctx(&ids, BookingStatus::Confirmed);

        assert!(authorize(&owner(&ids), &c, &BookingCommand::MarkNoShow).is_ok());
        assert!(authorize(&admin(&ids), &c, &BookingCommand::MarkNoShow).is_ok());
        let err = authorize(&renter(&ids), &c, &BookingCommand::MarkNoShow).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let c = ctx(&ids, BookingStatus::Pending);
        let err = authorize(&owner(&ids), &c, &BookingCommand::MarkNoShow).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_terminal_states_only_move_under_admin_override() {
        let ids = ids();
        let user_commands = [
            BookingCommand::Confirm,
            BookingCommand::Cancel { reason: None },
            BookingCommand::MarkCompleted,
            BookingCommand::MarkNoShow,
        ];

        for status in BookingStatus::all().into_iter().filter(|s| s.is_terminal()) {
            let c = ctx(&ids, status);
            for cmd in &user_commands {
                for actor in [renter(&ids), owner(&ids), admin(&ids)] {
                    assert!(
                        authorize(&actor, &c, cmd).is_err(),
                        "{:?} permitió {:?}",
                        status,
                        cmd
                    );
                }
            }

            // El override de admin sí puede sacar de un terminal
            let plan = authorize(
                &admin(&ids),
                &c,
                &BookingCommand::Override {
                    target: BookingStatus::Pending,
                    reason: "support ticket 4412".to_string(),
                },
            )
            .unwrap();
            assert_eq!(plan.to, BookingStatus::Pending);
        }
    }

    #[test]
    fn test_override_is_admin_only_and_never_a_noop() {
        let ids = ids();
        let c = ctx(&ids, BookingStatus::Confirmed);
        let cmd = BookingCommand::Override {
            target: BookingStatus::Cancelled,
            reason: "fraud review".to_string(),
        };

        for actor in [renter(&ids), owner(&ids), TransitionActor::PaymentEvent] {
            let err = authorize(&actor, &c, &cmd).unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }

        let noop = BookingCommand::Override {
            target: BookingStatus::Confirmed,
            reason: "noop".to_string(),
        };
        let err = authorize(&admin(&ids), &c, &noop).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_audit_note_includes_actor_and_reason() {
        let ids = ids();
        let c = ctx(&ids, BookingStatus::Confirmed);
        let plan = authorize(
            &owner(&ids),
            &c,
            &BookingCommand::Cancel { reason: Some("vehicle damaged".to_string()) },
        )
        .unwrap();
        assert!(plan.note.contains("owner"));
        assert!(plan.note.contains("vehicle damaged"));
        assert!(plan.note.contains("confirmed -> cancelled"));
    }
}
