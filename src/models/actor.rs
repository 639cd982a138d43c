//! Actor del sistema
//!
//! Identidad explícita que viaja por cada llamada del orquestador. La
//! emisión de identidad es externa (JWT firmado); el motor nunca consulta
//! una sesión global.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rol del actor autenticado
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Renter,
    Owner,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Renter => "renter",
            ActorRole::Owner => "owner",
            ActorRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for ActorRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "renter" => Ok(ActorRole::Renter),
            "owner" => Ok(ActorRole::Owner),
            "admin" => Ok(ActorRole::Admin),
            _ => Err(()),
        }
    }
}

/// Contexto del actor que se inyecta en las requests autenticadas
#[derive(Debug, Clone, Copy)]
pub struct ActorContext {
    pub id: Uuid,
    pub role: ActorRole,
}

impl ActorContext {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

/// Quién dispara una transición: un usuario autenticado o el evento
/// autoritativo de confirmación de pago (nunca un flag del cliente).
#[derive(Debug, Clone, Copy)]
pub enum TransitionActor {
    User(ActorContext),
    PaymentEvent,
}

impl TransitionActor {
    /// Etiqueta del actor para la bitácora de auditoría
    pub fn role_label(&self) -> &'static str {
        match self {
            TransitionActor::User(actor) => actor.role.as_str(),
            TransitionActor::PaymentEvent => "payment_event",
        }
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        match self {
            TransitionActor::User(actor) => Some(actor.id),
            TransitionActor::PaymentEvent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [ActorRole::Renter, ActorRole::Owner, ActorRole::Admin] {
            assert_eq!(ActorRole::from_str(role.as_str()), Ok(role));
        }
        assert!(ActorRole::from_str("superuser").is_err());
    }

    #[test]
    fn test_payment_event_has_no_user_id() {
        assert_eq!(TransitionActor::PaymentEvent.actor_id(), None);
        assert_eq!(TransitionActor::PaymentEvent.role_label(), "payment_event");
    }
}
