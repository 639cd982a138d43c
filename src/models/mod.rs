//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL con las convenciones estándar.

pub mod actor;
pub mod payment;
pub mod reservation;
pub mod vehicle;
