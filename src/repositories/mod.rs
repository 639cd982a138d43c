//! Repositorios
//!
//! Capa de acceso a datos: todo el SQL del motor vive en estos módulos.

pub mod reservation_repository;
pub mod vehicle_repository;
