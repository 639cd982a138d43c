//! Controllers
//!
//! Orquestadores de las operaciones de la API. Los handlers HTTP delegan
//! aquí; los controllers coordinan servicios y repositorios dentro de los
//! límites transaccionales correctos.

pub mod reservation_controller;
