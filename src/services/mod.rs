//! Services module
//!
//! Este módulo contiene la lógica de negocio del motor de reservas:
//! disponibilidad, precio, la máquina de estados y la coordinación del
//! estado de pago. Los handlers HTTP no implementan reglas por su cuenta.

pub mod availability_service;
pub mod events;
pub mod payment_coordinator;
pub mod pricing_service;
pub mod transition;
