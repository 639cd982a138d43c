//! Utilidades de validación
//!
//! Funciones helper de validación compartidas por los DTOs.

use validator::ValidationError;

/// Validar que un string no esté vacío ni sea solo espacios
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}
