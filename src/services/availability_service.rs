//! Servicio de disponibilidad
//!
//! Determina si un intervalo [start, end) propuesto para un vehículo está
//! libre de reservas en conflicto. El test de solape usa intervalos
//! semiabiertos: una reserva que termina a las 10:00 no choca con una que
//! empieza a las 10:00.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::repositories::reservation_repository;
use crate::utils::errors::AppResult;

/// Test de solape de intervalos semiabiertos: [s1,e1) y [s2,e2) se solapan
/// sii s1 < e2 && s2 < e1. El contacto exacto en el borde no es solape.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Verificar si el vehículo está libre en [start, end).
///
/// Cuenta las reservas del vehículo en estados que retienen el recurso cuyo
/// intervalo solapa el propuesto; disponible sii la cuenta es cero.
/// `exclude_reservation_id` permite que una reprogramación ignore la reserva
/// que se está modificando.
pub async fn is_available(
    conn: &mut PgConnection,
    vehicle_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_reservation_id: Option<Uuid>,
) -> AppResult<bool> {
    let conflicts = reservation_repository::count_overlapping(
        conn,
        vehicle_id,
        start,
        end,
        exclude_reservation_id,
    )
    .await?;

    Ok(conflicts == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_overlap_basic_cases() {
        let s1 = dt("2025-03-10T00:00:00Z");
        let e1 = dt("2025-03-12T00:00:00Z");

        // Contenido dentro
        assert!(intervals_overlap(s1, e1, dt("2025-03-11T00:00:00Z"), dt("2025-03-11T12:00:00Z")));
        // Cruza el inicio
        assert!(intervals_overlap(s1, e1, dt("2025-03-09T00:00:00Z"), dt("2025-03-10T12:00:00Z")));
        // Cruza el final
        assert!(intervals_overlap(s1, e1, dt("2025-03-11T12:00:00Z"), dt("2025-03-13T00:00:00Z")));
        // Contiene al primero
        assert!(intervals_overlap(s1, e1, dt("2025-03-09T00:00:00Z"), dt("2025-03-13T00:00:00Z")));
        // Completamente antes / después
        assert!(!intervals_overlap(s1, e1, dt("2025-03-01T00:00:00Z"), dt("2025-03-05T00:00:00Z")));
        assert!(!intervals_overlap(s1, e1, dt("2025-03-13T00:00:00Z"), dt("2025-03-14T00:00:00Z")));
    }

    #[test]
    fn test_boundary_touch_is_not_overlap() {
        // [t0,t1) y [t1,t2) nunca se solapan, para todo t0<t1<t2
        let t0 = dt("2025-03-10T08:00:00Z");
        for hours in [1i64, 2, 24, 100] {
            let t1 = t0 + Duration::hours(hours);
            let t2 = t1 + Duration::hours(hours);
            assert!(!intervals_overlap(t0, t1, t1, t2));
            assert!(!intervals_overlap(t1, t2, t0, t1));
        }
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let base = dt("2025-03-01T00:00:00Z");
        // Barrido de pares de intervalos sobre una grilla de horas
        for a in 0i64..6 {
            for b in (a + 1)..7 {
                for c in 0i64..6 {
                    for d in (c + 1)..7 {
                        let (s1, e1) = (base + Duration::hours(a), base + Duration::hours(b));
                        let (s2, e2) = (base + Duration::hours(c), base + Duration::hours(d));
                        assert_eq!(
                            intervals_overlap(s1, e1, s2, e2),
                            intervals_overlap(s2, e2, s1, e1),
                            "asimetría en ({},{}) vs ({},{})",
                            a,
                            b,
                            c,
                            d
                        );
                    }
                }
            }
        }
    }
}
