//! Coordinador de estado de pago
//!
//! Mantiene el sub-registro de pago consistente con las transiciones de la
//! reserva. El efecto se aplica dentro de la misma transacción que escribe
//! el estado de la reserva, nunca como una llamada posterior que pueda
//! fallar por separado.

use crate::models::payment::PaymentStatus;
use crate::models::reservation::BookingStatus;

/// Efecto sobre el estado del pago que implica una transición de reserva.
///
/// `None` significa que el pago no se toca. Reglas:
/// - cualquier estado -> CANCELLED con pago PAID: se marca REFUNDED (solo
///   la intención; la devolución real es externa). Con pago PENDING el
///   registro queda como está: nunca se "reembolsa" dinero no cobrado.
/// - AWAITING_PAYMENT -> CONFIRMED: el evento de pago acreditó, PAID.
/// - ON_DELIVERY_PENDING -> CONFIRMED: el efectivo aún no cambió de manos,
///   el pago sigue PENDING.
/// - cualquier estado -> PAYMENT_FAILED: FAILED.
pub fn payment_effect(
    from: BookingStatus,
    to: BookingStatus,
    current: PaymentStatus,
) -> Option<PaymentStatus> {
    match to {
        BookingStatus::Cancelled if current == PaymentStatus::Paid => Some(PaymentStatus::Refunded),
        BookingStatus::Confirmed if from == BookingStatus::AwaitingPayment => {
            Some(PaymentStatus::Paid)
        }
        BookingStatus::PaymentFailed => Some(PaymentStatus::Failed),
        _ => None,
    }
}

/// Validar el "mark as paid" explícito de un cobro contra-entrega.
///
/// No transiciona la reserva: solo mueve el pago PENDING -> PAID una vez
/// que el efectivo se entregó. Válido mientras la reserva siga viva
/// (contra-entrega, confirmada o ya completada).
pub fn can_mark_paid(reservation_status: BookingStatus, payment_status: PaymentStatus) -> bool {
    if payment_status != PaymentStatus::Pending {
        return false;
    }
    matches!(
        reservation_status,
        BookingStatus::OnDeliveryPending | BookingStatus::Confirmed | BookingStatus::Completed
    )
}
