//! Rutas de reservas
//!
//! Handlers HTTP finos: extraen el actor autenticado y delegan toda la
//! lógica al orquestador.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::reservation_controller::ReservationController;
use crate::dto::reservation_dto::{
    AvailabilityQuery, AvailabilityResponse, ChangeStatusRequest, CreateReservationRequest,
    PaymentResultRequest, ReservationListItem, ReservationResponse,
};
use crate::models::actor::ActorContext;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};

pub fn create_reservation_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation))
        .route("/", get(list_my_reservations))
        .route("/availability", get(check_availability))
        .route("/:id", get(get_reservation))
        .route("/:id/status", post(change_status))
        .route("/:id/payment/confirmation", post(record_payment_result))
        .route("/:id/payment/paid", post(mark_paid))
}

fn controller(state: &AppState) -> ReservationController {
    ReservationController::new(state.pool.clone(), state.config.cancellation_window())
}

/// Crear una nueva reserva
async fn create_reservation(
    Extension(actor): Extension<ActorContext>,
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> AppResult<Json<ReservationResponse>> {
    let response = controller(&state).create(actor, request).await?;
    Ok(Json(response))
}

/// Listar las reservas del actor autenticado
async fn list_my_reservations(
    Extension(actor): Extension<ActorContext>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReservationListItem>>> {
    let response = controller(&state).list_mine(actor).await?;
    Ok(Json(response))
}

/// Pre-chequeo de disponibilidad para la UI
async fn check_availability(
    Extension(_actor): Extension<ActorContext>,
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = controller(&state).check_availability(query).await?;
    Ok(Json(AvailabilityResponse { available }))
}

/// Obtener una reserva con su bitácora
async fn get_reservation(
    Extension(actor): Extension<ActorContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReservationResponse>> {
    let response = controller(&state).get(actor, id).await?;
    Ok(Json(response))
}

/// Cambiar el estado de una reserva
async fn change_status(
    Extension(actor): Extension<ActorContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChangeStatusRequest>,
) -> AppResult<Json<ReservationResponse>> {
    let response = controller(&state).change_status(actor, id, request).await?;
    Ok(Json(response))
}

/// Registrar el resultado de la confirmación de pago externa.
///
/// El webhook de la pasarela vive en otro servicio; esta ruta recibe su
/// efecto ya autenticado y por eso queda restringida a administradores.
async fn record_payment_result(
    Extension(actor): Extension<ActorContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentResultRequest>,
) -> AppResult<Json<ReservationResponse>> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Only the payment subsystem may report payment results".to_string(),
        ));
    }
    let response = controller(&state).record_payment_result(id, request).await?;
    Ok(Json(response))
}

/// Marcar como cobrado un pago contra-entrega
async fn mark_paid(
    Extension(actor): Extension<ActorContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReservationResponse>> {
    let response = controller(&state).mark_paid(actor, id).await?;
    Ok(Json(response))
}
