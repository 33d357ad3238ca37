use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use tracing::info;
use uuid::Uuid;

use shared_models::AppError;

use crate::models::{
    FollowUpDispatchRequest, MedicalHistoryDispatchRequest, Message, MessageListQuery,
    NotificationSettings, PaymentOverdueDispatchRequest, PaymentReceiptDispatchRequest,
    ResendRequest,
};
use crate::services::dispatcher::MessageDispatchService;
use crate::services::ledger::MessageLedger;
use crate::services::settings::NotificationSettingsProvider;

const MAX_LIST_LIMIT: usize = 200;

/// Shared handler state: the dispatcher plus the seams the settings and
/// audit endpoints read from.
#[derive(Clone)]
pub struct NotificationState {
    pub dispatcher: Arc<MessageDispatchService>,
    pub settings: Arc<dyn NotificationSettingsProvider>,
    pub ledger: Arc<dyn MessageLedger>,
}

/// Dispatch a medical history link to a patient. A gateway failure still
/// answers 200 -- the failure lives on the returned message.
pub async fn dispatch_medical_history(
    State(state): State<NotificationState>,
    Json(request): Json<MedicalHistoryDispatchRequest>,
) -> Result<Json<Message>, AppError> {
    info!(
        "Medical history link dispatch requested for patient {} in org {}",
        request.patient_id, request.org_id
    );

    let message = state
        .dispatcher
        .dispatch_medical_history_link(request.patient_id, request.org_id)
        .await?;
    Ok(Json(message))
}

pub async fn dispatch_payment_receipt(
    State(state): State<NotificationState>,
    Json(request): Json<PaymentReceiptDispatchRequest>,
) -> Result<Json<Message>, AppError> {
    info!(
        "Payment receipt dispatch requested for patient {} in org {}",
        request.patient_id, request.org_id
    );

    let message = state
        .dispatcher
        .dispatch_payment_receipt(
            request.patient_id,
            request.payment_id,
            request.amount,
            request.remaining_balance,
            request.org_id,
        )
        .await?;
    Ok(Json(message))
}

pub async fn dispatch_follow_up(
    State(state): State<NotificationState>,
    Json(request): Json<FollowUpDispatchRequest>,
) -> Result<Json<Message>, AppError> {
    info!(
        "Follow-up dispatch requested for patient {} in org {}",
        request.patient_id, request.org_id
    );

    let message = state
        .dispatcher
        .dispatch_follow_up(request.patient_id, request.org_id)
        .await?;
    Ok(Json(message))
}

pub async fn dispatch_payment_overdue(
    State(state): State<NotificationState>,
    Json(request): Json<PaymentOverdueDispatchRequest>,
) -> Result<Json<Message>, AppError> {
    info!(
        "Payment overdue dispatch requested for patient {} in org {}",
        request.patient_id, request.org_id
    );

    let message = state
        .dispatcher
        .dispatch_payment_overdue(request.patient_id, request.amount_due, request.org_id)
        .await?;
    Ok(Json(message))
}

pub async fn resend_message(
    State(state): State<NotificationState>,
    Path(message_id): Path<Uuid>,
    Json(request): Json<ResendRequest>,
) -> Result<Json<Message>, AppError> {
    info!("Resend requested for message {} in org {}", message_id, request.org_id);

    let message = state.dispatcher.resend(message_id, request.org_id).await?;
    Ok(Json(message))
}

pub async fn list_messages(
    State(state): State<NotificationState>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let limit = query.limit.unwrap_or(50).min(MAX_LIST_LIMIT);
    let messages = state.ledger.list(query.org_id, query.patient_id, limit).await?;
    Ok(Json(messages))
}

pub async fn get_settings(
    State(state): State<NotificationState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<NotificationSettings>, AppError> {
    let settings = state.settings.get_or_create(org_id).await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<NotificationState>,
    Path(org_id): Path<Uuid>,
    Json(settings): Json<NotificationSettings>,
) -> Result<Json<NotificationSettings>, AppError> {
    info!("Replacing notification settings for org {}", org_id);

    let updated = state.settings.update(org_id, settings).await?;
    Ok(Json(updated))
}
