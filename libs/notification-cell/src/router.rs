use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    dispatch_follow_up, dispatch_medical_history, dispatch_payment_overdue,
    dispatch_payment_receipt, get_settings, list_messages, resend_message, update_settings,
    NotificationState,
};

pub fn notification_routes(state: NotificationState) -> Router {
    Router::new()
        .route("/dispatch/medical-history", post(dispatch_medical_history))
        .route("/dispatch/payment-receipt", post(dispatch_payment_receipt))
        .route("/dispatch/follow-up", post(dispatch_follow_up))
        .route("/dispatch/payment-overdue", post(dispatch_payment_overdue))
        .route("/messages", get(list_messages))
        .route("/messages/{message_id}/resend", post(resend_message))
        .route("/settings/{org_id}", get(get_settings).put(update_settings))
        .with_state(state)
}
