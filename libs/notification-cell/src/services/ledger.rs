use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::NotificationError;
use crate::models::{Message, MessageStatus, NewMessage};

/// Durable record of every outbound notification; the source of truth for
/// reminder dedup. Rows are append-mostly: status updates only, no deletes.
#[async_trait]
pub trait MessageLedger: Send + Sync {
    /// Insert a new row with status=pending.
    async fn create(&self, message: NewMessage) -> Result<Message, NotificationError>;

    /// Set the delivery status; `sent_at` is stamped iff the new status is
    /// sent, and the error is stored when given. Callable repeatedly -- a
    /// manual resend re-transitions failed rows.
    async fn update_status(
        &self,
        message_id: Uuid,
        org_id: Uuid,
        status: MessageStatus,
        error: Option<String>,
    ) -> Result<(), NotificationError>;

    async fn get(&self, message_id: Uuid, org_id: Uuid) -> Result<Message, NotificationError>;

    /// True iff an appointment-reminder row with these correlation columns
    /// and status sent or pending was created within the lookback window.
    /// Pending counts as "already attempted": a crash between the ledger
    /// write and the gateway call must not cause a double send next tick.
    async fn find_recent_reminder(
        &self,
        org_id: Uuid,
        appointment_id: Uuid,
        timing_in_hours: i64,
        lookback: Duration,
    ) -> Result<bool, NotificationError>;

    /// Newest-first audit listing.
    async fn list(
        &self,
        org_id: Uuid,
        patient_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<Message>, NotificationError>;
}

pub struct SupabaseMessageLedger {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseMessageLedger {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

fn prefer_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: Uuid,
}

#[async_trait]
impl MessageLedger for SupabaseMessageLedger {
    async fn create(&self, message: NewMessage) -> Result<Message, NotificationError> {
        let mut body = serde_json::to_value(&message)?;
        body["status"] = serde_json::to_value(MessageStatus::Pending)?;

        let mut rows: Vec<Message> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/messages",
                Some(body),
                Some(prefer_representation()),
            )
            .await?;

        if rows.is_empty() {
            return Err(NotificationError::Storage(
                "message insert returned no row".to_string(),
            ));
        }
        let created = rows.remove(0);
        debug!("Created {} message {} for org {}", created.kind, created.id, created.org_id);
        Ok(created)
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        org_id: Uuid,
        status: MessageStatus,
        error: Option<String>,
    ) -> Result<(), NotificationError> {
        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), serde_json::to_value(status)?);
        if status == MessageStatus::Sent {
            patch.insert("sent_at".to_string(), serde_json::to_value(Utc::now())?);
        }
        if let Some(error) = error {
            patch.insert("error".to_string(), Value::String(error));
        }

        let path = format!("/rest/v1/messages?id=eq.{}&org_id=eq.{}", message_id, org_id);
        let rows: Vec<Message> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(patch)),
                Some(prefer_representation()),
            )
            .await?;

        if rows.is_empty() {
            return Err(NotificationError::NotFound("message".to_string()));
        }
        Ok(())
    }

    async fn get(&self, message_id: Uuid, org_id: Uuid) -> Result<Message, NotificationError> {
        let path = format!("/rest/v1/messages?id=eq.{}&org_id=eq.{}", message_id, org_id);
        let mut rows: Vec<Message> = self.supabase.request(Method::GET, &path, None).await?;

        if rows.is_empty() {
            return Err(NotificationError::NotFound("message".to_string()));
        }
        Ok(rows.remove(0))
    }

    async fn find_recent_reminder(
        &self,
        org_id: Uuid,
        appointment_id: Uuid,
        timing_in_hours: i64,
        lookback: Duration,
    ) -> Result<bool, NotificationError> {
        let cutoff = (Utc::now() - lookback).to_rfc3339();
        let path = format!(
            "/rest/v1/messages?org_id=eq.{}&kind=eq.appointment-reminder\
             &appointment_id=eq.{}&timing_in_hours=eq.{}&status=in.(sent,pending)\
             &created_at=gte.{}&select=id&limit=1",
            org_id, appointment_id, timing_in_hours, cutoff
        );
        let rows: Vec<IdRow> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    async fn list(
        &self,
        org_id: Uuid,
        patient_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<Message>, NotificationError> {
        let mut path = format!(
            "/rest/v1/messages?org_id=eq.{}&order=created_at.desc&limit={}",
            org_id, limit
        );
        if let Some(patient_id) = patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }

        let rows: Vec<Message> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows)
    }
}
