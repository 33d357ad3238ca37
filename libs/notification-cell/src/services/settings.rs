use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::NotificationError;
use crate::models::NotificationSettings;

#[async_trait]
pub trait NotificationSettingsProvider: Send + Sync {
    /// Existing settings, or persisted defaults on first access.
    async fn get_or_create(&self, org_id: Uuid) -> Result<NotificationSettings, NotificationError>;

    /// Full replacement, not a merge: the caller supplies the complete offset
    /// list and the complete template set.
    async fn update(
        &self,
        org_id: Uuid,
        settings: NotificationSettings,
    ) -> Result<NotificationSettings, NotificationError>;
}

pub struct SupabaseSettingsProvider {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSettingsProvider {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn upsert(
        &self,
        settings: &NotificationSettings,
    ) -> Result<NotificationSettings, NotificationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let mut rows: Vec<NotificationSettings> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/notification_settings?on_conflict=org_id",
                Some(serde_json::to_value(settings)?),
                Some(headers),
            )
            .await?;

        if rows.is_empty() {
            return Err(NotificationError::Storage(
                "settings upsert returned no row".to_string(),
            ));
        }
        Ok(rows.remove(0))
    }
}

#[async_trait]
impl NotificationSettingsProvider for SupabaseSettingsProvider {
    async fn get_or_create(&self, org_id: Uuid) -> Result<NotificationSettings, NotificationError> {
        let path = format!("/rest/v1/notification_settings?org_id=eq.{}", org_id);
        let rows: Vec<NotificationSettings> =
            self.supabase.request(Method::GET, &path, None).await?;

        if let Some(settings) = rows.into_iter().next() {
            return Ok(settings);
        }

        debug!("No notification settings for org {}, persisting defaults", org_id);
        self.upsert(&NotificationSettings::default_for(org_id)).await
    }

    async fn update(
        &self,
        org_id: Uuid,
        mut settings: NotificationSettings,
    ) -> Result<NotificationSettings, NotificationError> {
        // The path parameter wins over whatever org the payload claims.
        settings.org_id = org_id;
        self.upsert(&settings).await
    }
}
