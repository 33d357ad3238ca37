// Consumed collaborator interfaces: the surrounding CRUD application owns
// organizations, patients, appointments and per-org variables; this cell only
// reads them (and writes gateway variables) through these seams.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::error::NotificationError;
use crate::models::{Appointment, AppointmentWithParties, Doctor, Organization, Patient};

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Organization>, NotificationError>;
    async fn get(&self, org_id: Uuid) -> Result<Organization, NotificationError>;
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn get(&self, patient_id: Uuid, org_id: Uuid) -> Result<Patient, NotificationError>;
}

#[async_trait]
pub trait AppointmentDirectory: Send + Sync {
    /// Appointments whose wall-clock (date, time-of-day), interpreted in
    /// `zone`, falls inside the UTC window. Implementations must narrow the
    /// candidate set in the query itself (org partition, soft-delete and
    /// status filters, date bounds) and resolve zones at this boundary --
    /// never by loading the whole table and filtering in memory.
    async fn find_in_window(
        &self,
        org_id: Uuid,
        zone: Tz,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, NotificationError>;

    /// By-id fetch with patient and doctor populated.
    async fn get_with_parties(
        &self,
        appointment_id: Uuid,
        org_id: Uuid,
    ) -> Result<AppointmentWithParties, NotificationError>;
}

/// Org-scoped key/value store holding the gateway coordinates.
#[async_trait]
pub trait OrgVariableStore: Send + Sync {
    async fn get(&self, org_id: Uuid, key: &str) -> Result<Option<String>, NotificationError>;
    async fn set(&self, org_id: Uuid, key: &str, value: &str) -> Result<(), NotificationError>;
}

/// Keep the candidates whose zone-resolved instant falls inside the window.
/// Rows with an unresolvable local time (bad format, DST gap) are skipped.
pub fn filter_by_instant(
    appointments: Vec<Appointment>,
    zone: Tz,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Appointment> {
    appointments
        .into_iter()
        .filter(|appointment| match appointment.instant_in(zone) {
            Some(instant) => instant >= window_start && instant <= window_end,
            None => {
                warn!(
                    "Appointment {} has an unresolvable local time {:?}, skipping",
                    appointment.id, appointment.start_time
                );
                false
            }
        })
        .collect()
}

// ==============================================================================
// SUPABASE IMPLEMENTATIONS
// ==============================================================================

pub struct SupabaseOrganizationDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseOrganizationDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl OrganizationDirectory for SupabaseOrganizationDirectory {
    async fn list_active(&self) -> Result<Vec<Organization>, NotificationError> {
        let organizations: Vec<Organization> = self
            .supabase
            .request(Method::GET, "/rest/v1/organizations?is_active=eq.true", None)
            .await?;
        Ok(organizations)
    }

    async fn get(&self, org_id: Uuid) -> Result<Organization, NotificationError> {
        let path = format!("/rest/v1/organizations?id=eq.{}", org_id);
        let mut rows: Vec<Organization> = self.supabase.request(Method::GET, &path, None).await?;

        if rows.is_empty() {
            return Err(NotificationError::NotFound("organization".to_string()));
        }
        Ok(rows.remove(0))
    }
}

pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePatientDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn get(&self, patient_id: Uuid, org_id: Uuid) -> Result<Patient, NotificationError> {
        let path = format!("/rest/v1/patients?id=eq.{}&org_id=eq.{}", patient_id, org_id);
        let mut rows: Vec<Patient> = self.supabase.request(Method::GET, &path, None).await?;

        if rows.is_empty() {
            return Err(NotificationError::NotFound("patient".to_string()));
        }
        Ok(rows.remove(0))
    }
}

pub struct SupabaseAppointmentDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl AppointmentDirectory for SupabaseAppointmentDirectory {
    async fn find_in_window(
        &self,
        org_id: Uuid,
        zone: Tz,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, NotificationError> {
        // The window expressed as wall-clock dates in the org's zone bounds
        // the stored date column; the exact instant check happens on the
        // narrowed rows below.
        let local_start = window_start.with_timezone(&zone).date_naive();
        let local_end = window_end.with_timezone(&zone).date_naive();

        let path = format!(
            "/rest/v1/appointments?org_id=eq.{}&is_deleted=eq.false\
             &status=in.(pending,confirmed)&appointment_date=gte.{}&appointment_date=lte.{}",
            org_id, local_start, local_end
        );
        let candidates: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(filter_by_instant(candidates, zone, window_start, window_end))
    }

    async fn get_with_parties(
        &self,
        appointment_id: Uuid,
        org_id: Uuid,
    ) -> Result<AppointmentWithParties, NotificationError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&org_id=eq.{}",
            appointment_id, org_id
        );
        let mut rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;

        if rows.is_empty() {
            return Err(NotificationError::NotFound("appointment".to_string()));
        }
        let appointment = rows.remove(0);

        let patient_path = format!(
            "/rest/v1/patients?id=eq.{}&org_id=eq.{}",
            appointment.patient_id, org_id
        );
        let mut patients: Vec<Patient> =
            self.supabase.request(Method::GET, &patient_path, None).await?;
        if patients.is_empty() {
            return Err(NotificationError::NotFound("patient".to_string()));
        }
        let patient = patients.remove(0);

        let doctor = match appointment.doctor_id {
            Some(doctor_id) => {
                let doctor_path = format!(
                    "/rest/v1/doctors?id=eq.{}&org_id=eq.{}",
                    doctor_id, org_id
                );
                let doctors: Vec<Doctor> =
                    self.supabase.request(Method::GET, &doctor_path, None).await?;
                doctors.into_iter().next()
            }
            None => None,
        };

        Ok(AppointmentWithParties {
            appointment,
            patient,
            doctor,
        })
    }
}

pub struct SupabaseVariableStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseVariableStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[derive(Debug, Deserialize)]
struct VariableRow {
    value: String,
}

#[async_trait]
impl OrgVariableStore for SupabaseVariableStore {
    async fn get(&self, org_id: Uuid, key: &str) -> Result<Option<String>, NotificationError> {
        let path = format!(
            "/rest/v1/organization_variables?org_id=eq.{}&key=eq.{}&select=value",
            org_id, key
        );
        let rows: Vec<VariableRow> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next().map(|row| row.value))
    }

    async fn set(&self, org_id: Uuid, key: &str, value: &str) -> Result<(), NotificationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let body = json!({
            "org_id": org_id,
            "key": key,
            "value": value,
        });
        let _rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/organization_variables?on_conflict=org_id,key",
                Some(body),
                Some(headers),
            )
            .await?;
        Ok(())
    }
}
