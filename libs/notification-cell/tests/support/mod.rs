#![allow(dead_code)]
// Shared in-memory backends for the notification-cell test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use notification_cell::error::NotificationError;
use notification_cell::models::{
    Appointment, AppointmentStatus, AppointmentWithParties, Doctor, Message, MessageKind,
    MessageStatus, NewMessage, NotificationSettings, Organization, Patient, ReminderOffset,
    SchedulerConfig, SendOutcome,
};
use notification_cell::services::directory::{
    filter_by_instant, AppointmentDirectory, OrgVariableStore, OrganizationDirectory,
    PatientDirectory,
};
use notification_cell::services::dispatcher::MessageDispatchService;
use notification_cell::services::gateway::MessageGateway;
use notification_cell::services::ledger::MessageLedger;
use notification_cell::services::scheduler::ReminderSchedulerService;
use notification_cell::services::settings::NotificationSettingsProvider;
use shared_config::AppConfig;

pub fn test_config() -> AppConfig {
    AppConfig {
        supabase_url: "http://localhost:54321".to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        patient_portal_url: "https://portal.test".to_string(),
        gateway_timeout_seconds: 5,
    }
}

// ==============================================================================
// IN-MEMORY BACKEND
// ==============================================================================

/// One struct implements every consumed seam, so a single `Arc<TestBackend>`
/// can be handed to the dispatcher, the scheduler and the handlers.
#[derive(Default)]
pub struct TestBackend {
    pub organizations: Mutex<Vec<Organization>>,
    pub patients: Mutex<Vec<Patient>>,
    pub doctors: Mutex<Vec<Doctor>>,
    pub appointments: Mutex<Vec<Appointment>>,
    pub variables: Mutex<HashMap<(Uuid, String), String>>,
    pub settings: Mutex<HashMap<Uuid, NotificationSettings>>,
    pub message_rows: Mutex<Vec<Message>>,
    settings_failure: Mutex<Option<Uuid>>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_org(&self, org: Organization) {
        self.organizations.lock().unwrap().push(org);
    }

    pub fn add_patient(&self, patient: Patient) {
        self.patients.lock().unwrap().push(patient);
    }

    pub fn add_doctor(&self, doctor: Doctor) {
        self.doctors.lock().unwrap().push(doctor);
    }

    pub fn add_appointment(&self, appointment: Appointment) {
        self.appointments.lock().unwrap().push(appointment);
    }

    pub fn put_settings(&self, settings: NotificationSettings) {
        self.settings.lock().unwrap().insert(settings.org_id, settings);
    }

    pub fn set_variable(&self, org_id: Uuid, key: &str, value: &str) {
        self.variables
            .lock()
            .unwrap()
            .insert((org_id, key.to_string()), value.to_string());
    }

    /// Make `get_or_create` fail for one org, to exercise tenant isolation.
    pub fn fail_settings_for(&self, org_id: Uuid) {
        *self.settings_failure.lock().unwrap() = Some(org_id);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.message_rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrganizationDirectory for TestBackend {
    async fn list_active(&self) -> Result<Vec<Organization>, NotificationError> {
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .iter()
            .filter(|org| org.is_active)
            .cloned()
            .collect())
    }

    async fn get(&self, org_id: Uuid) -> Result<Organization, NotificationError> {
        self.organizations
            .lock()
            .unwrap()
            .iter()
            .find(|org| org.id == org_id)
            .cloned()
            .ok_or_else(|| NotificationError::NotFound("organization".to_string()))
    }
}

#[async_trait]
impl PatientDirectory for TestBackend {
    async fn get(&self, patient_id: Uuid, org_id: Uuid) -> Result<Patient, NotificationError> {
        self.patients
            .lock()
            .unwrap()
            .iter()
            .find(|patient| patient.id == patient_id && patient.org_id == org_id)
            .cloned()
            .ok_or_else(|| NotificationError::NotFound("patient".to_string()))
    }
}

#[async_trait]
impl AppointmentDirectory for TestBackend {
    async fn find_in_window(
        &self,
        org_id: Uuid,
        zone: Tz,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, NotificationError> {
        let candidates: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|appointment| {
                appointment.org_id == org_id
                    && !appointment.is_deleted
                    && matches!(
                        appointment.status,
                        AppointmentStatus::Pending | AppointmentStatus::Confirmed
                    )
            })
            .cloned()
            .collect();

        Ok(filter_by_instant(candidates, zone, window_start, window_end))
    }

    async fn get_with_parties(
        &self,
        appointment_id: Uuid,
        org_id: Uuid,
    ) -> Result<AppointmentWithParties, NotificationError> {
        let appointment = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|appointment| appointment.id == appointment_id && appointment.org_id == org_id)
            .cloned()
            .ok_or_else(|| NotificationError::NotFound("appointment".to_string()))?;

        let patient = self
            .patients
            .lock()
            .unwrap()
            .iter()
            .find(|patient| patient.id == appointment.patient_id)
            .cloned()
            .ok_or_else(|| NotificationError::NotFound("patient".to_string()))?;

        let doctor = appointment.doctor_id.and_then(|doctor_id| {
            self.doctors
                .lock()
                .unwrap()
                .iter()
                .find(|doctor| doctor.id == doctor_id)
                .cloned()
        });

        Ok(AppointmentWithParties {
            appointment,
            patient,
            doctor,
        })
    }
}

#[async_trait]
impl OrgVariableStore for TestBackend {
    async fn get(&self, org_id: Uuid, key: &str) -> Result<Option<String>, NotificationError> {
        Ok(self
            .variables
            .lock()
            .unwrap()
            .get(&(org_id, key.to_string()))
            .cloned())
    }

    async fn set(&self, org_id: Uuid, key: &str, value: &str) -> Result<(), NotificationError> {
        self.set_variable(org_id, key, value);
        Ok(())
    }
}

#[async_trait]
impl NotificationSettingsProvider for TestBackend {
    async fn get_or_create(&self, org_id: Uuid) -> Result<NotificationSettings, NotificationError> {
        if *self.settings_failure.lock().unwrap() == Some(org_id) {
            return Err(NotificationError::Storage(
                "settings backend unavailable".to_string(),
            ));
        }

        let mut settings = self.settings.lock().unwrap();
        Ok(settings
            .entry(org_id)
            .or_insert_with(|| NotificationSettings::default_for(org_id))
            .clone())
    }

    async fn update(
        &self,
        org_id: Uuid,
        mut settings: NotificationSettings,
    ) -> Result<NotificationSettings, NotificationError> {
        settings.org_id = org_id;
        self.settings.lock().unwrap().insert(org_id, settings.clone());
        Ok(settings)
    }
}

#[async_trait]
impl MessageLedger for TestBackend {
    async fn create(&self, message: NewMessage) -> Result<Message, NotificationError> {
        let created = Message {
            id: Uuid::new_v4(),
            org_id: message.org_id,
            patient_id: message.patient_id,
            kind: message.kind,
            content: message.content,
            status: MessageStatus::Pending,
            sent_at: None,
            error: None,
            appointment_id: message.appointment_id,
            timing_in_hours: message.timing_in_hours,
            metadata: message.metadata,
            created_at: Utc::now(),
        };
        self.message_rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        org_id: Uuid,
        status: MessageStatus,
        error: Option<String>,
    ) -> Result<(), NotificationError> {
        let mut rows = self.message_rows.lock().unwrap();
        let message = rows
            .iter_mut()
            .find(|message| message.id == message_id && message.org_id == org_id)
            .ok_or_else(|| NotificationError::NotFound("message".to_string()))?;

        message.status = status;
        if status == MessageStatus::Sent {
            message.sent_at = Some(Utc::now());
        }
        if let Some(error) = error {
            message.error = Some(error);
        }
        Ok(())
    }

    async fn get(&self, message_id: Uuid, org_id: Uuid) -> Result<Message, NotificationError> {
        self.message_rows
            .lock()
            .unwrap()
            .iter()
            .find(|message| message.id == message_id && message.org_id == org_id)
            .cloned()
            .ok_or_else(|| NotificationError::NotFound("message".to_string()))
    }

    async fn find_recent_reminder(
        &self,
        org_id: Uuid,
        appointment_id: Uuid,
        timing_in_hours: i64,
        lookback: Duration,
    ) -> Result<bool, NotificationError> {
        let cutoff = Utc::now() - lookback;
        Ok(self.message_rows.lock().unwrap().iter().any(|message| {
            message.org_id == org_id
                && message.kind == MessageKind::AppointmentReminder
                && message.appointment_id == Some(appointment_id)
                && message.timing_in_hours == Some(timing_in_hours)
                && matches!(message.status, MessageStatus::Sent | MessageStatus::Pending)
                && message.created_at >= cutoff
        }))
    }

    async fn list(
        &self,
        org_id: Uuid,
        patient_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<Message>, NotificationError> {
        let mut rows: Vec<Message> = self
            .message_rows
            .lock()
            .unwrap()
            .iter()
            .filter(|message| {
                message.org_id == org_id
                    && patient_id.map_or(true, |patient_id| message.patient_id == patient_id)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

// ==============================================================================
// STUB GATEWAY
// ==============================================================================

pub struct StubGateway {
    outcome: Mutex<SendOutcome>,
    pub calls: Mutex<Vec<(Uuid, String, String)>>,
}

impl StubGateway {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(SendOutcome::ok()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(SendOutcome::failure(error)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_outcome(&self, outcome: SendOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageGateway for StubGateway {
    async fn send_message(&self, org_id: Uuid, phone_number: &str, text: &str) -> SendOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((org_id, phone_number.to_string(), text.to_string()));
        self.outcome.lock().unwrap().clone()
    }
}

// ==============================================================================
// BUILDERS & WIRING
// ==============================================================================

pub fn org_with_timezone(timezone: Option<&str>) -> Organization {
    Organization {
        id: Uuid::new_v4(),
        name: "Riverside Clinic".to_string(),
        location: "Galway".to_string(),
        timezone: timezone.map(str::to_string),
        is_active: true,
    }
}

pub fn patient_for(org_id: Uuid) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        org_id,
        first_name: "Aoife".to_string(),
        last_name: "Kelly".to_string(),
        mobile_number: "+353 85 123-4567".to_string(),
        follow_up_reason: None,
        follow_up_date: None,
    }
}

pub fn appointment_at(org_id: Uuid, patient_id: Uuid, date: NaiveDate, time: &str) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        org_id,
        patient_id,
        doctor_id: None,
        appointment_date: date,
        start_time: time.to_string(),
        status: AppointmentStatus::Confirmed,
        is_deleted: false,
    }
}

pub fn single_offset_settings(
    org_id: Uuid,
    timing_in_hours: i64,
    enabled: bool,
) -> NotificationSettings {
    NotificationSettings {
        reminder_offsets: vec![ReminderOffset {
            enabled,
            timing_in_hours,
        }],
        ..NotificationSettings::default_for(org_id)
    }
}

pub fn dispatcher(
    backend: &Arc<TestBackend>,
    gateway: Arc<dyn MessageGateway>,
) -> Arc<MessageDispatchService> {
    Arc::new(MessageDispatchService::new(
        &test_config(),
        backend.clone() as Arc<dyn OrganizationDirectory>,
        backend.clone() as Arc<dyn PatientDirectory>,
        backend.clone() as Arc<dyn AppointmentDirectory>,
        backend.clone() as Arc<dyn NotificationSettingsProvider>,
        backend.clone() as Arc<dyn MessageLedger>,
        gateway,
    ))
}

pub fn reminder_scheduler(
    backend: &Arc<TestBackend>,
    gateway: &Arc<StubGateway>,
) -> ReminderSchedulerService {
    reminder_scheduler_with_config(backend, gateway, SchedulerConfig::default())
}

pub fn reminder_scheduler_with_config(
    backend: &Arc<TestBackend>,
    gateway: &Arc<StubGateway>,
    config: SchedulerConfig,
) -> ReminderSchedulerService {
    let dispatcher = dispatcher(backend, gateway.clone() as Arc<dyn MessageGateway>);
    ReminderSchedulerService::new(
        config,
        backend.clone() as Arc<dyn OrganizationDirectory>,
        backend.clone() as Arc<dyn AppointmentDirectory>,
        backend.clone() as Arc<dyn NotificationSettingsProvider>,
        backend.clone() as Arc<dyn MessageLedger>,
        dispatcher,
    )
}
