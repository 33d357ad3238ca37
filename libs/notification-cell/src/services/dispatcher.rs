use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::NotificationError;
use crate::models::{Message, MessageKind, MessageStatus, NewMessage};
use crate::services::directory::{AppointmentDirectory, OrganizationDirectory, PatientDirectory};
use crate::services::gateway::MessageGateway;
use crate::services::ledger::MessageLedger;
use crate::services::settings::NotificationSettingsProvider;
use crate::services::template::{render, vars};

/// Orchestrates one send for one event kind: load context, render content,
/// write a pending ledger row, call the gateway, record the outcome.
///
/// Entity lookups propagate their errors to the caller; gateway failures do
/// not -- they end as a failed ledger row.
pub struct MessageDispatchService {
    organizations: Arc<dyn OrganizationDirectory>,
    patients: Arc<dyn PatientDirectory>,
    appointments: Arc<dyn AppointmentDirectory>,
    settings: Arc<dyn NotificationSettingsProvider>,
    ledger: Arc<dyn MessageLedger>,
    gateway: Arc<dyn MessageGateway>,
    patient_portal_url: String,
}

fn format_money(value: f64) -> String {
    format!("{:.2}", value)
}

impl MessageDispatchService {
    pub fn new(
        config: &AppConfig,
        organizations: Arc<dyn OrganizationDirectory>,
        patients: Arc<dyn PatientDirectory>,
        appointments: Arc<dyn AppointmentDirectory>,
        settings: Arc<dyn NotificationSettingsProvider>,
        ledger: Arc<dyn MessageLedger>,
        gateway: Arc<dyn MessageGateway>,
    ) -> Self {
        Self {
            organizations,
            patients,
            appointments,
            settings,
            ledger,
            gateway,
            patient_portal_url: config.patient_portal_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn dispatch_appointment_reminder(
        &self,
        appointment_id: Uuid,
        org_id: Uuid,
        timing_in_hours: i64,
    ) -> Result<Message, NotificationError> {
        let parties = self.appointments.get_with_parties(appointment_id, org_id).await?;
        let org = self.organizations.get(org_id).await?;
        let settings = self.settings.get_or_create(org_id).await?;

        let doctor_name = parties
            .doctor
            .as_ref()
            .map(|doctor| doctor.display_name())
            .unwrap_or_default();
        let variables = vars(&[
            ("patientName", parties.patient.full_name()),
            ("appointmentDate", parties.appointment.appointment_date.to_string()),
            ("appointmentTime", parties.appointment.start_time.clone()),
            ("doctorName", doctor_name),
            ("clinicName", org.name.clone()),
            ("clinicLocation", org.location.clone()),
        ]);
        let content = render(&settings.templates.appointment_reminder, &variables);

        let mut metadata = serde_json::Map::new();
        metadata.insert("appointment_id".to_string(), json!(appointment_id));
        metadata.insert("timing_in_hours".to_string(), json!(timing_in_hours));

        let message = self
            .ledger
            .create(NewMessage {
                org_id,
                patient_id: parties.patient.id,
                kind: MessageKind::AppointmentReminder,
                content,
                appointment_id: Some(appointment_id),
                timing_in_hours: Some(timing_in_hours),
                metadata,
            })
            .await?;

        self.deliver(message, &parties.patient.mobile_number).await
    }

    pub async fn dispatch_medical_history_link(
        &self,
        patient_id: Uuid,
        org_id: Uuid,
    ) -> Result<Message, NotificationError> {
        let patient = self.patients.get(patient_id, org_id).await?;
        let org = self.organizations.get(org_id).await?;
        let settings = self.settings.get_or_create(org_id).await?;

        let link = format!("{}/medical-history/{}", self.patient_portal_url, patient_id);
        let variables = vars(&[
            ("patientName", patient.full_name()),
            ("medicalHistoryLink", link),
            ("clinicName", org.name.clone()),
            ("clinicLocation", org.location.clone()),
        ]);
        let content = render(&settings.templates.medical_history, &variables);

        let message = self
            .ledger
            .create(NewMessage {
                org_id,
                patient_id,
                kind: MessageKind::MedicalHistory,
                content,
                appointment_id: None,
                timing_in_hours: None,
                metadata: serde_json::Map::new(),
            })
            .await?;

        self.deliver(message, &patient.mobile_number).await
    }

    pub async fn dispatch_payment_receipt(
        &self,
        patient_id: Uuid,
        payment_id: Uuid,
        amount: f64,
        remaining_balance: f64,
        org_id: Uuid,
    ) -> Result<Message, NotificationError> {
        let patient = self.patients.get(patient_id, org_id).await?;
        let org = self.organizations.get(org_id).await?;
        let settings = self.settings.get_or_create(org_id).await?;

        let variables = vars(&[
            ("patientName", patient.full_name()),
            ("amount", format_money(amount)),
            ("remainingBalance", format_money(remaining_balance)),
            ("clinicName", org.name.clone()),
            ("clinicLocation", org.location.clone()),
        ]);
        let content = render(&settings.templates.payment_receipt, &variables);

        let mut metadata = serde_json::Map::new();
        metadata.insert("payment_id".to_string(), json!(payment_id));
        metadata.insert("amount".to_string(), json!(amount));
        metadata.insert("remaining_balance".to_string(), json!(remaining_balance));

        let message = self
            .ledger
            .create(NewMessage {
                org_id,
                patient_id,
                kind: MessageKind::PaymentReceipt,
                content,
                appointment_id: None,
                timing_in_hours: None,
                metadata,
            })
            .await?;

        self.deliver(message, &patient.mobile_number).await
    }

    pub async fn dispatch_follow_up(
        &self,
        patient_id: Uuid,
        org_id: Uuid,
    ) -> Result<Message, NotificationError> {
        let patient = self.patients.get(patient_id, org_id).await?;
        let org = self.organizations.get(org_id).await?;
        let settings = self.settings.get_or_create(org_id).await?;

        let follow_up_reason = patient.follow_up_reason.clone().unwrap_or_default();
        let variables = vars(&[
            ("patientName", patient.full_name()),
            ("followUpReason", follow_up_reason.clone()),
            ("clinicName", org.name.clone()),
            ("clinicLocation", org.location.clone()),
        ]);
        let content = render(&settings.templates.follow_up, &variables);

        let mut metadata = serde_json::Map::new();
        metadata.insert("follow_up_reason".to_string(), json!(follow_up_reason));
        metadata.insert("follow_up_date".to_string(), json!(patient.follow_up_date));

        let message = self
            .ledger
            .create(NewMessage {
                org_id,
                patient_id,
                kind: MessageKind::FollowUp,
                content,
                appointment_id: None,
                timing_in_hours: None,
                metadata,
            })
            .await?;

        self.deliver(message, &patient.mobile_number).await
    }

    pub async fn dispatch_payment_overdue(
        &self,
        patient_id: Uuid,
        amount_due: f64,
        org_id: Uuid,
    ) -> Result<Message, NotificationError> {
        let patient = self.patients.get(patient_id, org_id).await?;
        let org = self.organizations.get(org_id).await?;
        let settings = self.settings.get_or_create(org_id).await?;

        let variables = vars(&[
            ("patientName", patient.full_name()),
            ("amountDue", format_money(amount_due)),
            ("clinicName", org.name.clone()),
            ("clinicLocation", org.location.clone()),
        ]);
        let content = render(&settings.templates.payment_overdue, &variables);

        let mut metadata = serde_json::Map::new();
        metadata.insert("amount_due".to_string(), json!(amount_due));

        let message = self
            .ledger
            .create(NewMessage {
                org_id,
                patient_id,
                kind: MessageKind::PaymentOverdue,
                content,
                appointment_id: None,
                timing_in_hours: None,
                metadata,
            })
            .await?;

        self.deliver(message, &patient.mobile_number).await
    }

    /// Re-send the stored content verbatim -- no re-render. Only status,
    /// sent_at and error change.
    pub async fn resend(
        &self,
        message_id: Uuid,
        org_id: Uuid,
    ) -> Result<Message, NotificationError> {
        let message = self.ledger.get(message_id, org_id).await?;
        let patient = self.patients.get(message.patient_id, org_id).await?;

        info!("Resending message {} for org {}", message_id, org_id);
        self.deliver(message, &patient.mobile_number).await
    }

    /// The gateway leg shared by every entry point: send, record the outcome
    /// on the ledger row, return the updated row.
    async fn deliver(
        &self,
        message: Message,
        phone_number: &str,
    ) -> Result<Message, NotificationError> {
        let outcome = self
            .gateway
            .send_message(message.org_id, phone_number, &message.content)
            .await;

        let (status, error) = if outcome.success {
            (MessageStatus::Sent, None)
        } else {
            (MessageStatus::Failed, outcome.error)
        };
        if let Some(ref error) = error {
            warn!("Message {} failed to send: {}", message.id, error);
        }

        self.ledger
            .update_status(message.id, message.org_id, status, error)
            .await?;
        self.ledger.get(message.id, message.org_id).await
    }
}
