// libs/notification-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// TENANT & DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    /// IANA zone name. Unset or unparseable resolves to UTC.
    pub timezone: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub org_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: String,
    pub follow_up_reason: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl Doctor {
    pub fn display_name(&self) -> String {
        format!("Dr. {} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    /// Wall-clock "HH:MM" in the organization's zone; carries no offset.
    pub start_time: String,
    pub status: AppointmentStatus,
    pub is_deleted: bool,
}

impl Appointment {
    pub fn wall_clock_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.start_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.start_time, "%H:%M:%S"))
            .ok()
    }

    /// Resolve the stored (date, time-of-day) pair to an absolute instant in
    /// the given zone. Ambiguous local times (DST fall-back) take the earlier
    /// offset; nonexistent local times (spring-forward gap) resolve to None.
    pub fn instant_in(&self, zone: Tz) -> Option<DateTime<Utc>> {
        let time = self.wall_clock_time()?;
        zone.from_local_datetime(&self.appointment_date.and_time(time))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An appointment with its patient (always present) and doctor (when one is
/// assigned) resolved, as returned by the by-id directory fetch.
#[derive(Debug, Clone)]
pub struct AppointmentWithParties {
    pub appointment: Appointment,
    pub patient: Patient,
    pub doctor: Option<Doctor>,
}

// ==============================================================================
// MESSAGE LEDGER MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    MedicalHistory,
    PaymentReceipt,
    AppointmentReminder,
    FollowUp,
    PaymentOverdue,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::MedicalHistory => write!(f, "medical-history"),
            MessageKind::PaymentReceipt => write!(f, "payment-receipt"),
            MessageKind::AppointmentReminder => write!(f, "appointment-reminder"),
            MessageKind::FollowUp => write!(f, "follow-up"),
            MessageKind::PaymentOverdue => write!(f, "payment-overdue"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One outbound notification and its delivery outcome. Rows are created
/// pending, mutated only by status updates, and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub org_id: Uuid,
    pub patient_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub status: MessageStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Typed reminder-correlation columns backing the dedup query.
    pub appointment_id: Option<Uuid>,
    pub timing_in_hours: Option<i64>,
    /// Free-form correlation bag kept for audit only.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub org_id: Uuid,
    pub patient_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub appointment_id: Option<Uuid>,
    pub timing_in_hours: Option<i64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Result of one gateway send attempt. Expected failures are values here,
/// never errors.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

// ==============================================================================
// NOTIFICATION SETTINGS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderOffset {
    pub enabled: bool,
    pub timing_in_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageTemplates {
    pub medical_history: String,
    pub payment_receipt: String,
    pub appointment_reminder: String,
    pub follow_up: String,
    pub payment_overdue: String,
}

impl MessageTemplates {
    pub fn for_kind(&self, kind: MessageKind) -> &str {
        match kind {
            MessageKind::MedicalHistory => &self.medical_history,
            MessageKind::PaymentReceipt => &self.payment_receipt,
            MessageKind::AppointmentReminder => &self.appointment_reminder,
            MessageKind::FollowUp => &self.follow_up,
            MessageKind::PaymentOverdue => &self.payment_overdue,
        }
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            medical_history: "Hello {{patientName}}, you can review your medical history here: \
                {{medicalHistoryLink}} - {{clinicName}}, {{clinicLocation}}"
                .to_string(),
            payment_receipt: "Hello {{patientName}}, we received your payment of {{amount}}. \
                Your remaining balance is {{remainingBalance}}. Thank you! {{clinicName}}, {{clinicLocation}}"
                .to_string(),
            appointment_reminder: "Hello {{patientName}}, this is a reminder for your appointment \
                on {{appointmentDate}} at {{appointmentTime}} with {{doctorName}}. \
                See you at {{clinicName}}, {{clinicLocation}}."
                .to_string(),
            follow_up: "Hello {{patientName}}, this is {{clinicName}} checking in about \
                {{followUpReason}}. Please contact us to book your follow-up visit. \
                {{clinicName}}, {{clinicLocation}}"
                .to_string(),
            payment_overdue: "Hello {{patientName}}, you have an outstanding balance of \
                {{amountDue}} with {{clinicName}}. Please settle it at your earliest convenience. \
                {{clinicName}}, {{clinicLocation}}"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSettings {
    pub org_id: Uuid,
    pub reminder_offsets: Vec<ReminderOffset>,
    pub templates: MessageTemplates,
}

impl NotificationSettings {
    /// Defaults persisted on first access: a day-before and an hour-before
    /// reminder, both enabled, plus the stock templates.
    pub fn default_for(org_id: Uuid) -> Self {
        Self {
            org_id,
            reminder_offsets: vec![
                ReminderOffset {
                    enabled: true,
                    timing_in_hours: 24,
                },
                ReminderOffset {
                    enabled: true,
                    timing_in_hours: 1,
                },
            ],
            templates: MessageTemplates::default(),
        }
    }
}

// ==============================================================================
// SCHEDULER CONFIG
// ==============================================================================

/// Tuning knobs for the reminder scheduler.
///
/// Invariant: `dedup_lookback_hours` must cover at least two tick intervals,
/// otherwise a reminder attempted near the end of one lookback span could be
/// re-attempted by the next tick. The defaults (2h vs 300s) keep a wide margin.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval_seconds: u64,
    pub match_window_minutes: i64,
    pub dedup_lookback_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 300,
            match_window_minutes: 5,
            dedup_lookback_hours: 2,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistoryDispatchRequest {
    pub patient_id: Uuid,
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceiptDispatchRequest {
    pub patient_id: Uuid,
    pub payment_id: Uuid,
    pub amount: f64,
    pub remaining_balance: f64,
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpDispatchRequest {
    pub patient_id: Uuid,
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOverdueDispatchRequest {
    pub patient_id: Uuid,
    pub amount_due: f64,
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendRequest {
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageListQuery {
    pub org_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_carry_two_enabled_offsets_and_five_templates() {
        let settings = NotificationSettings::default_for(Uuid::new_v4());

        assert_eq!(settings.reminder_offsets.len(), 2);
        assert!(settings.reminder_offsets.iter().all(|o| o.enabled));
        assert_eq!(settings.reminder_offsets[0].timing_in_hours, 24);
        assert_eq!(settings.reminder_offsets[1].timing_in_hours, 1);

        let templates = &settings.templates;
        assert!(templates.appointment_reminder.contains("{{appointmentDate}}"));
        assert!(templates.appointment_reminder.contains("{{appointmentTime}}"));
        assert!(templates.appointment_reminder.contains("{{doctorName}}"));
        assert!(templates.medical_history.contains("{{medicalHistoryLink}}"));
        assert!(templates.payment_receipt.contains("{{remainingBalance}}"));
        assert!(templates.follow_up.contains("{{followUpReason}}"));
        assert!(templates.payment_overdue.contains("{{amountDue}}"));
    }

    #[test]
    fn message_kind_serializes_as_kebab_case() {
        let value = serde_json::to_value(MessageKind::AppointmentReminder).unwrap();
        assert_eq!(value, serde_json::json!("appointment-reminder"));
        assert_eq!(MessageKind::AppointmentReminder.to_string(), "appointment-reminder");
    }

    #[test]
    fn wall_clock_resolves_in_zone() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: None,
            appointment_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: "09:00".to_string(),
            status: AppointmentStatus::Confirmed,
            is_deleted: false,
        };

        // 09:00 New York wall clock is 13:00 UTC once DST has started.
        let instant = appointment.instant_in(chrono_tz::America::New_York).unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap());

        let utc_instant = appointment.instant_in(chrono_tz::Tz::UTC).unwrap();
        assert_eq!(utc_instant, Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());
    }

    #[test]
    fn nonexistent_local_time_resolves_to_none() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: None,
            // 02:30 does not exist on the US spring-forward date.
            appointment_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            start_time: "02:30".to_string(),
            status: AppointmentStatus::Confirmed,
            is_deleted: false,
        };

        assert!(appointment.instant_in(chrono_tz::America::New_York).is_none());
    }

    #[test]
    fn unparseable_start_time_resolves_to_none() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: None,
            appointment_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: "soonish".to_string(),
            status: AppointmentStatus::Confirmed,
            is_deleted: false,
        };

        assert!(appointment.instant_in(chrono_tz::Tz::UTC).is_none());
    }
}
