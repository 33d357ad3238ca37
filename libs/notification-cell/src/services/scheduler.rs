use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::error::NotificationError;
use crate::models::{Appointment, Organization, SchedulerConfig};
use crate::services::directory::{AppointmentDirectory, OrganizationDirectory};
use crate::services::dispatcher::MessageDispatchService;
use crate::services::ledger::MessageLedger;
use crate::services::settings::NotificationSettingsProvider;

/// Parse an IANA zone name, defaulting to UTC when unset or unrecognized.
pub fn resolve_timezone(name: Option<&str>) -> Tz {
    match name {
        Some(name) if !name.is_empty() => name.parse().unwrap_or_else(|_| {
            warn!("Unrecognized timezone {:?}, falling back to UTC", name);
            Tz::UTC
        }),
        _ => Tz::UTC,
    }
}

/// The periodic reminder driver. Each tick walks every active organization,
/// computes the match window for each enabled reminder offset, dedups against
/// the message ledger and hands matches to the dispatcher.
///
/// Per (appointment, offset) pair a reminder moves pending -> sent | failed;
/// the scheduler never retries a failed send -- only a manual resend does.
pub struct ReminderSchedulerService {
    config: SchedulerConfig,
    organizations: Arc<dyn OrganizationDirectory>,
    appointments: Arc<dyn AppointmentDirectory>,
    settings: Arc<dyn NotificationSettingsProvider>,
    ledger: Arc<dyn MessageLedger>,
    dispatcher: Arc<MessageDispatchService>,
    tick_guard: Mutex<()>,
    is_shutdown: RwLock<bool>,
}

impl ReminderSchedulerService {
    pub fn new(
        config: SchedulerConfig,
        organizations: Arc<dyn OrganizationDirectory>,
        appointments: Arc<dyn AppointmentDirectory>,
        settings: Arc<dyn NotificationSettingsProvider>,
        ledger: Arc<dyn MessageLedger>,
        dispatcher: Arc<MessageDispatchService>,
    ) -> Self {
        Self {
            config,
            organizations,
            appointments,
            settings,
            ledger,
            dispatcher,
            tick_guard: Mutex::new(()),
            is_shutdown: RwLock::new(false),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&self) {
        info!(
            "Starting reminder scheduler (tick every {}s)",
            self.config.tick_interval_seconds
        );
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            self.config.tick_interval_seconds,
        ));

        loop {
            interval.tick().await;

            if *self.is_shutdown.read().await {
                info!("Reminder scheduler shutting down");
                break;
            }

            // A tick that outlives the interval must not overlap the next one.
            let Ok(_guard) = self.tick_guard.try_lock() else {
                warn!("Previous reminder tick still running, skipping this tick");
                continue;
            };
            self.run_tick(Utc::now()).await;
        }
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
    }

    /// One scan over all active organizations. Takes `now` explicitly so the
    /// window arithmetic is reproducible; outcomes are observed through the
    /// ledger and logs, not a return value.
    pub async fn run_tick(&self, now: DateTime<Utc>) {
        debug!("Reminder tick at {}", now);

        let organizations = match self.organizations.list_active().await {
            Ok(organizations) => organizations,
            Err(e) => {
                error!("Failed to load active organizations: {}", e);
                return;
            }
        };

        for org in organizations {
            // One tenant's failure must not block the others.
            if let Err(e) = self.process_organization(&org, now).await {
                error!("Reminder pass failed for org {}: {}", org.id, e);
            }
        }
    }

    async fn process_organization(
        &self,
        org: &Organization,
        now: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        let settings = self.settings.get_or_create(org.id).await?;
        let zone = resolve_timezone(org.timezone.as_deref());
        let half_window = Duration::minutes(self.config.match_window_minutes);
        let lookback = Duration::hours(self.config.dedup_lookback_hours);

        for offset in settings.reminder_offsets.iter().filter(|o| o.enabled) {
            let target = now + Duration::hours(offset.timing_in_hours);
            let window_start = target - half_window;
            let window_end = target + half_window;

            let matches = self
                .appointments
                .find_in_window(org.id, zone, window_start, window_end)
                .await?;
            debug!(
                "Org {}: {} appointment(s) in the {}h window",
                org.id,
                matches.len(),
                offset.timing_in_hours
            );

            for appointment in matches {
                // A bad appointment must not abort the org's batch.
                if let Err(e) = self
                    .remind(org, &appointment, offset.timing_in_hours, lookback)
                    .await
                {
                    error!(
                        "Reminder failed for appointment {} in org {}: {}",
                        appointment.id, org.id, e
                    );
                }
            }
        }

        Ok(())
    }

    async fn remind(
        &self,
        org: &Organization,
        appointment: &Appointment,
        timing_in_hours: i64,
        lookback: Duration,
    ) -> Result<(), NotificationError> {
        let already_attempted = self
            .ledger
            .find_recent_reminder(org.id, appointment.id, timing_in_hours, lookback)
            .await?;
        if already_attempted {
            debug!(
                "Reminder for appointment {} at {}h already attempted, skipping",
                appointment.id, timing_in_hours
            );
            return Ok(());
        }

        let message = self
            .dispatcher
            .dispatch_appointment_reminder(appointment.id, org.id, timing_in_hours)
            .await?;
        info!(
            "Reminder for appointment {} at {}h dispatched as message {} ({})",
            appointment.id, timing_in_hours, message.id, message.status
        );
        Ok(())
    }
}
