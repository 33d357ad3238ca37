pub mod directory;
pub mod dispatcher;
pub mod gateway;
pub mod ledger;
pub mod scheduler;
pub mod settings;
pub mod template;

pub use directory::*;
pub use dispatcher::MessageDispatchService;
pub use gateway::{HttpGatewayClient, MessageGateway, GATEWAY_API_KEY_VAR, GATEWAY_URL_VAR};
pub use ledger::{MessageLedger, SupabaseMessageLedger};
pub use scheduler::{resolve_timezone, ReminderSchedulerService};
pub use settings::{NotificationSettingsProvider, SupabaseSettingsProvider};
pub use template::{render, vars, TemplateVars};
