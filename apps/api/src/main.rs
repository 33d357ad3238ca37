use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use notification_cell::handlers::NotificationState;
use notification_cell::models::SchedulerConfig;
use notification_cell::services::directory::{
    AppointmentDirectory, OrganizationDirectory, OrgVariableStore, PatientDirectory,
    SupabaseAppointmentDirectory, SupabaseOrganizationDirectory, SupabasePatientDirectory,
    SupabaseVariableStore,
};
use notification_cell::services::dispatcher::MessageDispatchService;
use notification_cell::services::gateway::{HttpGatewayClient, MessageGateway};
use notification_cell::services::ledger::{MessageLedger, SupabaseMessageLedger};
use notification_cell::services::scheduler::ReminderSchedulerService;
use notification_cell::services::settings::{NotificationSettingsProvider, SupabaseSettingsProvider};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Medora Clinic notification server");

    // Load configuration and build the service graph
    let config = AppConfig::from_env();
    let supabase = Arc::new(SupabaseClient::new(&config));

    let organizations: Arc<dyn OrganizationDirectory> =
        Arc::new(SupabaseOrganizationDirectory::new(Arc::clone(&supabase)));
    let patients: Arc<dyn PatientDirectory> =
        Arc::new(SupabasePatientDirectory::new(Arc::clone(&supabase)));
    let appointments: Arc<dyn AppointmentDirectory> =
        Arc::new(SupabaseAppointmentDirectory::new(Arc::clone(&supabase)));
    let variables: Arc<dyn OrgVariableStore> =
        Arc::new(SupabaseVariableStore::new(Arc::clone(&supabase)));
    let ledger: Arc<dyn MessageLedger> =
        Arc::new(SupabaseMessageLedger::new(Arc::clone(&supabase)));
    let settings: Arc<dyn NotificationSettingsProvider> =
        Arc::new(SupabaseSettingsProvider::new(Arc::clone(&supabase)));
    let gateway: Arc<dyn MessageGateway> =
        Arc::new(HttpGatewayClient::new(&config, Arc::clone(&variables)));

    let dispatcher = Arc::new(MessageDispatchService::new(
        &config,
        Arc::clone(&organizations),
        Arc::clone(&patients),
        Arc::clone(&appointments),
        Arc::clone(&settings),
        Arc::clone(&ledger),
        gateway,
    ));

    // The reminder scheduler self-triggers on its own timer
    let scheduler = Arc::new(ReminderSchedulerService::new(
        SchedulerConfig::default(),
        Arc::clone(&organizations),
        Arc::clone(&appointments),
        Arc::clone(&settings),
        Arc::clone(&ledger),
        Arc::clone(&dispatcher),
    ));
    tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.start().await }
    });

    let state = NotificationState {
        dispatcher,
        settings,
        ledger,
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
