use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use passport_desk::config::AppConfig;
use passport_desk::error::AppError;
use passport_desk::telemetry;
use passport_desk::workflows::renewal::{
    renewal_router, Actor, ApplicationStatus, InvoiceDraft, InvoiceLineItem, InvoiceType,
    KycStatus, MemoryStore, PaymentDraft, PaymentMethod, RecordingDispatcher, RenewalApi, Role,
    ServiceType, WorkflowEngine,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Passport Desk",
    about = "Run the passport renewal case-management service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one renewal through the happy path against an in-memory store
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(RecordingDispatcher::default());
    let engine = Arc::new(WorkflowEngine::new(store, notifier));
    let api = Arc::new(RenewalApi::new(engine));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(renewal_router(api))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(environment = ?config.environment, %addr, "passport desk ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Drive one renewal from intake to payment confirmation, printing each hop.
fn run_demo() -> Result<(), AppError> {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(RecordingDispatcher::default());
    let engine = Arc::new(WorkflowEngine::new(store.clone(), notifier.clone()));
    let api = RenewalApi::new(engine.clone());

    let client = Actor::new("client-demo", Role::Client);
    let processor = Actor::new("staff-processing", Role::ProcessingTeam);
    let finance = Actor::new("staff-finance", Role::Finance);
    store.register_staff(&finance);

    println!("Passport renewal workflow demo");

    let application = engine.open_application(&client, ServiceType::Normal, None)?;
    println!(
        "- opened {} ({}) at {}",
        application.reference_number, application.id.0, application.status
    );

    let kyc = engine.apply_kyc_result(&application.id, KycStatus::Clear, None, &processor)?;
    println!(
        "- KYC cleared, status now {} (auto-advanced: {})",
        kyc.application.status,
        kyc.transition.is_some()
    );

    let invoice = api.billing.create_invoice(
        InvoiceDraft {
            application_id: application.id.clone(),
            invoice_type: InvoiceType::Client,
            issued_to: client.id.clone(),
            description: "Passport renewal service fee".to_string(),
            currency: "USD".to_string(),
            amount_cents: 15_000,
            line_items: vec![InvoiceLineItem {
                description: "Renewal processing".to_string(),
                quantity: 1,
                unit_price_cents: 15_000,
                total_cents: 15_000,
            }],
            due_date: None,
        },
        &processor,
    )?;
    let sent = api.billing.send_invoice(&invoice.id, &processor)?;
    println!(
        "- invoice {} sent, application at {}",
        sent.invoice.invoice_number,
        sent.transition
            .as_ref()
            .map(|outcome| outcome.to)
            .unwrap_or(ApplicationStatus::InvoiceSent)
    );

    let submitted = api.billing.submit_payment(
        PaymentDraft {
            invoice_id: invoice.id.clone(),
            amount_cents: 15_000,
            method: PaymentMethod::BankTransfer,
            transaction_reference: Some("TXN-0001".to_string()),
            proof_file_path: None,
        },
        &client,
    )?;
    println!("- payment {} submitted", submitted.payment.id.0);

    let confirmed = api.billing.confirm_payment(&submitted.payment.id, &finance)?;
    println!(
        "- payment confirmed, invoice {:?}, application at {}",
        confirmed.invoice.status, confirmed.transition.to
    );

    println!("\nNotifications delivered");
    for notification in notifier.sent() {
        println!(
            "- to {}: {} ({:?})",
            notification.recipient_id.0, notification.title, notification.kind
        );
    }

    println!("\nAudit journal");
    for entry in store.audit_entries() {
        println!("- {} {} {}", entry.actor_id.0, entry.action, entry.resource_id);
    }

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
