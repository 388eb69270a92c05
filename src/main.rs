use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use export_casework::casework::domain::{
    Capability, CaseId, CaseType, CaseworkActor, FlagId, GoodId, OrganisationId, PartyId, RuleId,
    Team,
};
use export_casework::casework::case::{Case, GoodOnCase, GoodStatus, OrganisationOnCase, PartyOnCase};
use export_casework::casework::flags::{Flag, FlagLevel, FlagStatus, FlaggingRule};
use export_casework::casework::memory::{MemoryCaseRepository, MemoryFlagRegistry, RecordingAuditSink};
use export_casework::casework::refdata::RefDataSet;
use export_casework::casework::router::casework_router;
use export_casework::casework::service::CaseworkService;
use export_casework::config::AppConfig;
use export_casework::error::AppError;
use export_casework::telemetry;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::info;

#[derive(Clone)]
struct ProbeState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Export Casework Service",
    about = "Run the export-licence casework engine from the command line",
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
    /// Seed an in-memory service, run the flagging rules over a sample
    /// case, and print the aggregated flag view
    Demo(DemoArgs),
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

#[derive(Args, Debug)]
struct DemoArgs {
    /// Team whose flags should sort first in the view
    #[arg(long, default_value = "enforcement")]
    team: String,
    /// Emit the view as JSON instead of a table
    #[arg(long)]
    json: bool,
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
        Command::Demo(args) => run_demo(args),
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

    telemetry::init(&config.telemetry, config.environment)?;

    let service = Arc::new(CaseworkService::new(
        Arc::new(MemoryCaseRepository::default()),
        Arc::new(MemoryFlagRegistry::default()),
        Arc::new(RecordingAuditSink::default()),
        config.casework.finalising_team.clone(),
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = ProbeState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(casework_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "casework service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

const COUNTRIES_CSV: &str = "\
Code,Name
FR,France
DE,Germany
SY,Syria
";

const CONTROL_LIST_CSV: &str = "\
Rating,Text
ML1a,Smooth-bore weapons with a calibre of less than 20mm
ML4b,Equipment for the handling of explosive devices
ML10a,Combat aircraft
";

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let refdata = RefDataSet::from_readers(COUNTRIES_CSV.as_bytes(), CONTROL_LIST_CSV.as_bytes())?;
    let team = Team(args.team);
    let finalising_team = Team("licensing-unit".to_string());

    let service = CaseworkService::new(
        Arc::new(MemoryCaseRepository::default()),
        Arc::new(MemoryFlagRegistry::default()),
        Arc::new(RecordingAuditSink::default()),
        finalising_team,
    );

    let admin = CaseworkActor {
        id: "demo-admin".to_string(),
        team: team.clone(),
        capabilities: BTreeSet::from([
            Capability::ManageFlaggingRules,
            Capability::ActivateFlags,
        ]),
    };

    seed_flags_and_rules(&service, &admin, &team)?;

    let case = sample_case();
    let case_id = case.id.clone();
    service.register_case(case)?;
    service.submit_case(&case_id, &admin)?;

    let flags = service.ordered_flags(&case_id, &team, None, true)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json!({ "flags": flags }))?);
        return Ok(());
    }

    println!("Aggregated flags for case {} (team {}):", case_id.0, team);
    for flag in &flags {
        let mine = if flag.my_team { "*" } else { " " };
        println!(
            " {mine} [{:12}] p{:<3} {} ({})",
            format!("{:?}", flag.source).to_lowercase(),
            flag.priority,
            flag.name,
            flag.team,
        );
    }
    if flags.is_empty() {
        println!("  (none)");
    }

    let syria = refdata.country_name("SY").unwrap_or("SY");
    println!("\nDestination rules in the seed match {syria} and France.");
    Ok(())
}

fn seed_flags_and_rules(
    service: &CaseworkService<MemoryCaseRepository, MemoryFlagRegistry, RecordingAuditSink>,
    admin: &CaseworkActor,
    team: &Team,
) -> Result<(), AppError> {
    let flags = [
        ("flag-siel", "Standard licence review", FlagLevel::Case, 5),
        ("flag-ml1a", "Small arms", FlagLevel::Good, 1),
        ("flag-sy", "Sanctioned destination", FlagLevel::Destination, 0),
    ];

    for (id, name, level, priority) in flags {
        service.create_flag(
            admin,
            Flag {
                id: FlagId(id.to_string()),
                name: name.to_string(),
                level,
                status: FlagStatus::Active,
                priority,
                team: team.clone(),
                label: None,
                colour: Some("red".to_string()),
                blocks_finalising: level == FlagLevel::Destination,
                removable_by: None,
            },
        )?;
    }

    let rules = [
        ("rule-siel", FlagLevel::Case, "flag-siel", "SIEL", None),
        ("rule-ml1a", FlagLevel::Good, "flag-ml1a", "ML1a", Some(false)),
        ("rule-sy", FlagLevel::Destination, "flag-sy", "SY", None),
    ];

    for (id, level, flag, value, verified_goods_only) in rules {
        service.create_rule(
            admin,
            FlaggingRule {
                id: RuleId(id.to_string()),
                team: team.clone(),
                level,
                flag: FlagId(flag.to_string()),
                status: FlagStatus::Active,
                matching_values: BTreeSet::from([value.to_string()]),
                verified_goods_only,
            },
        )?;
    }

    Ok(())
}

fn sample_case() -> Case {
    let mut case = Case::new(
        CaseId("case-demo-1".to_string()),
        "GBSIEL/2026/0000001/P",
        CaseType::STANDARD,
        OrganisationOnCase {
            id: OrganisationId("org-1".to_string()),
            name: "Example Exports Ltd".to_string(),
            flags: BTreeSet::new(),
        },
    );

    case.goods.push(GoodOnCase {
        id: GoodId("good-1".to_string()),
        ratings: BTreeSet::from(["ML1a".to_string()]),
        status: GoodStatus::Verified,
        flags: BTreeSet::new(),
    });
    case.parties.push(PartyOnCase {
        id: PartyId("party-1".to_string()),
        country: "SY".to_string(),
        flags: BTreeSet::new(),
        deleted_at: None,
    });

    case
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<ProbeState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "ready": ready })))
}

async fn metrics_endpoint(State(state): State<ProbeState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
