//! hearing-sync - Hearing lifecycle synchronization engine

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearing_sync::auth::StaticTokenProvider;
use hearing_sync::config::Args;
use hearing_sync::dispatch::{subscriber, DispatchConfig, DispatchPool, NotificationProcessor};
use hearing_sync::merge::HearingDetailMerge;
use hearing_sync::refdata::{
    HttpJudicialReference, HttpVenueDirectory, InMemoryJudicialReference, InMemoryVenueDirectory,
    JudicialReference, RefDataClientConfig, VenueDirectory,
};
use hearing_sync::resolve::StatusResolver;
use hearing_sync::sched::{
    HttpSchedulingService, HttpSchedulingServiceConfig, InMemorySchedulingService,
    SchedulingService,
};
use hearing_sync::store::{
    CaseRecordStore, CaseUpdateProtocol, HttpRecordStore, HttpRecordStoreConfig,
    InMemoryRecordStore, ProtocolConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hearing_sync={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  hearing-sync");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Service code: {}", args.service_code);
    info!("Record store: {}", args.record_store_url);
    info!("Scheduling service: {}", args.scheduling_url);
    info!("Venue directory: {}", args.venue_api_url);
    info!("Judicial reference: {}", args.judicial_api_url);
    info!("NATS: {} (subject {})", args.nats.nats_url, args.nats.nats_subject);
    info!("Workers: {}", args.worker_count);
    info!("Local timezone: {}", args.local_timezone);
    info!("======================================");

    if args.dev_mode {
        let store = Arc::new(InMemoryRecordStore::new());
        let sched: Arc<dyn SchedulingService> = Arc::new(InMemorySchedulingService::new());
        let venues: Arc<dyn VenueDirectory> = Arc::new(InMemoryVenueDirectory::new());
        let judicial: Arc<dyn JudicialReference> = Arc::new(InMemoryJudicialReference::new());
        info!("Using in-memory collaborators (dev mode)");
        run(args, store, sched, venues, judicial).await
    } else {
        let token = args.service_token.clone().unwrap_or_default();
        let identity = Arc::new(StaticTokenProvider::new(token));
        let timeout = Duration::from_millis(args.request_timeout_ms);

        let store = Arc::new(HttpRecordStore::new(
            HttpRecordStoreConfig {
                base_url: args.record_store_url.clone(),
                timeout,
            },
            identity.clone(),
        )?);
        let sched: Arc<dyn SchedulingService> = Arc::new(HttpSchedulingService::new(
            HttpSchedulingServiceConfig {
                base_url: args.scheduling_url.clone(),
                timeout,
            },
            identity.clone(),
        )?);
        let venues: Arc<dyn VenueDirectory> = Arc::new(HttpVenueDirectory::new(
            RefDataClientConfig::new(args.venue_api_url.clone(), timeout),
            identity.clone(),
        )?);
        let judicial: Arc<dyn JudicialReference> = Arc::new(HttpJudicialReference::new(
            RefDataClientConfig::new(args.judicial_api_url.clone(), timeout),
            identity,
        )?);
        run(args, store, sched, venues, judicial).await
    }
}

/// Wire the pipeline and run until shutdown: resolver over the
/// collaborators, update protocol over the store, dispatch pool fed by the
/// NATS subscription.
async fn run<S: CaseRecordStore + 'static>(
    args: Args,
    store: Arc<S>,
    sched: Arc<dyn SchedulingService>,
    venues: Arc<dyn VenueDirectory>,
    judicial: Arc<dyn JudicialReference>,
) -> anyhow::Result<()> {
    let merge = HearingDetailMerge::new(
        venues,
        judicial,
        args.local_tz(),
        args.panel_composition_enabled,
    );
    let resolver = StatusResolver::new(sched, merge);
    let protocol = CaseUpdateProtocol::with_config(
        store,
        ProtocolConfig {
            max_attempts: args.commit_max_attempts,
            backoff: Duration::from_millis(args.commit_backoff_ms),
        },
    );
    let processor = Arc::new(NotificationProcessor::new(resolver, protocol));

    let pool = DispatchPool::new(
        DispatchConfig {
            worker_count: args.worker_count,
            max_queue_size: args.max_queue_size,
        },
        processor,
    );

    let nats_client =
        subscriber::connect(&args.nats, &format!("hearing-sync-{}", args.node_id)).await?;

    let subject = args.nats.nats_subject.clone();
    let service_code = args.service_code.clone();
    let subscription = tokio::spawn(async move {
        if let Err(e) = subscriber::run(nats_client, subject, service_code, pool).await {
            error!("Notification subscription failed: {}", e);
        }
    });

    info!("hearing-sync started");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping");
    subscription.abort();

    Ok(())
}
