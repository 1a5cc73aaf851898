use std::{future::ready, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use common_kafka::kafka_consumer::RecvErr;
use common_metrics::{serve, setup_metrics_routes};
use sift::{
    app_context::AppContext,
    batch::BatchAccumulator,
    config::Config,
    dead_letters, flush_dead_letters, flush_events, handle_outcome,
    metrics_consts::{EMPTY_EVENTS, EVENTS_RECEIVED, MAIN_LOOP_TIME},
    process_event,
};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

pub async fn index() -> &'static str {
    "event stream processing service"
}

fn start_health_liveness_server(config: &Config, context: Arc<AppContext>) -> JoinHandle<()> {
    let config = config.clone();
    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route(
            "/_liveness",
            get(move || ready(context.health_registry.get_status())),
        );
    let router = setup_metrics_routes(router);
    let bind = format!("{}:{}", config.host, config.port);
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving metrics");
    })
}

#[tokio::main]
async fn main() {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_with_defaults().expect("failed to load configuration");
    let context = Arc::new(
        AppContext::new(&config)
            .await
            .expect("failed to create app context"),
    );

    start_health_liveness_server(&config, context.clone());

    if let Some(consumer) = context.dead_letter_consumer.clone() {
        let drain_context = context.clone();
        tokio::spawn(async move {
            if let Err(e) = dead_letters::run_loop(drain_context, consumer).await {
                error!("dead letter drain loop exited: {:?}", e);
                panic!("dead letter drain loop exited: {:?}", e);
            }
        });
    }

    let batch_window = Duration::from_secs(config.batch_window_seconds);
    let recv_wait = Duration::from_millis(config.next_event_wait_ms);
    let mut events = BatchAccumulator::new(config.batch_size, batch_window);
    let mut dead = BatchAccumulator::new(config.batch_size, batch_window);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let whole_loop = common_metrics::timing_guard(MAIN_LOOP_TIME, &[]);
        context.worker_liveness.report_healthy();

        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, draining");
                break;
            }
            // Returns at the timeout even when the topic is idle, so
            // flush windows are checked either way
            received = context.consumer.recv_batch(config.batch_size, recv_wait) => {
                for message in received {
                    let (payload, offset) = match message {
                        Ok(r) => r,
                        Err(RecvErr::Empty) => {
                            metrics::counter!(EMPTY_EVENTS, &[("topic", "events")]).increment(1);
                            continue;
                        }
                        Err(RecvErr::Kafka(e)) => {
                            // Broker connection is gone, fall over and restart
                            panic!("kafka error: {}", e)
                        }
                    };

                    metrics::counter!(EVENTS_RECEIVED).increment(1);
                    let outcome = process_event(&context.registry, &payload, &*context.time);
                    handle_outcome(&context, outcome, &mut events, &mut dead).await;
                    offset.store().expect("failed to store offset");
                }
            }
        }

        if let Some(batch) = events.take_expired() {
            flush_events(&context, batch, &mut dead).await;
        }
        if let Some(batch) = dead.take_expired() {
            flush_dead_letters(&context, batch).await;
        }

        whole_loop.label("outcome", "success").fin();
    }

    if let Some(batch) = events.drain() {
        flush_events(&context, batch, &mut dead).await;
    }
    if let Some(batch) = dead.drain() {
        flush_dead_letters(&context, batch).await;
    }
    info!("drained, exiting");
}
