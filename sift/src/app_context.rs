use std::sync::Arc;
use std::time::Duration;

use health::{HealthHandle, HealthRegistry};
use tracing::info;

use common_kafka::config::ConsumerConfig;
use common_kafka::kafka_consumer::SingleTopicConsumer;
use common_kafka::kafka_producer::create_kafka_producer;

use crate::config::Config;
use crate::error::UnhandledError;
use crate::registry::SchemaRegistry;
use crate::sinks::file::{DeadLetterFileSink, FileSink};
use crate::sinks::kafka::KafkaDeadLetterSink;
use crate::sinks::{PrintSink, RecordSink};
use crate::time::{SystemTime, TimeSource};
use crate::types::{DeadLetterEvent, TransformedEvent};

pub struct AppContext {
    pub health_registry: HealthRegistry,
    pub worker_liveness: HealthHandle,
    pub dead_letter_liveness: Option<HealthHandle>,
    pub consumer: SingleTopicConsumer,
    pub dead_letter_consumer: Option<SingleTopicConsumer>,
    pub registry: SchemaRegistry,
    pub event_sink: Arc<dyn RecordSink<TransformedEvent>>,
    pub dead_letter_sink: Arc<dyn RecordSink<DeadLetterEvent>>,
    pub dead_letter_store: Arc<DeadLetterFileSink>,
    pub time: Arc<dyn TimeSource>,
    pub config: Config,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, UnhandledError> {
        let registry = SchemaRegistry::new();
        registry.verify()?;

        let health_registry = HealthRegistry::new("liveness");
        let worker_liveness =
            health_registry.register("worker".to_string(), Duration::from_secs(60));

        let consumer = SingleTopicConsumer::new(config.kafka.clone(), config.consumer.clone())?;
        info!(
            topic = config.consumer.kafka_consumer_topic,
            group = config.consumer.kafka_consumer_group,
            "subscribed to events topic"
        );

        let event_sink: Arc<dyn RecordSink<TransformedEvent>> = if config.print_sink {
            Arc::new(PrintSink)
        } else {
            Arc::new(FileSink::new(&config.sink_output_root))
        };

        let dead_letter_store = Arc::new(DeadLetterFileSink::new(&config.dead_letter_output_root));

        let dead_letter_sink: Arc<dyn RecordSink<DeadLetterEvent>>;
        let mut dead_letter_consumer = None;
        let mut dead_letter_liveness = None;
        if config.dead_letter_topic_enabled() {
            let producer_liveness =
                health_registry.register("kafka_producer".to_string(), Duration::from_secs(60));
            let producer = create_kafka_producer(&config.kafka, producer_liveness).await?;
            dead_letter_sink = Arc::new(KafkaDeadLetterSink::new(
                producer,
                config.dead_letter_topic.clone(),
            ));
            if config.consume_dead_letters {
                let dead_letter_config = ConsumerConfig {
                    kafka_consumer_group: format!(
                        "{}-dead-letter",
                        config.consumer.kafka_consumer_group
                    ),
                    kafka_consumer_topic: config.dead_letter_topic.clone(),
                    kafka_consumer_offset_reset: config
                        .consumer
                        .kafka_consumer_offset_reset
                        .clone(),
                    kafka_consumer_auto_commit: config.consumer.kafka_consumer_auto_commit,
                    kafka_consumer_auto_commit_interval_ms: config
                        .consumer
                        .kafka_consumer_auto_commit_interval_ms,
                };
                dead_letter_consumer = Some(SingleTopicConsumer::new(
                    config.kafka.clone(),
                    dead_letter_config,
                )?);
                dead_letter_liveness = Some(
                    health_registry
                        .register("dead_letter_worker".to_string(), Duration::from_secs(60)),
                );
            }
        } else {
            // No topic configured, dead letters go straight to disk.
            dead_letter_sink = dead_letter_store.clone();
        }

        Ok(Self {
            health_registry,
            worker_liveness,
            dead_letter_liveness,
            consumer,
            dead_letter_consumer,
            registry,
            event_sink,
            dead_letter_sink,
            dead_letter_store,
            time: Arc::new(SystemTime),
            config: config.clone(),
        })
    }
}
