use envconfig::Envconfig;

use common_kafka::config::{ConsumerConfig, KafkaConfig};

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    // Empty disables the topic and dead letters go straight to files.
    #[envconfig(default = "dead-letter-topic")]
    pub dead_letter_topic: String,

    #[envconfig(default = "data/output")]
    pub sink_output_root: String,

    #[envconfig(default = "data/dead_letters")]
    pub dead_letter_output_root: String,

    #[envconfig(default = "100")]
    pub batch_size: usize,

    #[envconfig(default = "30")]
    pub batch_window_seconds: u64,

    // How long recv() waits before the loop ticks flush windows anyway.
    #[envconfig(default = "1000")]
    pub next_event_wait_ms: u64,

    #[envconfig(default = "false")]
    pub print_sink: bool,

    // Run the drain consumer that persists dead letters off the topic.
    #[envconfig(default = "true")]
    pub consume_dead_letters: bool,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        ConsumerConfig::set_defaults("sift", "events-topic");
        Self::init_from_env()
    }

    pub fn dead_letter_topic_enabled(&self) -> bool {
        !self.dead_letter_topic.is_empty()
    }
}
