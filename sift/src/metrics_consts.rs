pub const EVENTS_RECEIVED: &str = "sift_events_received";
pub const EMPTY_EVENTS: &str = "sift_empty_events";
pub const EVENTS_ROUTED: &str = "sift_events_routed";
pub const DEAD_LETTERS: &str = "sift_dead_letters_total";
pub const BATCHES_FLUSHED: &str = "sift_batches_flushed";
pub const BATCH_FLUSH_SIZE: &str = "sift_batch_flush_size";
pub const FLUSH_FAILED: &str = "sift_flush_failed";
pub const DEAD_LETTERS_PERSISTED: &str = "sift_dead_letters_persisted";
pub const RECV_ERRORS: &str = "sift_recv_errors";
pub const MAIN_LOOP_TIME: &str = "sift_main_loop_time_ms";
pub const SINK_WRITE_TIME: &str = "sift_sink_write_time_ms";
