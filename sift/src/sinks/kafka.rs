use async_trait::async_trait;
use common_kafka::kafka_producer::{send_keyed_iter_to_kafka, KafkaContext};
use rdkafka::producer::FutureProducer;

use crate::error::EventError;
use crate::types::DeadLetterEvent;

use super::RecordSink;

/// Publishes dead-letter envelopes to a second topic, keeping arrival
/// order within the batch, for the drain consumer to pick up.
pub struct KafkaDeadLetterSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaDeadLetterSink {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl RecordSink<DeadLetterEvent> for KafkaDeadLetterSink {
    async fn send_batch(&self, records: &[DeadLetterEvent]) -> Result<(), EventError> {
        let results =
            send_keyed_iter_to_kafka(&self.producer, &self.topic, |_| None, records.iter()).await;
        for result in results {
            result.map_err(|e| EventError::SinkWrite(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::dead_letter_event;
    use common_kafka::test::create_mock_kafka;
    use rdkafka::consumer::{Consumer, StreamConsumer};
    use rdkafka::{ClientConfig, Message};

    #[tokio::test]
    async fn envelopes_arrive_on_the_topic_in_order() {
        let (cluster, producer) = create_mock_kafka().await;
        cluster
            .create_topic("dead-letter-test", 1, 1)
            .expect("failed to create topic");

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", cluster.bootstrap_servers())
            .set("group.id", "dead-letter-test")
            .set("auto.offset.reset", "earliest")
            .create()
            .expect("failed to create consumer");
        consumer
            .subscribe(&["dead-letter-test"])
            .expect("failed to subscribe");

        let sink = KafkaDeadLetterSink::new(producer, "dead-letter-test".to_string());
        let envelopes: Vec<_> = (0..3)
            .map(|i| {
                let mut envelope = dead_letter_event();
                envelope.retry_count = i;
                envelope
            })
            .collect();
        sink.send_batch(&envelopes).await.unwrap();

        for expected in &envelopes {
            let message = consumer.recv().await.expect("failed to receive message");
            let received: DeadLetterEvent =
                serde_json::from_slice(message.payload().unwrap()).unwrap();
            assert_eq!(&received, expected);
        }
    }
}
