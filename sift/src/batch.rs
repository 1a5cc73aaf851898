use std::time::{Duration, Instant};

/// Buffers records until either the batch fills or the oldest buffered
/// record has waited out the flush window. Flushing is the caller's
/// job; this type only decides when a batch is ready.
pub struct BatchAccumulator<T> {
    capacity: usize,
    max_wait: Duration,
    buffer: Vec<T>,
    oldest_at: Option<Instant>,
}

impl<T> BatchAccumulator<T> {
    pub fn new(capacity: usize, max_wait: Duration) -> Self {
        Self {
            capacity,
            max_wait,
            buffer: Vec::with_capacity(capacity),
            oldest_at: None,
        }
    }

    /// Add a record, returning a full batch if this push filled it.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            self.oldest_at = Some(Instant::now());
        }
        self.buffer.push(item);
        if self.buffer.len() >= self.capacity {
            self.take()
        } else {
            None
        }
    }

    /// Return the buffered records if the oldest one has waited past
    /// the flush window. Called from the worker's tick.
    pub fn take_expired(&mut self) -> Option<Vec<T>> {
        let expired = self
            .oldest_at
            .is_some_and(|oldest| oldest.elapsed() >= self.max_wait);
        if expired {
            self.take()
        } else {
            None
        }
    }

    /// Return whatever is buffered, regardless of age. Used on
    /// shutdown so a partial batch is never stranded.
    pub fn drain(&mut self) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            None
        } else {
            self.take()
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take(&mut self) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            return None;
        }
        self.oldest_at = None;
        Some(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.capacity),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_returns_a_batch_exactly_at_capacity() {
        let mut acc = BatchAccumulator::new(3, Duration::from_secs(30));
        assert!(acc.push(1).is_none());
        assert!(acc.push(2).is_none());
        let batch = acc.push(3).expect("third push should flush");
        assert_eq!(batch, vec![1, 2, 3]);
        assert!(acc.is_empty());
    }

    #[test]
    fn batch_order_matches_arrival_order() {
        let mut acc = BatchAccumulator::new(5, Duration::from_secs(30));
        for i in 0..4 {
            assert!(acc.push(i).is_none());
        }
        assert_eq!(acc.push(4).unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn take_expired_is_none_inside_the_window() {
        let mut acc = BatchAccumulator::new(100, Duration::from_secs(30));
        acc.push("a");
        assert!(acc.take_expired().is_none());
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn take_expired_flushes_a_partial_batch_after_the_window() {
        let mut acc = BatchAccumulator::new(100, Duration::from_millis(0));
        acc.push("a");
        acc.push("b");
        assert_eq!(acc.take_expired().unwrap(), vec!["a", "b"]);
        assert!(acc.is_empty());
    }

    #[test]
    fn empty_accumulator_never_flushes() {
        let mut acc: BatchAccumulator<u8> = BatchAccumulator::new(10, Duration::from_millis(0));
        assert!(acc.take_expired().is_none());
        assert!(acc.drain().is_none());
    }

    #[test]
    fn window_restarts_with_each_new_batch() {
        let mut acc = BatchAccumulator::new(2, Duration::from_secs(30));
        acc.push(1);
        assert!(acc.push(2).is_some());
        // Fresh batch, fresh window.
        acc.push(3);
        assert!(acc.take_expired().is_none());
    }

    #[test]
    fn drain_returns_leftovers_on_shutdown() {
        let mut acc = BatchAccumulator::new(100, Duration::from_secs(30));
        acc.push(1);
        acc.push(2);
        assert_eq!(acc.drain().unwrap(), vec![1, 2]);
        assert!(acc.drain().is_none());
    }
}
