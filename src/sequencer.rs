/// Collision-free nanosecond timestamps within one batch
///
/// The sink keys points by tag set and timestamp, so two readings of the same
/// sensor received in the same millisecond would overwrite each other. Each
/// batch gets its own sequencer: the receipt millisecond becomes the base and
/// every emitted point adds its ordinal in nanoseconds.
#[derive(Debug)]
pub struct TimestampSequencer {
    base_ns: i64,
    ordinal: i64,
}

impl TimestampSequencer {
    pub fn new(received_millis: i64) -> Self {
        TimestampSequencer {
            base_ns: received_millis * 1_000_000,
            ordinal: 0,
        }
    }

    /// Timestamp for the next point of the batch
    pub fn next_timestamp(&mut self) -> i64 {
        let ts = self.base_ns + self.ordinal;
        self.ordinal += 1;
        ts
    }

    /// Number of timestamps handed out so far
    pub fn issued(&self) -> i64 {
        self.ordinal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_at_receipt_millisecond() {
        let mut seq = TimestampSequencer::new(1_700_000_000_123);
        assert_eq!(seq.next_timestamp(), 1_700_000_000_123_000_000);
        assert_eq!(seq.next_timestamp(), 1_700_000_000_123_000_001);
        assert_eq!(seq.issued(), 2);
    }

    #[test]
    fn each_batch_starts_over() {
        let mut first = TimestampSequencer::new(5);
        first.next_timestamp();
        first.next_timestamp();
        let mut second = TimestampSequencer::new(5);
        assert_eq!(second.next_timestamp(), 5_000_000);
    }

    proptest! {
        #[test]
        fn strictly_increasing(millis in 0i64..4_000_000_000_000, count in 1usize..500) {
            let mut seq = TimestampSequencer::new(millis);
            let stamps: Vec<i64> = (0..count).map(|_| seq.next_timestamp()).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
