use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use crate::util::lock;

/// Single-slot, latest-value-wins handoff between one writer and one reader.
///
/// A publish overwrites whatever the reader has not consumed yet. A read never
/// waits for data: it returns the newest value or `None` when nothing new has
/// arrived since the last read.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    overwritten: AtomicU64,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            overwritten: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, value: T) {
        if lock(&self.slot).replace(value).is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take the newest value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        lock(&self.slot).take()
    }

    pub fn has_new(&self) -> bool {
        lock(&self.slot).is_some()
    }

    pub fn clear(&self) {
        lock(&self.slot).take();
    }

    /// Number of values replaced before anyone read them.
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{mpsc, Arc},
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn test_empty_mailbox_returns_none() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        assert!(!mailbox.has_new());
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_latest_value_wins() {
        let mailbox = Mailbox::new();
        mailbox.publish(1);
        mailbox.publish(2);
        mailbox.publish(3);
        assert!(mailbox.has_new());
        assert_eq!(mailbox.take(), Some(3));
        assert_eq!(mailbox.take(), None);
        assert_eq!(mailbox.overwritten(), 2);
    }

    #[test]
    fn test_clear() {
        let mailbox = Mailbox::new();
        mailbox.publish("stale");
        mailbox.clear();
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_concurrent_reader_never_blocks() {
        const COUNT: u64 = 100_000;
        let mailbox = Arc::new(Mailbox::new());

        let writer_box = mailbox.clone();
        let writer = thread::spawn(move || {
            for i in 1..=COUNT {
                writer_box.publish(i);
            }
        });

        let reader_box = mailbox.clone();
        let (done_tx, done_rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let mut last = 0;
            let mut empty_polls = 0u64;
            let deadline = Instant::now() + Duration::from_secs(10);
            while last < COUNT && Instant::now() < deadline {
                match reader_box.take() {
                    Some(value) => {
                        assert!(value > last, "Values must arrive in order ({} <= {})", value, last);
                        last = value;
                    }
                    None => empty_polls += 1,
                }
            }
            let _ = done_tx.send((last, empty_polls));
        });

        writer.join().unwrap();
        let (last, _empty_polls) = done_rx
            .recv_timeout(Duration::from_secs(15))
            .expect("Reader must not deadlock");
        reader.join().unwrap();
        assert_eq!(last, COUNT, "Reader must observe the final publish");
    }
}
