//! Queue guarantees seen from outside the crate, with a custom stage.

use crossbeam_channel::unbounded;
use facetalk::pipeline::{LogReporter, Stage, StageError, StageEvent, StageQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Upper-cases its input after a short pause, tracking concurrency.
struct Shout {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Stage for Shout {
    type Request = String;
    type Response = String;

    fn process(&mut self, request: String) -> Result<Option<String>, StageError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(request.to_uppercase()))
    }

    fn name(&self) -> &'static str {
        "shout"
    }
}

fn spawn() -> (
    StageQueue<Shout>,
    crossbeam_channel::Receiver<StageEvent<String>>,
    Arc<AtomicUsize>,
) {
    let peak = Arc::new(AtomicUsize::new(0));
    let stage = Shout {
        active: Arc::new(AtomicUsize::new(0)),
        peak: Arc::clone(&peak),
    };
    let (tx, rx) = unbounded();
    let queue = StageQueue::spawn(stage, tx, Arc::new(LogReporter), Duration::from_millis(10));
    (queue, rx, peak)
}

#[test]
fn responses_follow_request_order_one_at_a_time() {
    let (queue, events, peak) = spawn();
    for text in ["a", "b", "c"] {
        assert!(queue.enqueue(text.to_string()));
    }

    let received: Vec<StageEvent<String>> = (0..3)
        .map(|_| events.recv_timeout(Duration::from_secs(2)).unwrap())
        .collect();

    assert_eq!(
        received,
        vec![
            StageEvent::Completed("A".to_string()),
            StageEvent::Completed("B".to_string()),
            StageEvent::Completed("C".to_string()),
        ]
    );
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    queue.shutdown().unwrap();
}

#[test]
fn enqueue_after_stop_is_ignored() {
    let (queue, events, _peak) = spawn();
    queue.stop();

    assert!(!queue.enqueue("late".to_string()));
    assert_eq!(queue.pending(), 0);
    assert!(queue.is_stopped());

    queue.join().unwrap();
    assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
}
