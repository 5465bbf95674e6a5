//! Cross-thread behaviour of the handoff queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use handoff_queue::{Config, PopError, queue, queue_with_config};

// ============================================================================
// FIFO / Exactly Once
// ============================================================================

#[test]
fn fifo_cross_thread_pop() {
    const COUNT: u64 = 100_000;
    let (mut tx, mut rx) = queue::<u64>(64);

    let producer = thread::spawn(move || {
        for i in 0..COUNT {
            tx.send(i).unwrap();
        }
    });

    for expected in 0..COUNT {
        assert_eq!(rx.pop().unwrap(), expected, "FIFO order violated");
    }
    assert_eq!(rx.pop(), Err(PopError));

    producer.join().unwrap();
}

#[test]
fn fifo_cross_thread_mixed_pop_and_batch() {
    const COUNT: u64 = 100_000;
    let (mut tx, mut rx) = queue::<u64>(128);

    let producer = thread::spawn(move || {
        for i in 0..COUNT {
            // bursts of deferred pushes closed by a forced one
            tx.push(i, i % 7 == 0).unwrap();
        }
    });

    let mut expected = 0u64;
    let mut batch = Vec::new();
    let mut round = 0u64;
    loop {
        let result = if round % 3 == 0 {
            rx.pop().map(|v| batch.push(v))
        } else {
            rx.pop_batch(&mut batch).map(drop)
        };
        if result.is_err() {
            break;
        }
        for v in batch.drain(..) {
            assert_eq!(v, expected, "FIFO order violated");
            expected += 1;
        }
        round += 1;
    }

    assert_eq!(expected, COUNT);
    producer.join().unwrap();
}

#[test]
fn exactly_once_under_bursts() {
    const BURSTS: u64 = 1_000;
    const BURST: u64 = 37;
    let (mut tx, mut rx) = queue::<u64>(16);

    let producer = thread::spawn(move || {
        for b in 0..BURSTS {
            for i in 0..BURST {
                tx.push(b * BURST + i, i == BURST - 1).unwrap();
            }
            if b % 50 == 0 {
                thread::sleep(Duration::from_micros(200));
            }
        }
    });

    let mut seen = vec![false; (BURSTS * BURST) as usize];
    let mut batch = Vec::new();
    while rx.pop_batch(&mut batch).is_ok() {
        for v in batch.drain(..) {
            assert!(!seen[v as usize], "duplicate {v}");
            seen[v as usize] = true;
        }
    }

    producer.join().unwrap();
    assert!(seen.iter().all(|&s| s), "lost items");
}

// ============================================================================
// Capacity Bound
// ============================================================================

#[test]
fn in_flight_never_exceeds_capacity() {
    const COUNT: u64 = 200_000;
    const CAPACITY: usize = 6;

    let (mut tx, mut rx) = queue::<u64>(CAPACITY);
    let monitor = tx.monitor();
    let done = Arc::new(AtomicBool::new(false));

    let sampler = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut samples = 0u64;
            while !done.load(Ordering::Relaxed) {
                assert!(monitor.len() <= CAPACITY);
                samples += 1;
            }
            samples
        })
    };

    let producer = thread::spawn(move || {
        for i in 0..COUNT {
            tx.send(i).unwrap();
            assert!(tx.len() <= CAPACITY);
        }
    });

    for i in 0..COUNT {
        assert_eq!(rx.pop().unwrap(), i);
        assert!(rx.len() <= CAPACITY);
    }

    producer.join().unwrap();
    done.store(true, Ordering::Relaxed);
    assert!(sampler.join().unwrap() > 0);
}

// ============================================================================
// Liveness
// ============================================================================

#[test]
fn capacity_four_push_pop_push_cross_thread() {
    let (mut tx, mut rx) = queue::<u64>(4);
    for i in 0..4 {
        tx.send(i).unwrap();
    }

    let start = Instant::now();
    let producer = thread::spawn(move || {
        tx.send(4).unwrap();
        tx
    });

    thread::sleep(Duration::from_millis(20));
    assert_eq!(rx.pop().unwrap(), 0);

    // one freed slot is enough to release a producer on a queue this small
    let _tx = producer.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    for i in 1..5 {
        assert_eq!(rx.pop().unwrap(), i);
    }
}

#[test]
fn unforced_pushes_do_not_starve_consumer() {
    const COUNT: u64 = 50_000;
    let (mut tx, mut rx) = queue::<u64>(32);

    let producer = thread::spawn(move || {
        for i in 0..COUNT {
            tx.push(i, false).unwrap();
        }
        // dropping flushes whatever is still deferred
    });

    for i in 0..COUNT {
        assert_eq!(rx.pop().unwrap(), i);
    }
    producer.join().unwrap();
}

#[test]
fn parked_consumer_receives_each_unforced_push() {
    let (mut tx, mut rx) = queue::<u64>(1024);
    let (got_tx, got_rx) = mpsc::channel();

    let consumer = thread::spawn(move || {
        while let Ok(v) = rx.pop() {
            got_tx.send(v).unwrap();
        }
    });

    // the producer stays alive and never forces, flushes or fills the queue
    for i in 0..5 {
        thread::sleep(Duration::from_millis(30));
        tx.push(i, false).unwrap();
        assert_eq!(got_rx.recv_timeout(Duration::from_secs(5)).unwrap(), i);
    }
    assert_eq!(tx.stats().consumer_wakeups, 5);

    drop(tx);
    consumer.join().unwrap();
}

#[test]
fn unforced_burst_batches_behind_parked_consumer() {
    let (mut tx, mut rx) = queue::<u64>(1024);
    let (got_tx, got_rx) = mpsc::channel();

    let consumer = thread::spawn(move || {
        let mut batch = Vec::new();
        while rx.pop_batch(&mut batch).is_ok() {
            got_tx.send(batch.len()).unwrap();
            batch.clear();
        }
    });

    thread::sleep(Duration::from_millis(30));
    // the first item wakes the consumer, flush publishes whatever is left
    for i in 0..10 {
        tx.push(i, false).unwrap();
    }
    let first = got_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(first >= 1);

    tx.flush();
    let mut total = first;
    while total < 10 {
        total += got_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    assert_eq!(total, 10);

    drop(tx);
    consumer.join().unwrap();
}

#[test]
fn ping_pong_parks_both_sides() {
    let (mut tx1, mut rx1) = queue::<u64>(1);
    let (mut tx2, mut rx2) = queue::<u64>(1);

    let echo = thread::spawn(move || {
        for i in 0..2_000 {
            let v = rx1.pop().unwrap();
            if i % 100 == 0 {
                thread::sleep(Duration::from_micros(100));
            }
            tx2.send(v + 1).unwrap();
        }
    });

    for i in 0..2_000 {
        tx1.send(i).unwrap();
        assert_eq!(rx2.pop().unwrap(), i + 1);
    }

    echo.join().unwrap();
}

#[test]
fn completes_in_reasonable_time_with_snooze() {
    let (done_tx, done_rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let config = Config::new(2)
            .with_snooze_iters(4)
            .with_sleep(Duration::from_micros(5));
        let (mut tx, mut rx) = queue_with_config::<u64>(config);

        let h = thread::spawn(move || {
            for i in 0..10_000 {
                tx.send(i).unwrap();
            }
        });

        let mut batch = Vec::new();
        let mut total = 0;
        while rx.pop_batch(&mut batch).is_ok() {
            total += batch.len();
            batch.clear();
        }

        h.join().unwrap();
        done_tx.send(total).unwrap();
    });

    let total = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("test timed out - possible deadlock");
    assert_eq!(total, 10_000);

    handle.join().unwrap();
}

// ============================================================================
// Wakeup Accounting
// ============================================================================

#[test]
fn wakeups_far_below_item_count() {
    const COUNT: u64 = 100_000;
    let (mut tx, mut rx) = queue::<u64>(256);
    let monitor = rx.monitor();

    let producer = thread::spawn(move || {
        for i in 0..COUNT {
            tx.push(i, i % 16 == 15).unwrap();
        }
    });

    let mut batch = Vec::new();
    let mut total = 0u64;
    while rx.pop_batch(&mut batch).is_ok() {
        total += batch.len() as u64;
        batch.clear();
    }
    producer.join().unwrap();

    assert_eq!(total, COUNT);
    let stats = monitor.stats();
    assert!(stats.consumer_wakeups + stats.producer_wakeups < COUNT / 4);
}

// ============================================================================
// Drop Behaviour
// ============================================================================

#[test]
fn unconsumed_items_dropped_with_queue() {
    let marker = Arc::new(());
    let (mut tx, mut rx) = queue::<Arc<()>>(8);

    for _ in 0..5 {
        tx.send(Arc::clone(&marker)).unwrap();
    }
    tx.push(Arc::clone(&marker), false).unwrap();
    drop(rx.pop().unwrap());

    assert_eq!(Arc::strong_count(&marker), 6);
    drop(tx);
    drop(rx);
    assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
fn zero_sized_items() {
    let (mut tx, mut rx) = queue::<()>(4);

    tx.send(()).unwrap();
    tx.send(()).unwrap();

    let mut out = Vec::new();
    assert_eq!(rx.pop_batch(&mut out).unwrap(), 2);
    assert_eq!(out.len(), 2);
}
