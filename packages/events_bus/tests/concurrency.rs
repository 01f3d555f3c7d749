//! Multi-threaded end-to-end scenarios: several producers against one consumer, and
//! list mutation racing an in-flight invocation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use events_bus::{CallbackList, DefaultPolicy, EventQueue, HighContentionPolicy, Policy};

/// Runs `producers` threads, each enqueueing `per_producer` events under its own
/// key, against one consumer draining in a loop. Returns key -> delivered count.
fn run_mpsc<P: Policy>(producers: u32, per_producer: usize) -> HashMap<u32, usize>
where
    EventQueue<u32, u64, P>: Send + Sync,
{
    let queue = Arc::new(EventQueue::<u32, u64, P>::new());
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let total = producers as usize * per_producer;
    let delivered = Arc::new(AtomicUsize::new(0));

    for key in 0..producers {
        let counts = Arc::clone(&counts);
        let delivered = Arc::clone(&delivered);
        queue.append_listener(key, move |_payload: &u64| {
            *counts.lock().unwrap().entry(key).or_insert(0) += 1;
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    let consumer = {
        let queue = Arc::clone(&queue);
        let delivered = Arc::clone(&delivered);
        thread::spawn(move || {
            while delivered.load(Ordering::Relaxed) < total {
                queue.wait_for(Duration::from_millis(1));
                queue.process();
            }
        })
    };

    let mut handles = Vec::new();
    for key in 0..producers {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                queue.enqueue(key, i as u64);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    consumer.join().unwrap();

    assert!(queue.is_empty());
    let counts = counts.lock().unwrap().clone();
    counts
}

#[test]
fn two_producers_one_consumer_full_delivery() {
    let counts = run_mpsc::<DefaultPolicy>(2, 4096);

    assert_eq!(counts.len(), 2);
    assert_eq!(counts[&0], 4096);
    assert_eq!(counts[&1], 4096);
}

#[test]
fn contended_queue_delivers_every_event() {
    let producers = 8;
    let per_producer = 4096;

    let counts = run_mpsc::<HighContentionPolicy>(producers, per_producer);

    assert_eq!(counts.values().sum::<usize>(), producers as usize * per_producer);
    assert!(counts.values().all(|&count| count == per_producer));
}

#[test]
#[ignore = "full-scale contention run; takes minutes in debug builds"]
fn contended_queue_at_full_scale() {
    let counts = run_mpsc::<HighContentionPolicy>(256, 4096);

    assert_eq!(counts.values().sum::<usize>(), 1_048_576);
}

#[test]
fn producers_share_one_key() {
    let queue = Arc::new(EventQueue::<u32, u64, HighContentionPolicy>::new());
    let delivered = Arc::new(AtomicUsize::new(0));
    let total = 4 * 10_000;

    {
        let delivered = Arc::clone(&delivered);
        queue.append_listener(1, move |_payload: &u64| {
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    thread::scope(|s| {
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            s.spawn(move || {
                for i in 0..10_000 {
                    queue.enqueue(1, i);
                }
            });
        }

        let queue = Arc::clone(&queue);
        let delivered = Arc::clone(&delivered);
        s.spawn(move || {
            while delivered.load(Ordering::Relaxed) < total {
                queue.wait_for(Duration::from_millis(1));
                queue.process();
            }
        });
    });

    assert_eq!(delivered.load(Ordering::Relaxed), total);
}

#[test]
fn wait_blocks_until_an_event_arrives() {
    let queue = Arc::new(EventQueue::<u32, ()>::new());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            queue.wait();
            queue.len()
        })
    };

    thread::sleep(Duration::from_millis(50));
    queue.enqueue(1, ());

    assert!(consumer.join().unwrap() >= 1);
}

#[test]
fn remove_racing_an_invocation_never_corrupts_delivery() {
    const CALLBACKS: usize = 24;
    const VICTIM: usize = 10;

    // Repeat to give the race a chance to land on either side.
    for _ in 0..100 {
        let list = Arc::new(CallbackList::<()>::new());
        let hits = Arc::new((0..CALLBACKS).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let start = Arc::new(AtomicBool::new(false));

        let mut victim_handle = None;
        for i in 0..CALLBACKS {
            let hits = Arc::clone(&hits);
            let handle = list.append(move |(): &()| {
                hits[i].fetch_add(1, Ordering::Relaxed);
            });
            if i == VICTIM {
                victim_handle = Some(handle);
            }
        }
        let victim_handle = victim_handle.unwrap();

        let invoker = {
            let list = Arc::clone(&list);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                while !start.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                list.invoke(&());
            })
        };

        let remover = {
            let list = Arc::clone(&list);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                while !start.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                list.remove(&victim_handle)
            })
        };

        start.store(true, Ordering::Release);
        invoker.join().unwrap();
        let removed = remover.join().unwrap();
        assert!(removed);

        // Every callback other than the victim ran exactly once; the victim ran at
        // most once depending on which side won the race.
        for (i, count) in hits.iter().enumerate() {
            let count = count.load(Ordering::Relaxed);
            if i == VICTIM {
                assert!(count <= 1, "victim ran {count} times");
            } else {
                assert_eq!(count, 1, "callback {i} ran {count} times");
            }
        }
    }
}

#[test]
fn concurrent_registration_and_dispatch() {
    let queue = Arc::new(EventQueue::<u32, u32, HighContentionPolicy>::new());
    let stop = Arc::new(AtomicBool::new(false));

    // One thread continuously registers and removes listeners on other keys while
    // dispatch traffic flows on key 0.
    let churner = {
        let queue = Arc::clone(&queue);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut registered = 0_u32;
            while !stop.load(Ordering::Acquire) {
                registered += 1;
                let handle = queue.append_listener(1 + (registered % 64), |_: &u32| {});
                queue.remove_listener(&handle);
            }
        })
    };

    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = Arc::clone(&delivered);
        queue.append_listener(0, move |_: &u32| {
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    for i in 0..50_000 {
        queue.enqueue(0, i);
        if i % 64 == 0 {
            queue.process();
        }
    }
    while queue.process() {}

    stop.store(true, Ordering::Release);
    churner.join().unwrap();

    assert_eq!(delivered.load(Ordering::Relaxed), 50_000);
}
