//! A multi-producer/single-consumer pipeline on the high-contention policy bundle:
//! sensor threads enqueue readings, one consumer drains and reacts per topic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use events_bus::{EventQueue, HighContentionPolicy};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Topic {
    Reading,
    Alarm,
}

#[derive(Debug)]
struct Reading {
    sensor: u32,
    temperature: f32,
}

const SENSORS: u32 = 4;
const READINGS_PER_SENSOR: usize = 50_000;

fn main() {
    let queue = Arc::new(EventQueue::<Topic, Reading, HighContentionPolicy>::new());
    let readings = Arc::new(AtomicUsize::new(0));
    let alarms = Arc::new(AtomicUsize::new(0));

    {
        let readings = Arc::clone(&readings);
        queue.append_listener(Topic::Reading, move |_reading: &Reading| {
            readings.fetch_add(1, Ordering::Relaxed);
        });
    }
    {
        let alarms = Arc::clone(&alarms);
        queue.append_listener(Topic::Alarm, move |reading: &Reading| {
            alarms.fetch_add(1, Ordering::Relaxed);
            println!(
                "ALARM: sensor {} reported {:.1} degrees",
                reading.sensor, reading.temperature
            );
        });
    }

    let total = SENSORS as usize * READINGS_PER_SENSOR;
    let started = Instant::now();

    thread::scope(|s| {
        for sensor in 0..SENSORS {
            let queue = Arc::clone(&queue);
            s.spawn(move || {
                for i in 0..READINGS_PER_SENSOR {
                    // Every 10_000th reading trips the alarm threshold.
                    let temperature = if i % 10_000 == 9_999 { 95.0 } else { 21.5 };
                    let topic = if temperature > 80.0 {
                        Topic::Alarm
                    } else {
                        Topic::Reading
                    };
                    queue.enqueue(
                        topic,
                        Reading {
                            sensor,
                            temperature,
                        },
                    );
                }
            });
        }

        let queue = Arc::clone(&queue);
        let readings = Arc::clone(&readings);
        let alarms = Arc::clone(&alarms);
        s.spawn(move || {
            while readings.load(Ordering::Relaxed) + alarms.load(Ordering::Relaxed) < total {
                queue.wait_for(Duration::from_millis(1));
                queue.process();
            }
        });
    });

    let elapsed = started.elapsed();
    println!(
        "drained {} events in {:.1} ms ({} alarms)",
        total,
        elapsed.as_secs_f64() * 1000.0,
        alarms.load(Ordering::Relaxed),
    );
}
