//! Throughput Benchmark for bookshelf
//!
//! Measures the request queue under producer/consumer load, the request
//! parser, and the dispatcher against the in-memory store.

use bookshelf::dispatch::{Dispatcher, RequestHandler};
use bookshelf::http::parse_request;
use bookshelf::queue::BoundedQueue;
use bookshelf::store::MemoryStore;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CREATE: &[u8] = b"POST /add/book HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 60\r\n\r\n{\"id_book\":1,\"title\":\"Dune\",\"author\":\"Herbert\",\"price\":9.99}";

/// Single-threaded enqueue/dequeue pairs
fn bench_queue_uncontended(c: &mut Criterion) {
    let queue = BoundedQueue::new(64).unwrap();

    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("enqueue_dequeue", |b| {
        let mut i = 0u64;
        b.iter(|| {
            queue.enqueue(i).unwrap();
            black_box(queue.dequeue());
            i += 1;
        });
    });

    group.finish();
}

/// Four producers and four consumers moving items through a small queue
fn bench_queue_contended(c: &mut Criterion) {
    const ITEMS_PER_PRODUCER: u64 = 10_000;

    let mut group = c.benchmark_group("queue_concurrent");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(4 * ITEMS_PER_PRODUCER));

    for capacity in [1usize, 20, 256] {
        group.bench_function(format!("4x4_capacity_{}", capacity), |b| {
            b.iter(|| {
                let queue = Arc::new(BoundedQueue::new(capacity).unwrap());

                let consumers: Vec<_> = (0..4)
                    .map(|_| {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || {
                            let mut n = 0u64;
                            while queue.dequeue().is_some() {
                                n += 1;
                            }
                            n
                        })
                    })
                    .collect();

                let producers: Vec<_> = (0..4)
                    .map(|_| {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || {
                            for i in 0..ITEMS_PER_PRODUCER {
                                queue.enqueue(i).unwrap();
                            }
                        })
                    })
                    .collect();

                for p in producers {
                    p.join().unwrap();
                }
                queue.shutdown();

                let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
                assert_eq!(total, 4 * ITEMS_PER_PRODUCER);
            });
        });
    }

    group.finish();
}

/// Parsing complete and split requests
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(CREATE.len() as u64));

    group.bench_function("create_request", |b| {
        b.iter(|| black_box(parse_request(black_box(CREATE)).unwrap()));
    });

    group.bench_function("incomplete_request", |b| {
        let partial = &CREATE[..CREATE.len() - 10];
        b.iter(|| black_box(parse_request(black_box(partial)).unwrap()));
    });

    group.finish();
}

/// Parse plus dispatch against the in-memory store
fn bench_dispatch(c: &mut Criterion) {
    let store = Arc::new(MemoryStore::new());
    let mut conn = store.connect();
    let dispatcher = Dispatcher::new();

    let (create, _) = parse_request(CREATE).unwrap().unwrap();
    let (read, _) = parse_request(b"GET /get/books?id_book=1 HTTP/1.1\r\n\r\n")
        .unwrap()
        .unwrap();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("create", |b| {
        b.iter(|| black_box(dispatcher.handle(&mut conn, &create)));
    });

    group.bench_function("read_and_serialize", |b| {
        b.iter(|| black_box(dispatcher.handle(&mut conn, &read).serialize()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_queue_uncontended,
    bench_queue_contended,
    bench_parse,
    bench_dispatch,
);

criterion_main!(benches);
