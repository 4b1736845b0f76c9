#[macro_use]
extern crate criterion;
extern crate concourse;
extern crate crossbeam;

use concourse::structures::{MsQueue, SglQueue};
use criterion::Criterion;
use crossbeam::queue::SegQueue;

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

const TOTAL_OPS: u64 = 10_000;

fn bench_equal_lock(num_threads: usize) {
    let queue: Arc<SglQueue<u64>> = Arc::new(SglQueue::new());
    let per_thread = TOTAL_OPS / num_threads as u64;
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();

    for _ in 0..num_threads / 2 {
        let queue_clone = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for i in 0..per_thread {
                queue_clone.enqueue(i);
            }
        }));
    }

    for _ in 0..num_threads / 2 {
        let queue_clone = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for _ in 0..per_thread {
                loop {
                    if queue_clone.dequeue().is_some() {
                        break;
                    }
                }
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_equal_ms(num_threads: usize) {
    let queue: Arc<MsQueue<u64>> = Arc::new(MsQueue::new());
    let per_thread = TOTAL_OPS / num_threads as u64;
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();

    for _ in 0..num_threads / 2 {
        let queue_clone = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for i in 0..per_thread {
                queue_clone.enqueue(i);
            }
        }));
    }

    for _ in 0..num_threads / 2 {
        let queue_clone = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for _ in 0..per_thread {
                loop {
                    if queue_clone.dequeue().is_some() {
                        break;
                    }
                }
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_equal_crossbeam(num_threads: usize) {
    let queue: Arc<SegQueue<u64>> = Arc::new(SegQueue::new());
    let per_thread = TOTAL_OPS / num_threads as u64;
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();

    for _ in 0..num_threads / 2 {
        let queue_clone = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for i in 0..per_thread {
                queue_clone.push(i);
            }
        }));
    }

    for _ in 0..num_threads / 2 {
        let queue_clone = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for _ in 0..per_thread {
                loop {
                    if queue_clone.pop().is_some() {
                        break;
                    }
                }
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_mp_sc_ms(num_threads: usize) {
    let queue: Arc<MsQueue<u64>> = Arc::new(MsQueue::new());
    let per_thread = TOTAL_OPS / num_threads as u64;
    let consumer_total = per_thread * (num_threads as u64 - 1);
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();

    let q = queue.clone();
    wait_vec.push(thread::spawn(move || {
        for _ in 0..consumer_total {
            loop {
                if q.dequeue().is_some() {
                    break;
                }
            }
        }
    }));

    for _ in 0..num_threads - 1 {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for i in 0..per_thread {
                q.enqueue(i);
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_mp_sc_lock(num_threads: usize) {
    let queue: Arc<SglQueue<u64>> = Arc::new(SglQueue::new());
    let per_thread = TOTAL_OPS / num_threads as u64;
    let consumer_total = per_thread * (num_threads as u64 - 1);
    let mut wait_vec: Vec<JoinHandle<()>> = Vec::new();

    let q = queue.clone();
    wait_vec.push(thread::spawn(move || {
        for _ in 0..consumer_total {
            loop {
                if q.dequeue().is_some() {
                    break;
                }
            }
        }
    }));

    for _ in 0..num_threads - 1 {
        let q = queue.clone();
        wait_vec.push(thread::spawn(move || {
            for i in 0..per_thread {
                q.enqueue(i);
            }
        }));
    }

    for handle in wait_vec {
        handle.join().unwrap();
    }
}

fn bench_queue_equal(c: &mut Criterion) {
    c.bench_function("queue_equal_sgl", |b| b.iter(|| bench_equal_lock(8)));
    c.bench_function("queue_equal_ms", |b| b.iter(|| bench_equal_ms(8)));
    c.bench_function("queue_equal_crossbeam", |b| {
        b.iter(|| bench_equal_crossbeam(8))
    });
}

fn bench_queue_mp_sc(c: &mut Criterion) {
    c.bench_function("queue_mp_sc_sgl", |b| b.iter(|| bench_mp_sc_lock(8)));
    c.bench_function("queue_mp_sc_ms", |b| b.iter(|| bench_mp_sc_ms(8)));
}

criterion_group!(benches, bench_queue_equal, bench_queue_mp_sc);
criterion_main!(benches);
