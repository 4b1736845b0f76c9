//! Throughput benchmark over every container variant.
//!
//! Runs each stack and queue against a sweep of thread counts with a
//! constant total workload, prints a human-readable log per run, and closes
//! with a CSV summary.

use clap::Parser;
use concourse::structures::{
    ConcurrentQueue, ConcurrentStack, EliminationStack, FcQueue, FcStack, MsQueue, SglQueue,
    SglStack, TreiberStack,
};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const DEFAULT_THREAD_COUNTS: [usize; 5] = [1, 2, 4, 8, 16];
const DEFAULT_TOTAL_OPS: usize = 200_000;

#[derive(Parser)]
#[command(
    name = "bench",
    about = "Concurrent container throughput benchmark (constant total workload)"
)]
struct Args {
    /// Thread count for stacks / producer count for queues.
    /// Without it, the default sweep {1,2,4,8,16} runs.
    threads: Option<usize>,
    /// Total operations per run.
    ops: Option<usize>,
}

struct BenchResult {
    kind: &'static str,
    name: &'static str,
    threads: usize,
    requested_ops: usize,
    actual_ops: usize,
    time_ms: f64,
    ops_per_sec: f64,
}

// Stack pattern: constant total pushes split across the threads, timed over
// the push phase only; the drain afterwards is a sanity check, not workload.
fn bench_stack<S>(name: &'static str, threads: usize, requested: usize) -> BenchResult
where
    S: ConcurrentStack<u64> + Default + 'static,
{
    let stack: Arc<S> = Arc::new(S::default());
    let per_thread = requested / threads;
    let actual = per_thread * threads;

    println!("\n[STACK BENCH] {}", name);
    println!("  threads                : {}", threads);
    println!("  requested total pushes : {}", requested);
    println!("  per-thread pushes      : {}", per_thread);
    println!("  actual total pushes    : {}", actual);

    let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::with_capacity(threads);
    let start = Instant::now();
    for id in 0..threads {
        let stack_copy = stack.clone();
        waitvec.push(thread::spawn(move || {
            for i in 0..per_thread {
                stack_copy.push((id * per_thread + i) as u64);
            }
        }));
    }
    for handle in waitvec {
        handle.join().unwrap();
    }
    let elapsed = start.elapsed();

    let time_ms = elapsed.as_secs_f64() * 1e3;
    let ops_per_sec = if elapsed.as_secs_f64() > 0.0 {
        actual as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!("  time (ms)              : {:.3}", time_ms);
    println!("  pushes/sec             : {:.0}", ops_per_sec);

    let mut popped = 0usize;
    while stack.pop().is_some() {
        popped += 1;
    }
    println!("  sanity: popped count   : {}", popped);
    assert_eq!(popped, actual, "{}: popped != pushed", name);

    BenchResult {
        kind: "stack",
        name,
        threads,
        requested_ops: requested,
        actual_ops: actual,
        time_ms,
        ops_per_sec,
    }
}

// Queue pattern: MPSC with a constant total item count. Throughput counts
// both sides of the transfer (enqueues + dequeues).
fn bench_queue<Q>(name: &'static str, producers: usize, requested: usize) -> BenchResult
where
    Q: ConcurrentQueue<u64> + Default + 'static,
{
    let queue: Arc<Q> = Arc::new(Q::default());
    let per_producer = requested / producers;
    let actual = per_producer * producers;

    println!("\n[QUEUE BENCH] {}", name);
    println!("  producers              : {}", producers);
    println!("  requested total items  : {}", requested);
    println!("  per-producer items     : {}", per_producer);
    println!("  actual total items     : {}", actual);

    let produced = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let consumer = {
        let queue_copy = queue.clone();
        let produced = produced.clone();
        let consumed = consumed.clone();
        thread::spawn(move || {
            let mut local_count = 0usize;
            while local_count < actual {
                if queue_copy.dequeue().is_some() {
                    local_count += 1;
                    consumed.fetch_add(1, Ordering::Relaxed);
                } else {
                    // Queue looked empty: producers may still be running, or
                    // this is the tail race right before completion.
                    if produced.load(Ordering::Relaxed) >= actual && queue_copy.is_empty() {
                        break;
                    }
                    thread::yield_now();
                }
            }
        })
    };

    let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::with_capacity(producers);
    for id in 0..producers {
        let queue_copy = queue.clone();
        let produced = produced.clone();
        waitvec.push(thread::spawn(move || {
            for i in 0..per_producer {
                queue_copy.enqueue((id * per_producer + i) as u64);
                produced.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for handle in waitvec {
        handle.join().unwrap();
    }
    consumer.join().unwrap();

    let elapsed = start.elapsed();
    let time_ms = elapsed.as_secs_f64() * 1e3;

    let enq = produced.load(Ordering::Relaxed);
    let deq = consumed.load(Ordering::Relaxed);
    let logical_ops = enq + deq;
    let ops_per_sec = if elapsed.as_secs_f64() > 0.0 {
        logical_ops as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!("  time (ms)              : {:.3}", time_ms);
    println!("  enqueued               : {}", enq);
    println!("  dequeued               : {}", deq);
    println!("  logical ops (enq+deq)  : {}", logical_ops);
    println!("  logical ops/sec        : {:.0}", ops_per_sec);

    assert_eq!(enq, actual, "{}: enqueued != actual items", name);
    assert_eq!(deq, actual, "{}: dequeued != actual items", name);

    BenchResult {
        kind: "queue",
        name,
        threads: producers,
        requested_ops: requested,
        actual_ops: logical_ops,
        time_ms,
        ops_per_sec,
    }
}

fn print_summary(results: &[BenchResult]) {
    println!("\n===== SUMMARY (CSV) =====");
    println!("kind,name,threads,requested_ops,actual_ops,time_ms,ops_per_sec");
    for r in results {
        println!(
            "{},{},{},{},{},{:.3},{:.0}",
            r.kind, r.name, r.threads, r.requested_ops, r.actual_ops, r.time_ms, r.ops_per_sec
        );
    }
}

fn main() {
    let args = Args::parse();

    let thread_counts: Vec<usize> = match args.threads {
        Some(t) => {
            if t == 0 {
                eprintln!("Invalid thread count {}, must be > 0", t);
                process::exit(1);
            }
            vec![t]
        }
        None => DEFAULT_THREAD_COUNTS.to_vec(),
    };
    let total_ops = match args.ops {
        Some(ops) => {
            if ops == 0 {
                eprintln!("Invalid ops {}, must be > 0", ops);
                process::exit(1);
            }
            ops
        }
        None => DEFAULT_TOTAL_OPS,
    };

    println!("===== Concurrent Containers Benchmark =====");
    println!("Constant total workload mode.");
    println!("Stack total pushes (per run) : {}", total_ops);
    println!("Queue total items  (per run) : {}", total_ops);
    print!("Thread counts                 : ");
    for t in &thread_counts {
        print!("{} ", t);
    }
    println!();

    let mut results: Vec<BenchResult> = Vec::new();

    println!("\n========== STACKS ==========");
    for &t in &thread_counts {
        results.push(bench_stack::<SglStack<u64>>("SglStack", t, total_ops));
        results.push(bench_stack::<TreiberStack<u64>>("TreiberStack", t, total_ops));
        results.push(bench_stack::<EliminationStack<u64>>(
            "EliminationStack",
            t,
            total_ops,
        ));
        results.push(bench_stack::<FcStack<u64>>("FcStack", t, total_ops));
    }

    println!("\n========== QUEUES ==========");
    for &t in &thread_counts {
        results.push(bench_queue::<SglQueue<u64>>("SglQueue", t, total_ops));
        results.push(bench_queue::<MsQueue<u64>>("MsQueue", t, total_ops));
        results.push(bench_queue::<FcQueue<u64>>("FcQueue", t, total_ops));
    }

    print_summary(&results);
    println!("\nDone.");
}
