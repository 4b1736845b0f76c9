//! Single-algorithm runner: exercise one container with one workload shape
//! and print labeled counters, for quick eyeballing and scripting.

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

#[derive(Parser)]
#[command(name = "single", about = "Run a single container algorithm")]
struct Args {
    /// Container kind: stack | queue
    #[arg(long)]
    kind: String,
    /// Algorithm: stacks take sgl | treiber | elim | fc, queues take sgl | ms | fc
    #[arg(long)]
    algo: String,
    /// Thread count (stacks) / producer count (queues)
    #[arg(long, default_value_t = 4)]
    threads: usize,
    /// Total operations
    #[arg(long, default_value_t = 200_000)]
    ops: usize,
}

fn run_stack<S>(name: &str, args: &Args)
where
    S: ConcurrentStack<u64> + Default + 'static,
{
    let stack: Arc<S> = Arc::new(S::default());
    let per_thread = args.ops / args.threads;
    let pushed = Arc::new(AtomicUsize::new(0));

    let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::with_capacity(args.threads);
    let start = Instant::now();
    for _ in 0..args.threads {
        let stack_copy = stack.clone();
        let pushed = pushed.clone();
        waitvec.push(thread::spawn(move || {
            for i in 0..per_thread {
                stack_copy.push(i as u64);
                pushed.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for handle in waitvec {
        handle.join().unwrap();
    }
    let time_ms = start.elapsed().as_secs_f64() * 1e3;

    let mut popped = 0usize;
    while stack.pop().is_some() {
        popped += 1;
    }

    println!("=== STACK RUN ===");
    println!("algo={}", name);
    println!("threads={}", args.threads);
    println!("pushed={}", pushed.load(Ordering::Relaxed));
    println!("popped={}", popped);
    println!("time_ms={:.3}", time_ms);
    println!("==========");
}

fn run_queue<Q>(name: &str, args: &Args)
where
    Q: ConcurrentQueue<u64> + Default + 'static,
{
    let queue: Arc<Q> = Arc::new(Q::default());
    let per_producer = args.ops / args.threads;
    let total = per_producer * args.threads;

    let produced = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::with_capacity(args.threads);
    for _ in 0..args.threads {
        let queue_copy = queue.clone();
        let produced = produced.clone();
        waitvec.push(thread::spawn(move || {
            for i in 0..per_producer {
                queue_copy.enqueue(i as u64);
                produced.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    let consumer = {
        let queue_copy = queue.clone();
        let produced = produced.clone();
        let consumed = consumed.clone();
        thread::spawn(move || loop {
            if queue_copy.dequeue().is_some() {
                consumed.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if produced.load(Ordering::Relaxed) >= total {
                // Producers are done; drain whatever is left and stop.
                while queue_copy.dequeue().is_some() {
                    consumed.fetch_add(1, Ordering::Relaxed);
                }
                break;
            }
            thread::yield_now();
        })
    };

    for handle in waitvec {
        handle.join().unwrap();
    }
    consumer.join().unwrap();
    let time_ms = start.elapsed().as_secs_f64() * 1e3;

    println!("=== QUEUE RUN ===");
    println!("algo={}", name);
    println!("producers={}", args.threads);
    println!("produced={}", produced.load(Ordering::Relaxed));
    println!("consumed={}", consumed.load(Ordering::Relaxed));
    println!("time_ms={:.3}", time_ms);
    println!("==========");
}

fn main() {
    let args = Args::parse();

    if args.threads == 0 || args.ops == 0 {
        eprintln!("threads and ops must be > 0");
        process::exit(1);
    }

    match (args.kind.as_str(), args.algo.as_str()) {
        ("stack", "sgl") => run_stack::<SglStack<u64>>("SglStack", &args),
        ("stack", "treiber") => run_stack::<TreiberStack<u64>>("TreiberStack", &args),
        ("stack", "elim") => run_stack::<EliminationStack<u64>>("EliminationStack", &args),
        ("stack", "fc") => run_stack::<FcStack<u64>>("FcStack", &args),
        ("queue", "sgl") => run_queue::<SglQueue<u64>>("SglQueue", &args),
        ("queue", "ms") => run_queue::<MsQueue<u64>>("MsQueue", &args),
        ("queue", "fc") => run_queue::<FcQueue<u64>>("FcQueue", &args),
        (kind, algo) => {
            eprintln!("Unknown combination --kind={} --algo={}", kind, algo);
            process::exit(1);
        }
    }
}
