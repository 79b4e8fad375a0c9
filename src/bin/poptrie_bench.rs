//! Forwarding-table driver: build a Poptrie from a route file, verify that
//! every input prefix resolves to its recorded next hop, then measure
//! multi-threaded lookup throughput over a set of time windows.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use poptrie_rs::{Poptrie, RouteTable};

#[derive(Parser, Debug)]
#[command(name = "poptrie-bench")]
#[command(about = "Build a Poptrie from a route file and measure lookup correctness and throughput")]
struct Args {
    /// Route file: one "A.B.C.D/len next_hop" per line
    data: PathBuf,

    /// Leading key bits resolved by direct pointing (0, 6, 12, 18 or 24)
    #[arg(long, default_value_t = 12)]
    direct_bits: u8,

    /// Worker threads for the throughput runs
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Measurement windows in seconds
    #[arg(long, value_delimiter = ',', default_values_t = vec![5u64, 10, 15, 20, 25])]
    durations: Vec<u64>,

    /// Skip the correctness pass
    #[arg(long, default_value_t = false)]
    no_verify: bool,
}

/// Lookups between deadline checks; keeps clock reads off the hot path.
const BATCH: usize = 4096;

fn main() -> ExitCode {
    let args = Args::parse();

    let start = Instant::now();
    let table = match RouteTable::load(&args.data) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let parse_time = start.elapsed();

    let start = Instant::now();
    let poptrie = table.build_poptrie(args.direct_bits);
    let build_time = start.elapsed();

    println!(
        "Input: {} ({} routes, {} next hops)",
        args.data.display(),
        table.len(),
        table.next_hops().len()
    );
    println!("Parse: {parse_time:.2?}  Build: {build_time:.2?}");
    println!(
        "Poptrie: {} internal nodes, {} leaves, {} direct bits, {:.1} MB",
        poptrie.internal_node_count(),
        poptrie.leaf_count(),
        poptrie.direct_bits(),
        poptrie.memory_usage() as f64 / 1e6
    );

    if !args.no_verify {
        // Misses are prefixes fully shadowed by longer prefixes in the same
        // table; anything beyond a fraction of a percent is a real problem.
        let start = Instant::now();
        let correct = table
            .entries()
            .iter()
            .filter(|e| poptrie.lookup(e.addr) == e.fib_index)
            .count();
        println!(
            "Correct: {}/{} ({:.3}%) in {:.2?}",
            correct,
            table.len(),
            100.0 * correct as f64 / table.len() as f64,
            start.elapsed()
        );
    }

    let prefixes: Vec<u32> = table.entries().iter().map(|e| e.addr).collect();
    println!();
    println!("{:>6} {:>16} {:>10}", "window", "lookups", "Mlps");
    for &secs in &args.durations {
        let total = run_window(&poptrie, &prefixes, args.threads, Duration::from_secs(secs));
        println!(
            "{:>5}s {:>16} {:>10.1}",
            secs,
            total,
            total as f64 / secs as f64 / 1e6
        );
    }
    ExitCode::SUCCESS
}

/// Runs `threads` workers over a shared Poptrie for one measurement window
/// and returns the total number of completed lookups.
///
/// Each worker cycles through its own seeded pseudo-random permutation of the
/// prefix indices and checks the deadline once per batch.
fn run_window(poptrie: &Poptrie, prefixes: &[u32], threads: usize, window: Duration) -> u64 {
    if prefixes.is_empty() {
        return 0;
    }
    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|w| {
                scope.spawn(move || {
                    let mut order: Vec<u32> = (0..prefixes.len() as u32).collect();
                    order.shuffle(&mut StdRng::seed_from_u64(w as u64));

                    let deadline = Instant::now() + window;
                    let mut total = 0u64;
                    let mut sink = 0u64;
                    'window: loop {
                        for chunk in order.chunks(BATCH) {
                            for &i in chunk {
                                sink = sink
                                    .wrapping_add(u64::from(poptrie.lookup(prefixes[i as usize])));
                            }
                            total += chunk.len() as u64;
                            if Instant::now() >= deadline {
                                break 'window;
                            }
                        }
                    }
                    std::hint::black_box(sink);
                    total
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .sum()
    })
}
