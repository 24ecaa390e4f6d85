//! hashkv Shell
//!
//! Reads hash commands from stdin, one per line, and runs them against an
//! in-memory store.

use std::io::{self, BufRead, Write};

use clap::Parser;
use hashkv::protocol::{Command, Reply};
use hashkv::{Config, Engine, MemStore};
use tracing_subscriber::{fmt, EnvFilter};

/// hashkv Shell
#[derive(Parser, Debug)]
#[command(name = "hashkv-shell")]
#[command(about = "Interactive shell for the hashkv hash type")]
#[command(version)]
struct Args {
    /// Key namespace
    #[arg(short, long, default_value = "hashkv")]
    namespace: String,

    /// Logical database index
    #[arg(short, long, default_value = "0")]
    db: u32,

    /// Shard count for new hashes (0 disables sharding)
    #[arg(short, long, default_value = "0")]
    shards: i64,

    /// Max keys removed per GC sweep
    #[arg(short, long, default_value = "256")]
    gc_limit: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("hashkv shell v{}", hashkv::VERSION);

    let config = Config::builder()
        .namespace(&args.namespace)
        .db_id(args.db)
        .default_shard_count(args.shards)
        .gc_batch_limit(args.gc_limit)
        .build();

    let engine = match Engine::new(config, MemStore::new()) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to start engine: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        let reply = run_line(&engine, &tokens);
        if writeln!(stdout, "{}", reply).is_err() {
            break;
        }
    }

    tracing::info!("Shell stopped");
}

/// Run one input line; `GC` and `EVICT` drive background work by hand
fn run_line(engine: &Engine<MemStore>, tokens: &[&str]) -> Reply {
    let result = match tokens[0].to_ascii_uppercase().as_str() {
        "GC" => engine.collect_garbage().map(|n| Reply::Integer(n as i64)),
        "EVICT" => engine.evict_expired().map(|n| Reply::Integer(n as i64)),
        _ => Command::parse(tokens).and_then(|command| engine.execute(command)),
    };
    result.unwrap_or_else(|e| Reply::from_error(&e))
}
