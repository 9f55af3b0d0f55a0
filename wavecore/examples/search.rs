// Copyright 2023 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::Parser;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use wavecore::*;

#[derive(Parser, Debug)]
#[command(name = "search")]
#[command(version)]
#[command(about = "Searches a synthetic counter trace with a boolean query.", long_about = None)]
struct Args {
    #[arg(value_name = "QUERY", index = 1)]
    query: String,
    #[arg(long, default_value_t = 100_000, help = "number of clock cycles to generate")]
    cycles: u32,
    #[arg(long, default_value_t = 0)]
    start: Timestamp,
    #[arg(long, help = "search backwards from the start")]
    backwards: bool,
    #[arg(long, default_value_t = 10, help = "maximum number of matches to print")]
    limit: usize,
    #[arg(long)]
    single_thread: bool,
}

/// `tb.clk` toggles every 5 ticks, `tb.count` increments on every rising edge and
/// `tb.phase` counts modulo four.
fn counter_trace(cycles: u32, options: LoadOptions) -> Result<TraceStore> {
    let mut b = TraceStore::builder(options);
    b.set_timescale(-9);
    b.enter_scope("tb");
    let clk = b.new_net("clk", None, 1)?;
    let count = b.new_net("count", None, 32)?;
    let phase = b.new_net("phase", None, 2)?;
    b.enter_scope("dut");
    // the same wire seen from inside the design
    b.new_net("clock", Some(clk), 1)?;
    b.exit_named_scope("dut")?;
    b.exit_named_scope("tb")?;

    let (zero, one) = (BitVector::zeros(1), BitVector::from_logic_values(&[LogicValue::One]));
    let mut value = BitVector::zeros(32);
    let mut phase_value = BitVector::zeros(2);
    for cycle in 0..cycles {
        let time = cycle as Timestamp * 10;
        b.append_transition(clk, time, &one)?;
        b.append_transition(clk, time + 5, &zero)?;
        for bit in 0..32 {
            let digit = if (cycle >> bit) & 1 == 1 {
                LogicValue::One
            } else {
                LogicValue::Zero
            };
            value.set_bit(bit, digit);
            if bit < 2 {
                phase_value.set_bit(bit, digit);
            }
        }
        b.append_transition(count, time, &value)?;
        b.append_transition(phase, time, &phase_value)?;
    }
    Ok(b.finish())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let options = LoadOptions {
        multi_thread: !args.single_thread,
        ..LoadOptions::default()
    };
    let start = Instant::now();
    let store = match counter_trace(args.cycles, options) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to build trace: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "Generated {} nets with {} unique signals up to t={} in {:?}",
        store.net_count(),
        store.num_unique_signals(),
        store.max_timestamp(),
        start.elapsed()
    );
    store.print_statistics();

    let query = match Query::parse(&store, &args.query) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("{}", args.query);
            eprintln!(
                "{}{} {}",
                " ".repeat(e.start),
                "^".repeat((e.end - e.start).max(1)),
                e.message
            );
            std::process::exit(1);
        }
    };
    println!("Searching for: {query}");

    let start = Instant::now();
    let matches: Vec<Timestamp> = if args.backwards {
        std::iter::successors(query.previous_match(args.start), |t| query.previous_match(*t))
            .take(args.limit)
            .collect()
    } else {
        query.matches(args.start).take(args.limit).collect()
    };
    let elapsed = start.elapsed();
    for time in matches.iter() {
        let values = query
            .expr()
            .nets()
            .into_iter()
            .map(|net| {
                let value = store
                    .format_value_at(net, *time, Radix::Hexadecimal)
                    .unwrap_or_default();
                format!("{}={}", store.full_name(net), value)
            })
            .collect::<Vec<_>>();
        println!("{time:>12}  {}", values.join(" "));
    }
    println!("Found {} matches in {:?}", matches.len(), elapsed);
}
