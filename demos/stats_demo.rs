use std::hash::RandomState;

use clap::Parser;
use probe_hash::HashTable;
use probe_hash::Identity;
use probe_hash::Params;
use probe_hash::WeightSumMap;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Keep probe runs sorted by initial place.
    #[arg(long)]
    ordered: bool,

    /// Percent occupancy an insertion may not exceed.
    #[arg(long, default_value_t = 75)]
    grow_load: u8,

    /// Number of weighted draws used to check sampling frequencies.
    #[arg(short = 'd', long, default_value_t = 100_000)]
    draws: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() {
    let args = Args::parse();

    let params = Params::default()
        .ordered(args.ordered)
        .grow_load(args.grow_load);
    let mut table: HashTable<u64, u64, RandomState> =
        match HashTable::with_params_and_hasher(args.target_capacity, params, RandomState::new()) {
            Ok(table) => table,
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        };

    println!(
        "Created table for {} entries: {} slots, capacity {}",
        args.target_capacity,
        table.native_size(),
        table.capacity()
    );

    let num_values = table.capacity() as u64;
    for value in 0..num_values {
        table.insert(value, value);
    }
    println!("Inserted {} values", table.len());
    table.debug_stats().print();

    println!("Displacement histogram:");
    for (distance, count) in table.probe_histogram().iter().enumerate() {
        if *count > 0 {
            println!("  {distance:>3}: {count}");
        }
    }

    table.retain(|key, _| key % 2 == 0);
    println!(
        "After removing odd keys through a cursor: {} entries in {} slots",
        table.len(),
        table.native_size()
    );
    table.debug_stats().print();

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut weights: WeightSumMap<char, u64, Identity, RandomState> =
        WeightSumMap::with_hasher(Identity, RandomState::new());
    weights.insert('a', 1);
    weights.insert('b', 1);
    weights.insert('c', 2);

    let mut hits = [0usize; 3];
    for _ in 0..args.draws {
        if let Some(key) = weights.weighted_random_key(&mut rng) {
            hits[(*key as u8 - b'a') as usize] += 1;
        }
    }
    println!("Weighted sampling over weights a=1, b=1, c=2:");
    for (key, count) in ['a', 'b', 'c'].iter().zip(hits) {
        let weight = weights.weight_of(key).unwrap_or(0);
        println!(
            "  {key} (weight {weight}): {count} draws ({:.2}%)",
            count as f64 / args.draws.max(1) as f64 * 100.0
        );
    }
}
