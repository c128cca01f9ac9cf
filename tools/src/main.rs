//! rollup-runner: administrative CLI for the giving rollup subsystem.
//!
//! Usage:
//!   rollup-runner --db rollups.db --seed-demo 500 --seed 42
//!   rollup-runner --db rollups.db --rebuild-window
//!   rollup-runner --db rollups.db --rebuild-full
//!   rollup-runner --db rollups.db --daemon --config rollup.json

use anyhow::Result;
use chrono::{Datelike, TimeZone, Utc};
use rand::Rng;
use rand_pcg::Pcg64;
use rollup_core::applier::IncrementalApplier;
use rollup_core::config::RollupConfig;
use rollup_core::derive;
use rollup_core::rebuild::RebuildEngine;
use rollup_core::record::{ContributorRecord, DonationRecord, DonationStatus};
use rollup_core::scheduler::NightlyScheduler;
use rollup_core::store::RollupStore;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or("rollups.db");
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => RollupConfig::load(&w[1])?,
        None => RollupConfig::default(),
    };

    let store = RollupStore::open(db)?;
    store.migrate()?;

    if let Some(n) = parse_opt_arg::<u64>(&args, "--seed-demo") {
        let seed = parse_arg(&args, "--seed", 42u64);
        seed_demo(&store, n, seed)?;
    }

    if args.iter().any(|a| a == "--rebuild-window") {
        let summary = RebuildEngine::new(&store, config.clone()).windowed_rebuild(Utc::now())?;
        println!(
            "windowed rebuild: {} months in window, {} with activity, {} records scanned",
            summary.months_in_window, summary.months_with_activity, summary.records_scanned
        );
    }

    if args.iter().any(|a| a == "--rebuild-full") {
        let summary = RebuildEngine::new(&store, config.clone()).full_rebuild(Utc::now())?;
        println!(
            "full rebuild: {} months in window, {} with activity, {} records scanned",
            summary.months_in_window, summary.months_with_activity, summary.records_scanned
        );
    }

    if args.iter().any(|a| a == "--daemon") {
        let scheduler = NightlyScheduler::new(store.reopen()?, config);
        scheduler.run_forever();
    }

    print_summary(&store)?;
    Ok(())
}

/// Generate deterministic demo donations and drive them through the
/// incremental applier, exactly as the transaction-processing path would.
fn seed_demo(store: &RollupStore, count: u64, seed: u64) -> Result<()> {
    let mut rng = Pcg64::new(seed as u128, 0xa02bdbf7bb3c0a7ac28fa16a64abf96);
    let applier = IncrementalApplier::new(store);

    let contributors: Vec<ContributorRecord> = (0..25)
        .map(|i| ContributorRecord {
            contributor_id: format!("demo-c{i}"),
            name: format!("Demo Contributor {i}"),
            category: if i % 5 == 0 {
                Some("organization".into())
            } else {
                Some("individual".into())
            },
        })
        .collect();
    for c in &contributors {
        store.insert_contributor(c)?;
    }

    let events = ["spring-gala", "fall-auction", "fun-run"];
    let today = Utc::now().date_naive();

    for _ in 0..count {
        let donation_id = uuid::Uuid::new_v4().to_string();
        let days_back = rng.gen_range(0..540);
        let date = today - chrono::Duration::days(days_back);
        let amount = (rng.gen_range(500..50_000) as f64) / 100.0;

        let record = DonationRecord {
            donation_id: donation_id.clone(),
            contributor_id: (rng.gen_range(0..10) > 0)
                .then(|| contributors[rng.gen_range(0..contributors.len())].contributor_id.clone()),
            event_id: (rng.gen_range(0..5) == 0)
                .then(|| events[rng.gen_range(0..events.len())].to_string()),
            amount: Some(amount),
            amount_collected: None,
            status: DonationStatus::Pending,
            gift_date: Some(date),
            created_at: Utc
                .with_ymd_and_hms(date.year(), date.month(), date.day(), 12, 0, 0)
                .unwrap(),
            payment_method: (rng.gen_range(0..8) == 0).then(|| "phone".to_string()),
            source: None,
        };
        store.insert_donation(&record)?;

        store.set_donation_status(&donation_id, DonationStatus::Settled)?;
        applier.apply_settled(&donation_id)?;

        // A few percent of gifts get refunded after settling.
        if rng.gen_range(0..25) == 0 {
            store.set_donation_status(&donation_id, DonationStatus::Refunded)?;
            applier.apply_reversed(&donation_id)?;
        }
    }

    println!("seeded {count} demo donations (seed {seed})");
    Ok(())
}

fn print_summary(store: &RollupStore) -> Result<()> {
    let current = derive::month_start(Utc::now().date_naive());
    let start = derive::months_back(current, 11);
    let rows = store.monthly_rollups_between(start, derive::next_month(current))?;

    println!("=== TRAILING 12 MONTHS ===");
    if rows.is_empty() {
        println!("  (no rollup rows)");
        return Ok(());
    }
    let mut running = 0.0;
    for row in &rows {
        running += row.total_raised + row.offline_amount;
        println!(
            "  {} | raised ${:>10.2} | gifts {:>4} | donors {:>4} | offline ${:>8.2} | cum ${:>11.2}",
            row.month.format("%Y-%m"),
            row.total_raised,
            row.donation_count,
            row.donor_count,
            row.offline_amount,
            running,
        );
        for ev in store.event_rollups_for_month(row.month)? {
            println!(
                "      event {:<14} ${:>9.2} ({} gifts)",
                ev.event_id, ev.amount_raised, ev.donation_count
            );
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn parse_opt_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
}
