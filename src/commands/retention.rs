//! `depot clean` and `depot purge`.

use anyhow::Result;
use chrono::Utc;

use depot::{CleanReport, Depot};

pub fn clean(depot: &Depot, ttl: Option<i64>, purge_permanent: bool) -> Result<()> {
    let report = depot.clean(ttl, purge_permanent, Utc::now())?;
    print_report("Clean", &report);
    Ok(())
}

pub fn purge(depot: &Depot, ttl: i64, include_permanent: bool) -> Result<()> {
    let report = depot.purge(ttl, include_permanent, Utc::now())?;
    print_report("Purge", &report);
    Ok(())
}

fn print_report(label: &str, report: &CleanReport) {
    for sweep in &report.sweeps {
        if sweep.removed.is_empty() {
            continue;
        }
        println!(
            "{} (ttl {}d, before {})",
            sweep.directory,
            sweep.ttl,
            sweep.cutoff.format("%Y-%m-%d %H:%M:%S")
        );
        for path in &sweep.removed {
            println!("  - {path}");
        }
    }
    for directory in &report.skipped {
        println!("{directory}: skipped (ttl 0)");
    }

    println!(
        "{label} done: {} artifact(s) removed, {} empty dir(s) pruned",
        report.removed(),
        report.pruned_dirs
    );
    if report.prune_failures > 0 {
        eprintln!("warning: {} dir(s) could not be pruned", report.prune_failures);
    }
}
