//! Maintenance entry point for an upkeep store file.
//!
//! # Responsibility
//! - Verify `upkeep_core` linkage and print its version.
//! - Export, import and repair a store file from the shell.
//!
//! Set `UPKEEP_LOG_DIR` (absolute path) to capture core logs.

use log::info;
use std::error::Error;
use std::process::ExitCode;
use upkeep_core::{
    export_json, init_logging, parse_envelope, DataScope, EntityStore, HistoryManager,
    SqliteCollectionStorage, StoreConfig, SystemClock,
};

const USAGE: &str = "usage:
  upkeep_cli version
  upkeep_cli <db_path> export [all|contracts|engineers]...
  upkeep_cli <db_path> import <envelope.json> [all|contracts|engineers]...
  upkeep_cli <db_path> check";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    if let Ok(dir) = std::env::var("UPKEEP_LOG_DIR") {
        init_logging(upkeep_core::default_log_level(), dir)?;
    }

    let Some(first) = args.first() else {
        return Err(USAGE.into());
    };
    if first == "version" {
        println!("upkeep_core version={}", upkeep_core::core_version());
        return Ok(());
    }

    let command = args.get(1).map(String::as_str).ok_or(USAGE)?;
    let storage = SqliteCollectionStorage::open(first)?;
    let (store, load) = EntityStore::open(storage, StoreConfig::default(), Box::new(SystemClock))?;
    for issue in &load.issues {
        eprintln!("warning: {issue}");
    }
    info!(
        "event=cli_open module=cli status=ok command={command} seeded={} regenerated={}",
        load.seeded, load.regenerated
    );

    match command {
        "export" => {
            let scopes = parse_scopes(&args[2..])?;
            println!("{}", export_json(&store, &scopes)?);
        }
        "import" => {
            let path = args.get(2).ok_or(USAGE)?;
            let scopes = parse_scopes(&args[3..])?;
            let envelope = parse_envelope(&std::fs::read_to_string(path)?)?;
            let mut history = HistoryManager::open(store);
            let report = history.import(envelope, &scopes)?;
            println!(
                "imported full={} collections={} migrated={} regenerated={}",
                report.full,
                report.replaced.len(),
                report.migrated_records,
                report.regenerated
            );
        }
        "check" => {
            let mut store = store;
            let findings = store.repair()?;
            println!(
                "consistent={} orphan_tasks={} missing_tasks={} stray_placements={} missing_placements={}",
                findings.is_consistent(),
                findings.orphan_tasks.len(),
                findings.missing_tasks.len(),
                findings.stray_placements,
                findings.missing_placements
            );
        }
        other => return Err(format!("unknown command `{other}`\n{USAGE}").into()),
    }
    Ok(())
}

fn parse_scopes(raw: &[String]) -> Result<Vec<DataScope>, Box<dyn Error>> {
    raw.iter()
        .map(|value| {
            DataScope::parse(value)
                .ok_or_else(|| -> Box<dyn Error> { format!("unknown scope `{value}`").into() })
        })
        .collect()
}
