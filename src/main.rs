// Calendar engine replay tool
// Main entry point

mod replay;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use calendar_engine::services::settings::SettingsService;
use calendar_engine::services::store::sqlite::SqliteEventStore;

use replay::{render_events, Replay, ReplayScript};

const USAGE: &str = "usage: calendar-engine <script.json> [--db <path>] [--settings <path>]";

struct Args {
    script: PathBuf,
    db: Option<String>,
    settings: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut script = None;
    let mut db = None;
    let mut settings = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db = Some(args.next().context(USAGE)?),
            "--settings" => settings = Some(PathBuf::from(args.next().context(USAGE)?)),
            "-h" | "--help" => bail!(USAGE),
            other if script.is_none() && !other.starts_with("--") => {
                script = Some(PathBuf::from(other))
            }
            other => bail!("unexpected argument '{}'\n{}", other, USAGE),
        }
    }

    Ok(Args {
        script: script.context(USAGE)?,
        db,
        settings,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args = parse_args(std::env::args().skip(1))?;

    let settings_path = args
        .settings
        .or_else(SettingsService::default_path)
        .context("No settings path available on this platform")?;
    let settings = SettingsService::new(settings_path).load_or_default();

    let store = match &args.db {
        Some(path) => SqliteEventStore::open(path)?,
        None => SqliteEventStore::in_memory()?,
    };
    log::info!(
        "Replaying {} against {}",
        args.script.display(),
        args.db.as_deref().unwrap_or("an in-memory store")
    );

    let script = ReplayScript::from_file(&args.script)?;
    let mut replay = Replay::new(&store, &settings, script.container_width);
    for report in replay.run(&script).await? {
        println!("step {}: {}", report.index, report.result);
    }
    println!("{}", render_events(replay.cache())?);

    Ok(())
}
