//! Flow-run monitor CLI.
//!
//! Replays captured runner messages through the same reducer the UI server
//! uses, for debugging runs offline and for scripting status checks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use flowrun::core::types::OverallStatus;
use flowrun::exit_codes;
use flowrun::io::config::{DEFAULT_CONFIG_FILE, MonitorConfig, load_config, write_config};
use flowrun::render::render_report;
use flowrun::replay::{ReplayOutcome, ReplaySource, replay_file};

#[derive(Parser)]
#[command(
    name = "flowrun",
    version,
    about = "Reduce flow-run WebSocket messages into per-API outcomes"
)]
struct Cli {
    /// Config file (defaults apply when missing).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// More diagnostics on stderr (-v, -vv, -vvv). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a capture (or raw message log) and print the execution view.
    Replay {
        file: PathBuf,
        /// Treat FILE as one raw WebSocket message per line.
        #[arg(long)]
        raw: bool,
        /// Run id used for the report and capture name.
        #[arg(long, default_value = "replay")]
        run_id: String,
        /// Print the execution view as JSON instead of a text report.
        #[arg(long)]
        json: bool,
        /// Write the replayed ledger as a capture.
        #[arg(long)]
        capture_out: Option<PathBuf>,
    },
    /// Print the overall status of a replayed run; exit code reflects it.
    Status {
        file: PathBuf,
        #[arg(long)]
        raw: bool,
    },
    /// Print the effective config.
    Config {
        /// Write the effective config to the config path.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    flowrun::logging::init(flowrun::logging::verbosity_directive(cli.verbose));
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Replay {
            file,
            raw,
            run_id,
            json,
            capture_out,
        } => cmd_replay(&config, &file, raw, &run_id, json, capture_out.as_deref()),
        Command::Status { file, raw } => cmd_status(&config, &file, raw),
        Command::Config { write } => cmd_config(&config, &cli.config, write),
    }
}

fn source(raw: bool) -> ReplaySource {
    if raw {
        ReplaySource::RawMessages
    } else {
        ReplaySource::Capture
    }
}

fn cmd_replay(
    config: &MonitorConfig,
    file: &Path,
    raw: bool,
    run_id: &str,
    json: bool,
    capture_out: Option<&Path>,
) -> Result<i32> {
    let outcome = replay_file(
        file,
        source(raw),
        run_id,
        config.reducer.options(),
        capture_out,
    )?;
    print_outcome(&outcome, json)?;
    Ok(exit_codes::OK)
}

fn print_outcome(outcome: &ReplayOutcome, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::to_string_pretty(&outcome.view).context("serialize view")?;
        println!("{payload}");
    } else {
        let report = render_report(&outcome.run_id, &outcome.view, &outcome.metrics)?;
        print!("{report}");
    }
    Ok(())
}

fn cmd_status(config: &MonitorConfig, file: &Path, raw: bool) -> Result<i32> {
    let outcome = replay_file(file, source(raw), "status", config.reducer.options(), None)?;
    let status = outcome.overall_status();
    println!("{}", status.as_str());
    Ok(status_exit_code(status))
}

fn status_exit_code(status: OverallStatus) -> i32 {
    match status {
        OverallStatus::AllOk => exit_codes::OK,
        OverallStatus::Pending => exit_codes::PENDING,
        OverallStatus::Failed => exit_codes::FAILED,
    }
}

fn cmd_config(config: &MonitorConfig, path: &Path, write: bool) -> Result<i32> {
    if write {
        write_config(path, config)?;
    }
    let rendered = toml::to_string_pretty(config).context("serialize config toml")?;
    print!("{rendered}");
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_replay_defaults() {
        let cli = Cli::parse_from(["flowrun", "replay", "cap.jsonl"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Command::Replay {
                file,
                raw,
                run_id,
                json,
                capture_out,
            } => {
                assert_eq!(file, PathBuf::from("cap.jsonl"));
                assert!(!raw);
                assert_eq!(run_id, "replay");
                assert!(!json);
                assert!(capture_out.is_none());
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn parse_status_raw_with_global_config() {
        let cli = Cli::parse_from([
            "flowrun", "status", "--raw", "m.log", "--config", "c.toml", "-vv",
        ]);
        assert_eq!(cli.config, PathBuf::from("c.toml"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Status { raw: true, .. }));
    }

    #[test]
    fn status_maps_to_exit_codes() {
        assert_eq!(status_exit_code(OverallStatus::AllOk), exit_codes::OK);
        assert_eq!(status_exit_code(OverallStatus::Pending), exit_codes::PENDING);
        assert_eq!(status_exit_code(OverallStatus::Failed), exit_codes::FAILED);
    }
}
