//! draw-runner: headless draw generator for the lotto engine.
//!
//! Usage:
//!   draw-runner --algorithm adaptive --rng verifiable --count 5
//!   draw-runner --algorithm sequential --history data/history.json --order oldest_first
//!   draw-runner --algorithm simulation --realtime
//!   draw-runner --ipc-mode

use anyhow::{anyhow, Result};
use lotto_core::{
    config::DrawConfig,
    event::SimEvent,
    orchestrator::{DrawOrchestrator, DrawRecord},
    rng::{resolve_source, EntropyBeacon, HttpBeacon, RngType},
    simulation::DrumSimulation,
    snapshot::ColorBand,
    strategy::Algorithm,
    types::{DrawHistory, DrawResult, HistoryOrder},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Generate {
        #[serde(default)]
        algorithm: Option<String>,
        #[serde(default)]
        rng: Option<String>,
    },
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let count = parse_arg(&args, "--count", 1u32);
    let seed = arg_value(&args, "--seed").map(str::parse::<u64>).transpose()?;
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let realtime = args.iter().any(|a| a == "--realtime");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let algorithm: Algorithm = arg_value(&args, "--algorithm").unwrap_or("flat_weighted").parse()?;
    let rng_type: RngType = arg_value(&args, "--rng").unwrap_or("pseudorandom").parse()?;

    let mut config = load_config(data_dir)?;
    if let Some(seed) = seed {
        config.entropy.pseudorandom_seed = Some(seed);
    }
    let order = match arg_value(&args, "--order") {
        Some(s) => parse_order(s)?,
        None => config.history_order,
    };
    let history = load_history(arg_value(&args, "--history"), data_dir, order)?;

    if !ipc_mode {
        println!("lotto draw-runner");
        println!("  algorithm: {algorithm}");
        println!("  rng:       {rng_type}");
        println!("  count:     {count}");
        println!("  history:   {} draws ({order:?})", history.len());
        println!("  data_dir:  {data_dir}");
        println!();
    }

    if realtime && algorithm == Algorithm::Simulation && !ipc_mode {
        let beacon = HttpBeacon::new(&config.entropy)?;
        for i in 1..=count {
            let result = run_realtime(&config, rng_type, &beacon, u64::from(i)).await?;
            println!("#{i:<3} {:?} + {}", result.main, result.bonus);
        }
        return Ok(());
    }

    let orchestrator =
        DrawOrchestrator::new(config.clone()).with_beacon(Arc::new(HttpBeacon::new(&config.entropy)?));

    if ipc_mode {
        run_ipc_loop(&orchestrator, algorithm, rng_type, &history).await?;
    } else {
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            records.push(orchestrator.generate(algorithm, rng_type, &history).await?);
        }
        print_summary(&records);
    }

    Ok(())
}

async fn run_ipc_loop(
    orchestrator: &DrawOrchestrator,
    default_algorithm: Algorithm,
    default_rng: RngType,
    history: &DrawHistory,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, e)?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Generate { algorithm, rng } => {
                let request = parse_request(algorithm.as_deref(), rng.as_deref(), default_algorithm, default_rng);
                let outcome = match request {
                    Ok((algorithm, rng)) => orchestrator
                        .generate(algorithm, rng, history)
                        .await
                        .map_err(anyhow::Error::from),
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(record) => writeln!(stdout, "{}", serde_json::to_string(&record)?)?,
                    Err(e) => write_error(&mut stdout, e)?,
                }
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn parse_request(
    algorithm: Option<&str>,
    rng: Option<&str>,
    default_algorithm: Algorithm,
    default_rng: RngType,
) -> Result<(Algorithm, RngType)> {
    let algorithm = algorithm.map(str::parse::<Algorithm>).transpose()?.unwrap_or(default_algorithm);
    let rng = rng.map(str::parse::<RngType>).transpose()?.unwrap_or(default_rng);
    Ok((algorithm, rng))
}

fn write_error(stdout: &mut io::Stdout, e: impl std::fmt::Display) -> Result<()> {
    let err_json = serde_json::json!({ "error": e.to_string() });
    writeln!(stdout, "{}", err_json)?;
    stdout.flush()?;
    Ok(())
}

/// Drive the drum at its frame rate and print extractions as they land.
async fn run_realtime(
    config: &DrawConfig,
    rng_type: RngType,
    beacon: &dyn EntropyBeacon,
    stream: u64,
) -> Result<DrawResult> {
    let mut rng = resolve_source(rng_type, &config.entropy, Some(beacon), stream).await;
    let mut drum = DrumSimulation::new(config);
    drum.start(rng.as_mut()).await;

    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / config.drum.frame_rate));
    loop {
        interval.tick().await;
        for event in drum.tick(rng.as_mut()).await? {
            log::debug!("{} at frame {}", event.kind(), event.frame());
            let secs = event.frame() as f64 / config.drum.frame_rate;
            match event {
                SimEvent::BallExtracted { ball, position, .. } => {
                    let color = ColorBand::for_number(ball).hex();
                    println!("  [{secs:>6.2}s] ball {ball:>2} {color} ({position})");
                }
                SimEvent::SimulationStalled { idle_secs, .. } => {
                    println!("  ... nothing through the port for {idle_secs:.0}s");
                }
                SimEvent::SimulationCompleted { result, .. } => return Ok(result),
                _ => {}
            }
        }
        if !drum.is_running() {
            return Err(anyhow!("drum stopped before the draw completed"));
        }
    }
}

fn load_config(data_dir: &str) -> Result<DrawConfig> {
    let path = format!("{data_dir}/draw_config.json");
    if Path::new(&path).exists() {
        Ok(DrawConfig::load(data_dir)?)
    } else {
        log::info!("{path} not found, using built-in defaults");
        Ok(DrawConfig::default())
    }
}

fn load_history(explicit: Option<&str>, data_dir: &str, order: HistoryOrder) -> Result<DrawHistory> {
    if let Some(path) = explicit {
        return Ok(DrawHistory::from_json_file(path, order)?);
    }
    let default_path = format!("{data_dir}/history.json");
    if Path::new(&default_path).exists() {
        Ok(DrawHistory::from_json_file(&default_path, order)?)
    } else {
        log::info!("No history file, drawing without history");
        Ok(DrawHistory::empty())
    }
}

fn parse_order(s: &str) -> Result<HistoryOrder> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| anyhow!("unknown history order '{s}': {e}"))
}

fn print_summary(records: &[DrawRecord]) {
    println!("=== DRAWS ===");
    for (i, record) in records.iter().enumerate() {
        let fallback = if record.fallback { "  (fallback)" } else { "" };
        println!(
            "  #{:<3} {:?} + {:<2}  {}/{}{fallback}",
            i + 1,
            record.result.main,
            record.result.bonus,
            record.algorithm,
            record.rng,
        );
    }
    let fallbacks = records.iter().filter(|r| r.fallback).count();
    println!();
    println!("  draws:     {}", records.len());
    println!("  fallbacks: {fallbacks}");
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_flag_uses_the_serialized_names() {
        assert_eq!(parse_order("newest_first").unwrap(), HistoryOrder::NewestFirst);
        assert_eq!(parse_order("oldest_first").unwrap(), HistoryOrder::OldestFirst);
        assert!(parse_order("NewestFirst").is_err());
        assert!(parse_order("sideways").is_err());
    }
}
