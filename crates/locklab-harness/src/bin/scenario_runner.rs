//! Run the LockLab scenarios from the command line and report as JSON.
//!
//! Exits non-zero when a scenario's asserted property does not hold. The
//! deadlock scenario's asserted property is *non*-completion within the
//! timeout; a completed run there is the failure.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use serde::Serialize;

use locklab_harness::{
    log, run_deadlock_scenario, run_guarded_withdraw_scenario, run_race_scenario,
    run_singleton_scenario,
};

const DEFAULT_CONCURRENCY: usize = 16;
const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_INCREMENTS: usize = 10_000;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_INITIAL_BALANCE: i64 = 1_000;

const USAGE: &str = "\
usage: scenario_runner [options]

options:
  --scenario <all|singleton|withdraw|deadlock|race>   scenario to run (default: all)
  --concurrency <N>        singleton accessor threads (default: 16)
  --timeout-ms <MS>        deadlock watchdog deadline (default: 2000)
  --increments <K>         race scenario total increments (default: 10000)
  --workers <W>            race scenario worker threads (default: 4)
  --initial-balance <B>    withdraw scenario starting balance (default: 1000)
  --amounts <A,B,...>      withdraw scenario amounts (default: 800,800)
  --help                   print this message
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    All,
    Singleton,
    Withdraw,
    Deadlock,
    Race,
}

#[derive(Debug, Clone)]
struct Config {
    scenario: Scenario,
    concurrency: usize,
    timeout_ms: u64,
    increments: usize,
    workers: usize,
    initial_balance: i64,
    amounts: Vec<i64>,
    help: bool,
}

impl Config {
    fn parse() -> Result<Self, String> {
        let mut config = Self {
            scenario: Scenario::All,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            increments: DEFAULT_INCREMENTS,
            workers: DEFAULT_WORKERS,
            initial_balance: DEFAULT_INITIAL_BALANCE,
            amounts: vec![800, 800],
            help: false,
        };

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scenario" => {
                    config.scenario = match next_value(&mut args, "--scenario")?.as_str() {
                        "all" => Scenario::All,
                        "singleton" => Scenario::Singleton,
                        "withdraw" => Scenario::Withdraw,
                        "deadlock" => Scenario::Deadlock,
                        "race" => Scenario::Race,
                        other => return Err(format!("unknown scenario '{other}'")),
                    };
                }
                "--concurrency" => config.concurrency = parse_number(&mut args, "--concurrency")?,
                "--timeout-ms" => config.timeout_ms = parse_number(&mut args, "--timeout-ms")?,
                "--increments" => config.increments = parse_number(&mut args, "--increments")?,
                "--workers" => config.workers = parse_number(&mut args, "--workers")?,
                "--initial-balance" => {
                    config.initial_balance = parse_number(&mut args, "--initial-balance")?;
                }
                "--amounts" => {
                    let raw = next_value(&mut args, "--amounts")?;
                    config.amounts = raw
                        .split(',')
                        .map(|part| {
                            part.trim()
                                .parse::<i64>()
                                .map_err(|_| format!("invalid amount '{part}'"))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                }
                "--help" | "-h" => config.help = true,
                other => return Err(format!("unknown argument '{other}'")),
            }
        }
        Ok(config)
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} needs a value"))
}

fn parse_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<T, String> {
    let raw = next_value(args, flag)?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid value '{raw}' for {flag}"))
}

fn emit<T: Serialize>(name: &str, report: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|err| format!("failed to serialize {name} report: {err}"))?;
    println!("{name}: {json}");
    Ok(())
}

fn run(config: &Config) -> Result<bool, String> {
    let mut all_hold = true;
    let selected = |scenario| config.scenario == Scenario::All || config.scenario == scenario;

    if selected(Scenario::Singleton) {
        let report =
            run_singleton_scenario(config.concurrency).map_err(|err| err.to_string())?;
        emit("singleton", &report)?;
        all_hold &= report.holds();
    }

    if selected(Scenario::Withdraw) {
        let report = run_guarded_withdraw_scenario(config.initial_balance, &config.amounts)
            .map_err(|err| err.to_string())?;
        emit("withdraw", &report)?;
        all_hold &= report.holds();
    }

    if selected(Scenario::Deadlock) {
        let report = run_deadlock_scenario(Duration::from_millis(config.timeout_ms))
            .map_err(|err| err.to_string())?;
        emit("deadlock", &report)?;
        // Non-completion is the asserted property here.
        all_hold &= !report.completed;
    }

    if selected(Scenario::Race) {
        let report = run_race_scenario(config.increments, config.workers)
            .map_err(|err| err.to_string())?;
        emit("race", &report)?;
        all_hold &= report.observed <= report.expected;
    }

    Ok(all_hold)
}

fn main() -> ExitCode {
    log::init();

    let config = match Config::parse() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            eprint!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if config.help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("error: at least one scenario property did not hold");
            ExitCode::FAILURE
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
