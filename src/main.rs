mod cli;
mod config;
mod db;
mod directory;
mod error;
mod grading;
mod ipc;
mod model;
mod ranking;
mod recalc;
mod results;
mod scoring;
mod telemetry;
mod term_reports;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("resultd error: {err:#}");
        std::process::exit(1);
    }
}
