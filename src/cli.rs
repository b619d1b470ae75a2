use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::model::{EducationLevel, Scope};
use crate::{db, ipc, recalc, telemetry};

#[derive(Parser, Debug)]
#[command(
    name = "resultd",
    about = "Result computation and ranking engine for school assessments",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer line-delimited JSON requests on stdin (default command)
    Serve(ServeArgs),
    /// Run the scoped recalculation job once and print its summary
    Recalculate(RecalculateArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Workspace directory to open before the first request
    #[arg(long)]
    workspace: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RecalculateArgs {
    /// Workspace directory holding the database
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Limit the run to one education level
    #[arg(long, value_parser = parse_level)]
    education_level: Option<EducationLevel>,
    /// Limit the run to one exam session id
    #[arg(long)]
    exam_session: Option<String>,
    /// Limit the run to one class id
    #[arg(long)]
    class: Option<String>,
}

fn parse_level(raw: &str) -> Result<EducationLevel, String> {
    EducationLevel::parse(raw).ok_or_else(|| format!("unknown education level '{raw}'"))
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();
    telemetry::init(&config.telemetry)?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));
    match command {
        Command::Serve(args) => serve(args.workspace.or(config.workspace)),
        Command::Recalculate(args) => {
            let workspace = args
                .workspace
                .clone()
                .or(config.workspace)
                .context("--workspace or RESULTD_WORKSPACE is required")?;
            recalculate(workspace, args)
        }
    }
}

fn recalculate(workspace: PathBuf, args: RecalculateArgs) -> anyhow::Result<()> {
    let conn = db::open_db(&workspace)
        .with_context(|| format!("opening workspace {}", workspace.display()))?;
    let scope = Scope {
        education_level: args.education_level,
        exam_session_id: args.exam_session,
        class_id: args.class,
    };
    let summary = recalc::run(&conn, &scope)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn serve(workspace: Option<PathBuf>) -> anyhow::Result<()> {
    let mut state = ipc::AppState::empty();
    if let Some(path) = workspace {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::warn!(error = %format!("{e:#}"), "startup workspace could not be opened");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    Ok(())
}
