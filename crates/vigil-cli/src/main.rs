//! vigil — CLI for the Vigil attendance liveness daemon.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod setup;

#[derive(Parser)]
#[command(name = "vigil", about = "Vigil liveness-gated attendance", version)]
struct Cli {
    /// Use the session bus instead of the system bus.
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download and verify the detector models capture agents load.
    Setup {
        /// Target model directory (defaults to the shared directory).
        #[arg(long)]
        model_dir: Option<String>,
    },
    /// Show daemon status.
    Status,
    /// Begin a fresh liveness check. Prints the new session epoch.
    Begin,
    /// Print the current session snapshot.
    Snapshot,
    /// Reset all session state. Prints the new session epoch.
    Reset,
    /// Mark attendance for a student, gated on the current verdict.
    Mark { subject: String, student: String },
    /// List attendance records for a subject.
    List { subject: String },
    /// Replay captured observation JSON lines against the daemon.
    Feed {
        /// File of per-frame observation objects, one JSON value per line.
        path: PathBuf,
        /// Delay between frames in milliseconds.
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

#[zbus::proxy(
    interface = "org.freedesktop.Vigil1",
    default_service = "org.freedesktop.Vigil1",
    default_path = "/org/freedesktop/Vigil1"
)]
trait Vigil {
    async fn begin_check(&self) -> zbus::Result<u64>;
    async fn process_frame(&self, payload: &str) -> zbus::Result<String>;
    async fn snapshot(&self) -> zbus::Result<String>;
    async fn reset(&self) -> zbus::Result<u64>;
    async fn status(&self) -> zbus::Result<String>;
    async fn mark_attendance(&self, subject: &str, student: &str) -> zbus::Result<String>;
    async fn list_attendance(&self, subject: &str) -> zbus::Result<String>;
}

async fn connect(session: bool) -> Result<zbus::Connection> {
    let conn = if session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    };
    conn.context("failed to connect to D-Bus (is vigild running?)")
}

fn print_pretty(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Replay a JSONL observation capture at the given cadence, printing the
/// resolved status per frame.
async fn run_feed(proxy: &VigilProxy<'_>, path: &PathBuf, interval_ms: u64) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let epoch = proxy.begin_check().await?;
    println!("session epoch {epoch}");

    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame: serde_json::Value = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid JSON", path.display(), lineno + 1))?;

        let payload = serde_json::json!({ "epoch": epoch, "frame": frame }).to_string();
        let response = proxy.process_frame(&payload).await?;
        let response: serde_json::Value = serde_json::from_str(&response)?;

        if response["accepted"].as_bool() == Some(true) {
            let snap = &response["snapshot"];
            println!(
                "frame {:>4}  status={}  blinks={}  liveness={}  anti_spoofing={}  active={}",
                lineno + 1,
                snap["status"],
                snap["eyeBlinkCount"],
                snap["livenessScore"],
                snap["antiSpoofingScore"],
                snap["isActive"],
            );
        } else {
            println!("frame {:>4}  rejected: {}", lineno + 1, response["reason"]);
        }

        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup works offline; everything else talks to the daemon.
    let command = match cli.command {
        Command::Setup { model_dir } => return setup::run(model_dir),
        command => command,
    };

    let conn = connect(cli.session).await?;
    let proxy = VigilProxy::new(&conn).await?;

    match command {
        Command::Setup { .. } => unreachable!("handled above"),
        Command::Status => print_pretty(&proxy.status().await?)?,
        Command::Begin => println!("{}", proxy.begin_check().await?),
        Command::Snapshot => print_pretty(&proxy.snapshot().await?)?,
        Command::Reset => println!("{}", proxy.reset().await?),
        Command::Mark { subject, student } => {
            print_pretty(&proxy.mark_attendance(&subject, &student).await?)?
        }
        Command::List { subject } => print_pretty(&proxy.list_attendance(&subject).await?)?,
        Command::Feed { path, interval_ms } => run_feed(&proxy, &path, interval_ms).await?,
    }

    Ok(())
}
