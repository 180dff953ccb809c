//! Replay command - re-send recorded messages to the trigger endpoint.
//!
//! The input holds one JSON message object per line. Blank lines are ignored.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;

use common::models::{CallKind, Message, TriggerKind};

/// Arguments for the replay command.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// File with one JSON message per line.
    pub file: PathBuf,

    /// Proposer account to set on every message.
    #[arg(long)]
    pub proposer: Option<String>,

    /// Approver account to set on every message.
    #[arg(long)]
    pub approver: Option<String>,

    /// Only replay messages with this call.
    #[arg(long, value_parser = parse_call)]
    pub call: Option<TriggerKind>,

    /// Print messages without sending them.
    #[arg(long)]
    pub dry_run: bool,

    /// Trigger endpoint to post messages to.
    #[arg(long, default_value = "http://localhost:8010/trigger")]
    pub url: String,
}

fn parse_call(value: &str) -> Result<TriggerKind, String> {
    match CallKind::parse(value) {
        CallKind::Trigger(kind) => Ok(kind),
        _ => Err(format!(
            "expected one of: {}",
            TriggerKind::ALL.map(|kind| kind.as_str()).join(", ")
        )),
    }
}

/// Counts reported after a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Non-blank lines read.
    pub read: usize,
    /// Messages accepted by the endpoint.
    pub sent: usize,
    /// Messages filtered out by `--call`.
    pub skipped: usize,
    /// Lines that could not be parsed or posted.
    pub failed: usize,
}

/// Replays message lines against a trigger endpoint.
pub struct Replayer {
    client: reqwest::Client,
    url: String,
    call: Option<TriggerKind>,
    proposer: Option<String>,
    approver: Option<String>,
    dry_run: bool,
}

impl Replayer {
    /// Build a replayer from command arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(args: &ReplayArgs) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: args.url.clone(),
            call: args.call,
            proposer: args.proposer.clone(),
            approver: args.approver.clone(),
            dry_run: args.dry_run,
        })
    }

    /// Parse one line and apply the account flags. `None` means the line is
    /// filtered out by the call filter.
    fn prepare(&self, line: &str) -> Result<Option<Message>> {
        let value: serde_json::Value =
            serde_json::from_str(line).context("Line is not valid JSON")?;
        let mut message = Message::from_value(value)?;

        if let Some(approver) = &self.approver {
            message.approver = Some(approver.clone());
        }
        if let Some(proposer) = &self.proposer {
            message.proposer = Some(proposer.clone());
        }

        if let Some(kind) = self.call {
            if message.call_kind().trigger_kind() != Some(kind) {
                return Ok(None);
            }
        }

        Ok(Some(message))
    }

    async fn post(&self, message: &Message) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&message.to_value())
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Endpoint responded with {status}"));
        }
        Ok(())
    }

    /// Replay every non-blank line of `content`, pretty-printing each
    /// message to `out`. Failures are logged and counted, never fatal.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to `out` fails.
    pub async fn replay<W: Write>(&self, content: &str, out: &mut W) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            summary.read += 1;
            let line_number = index + 1;

            let message = match self.prepare(line) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(line = line_number, error = %e, "Skipping unreadable line");
                    summary.failed += 1;
                    continue;
                }
            };

            writeln!(out, "{}", serde_json::to_string_pretty(&message.to_value())?)?;

            if self.dry_run {
                continue;
            }

            match self.post(&message).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    tracing::error!(line = line_number, error = %e, "[Error] Failed pushing");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Execute the replay command.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn execute(args: ReplayArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read replay file: {:?}", args.file))?;

    let replayer = Replayer::new(&args)?;
    let summary = replayer.replay(&content, &mut std::io::stdout()).await?;

    println!();
    println!("  Read:     {}", summary.read);
    println!("  Sent:     {}", summary.sent);
    println!("  Skipped:  {}", summary.skipped);
    println!("  Failed:   {}", summary.failed);
    Ok(())
}
