use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use folio_core::types::{ChatMode, TranscriptEntry};
use folio_engine::chat::{SendOutcome, SkipReason};
use folio_engine::engine::PortfolioEngine;
use folio_engine::error::{ChannelNotifier, NoticeKind};
use folio_runtime::config_store::load_config;
use folio_runtime::runtime_engine::build_engine_from_config;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  /call         start a voice call
  /hangup       end the current call
  /text         switch to text mode (ends any call)
  /voice        switch to voice mode
  /summary      summarize the conversation so far
  /transcript   print the full transcript
  /help         show this help
  /quit         exit
anything else is sent as a text message";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Call,
    Hangup,
    Text,
    Voice,
    Summary,
    Transcript,
    Help,
    Quit,
    Say(String),
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Say(line.to_string());
    }

    match line {
        "/call" => Command::Call,
        "/hangup" => Command::Hangup,
        "/text" => Command::Text,
        "/voice" => Command::Voice,
        "/summary" => Command::Summary,
        "/transcript" => Command::Transcript,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

fn format_entry(entry: &TranscriptEntry) -> String {
    format!("{}: {}", entry.role.as_str(), entry.content)
}

/// Lines for entries that are new or changed since `prev`.
fn render_transcript_diff(prev: &[TranscriptEntry], next: &[TranscriptEntry]) -> Vec<String> {
    next.iter()
        .enumerate()
        .filter(|(i, entry)| prev.get(*i) != Some(*entry))
        .map(|(_, entry)| format_entry(entry))
        .collect()
}

#[derive(Parser, Debug)]
#[command(name = "folio", about = "Talk to the portfolio guide", after_help = HELP)]
struct Args {
    /// JSON config file; environment overrides still apply on top.
    #[arg(short, long, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,
}

fn spawn_watchers(engine: &PortfolioEngine) {
    let mut transcript = engine.subscribe_transcript();
    tokio::spawn(async move {
        let mut prev = transcript.borrow_and_update().clone();
        while transcript.changed().await.is_ok() {
            let next = transcript.borrow_and_update().clone();
            for line in render_transcript_diff(&prev, &next) {
                println!("{line}");
            }
            prev = next;
        }
    });

    let mut nav = engine.subscribe_navigation();
    tokio::spawn(async move {
        while nav.changed().await.is_ok() {
            let state = nav.borrow_and_update().clone();
            match state.project_id {
                Some(id) => println!("[page] {} ({id})", state.page),
                None => println!("[page] {}", state.page),
            }
        }
    });

    let mut status = engine.subscribe_call_status();
    tokio::spawn(async move {
        let mut prev = *status.borrow_and_update();
        while status.changed().await.is_ok() {
            let next = *status.borrow_and_update();
            if next.is_calling != prev.is_calling {
                println!(
                    "[call] {}",
                    if next.is_calling { "connected" } else { "ended" }
                );
            }
            if next.agent_talking != prev.agent_talking {
                println!(
                    "[call] agent {}",
                    if next.agent_talking {
                        "speaking"
                    } else {
                        "listening"
                    }
                );
            }
            prev = next;
        }
    });
}

async fn run_command(engine: &PortfolioEngine, cmd: Command) -> bool {
    match cmd {
        Command::Empty => {}
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
        Command::Unknown(cmd) => eprintln!("unknown command: {cmd} (try /help)"),
        Command::Call => {
            // Failures are already reported through the notice channel.
            if let Err(e) = engine.start_call().await {
                log::debug!("start_call failed: {e}");
            }
        }
        Command::Hangup => engine.end_call().await,
        Command::Text => engine.set_mode(ChatMode::Text).await,
        Command::Voice => engine.set_mode(ChatMode::Voice).await,
        Command::Transcript => {
            for entry in engine.transcript() {
                println!("{}", format_entry(&entry));
            }
        }
        Command::Summary => match engine.summarize().await {
            Ok(Some(summary)) => println!("[summary] {summary}"),
            Ok(None) => println!("[summary] nothing to summarize yet"),
            Err(e) => log::debug!("summary failed: {e}"),
        },
        Command::Say(text) => match engine.send_text(&text).await {
            SendOutcome::Skipped(SkipReason::InFlight) => {
                eprintln!("still waiting on the previous reply")
            }
            SendOutcome::Skipped(SkipReason::Blank) => {}
            SendOutcome::Completed { reply: None } => log::info!("reply stream carried no text"),
            SendOutcome::Completed { .. } => {}
            SendOutcome::Failed(e) => log::debug!("send failed: {e}"),
        },
    }
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let cfg = load_config(args.config.as_deref()).context("load config")?;
    let (notifier, mut notices) = ChannelNotifier::channel();
    let engine = build_engine_from_config(&cfg, Arc::new(notifier)).context("build engine")?;

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice.kind {
                NoticeKind::Info => eprintln!("[info] {}", notice.message),
                NoticeKind::Error => eprintln!("[error] {}", notice.message),
            }
        }
    });
    spawn_watchers(&engine);

    log::info!("folio ready on page {} (/help for commands)", engine.navigation().page);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        if !run_command(&engine, parse_command(&line)).await {
            break;
        }
    }

    engine.end_call().await;
    Ok(())
}
