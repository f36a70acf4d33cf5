//! Replays a recorded key-signal script against a task page from the command
//! line.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::buffer::{timing_precision, InProcessLoader, ModuleLoader};
use crate::capture::{Clock, ManualClock, SystemClock};
use crate::config::CaptureConfig;
use crate::models::{DeviceInfo, KeySignal, TaskParams};
use crate::page::{PageServices, TaskPage};
use crate::store::SqliteStore;
use crate::upload::UploadClient;

#[derive(Debug, Parser)]
#[command(name = "keystroke-capture", version, about = "Replay key signals through a task page and submit the capture")]
pub(crate) struct Args {
    /// Task page query string, e.g. `user_id=u1&platform_id=0&task_id=3`.
    #[arg(long)]
    query: String,

    /// JSON script of key signals and the final field text.
    #[arg(long)]
    script: PathBuf,

    #[arg(long, default_value = "keystroke-capture.json")]
    config: PathBuf,

    /// SQLite file holding submission markers and drafts.
    #[arg(long, default_value = "keystroke-state.sqlite3")]
    store: PathBuf,

    /// Upload to the configured endpoint instead of simulating.
    #[arg(long)]
    live: bool,

    /// Capture with the typed buffer only.
    #[arg(long)]
    typed: bool,

    /// Print the host clock's resolution before replaying.
    #[arg(long)]
    timing_test: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedSignal {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Milliseconds since the page opened.
    pub at: f64,
    #[serde(flatten)]
    pub signal: KeySignal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub signals: Vec<ScriptedSignal>,
}

impl ReplayScript {
    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("invalid replay script")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script from {}", path.display()))?;
        Self::parse(&contents)
    }
}

pub(crate) async fn execute(args: Args) -> Result<()> {
    if args.timing_test {
        let host = SystemClock::new();
        let report = timing_precision(|| host.now_ms());
        info!("Host clock origin {} ms", host.origin_epoch_ms());
        println!("{report}");
    }

    let mut config = CaptureConfig::load(&args.config)?;
    if !args.live {
        config.upload.local_dev = true;
    }
    if args.typed {
        config.buffer.prefer_module = false;
    }

    let script = ReplayScript::load(&args.script)?;
    let clock = ManualClock::new(Utc::now().timestamp_millis() as f64);
    let loader: Arc<dyn ModuleLoader> = Arc::new(InProcessLoader);

    let services = PageServices {
        store: Arc::new(SqliteStore::open(args.store.clone())?),
        uploader: UploadClient::from_config(&config.upload),
        clock: Arc::new(clock.clone()),
        loader: Some(loader),
        device: DeviceInfo {
            user_agent: format!("keystroke-capture/{}", env!("CARGO_PKG_VERSION")),
            ..DeviceInfo::default()
        },
    };

    let mut page = TaskPage::open(TaskParams::from_query(&args.query), config, services).await?;

    for step in &script.signals {
        clock.set(step.at);
        match step.kind {
            SignalKind::Down => {
                page.key_down(&step.signal);
            }
            SignalKind::Up => page.key_up(&step.signal),
        }
    }
    page.set_text(&script.text);

    let engine = page.engine();
    info!(
        "Replayed {} signals: {} events, {} dropped, {} unmatched releases",
        script.signals.len(),
        engine.count().await?,
        engine.dropped(),
        engine.anomalies()
    );
    println!("{}", engine.export_table().await?);

    let outcome = page.submit().await;
    page.unload().await?;

    match outcome {
        Ok(success) => {
            info!("Submitted; next page {}", success.navigate_to);
            println!("{}", success.navigate_to);
            Ok(())
        }
        Err(err) => {
            error!("Submission failed: {err}");
            bail!("submission failed: {err}")
        }
    }
}
