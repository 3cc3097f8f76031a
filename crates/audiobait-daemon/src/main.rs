use std::path::PathBuf;
use std::sync::Arc;

use audiobait_daemon::api_client::HttpApiClient;
use audiobait_daemon::audio_sink::SoundCardPlayer;
use audiobait_daemon::connection::HttpProbeConnectionRequester;
use audiobait_daemon::downloader::{Downloader, Updated};
use audiobait_daemon::player::SchedulePlayer;
use audiobait_daemon::recorder::{EventRecorder, FileEventSink};
use audiobait_daemon::rpc::{self, RpcState};
use audiobait_proto::config::Config;
use audiobait_proto::schedule::Schedule;
use audiobait_proto::window::SystemClock;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "audiobaitd", about = "Audio-lure scheduler for wildlife-monitoring units")]
struct Cli {
    /// Directory holding config.toml; defaults to the platform config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Prefix log lines with a timestamp (off by default; the supervisor's
    /// log collector usually adds its own).
    #[arg(short, long)]
    timestamps: bool,
}

fn init_tracing(timestamps: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,audiobait_daemon=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.timestamps);

    if let Err(err) = run(cli).await {
        error!(error = %err, "audiobaitd exiting on fatal error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> audiobait_proto::error::AudiobaitResult<()> {
    let config_path = Config::config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    info!(path = %config_path.display(), "config loaded");

    std::fs::create_dir_all(&config.daemon.audio_dir)?;

    let api = Arc::new(HttpApiClient::new(
        config.daemon.api_base_url.clone(),
        config.daemon.device_group.clone(),
        config.daemon.api_key.clone(),
    )?);
    let connection = Arc::new(HttpProbeConnectionRequester::new(&config.daemon.api_base_url));
    let clock = Arc::new(SystemClock);

    let event_sink = Arc::new(FileEventSink::new(&config.daemon.audio_dir));
    let playback_lock = Arc::new(tokio::sync::Mutex::new(()));
    let rpc_sink = SoundCardPlayer::new(
        config.audio.card,
        config.audio.volume_control.clone(),
        config.audio.player_binary.clone(),
    );
    let rpc_state = Arc::new(RpcState::new(
        rpc_sink,
        FileEventSink::new(&config.daemon.audio_dir),
        config.daemon.audio_dir.clone(),
        playback_lock.clone(),
    ));
    let rpc_router = rpc::router(rpc_state);
    let bind = format!("{}:{}", config.rpc.bind_address, config.rpc.port);
    let listener = tokio::net::TcpListener::bind(&bind).await.map_err(|e| {
        audiobait_proto::AudiobaitError::BusNameTaken(format!("binding rpc on {bind}: {e}"))
    })?;
    info!(bind = %bind, "rpc service listening");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, rpc_router).await {
            error!(error = %err, "rpc service stopped unexpectedly");
        }
    });

    let downloader = Downloader::new(
        api,
        connection,
        config.daemon.audio_dir.clone(),
        config.polling.interval_minutes_low,
        config.polling.interval_minutes_high,
    );
    let (updated_tx, mut updated_rx) = mpsc::channel::<Updated>(128);
    let (_stop_tx, stop_rx) = mpsc::channel::<()>(1);
    tokio::spawn(downloader.run(updated_tx, stop_rx));

    let schedule_path = config.daemon.audio_dir.join("schedule.json");
    loop {
        let schedule = match load_schedule(&schedule_path) {
            Some(s) => s,
            None => {
                info!("no schedule on disk yet; waiting for the downloader");
                updated_rx.recv().await;
                continue;
            }
        };

        let sink = SoundCardPlayer::new(
            config.audio.card,
            config.audio.volume_control.clone(),
            config.audio.player_binary.clone(),
        );
        let recorder = EventRecorder::new_shared(event_sink.clone());
        let mut player = SchedulePlayer::new(
            clock.clone(),
            sink,
            recorder,
            config.daemon.audio_dir.clone(),
            playback_lock.clone(),
        );

        let play_time = player.until_next_combo(&schedule.combos);

        tokio::select! {
            _ = updated_rx.recv() => {
                info!("schedule updated; reloading");
            }
            _ = wait_for(play_time) => {
                player.play_todays_schedule(&schedule).await;
            }
        }
    }
}

fn load_schedule(path: &std::path::Path) -> Option<Schedule> {
    let bytes = std::fs::read(path).ok()?;
    match Schedule::parse(&bytes) {
        Ok(s) => Some(s),
        Err(err) => {
            warn!(error = %err, "schedule on disk is not valid; waiting for a fresh one");
            None
        }
    }
}

async fn wait_for(d: Option<chrono::Duration>) {
    match d {
        Some(d) => tokio::time::sleep(d.to_std().unwrap_or(std::time::Duration::ZERO)).await,
        None => std::future::pending().await,
    }
}
