#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::too_many_lines, clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::Parser;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};
use icy_carousel::surface::{FrameStats, HeadlessSurface};
use icy_carousel::{Carousel, CarouselData, CarouselKey, CarouselOptions};

pub type ViewResult<T> = anyhow::Result<T>;

/// Simulated frame length
const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(version, about = "Drives the icy carousel against an in-memory surface", long_about = None)]
pub struct Args {
    /// JSON file with categories, records and dimensions. Uses the test items if omitted.
    #[clap(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Comma separated keys to replay (up, down, left, right, ok, info)
    #[clap(long, value_delimiter = ',')]
    keys: Vec<String>,

    #[clap(long, default_value_t = 1280)]
    width: u32,

    #[clap(long, default_value_t = 720)]
    height: u32,

    /// Number of frames to simulate
    #[clap(long, default_value_t = 120)]
    frames: u32,

    /// Directory `qrc:/` and `:/` references resolve against
    #[clap(long, value_name = "DIR")]
    resources: Option<PathBuf>,
}

fn get_log_dir() -> Option<PathBuf> {
    let dir = CarouselOptions::config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok()?;
    }
    Some(dir)
}

fn start_logger() -> Option<LoggerHandle> {
    let Some(log_dir) = get_log_dir() else {
        eprintln!("Failed to create log file");
        return None;
    };
    let logger = match Logger::try_with_env_or_str("info, reqwest=warn, hyper=warn, hyper_util=warn") {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("Invalid log specification: {err}");
            return None;
        }
    };
    logger
        .log_to_file(FileSpec::default().directory(&log_dir).basename("icy_carousel").suffix("log").suppress_timestamp())
        .rotate(Criterion::Size(64 * 1024), Naming::Numbers, Cleanup::KeepLogFiles(3))
        .create_symlink(log_dir.join("icy_carousel.log"))
        .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
        .start()
        .ok()
}

fn load_data(path: Option<&PathBuf>) -> ViewResult<CarouselData> {
    let Some(path) = path else {
        return Ok(CarouselData::default_items());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    CarouselData::from_json(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_keys(keys: &[String]) -> ViewResult<Vec<CarouselKey>> {
    keys.iter()
        .filter(|key| !key.trim().is_empty())
        .map(|key| CarouselKey::parse(key).ok_or_else(|| anyhow!("Unknown key '{key}'")))
        .collect()
}

fn run(args: &Args) -> ViewResult<()> {
    let mut options = CarouselOptions::load_options();
    if let Some(resources) = &args.resources {
        options.resource_root = resources.clone();
    }
    let data = load_data(args.data.as_ref())?;
    let keys = parse_keys(&args.keys)?;

    let surface = Arc::new(HeadlessSurface::new(args.width, args.height));
    let mut carousel = Carousel::with_defaults(options, surface.clone())?;
    let start = Instant::now();
    carousel.set_data(data, start);

    let scene = carousel.scene();
    let render_surface = surface.clone();
    let (frame_tx, frame_rx) = mpsc::channel::<()>();
    let render_thread = std::thread::Builder::new().name("render".to_string()).spawn(move || {
        let mut last = FrameStats::default();
        let mut frames = 0usize;
        while frame_rx.recv().is_ok() {
            last = render_surface.render_frame(scene.as_ref());
            frames += 1;
            log::debug!("[Render] frame {}: {:?}", frames, last);
        }
        (frames, last)
    })?;

    let key_every = (args.frames as usize / (keys.len() + 1)).max(1);
    let mut pending_keys = keys.into_iter();
    let mut arrived = 0;
    for frame in 0..args.frames {
        let now = start + FRAME * frame;
        if frame > 0 && frame as usize % key_every == 0 {
            if let Some(key) = pending_keys.next() {
                if !carousel.handle_key(key, now) {
                    log::info!("[View] {:?} not handled", key);
                }
            }
        }
        arrived += carousel.tick(now);
        arrived += carousel.wait_for_loads(FRAME);
        frame_tx.send(()).map_err(|_| anyhow!("Render thread stopped"))?;
    }

    for event in carousel.take_events() {
        log::info!("[View] {:?}", event);
    }

    let summary = serde_json::json!({
        "items": carousel.data().len(),
        "categories": carousel.data().categories().iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
        "selected": carousel.selection().current,
        "arrived": arrived,
        "pending": carousel.loader().pending_count(),
        "cached_textures": carousel.cache().len(),
    });

    carousel.teardown();
    // one frame to pick up the retired nodes, one to free them
    for _ in 0..2 {
        frame_tx.send(()).map_err(|_| anyhow!("Render thread stopped"))?;
    }
    drop(frame_tx);
    let (frames, last) = render_thread.join().map_err(|_| anyhow!("Render thread panicked"))?;
    log::info!("[View] rendered {} frames, last frame drew {} nodes", frames, last.nodes_drawn);

    let scene = carousel.scene();
    if scene.live_nodes() > 0 {
        log::warn!("[View] {} nodes still alive after teardown", scene.live_nodes());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() {
    let args = Args::parse();
    let logger = start_logger();

    log::info!("Starting icy_carousel_view {}", env!("CARGO_PKG_VERSION"));
    if let Err(err) = run(&args) {
        log::error!("{err:#}");
        if logger.is_none() {
            eprintln!("{err:#}");
        }
        std::process::exit(1);
    }
    log::info!("Shutting down.");
}
