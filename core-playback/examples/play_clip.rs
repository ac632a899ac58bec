//! # Clip Playback Demo
//!
//! Plays a compressed audio file through the default output device, looping
//! it the requested number of times, then seeks halfway and plays the rest.
//!
//! Run with:
//! ```bash
//! cargo run -p core-playback --example play_clip --features desktop-output -- bell.ogg 3
//! ```
//!
//! Settings come from a `MemorySettingsStore`, so `RUST_LOG` style filters can
//! be passed as a third argument (e.g. `core_playback=trace`).

use bridge_traits::storage::MemorySettingsStore;
use core_playback::{AudioLine, CpalSink, LoopCount, SymphoniaCodecProvider};
use core_runtime::config::EngineConfig;
use core_runtime::events::LineEvent;
use core_runtime::logging::init_logging;
use std::env;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let path = args.get(1).ok_or("usage: play_clip <file> [loops] [log filter]")?;
    let loops: u32 = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(1);

    let mut pairs = vec![("audio.replay", "true".to_string())];
    if let Some(filter) = args.get(3) {
        pairs.push(("log.filter", filter.clone()));
    }
    let engine = EngineConfig::builder()
        .settings_store(Arc::new(MemorySettingsStore::from_pairs(pairs)))
        .build()?;
    init_logging(engine.logging.clone())?;

    let sink = Arc::new(CpalSink::new()?);
    let line = AudioLine::builder(File::open(path)?, sink)
        .engine_config(&engine)
        .codec(SymphoniaCodecProvider::for_path(Path::new(path)))
        .build()?;
    info!(format = %line.format(), codec = ?line.codec(), "Loaded {}", path);

    let mut events = line.subscribe();
    line.open()?;
    line.loop_playback(LoopCount::Times(loops))?;

    while line.is_active() {
        while let Ok(event) = events.try_recv() {
            if let LineEvent::LoopCompleted { count, .. } = event {
                info!(count, "Pass finished");
            }
        }
        thread::sleep(Duration::from_millis(50));
    }
    line.drain()?;

    if let (Some(frames), Some(micros)) = (line.frame_length(), line.microsecond_length()) {
        info!(frames, seconds = micros as f64 / 1e6, "Clip length");
        line.set_frame_position(frames / 2)?;
        line.start()?;
        while line.is_active() {
            thread::sleep(Duration::from_millis(50));
        }
        line.drain()?;
    }

    line.close();
    Ok(())
}
