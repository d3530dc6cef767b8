//! Entry point: logging, CLI configuration, then the window loop.

mod config;

use anyhow::Result;

use config::AppConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_args(std::env::args());
    log::info!(
        "Starting ObjView. Backend: {:?}, scene={}, model={}, frames_in_flight={}, overlay={}, show_fps={}, window_size={}x{}",
        config.backends,
        config.scene,
        config
            .model
            .as_deref()
            .map_or_else(|| "<built-in>".to_string(), |p| p.display().to_string()),
        config.frames_in_flight,
        config.overlay,
        config.show_fps,
        config.width,
        config.height
    );

    platform::run_with_renderer(config.run_options())?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
