//! Command-line configuration.
//!
//! Flags use the `--name=value` form; unknown values fall back to defaults
//! with a warning instead of aborting start-up.

use std::path::PathBuf;

use platform::RunOptions;
use renderer::{MAX_FRAMES_IN_FLIGHT, RendererOptions, SceneKind};

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub backends: wgpu::Backends,
    pub show_fps: bool,
    pub width: u32,
    pub height: u32,
    pub scene: SceneKind,
    pub model: Option<PathBuf>,
    pub frames_in_flight: usize,
    pub overlay: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            show_fps: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scene: SceneKind::default(),
            model: None,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            overlay: false,
        }
    }
}

impl AppConfig {
    /// Parse process arguments (the program name included is fine).
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let args: Vec<&str> = args.iter().map(|arg| arg.as_ref()).collect();
        let (width, height) = parse_size_args(&args);
        Self {
            backends: parse_backend_arg(&args),
            show_fps: parse_switch(&args, "show-fps"),
            width,
            height,
            scene: parse_scene_arg(&args),
            model: last_value(&args, "--model=").map(PathBuf::from),
            frames_in_flight: parse_frames_in_flight_arg(&args),
            overlay: parse_switch(&args, "overlay"),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            renderer: RendererOptions {
                backends: self.backends,
                in_flight_buffers_count: self.frames_in_flight,
                overlay: self.overlay,
            },
            scene: self.scene,
            model: self.model.clone(),
            show_fps: self.show_fps,
            width: self.width,
            height: self.height,
        }
    }
}

fn last_value<'a>(args: &[&'a str], prefix: &str) -> Option<&'a str> {
    args.iter().rev().find_map(|arg| arg.strip_prefix(prefix))
}

fn parse_backend_arg(args: &[&str]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    match last_value(args, "--gpu-backend=").map(str::to_ascii_lowercase) {
        None => wgpu::Backends::all(),
        Some(val) => match val.as_str() {
            "auto" => wgpu::Backends::all(),
            "vulkan" | "vk" => wgpu::Backends::VULKAN,
            "dx12" | "d3d12" => wgpu::Backends::DX12,
            "metal" | "mtl" => wgpu::Backends::METAL,
            "gl" | "opengl" | "gles" => wgpu::Backends::GL,
            other => {
                log::warn!("Unknown backend '{}', falling back to auto.", other);
                wgpu::Backends::all()
            }
        },
    }
}

/// `--name` or `--name=on|off`, default off.
fn parse_switch(args: &[&str], name: &str) -> bool {
    let flag = format!("--{}", name);
    let prefix = format!("--{}=", name);
    for arg in args.iter().rev() {
        if *arg == flag {
            return true;
        }
        if let Some(val) = arg.strip_prefix(&prefix) {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

fn parse_size_args(args: &[&str]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            } else {
                log::warn!("Ignoring malformed --size='{}' (expected WxH)", v);
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(DEFAULT_WIDTH).max(1);
    let hh = h.unwrap_or(DEFAULT_HEIGHT).max(1);
    (ww, hh)
}

fn parse_scene_arg(args: &[&str]) -> SceneKind {
    match last_value(args, "--scene=") {
        None => SceneKind::default(),
        Some(val) => val.parse().unwrap_or_else(|_| {
            log::warn!(
                "Unknown scene '{}', falling back to {}.",
                val,
                SceneKind::default()
            );
            SceneKind::default()
        }),
    }
}

fn parse_frames_in_flight_arg(args: &[&str]) -> usize {
    let Some(val) = last_value(args, "--frames-in-flight=") else {
        return DEFAULT_FRAMES_IN_FLIGHT;
    };
    match val.parse::<usize>() {
        Ok(n) if (1..=MAX_FRAMES_IN_FLIGHT).contains(&n) => n,
        _ => {
            log::warn!(
                "--frames-in-flight must be 1..={}, got '{}'; using {}.",
                MAX_FRAMES_IN_FLIGHT,
                val,
                DEFAULT_FRAMES_IN_FLIGHT
            );
            DEFAULT_FRAMES_IN_FLIGHT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        AppConfig::from_args(std::iter::once("objview").chain(args.iter().copied()))
    }

    #[test]
    fn no_flags_gives_defaults() {
        assert_eq!(parse(&[]), AppConfig::default());
    }

    #[test]
    fn parses_every_flag() {
        let config = parse(&[
            "--gpu-backend=Vulkan",
            "--size=800x600",
            "--show-fps",
            "--scene=texturing",
            "--model=models/teapot.obj",
            "--frames-in-flight=3",
            "--overlay=on",
        ]);
        assert_eq!(config.backends, wgpu::Backends::VULKAN);
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.show_fps);
        assert_eq!(config.scene, SceneKind::Texturing);
        assert_eq!(config.model, Some(PathBuf::from("models/teapot.obj")));
        assert_eq!(config.frames_in_flight, 3);
        assert!(config.overlay);
    }

    #[test]
    fn width_and_height_override_size() {
        let config = parse(&["--size=800X600", "--height=300", "--width=0"]);
        assert_eq!((config.width, config.height), (1, 300));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = parse(&[
            "--gpu-backend=glide",
            "--size=huge",
            "--scene=wireframe",
            "--frames-in-flight=9",
            "--show-fps=off",
        ]);
        assert_eq!(config, AppConfig::default());
        assert_eq!(parse(&["--frames-in-flight=0"]).frames_in_flight, 2);
    }

    #[test]
    fn later_flags_win() {
        let config = parse(&[
            "--scene=colored",
            "--scene=lighting",
            "--overlay",
            "--overlay=off",
        ]);
        assert_eq!(config.scene, SceneKind::Lighting);
        assert!(!config.overlay);
    }

    #[test]
    fn run_options_carry_renderer_settings() {
        let options = parse(&["--frames-in-flight=1", "--overlay"]).run_options();
        assert_eq!(options.renderer.in_flight_buffers_count, 1);
        assert!(options.renderer.overlay);
        assert_eq!(options.scene, SceneKind::Lighting);
    }
}
