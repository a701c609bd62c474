use anyhow::{Context, Result};
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BounceAxis {
    /// Only the left and right walls turn a fish around.
    Horizontal,
    /// All four walls do.
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BouncePolicy {
    /// Negate the heading component on the crossed axis.
    Mirror,
    /// Half turn plus a small random jitter.
    HalfTurnJitter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SpriteFormat {
    Flat,
    Articulated,
}

/// Tunables for the scene. Distances are in viewport sub-pixels and speeds in
/// sub-pixels per frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    pub bounce_axis: BounceAxis,
    pub bounce_policy: BouncePolicy,
    pub sprite_format: SpriteFormat,

    pub max_fish: usize,
    pub initial_fish: usize,
    pub fish_size: (f32, f32),
    pub fish_speed: (f32, f32),
    /// Per-tick chance of a small random heading change.
    pub wander_chance: f64,
    /// Chance that a new fish swims with a mirrored head direction.
    pub mirrored_chance: f64,

    pub bubble_target: usize,
    pub bubble_cap: usize,
    pub bubble_spawn_interval: u64,
    pub bubble_size: (f32, f32),
    pub bubble_speed: (f32, f32),
    pub bubble_spawn_depth: f32,
    pub bubble_margin: f32,

    pub coral_count: usize,
    pub coral_height: f32,
    pub coral_size: (f32, f32),
    pub coral_depth: (f32, f32),
    pub coral_wave_rate: f32,
    pub coral_wave_amplitude: f32,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            bounce_axis: BounceAxis::Both,
            bounce_policy: BouncePolicy::Mirror,
            sprite_format: SpriteFormat::Articulated,

            max_fish: 150,
            initial_fish: 3,
            fish_size: (16.0, 28.0),
            fish_speed: (0.25, 0.75),
            wander_chance: 0.01,
            mirrored_chance: 0.0,

            bubble_target: 20,
            bubble_cap: 30,
            bubble_spawn_interval: 60,
            bubble_size: (2.0, 5.0),
            bubble_speed: (0.3, 1.0),
            bubble_spawn_depth: 25.0,
            bubble_margin: 0.0,

            coral_count: 8,
            coral_height: 22.0,
            coral_size: (0.7, 1.3),
            coral_depth: (4.0, 20.0),
            coral_wave_rate: 0.03,
            coral_wave_amplitude: 1.5,
        }
    }
}

/// Slowest speed a fish or bubble may be configured with; bubbles must rise
/// every frame.
pub const MIN_SPEED: f32 = 0.01;

fn finite_or(field: &'static str, v: f32, default: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!(field, "non-finite value replaced with the default");
        default
    }
}

fn chance_or(field: &'static str, v: f64, default: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        tracing::warn!(field, "non-finite chance replaced with the default");
        default
    }
}

/// `(lo, hi)` with both ends finite, `lo <= hi` and `lo >= floor`.
fn range_or(field: &'static str, r: (f32, f32), default: (f32, f32), floor: f32) -> (f32, f32) {
    if !r.0.is_finite() || !r.1.is_finite() {
        tracing::warn!(field, "non-finite range replaced with the default");
        return default;
    }
    let (mut lo, mut hi) = r;
    if lo > hi {
        tracing::warn!(field, lo, hi, "reversed range reordered");
        std::mem::swap(&mut lo, &mut hi);
    }
    if lo < floor {
        tracing::warn!(field, lo, floor, "range raised to its minimum");
        lo = floor;
        hi = hi.max(floor);
    }
    (lo, hi)
}

impl SceneOptions {
    /// Repairs values that would make spawning panic or break entity
    /// motion: reversed or non-finite ranges, non-positive speeds.
    pub fn sanitized(self) -> Self {
        let d = SceneOptions::default();
        Self {
            fish_size: range_or("fish_size", self.fish_size, d.fish_size, 0.0),
            fish_speed: range_or("fish_speed", self.fish_speed, d.fish_speed, MIN_SPEED),
            wander_chance: chance_or("wander_chance", self.wander_chance, d.wander_chance),
            mirrored_chance: chance_or("mirrored_chance", self.mirrored_chance, d.mirrored_chance),
            bubble_size: range_or("bubble_size", self.bubble_size, d.bubble_size, 0.0),
            bubble_speed: range_or("bubble_speed", self.bubble_speed, d.bubble_speed, MIN_SPEED),
            bubble_spawn_depth: finite_or("bubble_spawn_depth", self.bubble_spawn_depth, d.bubble_spawn_depth),
            bubble_margin: finite_or("bubble_margin", self.bubble_margin, d.bubble_margin).max(0.0),
            coral_height: finite_or("coral_height", self.coral_height, d.coral_height),
            coral_size: range_or("coral_size", self.coral_size, d.coral_size, 0.0),
            coral_depth: range_or("coral_depth", self.coral_depth, d.coral_depth, f32::MIN),
            coral_wave_rate: finite_or("coral_wave_rate", self.coral_wave_rate, d.coral_wave_rate),
            coral_wave_amplitude: finite_or(
                "coral_wave_amplitude",
                self.coral_wave_amplitude,
                d.coral_wave_amplitude,
            )
            .abs(),
            ..self
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fps_cap: u32,
    pub seed: u64,
    pub enable_color: bool,
    pub enable_shader: bool,
    pub asset_dir: Option<PathBuf>,
    pub channel: String,
    pub scene: SceneOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            seed: 0,
            enable_color: true,
            enable_shader: true,
            asset_dir: None,
            channel: "aquarium".to_string(),
            scene: SceneOptions::default(),
        }
    }
}

pub struct Paths {
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
    pub channels_dir: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "aquarium", "Aquarium")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("aquarium.log"),
        channels_dir: dir.join("channels"),
        data_dir: dir,
    })
}

pub fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str::<Settings>(&s) {
            Ok(mut v) => {
                v.scene = v.scene.sanitized();
                return v;
            }
            Err(err) => tracing::warn!(%err, path = %path.display(), "ignoring malformed settings"),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(%err, path = %path.display(), "could not read settings"),
    }
    Settings::default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let data = serde_json::to_vec_pretty(s)?;
    write_atomic(path, &data)
}

/// Write to a sibling temp file, then rename over the target.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).with_context(|| format!("could not write {}", tmp.display()))?;
    atomic_rename(&tmp, path)
}

pub fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // rename() replaces atomically on unix; windows refuses to rename over an
    // existing file.
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
        .with_context(|| format!("could not move {} to {}", from.display(), to.display()))?;
    Ok(())
}
