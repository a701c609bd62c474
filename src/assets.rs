use crate::background::ShaderSources;
use crate::sprite::{self, ArticulationConfig, Sprite};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

const OCEAN_TEXTURE_SIZE: (u32, u32) = (160, 96);

/// Asset locations under one root directory.
#[derive(Clone, Debug)]
pub struct AssetPaths {
    pub root: PathBuf,
}

impl AssetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First existing candidate among `--assets`, the configured directory,
    /// `./assets`, and `assets/` next to the executable.
    pub fn resolve(explicit: Option<&Path>, configured: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        candidates.extend(explicit.map(Path::to_path_buf));
        candidates.extend(configured.map(Path::to_path_buf));
        candidates.push(PathBuf::from("assets"));
        if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
            candidates.push(dir.join("assets"));
        }
        let root = candidates
            .iter()
            .find(|p| p.is_dir())
            .or(candidates.first())
            .cloned()
            .unwrap_or_else(|| PathBuf::from("assets"));
        Self::new(root)
    }

    fn first_existing(&self, names: &[&str]) -> PathBuf {
        names
            .iter()
            .map(|n| self.root.join(n))
            .find(|p| p.exists())
            .unwrap_or_else(|| self.root.join(names[0]))
    }

    pub fn ocean(&self) -> PathBuf {
        self.first_existing(&["backgrounds/ocean-bg.png", "backgrounds/ocean-bg.jpg"])
    }

    pub fn coral(&self) -> PathBuf {
        self.root.join("decorations/coral.png")
    }

    pub fn bubble(&self) -> PathBuf {
        self.root.join("decorations/bubble.png")
    }

    pub fn fish_template(&self) -> PathBuf {
        self.root.join("templates/fish-template.png")
    }

    pub fn fish_template_config(&self) -> PathBuf {
        self.root.join("templates/fish-template.json")
    }

    pub fn vertex_shader(&self) -> PathBuf {
        self.root.join("shaders/water.vert")
    }

    pub fn fragment_shader(&self) -> PathBuf {
        self.root.join("shaders/water.frag")
    }
}

/// Everything the scene needs to leave the loading state. Images always
/// resolve (procedurally if need be); the shader and template config may not.
pub struct LoadedAssets {
    pub ocean: Sprite,
    pub coral: Sprite,
    pub bubble: Sprite,
    pub fish_template: Sprite,
    pub fish_config: Option<ArticulationConfig>,
    pub shader: Option<ShaderSources>,
    /// Assets that were replaced by a procedural stand-in.
    pub substituted: Vec<&'static str>,
}

impl LoadedAssets {
    /// The all-procedural set, used when nothing could be read at all.
    pub fn procedural(seed: u32) -> Self {
        let (template, config) = sprite::fish_template();
        Self {
            ocean: sprite::ocean_texture(OCEAN_TEXTURE_SIZE.0, OCEAN_TEXTURE_SIZE.1, seed),
            coral: sprite::coral_sprite(),
            bubble: sprite::bubble_sprite(),
            fish_template: template,
            fish_config: Some(config),
            shader: None,
            substituted: vec!["ocean", "coral", "bubble", "fish template"],
        }
    }
}

fn image_or(name: &'static str, path: &Path, substituted: &mut Vec<&'static str>, fallback: impl FnOnce() -> Sprite) -> Sprite {
    match Sprite::open(path) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(asset = name, error = %format!("{err:#}"), "using procedural stand-in");
            substituted.push(name);
            fallback()
        }
    }
}

pub fn load_shader_sources(paths: &AssetPaths) -> Result<ShaderSources> {
    let vp = paths.vertex_shader();
    let fp = paths.fragment_shader();
    Ok(ShaderSources {
        vertex: std::fs::read_to_string(&vp)
            .with_context(|| format!("could not read {}", vp.display()))?,
        fragment: std::fs::read_to_string(&fp)
            .with_context(|| format!("could not read {}", fp.display()))?,
    })
}

/// Loads every asset, degrading each failure to a simpler stand-in.
pub fn load_assets(paths: &AssetPaths, seed: u32) -> LoadedAssets {
    let mut substituted = Vec::new();

    let ocean = image_or("ocean", &paths.ocean(), &mut substituted, || {
        sprite::ocean_texture(OCEAN_TEXTURE_SIZE.0, OCEAN_TEXTURE_SIZE.1, seed)
    });
    let coral = image_or("coral", &paths.coral(), &mut substituted, sprite::coral_sprite);
    let bubble = image_or("bubble", &paths.bubble(), &mut substituted, sprite::bubble_sprite);

    let (fish_template, fish_config) = match Sprite::open(&paths.fish_template()) {
        Ok(template) => {
            let cfg_path = paths.fish_template_config();
            let config = if cfg_path.exists() {
                ArticulationConfig::load(&cfg_path)
                    .map_err(|err| {
                        tracing::warn!(error = %format!("{err:#}"), "template config ignored; fish will be flat")
                    })
                    .ok()
            } else {
                None
            };
            (template, config)
        }
        Err(err) => {
            tracing::warn!(asset = "fish template", error = %format!("{err:#}"), "using procedural stand-in");
            substituted.push("fish template");
            let (template, config) = sprite::fish_template();
            (template, Some(config))
        }
    };

    let shader = load_shader_sources(paths)
        .map_err(|err| tracing::warn!(error = %format!("{err:#}"), "shader sources unavailable"))
        .ok();

    tracing::info!(root = %paths.root.display(), ?substituted, shader = shader.is_some(), "assets loaded");
    LoadedAssets {
        ocean,
        coral,
        bubble,
        fish_template,
        fish_config,
        shader,
        substituted,
    }
}

/// Runs `load_assets` off the frame thread; the frame loop polls.
pub struct AssetLoader {
    rx: Receiver<LoadedAssets>,
    seed: u32,
}

impl AssetLoader {
    pub fn spawn(paths: AssetPaths, seed: u32) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || {
                let _ = tx.send(load_assets(&paths, seed));
            })
            .context("could not start the asset loader")?;
        Ok(Self { rx, seed })
    }

    /// Some once the load finished. A loader that died without reporting
    /// yields the procedural set.
    pub fn poll(&mut self) -> Option<LoadedAssets> {
        match self.rx.try_recv() {
            Ok(assets) => Some(assets),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::error!("asset loader exited without a result");
                Some(LoadedAssets::procedural(self.seed))
            }
        }
    }
}
