//! The aquarium: owns every entity, gates on asset loading, and runs the
//! per-frame update/draw pipeline back to front.

use crate::assets::LoadedAssets;
use crate::background::{Background, BackgroundPath};
use crate::bubble::{Bubble, BubbleRanges};
use crate::config::{SceneOptions, SpriteFormat};
use crate::coral::Coral;
use crate::entity::{Entity, Tick};
use crate::fish::Fish;
use crate::math::SceneBounds;
use crate::render::Surface;
use crate::sprite::{ArticulationConfig, FishSprite, Sprite};
use rand::{rngs::StdRng, SeedableRng};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    Loading,
    Ready,
}

/// Result of asking for one more fish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddFish {
    Added { count: usize },
    Full { max: usize },
}

struct SceneSprites {
    coral: Rc<Sprite>,
    bubble: Rc<Sprite>,
    template: Rc<Sprite>,
    template_config: Option<ArticulationConfig>,
}

pub struct Aquarium {
    opts: SceneOptions,
    state: SceneState,
    bounds: SceneBounds,
    rng: StdRng,
    frame: u64,
    background: Background,
    sprites: Option<SceneSprites>,
    corals: Vec<Coral>,
    bubbles: Vec<Bubble>,
    fish: Vec<Fish>,
    bubbles_enabled: bool,
}

impl Aquarium {
    pub fn new(width: u32, height: u32, opts: SceneOptions, seed: u64) -> Self {
        Self {
            opts: opts.sanitized(),
            state: SceneState::Loading,
            bounds: SceneBounds::from_viewport(width, height),
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            background: Background::new(width, height),
            sprites: None,
            corals: Vec::new(),
            bubbles: Vec::new(),
            fish: Vec::new(),
            bubbles_enabled: true,
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn options(&self) -> &SceneOptions {
        &self.opts
    }

    pub fn bounds(&self) -> SceneBounds {
        self.bounds
    }

    /// Frames advanced since the scene became ready.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn fish(&self) -> &[Fish] {
        &self.fish
    }

    pub fn fish_count(&self) -> usize {
        self.fish.len()
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn corals(&self) -> &[Coral] {
        &self.corals
    }

    pub fn background_path(&self) -> BackgroundPath {
        self.background.path()
    }

    pub fn bubbles_enabled(&self) -> bool {
        self.bubbles_enabled
    }

    pub fn set_bubbles_enabled(&mut self, on: bool) {
        self.bubbles_enabled = on;
    }

    /// Leaves the loading state: installs the backdrop, seeds the corals and
    /// bubbles, and releases the initial template fish.
    pub fn finish_loading(&mut self, assets: LoadedAssets, backend_shading: bool) {
        if self.state == SceneState::Ready {
            return;
        }
        self.background.set_texture(Rc::new(assets.ocean));
        self.background
            .install_shader(assets.shader.as_ref(), backend_shading);

        let sprites = SceneSprites {
            coral: Rc::new(assets.coral),
            bubble: Rc::new(assets.bubble),
            template: Rc::new(assets.fish_template),
            template_config: assets.fish_config,
        };

        for _ in 0..self.opts.coral_count {
            let coral = Coral::spawn(sprites.coral.clone(), &self.opts, self.bounds, &mut self.rng);
            self.corals.push(coral);
        }
        let ranges = BubbleRanges::from(&self.opts);
        for _ in 0..self.opts.bubble_target {
            let bubble = Bubble::spawn(sprites.bubble.clone(), ranges, self.bounds, &mut self.rng);
            self.bubbles.push(bubble);
        }

        self.sprites = Some(sprites);
        self.state = SceneState::Ready;
        for _ in 0..self.opts.initial_fish {
            self.add_template_fish();
        }
        tracing::info!(
            corals = self.corals.len(),
            bubbles = self.bubbles.len(),
            fish = self.fish.len(),
            background = ?self.background.path(),
            "scene ready"
        );
    }

    /// Adds a fish drawn from `image`. Articulation needs both the
    /// articulated format and a config; anything else swims flat.
    pub fn add_fish(&mut self, image: Rc<Sprite>, config: Option<&ArticulationConfig>) -> AddFish {
        if self.fish.len() >= self.opts.max_fish {
            tracing::info!(max = self.opts.max_fish, "aquarium full; fish rejected");
            return AddFish::Full {
                max: self.opts.max_fish,
            };
        }
        let sprite = match (self.opts.sprite_format, config) {
            (SpriteFormat::Articulated, Some(cfg)) => FishSprite::articulated(image, cfg, &mut self.rng),
            _ => FishSprite::flat(image),
        };
        let articulated = sprite.is_articulated();
        let fish = Fish::spawn(sprite, &self.opts, self.bounds, &mut self.rng);
        tracing::debug!(x = fish.pos.x, y = fish.pos.y, articulated, "fish added");
        self.fish.push(fish);
        AddFish::Added {
            count: self.fish.len(),
        }
    }

    /// Adds a fish cut from the template atlas. None until assets are in.
    pub fn add_template_fish(&mut self) -> Option<AddFish> {
        let (image, config) = {
            let s = self.sprites.as_ref()?;
            (s.template.clone(), s.template_config.clone())
        };
        Some(self.add_fish(image, config.as_ref()))
    }

    /// Tracks the new viewport. Entities keep their positions; anything left
    /// outside finds its way back through the normal wall rules.
    pub fn handle_viewport_resize(&mut self, width: u32, height: u32) {
        let bounds = SceneBounds::from_viewport(width, height);
        if bounds == self.bounds && self.background.quad().w == width && self.background.quad().h == height {
            return;
        }
        tracing::debug!(width, height, "viewport resized");
        self.bounds = bounds;
        self.background.resize(width, height);
    }

    /// Advances every entity one frame and draws the result into `surface`.
    pub fn tick(&mut self, surface: &mut Surface, time: f32) {
        surface.clear();
        if self.state == SceneState::Loading {
            self.background.draw(&mut surface.backdrop, time);
            return;
        }

        self.frame += 1;
        let frame = self.frame;
        self.background.draw(&mut surface.backdrop, time);

        let mut tick = Tick {
            frame,
            bounds: self.bounds,
            rng: &mut self.rng,
        };

        for coral in &mut self.corals {
            coral.update(&mut tick);
            coral.display(surface, frame);
        }

        if self.bubbles_enabled {
            for bubble in &mut self.bubbles {
                bubble.update(&mut tick);
                bubble.display(surface, frame);
            }
            let interval = self.opts.bubble_spawn_interval.max(1);
            if frame % interval == 0 && self.bubbles.len() < self.opts.bubble_cap {
                if let Some(sprites) = &self.sprites {
                    let ranges = BubbleRanges::from(&self.opts);
                    self.bubbles
                        .push(Bubble::spawn(sprites.bubble.clone(), ranges, tick.bounds, tick.rng));
                }
            }
        }

        for fish in &mut self.fish {
            fish.update(&mut tick);
            fish.display(surface, frame);
        }
    }

    /// Draws the current state without advancing anything (paused).
    pub fn redraw(&self, surface: &mut Surface, time: f32) {
        surface.clear();
        self.background.draw(&mut surface.backdrop, time);
        if self.state == SceneState::Loading {
            return;
        }
        for coral in &self.corals {
            coral.display(surface, self.frame);
        }
        if self.bubbles_enabled {
            for bubble in &self.bubbles {
                bubble.display(surface, self.frame);
            }
        }
        for fish in &self.fish {
            fish.display(surface, self.frame);
        }
    }
}
