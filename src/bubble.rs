use crate::config::SceneOptions;
use crate::entity::{Entity, Tick};
use crate::math::{Affine2, SceneBounds, Vec2};
use crate::render::{LocalRect, Surface};
use crate::sprite::Sprite;
use rand::{rngs::StdRng, Rng};
use std::f32::consts::TAU;
use std::rc::Rc;

const WOBBLE_STEP: f32 = 0.05;
const WOBBLE_TILT: f32 = 0.1;

/// Sampling ranges a bubble draws from whenever it (re)spawns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleRanges {
    pub size: (f32, f32),
    pub speed: (f32, f32),
    pub spawn_depth: f32,
    pub margin: f32,
}

impl From<&SceneOptions> for BubbleRanges {
    fn from(o: &SceneOptions) -> Self {
        Self {
            size: o.bubble_size,
            speed: o.bubble_speed,
            spawn_depth: o.bubble_spawn_depth,
            margin: o.bubble_margin,
        }
    }
}

pub struct Bubble {
    pub pos: Vec2,
    pub size: f32,
    pub speed: f32,
    pub wobble: f32,
    ranges: BubbleRanges,
    sprite: Rc<Sprite>,
    resets: u32,
}

impl Bubble {
    pub fn new(sprite: Rc<Sprite>, ranges: BubbleRanges, pos: Vec2, size: f32, speed: f32) -> Self {
        Self {
            pos,
            size,
            speed,
            wobble: 0.0,
            ranges,
            sprite,
            resets: 0,
        }
    }

    /// A fresh bubble just below the bottom edge.
    pub fn spawn(
        sprite: Rc<Sprite>,
        ranges: BubbleRanges,
        bounds: SceneBounds,
        rng: &mut StdRng,
    ) -> Self {
        let mut b = Self::new(sprite, ranges, Vec2::default(), 0.0, 0.0);
        b.resample(bounds, rng);
        b
    }

    /// How many times this bubble has left the top and started over.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    fn resample(&mut self, bounds: SceneBounds, rng: &mut StdRng) {
        let r = self.ranges;
        self.pos = Vec2::new(
            rng.gen_range(-bounds.half_width..=bounds.half_width),
            bounds.half_height + rng.gen_range(1.0..=r.spawn_depth.max(1.0)),
        );
        self.size = rng.gen_range(r.size.0..=r.size.1);
        self.speed = rng.gen_range(r.speed.0..=r.speed.1);
        self.wobble = rng.gen_range(0.0..TAU);
    }
}

impl Entity for Bubble {
    fn update(&mut self, tick: &mut Tick<'_>) {
        self.pos.y -= self.speed;
        self.wobble += WOBBLE_STEP;
        if self.pos.y <= -(tick.bounds.half_height + self.ranges.margin) {
            self.resample(tick.bounds, tick.rng);
            self.resets += 1;
        }
    }

    fn display(&self, surface: &mut Surface, _frame: u64) {
        let xf = Affine2::IDENTITY
            .translate(self.pos.x, self.pos.y)
            .rotate(self.wobble.sin() * WOBBLE_TILT);
        surface.ink.draw_image(
            xf,
            &self.sprite,
            self.sprite.full_rect(),
            LocalRect::centered(self.size, self.size),
        );
    }
}
