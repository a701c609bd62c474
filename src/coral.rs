use crate::config::SceneOptions;
use crate::entity::{Entity, Tick};
use crate::math::{Affine2, SceneBounds, Vec2};
use crate::render::{LocalRect, Surface};
use crate::sprite::Sprite;
use rand::{rngs::StdRng, Rng};
use std::f32::consts::TAU;
use std::rc::Rc;

const PHASE_STEP: f32 = 0.005;

/// Swaying decoration anchored near the floor. Never moves, never removed.
pub struct Coral {
    anchor: Vec2,
    pub size: f32,
    pub phase: f32,
    height: f32,
    wave_rate: f32,
    wave_amplitude: f32,
    sprite: Rc<Sprite>,
}

impl Coral {
    pub fn new(sprite: Rc<Sprite>, anchor: Vec2, size: f32, phase: f32, opts: &SceneOptions) -> Self {
        Self {
            anchor,
            size,
            phase,
            height: opts.coral_height,
            wave_rate: opts.coral_wave_rate,
            wave_amplitude: opts.coral_wave_amplitude,
            sprite,
        }
    }

    pub fn spawn(
        sprite: Rc<Sprite>,
        opts: &SceneOptions,
        bounds: SceneBounds,
        rng: &mut StdRng,
    ) -> Self {
        let (lo, hi) = opts.coral_depth;
        let anchor = Vec2::new(
            rng.gen_range(-bounds.half_width..=bounds.half_width),
            bounds.half_height - rng.gen_range(lo..=hi),
        );
        let size = rng.gen_range(opts.coral_size.0..=opts.coral_size.1);
        let phase = rng.gen_range(0.0..TAU);
        Self::new(sprite, anchor, size, phase, opts)
    }

    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    pub fn wave_offset(&self, frame: u64) -> f32 {
        (self.phase + frame as f32 * self.wave_rate).sin() * self.wave_amplitude
    }
}

impl Entity for Coral {
    fn update(&mut self, _tick: &mut Tick<'_>) {
        self.phase += PHASE_STEP;
    }

    fn display(&self, surface: &mut Surface, frame: u64) {
        let h = self.height * self.size;
        let aspect = self.sprite.width() as f32 / self.sprite.height().max(1) as f32;
        let xf = Affine2::IDENTITY.translate(self.anchor.x, self.anchor.y + self.wave_offset(frame));
        surface.ink.draw_image(
            xf,
            &self.sprite,
            self.sprite.full_rect(),
            LocalRect::centered(h * aspect, h),
        );
    }
}
