//! Fish: straight-line swimming, wall bounces with a flip animation, and
//! independently wagging tail and fin.

use crate::config::{BounceAxis, BouncePolicy, SceneOptions};
use crate::entity::{Entity, Tick};
use crate::math::{lerp, Affine2, SceneBounds, Vec2};
use crate::render::{LocalRect, Surface};
use crate::sprite::{FishSprite, PartSlot};
use rand::{rngs::StdRng, Rng};
use std::f32::consts::{PI, TAU};

/// `flip_phase` at the start of a bounce: a half turn.
pub const FLIP_START: f32 = PI;
/// Ticks a bounce lasts.
pub const FLIP_TICKS: u32 = 10;
const FLIP_STEP: f32 = FLIP_START / FLIP_TICKS as f32;
// Float residue left after FLIP_TICKS steps snaps to zero.
const FLIP_SNAP: f32 = 1e-4;

const BOUNCE_JITTER: f32 = 0.25;
const WANDER_TURN: f32 = 0.5;
/// Drawn body height relative to `size`.
pub const BODY_ASPECT: f32 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FishState {
    Swimming,
    Bouncing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Motion rules shared by every fish in a scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub bounce_axis: BounceAxis,
    pub bounce_policy: BouncePolicy,
    pub wander_chance: f64,
}

impl From<&SceneOptions> for Motion {
    fn from(o: &SceneOptions) -> Self {
        Self {
            bounce_axis: o.bounce_axis,
            bounce_policy: o.bounce_policy,
            wander_chance: o.wander_chance,
        }
    }
}

pub struct Fish {
    pub pos: Vec2,
    /// Heading in radians.
    pub angle: f32,
    pub speed: f32,
    pub size: f32,
    /// Horizontal direction multiplier, +1 or -1.
    pub head: f32,
    /// Vertical direction multiplier, +1 or -1.
    pub upright: f32,
    state: FishState,
    flip_phase: f32,
    flip_axis: Axis,
    bounces: u32,
    motion: Motion,
    sprite: FishSprite,
}

impl Fish {
    pub fn new(sprite: FishSprite, pos: Vec2, angle: f32, speed: f32, size: f32, motion: Motion) -> Self {
        Self {
            pos,
            angle,
            speed,
            size,
            head: 1.0,
            upright: 1.0,
            state: FishState::Swimming,
            flip_phase: 0.0,
            flip_axis: Axis::X,
            bounces: 0,
            motion,
            sprite,
        }
    }

    pub fn with_direction(mut self, head: f32, upright: f32) -> Self {
        self.head = if head < 0.0 { -1.0 } else { 1.0 };
        self.upright = if upright < 0.0 { -1.0 } else { 1.0 };
        self
    }

    /// A fish somewhere inside `bounds` with a random heading.
    pub fn spawn(sprite: FishSprite, opts: &SceneOptions, bounds: SceneBounds, rng: &mut StdRng) -> Self {
        let pos = Vec2::new(
            rng.gen_range(-bounds.half_width..=bounds.half_width),
            rng.gen_range(-bounds.half_height..=bounds.half_height),
        );
        let angle = rng.gen_range(0.0..TAU);
        let speed = rng.gen_range(opts.fish_speed.0..=opts.fish_speed.1);
        let size = rng.gen_range(opts.fish_size.0..=opts.fish_size.1);
        let head = if rng.gen_bool(opts.mirrored_chance.clamp(0.0, 1.0)) {
            -1.0
        } else {
            1.0
        };
        Self::new(sprite, pos, angle, speed, size, Motion::from(opts)).with_direction(head, 1.0)
    }

    pub fn state(&self) -> FishState {
        self.state
    }

    pub fn flip_phase(&self) -> f32 {
        self.flip_phase
    }

    /// Which wall the current or most recent bounce came off.
    pub fn flip_axis(&self) -> Axis {
        self.flip_axis
    }

    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    pub fn sprite(&self) -> &FishSprite {
        &self.sprite
    }

    /// Displacement of one swimming tick.
    pub fn velocity(&self) -> Vec2 {
        Vec2::new(
            self.angle.cos() * self.head,
            self.angle.sin() * self.upright,
        ) * self.speed
    }

    /// Scale applied along the bounce axis: sweeps -1 -> 0 -> 1 over a
    /// bounce, 1 while swimming.
    pub fn flip_scale(&self) -> f32 {
        match self.state {
            FishState::Swimming => 1.0,
            FishState::Bouncing => {
                let progress = 1.0 - self.flip_phase / FLIP_START;
                lerp(-1.0, 1.0, progress)
            }
        }
    }

    fn outward(pos: f32, vel: f32, half: f32) -> bool {
        (pos > half && vel > 0.0) || (pos < -half && vel < 0.0)
    }

    /// The wall being crossed this tick: outside on that axis and still
    /// heading further out.
    fn crossed_axis(&self, bounds: SceneBounds) -> Option<Axis> {
        let v = self.velocity();
        if Self::outward(self.pos.x, v.x, bounds.half_width) {
            return Some(Axis::X);
        }
        if self.motion.bounce_axis == BounceAxis::Both
            && Self::outward(self.pos.y, v.y, bounds.half_height)
        {
            return Some(Axis::Y);
        }
        None
    }

    fn mirror(&mut self, axis: Axis) {
        self.angle = match axis {
            Axis::X => PI - self.angle,
            Axis::Y => -self.angle,
        }
        .rem_euclid(TAU);
    }

    fn bounce(&mut self, axis: Axis, bounds: SceneBounds, rng: &mut StdRng) {
        let side = match axis {
            Axis::X => {
                self.pos.x = self.pos.x.clamp(-bounds.half_width, bounds.half_width);
                self.pos.x.signum()
            }
            Axis::Y => {
                self.pos.y = self.pos.y.clamp(-bounds.half_height, bounds.half_height);
                self.pos.y.signum()
            }
        };

        match self.motion.bounce_policy {
            BouncePolicy::Mirror => self.mirror(axis),
            BouncePolicy::HalfTurnJitter => {
                self.angle = (self.angle + PI + rng.gen_range(-BOUNCE_JITTER..=BOUNCE_JITTER))
                    .rem_euclid(TAU);
                let v = self.velocity();
                let along = match axis {
                    Axis::X => v.x,
                    Axis::Y => v.y,
                };
                if along * side > 0.0 {
                    self.mirror(axis);
                }
            }
        }

        self.state = FishState::Bouncing;
        self.flip_phase = FLIP_START;
        self.flip_axis = axis;
        self.bounces += 1;
    }

    /// Maps an atlas texel to the fish's local frame, where the body
    /// rectangle spans `size` x `size * BODY_ASPECT` around the origin.
    fn texel_to_local(&self, t: Vec2) -> Vec2 {
        let body = self.sprite.body;
        let c = body.center();
        let kx = self.size / body.w.max(1) as f32;
        let ky = self.size * BODY_ASPECT / body.h.max(1) as f32;
        Vec2::new((t.x - c.x) * kx, (t.y - c.y) * ky)
    }
}

impl Entity for Fish {
    fn update(&mut self, tick: &mut Tick<'_>) {
        match self.state {
            FishState::Bouncing => {
                let next = self.flip_phase - FLIP_STEP;
                self.flip_phase = if next <= FLIP_SNAP { 0.0 } else { next };
                if self.flip_phase == 0.0 {
                    self.state = FishState::Swimming;
                }
            }
            FishState::Swimming => {
                let chance = self.motion.wander_chance.clamp(0.0, 1.0);
                if chance > 0.0 && tick.rng.gen_bool(chance) {
                    self.angle += tick.rng.gen_range(-WANDER_TURN..=WANDER_TURN);
                }

                self.pos += self.velocity();

                if let Some(axis) = self.crossed_axis(tick.bounds) {
                    self.bounce(axis, tick.bounds, tick.rng);
                }
            }
        }
    }

    fn display(&self, surface: &mut Surface, frame: u64) {
        let mut xf = Affine2::IDENTITY.translate(self.pos.x, self.pos.y);
        if self.state == FishState::Bouncing {
            let s = self.flip_scale();
            xf = match self.flip_axis {
                Axis::X => xf.scale(s, 1.0),
                Axis::Y => xf.scale(1.0, s),
            };
        }
        let xf = xf.scale(self.head, self.upright).rotate(self.angle);

        let sprite = &self.sprite;
        surface.ink.draw_image(
            xf,
            &sprite.image,
            sprite.body,
            LocalRect::centered(self.size, self.size * BODY_ASPECT),
        );

        for slot in PartSlot::ALL {
            let Some(part) = sprite.part(slot) else {
                continue;
            };
            let pivot = self.texel_to_local(part.pivot);
            let origin = self.texel_to_local(Vec2::new(part.source.x as f32, part.source.y as f32));
            let far = self.texel_to_local(Vec2::new(
                (part.source.x + part.source.w) as f32,
                (part.source.y + part.source.h) as f32,
            ));
            let part_xf = xf
                .translate(pivot.x, pivot.y)
                .rotate(part.angle_at(frame))
                .translate(-pivot.x, -pivot.y);
            surface.ink.draw_image(
                part_xf,
                &sprite.image,
                part.source,
                LocalRect {
                    x: origin.x,
                    y: origin.y,
                    w: far.x - origin.x,
                    h: far.y - origin.y,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::Sprite;
    use crate::render::Pixel;
    use rand::SeedableRng;
    use std::rc::Rc;

    fn still_water() -> Motion {
        Motion {
            bounce_axis: BounceAxis::Both,
            bounce_policy: BouncePolicy::Mirror,
            wander_chance: 0.0,
        }
    }

    fn fish_at(x: f32, y: f32, angle: f32) -> Fish {
        let img = Rc::new(Sprite::solid(10, 4, Pixel::rgb(255, 160, 0)));
        Fish::new(FishSprite::flat(img), Vec2::new(x, y), angle, 1.0, 20.0, still_water())
    }

    #[test]
    fn flip_scale_sweeps_through_zero() {
        let bounds = SceneBounds::from_viewport(100, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let mut f = fish_at(49.5, 0.0, 0.0);
        let mut tick = Tick {
            frame: 0,
            bounds,
            rng: &mut rng,
        };
        f.update(&mut tick);
        assert_eq!(f.state(), FishState::Bouncing);
        assert!((f.flip_scale() + 1.0).abs() < 1e-6);

        let mut seen_negative = false;
        let mut seen_positive = false;
        while f.state() == FishState::Bouncing {
            let s = f.flip_scale();
            seen_negative |= s < 0.0;
            seen_positive |= s > 0.0;
            f.update(&mut tick);
        }
        assert!(seen_negative && seen_positive);
        assert_eq!(f.flip_scale(), 1.0);
    }

    #[test]
    fn mid_flip_fish_draws_nothing() {
        let mut f = fish_at(0.0, 0.0, 0.0);
        f.state = FishState::Bouncing;
        f.flip_phase = FLIP_START * 0.5;
        let mut surface = Surface::new(60, 60);
        f.display(&mut surface, 0);
        assert!(surface.ink.px.iter().all(|p| p.a == 0));

        f.state = FishState::Swimming;
        f.display(&mut surface, 0);
        assert!(surface.ink.px.iter().any(|p| p.a > 0));
    }
}
