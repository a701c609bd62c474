use crate::math::SceneBounds;
use crate::render::Surface;
use rand::rngs::StdRng;

/// Per-tick context handed to `Entity::update`.
pub struct Tick<'a> {
    pub frame: u64,
    pub bounds: SceneBounds,
    pub rng: &'a mut StdRng,
}

/// Anything the scene advances and draws once per frame.
///
/// `update` moves the entity by exactly one frame's worth of motion; speeds
/// are in units per frame, so wall-clock speed follows the frame rate.
/// `display` only draws.
pub trait Entity {
    fn update(&mut self, tick: &mut Tick<'_>);
    fn display(&self, surface: &mut Surface, frame: u64);
}
