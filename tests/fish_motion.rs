use aquarium::config::{BounceAxis, BouncePolicy};
use aquarium::entity::{Entity, Tick};
use aquarium::fish::{Fish, FishState, Motion, FLIP_TICKS};
use aquarium::math::{SceneBounds, Vec2};
use aquarium::render::{Pixel, Surface};
use aquarium::sprite::{fish_template, FishSprite, Sprite};
use rand::{rngs::StdRng, SeedableRng};
use std::f32::consts::{FRAC_PI_2, PI};
use std::rc::Rc;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

fn motion(axis: BounceAxis, policy: BouncePolicy) -> Motion {
    Motion {
        bounce_axis: axis,
        bounce_policy: policy,
        wander_chance: 0.0,
    }
}

fn plain_fish(pos: Vec2, angle: f32, motion: Motion) -> Fish {
    let img = Rc::new(Sprite::solid(10, 4, Pixel::rgb(255, 160, 0)));
    Fish::new(FishSprite::flat(img), pos, angle, 1.0, 20.0, motion)
}

struct Tank {
    bounds: SceneBounds,
    rng: StdRng,
    frame: u64,
}

impl Tank {
    fn new(w: u32, h: u32, seed: u64) -> Self {
        Self {
            bounds: SceneBounds::from_viewport(w, h),
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
        }
    }

    fn step(&mut self, fish: &mut Fish) {
        self.frame += 1;
        let mut tick = Tick {
            frame: self.frame,
            bounds: self.bounds,
            rng: &mut self.rng,
        };
        fish.update(&mut tick);
    }
}

#[test]
fn swimming_follows_heading_and_direction_multipliers() {
    let mut tank = Tank::new(400, 400, 1);
    let m = motion(BounceAxis::Both, BouncePolicy::Mirror);

    let mut f = plain_fish(Vec2::new(0.0, 0.0), 0.0, m).with_direction(-1.0, 1.0);
    tank.step(&mut f);
    assert!(approx_eq(f.pos.x, -1.0) && approx_eq(f.pos.y, 0.0), "{:?}", f.pos);

    let mut f = plain_fish(Vec2::new(0.0, 0.0), FRAC_PI_2, m).with_direction(1.0, -1.0);
    f.speed = 2.0;
    tank.step(&mut f);
    assert!(approx_eq(f.pos.x, 0.0) && approx_eq(f.pos.y, -2.0), "{:?}", f.pos);
}

#[test]
fn one_bounce_per_crossing() {
    let mut tank = Tank::new(200, 100, 2);
    let mut f = plain_fish(Vec2::new(99.5, 0.0), 0.0, motion(BounceAxis::Both, BouncePolicy::Mirror));
    for _ in 0..150 {
        tank.step(&mut f);
    }
    assert_eq!(f.bounces(), 1);
    assert!(f.pos.x < 100.0);
}

#[test]
fn bounce_lasts_exactly_flip_ticks_and_freezes_position() {
    let mut tank = Tank::new(200, 100, 3);
    let mut f = plain_fish(Vec2::new(99.5, 0.0), 0.0, motion(BounceAxis::Both, BouncePolicy::Mirror));
    tank.step(&mut f);
    assert_eq!(f.state(), FishState::Bouncing);
    assert!(approx_eq(f.pos.x, 100.0));
    let frozen = f.pos;

    let mut ticks = 0;
    while f.state() == FishState::Bouncing {
        assert_eq!(f.pos, frozen);
        tank.step(&mut f);
        ticks += 1;
        assert!(ticks <= FLIP_TICKS, "bounce never ended");
    }
    assert_eq!(ticks, FLIP_TICKS);
    assert_eq!(f.flip_phase(), 0.0);
    assert_eq!(f.bounces(), 1);
}

#[test]
fn mirror_points_away_from_each_wall() {
    let mut tank = Tank::new(200, 100, 4);
    let m = motion(BounceAxis::Both, BouncePolicy::Mirror);

    let mut right = plain_fish(Vec2::new(99.5, 0.0), 0.3, m);
    tank.step(&mut right);
    assert!(approx_eq(right.angle, PI - 0.3));
    assert!(right.velocity().x < 0.0);
    assert!(right.velocity().y > 0.0);

    let mut bottom = plain_fish(Vec2::new(0.0, 49.5), FRAC_PI_2, m);
    tank.step(&mut bottom);
    assert_eq!(bottom.bounces(), 1);
    assert!(bottom.velocity().y < 0.0);

    let mut left = plain_fish(Vec2::new(-99.5, 0.0), PI, m);
    tank.step(&mut left);
    assert!(left.velocity().x > 0.0);
}

#[test]
fn half_turn_jitter_always_heads_back_inside() {
    for seed in 0..40 {
        let mut tank = Tank::new(200, 100, seed);
        let angle = (seed as f32 * 0.037) - 0.7;
        let mut f = plain_fish(
            Vec2::new(99.9, 0.0),
            angle,
            motion(BounceAxis::Both, BouncePolicy::HalfTurnJitter),
        );
        tank.step(&mut f);
        assert_eq!(f.bounces(), 1, "seed {seed}");
        assert!(f.velocity().x < 0.0, "seed {seed} angle {}", f.angle);
    }
}

#[test]
fn horizontal_axis_lets_fish_leave_through_the_floor() {
    let mut tank = Tank::new(200, 100, 5);
    let mut f = plain_fish(
        Vec2::new(0.0, 49.5),
        FRAC_PI_2,
        motion(BounceAxis::Horizontal, BouncePolicy::Mirror),
    );
    for _ in 0..20 {
        tank.step(&mut f);
    }
    assert_eq!(f.bounces(), 0);
    assert_eq!(f.state(), FishState::Swimming);
    assert!(approx_eq(f.pos.y, 69.5));
}

#[test]
fn articulated_parts_are_drawn_while_bouncing() {
    let (atlas, config) = fish_template();
    let atlas = Rc::new(atlas);
    let mut rng = StdRng::seed_from_u64(6);
    let articulated = FishSprite::articulated(atlas.clone(), &config, &mut rng);
    assert!(articulated.is_articulated());
    let body_only = FishSprite {
        parts: [None, None],
        ..articulated.clone()
    };

    let m = motion(BounceAxis::Both, BouncePolicy::Mirror);
    let coverage = |sprite: FishSprite| {
        let mut tank = Tank::new(120, 80, 7);
        let mut f = Fish::new(sprite, Vec2::new(59.5, 0.0), 0.0, 1.0, 30.0, m);
        tank.step(&mut f);
        assert_eq!(f.state(), FishState::Bouncing);
        let mut surface = Surface::new(300, 200);
        f.display(&mut surface, tank.frame);
        surface.ink.px.iter().filter(|p| p.a > 0).count()
    };

    let with_parts = coverage(articulated);
    let without = coverage(body_only);
    assert!(without > 0);
    assert!(with_parts > without, "{with_parts} vs {without}");
}

#[test]
fn mirrored_multipliers_still_bounce_back_inside() {
    let mut tank = Tank::new(200, 100, 8);
    let m = motion(BounceAxis::Both, BouncePolicy::Mirror);

    // Heading 0 with head = -1 swims left, into the left wall.
    let mut left = plain_fish(Vec2::new(-99.5, 0.0), 0.0, m).with_direction(-1.0, 1.0);
    assert!(left.velocity().x < 0.0);
    tank.step(&mut left);
    assert_eq!(left.bounces(), 1);
    assert!(left.velocity().x > 0.0);

    // Heading down with upright = -1 swims up, into the top wall.
    let mut top = plain_fish(Vec2::new(0.0, -49.5), FRAC_PI_2, m).with_direction(1.0, -1.0);
    assert!(top.velocity().y < 0.0);
    tank.step(&mut top);
    assert_eq!(top.bounces(), 1);
    assert!(top.velocity().y > 0.0);

    for seed in 0..20 {
        let mut tank = Tank::new(200, 100, seed);
        let mut f = plain_fish(
            Vec2::new(-99.9, 0.0),
            0.2,
            motion(BounceAxis::Both, BouncePolicy::HalfTurnJitter),
        )
        .with_direction(-1.0, 1.0);
        tank.step(&mut f);
        assert_eq!(f.bounces(), 1, "seed {seed}");
        assert!(f.velocity().x > 0.0, "seed {seed}");
    }
}
