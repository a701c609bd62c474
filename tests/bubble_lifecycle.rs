use aquarium::bubble::{Bubble, BubbleRanges};
use aquarium::config::SceneOptions;
use aquarium::entity::{Entity, Tick};
use aquarium::math::{SceneBounds, Vec2};
use aquarium::sprite::bubble_sprite;
use rand::{rngs::StdRng, SeedableRng};
use std::rc::Rc;

#[test]
fn bubble_rises_then_restarts_below_the_floor() {
    let bounds = SceneBounds::from_viewport(400, 600);
    let ranges = BubbleRanges::from(&SceneOptions::default());
    let mut rng = StdRng::seed_from_u64(11);
    let mut b = Bubble::new(Rc::new(bubble_sprite()), ranges, Vec2::new(0.0, 300.0), 3.0, 2.0);

    let mut last_y = b.pos.y;
    for frame in 1..300u64 {
        let mut tick = Tick {
            frame,
            bounds,
            rng: &mut rng,
        };
        b.update(&mut tick);
        assert!(b.pos.y < last_y, "frame {frame}");
        assert_eq!(b.resets(), 0, "frame {frame}");
        last_y = b.pos.y;
    }
    assert_eq!(b.pos.y, -298.0);

    let mut tick = Tick {
        frame: 300,
        bounds,
        rng: &mut rng,
    };
    b.update(&mut tick);
    assert_eq!(b.resets(), 1);
    assert!(b.pos.y > bounds.half_height, "{}", b.pos.y);
    assert!(b.pos.x.abs() <= bounds.half_width);
    assert!(b.speed >= ranges.speed.0 && b.speed <= ranges.speed.1);
    assert!(b.size >= ranges.size.0 && b.size <= ranges.size.1);
}

#[test]
fn margin_delays_the_reset() {
    let bounds = SceneBounds::from_viewport(100, 100);
    let ranges = BubbleRanges {
        margin: 10.0,
        ..BubbleRanges::from(&SceneOptions::default())
    };
    let mut rng = StdRng::seed_from_u64(12);
    let mut b = Bubble::new(Rc::new(bubble_sprite()), ranges, Vec2::new(0.0, 0.0), 3.0, 1.0);
    let mut frames = 0u64;
    while b.resets() == 0 {
        frames += 1;
        let mut tick = Tick {
            frame: frames,
            bounds,
            rng: &mut rng,
        };
        b.update(&mut tick);
        assert!(frames < 1000);
    }
    assert_eq!(frames, 60);
}
