//! Sprite images, fish articulation slots and the procedural fallbacks used
//! when an asset image cannot be loaded.

use crate::math::{hash2, smoothstep, Vec2};
use crate::render::Pixel;
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::path::Path;

/// Uploads larger than this (on either side) are downscaled before use.
pub const MAX_SPRITE_EDGE: u32 = 256;

#[derive(Clone, Debug)]
pub struct Sprite {
    image: RgbaImage,
}

impl Sprite {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn solid(w: u32, h: u32, p: Pixel) -> Self {
        Self::new(RgbaImage::from_pixel(w, h, Rgba([p.r, p.g, p.b, p.a])))
    }

    /// Decodes any format `image` understands, downscaling oversized input.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("image decode failed")?;
        let img = if img.width() > MAX_SPRITE_EDGE || img.height() > MAX_SPRITE_EDGE {
            img.thumbnail(MAX_SPRITE_EDGE, MAX_SPRITE_EDGE)
        } else {
            img
        };
        Ok(Self::new(img.to_rgba8()))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
        Self::decode(&bytes).with_context(|| format!("could not decode {}", path.display()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn full_rect(&self) -> SourceRect {
        SourceRect {
            x: 0,
            y: 0,
            w: self.width(),
            h: self.height(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        if x >= self.width() || y >= self.height() {
            return Pixel::default();
        }
        let Rgba([r, g, b, a]) = *self.image.get_pixel(x, y);
        Pixel { r, g, b, a }
    }

    /// Bilinear sample at normalized `(u, v)`, clamped to the edges.
    pub fn sample(&self, u: f32, v: f32) -> Pixel {
        if self.width() == 0 || self.height() == 0 {
            return Pixel::default();
        }
        let fx = (u.clamp(0.0, 1.0) * (self.width() - 1) as f32).max(0.0);
        let fy = (v.clamp(0.0, 1.0) * (self.height() - 1) as f32).max(0.0);
        let (x0, y0) = (fx as u32, fy as u32);
        let (x1, y1) = ((x0 + 1).min(self.width() - 1), (y0 + 1).min(self.height() - 1));
        let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

        let mix = |a: Pixel, b: Pixel, t: f32| -> [f32; 4] {
            [
                a.r as f32 + (b.r as f32 - a.r as f32) * t,
                a.g as f32 + (b.g as f32 - a.g as f32) * t,
                a.b as f32 + (b.b as f32 - a.b as f32) * t,
                a.a as f32 + (b.a as f32 - a.a as f32) * t,
            ]
        };
        let top = mix(self.pixel(x0, y0), self.pixel(x1, y0), tx);
        let bot = mix(self.pixel(x0, y1), self.pixel(x1, y1), tx);
        let ch = |i: usize| (top[i] + (bot[i] - top[i]) * ty).round().clamp(0.0, 255.0) as u8;
        Pixel {
            r: ch(0),
            g: ch(1),
            b: ch(2),
            a: ch(3),
        }
    }

    /// Sample by nearest texel at normalized `(u, v)`.
    pub fn sample_nearest(&self, u: f32, v: f32) -> Pixel {
        if self.width() == 0 || self.height() == 0 {
            return Pixel::default();
        }
        let x = ((u.clamp(0.0, 1.0) * self.width() as f32) as u32).min(self.width() - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height() as f32) as u32).min(self.height() - 1);
        self.pixel(x, y)
    }
}

/// Rectangle in sprite texel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl SourceRect {
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.x as f32 + self.w as f32 * 0.5,
            self.y as f32 + self.h as f32 * 0.5,
        )
    }

    /// Intersection with a `w` x `h` image; None when nothing is left.
    pub fn clipped(self, w: u32, h: u32) -> Option<SourceRect> {
        if self.x >= w || self.y >= h {
            return None;
        }
        let cw = self.w.min(w - self.x);
        let ch = self.h.min(h - self.y);
        (cw > 0 && ch > 0).then_some(SourceRect {
            x: self.x,
            y: self.y,
            w: cw,
            h: ch,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartSlot {
    Tail,
    Fin,
}

impl PartSlot {
    pub const ALL: [PartSlot; 2] = [PartSlot::Tail, PartSlot::Fin];

    pub fn index(self) -> usize {
        match self {
            PartSlot::Tail => 0,
            PartSlot::Fin => 1,
        }
    }
}

/// One articulation slot as written in a template config. Missing motion
/// fields are rolled per fish.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    pub source: SourceRect,
    pub pivot: Pivot,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub offset: Option<f32>,
    /// Degrees.
    #[serde(default)]
    pub amplitude: Option<f32>,
}

/// JSON articulation description shipped next to a fish image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticulationConfig {
    #[serde(default)]
    pub body: Option<SourceRect>,
    #[serde(default)]
    pub tail: Option<PartConfig>,
    #[serde(default)]
    pub fin: Option<PartConfig>,
}

impl ArticulationConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("invalid articulation config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Self::from_json(&s)
    }

    pub fn part(&self, slot: PartSlot) -> Option<&PartConfig> {
        match slot {
            PartSlot::Tail => self.tail.as_ref(),
            PartSlot::Fin => self.fin.as_ref(),
        }
    }
}

/// Articulated part ready for drawing, motion values resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Part {
    pub source: SourceRect,
    pub pivot: Vec2,
    pub speed: f32,
    pub offset: f32,
    /// Radians.
    pub amplitude: f32,
}

impl Part {
    pub fn angle_at(&self, frame: u64) -> f32 {
        (frame as f32 * self.speed + self.offset).sin() * self.amplitude
    }
}

/// Per-fish sprite: one atlas image, the body rectangle, and up to one part
/// per slot, indexed by `PartSlot::index`.
#[derive(Clone, Debug)]
pub struct FishSprite {
    pub image: std::rc::Rc<Sprite>,
    pub body: SourceRect,
    pub parts: [Option<Part>; 2],
}

impl FishSprite {
    pub fn flat(image: std::rc::Rc<Sprite>) -> Self {
        let body = image.full_rect();
        Self {
            image,
            body,
            parts: [None, None],
        }
    }

    /// Resolves a template config against `image`. Slots whose source
    /// rectangle falls outside the image are dropped; motion values the
    /// config leaves out are rolled from the slot's default ranges.
    pub fn articulated(
        image: std::rc::Rc<Sprite>,
        config: &ArticulationConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let (w, h) = (image.width(), image.height());
        let body = config
            .body
            .and_then(|r| r.clipped(w, h))
            .unwrap_or_else(|| image.full_rect());

        let mut parts = [None, None];
        for slot in PartSlot::ALL {
            let Some(cfg) = config.part(slot) else {
                continue;
            };
            let Some(source) = cfg.source.clipped(w, h) else {
                tracing::warn!(?slot, "articulation slot lies outside the sprite; skipped");
                continue;
            };
            let (speed_range, amp_range) = match slot {
                PartSlot::Tail => (0.1..0.3, 5.0..15.0),
                PartSlot::Fin => (0.05..0.15, 3.0..8.0),
            };
            let amplitude_deg: f32 = cfg.amplitude.unwrap_or_else(|| rng.gen_range(amp_range));
            parts[slot.index()] = Some(Part {
                source,
                pivot: Vec2::new(cfg.pivot.x, cfg.pivot.y),
                speed: cfg.speed.unwrap_or_else(|| rng.gen_range(speed_range)),
                offset: cfg.offset.unwrap_or_else(|| rng.gen_range(0.0..TAU)),
                amplitude: amplitude_deg.to_radians(),
            });
        }

        Self { image, body, parts }
    }

    pub fn is_articulated(&self) -> bool {
        self.parts.iter().any(Option::is_some)
    }

    pub fn part(&self, slot: PartSlot) -> Option<&Part> {
        self.parts[slot.index()].as_ref()
    }
}

/* -----------------------------
   Procedural fallbacks
------------------------------ */

fn put(img: &mut RgbaImage, x: i32, y: i32, p: [u8; 4]) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Rgba(p));
    }
}

/// Deep-water gradient with hash-noise caustics.
pub fn ocean_texture(w: u32, h: u32, seed: u32) -> Sprite {
    let mut img = RgbaImage::new(w, h);
    for y in 0..h {
        let ny = y as f32 / h.max(1) as f32;
        for x in 0..w {
            let nx = x as f32 / w.max(1) as f32;
            let n = (hash2(x as i32, y as i32, seed) & 1023) as f32 / 1023.0;
            let caust = ((nx * 9.0).sin() * (ny * 7.5).cos()).abs();
            let light = smoothstep(0.55, 0.92, caust) * 0.25 + (n - 0.5) * 0.06;
            let depth = 1.0 - ny * 0.65;
            let r = (8.0 + 30.0 * light) * depth;
            let g = (60.0 + 90.0 * depth + 60.0 * light) * depth;
            let b = (110.0 + 110.0 * depth + 40.0 * light) * depth;
            img.put_pixel(
                x,
                y,
                Rgba([
                    r.clamp(0.0, 255.0) as u8,
                    g.clamp(0.0, 255.0) as u8,
                    b.clamp(0.0, 255.0) as u8,
                    255,
                ]),
            );
        }
    }
    Sprite::new(img)
}

/// Flat colour used for the backdrop while assets are still loading, and as
/// the last-resort background.
pub const PLACEHOLDER_BLUE: Pixel = Pixel::rgb(0, 50, 100);

pub fn bubble_sprite() -> Sprite {
    let size = 16;
    let mut img = RgbaImage::new(size, size);
    let c = (size as f32 - 1.0) * 0.5;
    for y in 0..size {
        for x in 0..size {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt() / c;
            if d > 1.0 {
                continue;
            }
            let rim = smoothstep(0.55, 0.95, d);
            let a = (70.0 + 170.0 * rim) as u8;
            put(&mut img, x as i32, y as i32, [190, 235, 255, a]);
        }
    }
    // highlight
    for (dx, dy) in [(4, 4), (5, 4), (4, 5)] {
        put(&mut img, dx, dy, [255, 255, 255, 255]);
    }
    Sprite::new(img)
}

pub fn coral_sprite() -> Sprite {
    let (w, h) = (24u32, 32u32);
    let mut img = RgbaImage::new(w, h);
    let stems: [(f32, f32, f32); 5] = [
        (12.0, 0.0, 1.0),
        (7.0, -0.45, 0.75),
        (17.0, 0.4, 0.8),
        (4.0, -0.8, 0.5),
        (20.0, 0.7, 0.55),
    ];
    for (i, &(x0, lean, reach)) in stems.iter().enumerate() {
        let len = h as f32 * reach;
        let steps = len as i32;
        for s in 0..steps {
            let u = s as f32 / len;
            let x = x0 + lean * u * u * 10.0;
            let y = h as f32 - 1.0 - s as f32;
            let thick = if u < 0.7 { 1 } else { 0 };
            let shade = (180.0 + 60.0 * u) as u8;
            let col = if i % 2 == 0 {
                [shade, 90, 110, 255]
            } else {
                [shade, 120, 80, 255]
            };
            for t in -thick..=thick {
                put(&mut img, x as i32 + t, y as i32, col);
            }
        }
    }
    Sprite::new(img)
}

/// Template fish atlas laid out as an assembled fish facing +x: tail on the
/// left, body in the middle, dorsal fin above. Returns the atlas and the
/// articulation matching that layout (pivots in atlas texels).
pub fn fish_template() -> (Sprite, ArticulationConfig) {
    let (w, h) = (54u32, 26u32);
    let mut img = RgbaImage::new(w, h);

    let (cx, cy, rx, ry) = (34.0f32, 17.0f32, 19.5f32, 8.5f32);
    for y in 8..h {
        for x in 14..w {
            let dx = (x as f32 - cx) / rx;
            let dy = (y as f32 - cy) / ry;
            if dx * dx + dy * dy > 1.0 {
                continue;
            }
            let belly = ((y as f32 - cy) / ry).max(0.0);
            let stripe = ((x as f32 * 0.6).sin() * 0.5 + 0.5) * 30.0;
            put(
                &mut img,
                x as i32,
                y as i32,
                [
                    250,
                    (150.0 + stripe + 60.0 * belly) as u8,
                    (40.0 + 90.0 * belly) as u8,
                    255,
                ],
            );
        }
    }
    for (ex, ey) in [(45, 14), (46, 14), (45, 15), (46, 15)] {
        put(&mut img, ex, ey, [20, 20, 30, 255]);
    }

    // Tail fan widens away from the body joint at x = 14.
    for y in 8..h as i32 {
        for x in 0..14 {
            let spread = 2.0 + (13 - x) as f32 * 0.6;
            if (y as f32 - cy).abs() <= spread {
                put(&mut img, x, y, [255, 120, 30, 235]);
            }
        }
    }

    // Dorsal fin slopes back toward the tail.
    for y in 0..8 {
        let reach = (y + 1) * 10 / 8;
        for x in 0..reach {
            put(&mut img, 36 - reach + x, y, [255, 190, 60, 220]);
        }
    }

    let config = ArticulationConfig {
        body: Some(SourceRect {
            x: 14,
            y: 8,
            w: 40,
            h: 18,
        }),
        tail: Some(PartConfig {
            source: SourceRect {
                x: 0,
                y: 8,
                w: 14,
                h: 18,
            },
            pivot: Pivot { x: 14.0, y: 17.0 },
            speed: None,
            offset: None,
            amplitude: None,
        }),
        fin: Some(PartConfig {
            source: SourceRect {
                x: 26,
                y: 0,
                w: 10,
                h: 8,
            },
            pivot: Pivot { x: 31.0, y: 8.0 },
            speed: None,
            offset: None,
            amplitude: None,
        }),
    };
    (Sprite::new(img), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn articulation_config_accepts_partial_parts() {
        let cfg = ArticulationConfig::from_json(
            r#"{
                "tail": {
                    "source": {"x": 100, "y": 0, "w": 50, "h": 40},
                    "pivot": {"x": 10, "y": 20},
                    "amplitude": 12
                }
            }"#,
        )
        .expect("parses");
        let tail = cfg.part(PartSlot::Tail).expect("tail");
        assert_eq!(tail.source.w, 50);
        assert_eq!(tail.amplitude, Some(12.0));
        assert_eq!(tail.speed, None);
        assert!(cfg.part(PartSlot::Fin).is_none());
        assert!(cfg.body.is_none());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(ArticulationConfig::from_json(r#"{"tail": {"source": 3}}"#).is_err());
    }

    #[test]
    fn source_rect_clips_to_image() {
        let r = SourceRect {
            x: 10,
            y: 10,
            w: 50,
            h: 50,
        };
        assert_eq!(
            r.clipped(40, 30),
            Some(SourceRect {
                x: 10,
                y: 10,
                w: 30,
                h: 20
            })
        );
        assert_eq!(r.clipped(10, 30), None);
    }

    #[test]
    fn decode_downscales_large_images() {
        let big = RgbaImage::from_pixel(600, 300, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(big)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode");
        let sprite = Sprite::decode(&bytes).expect("decode");
        assert_eq!(sprite.width(), MAX_SPRITE_EDGE);
        assert_eq!(sprite.height(), 128);
    }

    #[test]
    fn template_parts_fit_inside_the_atlas() {
        let (sprite, cfg) = fish_template();
        for slot in PartSlot::ALL {
            let part = cfg.part(slot).expect("template has every slot");
            assert_eq!(
                part.source.clipped(sprite.width(), sprite.height()),
                Some(part.source)
            );
        }
    }
}
