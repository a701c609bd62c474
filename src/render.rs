use crate::math::{Affine2, Vec2};
use crate::sprite::{SourceRect, Sprite};
use anyhow::Context;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

// Braille: each terminal cell is 2x4 subpixels.
pub const SUB_X: u32 = 2;
pub const SUB_Y: u32 = 4;

// Ink below this alpha does not light a braille dot.
const INK_THRESHOLD: u8 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Cell {
    pub fn blank(bg: Color) -> Self {
        Self {
            ch: ' ',
            fg: Color::Reset,
            bg,
        }
    }
}

pub struct CellBuffer {
    pub w: u16,
    pub h: u16,
    pub cells: Vec<Cell>,
}

impl CellBuffer {
    pub fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::blank(Color::Black); (w as usize) * (h as usize)],
        }
    }

    pub fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }

    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        if x < self.w && y < self.h {
            Some(self.cells[self.idx(x, y)])
        } else {
            None
        }
    }

    pub fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell::blank(bg));
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

pub struct PixelCanvas {
    pub w: u32,
    pub h: u32,
    pub px: Vec<Pixel>,
}

impl PixelCanvas {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }

    pub fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub fn clear(&mut self, p: Pixel) {
        self.px.fill(p);
    }

    pub fn get(&self, x: u32, y: u32) -> Pixel {
        if x >= self.w || y >= self.h {
            return Pixel::default();
        }
        self.px[self.idx(x, y)]
    }

    pub fn put(&mut self, x: u32, y: u32, p: Pixel) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.px[i] = p;
        }
    }

    pub fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }

    /// Blits `src` of `sprite` into the local rectangle `dest`, placed on the
    /// canvas by `xf` (local -> scene, scene origin at the canvas center).
    /// Nearest-neighbour sampling, alpha-over blending.
    pub fn draw_image(&mut self, xf: Affine2, sprite: &Sprite, src: SourceRect, dest: LocalRect) {
        if dest.w.abs() <= 1e-6 || dest.h.abs() <= 1e-6 || src.w == 0 || src.h == 0 {
            return;
        }
        let to_canvas = Affine2::IDENTITY
            .translate(self.w as f32 * 0.5, self.h as f32 * 0.5)
            .then(xf);
        let Some(inv) = to_canvas.inverse() else {
            return;
        };

        let corners = [
            Vec2::new(dest.x, dest.y),
            Vec2::new(dest.x + dest.w, dest.y),
            Vec2::new(dest.x, dest.y + dest.h),
            Vec2::new(dest.x + dest.w, dest.y + dest.h),
        ];
        let mut min = Vec2::new(f32::MAX, f32::MAX);
        let mut max = Vec2::new(f32::MIN, f32::MIN);
        for c in corners {
            let p = to_canvas.apply(c);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        let x0 = (min.x.floor() as i32).max(0);
        let y0 = (min.y.floor() as i32).max(0);
        let x1 = (max.x.ceil() as i32).min(self.w as i32 - 1);
        let y1 = (max.y.ceil() as i32).min(self.h as i32 - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let local = inv.apply(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                let u = (local.x - dest.x) / dest.w;
                let v = (local.y - dest.y) / dest.h;
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                let sx = src.x + ((u * src.w as f32) as u32).min(src.w - 1);
                let sy = src.y + ((v * src.h as f32) as u32).min(src.h - 1);
                let p = sprite.pixel(sx, sy);
                if p.a > 0 {
                    self.blend_over(x, y, p);
                }
            }
        }
    }
}

/// Destination rectangle in an entity's local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl LocalRect {
    pub fn centered(w: f32, h: f32) -> Self {
        Self {
            x: -w * 0.5,
            y: -h * 0.5,
            w,
            h,
        }
    }
}

/// One frame's drawing targets. The backdrop becomes cell background colour,
/// the ink becomes braille dots on top of it.
pub struct Surface {
    pub backdrop: PixelCanvas,
    pub ink: PixelCanvas,
}

impl Surface {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            backdrop: PixelCanvas::new(w, h),
            ink: PixelCanvas::new(w, h),
        }
    }

    pub fn width(&self) -> u32 {
        self.ink.w
    }

    pub fn height(&self) -> u32 {
        self.ink.h
    }

    pub fn clear(&mut self) {
        self.backdrop.clear(Pixel::rgb(0, 0, 0));
        self.ink.clear(Pixel::default());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    TrueColor,
    Ansi256,
    Mono,
}

impl ColorMode {
    pub fn color(self, p: Pixel, mono: Color) -> Color {
        match self {
            ColorMode::TrueColor => Color::Rgb {
                r: p.r,
                g: p.g,
                b: p.b,
            },
            ColorMode::Ansi256 => Color::AnsiValue(rgb_to_ansi256(p.r, p.g, p.b)),
            ColorMode::Mono => mono,
        }
    }
}

/// What the terminal can show. Shading needs 24-bit colour; without it the
/// ripple would quantize into flicker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backend {
    pub color: ColorMode,
    pub shading: bool,
}

impl Backend {
    pub fn detect(enable_color: bool) -> Self {
        Self::from_colorterm(std::env::var("COLORTERM").ok().as_deref(), enable_color)
    }

    pub fn from_colorterm(colorterm: Option<&str>, enable_color: bool) -> Self {
        if !enable_color {
            return Self {
                color: ColorMode::Mono,
                shading: false,
            };
        }
        match colorterm {
            Some(v) if v.eq_ignore_ascii_case("truecolor") || v.eq_ignore_ascii_case("24bit") => {
                Self {
                    color: ColorMode::TrueColor,
                    shading: true,
                }
            }
            _ => Self {
                color: ColorMode::Ansi256,
                shading: false,
            },
        }
    }

    /// One-time notice for a colour terminal that can't run the ripple.
    pub fn notice(&self) -> Option<&'static str> {
        (self.color == ColorMode::Ansi256)
            .then_some("No 24-bit colour detected (COLORTERM): ripple effect off, colours approximated")
    }
}

/// Nearest entry of the xterm 6x6x6 colour cube.
pub fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    let level = |c: u8| -> u8 {
        if c < 48 {
            0
        } else if c < 115 {
            1
        } else {
            (c - 35) / 40
        }
    };
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

pub fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

pub fn surface_to_cells(surface: &Surface, out: &mut CellBuffer, mode: ColorMode) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let px0 = cx * SUB_X;
            let py0 = cy * SUB_Y;

            let mut mask: u8 = 0;
            let mut ink = [0u32; 3];
            let mut ink_count = 0u32;
            let mut back = [0u32; 3];
            let mut back_count = 0u32;

            for dy in 0..SUB_Y {
                for dx in 0..SUB_X {
                    let x = px0 + dx;
                    let y = py0 + dy;
                    if x >= surface.ink.w || y >= surface.ink.h {
                        continue;
                    }
                    let b = surface.backdrop.get(x, y);
                    back[0] += b.r as u32;
                    back[1] += b.g as u32;
                    back[2] += b.b as u32;
                    back_count += 1;

                    let p = surface.ink.get(x, y);
                    if p.a >= INK_THRESHOLD {
                        mask |= braille_bit(dx, dy);
                        ink[0] += p.r as u32;
                        ink[1] += p.g as u32;
                        ink[2] += p.b as u32;
                        ink_count += 1;
                    }
                }
            }

            let avg = |sum: [u32; 3], n: u32| -> Pixel {
                let n = n.max(1);
                Pixel::rgb((sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8)
            };

            let ch = if mask == 0 {
                ' '
            } else {
                char::from_u32(0x2800 + mask as u32).unwrap_or(' ')
            };
            let fg = if ink_count > 0 {
                mode.color(avg(ink, ink_count), Color::White)
            } else {
                Color::Reset
            };
            let bg = mode.color(avg(back, back_count), Color::Black);

            out.set(cx as u16, cy as u16, Cell { ch, fg, bg });
        }
    }
}

pub fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

pub struct Terminal {
    pub out: io::Stdout,
    pub cols: u16,
    pub rows: u16,
    pub prev: CellBuffer,
    pub cur: CellBuffer,
    pub surface: Surface,
    full_redraw: bool,
}

impl Terminal {
    pub fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )
        .context("could not enter the alternate screen")?;
        terminal::enable_raw_mode().context("could not enable raw mode")?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
            surface: Surface::new(cols as u32 * SUB_X, rows as u32 * SUB_Y),
            full_redraw: true,
        })
    }

    pub fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Sub-pixel viewport size, the scene's unit of measure.
    pub fn viewport(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }

    pub fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.surface = Surface::new(c as u32 * SUB_X, r as u32 * SUB_Y);
        self.full_redraw = true;
        Ok(true)
    }

    pub fn force_redraw(&mut self) {
        self.full_redraw = true;
    }

    pub fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if !self.full_redraw && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        self.full_redraw = false;
        Ok(())
    }
}

/// Restores the terminal even when the frame loop bails out with an error.
pub struct CleanupGuard;

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let mut out = io::stdout();
        let _ = queue!(
            out,
            EndSynchronizedUpdate,
            ResetColor,
            cursor::Show,
            EnableLineWrap,
            LeaveAlternateScreen
        );
        let _ = out.flush();
        let _ = terminal::disable_raw_mode();
    }
}
