//! Ocean backdrop: a full-viewport quad sampled through the ripple program,
//! or a plain nearest-neighbour stretch of the ocean image when no program
//! is available.

use crate::render::{Pixel, PixelCanvas};
use crate::sprite::Sprite;
use anyhow::{anyhow, bail, Context, Result};
use std::rc::Rc;

/// Vertex and fragment stage sources as loaded from disk.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

/// Compiled ripple program. The fragment stage samples `uTexture` at
/// `vTexCoord` displaced by a sine field driven by `time`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleShader {
    pub amplitude: f32,
    pub frequency: f32,
    pub speed: f32,
}

impl Default for RippleShader {
    fn default() -> Self {
        Self {
            amplitude: 0.01,
            frequency: 10.0,
            speed: 2.0,
        }
    }
}

/// Strips `//` and `/* */` comments so declarations inside them don't count.
fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
            out.push(' ');
        } else {
            let ch = rest.chars().next().unwrap_or(' ');
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

/// Semicolon-terminated declarations, whitespace-normalized.
fn declarations(src: &str) -> Vec<String> {
    src.lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .split(';')
        .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|d| !d.is_empty())
        .collect()
}

fn declares(decls: &[String], qualifiers: &[&str], ty: &str, name: &str) -> bool {
    decls.iter().any(|d| {
        let words: Vec<&str> = d.split(' ').collect();
        words.len() >= 3
            && qualifiers.contains(&words[words.len() - 3])
            && words[words.len() - 2] == ty
            && words[words.len() - 1] == name
    })
}

fn define(src: &str, name: &str) -> Result<Option<f32>> {
    for line in src.lines() {
        let mut words = line.split_whitespace();
        if words.next() != Some("#define") || words.next() != Some(name) {
            continue;
        }
        let value = words
            .next()
            .ok_or_else(|| anyhow!("#define {name} has no value"))?;
        let v = value
            .trim_end_matches('f')
            .parse::<f32>()
            .with_context(|| format!("#define {name} is not a number: {value}"))?;
        if !v.is_finite() {
            bail!("#define {name} is not finite");
        }
        return Ok(Some(v));
    }
    Ok(None)
}

impl RippleShader {
    /// Checks both stages declare the interface the backdrop drives and
    /// reads the ripple constants.
    pub fn compile(src: &ShaderSources) -> Result<Self> {
        let vert = strip_comments(&src.vertex);
        let frag = strip_comments(&src.fragment);
        if !vert.contains("void main") {
            bail!("vertex stage: missing main()");
        }
        if !frag.contains("void main") {
            bail!("fragment stage: missing main()");
        }

        let vdecls = declarations(&vert);
        if !declares(&vdecls, &["attribute", "in"], "vec3", "aPosition") {
            bail!("vertex stage: missing `attribute vec3 aPosition`");
        }
        if !declares(&vdecls, &["varying", "out"], "vec2", "vTexCoord") {
            bail!("vertex stage: missing `varying vec2 vTexCoord`");
        }

        let fdecls = declarations(&frag);
        if !declares(&fdecls, &["uniform"], "sampler2D", "uTexture") {
            bail!("fragment stage: missing `uniform sampler2D uTexture`");
        }
        if !declares(&fdecls, &["uniform"], "float", "time") {
            bail!("fragment stage: missing `uniform float time`");
        }
        if !declares(&fdecls, &["varying", "in"], "vec2", "vTexCoord") {
            bail!("fragment stage: missing `varying vec2 vTexCoord`");
        }

        let d = RippleShader::default();
        Ok(Self {
            amplitude: define(&frag, "RIPPLE_AMPLITUDE")?.unwrap_or(d.amplitude),
            frequency: define(&frag, "RIPPLE_FREQUENCY")?.unwrap_or(d.frequency),
            speed: define(&frag, "RIPPLE_SPEED")?.unwrap_or(d.speed),
        })
    }

    /// Fragment stage for one texture coordinate.
    pub fn shade(&self, texture: &Sprite, u: f32, v: f32, time: f32) -> Pixel {
        let su = u + (v * self.frequency + time * self.speed).sin() * self.amplitude;
        let sv = v + (u * self.frequency + time * self.speed).cos() * self.amplitude;
        texture.sample(su, sv)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundPath {
    Shaded,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub w: u32,
    pub h: u32,
}

pub struct Background {
    texture: Option<Rc<Sprite>>,
    shader: Option<RippleShader>,
    quad: Quad,
}

impl Background {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            texture: None,
            shader: None,
            quad: Quad {
                w: width,
                h: height,
            },
        }
    }

    pub fn set_texture(&mut self, texture: Rc<Sprite>) {
        self.texture = Some(texture);
    }

    /// Compiles the ripple program. Missing sources, a failed compile, or a
    /// backend without shading all leave the fallback path in place; nothing
    /// here fails the caller.
    pub fn install_shader(&mut self, sources: Option<&ShaderSources>, backend_shading: bool) {
        self.shader = None;
        if !backend_shading {
            tracing::info!("shading unavailable on this backend; using the plain backdrop");
            return;
        }
        let Some(sources) = sources else {
            tracing::warn!("ripple shader sources unavailable; using the plain backdrop");
            return;
        };
        match RippleShader::compile(sources) {
            Ok(shader) => {
                tracing::info!(?shader, "ripple shader compiled");
                self.shader = Some(shader);
            }
            Err(err) => tracing::error!(error = %format!("{err:#}"), "shader compilation failed"),
        }
    }

    pub fn path(&self) -> BackgroundPath {
        if self.shader.is_some() && self.texture.is_some() {
            BackgroundPath::Shaded
        } else {
            BackgroundPath::Fallback
        }
    }

    pub fn quad(&self) -> Quad {
        self.quad
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.quad = Quad {
            w: width,
            h: height,
        };
    }

    pub fn draw(&self, canvas: &mut PixelCanvas, time: f32) {
        let w = self.quad.w.min(canvas.w);
        let h = self.quad.h.min(canvas.h);
        let Some(texture) = self.texture.as_deref() else {
            canvas.clear(crate::sprite::PLACEHOLDER_BLUE);
            return;
        };

        let inv_w = 1.0 / self.quad.w.max(1) as f32;
        let inv_h = 1.0 / self.quad.h.max(1) as f32;
        for y in 0..h {
            let v = (y as f32 + 0.5) * inv_h;
            for x in 0..w {
                let u = (x as f32 + 0.5) * inv_w;
                let p = match &self.shader {
                    Some(shader) => shader.shade(texture, u, v, time),
                    None => texture.sample_nearest(u, v),
                };
                canvas.put(x, y, Pixel { a: 255, ..p });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = include_str!("../assets/shaders/water.vert");
    const FRAG: &str = include_str!("../assets/shaders/water.frag");

    fn sources(vertex: &str, fragment: &str) -> ShaderSources {
        ShaderSources {
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
        }
    }

    #[test]
    fn shipped_shaders_compile() {
        let shader = RippleShader::compile(&sources(VERT, FRAG)).expect("compiles");
        assert!(shader.amplitude > 0.0);
        assert!(shader.frequency > 0.0);
    }

    #[test]
    fn fragment_without_time_uniform_is_rejected() {
        let frag = FRAG.replace("uniform float time;", "");
        let err = RippleShader::compile(&sources(VERT, &frag)).unwrap_err();
        assert!(err.to_string().contains("time"), "{err}");
    }

    #[test]
    fn commented_out_declaration_does_not_count() {
        let frag = FRAG.replace("uniform sampler2D uTexture;", "// uniform sampler2D uTexture;");
        assert!(RippleShader::compile(&sources(VERT, &frag)).is_err());
    }

    #[test]
    fn bad_define_is_a_compile_error() {
        let frag = format!("#define RIPPLE_SPEED fast\n{FRAG}");
        assert!(RippleShader::compile(&sources(VERT, &frag)).is_err());
    }

    #[test]
    fn failed_compile_degrades_to_fallback() {
        let mut bg = Background::new(8, 8);
        bg.set_texture(Rc::new(Sprite::solid(2, 2, Pixel::rgb(0, 80, 160))));
        bg.install_shader(Some(&sources("garbage", "garbage")), true);
        assert_eq!(bg.path(), BackgroundPath::Fallback);

        let mut canvas = PixelCanvas::new(8, 8);
        bg.draw(&mut canvas, 1.0);
        assert!(canvas.px.iter().all(|p| *p == Pixel::rgb(0, 80, 160)));
    }

    #[test]
    fn backend_without_shading_never_compiles() {
        let mut bg = Background::new(8, 8);
        bg.set_texture(Rc::new(Sprite::solid(2, 2, Pixel::rgb(0, 80, 160))));
        bg.install_shader(Some(&sources(VERT, FRAG)), false);
        assert_eq!(bg.path(), BackgroundPath::Fallback);
        bg.install_shader(Some(&sources(VERT, FRAG)), true);
        assert_eq!(bg.path(), BackgroundPath::Shaded);
    }
}
