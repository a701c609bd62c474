use crate::config::{BounceAxis, BouncePolicy, Settings, SpriteFormat};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "aquarium")]
#[command(about = "Braille aquarium: swimming fish, bubbles, swaying coral")]
pub struct Cli {
    /// Frame rate cap (10-240).
    #[arg(long)]
    pub fps: Option<u32>,

    /// RNG seed; 0 picks one from the clock.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory holding backgrounds/, decorations/, templates/ and shaders/.
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Fish images to release at start (an `<image>.json` sidecar articulates it).
    #[arg(long = "fish", value_name = "IMAGE")]
    pub fish: Vec<PathBuf>,

    /// Channel to receive fish from `aquarium-upload`.
    #[arg(long)]
    pub channel: Option<String>,

    #[arg(long, value_enum)]
    pub bounce_axis: Option<BounceAxis>,

    #[arg(long, value_enum)]
    pub bounce_policy: Option<BouncePolicy>,

    #[arg(long, value_enum)]
    pub sprite_format: Option<SpriteFormat>,

    /// Plain backdrop, no ripple.
    #[arg(long, default_value_t = false)]
    pub no_shader: bool,

    /// No colour at all.
    #[arg(long, default_value_t = false)]
    pub mono: bool,

    #[arg(long)]
    pub max_fish: Option<usize>,
}

impl Cli {
    /// Folds command-line overrides into the stored settings.
    pub fn apply(&self, s: &mut Settings) {
        if let Some(v) = self.fps {
            s.fps_cap = v;
        }
        if let Some(v) = self.seed {
            s.seed = v;
        }
        if let Some(v) = &self.assets {
            s.asset_dir = Some(v.clone());
        }
        if let Some(v) = &self.channel {
            s.channel = v.clone();
        }
        if let Some(v) = self.bounce_axis {
            s.scene.bounce_axis = v;
        }
        if let Some(v) = self.bounce_policy {
            s.scene.bounce_policy = v;
        }
        if let Some(v) = self.sprite_format {
            s.scene.sprite_format = v;
        }
        if let Some(v) = self.max_fish {
            s.scene.max_fish = v;
        }
        if self.no_shader {
            s.enable_shader = false;
        }
        if self.mono {
            s.enable_color = false;
        }
        s.scene = std::mem::take(&mut s.scene).sanitized();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "aquarium",
            "--fps",
            "60",
            "--bounce-policy",
            "half-turn-jitter",
            "--sprite-format",
            "flat",
            "--max-fish",
            "10",
            "--mono",
        ]);
        let mut s = Settings::default();
        cli.apply(&mut s);
        assert_eq!(s.fps_cap, 60);
        assert_eq!(s.scene.bounce_policy, BouncePolicy::HalfTurnJitter);
        assert_eq!(s.scene.sprite_format, SpriteFormat::Flat);
        assert_eq!(s.scene.max_fish, 10);
        assert!(!s.enable_color);
        assert!(s.enable_shader);
    }

    #[test]
    fn apply_repairs_hand_built_settings() {
        let cli = Cli::parse_from(["aquarium"]);
        let mut s = Settings::default();
        s.scene.bubble_speed = (-1.0, 0.0);
        cli.apply(&mut s);
        assert!(s.scene.bubble_speed.0 > 0.0);
        assert!(s.scene.bubble_speed.0 <= s.scene.bubble_speed.1);
    }

    #[test]
    fn no_flags_keep_settings() {
        let cli = Cli::parse_from(["aquarium"]);
        let mut s = Settings::default();
        s.channel = "reef".into();
        cli.apply(&mut s);
        assert_eq!(s.channel, "reef");
        assert_eq!(s.fps_cap, Settings::default().fps_cap);
    }
}
