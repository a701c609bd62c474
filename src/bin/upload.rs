//! Sends a fish image to every aquarium listening on a channel.

use anyhow::{Context, Result};
use aquarium::broadcast::BroadcastChannel;
use aquarium::config::{load_settings, project_paths};
use aquarium::logging::init_stderr_tracing;
use aquarium::sprite::Sprite;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aquarium-upload")]
#[command(about = "Release a fish into a running aquarium")]
struct Args {
    /// PNG, JPEG or GIF image of the fish.
    image: PathBuf,

    /// Channel name; defaults to the one in the aquarium settings.
    #[arg(long)]
    channel: Option<String>,
}

fn main() -> Result<()> {
    init_stderr_tracing();
    let args = Args::parse();

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("could not read {}", args.image.display()))?;
    // Refuse garbage here rather than in the receiving aquarium.
    Sprite::decode(&bytes).with_context(|| format!("{} is not an image", args.image.display()))?;

    let paths = project_paths()?;
    let name = args
        .channel
        .unwrap_or_else(|| load_settings(&paths.settings_path).channel);
    let channel = BroadcastChannel::open(&paths.channels_dir, &name)?;

    let ext = args
        .image
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "png".to_string());
    channel.post_new_fish(&bytes, &ext)?;
    println!("Sent {} to channel '{}'", args.image.display(), channel.name());
    Ok(())
}
