use anyhow::Result;
use aquarium::{app, cli::Cli};
use clap::Parser;

fn main() -> Result<()> {
    app::run(Cli::parse())
}
