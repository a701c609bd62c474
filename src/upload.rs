use crate::scene::{AddFish, Aquarium};
use crate::sprite::{ArticulationConfig, Sprite};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A user-supplied fish: the decoded image plus its articulation, if one
/// was shipped alongside.
pub struct Upload {
    pub sprite: Sprite,
    pub config: Option<ArticulationConfig>,
}

/// `reef/clown.png` -> `reef/clown.json`.
pub fn sidecar_path(image: &Path) -> PathBuf {
    image.with_extension("json")
}

pub fn load_upload(path: &Path) -> Result<Upload> {
    let bytes = std::fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
    let sprite = Sprite::decode(&bytes).with_context(|| format!("{} is not an image", path.display()))?;

    let side = sidecar_path(path);
    let config = if side.exists() && side != path {
        match ArticulationConfig::load(&side) {
            Ok(c) => Some(c),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "articulation sidecar ignored");
                None
            }
        }
    } else {
        None
    };
    Ok(Upload { sprite, config })
}

pub fn submit(scene: &mut Aquarium, upload: Upload) -> AddFish {
    scene.add_fish(Rc::new(upload.sprite), upload.config.as_ref())
}

/// Status line text for an add.
pub fn describe(outcome: AddFish) -> String {
    match outcome {
        AddFish::Added { count } if count == 1 => "Fish added: 1 fish swimming".to_string(),
        AddFish::Added { count } => format!("Fish added: {count} fish swimming"),
        AddFish::Full { max } => format!("The aquarium is full ({max} fish)"),
    }
}
