use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coords::Rgba;

/// What fills a field's screen quad underneath everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldBackground {
    /// An image warped onto the quad. Relative paths resolve against the
    /// configured asset directory.
    Image { image: PathBuf, alpha: u8 },
    Color { color: Rgba, alpha: u8 },
}

impl FieldBackground {
    pub fn alpha(&self) -> u8 {
        match self {
            Self::Image { alpha, .. } | Self::Color { alpha, .. } => *alpha,
        }
    }

    /// Image location with `asset_dir` applied, `None` for solid colors.
    pub fn image_path(&self, asset_dir: &Path) -> Option<PathBuf> {
        match self {
            Self::Image { image, .. } if image.is_absolute() => Some(image.clone()),
            Self::Image { image, .. } => Some(asset_dir.join(image)),
            Self::Color { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_images_live_in_the_asset_dir() {
        let bg = FieldBackground::Image { image: "floor.png".into(), alpha: 200 };
        assert_eq!(bg.image_path(Path::new("assets")), Some(PathBuf::from("assets/floor.png")));
        assert_eq!(bg.alpha(), 200);

        let abs = std::env::temp_dir().join("floor.png");
        let bg = FieldBackground::Image { image: abs.clone(), alpha: 255 };
        assert_eq!(bg.image_path(Path::new("assets")), Some(abs));

        let solid = FieldBackground::Color { color: Rgba::black(), alpha: 10 };
        assert_eq!(solid.image_path(Path::new("assets")), None);
    }

    #[test]
    fn tagged_by_kind() {
        let bg: FieldBackground =
            serde_json::from_str(r#"{ "kind": "color", "color": [0, 80, 0], "alpha": 90 }"#).unwrap();
        assert_eq!(bg, FieldBackground::Color { color: Rgba::rgb(0, 80, 0), alpha: 90 });
    }
}
