use ahash::AHashMap;
use compact_str::{format_compact, CompactString};
use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Visual state a button is drawn in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonVisual {
    Normal,
    Selected,
    /// Button on an ancestor window behind the active one
    Inactive,
}

impl ButtonVisual {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Selected => "selected",
            Self::Inactive => "inactive",
        }
    }

    /// Flat colour used when no artwork is available
    pub fn fill(&self) -> Rgba<u8> {
        match self {
            Self::Normal => Rgba([176, 176, 176, 255]),
            Self::Selected => Rgba([200, 16, 46, 255]),
            Self::Inactive => Rgba([224, 224, 224, 255]),
        }
    }
}

/// Lazily loaded button artwork, `<dir>/<prefix>_<visual>.png`
pub struct AssetStore {
    dir: Option<PathBuf>,
    cache: AHashMap<(CompactString, ButtonVisual), Option<RgbaImage>>,
}

impl AssetStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: AHashMap::new(),
        }
    }

    pub fn get(&mut self, prefix: &str, visual: ButtonVisual) -> Option<&RgbaImage> {
        let dir = self.dir.as_ref()?;
        if prefix.is_empty() {
            return None;
        }

        self.cache
            .entry((prefix.into(), visual))
            .or_insert_with(|| {
                let file = format_compact!("{}_{}.png", prefix, visual.suffix());
                let path = dir.join(file.as_str());
                if !path.exists() {
                    debug!("No artwork at {:?}", path);
                    return None;
                }
                match image::open(&path) {
                    Ok(img) => Some(img.to_rgba8()),
                    Err(e) => {
                        warn!("Failed to load {:?}: {}", path, e);
                        None
                    }
                }
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn test_loads_and_caches_artwork() {
        let dir = tempfile::tempdir().unwrap();
        let art: RgbaImage = ImageBuffer::from_pixel(4, 3, Rgba([1, 2, 3, 255]));
        art.save(dir.path().join("Arm_selected.png")).unwrap();

        let mut store = AssetStore::new(Some(dir.path().to_path_buf()));
        let loaded = store.get("Arm", ButtonVisual::Selected).unwrap();
        assert_eq!(loaded.dimensions(), (4, 3));
        assert!(store.get("Arm", ButtonVisual::Normal).is_none());
        assert!(store.get("", ButtonVisual::Normal).is_none());
    }

    #[test]
    fn test_without_dir_nothing_loads() {
        let mut store = AssetStore::new(None);
        assert!(store.get("Arm", ButtonVisual::Selected).is_none());
    }
}
