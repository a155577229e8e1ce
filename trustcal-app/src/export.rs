use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::fs;
use std::path::{Path, PathBuf};
use trustcal_core::{Grid, TrialType};
use trustcal_experiment::TrialImages;

const ZOOM_EXPORT_SIZE: u32 = 300;

/// Saves the images participants saw, for checking stimuli after a session.
#[derive(Debug, Clone)]
pub struct StimulusExporter {
    directory: PathBuf,
}

fn to_image(grid: &Grid) -> Result<RgbaImage> {
    RgbaImage::from_raw(grid.width() as u32, grid.height() as u32, grid.to_rgba())
        .ok_or_else(|| anyhow!("grid buffer does not match {}x{}", grid.width(), grid.height()))
}

impl StimulusExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes `<session>_<phase>_<n>_<pct>.png` and the matching zoom crop,
    /// upscaled the way it is shown on screen.
    pub fn export(
        &self,
        session_id: &str,
        trial_type: TrialType,
        number: usize,
        percentage: u8,
        images: &TrialImages,
    ) -> Result<[PathBuf; 2]> {
        let stem = format!(
            "{session_id}_{}_{number:02}_{percentage}",
            trial_type.label().to_lowercase()
        );
        let full_path = self.directory.join(format!("{stem}.png"));
        let zoom_path = self.directory.join(format!("{stem}_zoom.png"));

        to_image(&images.full)?
            .save(&full_path)
            .with_context(|| format!("failed to write {}", full_path.display()))?;
        let zoom = imageops::resize(
            &to_image(&images.zoom)?,
            ZOOM_EXPORT_SIZE,
            ZOOM_EXPORT_SIZE,
            FilterType::Nearest,
        );
        zoom.save(&zoom_path)
            .with_context(|| format!("failed to write {}", zoom_path.display()))?;

        log::debug!("Exported stimulus to {}", full_path.display());
        Ok([full_path, zoom_path])
    }
}
