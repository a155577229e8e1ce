use crate::config::StimulusConfig;
use rand::Rng;
use rand::seq::index;
use trustcal_core::{Cell, DamagePattern, FocusRegion, Grid};

/// Synthesizes scanned-surface images from a damage fraction.
#[derive(Debug, Clone)]
pub struct StimulusGenerator {
    config: StimulusConfig,
}

impl StimulusGenerator {
    pub fn new(config: StimulusConfig) -> Self {
        Self { config }
    }

    /// Background noise over the whole surface, then exactly
    /// `floor(focus_area * fraction)` distinct damaged cells inside a randomly
    /// placed focus region. The two passes draw independently, so a focus cell
    /// can be picked by both.
    pub fn generate<R: Rng + ?Sized>(&self, fraction: f64, rng: &mut R) -> DamagePattern {
        let StimulusConfig {
            width,
            height,
            focus_size,
            background_damage_rate,
            ..
        } = self.config;
        let mut grid = Grid::filled(width, height, Cell::Undamaged);

        let total = width * height;
        let background_damage = (total as f64 * background_damage_rate).floor() as usize;
        if background_damage > 0 {
            for i in index::sample(rng, total, background_damage.min(total)) {
                grid.set_index(i, Cell::Damaged);
            }
        }

        let focus = FocusRegion {
            x: rng.random_range(0..=width - focus_size),
            y: rng.random_range(0..=height - focus_size),
            size: focus_size,
        };

        let area = focus.area();
        let focus_damage = (area as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
        if focus_damage > 0 {
            for i in index::sample(rng, area, focus_damage.min(area)) {
                let (x, y) = focus.local_to_grid(i);
                grid.set(x, y, Cell::Damaged);
            }
        }

        DamagePattern {
            grid,
            focus,
            background_damage,
            focus_damage,
        }
    }

    /// Full view shown on the trial screen.
    pub fn full_view(&self, pattern: &DamagePattern) -> Grid {
        pattern.with_border(self.config.border_thickness)
    }
}
