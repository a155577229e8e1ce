/// One cell of a scanned surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Undamaged,
    Damaged,
    Border,
}

impl Cell {
    pub const UNDAMAGED_RGBA: [u8; 4] = [0, 112, 255, 255];
    pub const DAMAGED_RGBA: [u8; 4] = [255, 140, 0, 255];
    pub const BORDER_RGBA: [u8; 4] = [0, 255, 0, 255];

    pub fn rgba(&self) -> [u8; 4] {
        match self {
            Cell::Undamaged => Self::UNDAMAGED_RGBA,
            Cell::Damaged => Self::DAMAGED_RGBA,
            Cell::Border => Self::BORDER_RGBA,
        }
    }
}

/// Row-major grid of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn filled(width: usize, height: usize, cell: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![cell; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    /// Writes a cell; coordinates outside the grid are ignored.
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    /// Writes the cell at a row-major index.
    pub fn set_index(&mut self, index: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
        }
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|c| **c == cell).count()
    }

    pub fn count_in(&self, region: FocusRegion, cell: Cell) -> usize {
        region
            .coords()
            .filter(|&(x, y)| self.get(x, y) == Some(cell))
            .count()
    }

    /// Copies a sub-rectangle, clipped to the grid.
    pub fn crop(&self, region: FocusRegion) -> Grid {
        let x1 = (region.x + region.size).min(self.width);
        let y1 = (region.y + region.size).min(self.height);
        let x0 = region.x.min(x1);
        let y0 = region.y.min(y1);
        let mut cells = Vec::with_capacity((x1 - x0) * (y1 - y0));
        for y in y0..y1 {
            cells.extend_from_slice(&self.cells[y * self.width + x0..y * self.width + x1]);
        }
        Grid {
            width: x1 - x0,
            height: y1 - y0,
            cells,
        }
    }

    /// Straight RGBA8 bytes, row-major.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.cells.iter().flat_map(|c| c.rgba()).collect()
    }
}

/// Square sub-region of the surface subjected to calibrated damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FocusRegion {
    pub x: usize,
    pub y: usize,
    pub size: usize,
}

impl FocusRegion {
    pub fn area(&self) -> usize {
        self.size * self.size
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.size && y >= self.y && y < self.y + self.size
    }

    /// Grid coordinates of a region-local row-major index.
    pub fn local_to_grid(&self, index: usize) -> (usize, usize) {
        (self.x + index % self.size, self.y + index / self.size)
    }

    pub fn coords(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.area()).map(|i| self.local_to_grid(i))
    }
}

/// A synthesized scan: the surface plus where its focus region sits.
#[derive(Debug, Clone, PartialEq)]
pub struct DamagePattern {
    pub grid: Grid,
    pub focus: FocusRegion,
    /// Cells picked by the background noise pass.
    pub background_damage: usize,
    /// Cells picked inside the focus region.
    pub focus_damage: usize,
}

impl DamagePattern {
    /// Copy of the surface with a highlight drawn along the focus region.
    ///
    /// Each side straddles the region edge, `thickness / 2` cells outside and
    /// the rest inside. A side whose outer part would leave the grid is not
    /// drawn at all.
    pub fn with_border(&self, thickness: usize) -> Grid {
        let mut bordered = self.grid.clone();
        let FocusRegion { x, y, size } = self.focus;
        let outer = thickness / 2;
        let inner = thickness - outer;
        let (width, height) = (bordered.width(), bordered.height());

        let mut paint = |xs: std::ops::Range<usize>, ys: std::ops::Range<usize>| {
            for py in ys {
                for px in xs.clone() {
                    bordered.set(px, py, Cell::Border);
                }
            }
        };

        if y >= outer {
            paint(x..x + size, y - outer..y + inner);
        }
        if y + size + outer <= height {
            paint(x..x + size, y + size - inner..y + size + outer);
        }
        if x >= outer {
            paint(x - outer..x + inner, y..y + size);
        }
        if x + size + outer <= width {
            paint(x + size - inner..x + size + outer, y..y + size);
        }
        bordered
    }

    /// The focus region exactly as generated, for the detail view.
    pub fn crop_zoom(&self) -> Grid {
        self.grid.crop(self.focus)
    }

    pub fn damaged_in_focus(&self) -> usize {
        self.grid.count_in(self.focus, Cell::Damaged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_at(x: usize, y: usize) -> DamagePattern {
        DamagePattern {
            grid: Grid::filled(30, 40, Cell::Undamaged),
            focus: FocusRegion { x, y, size: 10 },
            background_damage: 0,
            focus_damage: 0,
        }
    }

    fn changed(before: &Grid, after: &Grid) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for y in 0..after.height() {
            for x in 0..after.width() {
                if before.get(x, y) != after.get(x, y) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn border_stays_inside_grid_at_every_corner() {
        for (x, y) in [(0, 0), (20, 0), (0, 30), (20, 30)] {
            let pattern = pattern_at(x, y);
            let bordered = pattern.with_border(2);
            assert_eq!(bordered.width(), 30);
            assert_eq!(bordered.height(), 40);
            let modified = changed(&pattern.grid, &bordered);
            assert!(!modified.is_empty());
            for (px, py) in modified {
                assert!(px < 30 && py < 40, "({px},{py}) outside grid");
                assert!(px + 1 >= x && px <= x + 10 && py + 1 >= y && py <= y + 10);
            }
        }
    }

    #[test]
    fn corner_region_skips_touching_sides() {
        let bordered = pattern_at(0, 0).with_border(2);
        // Top and left are skipped, so the outer corner cell keeps its color.
        assert_eq!(bordered.get(0, 0), Some(Cell::Undamaged));
        assert_eq!(bordered.get(9, 0), Some(Cell::Border));
        assert_eq!(bordered.get(0, 9), Some(Cell::Border));
        assert_eq!(bordered.get(10, 5), Some(Cell::Border));
        assert_eq!(bordered.get(5, 10), Some(Cell::Border));
    }

    #[test]
    fn interior_region_has_all_four_sides() {
        let bordered = pattern_at(10, 10).with_border(2);
        assert_eq!(bordered.get(12, 9), Some(Cell::Border));
        assert_eq!(bordered.get(12, 10), Some(Cell::Border));
        assert_eq!(bordered.get(12, 19), Some(Cell::Border));
        assert_eq!(bordered.get(12, 20), Some(Cell::Border));
        assert_eq!(bordered.get(9, 12), Some(Cell::Border));
        assert_eq!(bordered.get(20, 12), Some(Cell::Border));
        assert_eq!(bordered.get(15, 15), Some(Cell::Undamaged));
        // Corners outside the region are not filled.
        assert_eq!(bordered.get(9, 9), Some(Cell::Undamaged));
    }

    #[test]
    fn crop_returns_region_unmodified() {
        let mut pattern = pattern_at(5, 7);
        pattern.grid.set(5, 7, Cell::Damaged);
        pattern.grid.set(14, 16, Cell::Damaged);
        pattern.grid.set(4, 7, Cell::Damaged);
        let zoom = pattern.crop_zoom();
        assert_eq!((zoom.width(), zoom.height()), (10, 10));
        assert_eq!(zoom.get(0, 0), Some(Cell::Damaged));
        assert_eq!(zoom.get(9, 9), Some(Cell::Damaged));
        assert_eq!(zoom.count(Cell::Damaged), 2);
        assert_eq!(pattern.damaged_in_focus(), 2);
    }

    #[test]
    fn rgba_layout() {
        let grid = Grid::filled(2, 1, Cell::Damaged);
        assert_eq!(grid.to_rgba(), vec![255, 140, 0, 255, 255, 140, 0, 255]);
    }
}
