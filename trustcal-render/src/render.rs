use crate::layout::{ITEM_HEIGHT, Layout, QUESTIONNAIRE_TOP, TRIAL_IMAGE_BOX, TRIAL_IMAGE_TOP};
use crate::text::TextCache;
use ab_glyph::FontVec;
use anyhow::{Result, anyhow, bail};
use bytemuck::cast_slice_mut;
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform};
use trustcal_core::{
    Control, ControlHandle, Grid, ItemKind, Questionnaire, QuestionnaireForm, Screen, TrialType,
    TrialView,
};

type Rgba = [u8; 4];

const BACKGROUND: Rgba = [240, 240, 240, 255];
const INK: Rgba = [20, 20, 20, 255];
const MUTED: Rgba = [150, 150, 150, 255];
const BUTTON: Rgba = [222, 222, 222, 255];
const BUTTON_DISABLED: Rgba = [234, 234, 234, 255];
const SELECTED: Rgba = [0, 112, 255, 255];
const WHITE: Rgba = [255, 255, 255, 255];

fn color(c: Rgba) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

const TITLE_PX: f32 = 32.0;
const BODY_PX: f32 = 21.0;
const LABEL_PX: f32 = 18.0;

/// Presentation-only state owned by the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewState {
    /// Questionnaire item receiving keyboard input.
    pub focus: usize,
    /// Position of the scanning indicator, `[0, 1)`.
    pub pulse: f32,
}

#[derive(Clone, Copy)]
enum Align {
    Left(f32),
    Center(f32),
}

/// Draws session screens into an offscreen canvas and copies it to the
/// window frame.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    text: TextCache,
    canvas: Pixmap,
    layout: Layout,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontVec>) -> Result<Self> {
        if font.is_none() {
            log::warn!("Renderer created without a font, text will not be drawn");
        }
        let canvas = blank_canvas(width, height)?;
        Ok(Self {
            width,
            height,
            text: TextCache::new(font),
            canvas,
            layout: Layout::default(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = blank_canvas(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn hit_test(&self, x: f32, y: f32) -> Option<crate::layout::Hit> {
        self.layout.hit_test(x, y)
    }

    /// Redraws the whole canvas for `screen`.
    pub fn render(&mut self, screen: &Screen<'_>, controls: &[ControlHandle], view: &ViewState) {
        self.layout = Layout::for_screen(screen, controls, self.width, self.height);
        self.canvas.fill(color(BACKGROUND));
        let cx = self.width as f32 * 0.5;

        match screen {
            Screen::Welcome {
                prompt,
                practice_trials,
                main_trials,
            } => {
                self.draw_text(
                    "Welcome to the Robot Controller",
                    TITLE_PX,
                    INK,
                    Align::Center(cx),
                    60.0,
                );
                let intro = format!(
                    "You will begin with {practice_trials} practice trials followed by \
                     {main_trials} actual trials. {prompt}"
                );
                self.draw_paragraph(&intro, BODY_PX, 130.0, 700.0);
            }
            Screen::Questionnaire { questionnaire, form } => {
                self.draw_questionnaire(questionnaire, form, view.focus);
            }
            Screen::Scanning { trial_type } => {
                let label = if *trial_type == TrialType::Practice {
                    "Scanning Practice Surface..."
                } else {
                    "Scanning Surface..."
                };
                self.draw_text(label, TITLE_PX, INK, Align::Center(cx), 200.0);
                self.draw_progress(cx, 280.0, view.pulse);
            }
            Screen::Trial(trial) => self.draw_trial(trial),
            Screen::Transition => {
                self.draw_text(
                    "Practice complete! Ready to begin main trials?",
                    BODY_PX + 3.0,
                    INK,
                    Align::Center(cx),
                    self.height as f32 * 0.5 - 100.0,
                );
            }
            Screen::End { results_path } => {
                let y = self.height as f32 * 0.5 - 120.0;
                let at = Align::Center(cx);
                self.draw_text("Thank you for participating!", BODY_PX + 3.0, INK, at, y);
                self.draw_text("Your results have been saved to:", LABEL_PX, INK, at, y + 60.0);
                let name = results_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| results_path.display().to_string());
                self.draw_text(&name, LABEL_PX, INK, Align::Center(cx), y + 90.0);
            }
        }

        for button in self.layout.buttons.clone() {
            self.draw_button(button.control, button.rect, button.enabled);
        }
    }

    /// Copies the canvas into an RGBA8 frame of the same size.
    pub fn present(&self, frame: &mut [u8]) -> Result<()> {
        let data = self.canvas.data();
        if frame.len() != data.len() {
            bail!(
                "frame is {} bytes but the canvas is {}x{}",
                frame.len(),
                self.width,
                self.height
            );
        }
        // Canvas is opaque, so premultiplied and straight RGBA are identical.
        frame.copy_from_slice(data);
        Ok(())
    }

    fn draw_trial(&mut self, trial: &TrialView<'_>) {
        let cx = self.width as f32 * 0.5;
        let prefix = if trial.trial_type == TrialType::Practice {
            "Practice "
        } else {
            ""
        };
        let header = format!("{prefix}Trial {} of {}", trial.number, trial.total);
        self.draw_text(&header, LABEL_PX, INK, Align::Center(cx), 25.0);

        if let Some(rect) = self.layout.image {
            blit_grid(&mut self.canvas, trial.image, rect);
        }

        let recommendation = format!("Robot Recommendation: {}", trial.recommendation);
        self.draw_text(
            &recommendation,
            BODY_PX,
            INK,
            Align::Center(cx),
            TRIAL_IMAGE_TOP + TRIAL_IMAGE_BOX + 20.0,
        );
    }

    fn draw_questionnaire(
        &mut self,
        questionnaire: &Questionnaire,
        form: &QuestionnaireForm,
        focus: usize,
    ) {
        let cx = self.width as f32 * 0.5;
        self.draw_text(&questionnaire.title, TITLE_PX, INK, Align::Center(cx), 40.0);

        for (i, item) in questionnaire.items.iter().enumerate() {
            let y = QUESTIONNAIRE_TOP + i as f32 * ITEM_HEIGHT;
            let marker = if item.required { " *" } else { "" };
            let ink = if i == focus { SELECTED } else { INK };
            let prompt = format!("{}{marker}", item.prompt);
            self.draw_text(&prompt, LABEL_PX, ink, Align::Left(60.0), y);

            if matches!(item.kind, ItemKind::FreeText) {
                let field = self.layout.fields.iter().find(|f| f.item == i).map(|f| f.rect);
                let Some(field) = field else {
                    continue;
                };
                fill_rect(&mut self.canvas, field, WHITE);
                stroke_rect(&mut self.canvas, field, if i == focus { SELECTED } else { MUTED });
                let mut value = form.answer(&item.key).unwrap_or_default().to_string();
                if i == focus {
                    value.push('|');
                }
                if let Some(pm) = self.text.render_uncached(&value, LABEL_PX, color(INK)) {
                    self.blit_text(&pm, field.x() + 8.0, field.y() + 8.0);
                }
            }
        }

        for option in self.layout.options.clone() {
            let chosen = questionnaire
                .items
                .get(option.item)
                .and_then(|item| form.answer(&item.key))
                == Some(option.value.as_str());
            fill_rect(&mut self.canvas, option.rect, if chosen { SELECTED } else { BUTTON });
            stroke_rect(&mut self.canvas, option.rect, MUTED);
            let (mid_x, mid_y) = rect_center(&option.rect);
            let ink = if chosen { WHITE } else { INK };
            self.draw_centered(&option.value, LABEL_PX, ink, mid_x, mid_y);
        }
    }

    fn draw_progress(&mut self, cx: f32, y: f32, pulse: f32) {
        let Some(trough) = Rect::from_xywh(cx - 100.0, y, 200.0, 16.0) else {
            return;
        };
        fill_rect(&mut self.canvas, trough, WHITE);
        stroke_rect(&mut self.canvas, trough, MUTED);
        let block = 50.0;
        let x = trough.x() + pulse.clamp(0.0, 1.0) * (trough.width() - block);
        if let Some(bar) = Rect::from_xywh(x, y, block, 16.0) {
            fill_rect(&mut self.canvas, bar, SELECTED);
        }
    }

    fn draw_button(&mut self, control: Control, rect: Rect, enabled: bool) {
        fill_rect(&mut self.canvas, rect, if enabled { BUTTON } else { BUTTON_DISABLED });
        stroke_rect(&mut self.canvas, rect, if enabled { INK } else { MUTED });
        let (mid_x, mid_y) = rect_center(&rect);
        let size = if rect.height() > 60.0 { BODY_PX } else { LABEL_PX };
        self.draw_centered(control.label(), size, if enabled { INK } else { MUTED }, mid_x, mid_y);
    }

    fn draw_paragraph(&mut self, text: &str, size: f32, top: f32, max_width: f32) {
        let cx = self.width as f32 * 0.5;
        let line_height = size * 1.4;
        for (i, line) in self.text.wrap(text, size, max_width).iter().enumerate() {
            self.draw_text(line, size, INK, Align::Center(cx), top + i as f32 * line_height);
        }
    }

    /// Places text by its top edge.
    fn draw_text(&mut self, text: &str, size: f32, ink: Rgba, align: Align, top: f32) {
        let Some(pm) = self.text.get_or_render(text, size, color(ink)) else {
            return;
        };
        let x = match align {
            Align::Left(x) => x,
            Align::Center(cx) => cx - pm.width() as f32 * 0.5,
        };
        self.blit_text(&pm, x, top);
    }

    fn draw_centered(&mut self, text: &str, size: f32, ink: Rgba, cx: f32, cy: f32) {
        let Some(pm) = self.text.get_or_render(text, size, color(ink)) else {
            return;
        };
        let (x, y) = (cx - pm.width() as f32 * 0.5, cy - pm.height() as f32 * 0.5);
        self.blit_text(&pm, x, y);
    }

    fn blit_text(&mut self, pm: &Pixmap, x: f32, y: f32) {
        self.canvas.draw_pixmap(
            x as i32,
            y as i32,
            pm.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

fn blank_canvas(width: u32, height: u32) -> Result<Pixmap> {
    let mut canvas =
        Pixmap::new(width, height).ok_or_else(|| anyhow!("invalid canvas size {width}x{height}"))?;
    canvas.fill(color(BACKGROUND));
    Ok(canvas)
}

fn rect_center(rect: &Rect) -> (f32, f32) {
    (rect.x() + rect.width() * 0.5, rect.y() + rect.height() * 0.5)
}

fn fill_rect(canvas: &mut Pixmap, rect: Rect, fill: Rgba) {
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(color(fill));
    canvas.fill_rect(rect, &paint, Transform::identity(), None);
}

fn stroke_rect(canvas: &mut Pixmap, rect: Rect, outline: Rgba) {
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(color(outline));
    let stroke = Stroke {
        width: 2.0,
        ..Stroke::default()
    };
    let path = PathBuilder::from_rect(rect);
    canvas.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

/// Nearest-neighbour scale of a cell grid into `dest`, clipped to the canvas.
pub fn blit_grid(canvas: &mut Pixmap, grid: &Grid, dest: Rect) {
    if grid.is_empty() {
        return;
    }
    let (cw, ch) = (canvas.width() as usize, canvas.height() as usize);
    let (left, top) = (dest.x() as i64, dest.y() as i64);
    let tw = dest.width() as usize;
    let th = dest.height() as usize;
    if tw == 0 || th == 0 {
        return;
    }
    // Target pixels left of or above the canvas are skipped, not shifted.
    let skip_x = left.min(0).unsigned_abs() as usize;
    let skip_y = top.min(0).unsigned_abs() as usize;
    let (x0, y0) = (left.max(0) as usize, top.max(0) as usize);

    let pixels: &mut [[u8; 4]] = cast_slice_mut(canvas.data_mut());
    for dy in skip_y..th {
        let y = y0 + dy - skip_y;
        if y >= ch {
            break;
        }
        let sy = dy * grid.height() / th;
        for dx in skip_x..tw {
            let x = x0 + dx - skip_x;
            if x >= cw {
                break;
            }
            let sx = dx * grid.width() / tw;
            if let Some(cell) = grid.get(sx, sy) {
                pixels[y * cw + x] = cell.rgba();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use trustcal_core::{Cell, Recommendation};

    fn pixel(r: &SkiaRenderer, x: u32, y: u32) -> [u8; 4] {
        let p = r.canvas.pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    #[test]
    fn zoom_view_is_scaled_nearest_neighbour() {
        let mut grid = Grid::filled(20, 20, Cell::Undamaged);
        grid.set(0, 0, Cell::Damaged);
        let mut r = SkiaRenderer::new(800, 900, None).unwrap();
        let screen = Screen::Trial(TrialView {
            trial_type: TrialType::Experimental,
            number: 3,
            total: 36,
            image: &grid,
            zoomed: true,
            recommendation: Recommendation::Discard,
        });
        r.render(&screen, &[], &ViewState::default());
        let rect = r.layout.image.unwrap();
        let (x, y) = (rect.x() as u32, rect.y() as u32);
        // One source cell covers 15x15 pixels.
        assert_eq!(pixel(&r, x, y), Cell::Damaged.rgba());
        assert_eq!(pixel(&r, x + 14, y + 14), Cell::Damaged.rgba());
        assert_eq!(pixel(&r, x + 15, y + 15), Cell::Undamaged.rgba());
    }

    #[test]
    fn blit_clips_at_canvas_edge() {
        let mut canvas = Pixmap::new(10, 10).unwrap();
        let grid = Grid::filled(4, 4, Cell::Border);
        blit_grid(&mut canvas, &grid, Rect::from_xywh(8.0, 8.0, 4.0, 4.0).unwrap());
        let p = canvas.pixel(9, 9).unwrap();
        assert_eq!([p.red(), p.green(), p.blue()], [0, 255, 0]);
        assert_eq!(canvas.pixel(7, 7).unwrap().alpha(), 0);
    }

    #[test]
    fn blit_clips_left_and_top_without_shifting() {
        let mut canvas = Pixmap::new(10, 10).unwrap();
        let mut grid = Grid::filled(2, 2, Cell::Undamaged);
        grid.set(1, 1, Cell::Damaged);
        // Each cell covers 4x4 pixels; the first 4 columns and rows fall off.
        blit_grid(&mut canvas, &grid, Rect::from_xywh(-4.0, -4.0, 8.0, 8.0).unwrap());
        let p = canvas.pixel(0, 0).unwrap();
        assert_eq!([p.red(), p.green(), p.blue()], [255, 140, 0]);
        let p = canvas.pixel(3, 3).unwrap();
        assert_eq!([p.red(), p.green(), p.blue()], [255, 140, 0]);
        assert_eq!(canvas.pixel(4, 4).unwrap().alpha(), 0);
    }

    #[test]
    fn present_requires_matching_frame() {
        let mut r = SkiaRenderer::new(40, 30, None).unwrap();
        r.render(
            &Screen::End {
                results_path: Path::new("results.csv"),
            },
            &[ControlHandle::new(Control::Close, true)],
            &ViewState::default(),
        );
        let mut frame = vec![0u8; 40 * 30 * 4];
        r.present(&mut frame).unwrap();
        assert_eq!(&frame[..4], &[240, 240, 240, 255]);
        assert!(r.present(&mut [0u8; 16]).is_err());
    }

    #[test]
    fn resize_rebuilds_canvas() {
        let mut r = SkiaRenderer::new(800, 900, None).unwrap();
        r.resize(1024, 768).unwrap();
        assert_eq!((r.width, r.height), (1024, 768));
        assert_eq!(r.canvas.width(), 1024);
        assert!(r.resize(0, 10).is_err());
    }
}
