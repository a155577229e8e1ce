use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use std::collections::HashMap;
use std::sync::Arc;
use string_cache::DefaultAtom as Atom;
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

/// Rasterizes one line of text into a tightly cropped, premultiplied pixmap.
/// Returns `None` for text with no visible glyphs.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let first = outlines.first()?.px_bounds();
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (first.min.x, first.min.y, first.max.x, first.max.y);
    for out in &outlines[1..] {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = w as usize;
    let dst = pm.pixels_mut();
    let cu = color.to_color_u8();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * f32::from(cu.alpha()) / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let src = [
                (f32::from(cu.red()) * a) as u8,
                (f32::from(cu.green()) * a) as u8,
                (f32::from(cu.blue()) * a) as u8,
                sa,
            ];

            // Source over, premultiplied.
            let bg = dst[i];
            let inv = 1.0 - f32::from(sa) / 255.0;
            let over = |s: u8, d: u8| s.saturating_add((f32::from(d) * inv) as u8);
            let out_a = over(src[3], bg.alpha());
            let blended = PremultipliedColorU8::from_rgba(
                over(src[0], bg.red()).min(out_a),
                over(src[1], bg.green()).min(out_a),
                over(src[2], bg.blue()).min(out_a),
                out_a,
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// Horizontal advance of a single line, in pixels.
pub fn text_width<F: Font>(text: &str, font_size: f32, font: &F) -> f32 {
    let sf = font.as_scaled(PxScale::from(font_size));
    let mut width = 0.0;
    let mut prev = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(p) = prev {
            width += sf.kern(p, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Greedy word wrap. Explicit newlines always break.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure(&candidate) <= max_width {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
            }
        }
        lines.push(line);
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: Atom,
    size_bits: u32,
    rgba: [u8; 4],
}

/// Rendered labels keyed by interned text, size and color. Screens redraw the
/// same handful of strings every frame, so each is rasterized once.
pub struct TextCache {
    font: Option<FontVec>,
    map: HashMap<TextKey, Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn get_or_render(
        &mut self,
        text: &str,
        size_px: f32,
        color: Color,
    ) -> Option<Arc<Pixmap>> {
        let font = self.font.as_ref()?;
        let c = color.to_color_u8();
        let key = TextKey {
            text: Atom::from(text),
            size_bits: size_px.to_bits(),
            rgba: [c.red(), c.green(), c.blue(), c.alpha()],
        };
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(text, size_px, font, color)?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    /// Rasterizes without caching. Typed field contents change on every
    /// keystroke and would otherwise accumulate in the map.
    pub fn render_uncached(&self, text: &str, size_px: f32, color: Color) -> Option<Pixmap> {
        render_text_pixmap(text, size_px, self.font.as_ref()?, color)
    }

    pub fn wrap(&self, text: &str, size_px: f32, max_width: f32) -> Vec<String> {
        match &self.font {
            Some(font) => wrap_text(text, max_width, |line| text_width(line, size_px, font)),
            None => text.lines().map(str::to_string).collect(),
        }
    }
}
