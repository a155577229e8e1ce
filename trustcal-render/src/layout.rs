//! Screen geometry. Everything here is pure arithmetic on the canvas size so
//! pointer hit testing does not depend on a font being loaded.

use tiny_skia::Rect;
use trustcal_core::{Control, ControlHandle, Grid, ItemKind, Screen};

pub const TRIAL_IMAGE_TOP: f32 = 70.0;
pub const TRIAL_IMAGE_BOX: f32 = 400.0;
pub const ZOOM_SIZE: f32 = 300.0;

pub const QUESTIONNAIRE_TOP: f32 = 110.0;
pub const ITEM_HEIGHT: f32 = 96.0;
const OPTION_ROW_OFFSET: f32 = 40.0;
const OPTION_HEIGHT: f32 = 36.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Button {
    pub control: Control,
    pub enabled: bool,
    pub rect: Rect,
}

/// A clickable scale point or choice.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionBox {
    pub item: usize,
    pub key: String,
    pub value: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldBox {
    pub item: usize,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Control(Control),
    Answer {
        item: usize,
        key: String,
        value: String,
    },
    Field(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub buttons: Vec<Button>,
    pub options: Vec<OptionBox>,
    pub fields: Vec<FieldBox>,
    pub image: Option<Rect>,
}

fn contains(rect: &Rect, x: f32, y: f32) -> bool {
    x >= rect.left() && x < rect.right() && y >= rect.top() && y < rect.bottom()
}

fn centered(cx: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
    Rect::from_xywh(cx - w * 0.5, y, w, h)
}

/// Where each control sits on a `width` x `height` canvas.
pub fn button_rect(control: Control, width: u32, height: u32) -> Option<Rect> {
    let cx = width as f32 * 0.5;
    let h = height as f32;
    let controls_top = TRIAL_IMAGE_TOP + TRIAL_IMAGE_BOX + 70.0;
    match control {
        Control::Start => centered(cx, h - 260.0, 260.0, 60.0),
        Control::ShowZoom => Rect::from_xywh(cx - 150.0, controls_top, 140.0, 40.0),
        Control::ShowFull => Rect::from_xywh(cx + 10.0, controls_top, 140.0, 40.0),
        Control::Discard => Rect::from_xywh(cx - 210.0, controls_top + 70.0, 180.0, 72.0),
        Control::Keep => Rect::from_xywh(cx + 30.0, controls_top + 70.0, 180.0, 72.0),
        Control::BeginMain => centered(cx, h * 0.5, 260.0, 56.0),
        Control::Submit => centered(cx, h - 120.0, 200.0, 52.0),
        Control::Close => centered(cx, h * 0.5 + 120.0, 160.0, 52.0),
    }
}

/// Destination of a stimulus image: full views at native size (shrunk to fit
/// the image box if needed), zoom views stretched to a fixed square.
pub fn image_rect(grid: &Grid, zoomed: bool, width: u32) -> Option<Rect> {
    let cx = width as f32 * 0.5;
    if zoomed {
        let top = TRIAL_IMAGE_TOP + (TRIAL_IMAGE_BOX - ZOOM_SIZE) * 0.5;
        return centered(cx, top, ZOOM_SIZE, ZOOM_SIZE);
    }
    let (gw, gh) = (grid.width() as f32, grid.height() as f32);
    if gw == 0.0 || gh == 0.0 {
        return None;
    }
    let scale = (TRIAL_IMAGE_BOX / gh)
        .min((width as f32 - 40.0) / gw)
        .min(1.0);
    let (w, h) = ((gw * scale).floor().max(1.0), (gh * scale).floor().max(1.0));
    centered(cx, TRIAL_IMAGE_TOP, w, h)
}

impl Layout {
    pub fn for_screen(
        screen: &Screen<'_>,
        controls: &[ControlHandle],
        width: u32,
        height: u32,
    ) -> Self {
        let mut layout = Layout {
            buttons: controls
                .iter()
                .filter_map(|c| {
                    button_rect(c.control, width, height).map(|rect| Button {
                        control: c.control,
                        enabled: c.enabled,
                        rect,
                    })
                })
                .collect(),
            ..Layout::default()
        };

        match screen {
            Screen::Trial(view) => {
                layout.image = image_rect(view.image, view.zoomed, width);
            }
            Screen::Questionnaire { questionnaire, .. } => {
                let left = 60.0;
                let usable = width as f32 - 2.0 * left;
                for (i, item) in questionnaire.items.iter().enumerate() {
                    let row = QUESTIONNAIRE_TOP + i as f32 * ITEM_HEIGHT + OPTION_ROW_OFFSET;
                    let values: Vec<String> = match &item.kind {
                        ItemKind::Likert { min, max } => {
                            (*min..=*max).map(|v| v.to_string()).collect()
                        }
                        ItemKind::Choice { options } => options.clone(),
                        ItemKind::FreeText => {
                            if let Some(rect) = Rect::from_xywh(left, row, usable, OPTION_HEIGHT) {
                                layout.fields.push(FieldBox { item: i, rect });
                            }
                            continue;
                        }
                    };
                    if values.is_empty() {
                        continue;
                    }
                    let gap = 8.0;
                    let slot = ((usable + gap) / values.len() as f32).min(150.0);
                    let total = slot * values.len() as f32 - gap;
                    let x0 = (width as f32 - total) * 0.5;
                    for (k, value) in values.into_iter().enumerate() {
                        let x = x0 + k as f32 * slot;
                        if let Some(rect) = Rect::from_xywh(x, row, slot - gap, OPTION_HEIGHT) {
                            layout.options.push(OptionBox {
                                item: i,
                                key: item.key.clone(),
                                value,
                                rect,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
        layout
    }

    /// What sits under the pointer. Disabled buttons are never hit.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<Hit> {
        if let Some(b) = self
            .buttons
            .iter()
            .find(|b| b.enabled && contains(&b.rect, x, y))
        {
            return Some(Hit::Control(b.control));
        }
        if let Some(o) = self.options.iter().find(|o| contains(&o.rect, x, y)) {
            return Some(Hit::Answer {
                item: o.item,
                key: o.key.clone(),
                value: o.value.clone(),
            });
        }
        self.fields
            .iter()
            .find(|f| contains(&f.rect, x, y))
            .map(|f| Hit::Field(f.item))
    }
}
