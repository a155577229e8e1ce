pub mod layout;
pub mod render;
pub mod text;

pub use layout::{Button, FieldBox, Hit, Layout, OptionBox};
pub use render::{SkiaRenderer, ViewState, blit_grid};
pub use text::{TextCache, render_text_pixmap, text_width, wrap_text};
