mod component;
mod export;
mod render;
mod state;
mod style;

pub use component::ForceGraphCanvas;
pub use style::severity_color;
