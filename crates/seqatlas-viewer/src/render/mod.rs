pub mod camera;
pub mod layers;

use seqatlas_core::{PointId, Viewport};
use smallvec::SmallVec;

use crate::pipeline::LayerKind;

pub use camera::{CameraAnimator, CameraStep};
pub use layers::{build_layers, palette, zoom_factor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(v: u32) -> Self {
        Self((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
    pub opacity: f32,
    pub marker_size: f32,
    pub fill: Rgb,
    pub stroke: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointMeta {
    pub id: PointId,
    /// Selectable; false for background points.
    pub active: bool,
    pub selected: bool,
}

/// One scatter series: all visible points of a single origin in one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub origin: String,
    pub style: LayerStyle,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub meta: Vec<PointMeta>,
}

impl Layer {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// Two layer kinds times the known origins.
pub type Layers = SmallVec<[Layer; 10]>;

/// Whatever actually puts points on screen.
pub trait RenderSurface {
    /// Replaces everything drawn with `layers`, background first.
    fn draw(&mut self, layers: &[Layer]);

    /// Programmatic camera move. Implementations echo it back through the
    /// per-axis range notifications like any other change.
    fn set_visible_range(&mut self, viewport: Viewport);
}
