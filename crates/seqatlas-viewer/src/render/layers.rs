use seqatlas_core::{FilterSet, PointId};

use super::{Layer, LayerStyle, Layers, PointMeta, Rgb};
use crate::pipeline::{LayerKind, SessionStore};

const GREY_FILL: Rgb = Rgb::hex(0x7f7f7f);
const GREY_STROKE: Rgb = Rgb::hex(0x4c4c4c);

/// Fill and (slightly darker) stroke per origin.
pub fn palette(origin: &str) -> (Rgb, Rgb) {
    match origin {
        "afdb-clusters-dark" => (Rgb::hex(0x1f77b4), Rgb::hex(0x144c73)),
        "afdb-clusters-light" => (Rgb::hex(0xff7f0e), Rgb::hex(0xb35e00)),
        "hclust30-clusters" => (Rgb::hex(0x2ca02c), Rgb::hex(0x1e4d1e)),
        "mip-clusters" => (Rgb::hex(0xd62728), Rgb::hex(0xa41f1f)),
        "mip-singletons" => (Rgb::hex(0x9467bd), Rgb::hex(0x6a4b8d)),
        _ => (GREY_FILL, GREY_STROKE),
    }
}

/// 1 when zoomed out to `reference_width / 10` or wider, shrinking toward 0.1
/// as the view narrows.
pub fn zoom_factor(width: f64, reference_width: f64) -> f64 {
    if !(width.is_finite() && reference_width > 0.0) {
        return 1.0;
    }
    (width / reference_width * 10.0).clamp(0.1, 1.0)
}

fn style(kind: LayerKind, origin: &str, zoom: f64, context_opacity: f32) -> LayerStyle {
    let (fill, stroke) = palette(origin);
    let zoom = zoom.max(0.1);
    match kind {
        LayerKind::Streaming => LayerStyle {
            opacity: (0.6 / zoom).min(1.0) as f32,
            marker_size: (8.0 / zoom).min(12.0) as f32,
            fill,
            stroke,
        },
        LayerKind::Background => LayerStyle {
            opacity: context_opacity,
            marker_size: 8.0,
            fill,
            stroke,
        },
    }
}

/// Groups the visible dataset into per-(kind, origin) layers. Layers keep the
/// order in which their first point was seen, so background layers precede
/// streaming ones.
pub fn build_layers(
    store: &SessionStore,
    filters: &FilterSet,
    zoom: f64,
    context_opacity: f32,
    selected: Option<&PointId>,
) -> Layers {
    let mut layers = Layers::new();
    for (kind, p) in store.visible(filters) {
        let idx = match layers
            .iter()
            .position(|l| l.kind == kind && l.origin == p.origin)
        {
            Some(i) => i,
            None => {
                layers.push(Layer {
                    kind,
                    origin: p.origin.clone(),
                    style: style(kind, &p.origin, zoom, context_opacity),
                    xs: Vec::new(),
                    ys: Vec::new(),
                    meta: Vec::new(),
                });
                layers.len() - 1
            }
        };
        let layer = &mut layers[idx];
        layer.xs.push(p.x);
        layer.ys.push(p.y);
        layer.meta.push(PointMeta {
            id: p.id.clone(),
            active: kind == LayerKind::Streaming,
            selected: selected == Some(&p.id),
        });
    }
    layers
}
