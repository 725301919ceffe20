use anyhow::Context;
use directories::ProjectDirs;
use seqatlas_core::{FilterSet, Interval, Viewport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EndpointKind {
    WebSocket(String),
    UdsPath(String),
}

impl Default for EndpointKind {
    fn default() -> Self {
        Self::WebSocket("ws://127.0.0.1:8000/stream".to_string())
    }
}

impl EndpointKind {
    /// `ws://`/`wss://` URLs are WebSockets, anything else a socket path.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("ws://") || input.starts_with("wss://") {
            Self::WebSocket(input.to_string())
        } else {
            Self::UdsPath(input.to_string())
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::WebSocket(url) => url.clone(),
            Self::UdsPath(path) => format!("unix:{path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub lookup_base_url: String,
    pub debounce_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub max_reconnect_attempts: u32,
    pub focus_half_extent: f64,
    pub focus_duration_ms: u64,
    pub length_bounds: Interval,
    pub plddt_bounds: Interval,
    /// Viewport width at which the zoom factor saturates at 1.
    pub reference_width: f64,
    pub context_opacity: f32,
    pub endpoint: EndpointKind,
    pub initial_viewport: Viewport,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            lookup_base_url: "http://127.0.0.1:8000".to_string(),
            debounce_ms: 100,
            reconnect_backoff_ms: 1000,
            max_reconnect_attempts: 5,
            focus_half_extent: 0.3,
            focus_duration_ms: 500,
            length_bounds: Interval::new(0.0, 2700.0),
            plddt_bounds: Interval::new(20.0, 100.0),
            reference_width: 40.0,
            context_opacity: 0.15,
            endpoint: EndpointKind::default(),
            initial_viewport: Viewport {
                x_min: -20.0,
                x_max: 20.0,
                y_min: -30.0,
                y_max: 20.0,
            },
        }
    }
}

impl ViewerConfig {
    /// Every origin and annotation selected, sliders at their configured bounds.
    pub fn default_filters(&self) -> FilterSet {
        FilterSet {
            length: self.length_bounds,
            plddt: self.plddt_bounds,
            ..FilterSet::default()
        }
    }

    /// A hand-edited config may carry a degenerate rectangle.
    pub fn start_viewport(&self) -> Viewport {
        let v = self.initial_viewport;
        Viewport::new(v.x_min, v.x_max, v.y_min, v.y_max)
            .unwrap_or_else(|| ViewerConfig::default().initial_viewport)
    }
}

fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "seqatlas")?;
    Some(proj.config_dir().join("viewer.toml"))
}

pub fn load_or_default() -> ViewerConfig {
    let Some(path) = config_file_path() else {
        return ViewerConfig::default();
    };
    load_or_default_from_path(&path)
}

fn load_or_default_from_path(path: &Path) -> ViewerConfig {
    let Ok(contents) = fs::read_to_string(path) else {
        return ViewerConfig::default();
    };
    toml::from_str(&contents).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable viewer config");
        ViewerConfig::default()
    })
}

pub fn save(cfg: &ViewerConfig) -> anyhow::Result<()> {
    let Some(path) = config_file_path() else {
        return Err(anyhow::anyhow!("no config directory available"));
    };
    save_to_path(cfg, &path)
}

fn save_to_path(cfg: &ViewerConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize viewer config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write viewer config {}", path.display()))?;
    Ok(())
}
