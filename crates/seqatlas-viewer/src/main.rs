mod cli;

use anyhow::Result;
use seqatlas_core::{Point, Viewport};
use seqatlas_viewer::net::lookup::GoTerm;
use seqatlas_viewer::net::{spawn_channel, Lookups, ReconnectPolicy};
use seqatlas_viewer::render::{Layer, RenderSurface};
use seqatlas_viewer::util::config;
use seqatlas_viewer::util::labels;
use seqatlas_viewer::pipeline::SessionStore;
use seqatlas_viewer::Pipeline;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);
const FOCUS_WAIT_FRAMES: u64 = 120;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Stands in for a chart: logs what would be drawn and echoes range changes.
#[derive(Default)]
struct LogSurface {
    echo: Option<Viewport>,
    draws: u64,
}

impl RenderSurface for LogSurface {
    fn draw(&mut self, layers: &[Layer]) {
        self.draws += 1;
        let points: usize = layers.iter().map(Layer::len).sum();
        tracing::info!(layers = layers.len(), points, "frame");
        for layer in layers {
            tracing::debug!(
                kind = ?layer.kind,
                origin = %layer.origin,
                points = layer.len(),
                opacity = layer.style.opacity,
                size = layer.style.marker_size,
                fill = %layer.style.fill,
                "layer"
            );
        }
    }

    fn set_visible_range(&mut self, viewport: Viewport) {
        self.echo = Some(viewport);
    }
}

/// Loaded points first, then the name-search endpoint.
fn search_target(store: &SessionStore, lookups: &Lookups, name: &str) -> Option<Point> {
    if let Some(p) = store.find_point(name) {
        tracing::info!(name, id = %p.id.as_str(), "found among loaded points");
        return Some(p.clone());
    }
    match lookups.name_search(name) {
        Ok(mut hits) => {
            if hits.is_empty() {
                tracing::warn!(name, "no point matches search");
                return None;
            }
            Some(hits.swap_remove(0))
        }
        Err(e) => {
            let err = format!("{e:#}");
            tracing::warn!(name, error = %err, "name search failed");
            None
        }
    }
}

fn describe(lookups: &Lookups, hit: &Point) {
    for line in labels::detail_lines(hit) {
        tracing::info!("{line}");
    }
    let loc = match &hit.pdb_loc {
        Some(loc) => Some(loc.clone()),
        None => lookups.pdb_location(hit.id.as_str()).ok(),
    };
    let Some(loc) = loc else {
        return;
    };
    match lookups.structure(&loc) {
        Ok(pdb) => {
            let atoms = pdb.lines().filter(|l| l.starts_with("ATOM")).count();
            tracing::info!(%loc, bytes = pdb.len(), atoms, "structure fetched");
        }
        Err(e) => {
            let err = format!("{e:#}");
            tracing::warn!(%loc, error = %err, "structure download failed");
        }
    }
}

/// Accepts a `GO:` id as is; anything else goes through autocomplete and the
/// first suggestion wins.
fn resolve_go_term(lookups: &Lookups, input: &str) -> Result<GoTerm> {
    if input.starts_with("GO:") {
        return lookups.go_term(input);
    }
    let mut suggestions = lookups.go_autocomplete(input)?;
    if suggestions.is_empty() {
        anyhow::bail!("no GO term matches {input:?}");
    }
    Ok(suggestions.swap_remove(0))
}

fn main() -> Result<()> {
    init_tracing();
    let args = cli::parse_args()?;
    let mut cfg = config::load_or_default();
    args.apply(&mut cfg);
    if args.save_config {
        config::save(&cfg)?;
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = spawn_channel(cfg.endpoint.clone(), ReconnectPolicy::from_config(&cfg), tx);
    let mut pipeline = Pipeline::new(&cfg, handle, Some(rx));
    pipeline.start()?;

    let lookups = Lookups::from_config(&cfg);
    if let Some(input) = args.go.as_deref() {
        let term = resolve_go_term(&lookups, input)?;
        tracing::info!(id = %term.id, name = %term.name, "restricting to GO term");
        let mut filters = pipeline.filters().clone();
        filters.go_term = Some(term.id);
        pipeline.set_filters(filters);
    }
    tracing::info!(endpoint = %cfg.endpoint.label(), frames = args.frames, "viewer started");

    let mut focus = args.focus.clone();
    let mut surface = LogSurface::default();
    for frame in 0..args.frames {
        let now = Instant::now();
        // give the background a chance to arrive so local search can hit
        let ready = pipeline.status().background > 0 || frame >= FOCUS_WAIT_FRAMES;
        if ready {
            if let Some(name) = focus.take() {
                if let Some(point) = search_target(pipeline.store(), &lookups, &name) {
                    describe(&lookups, &point);
                    pipeline.focus_point(point, now);
                }
            }
        }
        pipeline.tick(now, &mut surface);
        if let Some(v) = surface.echo.take() {
            pipeline.on_x_range_changed(v.x_min, v.x_max);
            pipeline.on_y_range_changed(v.y_min, v.y_max);
        }
        std::thread::sleep(FRAME);
    }

    pipeline.teardown();
    let status = pipeline.status();
    tracing::info!(
        connected = status.connected,
        background = status.background,
        streaming = status.streaming,
        complete = status.complete,
        latest_seq = status.latest_seq,
        draws = surface.draws,
        error = ?status.last_error,
        "viewer stopped"
    );
    Ok(())
}
