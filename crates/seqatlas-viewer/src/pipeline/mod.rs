pub mod coalesce;
pub mod selection;
pub mod store;
pub mod viewport;

use anyhow::Result;
use crossbeam_channel::Receiver;
use seqatlas_core::{ClientMsg, FilterSet, Point, ServerMsg, Viewport};
use std::time::{Duration, Instant};

use crate::net::{ChannelHandle, Incoming, IncomingKind};
use crate::render::{build_layers, zoom_factor, CameraAnimator, CameraStep, RenderSurface};
use crate::util::config::ViewerConfig;

pub use coalesce::{Dispatch, Offer, QueryCoalescer};
pub use selection::{resolve, IgnoreReason, Resolution, SelectionEvent};
pub use store::{LayerKind, MergeOutcome, SessionStore};
pub use viewport::ViewportTracker;

const MAX_EVENTS_PER_TICK: usize = 10_000;

/// Where dispatched queries go. The streaming channel in production, a
/// recorder in tests.
pub trait QuerySink {
    fn send(&mut self, msg: ClientMsg) -> Result<()>;
}

impl QuerySink for ChannelHandle {
    fn send(&mut self, msg: ClientMsg) -> Result<()> {
        ChannelHandle::send(self, msg)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub connected: bool,
    /// A dispatched query has not finished streaming yet.
    pub loading: bool,
    /// The active query delivered its final batch.
    pub complete: bool,
    pub last_error: Option<String>,
    pub background: usize,
    pub streaming: usize,
    pub latest_seq: u64,
}

/// Ties viewport tracking, query coalescing, the streaming channel, the
/// dataset and the camera together. Single-threaded: the UI loop feeds it
/// surface notifications and calls [`Pipeline::tick`] once per frame.
pub struct Pipeline<S: QuerySink> {
    tracker: ViewportTracker,
    coalescer: QueryCoalescer,
    camera: CameraAnimator,
    store: SessionStore,
    filters: FilterSet,
    sink: S,
    inbound: Option<Receiver<Incoming>>,
    reference_width: f64,
    context_opacity: f32,
    zoom: f64,
    connected: bool,
    loading: bool,
    last_error: Option<String>,
    dirty: bool,
    closed: bool,
}

impl<S: QuerySink> Pipeline<S> {
    pub fn new(cfg: &ViewerConfig, sink: S, inbound: Option<Receiver<Incoming>>) -> Self {
        let start = cfg.start_viewport();
        Self {
            tracker: ViewportTracker::new(start),
            coalescer: QueryCoalescer::new(Duration::from_millis(cfg.debounce_ms)),
            camera: CameraAnimator::new(
                Duration::from_millis(cfg.focus_duration_ms),
                cfg.focus_half_extent,
            ),
            store: SessionStore::new(),
            filters: cfg.default_filters(),
            sink,
            inbound,
            reference_width: cfg.reference_width,
            context_opacity: cfg.context_opacity,
            zoom: zoom_factor(start.width(), cfg.reference_width),
            connected: false,
            loading: false,
            last_error: None,
            dirty: true,
            closed: false,
        }
    }

    /// Requests the background overview.
    pub fn start(&mut self) -> Result<()> {
        self.sink.send(ClientMsg::init())?;
        tracing::info!("requested background overview");
        Ok(())
    }

    pub fn on_x_range_changed(&mut self, min: f64, max: f64) -> bool {
        self.tracker.on_x_range(min, max)
    }

    pub fn on_y_range_changed(&mut self, min: f64, max: f64) -> bool {
        self.tracker.on_y_range(min, max)
    }

    pub fn viewport(&self) -> Viewport {
        self.tracker.current()
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: FilterSet) {
        if filters != self.filters {
            self.filters = filters;
            self.dirty = true;
        }
    }

    pub fn on_point_selected(&mut self, event: &SelectionEvent, now: Instant) -> Resolution {
        let resolution = resolve(&self.store, event);
        match &resolution {
            Resolution::Selected(p) => {
                tracing::info!(id = %p.id.as_str(), x = p.x, y = p.y, "point selected");
                self.focus_point(p.clone(), now);
            }
            Resolution::Ignored(reason) => {
                tracing::warn!(id = %event.id.as_str(), ?reason, "selection ignored");
            }
        }
        resolution
    }

    /// Selects `point` and flies the camera to it. Used for both clicks and
    /// search results, which may not be loaded yet.
    pub fn focus_point(&mut self, point: Point, now: Instant) {
        let (x, y) = (point.x, point.y);
        self.store.set_selection(point);
        self.dirty = true;
        if self.camera.fly_to(self.tracker.current(), x, y, now).is_none() {
            tracing::warn!(x, y, "cannot focus on non-finite coordinates");
            return;
        }
        self.tracker.set_suppressed(true);
        self.tracker.clear_settled();
    }

    pub fn deselect(&mut self) {
        if self.store.clear_selection().is_some() {
            self.dirty = true;
        }
    }

    pub fn apply(&mut self, msg: Incoming) {
        match msg.kind {
            IncomingKind::Connected => {
                tracing::info!(endpoint = %msg.endpoint, "streaming channel connected");
                self.connected = true;
                self.last_error = None;
            }
            IncomingKind::Disconnected => {
                tracing::warn!(endpoint = %msg.endpoint, "streaming channel disconnected");
                self.connected = false;
            }
            IncomingKind::Reconnecting { attempt } => {
                tracing::info!(endpoint = %msg.endpoint, attempt, "reconnecting");
            }
            IncomingKind::GaveUp => {
                tracing::error!(endpoint = %msg.endpoint, "giving up on streaming channel");
                self.connected = false;
                self.loading = false;
                self.last_error = Some(format!("lost connection to {}", msg.endpoint));
            }
            IncomingKind::Error(err) => {
                tracing::warn!(endpoint = %msg.endpoint, error = %err, "channel error");
                self.last_error = Some(err);
            }
            IncomingKind::Message(server) => self.apply_server(server),
        }
    }

    fn apply_server(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Init { points } => {
                let received = points.len();
                let kept = self.store.replace_background(points);
                tracing::info!(received, kept, "background overview loaded");
                self.dirty = true;
            }
            ServerMsg::Update {
                points,
                is_last,
                seq,
            } => match self.store.merge_batch(seq, points, is_last) {
                MergeOutcome::Merged { added, duplicates } => {
                    tracing::debug!(added, duplicates, is_last, "merged batch");
                    if added > 0 {
                        self.dirty = true;
                    }
                    if is_last {
                        self.loading = false;
                    }
                }
                MergeOutcome::Stale { batch_seq } => {
                    tracing::debug!(
                        batch_seq,
                        active = self.store.active_seq(),
                        "dropping batch of superseded query"
                    );
                }
            },
            // errors carry no seq, so one from a superseded query still
            // ends loading for the active one
            ServerMsg::Error { message } => {
                tracing::warn!(%message, "server reported an error");
                self.loading = false;
                self.last_error = Some(message);
            }
        }
    }

    fn pump_inbound(&mut self) {
        let Some(rx) = self.inbound.take() else {
            return;
        };
        for msg in rx.try_iter().take(MAX_EVENTS_PER_TICK) {
            self.apply(msg);
        }
        self.inbound = Some(rx);
    }

    pub fn tick(&mut self, now: Instant, surface: &mut impl RenderSurface) {
        if self.closed {
            return;
        }
        self.pump_inbound();

        match self.camera.tick(now) {
            CameraStep::Idle => {}
            CameraStep::Moving(v) => {
                self.tracker.write(v);
                surface.set_visible_range(v);
            }
            CameraStep::Arrived { epoch, viewport } => {
                if self.camera.is_current(epoch) {
                    self.tracker.write(viewport);
                    surface.set_visible_range(viewport);
                    self.tracker.set_suppressed(false);
                    // settle both axes so the destination gets fetched
                    self.tracker.on_x_range(viewport.x_min, viewport.x_max);
                    self.tracker.on_y_range(viewport.y_min, viewport.y_max);
                }
            }
        }

        if !self.camera.is_animating() {
            let offer = self.coalescer.offer(
                now,
                self.tracker.current(),
                &self.filters,
                self.tracker.is_settled(),
            );
            if offer == Offer::Redundant {
                self.tracker.clear_settled();
            }
            if let Some(dispatch) = self.coalescer.poll(now) {
                self.dispatch(dispatch);
            }
        }

        if self.dirty {
            let selected = self.store.selection().map(|p| &p.id);
            let layers = build_layers(
                &self.store,
                &self.filters,
                self.zoom,
                self.context_opacity,
                selected,
            );
            surface.draw(&layers);
            self.dirty = false;
        }
    }

    fn dispatch(&mut self, d: Dispatch) {
        self.tracker.clear_settled();
        self.store.begin_query(d.seq);
        self.zoom = zoom_factor(d.query.viewport.width(), self.reference_width);
        self.dirty = true;
        let wire = d.query.to_wire(d.seq);
        let (x0, x1, y0, y1) = (wire.x0, wire.x1, wire.y0, wire.y1);
        match self.sink.send(ClientMsg::Query(wire)) {
            Ok(()) => {
                self.loading = true;
                tracing::info!(seq = d.seq, x0, x1, y0, y1, zoom = self.zoom, "dispatched query");
            }
            Err(e) => {
                let err = format!("{e:#}");
                tracing::warn!(seq = d.seq, error = %err, "failed to dispatch query");
                self.loading = false;
                self.last_error = Some(err);
            }
        }
    }

    /// Cancels the pending debounce and any flight; later ticks do nothing.
    pub fn teardown(&mut self) {
        if self.coalescer.cancel() {
            tracing::debug!("dropped pending query on teardown");
        }
        self.camera.cancel();
        self.tracker.set_suppressed(false);
        self.inbound = None;
        self.closed = true;
    }

    pub fn status(&self) -> Status {
        Status {
            connected: self.connected,
            loading: self.loading,
            complete: self.store.is_complete(),
            last_error: self.last_error.clone(),
            background: self.store.background().len(),
            streaming: self.store.streaming().len(),
            latest_seq: self.coalescer.latest_seq(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn is_animating(&self) -> bool {
        self.camera.is_animating()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Layer;
    use seqatlas_core::{PointId, QueryMsg};

    impl QuerySink for Vec<ClientMsg> {
        fn send(&mut self, msg: ClientMsg) -> Result<()> {
            self.push(msg);
            Ok(())
        }
    }

    /// Records draws and echoes programmatic range changes back, the way a
    /// chart surface reports them.
    #[derive(Default)]
    struct Surface {
        frames: Vec<Vec<Layer>>,
        ranges: Vec<Viewport>,
        echo: Vec<Viewport>,
    }

    impl RenderSurface for Surface {
        fn draw(&mut self, layers: &[Layer]) {
            self.frames.push(layers.to_vec());
        }

        fn set_visible_range(&mut self, viewport: Viewport) {
            self.ranges.push(viewport);
            self.echo.push(viewport);
        }
    }

    impl Surface {
        fn drawn(&self) -> usize {
            self.frames
                .last()
                .map(|f| f.iter().map(Layer::len).sum())
                .unwrap_or(0)
        }
    }

    type TestPipeline = Pipeline<Vec<ClientMsg>>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn point(id: &str, x: f64, y: f64) -> Point {
        Point {
            id: PointId::from(id),
            x,
            y,
            origin: "mip-clusters".to_string(),
            length: 300.0,
            plddt: 70.0,
            supercog: Some("s2".to_string()),
            taxonomy: None,
            pdb_loc: None,
        }
    }

    fn server(msg: ServerMsg) -> Incoming {
        Incoming::message("test".to_string(), msg)
    }

    fn update(points: Vec<Point>, seq: Option<u64>, is_last: bool) -> Incoming {
        server(ServerMsg::Update {
            points,
            is_last,
            seq,
        })
    }

    fn queries(p: &TestPipeline) -> Vec<QueryMsg> {
        p.sink()
            .iter()
            .filter_map(|m| match m {
                ClientMsg::Query(q) => Some(q.clone()),
                ClientMsg::Init(_) => None,
            })
            .collect()
    }

    fn tick(p: &mut TestPipeline, s: &mut Surface, at: Instant) {
        p.tick(at, s);
        for v in std::mem::take(&mut s.echo) {
            p.on_x_range_changed(v.x_min, v.x_max);
            p.on_y_range_changed(v.y_min, v.y_max);
        }
    }

    /// Starts the pipeline and lets the initial query go out. Returns the time
    /// of the dispatching tick.
    fn boot(p: &mut TestPipeline, s: &mut Surface, t0: Instant) -> Instant {
        p.start().expect("start");
        tick(p, s, t0);
        tick(p, s, t0 + ms(100));
        assert_eq!(queries(p).len(), 1);
        t0 + ms(100)
    }

    fn pipeline() -> TestPipeline {
        Pipeline::new(&ViewerConfig::default(), Vec::new(), None)
    }

    #[test]
    fn startup_requests_background_then_initial_query() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t0 = Instant::now();
        boot(&mut p, &mut s, t0);

        assert_eq!(p.sink()[0], ClientMsg::init());
        let q = &queries(&p)[0];
        assert_eq!((q.seq, q.x0, q.x1, q.y0, q.y1), (1, -20.0, 20.0, -30.0, 20.0));
        assert!(p.status().loading);
        assert_eq!(p.zoom(), 1.0);
    }

    #[test]
    fn background_and_streaming_render_together_without_duplicates() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());

        p.apply(server(ServerMsg::Init {
            points: vec![point("a", 0.0, 0.0), point("b", 1.0, 0.0), point("c", 2.0, 0.0)],
        }));
        p.apply(update(vec![point("d", 3.0, 0.0)], Some(1), false));
        p.apply(update(vec![point("e", 4.0, 0.0), point("d", 3.0, 0.0)], Some(1), true));
        tick(&mut p, &mut s, t + ms(16));

        assert_eq!(s.drawn(), 5);
        let status = p.status();
        assert_eq!((status.background, status.streaming), (3, 2));
        assert!(!status.loading);
        assert!(status.complete);
    }

    #[test]
    fn stale_tagged_batches_are_dropped_untagged_accepted() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());

        let mut narrower = p.filters().clone();
        narrower.length.hi = 1000.0;
        p.set_filters(narrower);
        tick(&mut p, &mut s, t + ms(10));
        tick(&mut p, &mut s, t + ms(110));
        assert_eq!(p.status().latest_seq, 2);

        p.apply(update(vec![point("old", 0.0, 0.0)], Some(1), true));
        assert!(p.store().streaming().is_empty());
        assert!(p.status().loading);

        p.apply(update(vec![point("legacy", 0.0, 0.0)], None, false));
        p.apply(update(vec![point("fresh", 0.0, 0.0)], Some(2), true));
        let ids: Vec<_> = p.store().streaming().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["legacy", "fresh"]);
        assert!(!p.status().loading);
    }

    #[test]
    fn selection_flies_to_target_then_fetches_once() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());
        p.apply(update(vec![point("far", 400.0, 0.0)], Some(1), true));

        let t1 = t + ms(50);
        let event = SelectionEvent {
            id: PointId::from("far"),
            active: true,
        };
        assert!(matches!(p.on_point_selected(&event, t1), Resolution::Selected(_)));

        let mut at = t1;
        while at < t1 + ms(500) {
            tick(&mut p, &mut s, at);
            assert!(p.is_animating());
            at += ms(16);
        }
        assert_eq!(queries(&p).len(), 1);

        tick(&mut p, &mut s, t1 + ms(500));
        assert!(!p.is_animating());
        let landed = p.viewport();
        assert!((landed.x_min - 399.7).abs() < 1e-9 && (landed.x_max - 400.3).abs() < 1e-9);
        assert!((landed.y_min + 0.3).abs() < 1e-9 && (landed.y_max - 0.3).abs() < 1e-9);
        assert!(s.ranges.len() > 2);

        let mut at = t1 + ms(516);
        while at < t1 + ms(1500) {
            tick(&mut p, &mut s, at);
            at += ms(16);
        }
        let sent = queries(&p);
        assert_eq!(sent.len(), 2);
        let q = &sent[1];
        assert_eq!(q.seq, 2);
        assert!((q.x0 - 399.7).abs() < 1e-9 && (q.x1 - 400.3).abs() < 1e-9);
        assert!((p.zoom() - 0.15).abs() < 1e-9);
        assert_eq!(
            p.store().selection().map(|p| p.id.as_str()),
            Some("far")
        );
    }

    #[test]
    fn background_clicks_and_unknown_ids_are_ignored() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());
        p.apply(server(ServerMsg::Init {
            points: vec![point("bg", 5.0, 5.0)],
        }));

        let inactive = SelectionEvent {
            id: PointId::from("bg"),
            active: false,
        };
        assert_eq!(
            p.on_point_selected(&inactive, t),
            Resolution::Ignored(IgnoreReason::Inactive)
        );
        let missing = SelectionEvent {
            id: PointId::from("bg"),
            active: true,
        };
        assert_eq!(
            p.on_point_selected(&missing, t),
            Resolution::Ignored(IgnoreReason::NotInDataset)
        );
        assert!(!p.is_animating());
        assert!(p.store().selection().is_none());
    }

    #[test]
    fn unsettled_drag_sends_nothing_until_both_axes_report() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());

        let mut at = t;
        for i in 1..=30 {
            at += ms(16);
            let shift = i as f64 * 0.5;
            p.on_x_range_changed(-20.0 + shift, 20.0 + shift);
            tick(&mut p, &mut s, at);
        }
        assert_eq!(queries(&p).len(), 1);

        p.on_y_range_changed(-30.0, 20.0);
        tick(&mut p, &mut s, at);
        tick(&mut p, &mut s, at + ms(100));
        let sent = queries(&p);
        assert_eq!(sent.len(), 2);
        assert_eq!((sent[1].x0, sent[1].x1), (-5.0, 35.0));
    }

    #[test]
    fn burst_of_filter_changes_sends_one_query() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());

        let mut filters = p.filters().clone();
        let mut at = t;
        for step in 0..10u64 {
            at = t + ms(10 + step * 10);
            filters.plddt.lo = 21.0 + step as f64;
            p.set_filters(filters.clone());
            tick(&mut p, &mut s, at);
        }
        tick(&mut p, &mut s, at + ms(99));
        assert_eq!(queries(&p).len(), 1);
        tick(&mut p, &mut s, at + ms(100));
        tick(&mut p, &mut s, at + ms(600));

        let sent = queries(&p);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].plddt.lo, 30.0);
    }

    #[test]
    fn go_term_hides_background_and_clearing_restores_it() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());
        p.apply(server(ServerMsg::Init {
            points: vec![point("a", 0.0, 0.0), point("b", 1.0, 0.0), point("c", 2.0, 0.0)],
        }));
        p.apply(update(vec![point("d", 3.0, 0.0), point("e", 4.0, 0.0)], Some(1), true));
        tick(&mut p, &mut s, t + ms(1));
        assert_eq!(s.drawn(), 5);

        let mut with_go = p.filters().clone();
        with_go.go_term = Some("GO:0003677".to_string());
        p.set_filters(with_go);
        tick(&mut p, &mut s, t + ms(2));
        assert_eq!(s.drawn(), 2);
        assert!(s.frames.last().into_iter().flatten().all(|l| l.kind == LayerKind::Streaming));

        let mut cleared = p.filters().clone();
        cleared.go_term = None;
        p.set_filters(cleared);
        tick(&mut p, &mut s, t + ms(3));
        assert_eq!(s.drawn(), 5);

        // reverted inside the debounce window: nothing new goes out
        tick(&mut p, &mut s, t + ms(500));
        assert_eq!(queries(&p).len(), 1);
    }

    #[test]
    fn server_error_keeps_dataset_and_clears_loading() {
        let mut p = pipeline();
        let mut s = Surface::default();
        boot(&mut p, &mut s, Instant::now());
        p.apply(server(ServerMsg::Init {
            points: vec![point("a", 0.0, 0.0)],
        }));
        p.apply(update(vec![point("b", 1.0, 0.0)], Some(1), false));
        assert!(p.status().loading);

        p.apply(server(ServerMsg::Error {
            message: "query timed out".to_string(),
        }));
        let status = p.status();
        assert!(!status.loading);
        assert!(!status.complete);
        assert_eq!(status.last_error.as_deref(), Some("query timed out"));
        assert_eq!((status.background, status.streaming), (1, 1));
    }

    #[test]
    fn inbound_events_are_drained_on_tick() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut p = Pipeline::new(&ViewerConfig::default(), Vec::new(), Some(rx));
        let mut s = Surface::default();
        tx.send(Incoming::connected("test".to_string())).expect("send");
        tx.send(server(ServerMsg::Init {
            points: vec![point("a", 0.0, 0.0), point("a", 0.0, 0.0)],
        }))
        .expect("send");

        tick(&mut p, &mut s, Instant::now());
        let status = p.status();
        assert!(status.connected);
        assert_eq!(status.background, 1);

        tx.send(Incoming::gave_up("test".to_string())).expect("send");
        tick(&mut p, &mut s, Instant::now());
        assert!(!p.status().connected);
        assert!(p.status().last_error.is_some());
    }

    #[test]
    fn teardown_cancels_pending_query() {
        let mut p = pipeline();
        let mut s = Surface::default();
        let t = boot(&mut p, &mut s, Instant::now());

        let mut filters = p.filters().clone();
        filters.origins.remove("mip-singletons");
        p.set_filters(filters);
        tick(&mut p, &mut s, t + ms(10));
        p.teardown();
        tick(&mut p, &mut s, t + ms(500));
        assert_eq!(queries(&p).len(), 1);
    }
}
