use seqatlas_core::{FilterSet, Point, PointId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Dimmed, non-selectable overview.
    Background,
    /// Results of the active query.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { added: usize, duplicates: usize },
    /// Batch tagged with a superseded query's sequence number.
    Stale { batch_seq: u64 },
}

/// Points of one query, deduplicated by identity; first occurrence wins.
#[derive(Debug, Default)]
struct StreamingSet {
    seq: u64,
    points: Vec<Point>,
    index: HashMap<PointId, usize>,
    complete: bool,
}

impl StreamingSet {
    fn reset(&mut self, seq: u64) {
        self.seq = seq;
        self.points.clear();
        self.index.clear();
        self.complete = false;
    }

    fn extend(&mut self, batch: Vec<Point>) -> (usize, usize) {
        let mut added = 0;
        let mut duplicates = 0;
        self.points.reserve(batch.len());
        for p in batch {
            if self.index.contains_key(&p.id) {
                duplicates += 1;
                continue;
            }
            self.index.insert(p.id.clone(), self.points.len());
            self.points.push(p);
            added += 1;
        }
        (added, duplicates)
    }
}

/// Session-scoped dataset: the background overview, the streaming
/// accumulator of the active query, and the current selection.
#[derive(Debug, Default)]
pub struct SessionStore {
    background: Vec<Point>,
    background_index: HashMap<PointId, usize>,
    streaming: StreamingSet,
    selection: Option<Point>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the background wholesale. Returns the number kept after
    /// dropping repeated identities.
    pub fn replace_background(&mut self, points: Vec<Point>) -> usize {
        self.background.clear();
        self.background_index.clear();
        for p in points {
            if self.background_index.contains_key(&p.id) {
                continue;
            }
            self.background_index
                .insert(p.id.clone(), self.background.len());
            self.background.push(p);
        }
        self.background.len()
    }

    /// Clears the accumulator for a newly dispatched query.
    pub fn begin_query(&mut self, seq: u64) {
        self.streaming.reset(seq);
    }

    /// Appends one batch. Cost is proportional to the batch, not the
    /// accumulated set. Untagged batches are attributed to the active query.
    pub fn merge_batch(&mut self, seq: Option<u64>, points: Vec<Point>, is_last: bool) -> MergeOutcome {
        if let Some(batch_seq) = seq {
            if batch_seq != self.streaming.seq {
                return MergeOutcome::Stale { batch_seq };
            }
        }
        let (added, duplicates) = self.streaming.extend(points);
        if is_last {
            self.streaming.complete = true;
        }
        MergeOutcome::Merged { added, duplicates }
    }

    pub fn active_seq(&self) -> u64 {
        self.streaming.seq
    }

    pub fn is_complete(&self) -> bool {
        self.streaming.complete
    }

    pub fn background(&self) -> &[Point] {
        &self.background
    }

    pub fn streaming(&self) -> &[Point] {
        &self.streaming.points
    }

    pub fn streaming_point(&self, id: &PointId) -> Option<&Point> {
        self.streaming
            .index
            .get(id)
            .and_then(|&i| self.streaming.points.get(i))
    }

    pub fn background_point(&self, id: &PointId) -> Option<&Point> {
        self.background_index
            .get(id)
            .and_then(|&i| self.background.get(i))
    }

    /// Renderable dataset in draw order: background first, streaming on top.
    /// The background is left out while a GO-term/ontology constraint is
    /// active, and a point in both sets is only yielded once, as streaming.
    pub fn visible<'a>(
        &'a self,
        filters: &'a FilterSet,
    ) -> impl Iterator<Item = (LayerKind, &'a Point)> + 'a {
        let include_background = !filters.has_function_constraint();
        let background = self
            .background
            .iter()
            .filter(move |_| include_background)
            .filter(move |p| !self.streaming.index.contains_key(&p.id))
            .map(|p| (LayerKind::Background, p));
        let streaming = self
            .streaming
            .points
            .iter()
            .map(|p| (LayerKind::Streaming, p));
        background
            .chain(streaming)
            .filter(move |(_, p)| filters.admits(p))
    }

    pub fn selection(&self) -> Option<&Point> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, point: Point) {
        self.selection = Some(point);
    }

    pub fn clear_selection(&mut self) -> Option<Point> {
        self.selection.take()
    }

    /// Case-insensitive substring match on identity over everything loaded.
    pub fn search(&self, needle: &str, limit: usize) -> Vec<PointId> {
        let q = needle.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<PointId> = self
            .streaming
            .points
            .iter()
            .chain(
                self.background
                    .iter()
                    .filter(|p| !self.streaming.index.contains_key(&p.id)),
            )
            .filter(|p| p.id.as_str().to_lowercase().contains(&q))
            .map(|p| p.id.clone())
            .collect();
        hits.sort();
        hits.truncate(limit.max(1));
        hits
    }

    /// Best loaded match for `needle`: the exact identity if present,
    /// otherwise the first search hit. Streaming copies win over background.
    pub fn find_point(&self, needle: &str) -> Option<&Point> {
        let exact = PointId::from(needle.trim());
        if let Some(p) = self.loaded_point(&exact) {
            return Some(p);
        }
        let id = self.search(needle, 1).into_iter().next()?;
        self.loaded_point(&id)
    }

    fn loaded_point(&self, id: &PointId) -> Option<&Point> {
        self.streaming_point(id)
            .or_else(|| self.background_point(id))
    }
}
