use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Origin databases the embedding is built from.
pub const ORIGINS: [&str; 5] = [
    "afdb-clusters-dark",
    "afdb-clusters-light",
    "hclust30-clusters",
    "mip-clusters",
    "mip-singletons",
];

/// SuperCOG annotation categories.
pub const ANNOTATIONS: [&str; 8] = ["R", "unannotated", "s1", "s2", "s3", "s12", "s13", "s23"];

/// Sentinel pLDDT for points without an AlphaFold confidence score.
pub const PLDDT_NOT_APPLICABLE: f64 = -1.0;

pub const UNANNOTATED: &str = "unannotated";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PointId(pub String);

impl PointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn plddt_not_applicable() -> f64 {
    PLDDT_NOT_APPLICABLE
}

/// One sequence/structure in the embedding. Identity and coordinates never
/// change once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Point {
    #[serde(rename = "name", alias = "protein")]
    pub id: PointId,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", alias = "origin")]
    pub origin: String,
    #[serde(alias = "Length", default)]
    pub length: f64,
    #[serde(rename = "pLDDT", alias = "pLDDT (AF)", default = "plddt_not_applicable")]
    pub plddt: f64,
    #[serde(
        rename = "superCOG",
        alias = "SuperCOGs_str_v10",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub supercog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdb_loc: Option<String>,
}

impl Point {
    pub fn supercog_or_unannotated(&self) -> &str {
        self.supercog.as_deref().unwrap_or(UNANNOTATED)
    }
}

/// Visible rectangle in data space. Always `x_min < x_max` and `y_min < y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Viewport {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Option<Self> {
        let ok = x_min.is_finite()
            && x_max.is_finite()
            && y_min.is_finite()
            && y_max.is_finite()
            && x_min < x_max
            && y_min < y_max;
        ok.then_some(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Square window of `half` data units around `(cx, cy)`; `half` must be positive.
    pub fn centered(cx: f64, cy: f64, half: f64) -> Option<Self> {
        Self::new(cx - half, cx + half, cy - half, cy + half)
    }

    pub fn with_x(self, min: f64, max: f64) -> Option<Self> {
        Self::new(min, max, self.y_min, self.y_max)
    }

    pub fn with_y(self, min: f64, max: f64) -> Option<Self> {
        Self::new(self.x_min, self.x_max, min, max)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
        )
    }

    /// Linear blend of every edge; `t` in `[0, 1]`. Both ends are valid
    /// rectangles so every blend is too.
    pub fn lerp(&self, to: &Viewport, t: f64) -> Viewport {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Viewport {
            x_min: mix(self.x_min, to.x_min),
            x_max: mix(self.x_max, to.x_max),
            y_min: mix(self.y_min, to.y_min),
            y_max: mix(self.y_max, to.y_max),
        }
    }
}

/// Inclusive numeric interval, `[lo, hi]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }
}

impl From<[f64; 2]> for Interval {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<Interval> for [f64; 2] {
    fn from(i: Interval) -> Self {
        [i.lo, i.hi]
    }
}

/// Conjunction of the active predicates. Compared by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub origins: BTreeSet<String>,
    pub length: Interval,
    pub plddt: Interval,
    pub supercog: BTreeSet<String>,
    /// Empty means no taxonomy constraint.
    pub taxonomy: BTreeSet<String>,
    pub go_term: Option<String>,
    pub ontology: Option<String>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            origins: ORIGINS.iter().map(|s| s.to_string()).collect(),
            length: Interval::new(0.0, 2700.0),
            plddt: Interval::new(20.0, 100.0),
            supercog: ANNOTATIONS.iter().map(|s| s.to_string()).collect(),
            taxonomy: BTreeSet::new(),
            go_term: None,
            ontology: None,
        }
    }
}

impl FilterSet {
    /// A GO-term or ontology constraint changes what "all points" means, so
    /// the background overview is not shown while one is active.
    pub fn has_function_constraint(&self) -> bool {
        self.go_term.is_some() || self.ontology.is_some()
    }

    pub fn admits(&self, p: &Point) -> bool {
        if !self.origins.contains(&p.origin) {
            return false;
        }
        if !self.length.contains(p.length) {
            return false;
        }
        if p.plddt != PLDDT_NOT_APPLICABLE && !self.plddt.contains(p.plddt) {
            return false;
        }
        if !self.supercog.contains(p.supercog_or_unannotated()) {
            return false;
        }
        if self.taxonomy.is_empty() {
            return true;
        }
        p.taxonomy
            .as_ref()
            .is_some_and(|t| self.taxonomy.contains(t))
    }
}

/// Snapshot of viewport + filters at dispatch time. Used as the coalescing key.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub viewport: Viewport,
    pub filters: FilterSet,
}

impl Query {
    pub fn to_wire(&self, seq: u64) -> QueryMsg {
        let v = &self.viewport;
        let f = &self.filters;
        QueryMsg {
            seq,
            x0: v.x_min,
            x1: v.x_max,
            y0: v.y_min,
            y1: v.y_max,
            types: f.origins.iter().cloned().collect(),
            length_range: f.length,
            plddt: f.plddt,
            supercog: f.supercog.iter().cloned().collect(),
            go_term: f.go_term.clone(),
            ontology: f.ontology.clone(),
            taxonomy: f.taxonomy.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMsg {
    pub seq: u64,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub types: Vec<String>,
    pub length_range: Interval,
    #[serde(rename = "pLDDT")]
    pub plddt: Interval,
    pub supercog: Vec<String>,
    pub go_term: Option<String>,
    pub ontology: Option<String>,
    pub taxonomy: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitKind {
    Init,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(rename = "type")]
    pub kind: InitKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMsg {
    Init(InitRequest),
    Query(QueryMsg),
}

impl ClientMsg {
    pub fn init() -> Self {
        Self::Init(InitRequest {
            kind: InitKind::Init,
        })
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Init {
        points: Vec<Point>,
    },
    Update {
        points: Vec<Point>,
        #[serde(default)]
        is_last: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
    Error {
        message: String,
    },
}

impl ServerMsg {
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
