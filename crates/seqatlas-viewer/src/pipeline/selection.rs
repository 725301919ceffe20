use seqatlas_core::{Point, PointId};

use crate::pipeline::store::SessionStore;

/// Raw point-selection event from the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub id: PointId,
    /// False for points of the dimmed background layer.
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Inactive,
    NotInDataset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Selected(Point),
    Ignored(IgnoreReason),
}

/// Maps a selection event back to its record in the streaming layer. Only
/// active points are selectable.
pub fn resolve(store: &SessionStore, event: &SelectionEvent) -> Resolution {
    if !event.active {
        return Resolution::Ignored(IgnoreReason::Inactive);
    }
    match store.streaming_point(&event.id) {
        Some(p) => Resolution::Selected(p.clone()),
        None => Resolution::Ignored(IgnoreReason::NotInDataset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str) -> Point {
        Point {
            id: PointId::from(id),
            x: 3.0,
            y: -4.0,
            origin: "hclust30-clusters".to_string(),
            length: 90.0,
            plddt: 60.0,
            supercog: None,
            taxonomy: None,
            pdb_loc: Some("hclust/x.pdb".to_string()),
        }
    }

    fn store() -> SessionStore {
        let mut store = SessionStore::new();
        store.replace_background(vec![point("bg")]);
        store.begin_query(1);
        store.merge_batch(Some(1), vec![point("hit")], true);
        store
    }

    #[test]
    fn active_streaming_point_resolves_to_full_record() {
        let store = store();
        let event = SelectionEvent {
            id: PointId::from("hit"),
            active: true,
        };
        assert_eq!(resolve(&store, &event), Resolution::Selected(point("hit")));
    }

    #[test]
    fn background_points_are_not_selectable() {
        let store = store();
        let event = SelectionEvent {
            id: PointId::from("bg"),
            active: false,
        };
        assert_eq!(
            resolve(&store, &event),
            Resolution::Ignored(IgnoreReason::Inactive)
        );
    }

    #[test]
    fn unknown_identity_is_ignored() {
        let store = store();
        // claims to be active but only exists in the background
        let event = SelectionEvent {
            id: PointId::from("bg"),
            active: true,
        };
        assert_eq!(
            resolve(&store, &event),
            Resolution::Ignored(IgnoreReason::NotInDataset)
        );
    }
}
