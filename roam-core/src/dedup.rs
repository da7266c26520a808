//! Recommendation de-duplication against the places a session has
//! already been shown.

use crate::types::Place;

pub const DEFAULT_BATCH: usize = 8;

/// Outcome of one selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub selected: Vec<Place>,
    /// True when every candidate had already been shown and the batch is
    /// a repeat of earlier recommendations.
    pub exhausted: bool,
}

/// Pick the next batch of places to show.
///
/// Candidates already present in `shown` (case-insensitive, by name) are
/// dropped, preserving the candidates' original order. If nothing unseen
/// remains, the first `k` of the full list are returned instead so the
/// caller can still answer, flagged `exhausted`. The caller is responsible
/// for unioning the selected names back into the session state.
pub fn select(candidates: &[Place], shown: &[String], k: usize) -> Selection {
    let shown_lower: Vec<String> = shown.iter().map(|s| s.to_lowercase()).collect();
    let fresh: Vec<&Place> = candidates
        .iter()
        .filter(|p| !shown_lower.contains(&p.name.to_lowercase()))
        .collect();

    if fresh.is_empty() {
        return Selection {
            selected: candidates.iter().take(k).cloned().collect(),
            exhausted: !candidates.is_empty(),
        };
    }

    Selection {
        selected: fresh.into_iter().take(k).cloned().collect(),
        exhausted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(name: &str) -> Place {
        Place {
            name: name.to_string(),
            category: "attraction".to_string(),
            lat: 0.0,
            lon: 0.0,
        }
    }

    fn names(selection: &Selection) -> Vec<&str> {
        selection.selected.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn first_turn_takes_first_k() {
        let candidates: Vec<Place> = (0..12).map(|i| place(&format!("p{i}"))).collect();
        let selection = select(&candidates, &[], 8);
        assert_eq!(selection.selected.len(), 8);
        assert_eq!(selection.selected[0].name, "p0");
        assert!(!selection.exhausted);
    }

    #[test]
    fn shown_places_are_skipped_in_order() {
        let candidates = vec![place("a"), place("b"), place("c"), place("d")];
        let shown = vec!["a".to_string(), "c".to_string()];
        let selection = select(&candidates, &shown, 8);
        assert_eq!(names(&selection), vec!["b", "d"]);
        assert!(!selection.exhausted);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let candidates = vec![place("Louvre"), place("Eiffel Tower")];
        let shown = vec!["louvre".to_string()];
        let selection = select(&candidates, &shown, 8);
        assert_eq!(names(&selection), vec!["Eiffel Tower"]);
    }

    #[test]
    fn all_shown_falls_back_and_flags_exhausted() {
        let candidates = vec![place("a"), place("b"), place("c")];
        let shown = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let selection = select(&candidates, &shown, 2);
        assert_eq!(names(&selection), vec!["a", "b"]);
        assert!(selection.exhausted);
    }

    #[test]
    fn empty_candidates_is_not_exhausted() {
        let selection = select(&[], &["a".to_string()], 8);
        assert!(selection.selected.is_empty());
        assert!(!selection.exhausted);
    }
}
