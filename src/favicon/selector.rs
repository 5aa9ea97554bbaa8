//! Candidate scoring and selection
//!
//! Higher scores are better everywhere. Vector candidates outrank every
//! raster candidate regardless of their numeric score.

use std::cmp::Ordering;

use crate::favicon::models::{CandidateIcon, IconSourceKind};
use crate::utils::url::UrlUtils;

const BASE_SCORE: i32 = 5;
const VECTOR_BONUS: i32 = 10;
const COMMON_RASTER_BONUS: i32 = 5;

pub struct IconSelector;

impl IconSelector {
    /// Additive score for one candidate; colour-only candidates score zero
    pub fn score(candidate: &CandidateIcon) -> i32 {
        if candidate.source_kind() == IconSourceKind::ThemeColor {
            return 0;
        }

        let url = candidate.source_url().unwrap_or_default();
        let mut score = BASE_SCORE;

        if Self::is_vector(candidate) {
            score += VECTOR_BONUS;
        }
        if Self::is_common_raster(candidate) {
            score += COMMON_RASTER_BONUS;
        }

        score += match candidate.source_kind() {
            IconSourceKind::AppleTouchIcon => 3,
            IconSourceKind::IconLink | IconSourceKind::ShortcutIcon => 2,
            IconSourceKind::MaskIcon | IconSourceKind::DefaultFavicon => 1,
            IconSourceKind::TwitterImage | IconSourceKind::ThemeColor => 0,
        };

        score += match candidate.declared_width() {
            Some(w) if w >= 64 => 3,
            Some(w) if w >= 32 => 2,
            Some(w) if w >= 16 => 1,
            _ => 0,
        };

        score += match UrlUtils::path_extension(url).as_deref() {
            Some("svg") => 10,
            Some("png") => 3,
            Some("jpg") | Some("jpeg") => 2,
            Some("ico") => 1,
            _ => 0,
        };

        score
    }

    pub fn is_vector(candidate: &CandidateIcon) -> bool {
        candidate.source_kind() == IconSourceKind::MaskIcon
            || declared_type_contains(candidate, "svg")
            || candidate
                .source_url()
                .is_some_and(|u| UrlUtils::has_extension(u, "svg"))
    }

    fn is_common_raster(candidate: &CandidateIcon) -> bool {
        let by_type = declared_type_contains(candidate, "png")
            || declared_type_contains(candidate, "jpeg")
            || declared_type_contains(candidate, "jpg");
        let by_suffix = candidate.source_url().is_some_and(|u| {
            matches!(
                UrlUtils::path_extension(u).as_deref(),
                Some("png") | Some("jpg") | Some("jpeg")
            )
        });
        by_type || by_suffix
    }

    /// Fill in the `score` field of every candidate
    pub fn score_all(candidates: &mut [CandidateIcon]) {
        for candidate in candidates.iter_mut() {
            candidate.score = Self::score(candidate);
        }
    }

    /// Fetchable candidates, scored and ordered best first
    ///
    /// Vectors first, then by score, then by larger declared width, then by
    /// discovery order.
    pub fn rank(candidates: &[CandidateIcon]) -> Vec<CandidateIcon> {
        let mut ranked: Vec<CandidateIcon> = candidates
            .iter()
            .filter(|c| c.is_fetchable())
            .cloned()
            .map(|mut c| {
                c.score = Self::score(&c);
                c
            })
            .collect();

        // stable sort keeps discovery order for full ties
        ranked.sort_by(compare_best_first);
        ranked
    }

    pub fn select_best(candidates: &[CandidateIcon]) -> Option<CandidateIcon> {
        Self::rank(candidates).into_iter().next()
    }

    /// Ranking with the best match for `size` moved to the front
    pub fn rank_for_size(candidates: &[CandidateIcon], size: u32) -> Vec<CandidateIcon> {
        let mut ranked = Self::rank(candidates);
        if let Some(index) = Self::size_match_index(&ranked, size)
            && index > 0
        {
            let chosen = ranked.remove(index);
            ranked.insert(0, chosen);
        }
        ranked
    }

    /// Vector first, else an exact declared width, else the closest declared
    /// width, else the global best
    pub fn select_for_size(candidates: &[CandidateIcon], size: u32) -> Option<CandidateIcon> {
        Self::rank_for_size(candidates, size).into_iter().next()
    }

    fn size_match_index(ranked: &[CandidateIcon], size: u32) -> Option<usize> {
        if ranked.first().is_some_and(Self::is_vector) {
            return Some(0);
        }

        if let Some(exact) = ranked
            .iter()
            .position(|c| c.declared_width() == Some(size))
        {
            return Some(exact);
        }

        ranked
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.declared_width().map(|w| (i, w.abs_diff(size))))
            .min_by_key(|(_, diff)| *diff)
            .map(|(i, _)| i)
    }
}

fn declared_type_contains(candidate: &CandidateIcon, needle: &str) -> bool {
    candidate
        .declared_type
        .as_deref()
        .is_some_and(|t| t.to_ascii_lowercase().contains(needle))
}

fn compare_best_first(a: &CandidateIcon, b: &CandidateIcon) -> Ordering {
    IconSelector::is_vector(b)
        .cmp(&IconSelector::is_vector(a))
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| {
            b.declared_width()
                .unwrap_or(0)
                .cmp(&a.declared_width().unwrap_or(0))
        })
}
