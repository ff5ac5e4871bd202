use crate::ports::search::{SearchCandidate, VideoSearch};

/// Candidates further than this from the expected duration are never picked.
pub const DURATION_TOLERANCE_MS: u64 = 5000;

/// Parse a search result duration (`MM:SS` or `SS`) into milliseconds.
/// Any other shape, or a value too large to represent, is unusable for
/// scoring.
pub fn parse_duration_ms(duration: &str) -> Option<u64> {
    let parts: Vec<&str> = duration.trim().split(':').collect();
    let seconds = match parts.as_slice() {
        [seconds] => seconds.parse::<u64>().ok()?,
        [minutes, seconds] => {
            let minutes = minutes.parse::<u64>().ok()?;
            minutes
                .checked_mul(60)?
                .checked_add(seconds.parse::<u64>().ok()?)?
        }
        _ => return None,
    };
    seconds.checked_mul(1000)
}

/// Pick the candidate closest in duration to `expected_ms`, within
/// [`DURATION_TOLERANCE_MS`]. On an exact tie the earlier candidate wins.
pub fn pick_closest_duration(
    candidates: &[SearchCandidate],
    expected_ms: u64,
) -> Option<&SearchCandidate> {
    let mut best: Option<(&SearchCandidate, u64)> = None;

    for candidate in candidates {
        let Some(duration_ms) = candidate.duration.as_deref().and_then(parse_duration_ms) else {
            tracing::trace!("Discarding candidate without duration: {}", candidate.link);
            continue;
        };

        let diff = duration_ms.abs_diff(expected_ms);
        if diff > DURATION_TOLERANCE_MS {
            continue;
        }

        if best.is_none_or(|(_, best_diff)| diff < best_diff) {
            best = Some((candidate, diff));
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Resolves catalog songs to search results by duration proximity.
pub struct MatchResolver<S: VideoSearch> {
    search: S,
}

impl<S: VideoSearch> MatchResolver<S> {
    pub fn new(search: S) -> Self {
        Self { search }
    }

    /// Find the best search result for a song. When nothing matches with
    /// the artist in the query, the search is retried once with the title
    /// alone. `None` is an ordinary outcome, not an error.
    pub async fn resolve(
        &self,
        title: &str,
        artist: &str,
        expected_duration_ms: u64,
    ) -> Option<SearchCandidate> {
        if let Some(found) = self.resolve_query(title, artist, expected_duration_ms).await {
            return Some(found);
        }

        if artist.is_empty() {
            return None;
        }

        tracing::debug!("No match for '{}' by '{}', retrying title only", title, artist);
        self.resolve_query(title, "", expected_duration_ms).await
    }

    async fn resolve_query(
        &self,
        title: &str,
        artist: &str,
        expected_duration_ms: u64,
    ) -> Option<SearchCandidate> {
        let query = format!("{} {}", artist, title).trim().to_string();

        let candidates = match self.search.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("Search for '{}' failed: {}", query, e);
                return None;
            }
        };

        let best = pick_closest_duration(&candidates, expected_duration_ms).cloned();
        match &best {
            Some(candidate) => tracing::debug!(
                "Best match for '{}': {} ({:?})",
                query,
                candidate.link,
                candidate.duration
            ),
            None => tracing::debug!(
                "No candidate within {}ms for '{}' ({} results)",
                DURATION_TOLERANCE_MS,
                query,
                candidates.len()
            ),
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::search::MockVideoSearch;
    use crate::test_utils::make_candidate;

    // =========================================================================
    // parse_duration_ms tests
    // =========================================================================

    #[test]
    fn test_parse_minutes_and_seconds() {
        assert_eq!(parse_duration_ms("3:18"), Some(198_000));
        assert_eq!(parse_duration_ms("03:05"), Some(185_000));
    }

    #[test]
    fn test_parse_seconds_only() {
        assert_eq!(parse_duration_ms("45"), Some(45_000));
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert_eq!(parse_duration_ms("1:02:03"), None);
        assert_eq!(parse_duration_ms(""), None);
        assert_eq!(parse_duration_ms("3:xx"), None);
        assert_eq!(parse_duration_ms("LIVE"), None);
    }

    #[test]
    fn test_parse_rejects_overflowing_values() {
        assert_eq!(parse_duration_ms("18446744073709552"), None);
        assert_eq!(parse_duration_ms("307445734561826:00"), None);
        assert_eq!(parse_duration_ms("18446744073709551615"), None);
        assert_eq!(parse_duration_ms("1:18446744073709551615"), None);
    }

    // =========================================================================
    // pick_closest_duration tests
    // =========================================================================

    #[test]
    fn test_closer_duration_wins() {
        let candidates = vec![make_candidate("3:30", "far"), make_candidate("3:18", "near")];

        let best = pick_closest_duration(&candidates, 200_000).unwrap();
        assert_eq!(best.link, "near");
    }

    #[test]
    fn test_candidate_outside_tolerance_is_never_selected() {
        let candidates = vec![make_candidate("3:40", "only")];
        assert!(pick_closest_duration(&candidates, 200_000).is_none());
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let candidates = vec![make_candidate("3:25", "edge")];
        assert!(pick_closest_duration(&candidates, 200_000).is_some());
    }

    #[test]
    fn test_exact_tie_keeps_first_seen() {
        let candidates = vec![
            make_candidate("3:18", "first"),
            make_candidate("3:22", "second"),
        ];

        let best = pick_closest_duration(&candidates, 200_000).unwrap();
        assert_eq!(best.link, "first");
    }

    #[test]
    fn test_candidates_without_duration_are_discarded() {
        let mut no_duration = make_candidate("0", "none");
        no_duration.duration = None;
        let candidates = vec![no_duration, make_candidate("1:02:03", "hours")];

        assert!(pick_closest_duration(&candidates, 200_000).is_none());
    }

    // =========================================================================
    // MatchResolver tests
    // =========================================================================

    #[tokio::test]
    async fn test_resolve_queries_artist_and_title() {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .withf(|query| query == "Queen Bohemian Rhapsody")
            .times(1)
            .returning(|_| Ok(vec![make_candidate("5:55", "bohemian")]));

        let resolver = MatchResolver::new(search);
        let found = resolver.resolve("Bohemian Rhapsody", "Queen", 354_000).await;

        assert_eq!(found.unwrap().link, "bohemian");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_title_only() {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .withf(|query| query == "UnknownArtist Title")
            .times(1)
            .returning(|_| Ok(vec![make_candidate("4:30", "wrong-length")]));
        search
            .expect_search()
            .withf(|query| query == "Title")
            .times(1)
            .returning(|_| Ok(vec![make_candidate("3:20", "title-only")]));

        let resolver = MatchResolver::new(search);
        let found = resolver.resolve("Title", "UnknownArtist", 200_000).await;

        assert_eq!(found.unwrap().link, "title-only");
    }

    #[tokio::test]
    async fn test_resolve_empty_artist_searches_once() {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .withf(|query| query == "Title")
            .times(1)
            .returning(|_| Ok(vec![]));

        let resolver = MatchResolver::new(search);
        assert!(resolver.resolve("Title", "", 200_000).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_returns_none_after_failed_fallback() {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .times(2)
            .returning(|_| Ok(vec![make_candidate("3:40", "too-long")]));

        let resolver = MatchResolver::new(search);
        assert!(resolver.resolve("Title", "Artist", 200_000).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_skips_oversized_duration() {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .withf(|query| query == "Artist Title")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    make_candidate("18446744073709552", "garbage"),
                    make_candidate("3:20", "good"),
                ])
            });

        let resolver = MatchResolver::new(search);
        let found = resolver.resolve("Title", "Artist", 200_000).await;

        assert_eq!(found.unwrap().link, "good");
    }

    #[tokio::test]
    async fn test_search_error_is_treated_as_no_match() {
        let mut search = MockVideoSearch::new();
        search
            .expect_search()
            .withf(|query| query == "Artist Title")
            .returning(|_| Err(color_eyre::eyre::eyre!("connection reset")));
        search
            .expect_search()
            .withf(|query| query == "Title")
            .returning(|_| Ok(vec![make_candidate("3:20", "recovered")]));

        let resolver = MatchResolver::new(search);
        let found = resolver.resolve("Title", "Artist", 200_000).await;

        assert_eq!(found.unwrap().link, "recovered");
    }
}
