use std::ops::Range;

use crate::sdk::geometry::LatLon;

/// Overlapping windows of `chunk_size` points, each starting `chunk_size - overlap`
/// after the previous one. The last window is the first that reaches `len`.
///
/// Callers guarantee `chunk_size > overlap`.
pub fn chunk_windows(len: usize, chunk_size: usize, overlap: usize) -> Vec<Range<usize>> {
    debug_assert!(chunk_size > overlap);
    let step = chunk_size - overlap;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + chunk_size).min(len);
        windows.push(start..end);
        if end >= len {
            break;
        }
        start += step;
    }
    windows
}

/// Appends a later window's result to `combined`.
///
/// The first `overlap / 2` points are dropped, then any leading run of up to
/// `overlap` points that repeats the tail of `combined` exactly. Identical
/// vertices at a window boundary are collapsed whether they come from a raw
/// fallback or from a provider returning the same road vertex twice.
pub fn stitch(combined: &mut Vec<LatLon>, chunk: &[LatLon], overlap: usize) {
    let rest = &chunk[(overlap / 2).min(chunk.len())..];
    let shared = shared_run(combined, rest, overlap);
    combined.extend_from_slice(&rest[shared..]);
}

// Longest k <= max with tail[len-k..] == head[..k]
fn shared_run(tail: &[LatLon], head: &[LatLon], max: usize) -> usize {
    let limit = max.min(tail.len()).min(head.len());
    (1..=limit)
        .rev()
        .find(|&k| tail[tail.len() - k..] == head[..k])
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(range: Range<usize>) -> Vec<LatLon> {
        range.map(|i| (i as f64, 0.0)).collect()
    }

    #[test]
    fn test_windows_cover_the_whole_path() {
        assert_eq!(chunk_windows(11, 6, 2), vec![0..6, 4..10, 8..11]);
        assert_eq!(chunk_windows(10, 6, 2), vec![0..6, 4..10]);
        assert_eq!(chunk_windows(12, 10, 5), vec![0..10, 5..12]);
    }

    #[test]
    fn test_windows_short_path_is_single_window() {
        assert_eq!(chunk_windows(4, 6, 2), vec![0..4]);
        assert!(chunk_windows(0, 6, 2).is_empty());
    }

    #[test]
    fn test_stitch_drops_half_the_overlap_from_matched_geometry() {
        let mut combined = vec![(0.1, 0.0), (0.2, 0.0)];
        let chunk = vec![(10.0, 0.0), (10.1, 0.0), (10.2, 0.0)];

        stitch(&mut combined, &chunk, 2);

        assert_eq!(combined, vec![(0.1, 0.0), (0.2, 0.0), (10.1, 0.0), (10.2, 0.0)]);
    }

    #[test]
    fn test_stitch_raw_fallback_leaves_no_duplicates() {
        // overlap 5: windows 0..10 and 5..15, both unmatched
        let mut combined = pts(0..10);
        stitch(&mut combined, &pts(5..15), 5);
        assert_eq!(combined, pts(0..15));

        // overlap 2: windows 0..6 and 4..10
        let mut combined = pts(0..6);
        stitch(&mut combined, &pts(4..10), 2);
        assert_eq!(combined, pts(0..10));
    }

    #[test]
    fn test_stitch_collapses_a_repeated_road_vertex() {
        // both matched windows end and start on the same intersection
        let corner = (45.5012, -73.5701);
        let mut combined = vec![(45.5000, -73.5700), corner];
        let chunk = vec![(45.5006, -73.5700), corner, (45.5020, -73.5690)];

        stitch(&mut combined, &chunk, 2);

        assert_eq!(combined, vec![(45.5000, -73.5700), corner, (45.5020, -73.5690)]);
    }

    #[test]
    fn test_stitch_tolerates_tiny_chunks() {
        let mut combined = pts(0..3);
        stitch(&mut combined, &[(99.0, 0.0)], 5);
        assert_eq!(combined, pts(0..3));
    }
}
