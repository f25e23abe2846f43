//! Resampling kernels
//!
//! Numeric channels recorded at a coarser period than the file's reference
//! clock are replicated onto the reference grid. Text channels arrive as
//! sparse transitions and are expanded into one value per frame. Either
//! result can then be decimated to a caller-requested timebase.

use crate::types::TextEvent;

/// Relative tolerance used when comparing clock periods
pub const CLOCK_TOLERANCE: f64 = 1e-6;

/// How many reference frames one native sample covers
///
/// Returns `None` when the native clock is finer than the reference clock
/// or not an integer multiple of it; such channels cannot be aligned by
/// replication.
pub fn replication_factor(native: f64, reference: f64) -> Option<usize> {
    if native <= 0.0 || reference <= 0.0 {
        return None;
    }
    let ratio = native / reference;
    let rounded = ratio.round();
    if rounded < 1.0 || (ratio - rounded).abs() > CLOCK_TOLERANCE * rounded {
        return None;
    }
    Some(rounded as usize)
}

/// Repeat every sample `factor` times
pub fn upsample<T: Clone>(values: &[T], factor: usize) -> Vec<T> {
    if factor <= 1 {
        return values.to_vec();
    }
    let mut out = Vec::with_capacity(values.len() * factor);
    for v in values {
        out.extend(std::iter::repeat(v).take(factor).cloned());
    }
    out
}

/// Frame index at which a transition `offset` seconds into the file lands
fn frame_index(offset: f64, clock: f64) -> usize {
    if offset <= 0.0 {
        return 0;
    }
    // Guard against 0.3 / 0.1 == 2.9999999999999996
    ((offset / clock) + CLOCK_TOLERANCE).floor() as usize
}

/// Expand sparse text transitions into `frames` dense values
///
/// Each value holds from its transition frame until the next transition;
/// the last one extends to the end. Frames before the first transition are
/// empty strings.
pub fn expand_text(events: &[TextEvent], clock: f64, frames: usize) -> Vec<String> {
    let mut dense = vec![String::new(); frames];

    let mut ordered: Vec<&TextEvent> = events.iter().collect();
    ordered.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    for (i, event) in ordered.iter().enumerate() {
        let start = frame_index(event.offset, clock).min(frames);
        let end = ordered
            .get(i + 1)
            .map(|next| frame_index(next.offset, clock).min(frames))
            .unwrap_or(frames);
        for slot in dense.iter_mut().take(end).skip(start) {
            slot.clone_from(&event.value);
        }
    }

    dense
}

/// Sample step that turns the reference clock into `tbase`
///
/// A `tbase` of zero keeps the reference clock.
pub fn decimation_step(tbase: f64, clock: f64) -> usize {
    if tbase <= 0.0 || clock <= 0.0 {
        return 1;
    }
    ((tbase / clock).round() as usize).max(1)
}

/// Keep every `step`-th sample, starting with the first
pub fn decimate<T>(values: Vec<T>, step: usize) -> Vec<T> {
    if step <= 1 {
        return values;
    }
    values.into_iter().step_by(step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replication_factor() {
        assert_eq!(replication_factor(0.002, 0.001), Some(2));
        assert_eq!(replication_factor(0.001, 0.001), Some(1));
        assert_eq!(replication_factor(0.1, 0.001), Some(100));
        assert_eq!(replication_factor(0.0005, 0.001), None);
        assert_eq!(replication_factor(0.0015, 0.001), None);
        assert_eq!(replication_factor(0.0, 0.001), None);
    }

    #[test]
    fn test_upsample_twice() {
        assert_eq!(upsample(&[1.0, 2.0, 3.0], 2), vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(upsample(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_expand_text_holds_values() {
        let events = vec![TextEvent::new(0.0, "A"), TextEvent::new(5.0, "B")];
        assert_eq!(
            expand_text(&events, 1.0, 8),
            vec!["A", "A", "A", "A", "A", "B", "B", "B"]
        );
    }

    #[test]
    fn test_expand_text_edges() {
        // Leading gap, unordered input, transition past the end
        let events = vec![
            TextEvent::new(0.3, "late"),
            TextEvent::new(0.1, "early"),
            TextEvent::new(9.0, "never"),
        ];
        assert_eq!(
            expand_text(&events, 0.1, 5),
            vec!["", "early", "early", "late", "late"]
        );
        assert!(expand_text(&[], 0.1, 3).iter().all(String::is_empty));
    }

    #[test]
    fn test_decimation_step() {
        assert_eq!(decimation_step(0.0, 0.001), 1);
        assert_eq!(decimation_step(0.01, 0.001), 10);
        assert_eq!(decimation_step(0.0004, 0.001), 1);
        assert_eq!(decimate(vec![0, 1, 2, 3, 4], 2), vec![0, 2, 4]);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_decimated_length(
            len in 0usize..500,
            step in 1usize..20,
        ) {
            let values: Vec<usize> = (0..len).collect();
            let out = decimate(values, step);
            prop_assert_eq!(out.len(), len.div_ceil(step));
            for (i, v) in out.iter().enumerate() {
                prop_assert_eq!(*v, i * step);
            }
        }

        #[test]
        fn test_upsample_replicates_each_sample(
            values in prop::collection::vec(-1000.0f64..1000.0, 0..100),
            factor in 1usize..8,
        ) {
            let out = upsample(&values, factor);
            prop_assert_eq!(out.len(), values.len() * factor);
            for (i, v) in out.iter().enumerate() {
                prop_assert_eq!(*v, values[i / factor]);
            }
        }

        #[test]
        fn test_expanded_text_length(
            offsets in prop::collection::vec(0.0f64..20.0, 0..10),
            frames in 0usize..50,
        ) {
            let events: Vec<_> = offsets.iter().map(|&o| TextEvent::new(o, "x")).collect();
            prop_assert_eq!(expand_text(&events, 0.5, frames).len(), frames);
        }
    }
}
