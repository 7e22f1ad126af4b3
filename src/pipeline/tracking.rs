use crate::shapes::region::{IouMode, Region};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    NeedsDetector,
    Tracking,
}

/// Regions carried from one frame to the next, one per subject.
#[derive(Debug, Clone, Default)]
pub struct TrackingState {
    regions: Vec<Region>,
    frames_since_detector: usize,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn frames_since_detector(&self) -> usize {
        self.frames_since_detector
    }

    /// The detector runs when a subject is missing or tracking has gone
    /// `max_continuous_checks` frames without it.
    pub fn phase(&self, max_subjects: usize, max_continuous_checks: Option<usize>) -> TrackingPhase {
        let stale = max_continuous_checks.is_some_and(|max| self.frames_since_detector >= max);

        if self.regions.len() != max_subjects || stale {
            TrackingPhase::NeedsDetector
        } else {
            TrackingPhase::Tracking
        }
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.frames_since_detector = 0;
    }

    /// Unconditional replacement after a detector run.
    pub fn replace(&mut self, regions: Vec<Region>) {
        self.regions = regions;
        self.frames_since_detector = 0;
    }

    pub fn skip_detector(&mut self) {
        self.frames_since_detector += 1;
    }

    /// Stores the regions for the next frame, keeping the counter.
    pub fn update(&mut self, regions: Vec<Region>) {
        self.regions = regions;
    }
}

/// Keeps `tracked` when `candidate` overlaps it by more than `threshold`,
/// which damps frame to frame jitter in the crop window.
pub fn stabilize(tracked: &Region, candidate: Region, threshold: f64, mode: IouMode) -> Region {
    let iou = tracked.iou(&candidate, mode);
    trace!("Candidate region IoU {iou:.3}");

    if iou > threshold {
        tracked.clone()
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::point::Point;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
        Region::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    #[test]
    fn test_empty_state_needs_detector() {
        let state = TrackingState::new();
        assert_eq!(state.phase(1, None), TrackingPhase::NeedsDetector);
    }

    #[test]
    fn test_tracking_without_budget() {
        let mut state = TrackingState::new();
        state.replace(vec![rect(0., 0., 1., 1.)]);
        for _ in 0..1000 {
            assert_eq!(state.phase(1, None), TrackingPhase::Tracking);
            state.skip_detector();
        }
        assert_eq!(state.frames_since_detector(), 1000);
    }

    #[test]
    fn test_budget_forces_detector() {
        let mut state = TrackingState::new();
        state.replace(vec![rect(0., 0., 1., 1.)]);

        for _ in 0..3 {
            assert_eq!(state.phase(1, Some(3)), TrackingPhase::Tracking);
            state.skip_detector();
        }
        assert_eq!(state.phase(1, Some(3)), TrackingPhase::NeedsDetector);

        state.replace(vec![rect(0., 0., 1., 1.)]);
        assert_eq!(state.frames_since_detector(), 0);
        assert_eq!(state.phase(1, Some(3)), TrackingPhase::Tracking);
    }

    #[test]
    fn test_missing_subject_needs_detector() {
        let mut state = TrackingState::new();
        state.replace(vec![rect(0., 0., 1., 1.)]);
        assert_eq!(state.phase(2, None), TrackingPhase::NeedsDetector);
        assert_eq!(state.phase(1, None), TrackingPhase::Tracking);
    }

    #[test]
    fn test_clear() {
        let mut state = TrackingState::new();
        state.replace(vec![rect(0., 0., 1., 1.)]);
        state.skip_detector();
        state.clear();
        assert!(state.regions().is_empty());
        assert_eq!(state.frames_since_detector(), 0);
    }

    #[test]
    fn test_stabilize_keeps_close_region() {
        let tracked = rect(0., 0., 100., 100.).with_keypoints(vec![Point::new(50., 50.)]);
        let candidate = rect(0., 0., 100., 90.);

        let kept = stabilize(&tracked, candidate, 0.8, IouMode::Clamped);
        assert_eq!(kept, tracked);
    }

    #[test]
    fn test_stabilize_accepts_moved_region() {
        let tracked = rect(0., 0., 100., 100.);
        let candidate = rect(0., 0., 100., 50.);

        let kept = stabilize(&tracked, candidate.clone(), 0.8, IouMode::Clamped);
        assert_eq!(kept, candidate);
    }

    #[test]
    fn test_stabilize_disjoint_modes() {
        let tracked = rect(0., 0., 10., 10.);
        let far = rect(20., 20., 30., 30.);

        assert_eq!(stabilize(&tracked, far.clone(), 0.8, IouMode::Clamped), far);
        // the unclamped product scores this pair a perfect match
        assert_eq!(stabilize(&tracked, far, 0.8, IouMode::Reference), tracked);
    }
}
