// Seeding policies used before the surrogate can be fit
//
// Two variants:
// 1. Fixed: one anchor per band (or the configured anchor in single mode),
//    returned by `CurveFitter::next_query` while fewer than two points exist.
// 2. Quasi-random: a separated schedule of seed frequencies that a test
//    session walks through before the first fit.
//
// The quasi-random sampler is bounded. Once `max_attempts` draws are spent
// without filling the schedule, the random picks are discarded and the seeds
// are laid out evenly on both sides of the anchor. That layout keeps the
// requested separation whenever `(count + 1) * separation` fits in the range;
// only when it does not is the separation halved until the seeds fit.

use rand::Rng;

use super::acquisition::BandPoint;
use super::bands::BandLayout;
use super::observation::{to_hz, to_log};

/// Distances below this count as the same frequency
const SAME_POINT_TOLERANCE: f64 = 1e-9;

/// One fixed anchor per band: the configured anchor in single mode,
/// otherwise each band's geometric centre
pub fn fixed_seeds(layout: &BandLayout, anchor_hz: f64) -> Vec<BandPoint> {
    if layout.is_stratified() {
        layout
            .bands()
            .iter()
            .map(|band| BandPoint::new(band.name.clone(), band.center_hz()))
            .collect()
    } else {
        layout
            .bands()
            .iter()
            .map(|band| BandPoint::new(band.name.clone(), anchor_hz))
            .collect()
    }
}

/// Parameters of a quasi-random seed schedule
#[derive(Debug, Clone)]
pub struct SeedRequest {
    /// Frequency already measured (the root); never returned
    pub anchor_hz: f64,
    /// Number of seed frequencies to produce
    pub count: usize,
    /// Minimum pairwise log10 distance
    pub separation: f64,
    /// Random draws allowed before falling back to the grid scan
    pub max_attempts: usize,
}

fn is_separated(candidate: f64, accepted: &[f64], anchor: f64, separation: f64) -> bool {
    let min_gap = separation.max(SAME_POINT_TOLERANCE);
    (candidate - anchor).abs() >= min_gap && accepted.iter().all(|a| (candidate - a).abs() >= min_gap)
}

/// Draw `count` separated seed frequencies in `layout`'s range
///
/// Returns Hz values sorted ascending, none equal to the anchor.
pub fn quasi_random_schedule<R: Rng + ?Sized>(
    request: &SeedRequest,
    layout: &BandLayout,
    rng: &mut R,
) -> Vec<f64> {
    let (lo, hi) = (layout.log_min(), layout.log_max());
    let anchor = to_log(request.anchor_hz);
    let mut picks: Vec<f64> = Vec::with_capacity(request.count);

    let mut attempts = 0;
    while picks.len() < request.count && attempts < request.max_attempts {
        attempts += 1;
        let candidate = rng.gen_range(lo..hi);
        if is_separated(candidate, &picks, anchor, request.separation) {
            picks.push(candidate);
        }
    }

    if picks.len() < request.count {
        log::warn!(
            "[Seeding] Accepted {}/{} seeds after {} draws; spacing seeds evenly instead",
            picks.len(),
            request.count,
            attempts
        );
        picks = evenly_spaced(request, anchor, lo, hi);
    }

    picks.sort_by(f64::total_cmp);
    picks.into_iter().map(to_hz).collect()
}

/// Closed log-frequency interval whose points all clear the anchor
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: f64,
    end: f64,
}

impl Segment {
    fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Points that fit at `separation` spacing, endpoints included
    fn capacity(&self, separation: f64) -> usize {
        (self.length() / separation).floor() as usize + 1
    }

    /// `k` points from `start` to `end`; a single point sits in the middle
    fn place(self, k: usize, lo: f64, hi: f64) -> impl Iterator<Item = f64> {
        let step = if k > 1 {
            self.length() / (k - 1) as f64
        } else {
            0.0
        };
        let first = if k == 1 {
            self.start + 0.5 * self.length()
        } else {
            self.start
        };
        (0..k).map(move |j| (first + j as f64 * step).clamp(lo, hi))
    }
}

/// The parts of `[lo, hi]` at least `separation` away from the anchor
fn segments_around(anchor: f64, separation: f64, lo: f64, hi: f64) -> Vec<Segment> {
    let below = Segment {
        start: lo,
        end: (anchor - separation).min(hi),
    };
    let above = Segment {
        start: (anchor + separation).max(lo),
        end: hi,
    };
    [below, above]
        .into_iter()
        .filter(|segment| segment.length() >= 0.0)
        .collect()
}

/// Split `count` seeds between segments in proportion to their length,
/// never exceeding a segment's capacity
fn allocate(segments: &[Segment], count: usize, separation: f64) -> Option<Vec<usize>> {
    let capacities: Vec<usize> = segments.iter().map(|s| s.capacity(separation)).collect();
    if capacities.iter().sum::<usize>() < count {
        return None;
    }

    match segments {
        [only] => Some(vec![count.min(only.capacity(separation))]),
        [below, above] => {
            let weight_below = below.length() + separation;
            let weight_above = above.length() + separation;
            let share = count as f64 * weight_below / (weight_below + weight_above);
            let mut k_below = (share.round() as usize).min(capacities[0]).min(count);
            if count - k_below > capacities[1] {
                k_below = count - capacities[1];
            }
            Some(vec![k_below, count - k_below])
        }
        _ => None,
    }
}

fn evenly_spaced(request: &SeedRequest, anchor: f64, lo: f64, hi: f64) -> Vec<f64> {
    if request.count == 0 {
        return Vec::new();
    }
    let mut separation = request.separation.max(SAME_POINT_TOLERANCE);

    loop {
        let segments = segments_around(anchor, separation, lo, hi);
        if let Some(counts) = allocate(&segments, request.count, separation) {
            if separation < request.separation {
                log::warn!(
                    "[Seeding] {} seeds do not fit at separation {}; using {:.4}",
                    request.count,
                    request.separation,
                    separation
                );
            }
            return segments
                .iter()
                .zip(counts)
                .flat_map(|(segment, k)| segment.place(k, lo, hi))
                .collect();
        }
        separation *= 0.5;
    }
}
