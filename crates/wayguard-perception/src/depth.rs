//! Depth resolution.
//!
//! The engine only consumes distances; raw sensor access lives with the
//! host.  Hosts plug their depth maps in as [`DepthSource`]s and the
//! [`TieredDepthResolver`] falls through them in priority order:
//!
//! 1. direct sensor depth sampled at the box centre,
//! 2. monocular depth estimation sampled the same way,
//! 3. a box-size heuristic `k / max((w + h) / 2, 0.05)` with a class
//!    dependent `k`.
//!
//! A tier that is missing, or returns a non-finite or non-positive value,
//! falls through to the next.

use tracing::{debug, trace};
use wayguard_types::{Candidate, NormalizedRect};

use crate::class::HazardClass;

/// Smallest average box side used by the size heuristic.
const MIN_HEURISTIC_BOX: f32 = 0.05;

/// A depth map that can be sampled at a normalised image point.
pub trait DepthSource: Send {
    /// Short identifier used in logs, e.g. `"lidar"`.
    fn name(&self) -> &str;

    /// Depth in metres at `(x, y)`, or `None` when no value is available.
    fn sample(&self, x: f32, y: f32) -> Option<f32>;
}

/// Anything that can put a distance on a box.
pub trait DepthResolver: Send {
    /// Distance in metres to the object in `bbox`, or `None` when unknown.
    fn distance(&self, bbox: &NormalizedRect, label: &str) -> Option<f32>;
}

/// Box-size distance heuristic used as the last tier.
pub fn heuristic_distance(bbox: &NormalizedRect, label: &str) -> f32 {
    let avg = (bbox.width + bbox.height) / 2.0;
    HazardClass::from_label(label).size_heuristic_k() / avg.max(MIN_HEURISTIC_BOX)
}

fn usable(d: Option<f32>) -> Option<f32> {
    d.filter(|d| d.is_finite() && *d > 0.0)
}

/// Sensor → monocular → heuristic resolver.
#[derive(Default)]
pub struct TieredDepthResolver {
    sensor: Option<Box<dyn DepthSource>>,
    monocular: Option<Box<dyn DepthSource>>,
}

impl TieredDepthResolver {
    /// A resolver with no depth maps; every lookup uses the heuristic.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensor(mut self, source: Box<dyn DepthSource>) -> Self {
        self.sensor = Some(source);
        self
    }

    pub fn with_monocular(mut self, source: Box<dyn DepthSource>) -> Self {
        self.monocular = Some(source);
        self
    }
}

impl DepthResolver for TieredDepthResolver {
    fn distance(&self, bbox: &NormalizedRect, label: &str) -> Option<f32> {
        let (cx, cy) = (bbox.mid_x(), bbox.mid_y());
        for source in [&self.sensor, &self.monocular].into_iter().flatten() {
            if let Some(d) = usable(source.sample(cx, cy)) {
                trace!(source = source.name(), label, distance = d, "depth resolved");
                return Some(d);
            }
        }
        usable(Some(heuristic_distance(bbox, label)))
    }
}

/// Fill in the distance of every candidate that does not already carry a
/// usable one.
///
/// Unresolvable or non-positive distances stay `None`.  A candidate whose
/// resolved distance is NaN/∞ is discarded.
pub fn resolve_distances(
    candidates: Vec<Candidate>,
    resolver: &dyn DepthResolver,
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter_map(|mut c| {
            if usable(c.distance).is_none() {
                c.distance = resolver
                    .distance(&c.bbox, &c.label)
                    .filter(|d| !d.is_finite() || *d > 0.0);
            }
            match c.validate() {
                Ok(()) => Some(c),
                Err(e) => {
                    debug!(error = %e, "dropping candidate after depth resolution");
                    None
                }
            }
        })
        .collect()
}
