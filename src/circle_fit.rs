use bevy::prelude::*;
use magpie_structures::WallSegment;

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Thresholds for reclassifying a closed wall chain as a circle. The defaults
/// are inherited behavior with no derivation behind them, so they stay
/// configurable rather than hard-coded.
#[derive(Resource, Clone, Copy, Debug)]
pub struct CircleFitParams {
    pub min_segments: usize,
    /// XZ tolerance for chain closure and endpoint sharing, in world units.
    pub closure_epsilon: f32,
    /// Maximum coefficient of variation (stdev/mean) of vertex radii.
    pub max_radius_cv: f32,
}

impl Default for CircleFitParams {
    fn default() -> Self {
        Self {
            min_segments: 10,
            closure_epsilon: 0.05,
            max_radius_cv: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// Chain partitioning
// ---------------------------------------------------------------------------

/// Inclusive segment-index range of one maximal contiguous chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChainSpan {
    pub first: usize,
    pub last: usize,
}

impl ChainSpan {
    pub fn segment_count(&self) -> usize {
        self.last - self.first + 1
    }
}

fn xz_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

/// Split a segment list into maximal chains: a chain breaks wherever two
/// consecutive segments do not share an endpoint (within `epsilon`, XZ only).
pub fn partition_chains(segments: &[WallSegment], epsilon: f32) -> Vec<ChainSpan> {
    let mut spans = Vec::new();
    if segments.is_empty() {
        return spans;
    }
    let mut first = 0;
    for i in 1..segments.len() {
        if xz_distance(segments[i - 1].end, segments[i].start) > epsilon {
            spans.push(ChainSpan { first, last: i - 1 });
            first = i;
        }
    }
    spans.push(ChainSpan {
        first,
        last: segments.len() - 1,
    });
    spans
}

/// Ordered perimeter vertices of a chain: every segment start, plus the final
/// end when the chain is open.
pub fn chain_vertices(segments: &[WallSegment], span: ChainSpan, epsilon: f32) -> Vec<Vec3> {
    let chain = &segments[span.first..=span.last];
    let mut vertices: Vec<Vec3> = chain.iter().map(|s| s.start).collect();
    let closed = xz_distance(chain[0].start, chain[chain.len() - 1].end) <= epsilon;
    if !closed {
        vertices.push(chain[chain.len() - 1].end);
    }
    vertices
}

// ---------------------------------------------------------------------------
// Circle classification
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CircleEstimate {
    pub center: Vec3,
    pub radius: f32,
}

/// Decide whether one chain approximates a circle, returning the estimated
/// center and mean radius. This is deliberately approximate: a false negative
/// just falls back to per-vertex editing, which is always safe.
pub fn classify_circle(
    segments: &[WallSegment],
    span: ChainSpan,
    params: &CircleFitParams,
) -> Option<CircleEstimate> {
    if span.segment_count() < params.min_segments {
        return None;
    }
    let chain = &segments[span.first..=span.last];
    let closed = xz_distance(chain[0].start, chain[chain.len() - 1].end) <= params.closure_epsilon;
    if !closed {
        return None;
    }

    let vertices: Vec<Vec3> = chain.iter().map(|s| s.start).collect();
    if vertices.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let center = vertices.iter().copied().sum::<Vec3>() / vertices.len() as f32;
    let radii: Vec<f32> = vertices.iter().map(|v| xz_distance(*v, center)).collect();
    let mean = radii.iter().sum::<f32>() / radii.len() as f32;
    if mean <= f32::EPSILON {
        return None;
    }
    let variance = radii.iter().map(|r| (r - mean) * (r - mean)).sum::<f32>() / radii.len() as f32;
    let cv = variance.sqrt() / mean;
    if cv > params.max_radius_cv {
        return None;
    }

    Some(CircleEstimate {
        center,
        radius: mean,
    })
}
