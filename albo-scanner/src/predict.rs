use crate::config::ScanConfig;
use crate::reference::{ReferencePoint, ReferencePointStore};
use tracing::debug;

/// Keys-per-param slope assumed when only a single reference point exists
/// on the side being projected from.
const SINGLE_POINT_SLOPE: f64 = 2.0;

/// Proposes candidate starting keys for a param, best guess first.
///
/// Strategy order: exact lookup, interpolation between brackets,
/// extrapolation from the nearest side, configured fallback list.
/// Candidates outside the sanity bound are dropped, never substituted.
pub struct CandidateGenerator<'a> {
    refs: &'a ReferencePointStore,
    config: &'a ScanConfig,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(refs: &'a ReferencePointStore, config: &'a ScanConfig) -> Self {
        Self { refs, config }
    }

    pub fn predict(&self, param: i64) -> Vec<i64> {
        let raw = if let Some(anchor) = self.refs.anchor_for(param) {
            vec![anchor]
        } else {
            match (self.refs.bracket_below(param), self.refs.bracket_above(param)) {
                (Some(lower), Some(upper)) => {
                    let estimate = interpolate(lower, upper, param);
                    vec![estimate - 1, estimate, estimate + 1]
                }
                (Some(_), None) => {
                    let estimate = project(&self.refs.anchors_below(param, 2), param);
                    vec![estimate - 1, estimate, estimate + 1]
                }
                (None, Some(_)) => {
                    let mut anchors = self.refs.anchors_above(param, 2);
                    // nearest last, matching anchors_below
                    anchors.reverse();
                    let estimate = project(&anchors, param);
                    vec![estimate - 1, estimate, estimate + 1]
                }
                (None, None) => {
                    debug!("no reference points, falling back to static key list");
                    self.config.fallback_keys.clone()
                }
            }
        };

        let mut candidates = Vec::new();
        for key in raw {
            if self.config.in_key_bounds(key) && !candidates.contains(&key) {
                candidates.push(key);
            }
            if candidates.len() == self.config.max_candidates {
                break;
            }
        }
        candidates
    }
}

fn interpolate(lower: ReferencePoint, upper: ReferencePoint, param: i64) -> i64 {
    let t = (param - lower.param) as f64 / (upper.param - lower.param) as f64;
    (lower.key as f64 + (upper.key - lower.key) as f64 * t).round() as i64
}

/// Linear projection from the anchors' slope; `anchors` holds one or two
/// points with the nearest to `param` last.
fn project(anchors: &[ReferencePoint], param: i64) -> i64 {
    let nearest = anchors[anchors.len() - 1];
    let slope = if anchors.len() >= 2 {
        let prev = anchors[anchors.len() - 2];
        (nearest.key - prev.key) as f64 / (nearest.param - prev.param) as f64
    } else {
        SINGLE_POINT_SLOPE
    };
    (nearest.key as f64 + slope * (param - nearest.param) as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanDirection;
    use std::time::Duration;

    fn config() -> ScanConfig {
        ScanConfig {
            base_url: "https://registry.example/getfile.aspx".to_string(),
            session_cookie: None,
            seeds: vec![],
            param_min: 0,
            param_max: 100,
            key_min: 0,
            key_max: 100_000,
            key_window: 50,
            concurrency: 10,
            probe_timeout: Duration::from_secs(3),
            gap_tolerance: 10,
            direction: ScanDirection::Descending,
            batch_pause: Duration::ZERO,
            max_candidates: 5,
            fallback_keys: vec![56609, 56500],
        }
    }

    #[test]
    fn exact_lookup_returns_only_the_known_anchor() {
        let refs = ReferencePointStore::with_seeds(&[ReferencePoint::new(15, 105)]);
        let cfg = config();
        let generator = CandidateGenerator::new(&refs, &cfg);
        assert_eq!(generator.predict(15), vec![105]);
    }

    #[test]
    fn interpolation_brackets_the_estimate() {
        let refs = ReferencePointStore::with_seeds(&[
            ReferencePoint::new(10, 100),
            ReferencePoint::new(20, 110),
        ]);
        let cfg = config();
        let generator = CandidateGenerator::new(&refs, &cfg);

        let candidates = generator.predict(15);
        assert!(candidates.contains(&105));
        assert_eq!(candidates, vec![104, 105, 106]);
    }

    #[test]
    fn extrapolation_uses_slope_of_two_nearest_points() {
        // slope 3 keys/param between (10,100) and (20,130)
        let refs = ReferencePointStore::with_seeds(&[
            ReferencePoint::new(10, 100),
            ReferencePoint::new(20, 130),
        ]);
        let cfg = config();
        let generator = CandidateGenerator::new(&refs, &cfg);

        let candidates = generator.predict(25);
        assert_eq!(candidates, vec![144, 145, 146]);
    }

    #[test]
    fn extrapolation_below_the_lowest_point() {
        let refs = ReferencePointStore::with_seeds(&[
            ReferencePoint::new(20, 130),
            ReferencePoint::new(30, 140),
        ]);
        let cfg = config();
        let generator = CandidateGenerator::new(&refs, &cfg);

        // slope 1, projected from (20,130) down to param 15
        let candidates = generator.predict(15);
        assert_eq!(candidates, vec![124, 125, 126]);
    }

    #[test]
    fn single_point_projection_uses_conservative_slope() {
        let refs = ReferencePointStore::with_seeds(&[ReferencePoint::new(50416, 56609)]);
        let cfg = config();
        let generator = CandidateGenerator::new(&refs, &cfg);

        let candidates = generator.predict(50418);
        assert_eq!(candidates, vec![56612, 56613, 56614]);
    }

    #[test]
    fn fallback_list_when_no_points_exist() {
        let refs = ReferencePointStore::new();
        let cfg = config();
        let generator = CandidateGenerator::new(&refs, &cfg);
        assert_eq!(generator.predict(42), vec![56609, 56500]);
    }

    #[test]
    fn out_of_bound_candidates_are_dropped_not_substituted() {
        let refs = ReferencePointStore::with_seeds(&[
            ReferencePoint::new(10, 100),
            ReferencePoint::new(20, 110),
        ]);
        let mut cfg = config();
        cfg.key_min = 106;
        let generator = CandidateGenerator::new(&refs, &cfg);

        // 104 and 105 fall below the sanity bound
        assert_eq!(generator.predict(15), vec![106]);
    }
}
