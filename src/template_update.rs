use crate::all::*;

// How the block stored in a newly matched point is chosen. Keeping the
// original block never drifts but breaks on any appearance change, refreshing
// it every frame adapts but slowly drifts off the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ArgEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
  // Always the block of the last user-placed point.
  Fixed,
  // Always the block around the new match.
  Rolling,
  // Rolling, but the user-placed block is searched first with a stricter
  // threshold and wins when found, which pulls the track back on target.
  Hybrid,
  // Even blend of the user-placed block and the block around the new match.
  Mixed,
}

// What to store as the template of the next point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateDecision {
  KeepPrevious,
  Anchor,
  Extract,
  Blend,
}

// Weighted average of appearance similarity and closeness to the motion
// forecast. Past `max_distance` only similarity counts, since a large jump is
// usually the user having moved the point on purpose.
pub fn fused_score(similarity: f64, distance: f64, weight: f64, max_distance: f64) -> f64 {
  if distance > max_distance || max_distance <= 0. {
    return similarity;
  }
  let closeness = 1. - distance / max_distance;
  (1. - weight) * similarity + weight * closeness
}

// Index of the most recent user-placed point, 0 if there is none.
pub fn anchor_index(points: &[TrackPoint]) -> usize {
  points.iter().rposition(|p| p.is_reference()).unwrap_or(0)
}

#[derive(Clone, Debug)]
pub struct TemplatePolicy {
  pub strategy: UpdateStrategy,
  pub score_threshold: f64,
  pub keep_threshold: f64,
  pub forecast_weight: f64,
  pub max_forecast_distance: f64,
  pub use_forecast: bool,
}

impl TemplatePolicy {
  pub fn new(p: &Parameters) -> TemplatePolicy {
    TemplatePolicy {
      strategy: p.update_strategy,
      score_threshold: p.score_threshold,
      keep_threshold: p.template_keep_threshold,
      forecast_weight: p.forecast_weight,
      max_forecast_distance: p.max_forecast_distance,
      use_forecast: !p.disable_forecast,
    }
  }

  pub fn score(&self, similarity: f64, distance_to_forecast: f64) -> f64 {
    if !self.use_forecast { return similarity }
    fused_score(similarity, distance_to_forecast, self.forecast_weight, self.max_forecast_distance)
  }

  // The very first step has no motion history to judge drift against, so any
  // candidate is taken.
  pub fn accept(&self, score: f64, first_step: bool) -> bool {
    score >= self.score_threshold || first_step
  }

  // `anchored` means the match came from the user-placed block, in which case
  // `similarity` says nothing about the previous template.
  pub fn decide(&self, similarity: f64, anchored: bool) -> TemplateDecision {
    match self.strategy {
      UpdateStrategy::Fixed => TemplateDecision::Anchor,
      UpdateStrategy::Mixed => TemplateDecision::Blend,
      UpdateStrategy::Rolling | UpdateStrategy::Hybrid => {
        if !anchored && similarity > self.keep_threshold {
          TemplateDecision::KeepPrevious
        }
        else {
          TemplateDecision::Extract
        }
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fused_score() {
    let max = 40. * 2f64.sqrt();
    assert_eq!(fused_score(0.9, 0., 0.25, max), 0.75 * 0.9 + 0.25);
    assert!((fused_score(1., max / 2., 0.25, max) - 0.875).abs() < 1e-12);
    assert_eq!(fused_score(0.9, max, 0.25, max), 0.75 * 0.9);
    // Past the cap the forecast term is dropped instead of penalizing.
    assert_eq!(fused_score(0.9, max + 1., 0.25, max), 0.9);
  }

  #[test]
  fn test_anchor_index() {
    let tpl = || Image::new(3, 3, 3);
    let points = vec![
      TrackPoint::new(Pixel::new(0, 0), 0, tpl(), true, 1.),
      TrackPoint::new(Pixel::new(1, 0), 1, tpl(), false, 0.9),
      TrackPoint::new(Pixel::new(2, 0), 2, tpl(), true, 1.),
      TrackPoint::new(Pixel::new(3, 0), 3, tpl(), false, 0.9),
    ];
    assert_eq!(anchor_index(&points), 2);
    assert_eq!(anchor_index(&points[..2]), 0);
    assert_eq!(anchor_index(&[TrackPoint::orphan(Pixel::new(0, 0), 0)]), 0);
  }

  #[test]
  fn test_decide() {
    let mut p = Parameters::default();
    let policy = TemplatePolicy::new(&p);
    assert_eq!(policy.strategy, UpdateStrategy::Hybrid);
    assert_eq!(policy.decide(0.99, false), TemplateDecision::KeepPrevious);
    assert_eq!(policy.decide(0.99, true), TemplateDecision::Extract);
    assert_eq!(policy.decide(0.90, false), TemplateDecision::Extract);

    p.update_strategy = UpdateStrategy::Fixed;
    assert_eq!(TemplatePolicy::new(&p).decide(0.5, false), TemplateDecision::Anchor);
    p.update_strategy = UpdateStrategy::Mixed;
    assert_eq!(TemplatePolicy::new(&p).decide(0.5, false), TemplateDecision::Blend);
  }

  #[test]
  fn test_accept() {
    let mut p = Parameters::default();
    let policy = TemplatePolicy::new(&p);
    assert!(policy.accept(0.85, false));
    assert!(!policy.accept(0.84, false));
    assert!(policy.accept(0.1, true));

    p.disable_forecast = true;
    let policy = TemplatePolicy::new(&p);
    assert_eq!(policy.score(0.7, 0.), 0.7);
  }
}
