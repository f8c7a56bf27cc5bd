use crate::all::*;

pub const BLOCK_FACTOR: usize = 15;
pub const MIN_BLOCK_SIZE: usize = 31;
pub const SEARCH_FACTOR: f64 = 4.;
pub const SIMILARITY_THRESHOLD: f64 = 0.5;
pub const SCORE_THRESHOLD: f64 = 0.85;
pub const ANCHOR_THRESHOLD: f64 = 0.97;
pub const TEMPLATE_KEEP_THRESHOLD: f64 = 0.95;
pub const FORECAST_WEIGHT: f64 = 0.25;
// Diagonal of a 40x40 box.
pub const MAX_FORECAST_DISTANCE: f64 = 40. * std::f64::consts::SQRT_2;
pub const NMS_RADIUS: usize = 2;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[derive(clap::Parser)]
#[serde(default)]
pub struct Parameters {
  // Block sizing, fixed per track from the seed frame dimensions.
  #[clap(long, default_value_t = BLOCK_FACTOR)]
  pub block_factor: usize,
  #[clap(long, default_value_t = MIN_BLOCK_SIZE)]
  pub min_block_size: usize,
  #[clap(long, default_value_t = SEARCH_FACTOR)]
  pub search_factor: f64,

  // Matching.
  #[clap(long, arg_enum, default_value = "integral")]
  pub matcher: MatcherKind,
  #[clap(long)]
  pub color_matching: bool,
  #[clap(long, default_value_t = NMS_RADIUS)]
  pub nms_radius: usize,
  #[clap(long, default_value_t = SIMILARITY_THRESHOLD)]
  pub similarity_threshold: f64,

  // Scoring and template update.
  #[clap(long, default_value_t = SCORE_THRESHOLD)]
  pub score_threshold: f64,
  #[clap(long, arg_enum, default_value = "hybrid")]
  pub update_strategy: UpdateStrategy,
  #[clap(long, default_value_t = ANCHOR_THRESHOLD)]
  pub anchor_threshold: f64,
  #[clap(long, default_value_t = TEMPLATE_KEEP_THRESHOLD)]
  pub template_keep_threshold: f64,
  #[clap(long)]
  pub disable_forecast: bool,
  #[clap(long, default_value_t = FORECAST_WEIGHT)]
  pub forecast_weight: f64,
  #[clap(long, default_value_t = MAX_FORECAST_DISTANCE)]
  pub max_forecast_distance: f64,
}

impl Default for Parameters {
  fn default() -> Parameters {
    Parameters {
      block_factor: BLOCK_FACTOR,
      min_block_size: MIN_BLOCK_SIZE,
      search_factor: SEARCH_FACTOR,
      matcher: MatcherKind::Integral,
      color_matching: false,
      nms_radius: NMS_RADIUS,
      similarity_threshold: SIMILARITY_THRESHOLD,
      score_threshold: SCORE_THRESHOLD,
      update_strategy: UpdateStrategy::Hybrid,
      anchor_threshold: ANCHOR_THRESHOLD,
      template_keep_threshold: TEMPLATE_KEEP_THRESHOLD,
      disable_forecast: false,
      forecast_weight: FORECAST_WEIGHT,
      max_forecast_distance: MAX_FORECAST_DISTANCE,
    }
  }
}

impl Parameters {
  pub fn from_json(json: &str) -> Result<Parameters> {
    let p: Parameters = serde_json::from_str(json)?;
    p.validate()?;
    Ok(p)
  }

  pub fn validate(&self) -> Result<()> {
    let fail = |s: String| Err(TrackError::InvalidParameters(s));
    if self.block_factor == 0 {
      return fail("block_factor must be positive.".to_string());
    }
    if self.min_block_size < 3 {
      return fail(format!("min_block_size {} is below 3.", self.min_block_size));
    }
    if !(self.search_factor >= 1.) {
      return fail(format!("search_factor {} is below 1.", self.search_factor));
    }
    let unit = [
      ("similarity_threshold", self.similarity_threshold),
      ("score_threshold", self.score_threshold),
      ("anchor_threshold", self.anchor_threshold),
      ("template_keep_threshold", self.template_keep_threshold),
      ("forecast_weight", self.forecast_weight),
    ];
    for (name, v) in unit {
      if !(0. ..= 1.).contains(&v) {
        return fail(format!("{} {} is outside [0, 1].", name, v));
      }
    }
    if !(self.max_forecast_distance > 0.) {
      return fail(format!("max_forecast_distance {} must be positive.", self.max_forecast_distance));
    }
    Ok(())
  }
}

// Template and search window sizes of one track. Both are odd so that the
// tracked pixel is the exact middle of the blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGeometry {
  pub block: [usize; 2],
  pub search: [usize; 2],
}

impl BlockGeometry {
  pub fn new(width: usize, height: usize, p: &Parameters) -> BlockGeometry {
    let mut block = [0; 2];
    let mut search = [0; 2];
    for (i, dim) in [width, height].into_iter().enumerate() {
      block[i] = (dim / p.block_factor).max(p.min_block_size) | 1;
      search[i] = (block[i] as f64 * p.search_factor).round() as usize | 1;
    }
    BlockGeometry { block, search }
  }

  pub fn block_rect(&self, center: Pixel) -> Rect {
    Rect::centered(center, self.block[0], self.block[1])
  }

  pub fn search_rect(&self, center: Pixel) -> Rect {
    Rect::centered(center, self.search[0], self.search[1])
  }
}
