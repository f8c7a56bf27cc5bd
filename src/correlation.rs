// Template matching by zero-mean normalized cross-correlation:
//
//   score = Σ (I - Ī)(T - T̄) / sqrt(Σ (I - Ī)² · Σ (T - T̄)²)
//
// summed over every byte (all channels) of a template-sized candidate window.
// It is invariant to uniform brightness and contrast changes. Negative
// correlation is reported as 0 so scores are always in [0, 1].

use crate::all::*;

// Deviation sums at or below this mean the block is flat.
const FLAT_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ArgEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
  // Direct evaluation of the formula at every candidate.
  Exhaustive,
  // Candidate means and variances read from summed-area tables.
  Integral,
}

// Checked once per search row, so a frame can be abandoned mid-search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> CancelToken {
    CancelToken::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn reset(&self) {
    self.0.store(false, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
  // Candidate window in image coordinates.
  pub rect: Rect,
  pub similarity: f64,
}

impl TemplateMatch {
  pub fn center(&self) -> Pixel {
    self.rect.center()
  }
}

// Score of every candidate position. Candidate (x, y) is the window whose
// top-left corner is at `origin + (x, y)` in the image.
#[derive(Clone, Debug)]
pub struct SimilarityMap {
  pub origin: Pixel,
  pub width: usize,
  pub height: usize,
  pub template_width: usize,
  pub template_height: usize,
  pub values: Vec<f32>,
}

impl SimilarityMap {
  fn new(origin: Pixel, width: usize, height: usize, template: &Image) -> SimilarityMap {
    SimilarityMap {
      origin,
      width,
      height,
      template_width: template.width,
      template_height: template.height,
      values: vec![0.; width * height],
    }
  }

  pub fn empty(template: &Image) -> SimilarityMap {
    SimilarityMap::new(Pixel::zeros(), 0, 0, template)
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  #[inline(always)]
  pub fn value(&self, x: usize, y: usize) -> f32 {
    self.values[y * self.width + x]
  }

  fn candidate(&self, x: usize, y: usize) -> TemplateMatch {
    TemplateMatch {
      rect: Rect::new(
        self.origin[0] + x as i32,
        self.origin[1] + y as i32,
        self.template_width as i32,
        self.template_height as i32,
      ),
      similarity: self.value(x, y) as f64,
    }
  }

  // Highest score, the first one in row-major order on ties.
  pub fn best(&self) -> Option<TemplateMatch> {
    let mut best: Option<(usize, usize)> = None;
    for y in 0..self.height {
      for x in 0..self.width {
        match best {
          Some((bx, by)) if self.value(bx, by) >= self.value(x, y) => {},
          _ => best = Some((x, y)),
        }
      }
    }
    best.map(|(x, y)| self.candidate(x, y))
  }

  // Non-maximum suppression: keeps candidates scoring at least `threshold`
  // that have no strictly better neighbour within `radius`. Best first,
  // row-major order between equal scores.
  pub fn local_maxima(&self, threshold: f64, radius: usize) -> Vec<TemplateMatch> {
    let mut matches = vec![];
    let r = radius as i64;
    for y in 0..self.height {
      for x in 0..self.width {
        let v = self.value(x, y);
        if v <= 0. || (v as f64) < threshold { continue }
        let mut is_max = true;
        'window: for dy in -r..=r {
          let ny = y as i64 + dy;
          if ny < 0 || ny >= self.height as i64 { continue }
          for dx in -r..=r {
            let nx = x as i64 + dx;
            if nx < 0 || nx >= self.width as i64 { continue }
            if self.value(nx as usize, ny as usize) > v {
              is_max = false;
              break 'window;
            }
          }
        }
        if is_max {
          matches.push(self.candidate(x, y));
        }
      }
    }
    // Stable, so ties keep scan order.
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches
  }
}

pub trait TemplateMatcher: Send + Sync {
  fn kind(&self) -> MatcherKind;

  // `zone` is clipped to the image first. The map is empty if the template
  // does not fit inside the clipped zone.
  fn similarity_map(
    &self,
    image: &Image,
    zone: &Rect,
    template: &Image,
    cancel: &CancelToken,
  ) -> Result<SimilarityMap>;
}

pub fn new_matcher(kind: MatcherKind) -> Box<dyn TemplateMatcher> {
  match kind {
    MatcherKind::Exhaustive => Box::new(ExhaustiveMatcher),
    MatcherKind::Integral => Box::new(IntegralMatcher),
  }
}

// Runs the matcher and keeps the local maxima above `threshold`.
pub fn find_matches(
  matcher: &dyn TemplateMatcher,
  image: &Image,
  zone: &Rect,
  template: &Image,
  threshold: f64,
  nms_radius: usize,
  cancel: &CancelToken,
) -> Result<Vec<TemplateMatch>> {
  let map = matcher.similarity_map(image, zone, template, cancel)?;
  Ok(map.local_maxima(threshold, nms_radius))
}

#[inline(always)]
fn correlation(cross: f64, candidate_deviation: f64, template_deviation: f64) -> f32 {
  if candidate_deviation <= FLAT_EPSILON || template_deviation <= FLAT_EPSILON {
    return 0.;
  }
  (cross / (candidate_deviation * template_deviation).sqrt()).clamp(0., 1.) as f32
}

// True when every byte of the block has the same value, so nothing can be
// matched against it.
pub fn is_flat(block: &Image) -> bool {
  let first = match (0..block.height).find_map(|y| block[y].first()) {
    Some(v) => *v,
    None => return true,
  };
  (0..block.height).all(|y| block[y].iter().all(|v| *v == first))
}

// Zero-mean copy of the template.
struct TemplateStats {
  values: Vec<f64>,
  row_bytes: usize,
  height: usize,
  // Σ (T - T̄)².
  deviation: f64,
}

impl TemplateStats {
  fn new(template: &Image) -> TemplateStats {
    let row_bytes = template.row_bytes();
    let mut values = Vec::with_capacity(row_bytes * template.height);
    let mut total = 0u64;
    for y in 0..template.height {
      for v in &template[y] {
        total += *v as u64;
        values.push(*v as f64);
      }
    }
    let mean = total as f64 / values.len() as f64;
    let mut deviation = 0.;
    for v in values.iter_mut() {
      *v -= mean;
      deviation += *v * *v;
    }
    if deviation <= FLAT_EPSILON {
      debug!("Flat {}x{} template, every candidate will score 0.", template.width, template.height);
    }
    TemplateStats { values, row_bytes, height: template.height, deviation }
  }

  #[inline(always)]
  fn row(&self, y: usize) -> &[f64] {
    &self.values[y * self.row_bytes .. (y + 1) * self.row_bytes]
  }

  fn len(&self) -> usize {
    self.values.len()
  }
}

// Clips the zone and checks the inputs agree. None if there is nothing to scan.
fn clip_zone(image: &Image, zone: &Rect, template: &Image) -> Result<Option<Rect>> {
  if image.channels != template.channels {
    return Err(TrackError::InvalidImage(format!(
      "Image has {} channels but the template has {}.", image.channels, template.channels)));
  }
  if template.is_empty() {
    return Err(TrackError::InvalidImage("Empty template.".to_string()));
  }
  let zone = match zone.intersect(&image.bounds()) {
    Some(zone) => zone,
    None => return Ok(None),
  };
  if template.width as i32 > zone.width || template.height as i32 > zone.height {
    return Ok(None);
  }
  Ok(Some(zone))
}

fn map_for_zone(zone: &Rect, template: &Image) -> SimilarityMap {
  SimilarityMap::new(
    Pixel::new(zone.x, zone.y),
    zone.width as usize - template.width + 1,
    zone.height as usize - template.height + 1,
    template,
  )
}

pub struct ExhaustiveMatcher;

impl TemplateMatcher for ExhaustiveMatcher {
  fn kind(&self) -> MatcherKind {
    MatcherKind::Exhaustive
  }

  fn similarity_map(
    &self,
    image: &Image,
    zone: &Rect,
    template: &Image,
    cancel: &CancelToken,
  ) -> Result<SimilarityMap> {
    let zone = match clip_zone(image, zone, template)? {
      Some(zone) => zone,
      None => return Ok(SimilarityMap::empty(template)),
    };
    let t = TemplateStats::new(template);
    let n = t.len() as f64;
    let mut map = map_for_zone(&zone, template);
    let c = image.channels;
    for y in 0..map.height {
      if cancel.is_cancelled() { return Err(TrackError::Cancelled) }
      let ay = zone.y as usize + y;
      for x in 0..map.width {
        let ax = (zone.x as usize + x) * c;

        let mut total = 0u64;
        for i in 0..t.height {
          total += image[ay + i][ax .. ax + t.row_bytes].iter().map(|v| *v as u64).sum::<u64>();
        }
        let mean = total as f64 / n;

        let mut cross = 0.;
        let mut deviation = 0.;
        for i in 0..t.height {
          let src = &image[ay + i][ax .. ax + t.row_bytes];
          for (s, tv) in src.iter().zip(t.row(i)) {
            let d = *s as f64 - mean;
            cross += d * tv;
            deviation += d * d;
          }
        }
        map.values[y * map.width + x] = correlation(cross, deviation, t.deviation);
      }
    }
    Ok(map)
  }
}

// Summed-area tables of pixel values and squared values over a zone, with a
// leading zero row and column.
struct SumTables {
  width: usize,
  sum: Vec<u64>,
  sum_sq: Vec<u64>,
}

impl SumTables {
  fn new(image: &Image, zone: &Rect) -> SumTables {
    let c = image.channels;
    let cols = zone.width as usize * c;
    let rows = zone.height as usize;
    let width = cols + 1;
    let mut sum = vec![0u64; (rows + 1) * width];
    let mut sum_sq = vec![0u64; (rows + 1) * width];
    let ax = zone.x as usize * c;
    for y in 0..rows {
      let row = &image[zone.y as usize + y][ax .. ax + cols];
      let mut acc = 0u64;
      let mut acc_sq = 0u64;
      for (x, v) in row.iter().enumerate() {
        let v = *v as u64;
        acc += v;
        acc_sq += v * v;
        sum[(y + 1) * width + x + 1] = sum[y * width + x + 1] + acc;
        sum_sq[(y + 1) * width + x + 1] = sum_sq[y * width + x + 1] + acc_sq;
      }
    }
    SumTables { width, sum, sum_sq }
  }

  #[inline(always)]
  fn window(&self, table: &[u64], x: usize, y: usize, w: usize, h: usize) -> u64 {
    let ww = self.width;
    table[(y + h) * ww + x + w] + table[y * ww + x] - table[y * ww + x + w] - table[(y + h) * ww + x]
  }
}

// Same scores as `ExhaustiveMatcher`, but the candidate statistics come from
// summed-area tables so only the cross term is accumulated per candidate.
pub struct IntegralMatcher;

impl TemplateMatcher for IntegralMatcher {
  fn kind(&self) -> MatcherKind {
    MatcherKind::Integral
  }

  fn similarity_map(
    &self,
    image: &Image,
    zone: &Rect,
    template: &Image,
    cancel: &CancelToken,
  ) -> Result<SimilarityMap> {
    let zone = match clip_zone(image, zone, template)? {
      Some(zone) => zone,
      None => return Ok(SimilarityMap::empty(template)),
    };
    let t = TemplateStats::new(template);
    let n = t.len() as f64;
    let tables = SumTables::new(image, &zone);
    let mut map = map_for_zone(&zone, template);
    let c = image.channels;
    for y in 0..map.height {
      if cancel.is_cancelled() { return Err(TrackError::Cancelled) }
      let ay = zone.y as usize + y;
      for x in 0..map.width {
        let bx = x * c;
        let total = tables.window(&tables.sum, bx, y, t.row_bytes, t.height) as f64;
        let total_sq = tables.window(&tables.sum_sq, bx, y, t.row_bytes, t.height) as f64;
        let deviation = total_sq - total * total / n;

        // The template is zero-mean, so the candidate mean drops out.
        let ax = (zone.x as usize + x) * c;
        let mut cross = 0.;
        for i in 0..t.height {
          let src = &image[ay + i][ax .. ax + t.row_bytes];
          for (s, tv) in src.iter().zip(t.row(i)) {
            cross += *s as f64 * tv;
          }
        }
        map.values[y * map.width + x] = correlation(cross, deviation, t.deviation);
      }
    }
    Ok(map)
  }
}
