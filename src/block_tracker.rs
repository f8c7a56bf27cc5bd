use crate::all::*;

// Outcome of tracking one frame, next to the point it produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackStep {
  pub position: Pixel,
  // False when the fused score fell below the acceptance threshold or no
  // candidate was found at all. The point is created either way.
  pub matched: bool,
  // Fused score, or plain similarity when forecast weighting is off.
  pub score: f64,
  pub similarity: f64,
  // Found with the user-placed template rather than the rolling one.
  pub anchored: bool,
}

// The per-point half of tracking: capturing templates and finding a point
// again in the next frame. A `Track` owns one and keeps the history.
pub trait PointTracker: Send + Sync {
  fn geometry(&self) -> &BlockGeometry;

  fn parameters(&self) -> &Parameters;

  // Point placed by the user, with its template captured from `image`.
  fn create_point(&self, image: &Image, position: Pixel, t: i64) -> Result<TrackPoint>;

  fn create_orphan(&self, position: Pixel, t: i64) -> TrackPoint {
    TrackPoint::orphan(position, t)
  }

  // Finds the last point of `previous` in `image`. `previous` must not be
  // empty and its last point must have a template.
  fn track(
    &self,
    previous: &[TrackPoint],
    image: &Image,
    t: i64,
    cancel: &CancelToken,
  ) -> Result<(TrackPoint, TrackStep)>;

  fn diagnostics(&self, point: &TrackPoint) -> PointDiagnostics {
    let g = self.geometry();
    PointDiagnostics {
      position: point.position(),
      search_window: g.search_rect(point.position()),
      template: g.block_rect(point.position()),
      similarity: point.similarity(),
    }
  }
}

pub struct BlockTracker {
  parameters: Parameters,
  geometry: BlockGeometry,
  image_size: [usize; 2],
  matcher: Box<dyn TemplateMatcher>,
  policy: TemplatePolicy,
}

impl BlockTracker {
  // Block sizes are derived from the frame size here and never change.
  pub fn new(width: usize, height: usize, parameters: &Parameters) -> Result<BlockTracker> {
    parameters.validate()?;
    let geometry = BlockGeometry::new(width, height, parameters);
    debug!("Block tracker for {}x{} frames, block {:?}, search window {:?}.",
      width, height, geometry.block, geometry.search);
    Ok(BlockTracker {
      parameters: parameters.clone(),
      geometry,
      image_size: [width, height],
      matcher: new_matcher(parameters.matcher),
      policy: TemplatePolicy::new(parameters),
    })
  }

  fn check_image(&self, image: &Image) -> Result<()> {
    if image.width != self.image_size[0] || image.height != self.image_size[1] {
      return Err(TrackError::ImageSizeMismatch {
        width: image.width,
        height: image.height,
        expected_width: self.image_size[0],
        expected_height: self.image_size[1],
      });
    }
    Ok(())
  }

  // Frames and templates go through the same conversion.
  fn working_image<'a>(&self, image: &'a Image) -> Cow<'a, Image> {
    if self.parameters.color_matching || image.channels == 1 {
      Cow::Borrowed(image)
    }
    else {
      Cow::Owned(image.to_grayscale())
    }
  }

  fn search(
    &self,
    frame: &Image,
    zone: &Rect,
    template: &Image,
    threshold: f64,
    cancel: &CancelToken,
  ) -> Result<Vec<TemplateMatch>> {
    let template = self.working_image(template);
    find_matches(
      self.matcher.as_ref(),
      frame,
      zone,
      &template,
      threshold,
      self.parameters.nms_radius,
      cancel,
    )
  }

  // Highest fused score, ties going to the earlier, more similar candidate.
  fn pick(&self, matches: &[TemplateMatch], predicted: &Pixel) -> Option<(TemplateMatch, f64)> {
    let mut best: Option<(TemplateMatch, f64)> = None;
    for m in matches {
      let score = self.policy.score(m.similarity, pixel_distance(&m.center(), predicted));
      if best.map_or(true, |(_, s)| score > s) {
        best = Some((*m, score));
      }
    }
    best
  }

  fn next_template(
    &self,
    image: &Image,
    position: Pixel,
    similarity: f64,
    anchored: bool,
    previous: &Image,
    anchor: Option<&Image>,
  ) -> Image {
    let extract = || image.sub_image_clamped(&self.geometry.block_rect(position));
    match self.policy.decide(similarity, anchored) {
      TemplateDecision::KeepPrevious => previous.clone(),
      TemplateDecision::Anchor => anchor.cloned().unwrap_or_else(extract),
      TemplateDecision::Extract => extract(),
      TemplateDecision::Blend => match anchor {
        Some(anchor) => anchor.blend(&extract(), 0.5),
        None => extract(),
      },
    }
  }
}

impl PointTracker for BlockTracker {
  fn geometry(&self) -> &BlockGeometry {
    &self.geometry
  }

  fn parameters(&self) -> &Parameters {
    &self.parameters
  }

  fn create_point(&self, image: &Image, position: Pixel, t: i64) -> Result<TrackPoint> {
    self.check_image(image)?;
    let rect = self.geometry.block_rect(position);
    let template = image.sub_image(&rect)
      .ok_or(TrackError::UntrackableSeed { x: position[0], y: position[1] })?;
    if is_flat(&template) {
      warn!("Featureless block at ({}, {}), it cannot be matched.", position[0], position[1]);
    }
    Ok(TrackPoint::new(position, t, template, true, 1.))
  }

  fn track(
    &self,
    previous: &[TrackPoint],
    image: &Image,
    t: i64,
    cancel: &CancelToken,
  ) -> Result<(TrackPoint, TrackStep)> {
    let last_index = previous.len().checked_sub(1).ok_or(TrackError::EmptyTrack)?;
    let last = &previous[last_index];
    let template = last.template().ok_or(TrackError::OrphanPoint { index: last_index })?;
    self.check_image(image)?;

    let frame = self.working_image(image);
    let zone = self.geometry.search_rect(last.position());
    let predicted = forecast(previous).unwrap_or_else(|| last.position());
    let anchor = previous[anchor_index(previous)].template();

    let mut found = None;
    if self.policy.strategy == UpdateStrategy::Hybrid {
      if let Some(anchor) = anchor {
        // A confident hit on the user-placed block is taken on similarity
        // alone, wherever the forecast says the target should be.
        let matches = self.search(&frame, &zone, anchor, self.parameters.anchor_threshold, cancel)?;
        found = matches.first().map(|m| (*m, m.similarity, true));
      }
    }
    if found.is_none() {
      let matches = self.search(&frame, &zone, template, self.parameters.similarity_threshold, cancel)?;
      found = self.pick(&matches, &predicted).map(|(m, s)| (m, s, false));
    }
    if cancel.is_cancelled() {
      return Err(TrackError::Cancelled);
    }

    let (position, score, similarity, anchored, matched) = match found {
      Some((m, score, anchored)) => {
        let matched = self.policy.accept(score, previous.len() == 1);
        (m.center(), score, m.similarity, anchored, matched)
      },
      None => (last.position(), 0., 0., false, false),
    };
    debug!("t {}: ({}, {}) -> ({}, {}), similarity {:.3}, score {:.3}{}{}.",
      t, last.x(), last.y(), position[0], position[1], similarity, score,
      if anchored { ", anchored" } else { "" },
      if matched { "" } else { ", rejected" });

    let template = self.next_template(image, position, similarity, anchored, template, anchor);
    let point = TrackPoint::new(position, t, template, false, similarity);
    let step = TrackStep { position, matched, score, similarity, anchored };
    Ok((point, step))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::synthetic::*;

  fn tracker(strategy: UpdateStrategy) -> BlockTracker {
    let mut p = Parameters::default();
    p.update_strategy = strategy;
    BlockTracker::new(200, 200, &p).unwrap()
  }

  #[test]
  fn test_create_point() {
    let tracker = tracker(UpdateStrategy::Hybrid);
    let image = random_texture(200, 200, 3, 5);
    let p = tracker.create_point(&image, Pixel::new(50, 60), 0).unwrap();
    assert!(p.is_reference());
    assert_eq!(p.similarity(), 1.);
    let block = p.template().unwrap();
    assert_eq!((block.width, block.height, block.channels), (31, 31, 3));
    assert_eq!(block.pixel(15, 15), image.pixel(50, 60));

    assert!(matches!(
      tracker.create_point(&image, Pixel::new(10, 100), 0),
      Err(TrackError::UntrackableSeed { x: 10, y: 100 }),
    ));
    assert!(tracker.create_point(&image, Pixel::new(15, 184), 0).is_ok());
    for (x, y) in [(i32::MAX - 3, 100), (i32::MIN + 3, 100), (100, i32::MAX), (i32::MIN, i32::MIN)] {
      assert!(matches!(
        tracker.create_point(&image, Pixel::new(x, y), 0),
        Err(TrackError::UntrackableSeed { .. }),
      ));
    }
    assert!(matches!(
      tracker.create_point(&Image::new(100, 100, 3), Pixel::new(50, 50), 0),
      Err(TrackError::ImageSizeMismatch { .. }),
    ));
  }

  #[test]
  fn test_track_textured_shift() {
    for strategy in [UpdateStrategy::Fixed, UpdateStrategy::Rolling, UpdateStrategy::Hybrid, UpdateStrategy::Mixed] {
      let tracker = tracker(strategy);
      let target = random_texture(40, 40, 4, 11);
      let mut f0 = blank_frame(200, 200, GRAY);
      paste_centered(&mut f0, &target, Pixel::new(100, 100));
      let mut f1 = blank_frame(200, 200, GRAY);
      paste_centered(&mut f1, &target, Pixel::new(107, 96));

      let seed = tracker.create_point(&f0, Pixel::new(100, 100), 0).unwrap();
      let (point, step) = tracker.track(&[seed], &f1, 1, &CancelToken::new()).unwrap();
      assert_eq!(point.position(), Pixel::new(107, 96));
      assert!(step.matched);
      assert!(step.similarity > 0.999);
      assert_eq!(step.anchored, strategy == UpdateStrategy::Hybrid);
      assert!(!point.is_reference());
      assert_eq!(point.t(), 1);
    }
  }

  #[test]
  fn test_anchor_hit_ignores_forecast() {
    let tracker = tracker(UpdateStrategy::Hybrid);
    let target = random_texture(25, 25, 4, 21);
    let frame = |center: Pixel| {
      let mut f = blank_frame(200, 200, GRAY);
      paste_centered(&mut f, &target, center);
      f
    };
    let cancel = CancelToken::new();
    let seed = tracker.create_point(&frame(Pixel::new(60, 100)), Pixel::new(60, 100), 0).unwrap();
    let (still, step) = tracker.track(&[seed.clone()], &frame(Pixel::new(60, 100)), 1, &cancel).unwrap();
    assert!(step.matched);

    // 45 px away from a stationary forecast, inside the fused score's range.
    let (point, step) = tracker.track(&[seed, still], &frame(Pixel::new(105, 100)), 2, &cancel).unwrap();
    assert_eq!(point.position(), Pixel::new(105, 100));
    assert!(step.anchored);
    assert!(step.matched);
    assert_eq!(step.score, step.similarity);
    assert!(step.score > 0.999);
  }

  #[test]
  fn test_no_candidate_stays_put() {
    let tracker = tracker(UpdateStrategy::Rolling);
    let f0 = square_frame(200, 200, WHITE, Pixel::new(80, 80), 20, BLACK);
    let f1 = blank_frame(200, 200, WHITE);
    let seed = tracker.create_point(&f0, Pixel::new(80, 80), 0).unwrap();
    let (point, step) = tracker.track(&[seed], &f1, 1, &CancelToken::new()).unwrap();
    assert!(!step.matched);
    assert_eq!(step.score, 0.);
    assert_eq!(point.position(), Pixel::new(80, 80));
    assert_eq!(point.similarity(), 0.);
    assert!(point.template().is_some());
  }

  #[test]
  fn test_track_errors() {
    let tracker = tracker(UpdateStrategy::Hybrid);
    let image = random_texture(200, 200, 3, 5);
    let cancel = CancelToken::new();
    assert!(matches!(tracker.track(&[], &image, 1, &cancel), Err(TrackError::EmptyTrack)));
    let orphan = tracker.create_orphan(Pixel::new(50, 50), 0);
    assert!(matches!(
      tracker.track(&[orphan], &image, 1, &cancel),
      Err(TrackError::OrphanPoint { index: 0 }),
    ));
    let seed = tracker.create_point(&image, Pixel::new(50, 50), 0).unwrap();
    cancel.cancel();
    assert!(matches!(tracker.track(&[seed], &image, 1, &cancel), Err(TrackError::Cancelled)));
  }

  #[test]
  fn test_keep_and_blend_templates() {
    let image = random_texture(200, 200, 3, 8);
    let cancel = CancelToken::new();

    // Identical frames match perfectly, so the rolling template is kept as is.
    let rolling = tracker(UpdateStrategy::Rolling);
    let seed = rolling.create_point(&image, Pixel::new(100, 100), 0).unwrap();
    let (point, step) = rolling.track(&[seed.clone()], &image, 1, &cancel).unwrap();
    assert!(!step.anchored);
    assert_eq!(point.template(), seed.template());

    let mixed = tracker(UpdateStrategy::Mixed);
    let (point, _) = mixed.track(&[seed.clone()], &image, 1, &cancel).unwrap();
    assert_eq!(point.template(), seed.template());
  }

  #[test]
  fn test_diagnostics() {
    let tracker = tracker(UpdateStrategy::Hybrid);
    let d = tracker.diagnostics(&TrackPoint::orphan(Pixel::new(100, 90), 0));
    assert_eq!(d.template, Rect::new(85, 75, 31, 31));
    assert_eq!(d.search_window, Rect::new(38, 28, 125, 125));
    assert_eq!(d.similarity, 0.);
  }
}
