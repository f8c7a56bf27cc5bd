use crate::all::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
  // Tracking under user supervision, the current point can be moved.
  Edit,
  // Frozen. Dragging scrubs through time instead of moving points.
  Interactive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
  User,
  MatchFailure,
}

// History of one tracked target. Timestamps given to and returned by `Track`
// are absolute, the points store them relative to the first one.
//
// Not synchronized: calls on one track must be serialized by the caller.
// Independent tracks share nothing and can run on separate threads.
pub struct Track {
  tracker: Box<dyn PointTracker>,
  points: Vec<TrackPoint>,
  begin_timestamp: i64,
  status: TrackStatus,
  stop_reason: Option<StopReason>,
  current_index: usize,
  image_size: [usize; 2],
}

impl Track {
  pub fn new(image: &Image, x: i32, y: i32, timestamp: i64, parameters: &Parameters) -> Result<Track> {
    let tracker = BlockTracker::new(image.width, image.height, parameters)?;
    Track::with_tracker(Box::new(tracker), image, x, y, timestamp)
  }

  pub fn with_tracker(
    tracker: Box<dyn PointTracker>,
    image: &Image,
    x: i32,
    y: i32,
    timestamp: i64,
  ) -> Result<Track> {
    let seed = tracker.create_point(image, Pixel::new(x, y), 0)?;
    info!("New track at ({}, {}), timestamp {}.", x, y, timestamp);
    Ok(Track {
      tracker,
      points: vec![seed],
      begin_timestamp: timestamp,
      status: TrackStatus::Edit,
      stop_reason: None,
      current_index: 0,
      image_size: [image.width, image.height],
    })
  }

  // Rebuilds a saved track. All points are orphans until reconstructed.
  pub fn from_record(record: &TrackRecord, parameters: &Parameters) -> Result<Track> {
    if record.points.is_empty() {
      return Err(TrackError::EmptyTrack);
    }
    for w in record.points.windows(2) {
      if w[1].t <= w[0].t {
        return Err(TrackError::OutOfOrder {
          timestamp: record.begin_timestamp.saturating_add(w[1].t),
          last: record.begin_timestamp.saturating_add(w[0].t),
        });
      }
    }
    let tracker = BlockTracker::new(record.image_width, record.image_height, parameters)?;
    let points = record.points.iter()
      .map(|p| tracker.create_orphan(Pixel::new(p.x, p.y), p.t))
      .collect();
    Ok(Track {
      tracker: Box::new(tracker),
      points,
      begin_timestamp: record.begin_timestamp,
      status: record.status,
      stop_reason: record.stop_reason,
      current_index: 0,
      image_size: [record.image_width, record.image_height],
    })
  }

  pub fn to_record(&self) -> TrackRecord {
    TrackRecord {
      begin_timestamp: self.begin_timestamp,
      status: self.status,
      stop_reason: self.stop_reason,
      image_width: self.image_size[0],
      image_height: self.image_size[1],
      points: self.points.iter().map(PointRecord::from).collect(),
    }
  }

  pub fn advance_to(&mut self, image: &Image, timestamp: i64) -> Result<TrackStep> {
    self.advance_to_cancellable(image, timestamp, &CancelToken::new())
  }

  // Tracks the last point into `image`. Appends exactly one point unless an
  // error is returned, in which case the history is untouched. A failed match
  // still appends its best-effort point and then stops the track.
  pub fn advance_to_cancellable(
    &mut self,
    image: &Image,
    timestamp: i64,
    cancel: &CancelToken,
  ) -> Result<TrackStep> {
    if self.status == TrackStatus::Interactive {
      return Err(TrackError::TrackingStopped);
    }
    let last = self.end_timestamp().ok_or(TrackError::EmptyTrack)?;
    if timestamp <= last {
      return Err(TrackError::OutOfOrder { timestamp, last });
    }
    let t = timestamp.checked_sub(self.begin_timestamp)
      .ok_or(TrackError::TimestampOutOfRange { timestamp, begin: self.begin_timestamp })?;
    let (point, step) = self.tracker.track(&self.points, image, t, cancel)?;
    self.points.push(point);
    self.current_index = self.points.len() - 1;
    if !step.matched {
      info!("Tracking lost at timestamp {}, score {:.3}.", timestamp, step.score);
      self.status = TrackStatus::Interactive;
      self.stop_reason = Some(StopReason::MatchFailure);
    }
    Ok(step)
  }

  // Moves the current point and captures a fresh template at its new place.
  // `image` must be the frame of that point.
  pub fn manual_move(&mut self, image: &Image, x: i32, y: i32) -> Result<()> {
    if self.status != TrackStatus::Edit {
      return Err(TrackError::NotEditable);
    }
    let current = self.points.get(self.current_index).ok_or(TrackError::EmptyTrack)?;
    let point = self.tracker.create_point(image, Pixel::new(x, y), current.t())?;
    self.points[self.current_index] = point;
    Ok(())
  }

  // Regenerates the template of the point at `timestamp` from its frame,
  // eg after loading a saved track, so tracking can continue from it.
  pub fn reconstruct(&mut self, image: &Image, timestamp: i64) -> Result<()> {
    let t = timestamp.checked_sub(self.begin_timestamp)
      .ok_or(TrackError::NoSuchTimestamp(timestamp))?;
    let i = self.points.iter().position(|p| p.t() == t)
      .ok_or(TrackError::NoSuchTimestamp(timestamp))?;
    self.points[i] = self.tracker.create_point(image, self.points[i].position(), t)?;
    Ok(())
  }

  // Copies of the points after `timestamp`. The origin is never included.
  pub fn end_of_track(&self, timestamp: i64) -> Vec<TrackPoint> {
    let t = self.relative(timestamp);
    self.points.iter().skip(1).filter(|p| p.t() > t).cloned().collect()
  }

  // Removes and returns the points after `timestamp`. The origin is kept.
  pub fn truncate(&mut self, timestamp: i64) -> Vec<TrackPoint> {
    let t = self.relative(timestamp);
    let keep = match self.points.iter().skip(1).position(|p| p.t() > t) {
      Some(i) => i + 1,
      None => return vec![],
    };
    let removed = self.points.split_off(keep);
    self.current_index = self.current_index.min(self.points.len() - 1);
    debug!("Truncated {} points after timestamp {}.", removed.len(), timestamp);
    removed
  }

  // Appends points previously removed by `truncate()`. Points at or after the
  // start of `suffix` are dropped first, except the origin.
  pub fn recover_suffix(&mut self, suffix: Vec<TrackPoint>) -> Result<()> {
    let first = match suffix.first() {
      Some(p) => p.t(),
      None => return Ok(()),
    };
    let keep = 1 + self.points.iter().skip(1).take_while(|p| p.t() < first).count();
    let mut last = self.points[.. keep].last().map(|p| p.t()).ok_or(TrackError::EmptyTrack)?;
    for p in &suffix {
      if p.t() <= last {
        return Err(TrackError::OutOfOrder {
          timestamp: self.absolute(p.t()),
          last: self.absolute(last),
        });
      }
      last = p.t();
    }
    self.points.truncate(keep);
    self.points.extend(suffix);
    self.current_index = self.current_index.min(self.points.len() - 1);
    Ok(())
  }

  // Index of the point closest in time. Ties go to the earlier point.
  pub fn find_nearest(&self, timestamp: i64) -> usize {
    let mut best = 0;
    let mut min_distance = u64::MAX;
    for (i, p) in self.points.iter().enumerate() {
      let distance = self.absolute(p.t()).abs_diff(timestamp);
      if distance < min_distance {
        min_distance = distance;
        best = i;
      }
    }
    best
  }

  pub fn move_cursor(&mut self, timestamp: i64) -> usize {
    self.current_index = self.find_nearest(timestamp);
    self.current_index
  }

  // Index of the point closest in space, for scrubbing by dragging along the
  // trajectory. Ties go to the earlier point.
  pub fn closest_frame(&self, x: i32, y: i32) -> usize {
    let target = Pixel::new(x, y);
    let mut best = 0;
    let mut min_distance = f64::MAX;
    for (i, p) in self.points.iter().enumerate() {
      let distance = pixel_distance(&p.position(), &target);
      if distance < min_distance {
        min_distance = distance;
        best = i;
      }
    }
    best
  }

  // Diagonal of the bounding box of the trajectory.
  pub fn flat_distance(&self) -> f64 {
    if self.points.is_empty() { return 0. }
    let mut min = Pixel::new(i32::MAX, i32::MAX);
    let mut max = Pixel::new(i32::MIN, i32::MIN);
    for p in &self.points {
      for i in 0..2 {
        min[i] = min[i].min(p.position()[i]);
        max[i] = max[i].max(p.position()[i]);
      }
    }
    pixel_distance(&min, &max)
  }

  pub fn stop_tracking(&mut self) {
    if self.status == TrackStatus::Interactive { return }
    info!("Tracking stopped at timestamp {:?}.", self.end_timestamp());
    self.status = TrackStatus::Interactive;
    self.stop_reason = Some(StopReason::User);
  }

  pub fn restart_tracking(&mut self) {
    self.status = TrackStatus::Edit;
    self.stop_reason = None;
  }

  pub fn points(&self) -> &[TrackPoint] { &self.points }

  pub fn len(&self) -> usize { self.points.len() }

  pub fn is_empty(&self) -> bool { self.points.is_empty() }

  pub fn status(&self) -> TrackStatus { self.status }

  pub fn stop_reason(&self) -> Option<StopReason> { self.stop_reason }

  pub fn begin_timestamp(&self) -> i64 { self.begin_timestamp }

  pub fn end_timestamp(&self) -> Option<i64> {
    self.points.last().map(|p| self.absolute(p.t()))
  }

  fn absolute(&self, t: i64) -> i64 {
    self.begin_timestamp.saturating_add(t)
  }

  // Clamped, which keeps comparisons against stored times correct.
  fn relative(&self, timestamp: i64) -> i64 {
    timestamp.saturating_sub(self.begin_timestamp)
  }

  pub fn current_index(&self) -> usize { self.current_index }

  pub fn current_point(&self) -> Option<&TrackPoint> { self.points.get(self.current_index) }

  pub fn geometry(&self) -> &BlockGeometry { self.tracker.geometry() }

  pub fn diagnostics(&self, index: usize) -> Option<PointDiagnostics> {
    self.points.get(index).map(|p| self.tracker.diagnostics(p))
  }
}

impl fmt::Debug for Track {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Track")
      .field("begin_timestamp", &self.begin_timestamp)
      .field("points", &self.points.len())
      .field("status", &self.status)
      .field("stop_reason", &self.stop_reason)
      .field("current_index", &self.current_index)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(points: &[(i32, i32, i64)]) -> TrackRecord {
    TrackRecord {
      begin_timestamp: 100,
      status: TrackStatus::Edit,
      stop_reason: None,
      image_width: 200,
      image_height: 200,
      points: points.iter().map(|&(x, y, t)| PointRecord { x, y, t }).collect(),
    }
  }

  fn track(points: &[(i32, i32, i64)]) -> Track {
    Track::from_record(&record(points), &Parameters::default()).unwrap()
  }

  #[test]
  fn test_find_nearest() {
    let mut track = track(&[(0, 0, 0), (1, 0, 10), (2, 0, 20)]);
    assert_eq!(track.find_nearest(0), 0);
    assert_eq!(track.find_nearest(104), 0);
    // Equidistant from the first two points.
    assert_eq!(track.find_nearest(105), 0);
    assert_eq!(track.find_nearest(106), 1);
    assert_eq!(track.find_nearest(1000), 2);
    assert_eq!(track.move_cursor(118), 2);
    assert_eq!(track.current_point().unwrap().x(), 2);
  }

  #[test]
  fn test_extreme_timestamps() {
    let mut track = track(&[(0, 0, 0), (1, 0, 10), (2, 0, 20)]);
    assert_eq!(track.find_nearest(i64::MIN), 0);
    assert_eq!(track.find_nearest(i64::MAX), 2);
    assert_eq!(track.end_of_track(i64::MAX).len(), 0);
    assert_eq!(track.end_of_track(i64::MIN).len(), 2);
    assert!(matches!(
      track.reconstruct(&Image::new(200, 200, 3), i64::MIN),
      Err(TrackError::NoSuchTimestamp(i64::MIN)),
    ));
    assert_eq!(track.truncate(i64::MIN).len(), 2);

    let mut early = record(&[(0, 0, 0)]);
    early.begin_timestamp = i64::MIN;
    let mut early = Track::from_record(&early, &Parameters::default()).unwrap();
    assert_eq!(early.find_nearest(i64::MAX), 0);
    assert!(matches!(
      early.advance_to(&Image::new(200, 200, 3), i64::MAX),
      Err(TrackError::TimestampOutOfRange { timestamp: i64::MAX, begin: i64::MIN }),
    ));
    assert_eq!(early.len(), 1);
  }

  #[test]
  fn test_seed_near_coordinate_limits() {
    let image = Image::new(200, 200, 3);
    for (x, y) in [(i32::MAX - 3, 100), (100, i32::MIN + 3)] {
      assert!(matches!(
        Track::new(&image, x, y, 0, &Parameters::default()),
        Err(TrackError::UntrackableSeed { .. }),
      ));
    }
  }

  #[test]
  fn test_closest_frame_and_flat_distance() {
    let track = track(&[(10, 10, 0), (20, 10, 1), (40, 50, 2), (20, 10, 3)]);
    assert_eq!(track.closest_frame(21, 11), 1);
    assert_eq!(track.closest_frame(100, 100), 2);
    assert_eq!(track.flat_distance(), 50.);
  }

  #[test]
  fn test_truncate_keeps_origin() {
    let mut track = track(&[(0, 0, 0), (1, 0, 10), (2, 0, 20)]);
    track.move_cursor(120);
    assert_eq!(track.end_of_track(105).len(), 2);
    assert_eq!(track.truncate(50).len(), 2);
    assert_eq!(track.len(), 1);
    assert_eq!(track.current_index(), 0);
    assert!(track.truncate(50).is_empty());
    assert_eq!(track.end_timestamp(), Some(100));
  }

  #[test]
  fn test_recover_suffix_replaces_overlap() {
    let mut track = track(&[(0, 0, 0), (1, 0, 10), (2, 0, 20), (3, 0, 30)]);
    let suffix = vec![TrackPoint::orphan(Pixel::new(9, 9), 20), TrackPoint::orphan(Pixel::new(8, 8), 25)];
    track.recover_suffix(suffix).unwrap();
    let xs: Vec<i32> = track.points().iter().map(|p| p.x()).collect();
    assert_eq!(xs, vec![0, 1, 9, 8]);

    // The origin is never replaced.
    let suffix = vec![TrackPoint::orphan(Pixel::new(7, 7), 0)];
    assert!(matches!(track.recover_suffix(suffix), Err(TrackError::OutOfOrder { .. })));
    let unordered = vec![TrackPoint::orphan(Pixel::new(7, 7), 40), TrackPoint::orphan(Pixel::new(7, 7), 40)];
    assert!(matches!(track.recover_suffix(unordered), Err(TrackError::OutOfOrder { .. })));
    assert_eq!(track.len(), 4);
  }

  #[test]
  fn test_from_record_checks_order() {
    let params = Parameters::default();
    assert!(matches!(Track::from_record(&record(&[]), &params), Err(TrackError::EmptyTrack)));
    assert!(matches!(
      Track::from_record(&record(&[(0, 0, 0), (0, 0, 5), (0, 0, 5)]), &params),
      Err(TrackError::OutOfOrder { timestamp: 105, last: 105 }),
    ));
    let track = track(&[(0, 0, 0), (3, 4, 5)]);
    assert!(track.points().iter().all(|p| p.is_orphan()));
    assert_eq!(track.to_record(), record(&[(0, 0, 0), (3, 4, 5)]));
  }

  #[test]
  fn test_stop_and_restart() {
    let mut track = track(&[(0, 0, 0)]);
    assert_eq!(track.status(), TrackStatus::Edit);
    track.stop_tracking();
    assert_eq!(track.status(), TrackStatus::Interactive);
    assert_eq!(track.stop_reason(), Some(StopReason::User));
    let image = Image::new(200, 200, 3);
    assert!(matches!(track.advance_to(&image, 200), Err(TrackError::TrackingStopped)));
    assert!(matches!(track.manual_move(&image, 50, 50), Err(TrackError::NotEditable)));
    track.restart_tracking();
    assert_eq!(track.stop_reason(), None);
    // Still an orphan, it has to be reconstructed before tracking.
    assert!(matches!(track.advance_to(&image, 200), Err(TrackError::OrphanPoint { index: 0 })));
    assert!(matches!(track.advance_to(&image, 100), Err(TrackError::OutOfOrder { .. })));
  }
}
