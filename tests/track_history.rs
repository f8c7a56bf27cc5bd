use block_track::*;
use block_track::synthetic::*;

const BEGIN: i64 = 1000;
const STEP: i64 = 40;

fn sequence() -> DriftSequence {
  let mut s = DriftSequence::new(240, 180, Pixel::new(70, 90), 3);
  s.blur_step = 0.;
  s
}

fn tracked(frames: usize) -> (Track, DriftSequence) {
  let s = sequence();
  let start = s.position(0);
  let mut track = Track::new(&s.frame(0), start[0], start[1], BEGIN, &Parameters::default()).unwrap();
  for k in 1..=frames {
    let step = track.advance_to(&s.frame(k), BEGIN + k as i64 * STEP).unwrap();
    assert!(step.matched);
  }
  (track, s)
}

fn records(points: &[TrackPoint]) -> Vec<PointRecord> {
  points.iter().map(PointRecord::from).collect()
}

#[test]
fn test_timestamps_strictly_increase() {
  let (mut track, s) = tracked(6);
  assert_eq!(track.len(), 7);
  assert!(track.points().windows(2).all(|w| w[0].t() < w[1].t()));
  assert_eq!(track.points()[0].t(), 0);
  assert_eq!(track.end_timestamp(), Some(BEGIN + 6 * STEP));

  // Going back in time is refused without touching the history.
  let end = BEGIN + 6 * STEP;
  for ts in [end, end - 1, BEGIN] {
    assert!(matches!(track.advance_to(&s.frame(7), ts), Err(TrackError::OutOfOrder { .. })));
  }
  assert_eq!(track.len(), 7);
  assert!(matches!(
    track.advance_to(&Image::new(10, 10, 3), end + STEP),
    Err(TrackError::ImageSizeMismatch { .. }),
  ));
}

#[test]
fn test_truncate_then_recover_restores_points() {
  let (mut track, _) = tracked(8);
  let before = records(track.points());

  let cut = BEGIN + 3 * STEP;
  let kept = track.end_of_track(cut);
  let removed = track.truncate(cut);
  assert_eq!(records(&kept), records(&removed));
  assert_eq!(removed.len(), 5);
  assert_eq!(track.len(), 4);
  assert_eq!(track.end_timestamp(), Some(cut));

  track.recover_suffix(removed).unwrap();
  assert_eq!(records(track.points()), before);
}

#[test]
fn test_retracking_after_truncate() {
  let (mut track, s) = tracked(4);
  track.truncate(BEGIN + STEP);
  track.move_cursor(BEGIN + STEP);
  assert_eq!(track.current_index(), 1);
  let step = track.advance_to(&s.frame(2), BEGIN + 2 * STEP).unwrap();
  assert!(step.matched);
  assert_eq!(step.position, s.position(2));
  assert_eq!(track.len(), 3);
}

#[test]
fn test_manual_move_regenerates_template() {
  let (mut track, s) = tracked(3);
  let frame = s.frame(3);
  let old = track.current_point().unwrap().clone();
  let target = old.position() + Pixel::new(4, -3);
  track.manual_move(&frame, target[0], target[1]).unwrap();

  let current = track.current_point().unwrap();
  let expected = frame.sub_image(&track.geometry().block_rect(target)).unwrap();
  assert_eq!(current.template(), Some(&expected));
  assert_ne!(current.template(), old.template());
  assert_eq!(current.t(), old.t());
  assert!(current.is_reference());
  assert_eq!(current.similarity(), 1.);

  assert!(matches!(track.manual_move(&frame, 2, 2), Err(TrackError::UntrackableSeed { .. })));
  assert_eq!(track.current_point().unwrap().position(), target);
}

#[test]
fn test_cursor_follows_playback() {
  let (mut track, _) = tracked(4);
  assert_eq!(track.current_index(), 4);
  assert_eq!(track.move_cursor(BEGIN + STEP + STEP / 2), 1);
  assert_eq!(track.move_cursor(BEGIN + STEP + STEP / 2 + 1), 2);
  assert_eq!(track.move_cursor(0), 0);
  assert_eq!(track.move_cursor(BEGIN + 100 * STEP), 4);
}

#[test]
fn test_record_round_trip_and_reconstruct() {
  let (track, s) = tracked(3);
  let json = track.to_record().to_json().unwrap();
  let record = TrackRecord::from_json(&json).unwrap();
  let mut loaded = Track::from_record(&record, &Parameters::default()).unwrap();
  assert_eq!(records(loaded.points()), records(track.points()));
  assert!(loaded.points().iter().all(|p| p.is_orphan()));

  let end = loaded.end_timestamp().unwrap();
  assert!(matches!(
    loaded.advance_to(&s.frame(4), end + STEP),
    Err(TrackError::OrphanPoint { index: 3 }),
  ));
  assert!(matches!(loaded.reconstruct(&s.frame(3), end + 1), Err(TrackError::NoSuchTimestamp(_))));

  loaded.reconstruct(&s.frame(3), end).unwrap();
  assert!(loaded.points()[3].is_reference());
  let step = loaded.advance_to(&s.frame(4), end + STEP).unwrap();
  assert!(step.matched);
  assert_eq!(step.position, s.position(4));
}

#[test]
fn test_cancelled_advance_appends_nothing() {
  let (mut track, s) = tracked(2);
  let cancel = CancelToken::new();
  cancel.cancel();
  let end = track.end_timestamp().unwrap();
  assert!(matches!(
    track.advance_to_cancellable(&s.frame(3), end + STEP, &cancel),
    Err(TrackError::Cancelled),
  ));
  assert_eq!(track.len(), 3);
  assert_eq!(track.status(), TrackStatus::Edit);

  cancel.reset();
  assert!(track.advance_to_cancellable(&s.frame(3), end + STEP, &cancel).unwrap().matched);
}

#[test]
fn test_independent_tracks_run_in_parallel() {
  let s = sequence();
  let frames: Vec<Image> = (0..=5).map(|k| s.frame(k)).collect();
  let seeds = [s.position(0), s.position(0) + Pixel::new(0, 4)];
  let results: Vec<Vec<PointRecord>> = std::thread::scope(|scope| {
    let handles: Vec<_> = seeds.iter().map(|seed| {
      let frames = &frames;
      scope.spawn(move || {
        let mut track = Track::new(&frames[0], seed[0], seed[1], 0, &Parameters::default()).unwrap();
        for k in 1..frames.len() {
          track.advance_to(&frames[k], k as i64).unwrap();
        }
        records(track.points())
      })
    }).collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });
  assert_eq!(results[0].last().unwrap(), &PointRecord { x: 75, y: 90, t: 5 });
  assert_eq!(results[1].last().unwrap(), &PointRecord { x: 75, y: 94, t: 5 });
}
