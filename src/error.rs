use thiserror::Error;

pub type Result<T, E = TrackError> = std::result::Result<T, E>;

// A failed match is not an error: it is reported through `TrackStep::matched`.
// Everything here except `UntrackableSeed` and `Cancelled` is a caller bug.
#[derive(Debug, Error)]
pub enum TrackError {
  #[error("Cannot extract a full block around ({x}, {y}), too close to the image border.")]
  UntrackableSeed { x: i32, y: i32 },
  #[error("Timestamp {timestamp} is not after the last tracked timestamp {last}.")]
  OutOfOrder { timestamp: i64, last: i64 },
  #[error("The track has no points.")]
  EmptyTrack,
  #[error("Points can only be moved while the track is in edit state.")]
  NotEditable,
  #[error("Tracking is stopped, restart it before advancing.")]
  TrackingStopped,
  #[error("Point {index} has no template, reconstruct it from a frame first.")]
  OrphanPoint { index: usize },
  #[error("Image is {width}x{height}, the track was created for {expected_width}x{expected_height}.")]
  ImageSizeMismatch {
    width: usize,
    height: usize,
    expected_width: usize,
    expected_height: usize,
  },
  #[error("Invalid image: {0}")]
  InvalidImage(String),
  #[error("Invalid parameters: {0}")]
  InvalidParameters(String),
  #[error("Timestamp {timestamp} is too far from the track start {begin}.")]
  TimestampOutOfRange { timestamp: i64, begin: i64 },
  #[error("No point at timestamp {0}.")]
  NoSuchTimestamp(i64),
  #[error("Tracking was cancelled.")]
  Cancelled,
  #[error("Track record serialization failed: {0}")]
  Json(#[from] serde_json::Error),
}
