use crate::all::*;

// Flat form of a track for hosts to persist: positions and times only.
// Templates are not stored, so every point read back is an orphan.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRecord {
  pub x: i32,
  pub y: i32,
  // Relative to the first point.
  pub t: i64,
}

impl From<&TrackPoint> for PointRecord {
  fn from(p: &TrackPoint) -> PointRecord {
    PointRecord { x: p.x(), y: p.y(), t: p.t() }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
  pub begin_timestamp: i64,
  pub status: TrackStatus,
  #[serde(default)]
  pub stop_reason: Option<StopReason>,
  // Frame size the block geometry is derived from.
  pub image_width: usize,
  pub image_height: usize,
  pub points: Vec<PointRecord>,
}

impl TrackRecord {
  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn from_json(json: &str) -> Result<TrackRecord> {
    Ok(serde_json::from_str(json)?)
  }
}
