use crate::all::*;

// Linear extrapolation from the last two points: `last + (last - previous)`.
// With a single point the forecast is that point. None for an empty history.
pub fn forecast(points: &[TrackPoint]) -> Option<Pixel> {
  let last = points.last()?.position();
  if points.len() < 2 { return Some(last) }
  let previous = points[points.len() - 2].position();
  Some(last + (last - previous))
}
