use crate::all::*;

// One tracked location. `t` is relative to the first point of the track.
//
// The template is the block of the frame around the point and is what the
// next frame gets matched against. Points are never edited in place: moving
// or re-templating a point replaces it with a new value, and the old block
// is freed when the old value is dropped.
#[derive(Clone, Debug)]
pub struct TrackPoint {
  position: Pixel,
  t: i64,
  template: Option<Image>,
  is_reference: bool,
  similarity: f64,
}

impl TrackPoint {
  pub fn new(
    position: Pixel,
    t: i64,
    template: Image,
    is_reference: bool,
    similarity: f64,
  ) -> TrackPoint {
    TrackPoint {
      position,
      t,
      template: Some(template),
      is_reference,
      similarity: if is_reference { 1. } else { similarity },
    }
  }

  // Bare point without a template, eg loaded from a saved track. It cannot be
  // tracked from until its block is regenerated from the matching frame.
  pub fn orphan(position: Pixel, t: i64) -> TrackPoint {
    TrackPoint {
      position,
      t,
      template: None,
      is_reference: false,
      similarity: 0.,
    }
  }

  pub fn position(&self) -> Pixel { self.position }

  pub fn x(&self) -> i32 { self.position[0] }

  pub fn y(&self) -> i32 { self.position[1] }

  pub fn t(&self) -> i64 { self.t }

  pub fn template(&self) -> Option<&Image> { self.template.as_ref() }

  pub fn is_orphan(&self) -> bool { self.template.is_none() }

  // Placed by the user rather than found by matching.
  pub fn is_reference(&self) -> bool { self.is_reference }

  pub fn similarity(&self) -> f64 { self.similarity }
}
