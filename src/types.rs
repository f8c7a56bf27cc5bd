use crate::all::*;

// Eigen-like aliases.
pub type Vector2d = nalgebra::Vector2::<f64>;
pub type Pixel = nalgebra::Vector2::<i32>;

pub fn to_f64(p: &Pixel) -> Vector2d {
  Vector2d::new(p[0] as f64, p[1] as f64)
}

pub fn pixel_distance(a: &Pixel, b: &Pixel) -> f64 {
  (to_f64(a) - to_f64(b)).norm()
}

// Axis-aligned rectangle in image coordinates. `x` and `y` are the top-left
// corner, the right and bottom edges are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl Rect {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
    Rect { x, y, width, height }
  }

  // For odd sizes `center` is exactly the middle pixel. Saturates near the
  // ends of the `i32` range, such a rect lies outside any image.
  pub fn centered(center: Pixel, width: usize, height: usize) -> Rect {
    let width = i32::try_from(width).unwrap_or(i32::MAX);
    let height = i32::try_from(height).unwrap_or(i32::MAX);
    Rect {
      x: center[0].saturating_sub(width / 2),
      y: center[1].saturating_sub(height / 2),
      width,
      height,
    }
  }

  pub fn right(&self) -> i32 { self.x.saturating_add(self.width) }

  pub fn bottom(&self) -> i32 { self.y.saturating_add(self.height) }

  pub fn center(&self) -> Pixel {
    Pixel::new(self.x.saturating_add(self.width / 2), self.y.saturating_add(self.height / 2))
  }

  pub fn is_empty(&self) -> bool {
    self.width <= 0 || self.height <= 0
  }

  pub fn intersect(&self, other: &Rect) -> Option<Rect> {
    let x = i32::max(self.x, other.x);
    let y = i32::max(self.y, other.y);
    let right = i32::min(self.right(), other.right());
    let bottom = i32::min(self.bottom(), other.bottom());
    if right <= x || bottom <= y { return None }
    Some(Rect::new(x, y, right - x, bottom - y))
  }

  pub fn contains_rect(&self, other: &Rect) -> bool {
    other.x >= self.x
      && other.y >= self.y
      && other.right() <= self.right()
      && other.bottom() <= self.bottom()
  }
}
