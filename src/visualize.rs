use crate::all::*;

pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];
pub const YELLOW: [u8; 3] = [255, 255, 0];

// What a host needs to draw the tracker state of one point, in image
// coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointDiagnostics {
  pub position: Pixel,
  pub search_window: Rect,
  pub template: Rect,
  pub similarity: f64,
}

#[inline(always)]
fn draw_pixel(image: &mut Image, p: &Pixel, color: &[u8; 3]) {
  if p[0] < 0 || p[0] >= image.width as i32 { return }
  if p[1] < 0 || p[1] >= image.height as i32 { return }
  let c = image.channels;
  image.set_pixel(p[0] as usize, p[1] as usize, &color[.. c]);
}

pub fn draw_rect(image: &mut Image, r: &Rect, color: &[u8; 3]) {
  if r.is_empty() { return }
  for x in r.x..r.right() {
    draw_pixel(image, &Pixel::new(x, r.y), color);
    draw_pixel(image, &Pixel::new(x, r.bottom() - 1), color);
  }
  for y in r.y..r.bottom() {
    draw_pixel(image, &Pixel::new(r.x, y), color);
    draw_pixel(image, &Pixel::new(r.right() - 1, y), color);
  }
}

pub fn draw_cross(image: &mut Image, p: &Pixel, color: &[u8; 3], r: i32) {
  for z in (-r)..(r+1) {
    draw_pixel(image, &(p + Pixel::new(z, 0)), color);
    draw_pixel(image, &(p + Pixel::new(0, z)), color);
  }
}

pub fn draw_line(image: &mut Image, mut p0: Pixel, mut p1: Pixel, color: &[u8; 3]) {
  let dx = p1[0] - p0[0];
  let dy = p1[1] - p0[1];
  if dx == 0 && dy == 0 {
    draw_pixel(image, &p0, color);
  }
  else if dx.abs() < dy.abs() {
    if p0[1] > p1[1] { (p0, p1) = (p1, p0); }
    let k = dx as f32 / dy as f32;
    for y in p0[1] ..= p1[1] {
      let x = p0[0] + (k * (y - p0[1]) as f32).round() as i32;
      draw_pixel(image, &Pixel::new(x, y), color);
    }
  }
  else {
    if p0[0] > p1[0] { (p0, p1) = (p1, p0); }
    let k = dy as f32 / dx as f32;
    for x in p0[0] ..= p1[0] {
      let y = p0[1] + (k * (x - p0[0]) as f32).round() as i32;
      draw_pixel(image, &Pixel::new(x, y), color);
    }
  }
}

// Search window in blue, template block in green, or red for a point that
// is not trusted.
pub fn draw_diagnostics(image: &mut Image, d: &PointDiagnostics, trusted: bool) {
  draw_rect(image, &d.search_window, &BLUE);
  draw_rect(image, &d.template, if trusted { &GREEN } else { &RED });
  draw_cross(image, &d.position, &YELLOW, 3);
}

// Trajectory up to and including the current point, with the current
// point's rectangles on top.
pub fn draw_track(image: &mut Image, track: &Track) {
  let points = track.points();
  let n = (track.current_index() + 1).min(points.len());
  for i in 1..n {
    draw_line(image, points[i - 1].position(), points[i].position(), &YELLOW);
  }
  if let Some(d) = track.diagnostics(track.current_index()) {
    let trusted = track.stop_reason() != Some(StopReason::MatchFailure)
      || track.current_index() + 1 < points.len();
    draw_diagnostics(image, &d, trusted);
  }
}

// Binary PPM (P6) encoding of an RGB image.
pub fn encode_ppm(image: &Image) -> Result<Vec<u8>> {
  if image.channels != 3 {
    return Err(TrackError::InvalidImage(format!("PPM needs 3 channels, got {}.", image.channels)));
  }
  let mut out = format!("P6\n{} {}\n255\n", image.width, image.height).into_bytes();
  out.reserve(image.row_bytes() * image.height);
  for y in 0..image.height {
    out.extend_from_slice(&image[y]);
  }
  Ok(out)
}
