// Deterministic synthetic frames for the demo binary and the tests.

use crate::all::*;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];
pub const GRAY: [u8; 3] = [128, 128, 128];

pub fn blank_frame(width: usize, height: usize, color: [u8; 3]) -> Image {
  let mut image = Image::new(width, height, 3);
  image.fill_rect(&image.bounds(), &color);
  image
}

// Frame of `background` with a filled square centered at `center`.
pub fn square_frame(
  width: usize,
  height: usize,
  background: [u8; 3],
  center: Pixel,
  size: usize,
  color: [u8; 3],
) -> Image {
  let mut image = blank_frame(width, height, background);
  image.fill_rect(&Rect::centered(center, size, size), &color);
  image
}

// RGB noise made of `cell` x `cell` blocks of random color.
pub fn random_texture(width: usize, height: usize, cell: usize, seed: u64) -> Image {
  let cell = cell.max(1);
  let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
  let cols = (width + cell - 1) / cell;
  let rows = (height + cell - 1) / cell;
  let colors: Vec<[u8; 3]> = (0..cols * rows).map(|_| rng.gen()).collect();
  let mut image = Image::new(width, height, 3);
  for y in 0..height {
    for x in 0..width {
      image.set_pixel(x, y, &colors[(y / cell) * cols + x / cell]);
    }
  }
  image
}

// Pastes `patch` so that its middle pixel lands on `center`.
pub fn paste_centered(frame: &mut Image, patch: &Image, center: Pixel) {
  let r = Rect::centered(center, patch.width, patch.height);
  frame.set_sub_image(r.x, r.y, patch);
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
  let radius = (3. * sigma).ceil() as i64;
  let mut kernel: Vec<f64> = (-radius..=radius)
    .map(|i| (-((i * i) as f64) / (2. * sigma * sigma)).exp())
    .collect();
  let total: f64 = kernel.iter().sum();
  for k in kernel.iter_mut() {
    *k /= total;
  }
  kernel
}

// Separable gaussian blur with clamped borders. `sigma <= 0` copies.
pub fn gaussian_blur(image: &Image, sigma: f64) -> Image {
  if sigma <= 0. { return image.clone() }
  let kernel = gaussian_kernel(sigma);
  let radius = (kernel.len() / 2) as i64;
  let c = image.channels;
  let w = image.width as i64;
  let h = image.height as i64;

  let mut horizontal = vec![0f64; image.width * image.height * c];
  for y in 0..h {
    let row = &image[y as usize];
    for x in 0..w {
      for ch in 0..c {
        let mut v = 0.;
        for (k, weight) in kernel.iter().enumerate() {
          let sx = (x + k as i64 - radius).clamp(0, w - 1) as usize;
          v += weight * row[sx * c + ch] as f64;
        }
        horizontal[(y * w + x) as usize * c + ch] = v;
      }
    }
  }

  let mut out = Image::new(image.width, image.height, c);
  for y in 0..h {
    for x in 0..w {
      for ch in 0..c {
        let mut v = 0.;
        for (k, weight) in kernel.iter().enumerate() {
          let sy = (y + k as i64 - radius).clamp(0, h - 1);
          v += weight * horizontal[(sy * w + x) as usize * c + ch];
        }
        out.row_mut(y as usize)[x as usize * c + ch] = v.round().clamp(0., 255.) as u8;
      }
    }
  }
  out
}

// A textured target moving at constant velocity over a gray background,
// blurred more and more between sharp frames that come every `sharp_period`
// frames.
pub struct DriftSequence {
  pub width: usize,
  pub height: usize,
  pub start: Pixel,
  pub velocity: Pixel,
  pub sharp_period: usize,
  pub blur_step: f64,
  target: Image,
}

impl DriftSequence {
  pub fn new(width: usize, height: usize, start: Pixel, seed: u64) -> DriftSequence {
    DriftSequence {
      width,
      height,
      start,
      velocity: Pixel::new(1, 0),
      sharp_period: 10,
      blur_step: 0.15,
      target: random_texture(25, 25, 4, seed),
    }
  }

  pub fn position(&self, k: usize) -> Pixel {
    self.start + self.velocity * k as i32
  }

  pub fn blur(&self, k: usize) -> f64 {
    if self.sharp_period == 0 { return 0. }
    self.blur_step * (k % self.sharp_period) as f64
  }

  pub fn frame(&self, k: usize) -> Image {
    let mut frame = blank_frame(self.width, self.height, GRAY);
    paste_centered(&mut frame, &self.target, self.position(k));
    gaussian_blur(&frame, self.blur(k))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_random_texture_is_deterministic() {
    let a = random_texture(9, 7, 2, 42);
    let b = random_texture(9, 7, 2, 42);
    let c = random_texture(9, 7, 2, 43);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.pixel(0, 0), a.pixel(1, 1));
  }

  #[test]
  fn test_blur_keeps_flat_image() {
    let image = blank_frame(12, 12, GRAY);
    assert_eq!(gaussian_blur(&image, 1.5), image);
    let kernel = gaussian_kernel(1.);
    assert_eq!(kernel.len(), 7);
    assert!((kernel.iter().sum::<f64>() - 1.).abs() < 1e-12);
  }

  #[test]
  fn test_drift_sequence() {
    let s = DriftSequence::new(100, 80, Pixel::new(30, 40), 1);
    assert_eq!(s.position(5), Pixel::new(35, 40));
    assert_eq!(s.blur(10), 0.);
    assert!(s.blur(9) > s.blur(1));
    let frame = s.frame(0);
    assert_eq!(frame.pixel(0, 0), &GRAY);
  }
}
