use crate::all::*;

// BT.709 luma weights, as in most video pipelines.
const LUMA_R: f32 = 0.2125;
const LUMA_G: f32 = 0.7154;
const LUMA_B: f32 = 0.0721;

// Row-major 8-bit image storage with interleaved channels, either 3-channel
// RGB frames or single-channel working copies. Rows may be padded: a row
// starts every `stride` bytes and only the first `width * channels` bytes of
// it are pixel data.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
  pub data: Vec<u8>,
  pub width: usize,
  pub height: usize,
  pub channels: usize,
  pub stride: usize,
}

impl Image {
  pub fn empty() -> Image {
    Image {
      data: vec![],
      width: 0,
      height: 0,
      channels: 3,
      stride: 0,
    }
  }

  pub fn new(width: usize, height: usize, channels: usize) -> Image {
    Image::filled(width, height, channels, 0)
  }

  pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Image {
    Image {
      data: vec![value; width * height * channels],
      width,
      height,
      channels,
      stride: width * channels,
    }
  }

  // Wraps a decoded frame buffer, which may carry row padding.
  pub fn from_raw(
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
    stride: usize,
  ) -> Result<Image> {
    if channels != 1 && channels != 3 {
      return Err(TrackError::InvalidImage(format!("Unsupported channel count {}.", channels)));
    }
    if stride < width * channels {
      return Err(TrackError::InvalidImage(format!(
        "Stride {} is smaller than a row of {} bytes.", stride, width * channels)));
    }
    let needed = if height == 0 { 0 } else { (height - 1) * stride + width * channels };
    if data.len() < needed {
      return Err(TrackError::InvalidImage(format!(
        "Buffer has {} bytes, {}x{} needs {}.", data.len(), width, height, needed)));
    }
    Ok(Image { data, width, height, channels, stride })
  }

  pub fn clear(&mut self) {
    self.data.clear();
    self.width = 0;
    self.height = 0;
    self.stride = 0;
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn size(&self, dim: usize) -> usize {
    if dim == 0 { self.width } else { self.height }
  }

  pub fn bounds(&self) -> Rect {
    Rect::new(0, 0, self.width as i32, self.height as i32)
  }

  #[inline(always)]
  pub fn row_bytes(&self) -> usize {
    self.width * self.channels
  }

  #[inline(always)]
  pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
    let i = y * self.stride + x * self.channels;
    &self.data[i .. i + self.channels]
  }

  #[inline(always)]
  pub fn set_pixel(&mut self, x: usize, y: usize, value: &[u8]) {
    let i = y * self.stride + x * self.channels;
    self.data[i .. i + self.channels].copy_from_slice(&value[.. self.channels]);
  }

  pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
    let start = y * self.stride;
    let end = start + self.row_bytes();
    &mut self.data[start .. end]
  }

  // Copies out a block, returns None unless `rect` lies fully inside the image.
  // The copy is tightly packed.
  pub fn sub_image(&self, rect: &Rect) -> Option<Image> {
    if rect.is_empty() || !self.bounds().contains_rect(rect) { return None }
    let width = rect.width as usize;
    let height = rect.height as usize;
    let mut image = Image::new(width, height, self.channels);
    let ax = rect.x as usize * self.channels;
    let n = width * self.channels;
    for y in 0..height {
      let src = &self[rect.y as usize + y][ax .. ax + n];
      image.row_mut(y).copy_from_slice(src);
    }
    Some(image)
  }

  // Like `sub_image()`, but the block origin is first moved inside the image
  // and rows or columns falling outside are left black.
  pub fn sub_image_clamped(&self, rect: &Rect) -> Image {
    let width = rect.width.max(0) as usize;
    let height = rect.height.max(0) as usize;
    let mut image = Image::new(width, height, self.channels);
    let ax = rect.x.max(0) as usize;
    let ay = rect.y.max(0) as usize;
    for y in 0..height {
      if ay + y >= self.height { break }
      for x in 0..width {
        if ax + x >= self.width { break }
        image.set_pixel(x, y, self.pixel(ax + x, ay + y));
      }
    }
    image
  }

  pub fn set_sub_image(&mut self, ax: i32, ay: i32, image: &Image) {
    assert_eq!(self.channels, image.channels);
    for y in 0..image.height as i32 {
      if ay + y < 0 || ay + y >= self.height as i32 { continue }
      for x in 0..image.width as i32 {
        if ax + x < 0 || ax + x >= self.width as i32 { continue }
        self.set_pixel((ax + x) as usize, (ay + y) as usize, image.pixel(x as usize, y as usize));
      }
    }
  }

  pub fn fill_rect(&mut self, rect: &Rect, value: &[u8]) {
    let r = match rect.intersect(&self.bounds()) {
      Some(r) => r,
      None => return,
    };
    for y in r.y..r.bottom() {
      for x in r.x..r.right() {
        self.set_pixel(x as usize, y as usize, value);
      }
    }
  }

  // Single-channel luma copy. Channels are assumed to be in RGB order.
  pub fn to_grayscale(&self) -> Image {
    if self.channels == 1 { return self.clone() }
    let mut gray = Image::new(self.width, self.height, 1);
    for y in 0..self.height {
      let row = &self[y];
      let out = gray.row_mut(y);
      for x in 0..self.width {
        let p = &row[3 * x .. 3 * x + 3];
        let v = LUMA_R * p[0] as f32 + LUMA_G * p[1] as f32 + LUMA_B * p[2] as f32;
        out[x] = v.round().min(255.) as u8;
      }
    }
    gray
  }

  // Per-byte weighted average `(1 - weight) * self + weight * other`.
  pub fn blend(&self, other: &Image, weight: f32) -> Image {
    assert_eq!(self.width, other.width);
    assert_eq!(self.height, other.height);
    assert_eq!(self.channels, other.channels);
    let mut image = Image::new(self.width, self.height, self.channels);
    for y in 0..self.height {
      let a = &self[y];
      let b = &other[y];
      for (i, v) in image.row_mut(y).iter_mut().enumerate() {
        *v = ((1. - weight) * a[i] as f32 + weight * b[i] as f32).round() as u8;
      }
    }
    image
  }
}

// Row access in the manner of `image[y][x * channels + c]`, without padding.
impl Index<usize> for Image {
  type Output = [u8];
  fn index(&self, y: usize) -> &Self::Output {
    &self.data[y * self.stride .. y * self.stride + self.width * self.channels]
  }
}
