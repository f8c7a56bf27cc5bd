use block_track::Image;

use anyhow::{anyhow, Context, Result};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

// Decodes a video with ffmpeg into packed rgb24 frames of a fixed size.
pub struct VideoInput {
  child: Child,
  child_stdout: ChildStdout,
  width: usize,
  height: usize,
}

impl VideoInput {
  pub fn new(path: &Path, width: usize, height: usize) -> Result<VideoInput> {
    let path = path.to_str().ok_or(anyhow!("Failed to parse video path."))?;
    let scale = format!("scale={}:{}", width, height);
    let mut child = Command::new("ffmpeg")
      .args(["-loglevel", "error", "-i", path, "-vf", &scale])
      .args(["-f", "rawvideo", "-vcodec", "rawvideo", "-vsync", "vfr", "-pix_fmt", "rgb24", "-"])
      .stdout(Stdio::piped())
      .spawn()
      .context("Failed to start ffmpeg.")?;
    let child_stdout = child.stdout.take().ok_or(anyhow!("ffmpeg has no stdout."))?;
    Ok(VideoInput { child, child_stdout, width, height })
  }

  // None at the end of the video.
  pub fn read(&mut self) -> Result<Option<Image>> {
    let mut data = vec![0; self.width * self.height * 3];
    match self.child_stdout.read_exact(&mut data) {
      Ok(()) => {},
      Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
      Err(e) => return Err(e).context("Reading bytes from video input failed."),
    }
    let stride = self.width * 3;
    Ok(Some(Image::from_raw(data, self.width, self.height, 3, stride)?))
  }
}

impl Drop for VideoInput {
  fn drop(&mut self) {
    // Stopping early leaves ffmpeg blocked on the pipe.
    let _ = self.child.kill();
    let _ = self.child.wait();
  }
}
