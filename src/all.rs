// NOTE This kind of import-all file isn't a common Rust idiom.

pub use crate::{
  block_tracker::*,
  correlation::*,
  error::*,
  forecast::*,
  image::*,
  parameters::*,
  record::*,
  template_update::*,
  track::*,
  track_point::*,
  types::*,
  visualize::*,
};

pub use {
  std::{
    borrow::Cow,
    fmt,
    ops::Index,
    sync::{
      atomic::{AtomicBool, Ordering},
      Arc,
    },
  },
  log::{debug, info, warn},
  serde::{Deserialize, Serialize},
};
