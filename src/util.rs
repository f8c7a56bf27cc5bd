use std::io::Write;

// Coloured `file:line  message` log lines for env_logger. Library paths are
// shortened to the file name.
pub fn format_log(
  buf: &mut env_logger::fmt::Formatter,
  record: &log::Record,
) -> std::io::Result<()> {
  let mut style = buf.style();
  use env_logger::fmt::Color::*;
  use log::Level::*;
  style.set_color(match record.level() {
    Error => Red,
    Warn => Yellow,
    Info => Green,
    Debug => Magenta,
    Trace => Blue,
  });

  let file = record.file().unwrap_or("?");
  let file = file.rsplit('/').next().unwrap_or(file);
  let location = format!("{}:{}", file, record.line().unwrap_or(0));
  writeln!(buf, "{}", style.value(format!("{:24}{}", location, record.args())))
}
