//! Console output that shares the terminal with the progress bar.

use std::io::{self, Write};

use indicatif::ProgressBar;
use tracing_subscriber::fmt::MakeWriter;

/// Writes log lines to stderr while the progress bar is suspended.
///
/// With a hidden bar this is a plain stderr writer.
#[derive(Clone)]
pub struct BarWriter {
    bar: ProgressBar,
}

impl BarWriter {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarWriter {
    type Writer = BarWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_through_hidden_bar() {
        let bar = ProgressBar::hidden();
        let mut writer = BarWriter::new(bar.clone()).make_writer();

        assert_eq!(writer.write(b"log line\n").unwrap(), 9);
        assert!(writer.flush().is_ok());
        assert!(bar.is_hidden());
    }
}
