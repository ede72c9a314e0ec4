use std::io::{self, Write as _};

use crate::error::Error;

/// Trait for handling output from the `print` and `println` natives.
///
/// Implement this trait to capture or redirect output from interpreted code.
/// The default implementation `StdPrint` writes to stdout. The core never
/// writes to stdout directly; everything goes through the writer passed to
/// the evaluation entry points.
pub trait PrintWriter {
    /// Writes one piece of already-formatted output.
    ///
    /// This method must not add separators or a trailing newline; `println`
    /// emits its terminator via [`PrintWriter::write_newline`].
    fn write_text(&mut self, output: &str) -> Result<(), Error>;

    /// Writes the line terminator emitted by `println`.
    fn write_newline(&mut self) -> Result<(), Error> {
        self.write_text("\n")
    }
}

/// Default `PrintWriter` that writes to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_text(&mut self, output: &str) -> Result<(), Error> {
        let mut stdout = io::stdout();
        stdout
            .write_all(output.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| Error::host(format!("stdout write failed: {e}")))
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing or capturing print output programmatically.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    /// Creates a new empty `CollectStringPrint`.
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Returns the collected output as a string slice.
    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn write_text(&mut self, output: &str) -> Result<(), Error> {
        self.0.push_str(output);
        Ok(())
    }
}

/// `PrintWriter` that ignores all output.
///
/// Useful for suppressing print output during testing or benchmarking.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_text(&mut self, _output: &str) -> Result<(), Error> {
        Ok(())
    }
}
