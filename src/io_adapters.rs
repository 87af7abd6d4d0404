use std::fmt;
use std::io::{self, Result as IoResult, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared, thread-safe output sink handed to commands.
///
/// Clones write to the same underlying writer, so commands running on the executor
/// thread and the interpreter printing diagnostics interleave on one stream. The sink
/// also carries whether ANSI colors may be used.
#[derive(Clone)]
pub struct Output {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
    color: bool,
}

impl Output {
    /// Wrap any writer. Colors are off.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
            color: false,
        }
    }

    /// Process standard output, colored.
    pub fn stdout() -> Self {
        Self::new(io::stdout()).with_color(true)
    }

    /// In-memory sink and a handle to read back what was written.
    pub fn memory() -> (Self, MemHandle) {
        let (writer, handle) = MemWriter::with_handle();
        (Self::new(writer), handle)
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Whether ANSI styling should be written.
    pub fn color(&self) -> bool {
        self.color
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        // a command panicking mid-write leaves the sink usable
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl Write for Output {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.lock().write(data)
    }

    fn write_all(&mut self, data: &[u8]) -> IoResult<()> {
        self.lock().write_all(data)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.lock().flush()
    }
}

/// Memory-backed writer for capturing command output.
#[derive(Clone, Default)]
pub struct MemWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

/// Read side of a [`MemWriter`].
#[derive(Clone, Default)]
pub struct MemHandle {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create writer and return (writer, handle).
    pub fn with_handle() -> (Self, MemHandle) {
        let writer = MemWriter::new();
        let handle = MemHandle {
            buf: Arc::clone(&writer.buf),
        };
        (writer, handle)
    }
}

impl MemHandle {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Drain what was written so far.
    pub fn take(&self) -> String {
        let mut buf = self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let text = String::from_utf8_lossy(&buf).into_owned();
        buf.clear();
        text
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_the_sink() {
        let (output, handle) = Output::memory();
        let mut a = output.clone();
        let mut b = output;
        write!(a, "one ").unwrap();
        write!(b, "two").unwrap();
        assert_eq!(handle.contents(), "one two");
    }

    #[test]
    fn test_writes_from_other_threads_are_captured() {
        let (output, handle) = Output::memory();
        let mut remote = output.clone();
        thread::spawn(move || writeln!(remote, "from worker").unwrap())
            .join()
            .unwrap();
        assert_eq!(handle.take(), "from worker\n");
        assert_eq!(handle.contents(), "");
    }

    #[test]
    fn test_color_is_opt_in() {
        let (output, _) = Output::memory();
        assert!(!output.color());
        assert!(output.with_color(true).color());
    }
}
