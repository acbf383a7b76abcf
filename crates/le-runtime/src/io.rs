use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Writer handle bound to `*out*` / `*err*` so library functions can print.
#[derive(Clone)]
pub struct SharedWriter(Arc<Mutex<Box<dyn Write + Send>>>);

impl SharedWriter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        let mut writer = self.0.lock();
        writer.write_all(text.as_bytes())?;
        writer.flush()
    }
}

/// Reader handle bound to `*in*`.
#[derive(Clone)]
pub struct SharedReader(Arc<Mutex<Box<dyn BufRead + Send>>>);

impl SharedReader {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(reader))))
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }

    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    /// Returns `None` at end of input. The trailing newline is stripped.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.0.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// In-memory sink that can be read back, handy for capturing script output.
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_writer_feeds_capture_buffer() {
        let buffer = CaptureBuffer::new();
        let writer = SharedWriter::new(buffer.clone());
        writer.write_str("hello ").expect("write");
        writer.clone().write_str("world").expect("write");
        assert_eq!(buffer.contents(), "hello world");
    }

    #[test]
    fn shared_reader_yields_lines_then_none() {
        let reader = SharedReader::new(io::Cursor::new("a\r\nb\n"));
        assert_eq!(reader.read_line().expect("read"), Some("a".to_string()));
        assert_eq!(reader.read_line().expect("read"), Some("b".to_string()));
        assert_eq!(reader.read_line().expect("read"), None);
    }
}
