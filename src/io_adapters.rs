use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed reader used as the stdin of a pipeline stage.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

/// Append-only, call-scoped capture of one output stream.
///
/// Clones share the same underlying bytes: the interpreter writes through one
/// handle and the caller reads through another once evaluation has finished.
/// Writes never fail and the buffer grows without bound.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl CaptureBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff nothing has been written since construction.
    pub fn is_empty(&self) -> bool {
        self.buf.borrow().is_empty()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.borrow().len()
    }

    /// The whole accumulated content as text.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. The buffer is left intact.
    pub fn drain(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_buffer_starts_empty() {
        let buf = CaptureBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.drain(), "");
    }

    #[test]
    fn test_capture_buffer_keeps_write_order_across_clones() {
        let reader = CaptureBuffer::new();
        let mut writer = reader.clone();

        writer.write_all(b"one ").unwrap();
        write!(writer, "two {}", 3).unwrap();

        assert!(!reader.is_empty());
        assert_eq!(reader.drain(), "one two 3");
        // draining does not consume
        assert_eq!(reader.drain(), "one two 3");
    }

    #[test]
    fn test_capture_buffer_replaces_invalid_utf8() {
        let buf = CaptureBuffer::new();
        buf.clone().write_all(&[b'a', 0xff, b'b']).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.drain(), "a\u{fffd}b");
    }

    #[test]
    fn test_mem_reader_reads_everything() {
        let mut r = MemReader::new(b"piped\n".to_vec());
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        assert_eq!(s, "piped\n");
    }
}
