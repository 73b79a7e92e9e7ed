//! Byte-to-line assembly.

/// Buffers bytes written to one channel until a line terminator arrives.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    buf: Vec<u8>,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and iterate the lines they complete.
    ///
    /// The iterator is lazy: lines are decoded as it is advanced, and the
    /// consumed prefix is cut from the buffer once it is dropped. Anything not
    /// consumed, and any unterminated tail, stays buffered for the next call.
    pub fn accept(&mut self, bytes: &[u8]) -> Lines<'_> {
        self.buf.extend_from_slice(bytes);
        Lines {
            buf: &mut self.buf,
            read: 0,
        }
    }

    /// Drain the unterminated tail, if any.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.buf);
        Some(decode_line(&bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Lazy iterator over completed lines, without terminators.
pub struct Lines<'a> {
    buf: &'a mut Vec<u8>,
    read: usize,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.buf[self.read..];
        let end = rest.iter().position(|&b| b == b'\n')?;
        let line = decode_line(&rest[..end]);
        self.read += end + 1;
        Some(line)
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        self.buf.drain(..self.read);
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
