use super::datagram::RECORD_LEN;

/// Sync byte ending every record.
pub const TERMINATOR: u8 = 0x57;

/// Scratch capacity; a stream that fills this without a terminator is corrupt.
pub const BUFFER_LEN: usize = 40;

#[derive(Debug, PartialEq, Eq)]
pub enum FrameEvent<'a> {
    /// Byte appended, no record yet.
    Pushed,
    /// Terminator seen with at least a record's worth of bytes buffered.
    /// The slice excludes the terminator and may be longer than a record.
    Candidate(&'a [u8]),
    /// Buffer full without a terminator; contents discarded.
    Overflow,
}

/// Reassembles the unframed byte stream into candidate records.
///
/// The terminator is not escaped on the wire, so a 0x57 inside the data ends
/// the frame early once enough bytes are buffered.
pub struct FrameBuffer {
    buf: [u8; BUFFER_LEN],
    idx: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; BUFFER_LEN],
            idx: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.idx
    }

    pub fn is_empty(&self) -> bool {
        self.idx == 0
    }

    pub fn reset(&mut self) {
        self.idx = 0;
    }

    pub fn feed(&mut self, b: u8) -> FrameEvent<'_> {
        if b == TERMINATOR && self.idx >= RECORD_LEN {
            let len = self.idx;
            self.idx = 0;
            FrameEvent::Candidate(&self.buf[..len])
        } else if self.idx >= BUFFER_LEN {
            // the byte that found the buffer full is dropped with it
            self.idx = 0;
            FrameEvent::Overflow
        } else {
            self.buf[self.idx] = b;
            self.idx += 1;
            FrameEvent::Pushed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_before_record_len_is_data() {
        let mut f = FrameBuffer::new();
        for _ in 0..10 {
            assert_eq!(f.feed(1), FrameEvent::Pushed);
        }
        assert_eq!(f.feed(TERMINATOR), FrameEvent::Pushed);
        assert_eq!(f.len(), 11);
    }

    #[test]
    fn candidate_after_thirty_bytes() {
        let mut f = FrameBuffer::new();
        for i in 0..30u8 {
            f.feed(i);
        }
        match f.feed(TERMINATOR) {
            FrameEvent::Candidate(data) => {
                assert_eq!(data.len(), 30);
                assert_eq!(data[29], 29);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(f.is_empty());
    }

    #[test]
    fn longer_candidate_is_passed_through() {
        let mut f = FrameBuffer::new();
        for _ in 0..31 {
            f.feed(0);
        }
        assert!(matches!(f.feed(TERMINATOR), FrameEvent::Candidate(d) if d.len() == 31));
    }

    #[test]
    fn overflow_at_capacity() {
        let mut f = FrameBuffer::new();
        for _ in 0..BUFFER_LEN {
            assert_eq!(f.feed(0), FrameEvent::Pushed);
        }
        assert_eq!(f.feed(0), FrameEvent::Overflow);
        assert!(f.is_empty());
        assert_eq!(f.feed(0), FrameEvent::Pushed);
    }
}
