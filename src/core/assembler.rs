// linetail - core/assembler.rs
//
// Line assembly: turns arbitrary byte chunks into logical records at
// newline boundaries (or max-size cuts), tracking the absolute byte
// position of every record.
//
// The assembler is deliberately byte-oriented. Positions are computed on
// the raw bytes *before* any UTF-8 decoding, so a lossy decode of invalid
// content can never skew the offset bookkeeping.

/// One assembled line (or size-capped piece of one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLine {
    /// Decoded content, without the terminating LF or an optional
    /// preceding CR.
    pub text: String,

    /// Byte offset of the line's first byte in the file it was read from.
    pub position: u64,

    /// Byte offset just past the consumed input, including the newline
    /// when the line was newline-terminated. This is the resume point a
    /// consumer would persist after processing the line.
    pub end: u64,
}

/// Streaming line assembler.
///
/// State: the pending bytes not yet terminated by a newline, the file
/// offset at which those bytes begin, and the size cap.
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    line_start: u64,
    max_line_size: usize,
}

impl LineAssembler {
    /// Create an assembler whose next byte will be at file offset
    /// `position`. `max_line_size` of zero means unlimited.
    pub fn new(position: u64, max_line_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            line_start: position,
            max_line_size,
        }
    }

    /// Number of buffered residual bytes.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discard the residual and restart position tracking at `position`.
    /// Used when the file being read is replaced (rotation) or rewound
    /// (truncation): the residual belonged to the old content and its line
    /// boundary is lost.
    pub fn reset(&mut self, position: u64) {
        self.buf.clear();
        self.line_start = position;
    }

    /// Append freshly read bytes and return every line they complete.
    ///
    /// Emission rules, applied repeatedly to the buffered bytes:
    /// - A newline within the size cap terminates a line; the text is the
    ///   bytes since line start, minus an optional trailing CR.
    /// - With a size cap N, a run of N or more bytes with no newline in the
    ///   first N is cut into an exactly-N-byte piece. Consecutive pieces of
    ///   one over-long logical line therefore have positions N apart.
    /// - Anything shorter stays buffered as the residual.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<AssembledLine> {
        self.buf.extend_from_slice(bytes);

        let mut out = Vec::new();
        let mut start = 0usize;
        loop {
            let rest = &self.buf[start..];
            let newline = rest.iter().position(|&b| b == b'\n');
            match newline {
                Some(i) if self.max_line_size == 0 || i <= self.max_line_size => {
                    let mut text_end = i;
                    if text_end > 0 && rest[text_end - 1] == b'\r' {
                        text_end -= 1;
                    }
                    let text = String::from_utf8_lossy(&rest[..text_end]).into_owned();
                    let position = self.line_start;
                    self.line_start += (i + 1) as u64;
                    start += i + 1;
                    out.push(AssembledLine {
                        text,
                        position,
                        end: self.line_start,
                    });
                }
                _ => {
                    // No newline within reach of the cap.
                    if self.max_line_size > 0 && rest.len() >= self.max_line_size {
                        let n = self.max_line_size;
                        let text = String::from_utf8_lossy(&rest[..n]).into_owned();
                        let position = self.line_start;
                        self.line_start += n as u64;
                        start += n;
                        out.push(AssembledLine {
                            text,
                            position,
                            end: self.line_start,
                        });
                    } else {
                        break;
                    }
                }
            }
        }
        self.buf.drain(..start);
        out
    }

    /// Drain the residual as a final, unterminated record.
    ///
    /// Only called when the engine terminates cleanly at end-of-file with
    /// following disabled; a residual abandoned by rotation or cancellation
    /// is discarded via [`reset`](Self::reset) instead.
    pub fn flush(&mut self) -> Option<AssembledLine> {
        if self.buf.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        let position = self.line_start;
        self.line_start += self.buf.len() as u64;
        self.buf.clear();
        Some(AssembledLine {
            text,
            position,
            end: self.line_start,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(assembler: &mut LineAssembler, input: &[u8]) -> Vec<(String, u64)> {
        assembler
            .feed(input)
            .into_iter()
            .map(|l| (l.text, l.position))
            .collect()
    }

    /// Plain newline-terminated input splits at every LF with byte-accurate
    /// positions.
    #[test]
    fn test_splits_at_newlines() {
        let mut assembler = LineAssembler::new(0, 0);
        let lines = collect(&mut assembler, b"hello\nworld\n");
        assert_eq!(
            lines,
            vec![("hello".to_string(), 0), ("world".to_string(), 6)]
        );
        assert_eq!(assembler.pending(), 0);
    }

    /// A trailing CR is stripped from the text but still counted in the
    /// consumed bytes.
    #[test]
    fn test_strips_carriage_return() {
        let mut assembler = LineAssembler::new(0, 0);
        let lines = assembler.feed(b"one\r\ntwo\n");
        assert_eq!(lines[0].text, "one");
        assert_eq!(lines[0].position, 0);
        assert_eq!(lines[0].end, 5);
        assert_eq!(lines[1].text, "two");
        assert_eq!(lines[1].position, 5);
    }

    /// Empty lines are real records.
    #[test]
    fn test_empty_lines() {
        let mut assembler = LineAssembler::new(0, 0);
        let lines = collect(&mut assembler, b"a\n\nb\n");
        assert_eq!(
            lines,
            vec![
                ("a".to_string(), 0),
                (String::new(), 2),
                ("b".to_string(), 3)
            ]
        );
    }

    /// A line spanning multiple feeds is assembled once the newline arrives,
    /// positioned at its first byte.
    #[test]
    fn test_line_across_feeds() {
        let mut assembler = LineAssembler::new(0, 0);
        assert!(assembler.feed(b"par").is_empty());
        assert!(assembler.feed(b"tial").is_empty());
        let lines = collect(&mut assembler, b" line\nnext");
        assert_eq!(lines, vec![("partial line".to_string(), 0)]);
        assert_eq!(assembler.pending(), 4);
    }

    /// The size cap cuts long lines into exact-size pieces while short
    /// newline-terminated lines pass through whole.
    #[test]
    fn test_max_line_size_cuts() {
        let mut assembler = LineAssembler::new(0, 3);
        let lines = collect(&mut assembler, b"hello\nworld\nfin\nhe");
        assert_eq!(
            lines,
            vec![
                ("hel".to_string(), 0),
                ("lo".to_string(), 3),
                ("wor".to_string(), 6),
                ("ld".to_string(), 9),
                ("fin".to_string(), 12),
            ]
        );
        // "he" is shorter than the cap and has no newline yet.
        assert_eq!(assembler.pending(), 2);
        let last = assembler.flush().expect("residual");
        assert_eq!((last.text.as_str(), last.position), ("he", 16));
        assert!(assembler.flush().is_none());
    }

    /// Pieces of one over-long logical line sit exactly cap-width apart.
    #[test]
    fn test_oversize_piece_positions() {
        let mut assembler = LineAssembler::new(0, 4);
        let lines = assembler.feed(b"abcdefghij\nk\n");
        let pieces: Vec<(String, u64)> =
            lines.into_iter().map(|l| (l.text, l.position)).collect();
        assert_eq!(
            pieces,
            vec![
                ("abcd".to_string(), 0),
                ("efgh".to_string(), 4),
                ("ij".to_string(), 8),
                ("k".to_string(), 11),
            ]
        );
    }

    /// A line of exactly cap size followed by a newline is one whole line,
    /// not a cut plus an empty record.
    #[test]
    fn test_exact_cap_line_not_split() {
        let mut assembler = LineAssembler::new(0, 3);
        let lines = collect(&mut assembler, b"fin\nxy\n");
        assert_eq!(
            lines,
            vec![("fin".to_string(), 0), ("xy".to_string(), 4)]
        );
    }

    /// Positions continue from the construction offset, and `end` lands on
    /// the byte after the newline.
    #[test]
    fn test_positions_from_nonzero_start() {
        let mut assembler = LineAssembler::new(12, 0);
        let lines = assembler.feed(b"more\ndata\n");
        assert_eq!(lines[0].position, 12);
        assert_eq!(lines[0].end, 17);
        assert_eq!(lines[1].position, 17);
        assert_eq!(lines[1].end, 22);
    }

    /// Reset discards the residual and restarts position tracking.
    #[test]
    fn test_reset_discards_residual() {
        let mut assembler = LineAssembler::new(0, 0);
        assembler.feed(b"no newline yet");
        assert!(assembler.pending() > 0);
        assembler.reset(0);
        assert_eq!(assembler.pending(), 0);
        let lines = collect(&mut assembler, b"fresh\n");
        assert_eq!(lines, vec![("fresh".to_string(), 0)]);
    }

    /// Invalid UTF-8 decodes lossily without disturbing byte positions.
    #[test]
    fn test_invalid_utf8_keeps_positions() {
        let mut assembler = LineAssembler::new(0, 0);
        let lines = assembler.feed(b"a\xff\xfeb\nnext\n");
        assert_eq!(lines[0].position, 0);
        assert_eq!(lines[0].end, 5);
        assert_eq!(lines[1].text, "next");
        assert_eq!(lines[1].position, 5);
    }
}
