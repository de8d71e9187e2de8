//! Incremental reassembly of USB chunks into protocol messages.
//!
//! The GC2 streams ASCII text in arbitrarily-sized chunks. Lines end with
//! `\n`; a `\t` immediately following a newline terminates the message. The
//! device is also in the habit of abandoning a shot message mid-transmission:
//! a fresh `0H` header invalidates whatever was buffered, while a `0M` header
//! interrupts a shot without invalidating it (the partial shot is handed to
//! the caller as a salvage candidate).

use std::mem;

use crate::error::FramingError;
use crate::types::{TAG_SHOT, TAG_STATUS};

/// Default cap on buffered bytes. A healthy message is well under 1 KiB;
/// anything approaching this limit is a misbehaving device or a desynced
/// stream.
pub const DEFAULT_MAX_BUFFER: usize = 16 * 1024;

/// Output of [`MessageAssembler::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerEvent {
    /// A complete message: its lines in arrival order, header line first.
    Message(Vec<String>),
    /// A partially-assembled `0H` message that was preempted by a `0M`
    /// header. Never complete; the shot pipeline decides whether the fields
    /// it carries are worth keeping.
    SalvageCandidate(Vec<String>),
}

/// Reassembles USB chunks into messages. Buffers partial lines and partial
/// messages across [`feed`](Self::feed) calls, so it can be fed raw USB
/// transfer boundaries.
#[derive(Debug)]
pub struct MessageAssembler {
    max_buffer: usize,
    /// Bytes of the line currently being received.
    line_buf: Vec<u8>,
    /// Complete lines of the message under assembly.
    lines: Vec<String>,
    /// Byte total of `lines`, maintained to keep the overflow check O(1).
    lines_bytes: usize,
    /// The previous byte was `\n`; the next byte decides between message
    /// terminator (`\t`) and the start of a new line.
    after_newline: bool,
}

impl MessageAssembler {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            max_buffer,
            line_buf: Vec::with_capacity(128),
            lines: Vec::new(),
            lines_bytes: 0,
            after_newline: false,
        }
    }

    /// Feed one USB chunk, returning any events it completes.
    ///
    /// On overflow the assembler resets itself (the buffered partial data is
    /// lost) and returns [`FramingError::BufferOverflow`]; it remains usable
    /// for subsequent chunks.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<AssemblerEvent>, FramingError> {
        let mut events = Vec::new();

        for &byte in chunk {
            // The device pads short transfers with NULs.
            if byte == 0 {
                continue;
            }

            if self.after_newline {
                self.after_newline = false;
                if byte == b'\t' {
                    if !self.lines.is_empty() {
                        events.push(AssemblerEvent::Message(self.take_lines()));
                    }
                    continue;
                }
                // Not a terminator: the byte belongs to the next line.
            }

            if byte == b'\n' {
                self.complete_line(&mut events);
                self.after_newline = true;
                continue;
            }

            self.line_buf.push(byte);
            let size = self.line_buf.len() + self.lines_bytes;
            if size > self.max_buffer {
                let max = self.max_buffer;
                self.reset();
                return Err(FramingError::BufferOverflow { size, max });
            }
        }

        Ok(events)
    }

    /// Tag of the message under assembly, if it has a header line.
    fn current_tag(&self) -> Option<&str> {
        self.lines
            .first()
            .map(|line| line.trim())
            .and_then(|line| line.split_ascii_whitespace().next())
    }

    fn complete_line(&mut self, events: &mut Vec<AssemblerEvent>) {
        let line = String::from_utf8_lossy(&self.line_buf).into_owned();
        self.line_buf.clear();

        let tag = line.trim().split_ascii_whitespace().next().unwrap_or("");

        match tag {
            TAG_SHOT => {
                if !self.lines.is_empty() {
                    // The device abandoned the in-flight message; it is gone.
                    tracing::debug!(
                        discarded_lines = self.lines.len(),
                        "shot header preempted buffered message"
                    );
                    self.lines.clear();
                    self.lines_bytes = 0;
                }
            }
            TAG_STATUS => {
                if self.current_tag() == Some(TAG_SHOT) {
                    events.push(AssemblerEvent::SalvageCandidate(self.take_lines()));
                } else if !self.lines.is_empty() {
                    self.lines.clear();
                    self.lines_bytes = 0;
                }
            }
            _ => {
                // Skip blank lines between messages so noise cannot start a
                // headerless buffer.
                if self.lines.is_empty() && line.trim().is_empty() {
                    return;
                }
            }
        }

        self.lines_bytes += line.len();
        self.lines.push(line);
    }

    fn take_lines(&mut self) -> Vec<String> {
        self.lines_bytes = 0;
        mem::take(&mut self.lines)
    }

    fn reset(&mut self) {
        self.line_buf.clear();
        self.lines.clear();
        self.lines_bytes = 0;
        self.after_newline = false;
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SHOT: &str = "0H\nSHOT_ID=1\nSPEED_MPH=167.0\nBACK_RPM=2686\n\t";
    const STATUS: &str = "0M\nFLAGS=7\nBALLS=1\n\t";

    fn feed_all(assembler: &mut MessageAssembler, data: &str) -> Vec<AssemblerEvent> {
        assembler.feed(data.as_bytes()).expect("feed")
    }

    fn lines_of(event: &AssemblerEvent) -> &[String] {
        match event {
            AssemblerEvent::Message(lines) => lines,
            AssemblerEvent::SalvageCandidate(lines) => lines,
        }
    }

    #[test]
    fn complete_message_single_chunk() {
        let mut assembler = MessageAssembler::default();
        let events = feed_all(&mut assembler, SHOT);
        assert_eq!(events.len(), 1);
        let lines = lines_of(&events[0]);
        assert_eq!(lines[0], "0H");
        assert_eq!(lines[1], "SHOT_ID=1");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn message_split_at_every_byte_boundary() {
        for split in 1..SHOT.len() {
            let mut assembler = MessageAssembler::default();
            let mut events = feed_all(&mut assembler, &SHOT[..split]);
            events.extend(feed_all(&mut assembler, &SHOT[split..]));
            assert_eq!(events.len(), 1, "split at {split}");
            assert_eq!(lines_of(&events[0]).len(), 4, "split at {split}");
        }
    }

    #[test]
    fn split_exactly_between_newline_and_tab() {
        // The terminator straddles the chunk boundary: "...\n" | "\t".
        let head = &SHOT[..SHOT.len() - 1];
        let mut assembler = MessageAssembler::default();
        assert!(feed_all(&mut assembler, head).is_empty());
        let events = feed_all(&mut assembler, "\t");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AssemblerEvent::Message(_)));
    }

    #[test]
    fn two_messages_one_chunk() {
        let mut assembler = MessageAssembler::default();
        let combined = format!("{SHOT}{STATUS}");
        let events = feed_all(&mut assembler, &combined);
        assert_eq!(events.len(), 2);
        assert_eq!(lines_of(&events[0])[0], "0H");
        assert_eq!(lines_of(&events[1])[0], "0M");
    }

    #[test]
    fn shot_header_discards_buffered_shot() {
        let mut assembler = MessageAssembler::default();
        let truncated = "0H\nSHOT_ID=1\nSPEED_MPH=100.0\n";
        let events = feed_all(&mut assembler, truncated);
        assert!(events.is_empty());

        // A fresh shot replaces the abandoned one silently.
        let events = feed_all(&mut assembler, "0H\nSHOT_ID=2\nSPEED_MPH=150.0\n\t");
        assert_eq!(events.len(), 1);
        let lines = lines_of(&events[0]);
        assert_eq!(lines[1], "SHOT_ID=2");
        assert!(!lines.iter().any(|l| l == "SHOT_ID=1"));
    }

    #[test]
    fn status_during_shot_yields_salvage_candidate() {
        let mut assembler = MessageAssembler::default();
        let events = feed_all(&mut assembler, "0H\nSHOT_ID=5\nSPEED_MPH=140.0\n");
        assert!(events.is_empty());

        let events = feed_all(&mut assembler, STATUS);
        assert_eq!(events.len(), 2);
        match &events[0] {
            AssemblerEvent::SalvageCandidate(lines) => {
                assert_eq!(lines[0], "0H");
                assert_eq!(lines[2], "SPEED_MPH=140.0");
            }
            other => panic!("expected salvage candidate, got {other:?}"),
        }
        match &events[1] {
            AssemblerEvent::Message(lines) => assert_eq!(lines[0], "0M"),
            other => panic!("expected status message, got {other:?}"),
        }
    }

    #[test]
    fn nul_padding_is_stripped() {
        let mut assembler = MessageAssembler::default();
        let mut padded = Vec::new();
        for b in SHOT.bytes() {
            padded.push(b);
            padded.push(0);
        }
        let events = assembler.feed(&padded).expect("feed");
        assert_eq!(events.len(), 1);
        assert_eq!(lines_of(&events[0]).len(), 4);
    }

    #[test]
    fn bare_terminator_emits_nothing() {
        let mut assembler = MessageAssembler::default();
        assert!(feed_all(&mut assembler, "\n\t\n\t").is_empty());
    }

    #[test]
    fn blank_lines_between_messages_are_ignored() {
        let mut assembler = MessageAssembler::default();
        let events = feed_all(&mut assembler, &format!("\n\n{STATUS}"));
        assert_eq!(events.len(), 1);
        assert_eq!(lines_of(&events[0])[0], "0M");
    }

    #[test]
    fn overflow_resets_and_recovers() {
        let mut assembler = MessageAssembler::new(64);
        let noise = "X".repeat(100);
        assert!(matches!(
            assembler.feed(noise.as_bytes()),
            Err(FramingError::BufferOverflow { .. })
        ));

        // Still usable afterwards.
        let events = feed_all(&mut assembler, STATUS);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn overflow_counts_buffered_lines() {
        let mut assembler = MessageAssembler::new(32);
        // Individual lines fit, but the accumulated message does not.
        let err = assembler.feed(b"0H\nAAAAAAAAAAAA\nBBBBBBBBBBBB\nCCCCCCCCCCCC");
        assert!(matches!(err, Err(FramingError::BufferOverflow { .. })));
    }
}
