// Newline-delimited framing for a raw TCP byte stream.
//
// A `LineFramer` belongs to exactly one connection. The reader appends
// whatever `read()` returned with `feed`, then calls `next_record` until it
// yields `None` before reading again. Reads may split a record anywhere or
// carry several records at once; the framer reconstructs the same record
// sequence either way.
//
// Records are kept as bytes until their terminator arrives and only then
// decoded (lossily) as UTF-8, so a multi-byte character split across two
// reads comes out intact. The terminator is `\n`; a preceding `\r` stays in
// the record and is removed by the caller's whitespace trim, as are blank
// lines.
//
// By default there is no limit on record length. `with_max_record_len` caps
// how many bytes a single record may grow to: a record that exceeds the cap
// is dropped in its entirety (including the bytes that arrive later, up to
// its terminator) and `feed` reports `FrameError::RecordTooLong`. Records
// completed in the same `feed` call are unaffected.

use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("record exceeded {max} bytes before its line terminator; discarded")]
    RecordTooLong { max: usize },
}

/// Per-connection byte-to-line decoder.
#[derive(Debug, Default)]
pub struct LineFramer {
    /// Bytes of the current, not yet terminated record.
    partial: Vec<u8>,
    /// Terminated records waiting for `next_record`.
    ready: VecDeque<Vec<u8>>,
    max_record_len: Option<usize>,
    /// Skipping the tail of an oversized record until its terminator.
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A framer that drops any record longer than `max` bytes.
    pub fn with_max_record_len(max: usize) -> Self {
        Self {
            max_record_len: Some(max),
            ..Self::default()
        }
    }

    /// Append one read's worth of bytes.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        let mut overflowed = false;

        for segment in bytes.split_inclusive(|&b| b == b'\n') {
            let (body, terminated) = match segment.split_last() {
                Some((&b'\n', body)) => (body, true),
                _ => (segment, false),
            };

            if self.discarding {
                if terminated {
                    self.discarding = false;
                }
                continue;
            }

            self.partial.extend_from_slice(body);
            if self.exceeds_limit(self.partial.len()) {
                self.partial.clear();
                self.discarding = !terminated;
                overflowed = true;
                continue;
            }

            if terminated {
                self.ready.push_back(std::mem::take(&mut self.partial));
            }
        }

        match (overflowed, self.max_record_len) {
            (true, Some(max)) => Err(FrameError::RecordTooLong { max }),
            _ => Ok(()),
        }
    }

    /// Take the next complete record, terminator removed. `None` means more
    /// bytes are needed.
    pub fn next_record(&mut self) -> Option<String> {
        self.ready
            .pop_front()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Number of buffered bytes belonging to the unterminated record.
    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }

    fn exceeds_limit(&self, len: usize) -> bool {
        self.max_record_len.is_some_and(|max| len > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(framer: &mut LineFramer) -> Vec<String> {
        std::iter::from_fn(|| framer.next_record()).collect()
    }

    /// Feed `stream` split at the given cut points and collect every record.
    fn frame_in_chunks(stream: &[u8], cuts: &[usize]) -> Vec<String> {
        let mut framer = LineFramer::new();
        let mut records = Vec::new();
        let mut start = 0;
        for cut in cuts.iter().copied().chain(std::iter::once(stream.len())) {
            let cut = cut.clamp(start, stream.len());
            framer.feed(&stream[start..cut]).unwrap();
            records.extend(drain(&mut framer));
            start = cut;
        }
        records
    }

    #[test]
    fn single_record() {
        let mut framer = LineFramer::new();
        framer.feed(b"{\"type\":\"light\"}\n").unwrap();
        assert_eq!(framer.next_record().as_deref(), Some("{\"type\":\"light\"}"));
        assert_eq!(framer.next_record(), None);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn two_records_in_one_read() {
        let mut framer = LineFramer::new();
        framer
            .feed(b"{\"type\":\"light\",\"state\":\"GREEN\"}\n{\"type\":\"light\",\"state\":\"RED\"}\n")
            .unwrap();
        assert_eq!(
            drain(&mut framer),
            vec![
                "{\"type\":\"light\",\"state\":\"GREEN\"}",
                "{\"type\":\"light\",\"state\":\"RED\"}",
            ]
        );
    }

    #[test]
    fn record_split_across_reads() {
        let mut framer = LineFramer::new();
        framer.feed(b"{").unwrap();
        assert_eq!(framer.next_record(), None);
        assert_eq!(framer.pending_len(), 1);

        framer.feed(b"\"type\":\"light\"").unwrap();
        assert_eq!(framer.next_record(), None);

        framer.feed(b"}\n{\"ty").unwrap();
        assert_eq!(framer.next_record().as_deref(), Some("{\"type\":\"light\"}"));
        assert_eq!(framer.next_record(), None);
        assert_eq!(framer.pending_len(), 4);
    }

    #[test]
    fn empty_lines_are_yielded_for_the_caller_to_skip() {
        let mut framer = LineFramer::new();
        framer.feed(b"\n\r\nA\n").unwrap();
        assert_eq!(drain(&mut framer), vec!["", "\r", "A"]);
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let text = "{\"agent_id\":\"peatón\"}\n".as_bytes();
        let split = text.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let mut framer = LineFramer::new();
        framer.feed(&text[..split]).unwrap();
        framer.feed(&text[split..]).unwrap();
        assert_eq!(framer.next_record().as_deref(), Some("{\"agent_id\":\"peatón\"}"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut framer = LineFramer::new();
        framer.feed(b"ab\xffcd\n").unwrap();
        assert_eq!(framer.next_record().as_deref(), Some("ab\u{fffd}cd"));
    }

    #[test]
    fn oversized_partial_is_discarded_until_terminator() {
        let mut framer = LineFramer::with_max_record_len(8);
        assert_eq!(framer.feed(b"ok\n0123456789"), Err(FrameError::RecordTooLong { max: 8 }));
        assert_eq!(framer.next_record().as_deref(), Some("ok"));
        assert_eq!(framer.pending_len(), 0);

        // Tail of the oversized record, then a good one.
        framer.feed(b"abcdef").unwrap();
        framer.feed(b"ghi\nfine\n").unwrap();
        assert_eq!(drain(&mut framer), vec!["fine"]);
    }

    #[test]
    fn oversized_record_completed_in_one_read() {
        let mut framer = LineFramer::with_max_record_len(4);
        assert!(framer.feed(b"toolong\nok\n").is_err());
        assert_eq!(drain(&mut framer), vec!["ok"]);
    }

    #[test]
    fn record_at_limit_is_kept() {
        let mut framer = LineFramer::with_max_record_len(4);
        framer.feed(b"12").unwrap();
        framer.feed(b"34\n").unwrap();
        assert_eq!(drain(&mut framer), vec!["1234"]);
    }

    #[test]
    fn byte_at_a_time_matches_whole_stream() {
        let stream = b"{\"a\":1}\n\n{\"b\":2}\r\n{\"c\":";
        let whole = frame_in_chunks(stream, &[]);
        let cuts: Vec<usize> = (1..stream.len()).collect();
        assert_eq!(frame_in_chunks(stream, &cuts), whole);
        assert_eq!(whole, vec!["{\"a\":1}", "", "{\"b\":2}\r"]);
    }

    proptest! {
        #[test]
        fn chunk_boundaries_do_not_change_records(
            lines in prop::collection::vec("[a-z{}\":,0-9 é]{0,12}", 0..8),
            trailing in "[a-z]{0,5}",
            mut cuts in prop::collection::vec(0usize..128, 0..10),
        ) {
            let mut stream = String::new();
            for line in &lines {
                stream.push_str(line);
                stream.push('\n');
            }
            stream.push_str(&trailing);
            let bytes = stream.as_bytes();
            cuts.sort_unstable();

            let whole = frame_in_chunks(bytes, &[]);
            prop_assert_eq!(&whole, &lines);
            prop_assert_eq!(frame_in_chunks(bytes, &cuts), whole);
        }
    }
}
