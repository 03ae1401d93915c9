//! Line splitting over chunk boundaries.

/// Splits a byte stream into lines, honouring `\n`, `\r\n`, and bare `\r`
/// terminators.
///
/// The splitter keeps a carry buffer so a line (or a `\r\n` pair) broken
/// across chunk boundaries is reassembled. A trailing `\r` at the end of a
/// chunk is deferred until the next chunk shows whether a `\n` follows.
#[derive(Debug, Clone, Default)]
pub struct LineSplitter {
    carry: Vec<u8>,
}

impl LineSplitter {
    /// Creates an empty splitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk, returning every complete line it closes.
    ///
    /// Returned segments exclude their terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.carry.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < self.carry.len() {
            match self.carry[i] {
                b'\n' => {
                    lines.push(self.carry[start..i].to_vec());
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    if i + 1 == self.carry.len() {
                        // Might be the first half of \r\n; wait for more input.
                        break;
                    }
                    lines.push(self.carry[start..i].to_vec());
                    i += if self.carry[i + 1] == b'\n' { 2 } else { 1 };
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.carry.drain(..start);
        lines
    }

    /// Signals end of input, returning the final segment if one remains.
    ///
    /// A deferred trailing `\r` is treated as a terminator, so `"x\r"`
    /// yields `"x"` and a lone `"\r"` yields one empty line.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.carry.is_empty() {
            return None;
        }
        let mut last = std::mem::take(&mut self.carry);
        if last.last() == Some(&b'\r') {
            last.pop();
        }
        Some(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn split_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();
        for chunk in chunks {
            for line in splitter.push(chunk) {
                out.push(String::from_utf8(line).unwrap());
            }
        }
        if let Some(last) = splitter.finish() {
            out.push(String::from_utf8(last).unwrap());
        }
        out
    }

    #[test]
    fn splits_mixed_terminators() {
        init_test("splits_mixed_terminators");
        let lines = split_all(&[b"Line 1\rLine 2\r\nLine 3\n"]);
        crate::assert_with_log!(
            lines == vec!["Line 1", "Line 2", "Line 3"],
            "bare CR, CRLF, and LF all terminate",
            vec!["Line 1", "Line 2", "Line 3"],
            lines
        );
        crate::test_complete!("splits_mixed_terminators");
    }

    #[test]
    fn lone_newline_yields_one_empty_line() {
        init_test("lone_newline_yields_one_empty_line");
        let lines = split_all(&[b"\n"]);
        crate::assert_with_log!(lines == vec![""], "one empty line", vec![""], lines);
        crate::test_complete!("lone_newline_yields_one_empty_line");
    }

    #[test]
    fn crlf_split_across_chunks_is_one_terminator() {
        init_test("crlf_split_across_chunks_is_one_terminator");
        let lines = split_all(&[b"abc\r", b"\ndef\n"]);
        crate::assert_with_log!(
            lines == vec!["abc", "def"],
            "deferred CR pairs with the LF from the next chunk",
            vec!["abc", "def"],
            lines
        );
        crate::test_complete!("crlf_split_across_chunks_is_one_terminator");
    }

    #[test]
    fn trailing_cr_at_eof_terminates() {
        init_test("trailing_cr_at_eof_terminates");
        let lines = split_all(&[b"abc\r"]);
        crate::assert_with_log!(lines == vec!["abc"], "trailing CR terminates", vec!["abc"], lines);
        crate::test_complete!("trailing_cr_at_eof_terminates");
    }

    #[test]
    fn unterminated_final_segment_is_yielded() {
        init_test("unterminated_final_segment_is_yielded");
        let lines = split_all(&[b"foo\nbar"]);
        crate::assert_with_log!(
            lines == vec!["foo", "bar"],
            "final segment without terminator",
            vec!["foo", "bar"],
            lines
        );
        crate::test_complete!("unterminated_final_segment_is_yielded");
    }

    #[test]
    fn line_split_across_many_chunks_reassembles() {
        init_test("line_split_across_many_chunks_reassembles");
        let lines = split_all(&[b"he", b"ll", b"o wo", b"rld\n", b"next"]);
        crate::assert_with_log!(
            lines == vec!["hello world", "next"],
            "carry buffer reassembles",
            vec!["hello world", "next"],
            lines
        );
        crate::test_complete!("line_split_across_many_chunks_reassembles");
    }

    #[test]
    fn empty_input_yields_no_lines() {
        init_test("empty_input_yields_no_lines");
        let lines = split_all(&[b""]);
        crate::assert_with_log!(lines.is_empty(), "no lines from empty input", true, lines.is_empty());
        crate::test_complete!("empty_input_yields_no_lines");
    }

    #[test]
    fn consecutive_terminators_yield_empty_lines() {
        init_test("consecutive_terminators_yield_empty_lines");
        let lines = split_all(&[b"a\n\n\nb\n"]);
        crate::assert_with_log!(
            lines == vec!["a", "", "", "b"],
            "blank lines preserved",
            vec!["a", "", "", "b"],
            lines
        );
        crate::test_complete!("consecutive_terminators_yield_empty_lines");
    }
}
