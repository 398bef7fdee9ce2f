//! Splits the inbound byte stream into JSON frames.
//!
//! The firmware treats each UART read as one message. Over a host stream reads
//! can split or merge messages, so values are cut at JSON boundaries instead.
//! Anything that cannot become a value is still handed on as a frame; the
//! command parser rejects and logs it.

use serde::de::IgnoredAny;
use serde_json::Deserializer;

#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_len: usize,
}

impl FrameDecoder {
    pub fn new(max_len: usize) -> Self {
        Self { buf: Vec::new(), max_len: max_len.max(1) }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append bytes and return every frame that is now complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            let start = self.buf.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(self.buf.len());
            self.buf.drain(..start);
            if self.buf.is_empty() {
                break;
            }

            let newline = self.buf.iter().position(|&b| b == b'\n');
            let mut values = Deserializer::from_slice(&self.buf).into_iter::<IgnoredAny>();
            let cut = match values.next() {
                Some(Ok(_)) => values.byte_offset(),
                Some(Err(err)) if err.is_eof() => match newline {
                    Some(i) => i,
                    None if self.buf.len() > self.max_len => self.buf.len(),
                    None => break,
                },
                // Resync at whichever comes first: the next line or the next object
                Some(Err(_)) => {
                    let brace = self.buf.iter().skip(1).position(|&b| b == b'{').map(|i| i + 1);
                    match (newline, brace) {
                        (Some(n), Some(o)) => n.min(o),
                        (Some(n), None) => n,
                        (None, Some(o)) => o,
                        (None, None) => self.buf.len(),
                    }
                }
                None => break,
            };

            let cut = cut.max(1);
            frames.push(self.buf.drain(..cut).collect());
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(frames: Vec<Vec<u8>>) -> Vec<String> {
        frames.into_iter().map(|f| String::from_utf8(f).unwrap()).collect()
    }

    #[test]
    fn splits_back_to_back_objects() {
        let mut dec = FrameDecoder::new(1024);
        let frames = dec.push(br#"{"Forward":"Down"}{"Forward":"Up"}"#);
        assert_eq!(strings(frames), vec![r#"{"Forward":"Down"}"#, r#"{"Forward":"Up"}"#]);
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn newline_separated_objects() {
        let mut dec = FrameDecoder::new(1024);
        let frames = dec.push(b"{\"BZ\":\"on\"}\r\n{\"LED\":\"off\"}\n");
        assert_eq!(strings(frames), vec![r#"{"BZ":"on"}"#, r#"{"LED":"off"}"#]);
    }

    #[test]
    fn holds_partial_object_until_complete() {
        let mut dec = FrameDecoder::new(1024);
        assert!(dec.push(br#"{"Forw"#).is_empty());
        assert!(dec.push(br#"ard":"Do"#).is_empty());
        let frames = dec.push(br#"wn"}"#);
        assert_eq!(strings(frames), vec![r#"{"Forward":"Down"}"#]);
    }

    #[test]
    fn truncated_line_is_flushed_as_garbage() {
        let mut dec = FrameDecoder::new(1024);
        let frames = dec.push(b"{\"Forward\":\n{\"Low\":\"Down\"}");
        assert_eq!(strings(frames), vec![r#"{"Forward":"#, r#"{"Low":"Down"}"#]);
    }

    #[test]
    fn syntax_error_skips_to_next_line() {
        let mut dec = FrameDecoder::new(1024);
        let frames = dec.push(b"hello world\n{\"High\":\"Down\"}");
        assert_eq!(strings(frames), vec!["hello world", r#"{"High":"Down"}"#]);
    }

    #[test]
    fn noise_before_an_object_does_not_swallow_it() {
        let mut dec = FrameDecoder::new(1024);
        let frames = dec.push(b"\xff{\"Forward\":\"Up\"}");
        assert_eq!(frames, vec![b"\xff".to_vec(), br#"{"Forward":"Up"}"#.to_vec()]);
        assert_eq!(dec.buffered(), 0);

        let frames = dec.push(b"ok{\"LED\":\"off\"}\n{\"BZ\":\"on\"}");
        assert_eq!(strings(frames), vec!["ok", r#"{"LED":"off"}"#, r#"{"BZ":"on"}"#]);
    }

    #[test]
    fn broken_object_resyncs_at_the_next_one() {
        let mut dec = FrameDecoder::new(1024);
        let frames = dec.push(br#"{"Forward":Down}{"Forward":"Up"}"#);
        assert_eq!(strings(frames), vec![r#"{"Forward":Down}"#, r#"{"Forward":"Up"}"#]);
    }

    #[test]
    fn oversized_partial_is_dropped() {
        let mut dec = FrameDecoder::new(16);
        let frames = dec.push(br#"{"RGB":"(1,2,3)","pad":"#);
        assert_eq!(frames.len(), 1);
        assert_eq!(dec.buffered(), 0);
        let frames = dec.push(br#"{"LED":"on"}"#);
        assert_eq!(strings(frames), vec![r#"{"LED":"on"}"#]);
    }
}
