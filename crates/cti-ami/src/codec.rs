//! Line framing for the manager protocol
//!
//! The first line sent by the PBX is a banner (`Asterisk Call Manager/x.y`).
//! After that every unit is a block of `Key: Value` lines terminated by an
//! empty line.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::action::AmiAction;
use crate::error::AmiError;
use crate::record::AmiRecord;

/// Upper bound for a single undelimited block
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// One decoded unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmiFrame {
    Greeting(String),
    Record(AmiRecord),
}

#[derive(Debug, Default)]
pub struct AmiCodec {
    greeted: bool,
}

impl AmiCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec for a stream whose banner was already consumed
    pub fn greeted() -> Self {
        Self { greeted: true }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position and length of the first block terminator
fn block_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(buf, b"\r\n\r\n").map(|p| (p, 4));
    let lf = find(buf, b"\n\n").map(|p| (p, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

impl Decoder for AmiCodec {
    type Item = AmiFrame;
    type Error = AmiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AmiFrame>, AmiError> {
        if !self.greeted {
            let Some(pos) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(AmiError::FrameTooLarge(MAX_FRAME_SIZE));
                }
                return Ok(None);
            };
            let line = src.split_to(pos + 1);
            self.greeted = true;
            let banner = String::from_utf8_lossy(&line).trim().to_string();
            return Ok(Some(AmiFrame::Greeting(banner)));
        }

        loop {
            let Some((pos, len)) = block_end(src) else {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(AmiError::FrameTooLarge(MAX_FRAME_SIZE));
                }
                return Ok(None);
            };

            let block = src.split_to(pos);
            src.advance(len);

            let text = String::from_utf8_lossy(&block);
            if text.trim().is_empty() {
                continue;
            }

            match AmiRecord::parse(&text) {
                Some(record) => return Ok(Some(AmiFrame::Record(record))),
                None => {
                    warn!("Skipping malformed manager block ({} bytes)", block.len());
                    continue;
                }
            }
        }
    }
}

impl Encoder<AmiAction> for AmiCodec {
    type Error = AmiError;

    fn encode(&mut self, action: AmiAction, dst: &mut BytesMut) -> Result<(), AmiError> {
        let wire = action.encode();
        dst.reserve(wire.len());
        dst.put_slice(wire.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeted_codec() -> AmiCodec {
        AmiCodec::greeted()
    }

    #[test]
    fn test_greeting_then_record() {
        let mut codec = AmiCodec::new();
        let mut buf = BytesMut::from(
            "Asterisk Call Manager/5.0.1\r\nResponse: Success\r\nMessage: Authentication accepted\r\n\r\n",
        );

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(AmiFrame::Greeting("Asterisk Call Manager/5.0.1".to_string()))
        );
        match codec.decode(&mut buf).unwrap() {
            Some(AmiFrame::Record(record)) => assert!(record.is_success()),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_partial_block_waits() {
        let mut codec = greeted_codec();
        let mut buf = BytesMut::from("Event: Hangup\r\nChannel: PJSIP/214-0001\r\n");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\r\n");
        let frame = codec.decode(&mut buf).unwrap();
        assert!(matches!(frame, Some(AmiFrame::Record(r)) if r.event_name() == Some("Hangup")));
    }

    #[test]
    fn test_bare_lf_and_skipped_garbage() {
        let mut codec = greeted_codec();
        let mut buf = BytesMut::from("no separator here\n\n\n\nEvent: Dial\nSubEvent: Begin\n\n");
        let frame = codec.decode(&mut buf).unwrap();
        assert!(matches!(frame, Some(AmiFrame::Record(r)) if r.get("subevent") == Some("Begin")));
    }

    #[test]
    fn test_oversized_frame() {
        let mut codec = greeted_codec();
        let mut buf = BytesMut::from(vec![b'a'; MAX_FRAME_SIZE + 1].as_slice());
        assert!(matches!(codec.decode(&mut buf), Err(AmiError::FrameTooLarge(_))));
    }

    #[tokio::test]
    async fn test_records_split_across_reads() {
        use futures::StreamExt;
        use tokio_util::codec::FramedRead;

        let stream = tokio_test::io::Builder::new()
            .read(b"Asterisk Call Manager/5.0.1\r\nEvent: Newstate\r\nChan")
            .read(b"nel: PJSIP/214-00000001\r\n\r\nEvent: Hangup\r\n\r\n")
            .build();
        let mut frames = FramedRead::new(stream, AmiCodec::new());

        assert!(matches!(frames.next().await, Some(Ok(AmiFrame::Greeting(_)))));
        match frames.next().await {
            Some(Ok(AmiFrame::Record(record))) => {
                assert_eq!(record.get("channel"), Some("PJSIP/214-00000001"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(matches!(
            frames.next().await,
            Some(Ok(AmiFrame::Record(r))) if r.event_name() == Some("Hangup")
        ));
        assert!(frames.next().await.is_none());
    }

    #[test]
    fn test_encode_action() {
        let mut codec = greeted_codec();
        let mut dst = BytesMut::new();
        codec
            .encode(AmiAction::new("Ping").with_action_id("ping_1"), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"Action: Ping\r\nActionID: ping_1\r\n\r\n");
    }
}
