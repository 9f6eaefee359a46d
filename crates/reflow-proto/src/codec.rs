//! Newline-delimited JSON framing for the TMS serial link.
//!
//! Every frame, in either direction, is a single JSON object followed by
//! `\n`. This is deliberately simpler than a binary, CRC-checked framing:
//! the link runs at 115200 baud over a few meters of cable, not a noisy
//! stepper bus, so the wire format favors being trivially greppable over
//! a serial console during bring-up.

use crate::message::{InboundFrame, OutboundFrame};
use crate::Error;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frames larger than this are almost certainly line noise or a wedged
/// MCU talking garbage; refuse to buffer them indefinitely.
const MAX_FRAME_SIZE: usize = 4096;

/// Codec for the newline-delimited JSON frames exchanged with the TMS.
#[derive(Debug, Default)]
pub struct TmsLineCodec {
    _priv: (),
}

impl TmsLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder<OutboundFrame> for TmsLineCodec {
    type Error = Error;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(&json);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

impl Decoder for TmsLineCodec {
    type Item = InboundFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(newline_pos) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_FRAME_SIZE {
                let len = src.len();
                src.clear();
                return Err(Error::FrameTooLarge(len, MAX_FRAME_SIZE));
            }
            return Ok(None);
        };

        let mut line = src.split_to(newline_pos);
        src.advance(1); // consume the newline itself

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.is_empty() {
            return Ok(None);
        }

        let frame: InboundFrame = serde_json::from_slice(&line)?;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OvenState;

    #[test]
    fn encodes_outbound_frame_as_single_json_line() {
        let mut codec = TmsLineCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(
                OutboundFrame {
                    state: OvenState::Heating,
                    pwm: 75,
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn decode_returns_none_on_partial_frame() {
        let mut codec = TmsLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"time\":1,\"current\":25.0"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_parses_one_complete_status_frame_per_call() {
        let mut codec = TmsLineCodec::new();
        let mut buf = BytesMut::from(
            &b"{\"time\":1,\"current\":25.0,\"state\":0,\"pwm\":0,\"door\":\"closed\",\"error\":0}\n"[..],
        );
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(frame, InboundFrame::Status(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let mut codec = TmsLineCodec::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_FRAME_SIZE + 1].as_slice());
        assert!(codec.decode(&mut buf).is_err());
    }
}
