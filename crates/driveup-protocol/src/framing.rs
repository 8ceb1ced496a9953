//! Length-prefixed message framing.
//!
//! Messages are framed with a 4-byte big-endian length prefix followed by
//! the JSON payload:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! The helpers here are I/O free so that both the async socket client and
//! tests can share them.

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encodes a message to bytes with length prefix.
///
/// # Example
///
/// ```rust
/// use driveup_protocol::{encode_message, Envelope, Request};
///
/// let envelope = Envelope::new("req-1", Request::Ping);
/// let bytes = encode_message(&envelope).unwrap();
/// assert!(bytes.len() > 4);
/// ```
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(LENGTH_PREFIX_SIZE + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Validates a length prefix and returns the payload size it announces.
pub fn payload_len(prefix: [u8; LENGTH_PREFIX_SIZE]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(prefix);

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }

    Ok(len as usize)
}

/// Deserializes a payload that has already been separated from its prefix.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decodes a complete framed message (length prefix + payload).
///
/// # Example
///
/// ```rust
/// use driveup_protocol::{decode_message, encode_message, Envelope, Request};
///
/// let envelope = Envelope::new("req-1", Request::Ping);
/// let bytes = encode_message(&envelope).unwrap();
/// let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
/// assert_eq!(decoded.request_id, "req-1");
/// ```
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some(prefix) = data.first_chunk::<LENGTH_PREFIX_SIZE>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: LENGTH_PREFIX_SIZE,
            received: data.len(),
        });
    };

    let len = payload_len(*prefix)?;
    let end = LENGTH_PREFIX_SIZE + len;

    if data.len() < end {
        return Err(ProtocolError::IncompleteMessage {
            expected: end,
            received: data.len(),
        });
    }

    decode_payload(&data[LENGTH_PREFIX_SIZE..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, Envelope, Reply, Request};

    #[test]
    fn encode_writes_length_prefix() {
        let envelope = Envelope::new("req-123", Request::invoke(Command::SignOut));
        let bytes = encode_message(&envelope).unwrap();

        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - 4);

        let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn decode_incomplete_length() {
        let result: ProtocolResult<Envelope<Request>> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[0u8; 10]);

        let result: ProtocolResult<Envelope<Request>> = decode_message(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage {
                expected: 104,
                received: 14
            })
        ));
    }

    #[test]
    fn message_too_large() {
        let huge_len = MAX_MESSAGE_SIZE + 1;
        let result = payload_len(huge_len.to_be_bytes());
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn empty_message_is_rejected() {
        assert!(matches!(
            payload_len(0u32.to_be_bytes()),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn payload_len_accepts_valid_sizes() {
        assert_eq!(payload_len(17u32.to_be_bytes()).unwrap(), 17);
    }

    #[test]
    fn decode_payload_reports_bad_json() {
        let result: ProtocolResult<Reply> = decode_payload(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Serialization(_))));
    }

    #[test]
    fn consecutive_frames_decode_independently() {
        let first = encode_message(&Envelope::new("1", Reply::Ok)).unwrap();
        let second = encode_message(&Envelope::new("2", Reply::Pong)).unwrap();

        let mut stream = first.clone();
        stream.extend(&second);

        let decoded: Envelope<Reply> = decode_message(&stream).unwrap();
        assert_eq!(decoded.payload, Reply::Ok);

        let decoded: Envelope<Reply> = decode_message(&stream[first.len()..]).unwrap();
        assert_eq!(decoded.request_id, "2");
        assert_eq!(decoded.payload, Reply::Pong);
    }
}
