//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Delimiter-based message framing.
//!
//! Each message travels as its serialized payload followed by a fixed
//! multi-byte delimiter:
//!
//! ```text
//! +----------------------+-------------------+----------------------+----
//! | Payload (N bytes)    | Delimiter (D)     | Payload (M bytes)    | ...
//! +----------------------+-------------------+----------------------+----
//! ```
//!
//! The receive side feeds raw socket reads into a [`FrameDecoder`], which uses
//! the [marker search](crate::serialization::marker) to cut complete frames
//! out of its buffer. When a read ends in the middle of a delimiter the
//! decoder remembers where the partial match started and resumes from there
//! on the next read, so no byte is scanned twice.

use crate::serialization::marker::{MarkMatch, clone_range, search_mark, search_mark_in};
use crate::serialization::{DeserializationError, SerializationError};
use crate::transport::TransportError;
use serde::{Deserialize, Serialize};

/// Default frame delimiter.
///
/// `0xFE` and `0xFF` never appear in UTF-8, so text encodings such as JSON
/// cannot produce this sequence.
pub const DEFAULT_DELIMITER: [u8; 4] = [0xFF, 0xFE, 0xFF, 0xFE];

/// Maximum payload size accepted by default (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default size of a single socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Framing parameters shared by both ends of a connection.
///
/// # Examples
///
/// ```rust
/// use scsrpc::serialization::framing::FramingConfig;
///
/// let config = FramingConfig::new()
///     .with_delimiter(b"\r\n.\r\n".to_vec())
///     .with_max_frame_size(1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Marker appended after every payload.
    pub delimiter: Vec<u8>,

    /// Largest payload accepted before the connection is considered corrupt.
    pub max_frame_size: usize,

    /// Size of each socket read.
    pub read_buffer_size: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_vec(),
            max_frame_size: MAX_FRAME_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl FramingConfig {
    /// Creates the default framing configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the frame delimiter.
    pub fn with_delimiter(mut self, delimiter: Vec<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the maximum payload size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets the socket read size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Checks that the configuration can frame messages.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] for an empty delimiter
    /// or a zero frame/read size.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.delimiter.is_empty() {
            return Err(TransportError::InvalidConfiguration {
                reason: "frame delimiter must not be empty".to_string(),
            });
        }
        if self.max_frame_size == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "max_frame_size must be greater than 0".to_string(),
            });
        }
        if self.read_buffer_size == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "read_buffer_size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Appends the delimiter to `payload`, producing the bytes of one frame.
///
/// # Errors
///
/// Fails if the payload exceeds `max_frame_size` or contains the delimiter,
/// either of which would corrupt the stream for the receiver.
pub fn encode_frame(
    payload: &[u8],
    delimiter: &[u8],
    max_frame_size: usize,
) -> Result<Vec<u8>, SerializationError> {
    if payload.len() > max_frame_size {
        return Err(SerializationError::new(format!(
            "Frame size {} exceeds maximum allowed size {}",
            payload.len(),
            max_frame_size
        )));
    }
    if let MarkMatch::Found(index) = search_mark(payload, delimiter) {
        return Err(SerializationError::new(format!(
            "Payload contains the frame delimiter at offset {}",
            index
        )));
    }

    let mut frame = Vec::with_capacity(payload.len() + delimiter.len());
    frame.extend_from_slice(payload);
    frame.extend_from_slice(delimiter);
    Ok(frame)
}

/// Incremental frame extractor for one connection's receive stream.
///
/// Empty frames (two delimiters back to back) are skipped.
///
/// # Examples
///
/// ```rust
/// use scsrpc::serialization::framing::FrameDecoder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut decoder = FrameDecoder::new(b"||".to_vec(), 1024);
///
/// decoder.push(b"first||sec");
/// assert_eq!(decoder.next_frame()?, Some(b"first".to_vec()));
/// assert_eq!(decoder.next_frame()?, None);
///
/// decoder.push(b"ond|");
/// assert_eq!(decoder.next_frame()?, None);
/// decoder.push(b"|");
/// assert_eq!(decoder.next_frame()?, Some(b"second".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    delimiter: Vec<u8>,
    max_frame_size: usize,
    buffer: Vec<u8>,
    /// Bytes before this offset are known not to start a delimiter.
    scan_from: usize,
}

impl FrameDecoder {
    /// Creates a decoder for the given delimiter and payload limit.
    pub fn new(delimiter: Vec<u8>, max_frame_size: usize) -> Self {
        Self {
            delimiter,
            max_frame_size,
            buffer: Vec::new(),
            scan_from: 0,
        }
    }

    /// Creates a decoder from a framing configuration.
    pub fn from_config(config: &FramingConfig) -> Self {
        Self::new(config.delimiter.clone(), config.max_frame_size)
    }

    /// Appends bytes read from the socket.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the number of buffered bytes not yet emitted as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extracts the next complete frame payload, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializationError`] once the pending payload grows past
    /// the configured maximum. The stream cannot be resynchronized after that.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, DeserializationError> {
        loop {
            let len = self.buffer.len();
            match search_mark_in(
                &self.buffer,
                self.scan_from,
                len - self.scan_from,
                &self.delimiter,
            ) {
                MarkMatch::Found(index) => {
                    self.check_size(index)?;
                    let frame = clone_range(&self.buffer, 0, index);
                    self.buffer.drain(..index + self.delimiter.len());
                    self.scan_from = 0;
                    if frame.is_empty() {
                        continue;
                    }
                    return Ok(Some(frame));
                }
                MarkMatch::Partial(matched) => {
                    self.scan_from = len - matched;
                    self.check_size(self.scan_from)?;
                    return Ok(None);
                }
                MarkMatch::NotFound => {
                    self.scan_from = len;
                    self.check_size(self.scan_from)?;
                    return Ok(None);
                }
            }
        }
    }

    /// Pushes `bytes` and drains every complete frame.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, DeserializationError> {
        self.push(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn check_size(&self, payload_len: usize) -> Result<(), DeserializationError> {
        if payload_len > self.max_frame_size {
            return Err(DeserializationError::new(format!(
                "Frame size {} exceeds maximum allowed size {}",
                payload_len, self.max_frame_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{JsonSerializer, Serializer};

    fn decoder() -> FrameDecoder {
        FrameDecoder::from_config(&FramingConfig::default())
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        encode_frame(payload, &DEFAULT_DELIMITER, MAX_FRAME_SIZE).unwrap()
    }

    #[test]
    fn test_encode_frame_appends_delimiter() {
        let bytes = frame(b"hello");
        assert_eq!(&bytes[..5], b"hello");
        assert_eq!(&bytes[5..], &DEFAULT_DELIMITER);
    }

    #[test]
    fn test_encode_frame_rejects_embedded_delimiter() {
        let mut payload = b"abc".to_vec();
        payload.extend_from_slice(&DEFAULT_DELIMITER);
        let result = encode_frame(&payload, &DEFAULT_DELIMITER, MAX_FRAME_SIZE);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_frame_too_large() {
        let result = encode_frame(&[0u8; 11], &DEFAULT_DELIMITER, 10);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_multiple_frames_in_one_read() {
        let mut bytes = frame(b"one");
        bytes.extend(frame(b"two"));
        bytes.extend(frame(b"three"));

        let frames = decoder().decode(&bytes).unwrap();
        assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn test_decode_byte_at_a_time() {
        let mut bytes = frame(b"first");
        bytes.extend(frame(b"second"));

        let mut decoder = decoder();
        let mut frames = Vec::new();
        for byte in &bytes {
            frames.extend(decoder.decode(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(frames, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_delimiter_split_across_reads() {
        let bytes = frame(b"payload");
        let mut decoder = decoder();

        // Everything but the last two delimiter bytes.
        assert!(decoder.decode(&bytes[..bytes.len() - 2]).unwrap().is_empty());
        assert_eq!(decoder.scan_from, b"payload".len());

        let frames = decoder.decode(&bytes[bytes.len() - 2..]).unwrap();
        assert_eq!(frames, vec![b"payload".to_vec()]);
    }

    #[test]
    fn test_decode_false_partial_is_kept_as_payload() {
        let mut decoder = FrameDecoder::new(b"XYZ".to_vec(), 64);
        assert!(decoder.decode(b"abcXY").unwrap().is_empty());
        let frames = decoder.decode(b"Q-XYZ").unwrap();
        assert_eq!(frames, vec![b"abcXYQ-".to_vec()]);
    }

    #[test]
    fn test_decode_retains_trailing_partial_frame() {
        let mut bytes = frame(b"done");
        bytes.extend_from_slice(b"pend");

        let mut decoder = decoder();
        assert_eq!(decoder.decode(&bytes).unwrap(), vec![b"done".to_vec()]);
        assert_eq!(decoder.buffered(), 4);
    }

    #[test]
    fn test_decode_skips_empty_frames() {
        let mut bytes = DEFAULT_DELIMITER.to_vec();
        bytes.extend(frame(b"x"));
        assert_eq!(decoder().decode(&bytes).unwrap(), vec![b"x".to_vec()]);
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut decoder = FrameDecoder::new(DEFAULT_DELIMITER.to_vec(), 8);
        assert!(decoder.decode(b"12345678").is_ok());
        assert!(decoder.decode(b"9").is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(FramingConfig::default().validate().is_ok());
        assert!(FramingConfig::new().with_delimiter(Vec::new()).validate().is_err());
        assert!(FramingConfig::new().with_max_frame_size(0).validate().is_err());
        assert!(FramingConfig::new().with_read_buffer_size(0).validate().is_err());
    }

    #[test]
    fn test_serialized_messages_survive_framing() {
        let config = FramingConfig::default();
        let serializer = JsonSerializer::default();
        let mut wire = Vec::new();

        for value in [vec!["a", "b"], vec!["c"]] {
            let payload = serializer.serialize(&value).unwrap();
            wire.extend(encode_frame(&payload, &config.delimiter, config.max_frame_size).unwrap());
        }

        let frames = FrameDecoder::from_config(&config).decode(&wire).unwrap();
        assert_eq!(frames.len(), 2);
        let first: Vec<String> = serializer.deserialize(&frames[0]).unwrap();
        assert_eq!(first, vec!["a", "b"]);
    }
}
