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

//! Serialization layer for SCSRPC.
//!
//! # Overview
//!
//! The serialization layer consists of:
//!
//! - **[`Serializer`] trait**: pluggable payload encoding
//! - **[`JsonSerializer`]**: the default, human-readable wire format
//! - **[`marker`] module**: delimiter search over byte windows
//! - **[`framing`] module**: delimiter-terminated message framing
//! - **Error types**: [`SerializationError`] and [`DeserializationError`]
//!
//! # Message Framing
//!
//! Every message on a connection is its serialized payload followed by a
//! fixed delimiter (`FF FE FF FE` by default):
//!
//! ```text
//! +----------------------+------------------+
//! | Payload (N bytes)    | Delimiter        |
//! +----------------------+------------------+
//! ```
//!
//! The receiver searches for the delimiter with
//! [`search_mark_in`](marker::search_mark_in), which also reports a delimiter
//! cut off by the end of a read so the next read can resume at its start.
//!
//! # Example
//!
//! ```rust
//! use scsrpc::serialization::framing::{FrameDecoder, FramingConfig, encode_frame};
//! use scsrpc::serialization::{JsonSerializer, Serializer};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FramingConfig::default();
//! let serializer = JsonSerializer::default();
//!
//! let payload = serializer.serialize(&"hello")?;
//! let wire = encode_frame(&payload, &config.delimiter, config.max_frame_size)?;
//!
//! let mut decoder = FrameDecoder::from_config(&config);
//! let frames = decoder.decode(&wire)?;
//! let text: String = serializer.deserialize(&frames[0])?;
//! assert_eq!(text, "hello");
//! # Ok(())
//! # }
//! ```

mod error;
pub mod framing;
mod json;
pub mod marker;
mod traits;

pub use error::{DeserializationError, SerializationError};
pub use json::JsonSerializer;
pub use traits::Serializer;
