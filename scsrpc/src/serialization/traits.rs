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

//! Serialization trait definitions.

use crate::serialization::{DeserializationError, SerializationError};

/// Pluggable message encoding.
///
/// A serializer turns protocol messages into the payload bytes of a frame
/// and back. Frames are delimited by a fixed marker, so a serializer used on
/// the wire must never emit the configured delimiter inside a payload; the
/// framing layer rejects payloads that do.
///
/// # Examples
///
/// ## Implementing a custom serializer
///
/// ```rust
/// use scsrpc::serialization::{DeserializationError, SerializationError, Serializer};
///
/// struct MySerializer;
///
/// impl Serializer for MySerializer {
///     fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
///     where
///         T: serde::Serialize + ?Sized,
///     {
///         serde_json::to_vec(value).map_err(Into::into)
///     }
///
///     fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
///     where
///         T: serde::de::DeserializeOwned,
///     {
///         serde_json::from_slice(bytes).map_err(Into::into)
///     }
///
///     fn name(&self) -> &'static str {
///         "my-serializer"
///     }
/// }
/// ```
pub trait Serializer: Send + Sync + 'static {
    /// Serializes a value to payload bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`SerializationError`] if the value cannot be encoded.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized;

    /// Deserializes payload bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializationError`] if the bytes are not a valid
    /// encoding of `T`.
    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned;

    /// Returns a stable name for this format, used in logs.
    fn name(&self) -> &'static str;
}
