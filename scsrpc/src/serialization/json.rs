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

//! JSON serializer implementation.

use crate::serialization::{DeserializationError, SerializationError, Serializer};

/// JSON serializer.
///
/// This is the default wire format. Valid UTF-8 never contains the bytes
/// `0xFE` or `0xFF`, so JSON output cannot collide with the default frame
/// delimiter.
///
/// # Examples
///
/// ```rust
/// use scsrpc::serialization::{JsonSerializer, Serializer};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Ping {
///     id: u32,
/// }
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let serializer = JsonSerializer::default();
/// let bytes = serializer.serialize(&Ping { id: 7 })?;
/// assert_eq!(bytes, br#"{"id":7}"#);
///
/// let decoded: Ping = serializer.deserialize(&bytes)?;
/// assert_eq!(decoded, Ping { id: 7 });
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Creates a serializer producing compact JSON.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Produces indented JSON. Useful when capturing traffic for debugging.
    pub fn with_pretty_print(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Produces compact JSON (the default).
    pub fn with_compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: serde::Serialize + ?Sized,
    {
        if self.pretty {
            serde_json::to_vec_pretty(value).map_err(Into::into)
        } else {
            serde_json::to_vec(value).map_err(Into::into)
        }
    }

    fn deserialize<T>(&self, bytes: &[u8]) -> Result<T, DeserializationError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(Into::into)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
