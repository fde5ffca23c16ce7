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

//! Frames arriving in arbitrary fragments are reassembled by the channel.

use scsrpc::channel::{CommunicationChannel, CommunicationState, Message, RequestMessage};
use scsrpc::serialization::framing::{FramingConfig, encode_frame};
use scsrpc::serialization::{JsonSerializer, Serializer};
use scsrpc::transport::MemoryTransport;
use serde_json::json;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

const GUARD: Duration = Duration::from_secs(5);

fn wire_bytes(framing: &FramingConfig, messages: &[Message]) -> Vec<u8> {
    let serializer = JsonSerializer::default();
    let mut bytes = Vec::new();
    for message in messages {
        let payload = serializer.serialize(message).unwrap();
        bytes.extend(encode_frame(&payload, &framing.delimiter, framing.max_frame_size).unwrap());
    }
    bytes
}

fn requests(count: u64) -> Vec<Message> {
    (1..=count)
        .map(|id| {
            Message::from(
                RequestMessage::new(id, "Orders", "Find").with_parameters(json!({"id": id})),
            )
        })
        .collect()
}

async fn feed_in_chunks(chunk_size: usize) {
    let framing = FramingConfig::default();
    let messages = requests(10);
    let bytes = wire_bytes(&framing, &messages);

    let (mut raw, peer) = MemoryTransport::pair_default();
    let (_channel, mut inbound) = CommunicationChannel::open(peer, framing);

    let writer = tokio::spawn(async move {
        for chunk in bytes.chunks(chunk_size) {
            raw.write_all(chunk).await.unwrap();
            raw.flush().await.unwrap();
            tokio::task::yield_now().await;
        }
        raw
    });

    for expected in &messages {
        let received = timeout(GUARD, inbound.recv()).await.unwrap().unwrap();
        assert_eq!(&received, expected, "chunk size {chunk_size}");
    }
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_single_byte_fragments() {
    feed_in_chunks(1).await;
}

#[tokio::test]
async fn test_delimiter_split_across_reads() {
    // Odd sizes put delimiter bytes on both sides of a read boundary.
    for chunk_size in [2, 3, 5, 7, 13] {
        feed_in_chunks(chunk_size).await;
    }
}

#[tokio::test]
async fn test_many_frames_in_one_read() {
    feed_in_chunks(64 * 1024).await;
}

#[tokio::test]
async fn test_custom_delimiter() {
    let framing = FramingConfig::new().with_delimiter(b"\r\n.\r\n".to_vec());
    let messages = requests(3);
    let bytes = wire_bytes(&framing, &messages);

    let (mut raw, peer) = MemoryTransport::pair_default();
    let (channel, mut inbound) = CommunicationChannel::open(peer, framing);
    raw.write_all(&bytes).await.unwrap();

    for expected in &messages {
        let received = timeout(GUARD, inbound.recv()).await.unwrap().unwrap();
        assert_eq!(&received, expected);
    }

    drop(raw);
    timeout(GUARD, channel.closed()).await.unwrap();
    assert_eq!(channel.state(), CommunicationState::Disconnected);
    assert!(inbound.recv().await.is_none());
}
