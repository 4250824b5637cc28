//! End-to-end round trips through the streaming and buffer APIs.

use std::io::{Cursor, Read, Write};

use parbgzf::{
    compress_parallel, decompress_parallel, BgzfReader, BgzfWriter, CompressionLevel, EofStatus,
    PipelineConfig, DEFAULT_CHUNK_SIZE, EOF_BLOCK, MAX_BLOCK_SIZE, MAX_PAYLOAD,
};

/// Mixed-compressibility test data: runs, a counter pattern, and a
/// pseudo-random tail.
fn test_data(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut state = 0x2545f491u32;
    for i in 0..len {
        let byte = match i % 3 {
            0 => 0x41,
            1 => (i / 7 % 256) as u8,
            _ => {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            }
        };
        data.push(byte);
    }
    data
}

fn encode(data: &[u8], config: PipelineConfig) -> Vec<u8> {
    let mut writer = BgzfWriter::with_config(Vec::new(), config);
    writer.write_all(data).unwrap();
    writer.into_inner().unwrap()
}

fn decode(encoded: Vec<u8>, config: PipelineConfig) -> Vec<u8> {
    let mut reader = BgzfReader::with_config(Cursor::new(encoded), config);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn test_multi_block_round_trip() {
    let data = test_data(200_000);
    let encoded = encode(&data, PipelineConfig::default());

    // 200000 bytes span four chunks at the default chunk size.
    assert_eq!(data.len() / DEFAULT_CHUNK_SIZE + 1, 4);
    assert!(encoded.ends_with(&EOF_BLOCK));

    assert_eq!(decode(encoded, PipelineConfig::default()), data);
}

#[test]
fn test_round_trip_all_worker_counts() {
    let data = test_data(300_000);
    let baseline = encode(&data, PipelineConfig::default().worker_threads(1));
    for workers in 1..=8 {
        let config = PipelineConfig::default().worker_threads(workers);
        let encoded = encode(&data, config.clone());
        assert_eq!(encoded, baseline, "encode differs at workers={}", workers);
        assert_eq!(
            decode(encoded, config),
            data,
            "decode differs at workers={}",
            workers
        );
    }
}

#[test]
fn test_streaming_and_buffer_apis_agree() {
    let data = test_data(150_000);
    let streamed = encode(&data, PipelineConfig::default());
    let batched = compress_parallel(&data, CompressionLevel::default()).unwrap();
    assert_eq!(streamed, batched);
    assert_eq!(decompress_parallel(&streamed).unwrap(), data);
    assert_eq!(decode(batched, PipelineConfig::default()), data);
}

#[test]
fn test_chunk_boundary_lengths_round_trip() {
    for len in [
        DEFAULT_CHUNK_SIZE - 1,
        DEFAULT_CHUNK_SIZE,
        DEFAULT_CHUNK_SIZE + 1,
        MAX_PAYLOAD,
    ] {
        let data = test_data(len);
        let encoded = encode(&data, PipelineConfig::default());
        assert_eq!(decode(encoded, PipelineConfig::default()), data, "len={}", len);
    }
}

#[test]
fn test_every_block_within_size_limits() {
    // Incompressible input is the worst case for encoded block size.
    let data: Vec<u8> = {
        let mut state = 0x6c078965u64;
        (0..DEFAULT_CHUNK_SIZE * 2)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                (state >> 33) as u8
            })
            .collect()
    };
    let encoded = encode(&data, PipelineConfig::default());

    let mut offset = 0usize;
    while offset < encoded.len() {
        let bsize = u16::from_le_bytes([encoded[offset + 16], encoded[offset + 17]]) as usize + 1;
        assert!(bsize <= MAX_BLOCK_SIZE, "block at {} spans {} bytes", offset, bsize);
        let isize_at = offset + bsize - 4;
        let isize = u32::from_le_bytes([
            encoded[isize_at],
            encoded[isize_at + 1],
            encoded[isize_at + 2],
            encoded[isize_at + 3],
        ]);
        assert!(isize as usize <= MAX_PAYLOAD);
        offset += bsize;
    }
    assert_eq!(offset, encoded.len());
}

#[test]
fn test_single_byte_stream() {
    let encoded = encode(b"x", PipelineConfig::default());
    assert_eq!(decode(encoded, PipelineConfig::default()), b"x");
}

#[test]
fn test_bit_flip_in_payload_fails_decode() {
    let data = test_data(100_000);
    let mut encoded = encode(&data, PipelineConfig::default());
    // Flip a bit inside the second block's compressed payload.
    let target = encoded.len() / 2;
    encoded[target] ^= 0x10;

    let mut reader = BgzfReader::new(Cursor::new(encoded));
    let mut out = Vec::new();
    assert!(reader.read_to_end(&mut out).is_err());
}

#[test]
fn test_failure_position_is_stable_across_workers() {
    // A corrupted later block must never poison bytes that precede it.
    let data = test_data(200_000);
    let mut encoded = encode(&data, PipelineConfig::default());
    let last_block_at = encoded.len() - EOF_BLOCK.len() - 100;
    encoded[last_block_at] ^= 0xff;

    for workers in [1, 4] {
        let config = PipelineConfig::default().worker_threads(workers);
        let mut reader = BgzfReader::with_config(Cursor::new(encoded.clone()), config);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
        assert_eq!(out, data[..out.len()], "prefix corrupted at workers={}", workers);
        assert_eq!(out.len() % DEFAULT_CHUNK_SIZE, 0);
    }
}

#[test]
fn test_error_is_sticky() {
    let mut encoded = encode(&test_data(50_000), PipelineConfig::default());
    encoded[30] ^= 0x40;
    let mut reader = BgzfReader::new(Cursor::new(encoded));
    let mut out = Vec::new();
    assert!(reader.read_to_end(&mut out).is_err());
    let mut buf = [0u8; 16];
    assert!(reader.read(&mut buf).is_err());
}

#[test]
fn test_truncated_tail_tolerated_by_default() {
    let data = test_data(10_000);
    let encoded = encode(&data, PipelineConfig::default().write_eof_marker(false));
    let mut reader = BgzfReader::new(Cursor::new(encoded));
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
    assert_eq!(reader.eof_status(), EofStatus::Truncated);
}

#[test]
fn test_marker_reported_when_present() {
    let encoded = encode(b"abc", PipelineConfig::default());
    let mut reader = BgzfReader::new(Cursor::new(encoded));
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(reader.eof_status(), EofStatus::Marker);
}

#[test]
fn test_compression_levels_round_trip() {
    let data = test_data(80_000);
    for level in [CompressionLevel::fast(), CompressionLevel::best()] {
        let config = PipelineConfig::default().compression_level(level);
        let encoded = encode(&data, config);
        assert_eq!(decode(encoded, PipelineConfig::default()), data);
    }
}

#[test]
fn test_decode_order_preserved_under_random_stage_delay() {
    use parbgzf::deflate::{Decompressor, DeflateDecompressor};
    use parbgzf::pipeline::Codecs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // Sleeps a pseudo-random duration per block so completions land far out
    // of submission order.
    struct JitteryDecompressor {
        state: AtomicU32,
    }

    impl Decompressor for JitteryDecompressor {
        fn decompress(&self, data: &[u8], max_len: usize) -> parbgzf::Result<Vec<u8>> {
            let mut s = self.state.fetch_add(0x9e3779b9, Ordering::Relaxed);
            s ^= s << 13;
            s ^= s >> 17;
            std::thread::sleep(Duration::from_millis(u64::from(s % 10)));
            DeflateDecompressor.decompress(data, max_len)
        }
    }

    let data = test_data(400_000);
    let encoded = encode(&data, PipelineConfig::default());
    let serial = decode(encoded.clone(), PipelineConfig::default().worker_threads(1));

    let codecs = Codecs {
        decompressor: Arc::new(JitteryDecompressor {
            state: AtomicU32::new(7),
        }),
        ..Codecs::default()
    };
    let config = PipelineConfig::default().worker_threads(4).queue_capacity(8);
    let mut reader = BgzfReader::with_codecs(Cursor::new(encoded), config, codecs);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, serial);
    assert_eq!(out, data);
}

#[test]
fn test_encode_order_preserved_under_random_stage_delay() {
    use parbgzf::deflate::{Compressor, DeflateCompressor};
    use parbgzf::pipeline::Codecs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct JitteryCompressor {
        state: AtomicU32,
    }

    impl Compressor for JitteryCompressor {
        fn compress(&self, data: &[u8], level: CompressionLevel) -> parbgzf::Result<Vec<u8>> {
            let mut s = self.state.fetch_add(0x6c078965, Ordering::Relaxed);
            s ^= s << 7;
            s ^= s >> 9;
            std::thread::sleep(Duration::from_millis(u64::from(s % 10)));
            DeflateCompressor.compress(data, level)
        }
    }

    let data = test_data(400_000);
    let baseline = encode(&data, PipelineConfig::default().worker_threads(1));

    let codecs = Codecs {
        compressor: Arc::new(JitteryCompressor {
            state: AtomicU32::new(3),
        }),
        ..Codecs::default()
    };
    let config = PipelineConfig::default().worker_threads(4).queue_capacity(8);
    let mut writer = BgzfWriter::with_codecs(Vec::new(), config, codecs);
    writer.write_all(&data).unwrap();
    assert_eq!(writer.into_inner().unwrap(), baseline);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn round_trip_any_bytes(data in proptest::collection::vec(any::<u8>(), 0..100_000)) {
            let encoded = encode(&data, PipelineConfig::default());
            prop_assert_eq!(decode(encoded, PipelineConfig::default()), data);
        }

        #[test]
        fn buffer_round_trip_any_bytes(data in proptest::collection::vec(any::<u8>(), 0..100_000)) {
            let encoded = compress_parallel(&data, CompressionLevel::default()).unwrap();
            prop_assert_eq!(decompress_parallel(&encoded).unwrap(), data);
        }

        #[test]
        fn worker_count_never_changes_output(
            data in proptest::collection::vec(any::<u8>(), 0..50_000),
            workers in 1usize..6,
        ) {
            let baseline = encode(&data, PipelineConfig::default().worker_threads(1));
            let parallel = encode(&data, PipelineConfig::default().worker_threads(workers));
            prop_assert_eq!(parallel, baseline);
        }
    }
}
