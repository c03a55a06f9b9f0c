use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use facetalk::audio::{AudioBuffer, AudioChunker};
use facetalk::delivery::protocol::PushAudioStreamRequest;
use prost::Message;
use facetalk::text::{SentenceSplitter, SplitterKind};
use std::hint::black_box;
use std::time::Duration;

const REPLY: &str = "Sure! Dr. Smith will see you at 3 p.m. on Friday. \
    Please bring your insurance card, e.g. the blue one. \
    Is there anything else I can help you with? \
    **Note:** parking is free for visitors.";

fn bench_splitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_reply");
    for kind in [SplitterKind::Regex, SplitterKind::Linguistic] {
        let Ok(splitter) = SentenceSplitter::new(kind) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(format!("{:?}", kind)), &splitter, |b, splitter| {
            b.iter(|| splitter.split(black_box(REPLY)))
        });
    }
    group.finish();
}

/// Chunking plus message encoding of one second of audio, as a streamed
/// delivery does it.
fn bench_chunk_and_encode(c: &mut Criterion) {
    let samples: Vec<f32> = (0..22050).map(|i| (i as f32 * 0.01).sin()).collect();
    let Ok(buffer) = AudioBuffer::new(samples, 22050) else {
        return;
    };

    let mut group = c.benchmark_group("chunk_and_encode");
    for chunks_per_second in [5_u32, 10, 50] {
        let Ok(chunker) = AudioChunker::new(chunks_per_second, Duration::ZERO) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(chunks_per_second),
            &chunker,
            |b, chunker| {
                b.iter(|| {
                    chunker
                        .split(black_box(&buffer))
                        .iter()
                        .map(|chunk| {
                            let bytes = facetalk::audio::buffer::f32_to_le_bytes(chunk.samples);
                            PushAudioStreamRequest::audio_data(bytes).encode_to_vec().len()
                        })
                        .sum::<usize>()
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_splitting, bench_chunk_and_encode);
criterion_main!(benches);
