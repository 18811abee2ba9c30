//! Benchmarks for the streaming hot path
//!
//! This benchmark measures:
//! - SSE frame decoding speed
//! - Encoder throughput for text and tool-call events
//! - Tool catalogue rendering
//! - Input token estimation

use bytes::Bytes;
use claude_bridge::config::TokenMultiplier;
use claude_bridge::ids::SequentialIdGenerator;
use claude_bridge::pipeline::OpenAiSseDecoder;
use claude_bridge::prompt::build_tools_xml;
use claude_bridge::stream::{ClaudeStream, MemorySink, StreamContext};
use claude_bridge::tokens::{estimate_input_tokens_with, TokenizerRegistry};
use claude_bridge::types::{ClaudeRequest, ClaudeToolDefinition, ParserEvent};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Sample SSE frames (OpenAI format)
const SSE_FRAMES: &[&str] = &[
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":" there"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"!"},"finish_reason":null}]}"#,
    r#"data: {"id":"chatcmpl-123","object":"chat.completion.chunk","created":1694268190,"model":"gpt-4o","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
    "data: [DONE]",
];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_sse_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse_decoding");
    let rt = runtime();

    let body: String = SSE_FRAMES.iter().map(|f| format!("{}\n\n", f)).collect();
    group.throughput(Throughput::Bytes(body.len() as u64));

    group.bench_function("decode_text_deltas", |b| {
        b.to_async(&rt).iter(|| async {
            // Split into small network-sized chunks
            let chunks: Vec<claude_bridge::Result<Bytes>> = body
                .as_bytes()
                .chunks(64)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            let input = Box::pin(futures::stream::iter(chunks));
            let texts: Vec<_> = OpenAiSseDecoder::new().text_deltas(input).collect().await;
            black_box(texts)
        })
    });

    group.finish();
}

fn bench_encoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoder");
    let rt = runtime();

    let fragments: Vec<String> = (0..200).map(|i| format!("token{} ", i)).collect();
    group.throughput(Throughput::Elements(fragments.len() as u64));

    for (name, interval) in [
        ("text_unaggregated", Duration::ZERO),
        ("text_aggregated", Duration::from_secs(60)),
    ] {
        group.bench_function(name, |b| {
            b.to_async(&rt).iter(|| async {
                let sink = Arc::new(MemorySink::new());
                let context = StreamContext::new("bench", 100)
                    .with_multiplier(TokenMultiplier::new(1.2))
                    .with_aggregation_interval(interval);
                let stream = ClaudeStream::with_id_generator(
                    context,
                    sink.clone(),
                    Arc::new(SequentialIdGenerator::new()),
                );
                stream.start().await.unwrap();
                for fragment in &fragments {
                    stream
                        .handle_event(ParserEvent::text(fragment.as_str()))
                        .await
                        .unwrap();
                }
                stream
                    .handle_event(ParserEvent::tool_call("get_weather", json!({"city": "Tokyo"})))
                    .await
                    .unwrap();
                stream.handle_event(ParserEvent::End).await.unwrap();
                black_box(sink.len())
            })
        });
    }

    group.finish();
}

fn sample_tools(n: usize) -> Vec<ClaudeToolDefinition> {
    (0..n)
        .map(|i| {
            serde_json::from_value(json!({
                "name": format!("tool_{}", i),
                "description": "Reads <path> and returns its contents",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "File path"},
                        "mode": {"type": "string", "enum": ["text", "binary"]}
                    },
                    "required": ["path"]
                }
            }))
            .unwrap()
        })
        .collect()
}

fn bench_prompt_and_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("prompt_and_tokens");

    let tools = sample_tools(20);
    group.bench_function("build_tools_xml_20", |b| {
        b.iter(|| black_box(build_tools_xml(black_box(&tools))))
    });

    let request: ClaudeRequest = serde_json::from_value(json!({
        "model": "claude-sonnet-4",
        "system": "You are a careful assistant.",
        "messages": [
            {"role": "user", "content": "Summarize the attached notes. ".repeat(50)},
            {"role": "assistant", "content": "Sure, here is a summary."}
        ],
        "tools": sample_tools(5)
    }))
    .unwrap();
    let registry = TokenizerRegistry::default();
    group.bench_function("estimate_input_tokens", |b| {
        b.iter(|| {
            black_box(estimate_input_tokens_with(
                &registry,
                black_box(&request),
                TokenMultiplier::IDENTITY,
                "bench",
            ))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sse_decoding,
    bench_encoder,
    bench_prompt_and_tokens
);
criterion_main!(benches);
