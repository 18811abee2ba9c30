//! claude-bridge CLI — 配置检查、token 估算、提示注入与流式转发的命令行工具
//!
//! Usage:
//!   claude-bridge config                      Show resolved configuration
//!   claude-bridge count-tokens <request.json> Estimate input tokens locally
//!   claude-bridge inject <request.json>       Show the upstream request body
//!   claude-bridge encode <events.jsonl>       Encode parser events as Claude SSE
//!   claude-bridge relay <request.json>        Round trip through the upstream

use anyhow::{bail, Context};
use claude_bridge::config::ProxyConfig;
use claude_bridge::ids::{IdGenerator, RandomIdGenerator};
use claude_bridge::pipeline::{relay, PlainTextParser, RelayOutcome};
use claude_bridge::prompt::inject_into;
use claude_bridge::stream::{ChannelSink, ClaudeStream, MemorySink, StreamContext};
use claude_bridge::tokens::{count_tokens, estimate_input_tokens_blocking};
use claude_bridge::translate::to_openai_request;
use claude_bridge::transport::UpstreamClient;
use claude_bridge::types::{ClaudeRequest, ParserEvent};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    claude_bridge::telemetry::init();

    let result = match args[1].as_str() {
        "config" => cmd_config(),
        "count-tokens" => with_file(&args[2..], cmd_count_tokens),
        "inject" => with_file(&args[2..], cmd_inject),
        "encode" => with_file(&args[2..], |path| runtime()?.block_on(cmd_encode(path))),
        "relay" => with_file(&args[2..], |path| runtime()?.block_on(cmd_relay(path))),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    claude_bridge::tokens::shutdown();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"claude-bridge — Claude 流式协议桥接命令行工具

USAGE:
    claude-bridge <COMMAND> [ARGS]

COMMANDS:
    config                      Show the resolved configuration (keys redacted)
    count-tokens <request>      Estimate input tokens for a Claude request file
    inject <request>            Print the translated upstream body and trigger signal
    encode <events.jsonl>       Encode parser events (one JSON per line) as SSE
    relay <request>             Send a request upstream and print the Claude SSE stream
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    UPSTREAM_BASE_URL           OpenAI-compatible chat completions endpoint
    UPSTREAM_API_KEY            Bearer key sent upstream
    TOKEN_MULTIPLIER            Usage scaling factor (e.g. 1.2, 120%, x1.2)
    AGGREGATION_INTERVAL_MS     Text aggregation window
    RUST_LOG                    Log filter (default: info)"#
    );
}

fn cmd_version() {
    println!("claude-bridge {}", env!("CARGO_PKG_VERSION"));
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")
}

fn with_file<F>(args: &[String], f: F) -> anyhow::Result<()>
where
    F: FnOnce(&Path) -> anyhow::Result<()>,
{
    match args.first() {
        Some(path) => f(Path::new(path)),
        None => bail!("missing file argument"),
    }
}

fn read_request(path: &Path) -> anyhow::Result<ClaudeRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a Claude request", path.display()))
}

fn cmd_config() -> anyhow::Result<()> {
    let config = ProxyConfig::from_env()?;
    println!("{config:#?}");
    println!("listen address: {}", config.listen_addr());
    Ok(())
}

fn cmd_count_tokens(path: &Path) -> anyhow::Result<()> {
    let config = ProxyConfig::from_env()?;
    let request = read_request(path)?;
    let request_id = RandomIdGenerator.request_id();
    let result = count_tokens(&request, config.token_multiplier, &request_id);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_inject(path: &Path) -> anyhow::Result<()> {
    let config = ProxyConfig::from_env()?;
    let request = read_request(path)?;
    let mut upstream = to_openai_request(&request, &config);
    let trigger = inject_into(&mut upstream, request.tools(), None, &RandomIdGenerator);
    let out = json!({
        "trigger_signal": trigger,
        "request": upstream,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_encode(path: &Path) -> anyhow::Result<()> {
    let config = ProxyConfig::from_env()?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    let sink = Arc::new(MemorySink::new());
    let request_id = RandomIdGenerator.request_id();
    let stream = ClaudeStream::new(StreamContext::from_config(&config, request_id, 0), sink.clone());
    stream.start().await?;

    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: ParserEvent = serde_json::from_str(line)
            .with_context(|| format!("line {}: not a parser event", line_no + 1))?;
        stream.handle_event(event).await?;
    }
    stream.finish().await?;

    print!("{}", sink.wire());
    Ok(())
}

async fn cmd_relay(path: &Path) -> anyhow::Result<()> {
    let config = ProxyConfig::from_env()?;
    let request = read_request(path)?;
    let ids = RandomIdGenerator;
    let request_id = ids.request_id();

    let mut upstream_body = to_openai_request(&request, &config);
    if let Some(trigger) = inject_into(&mut upstream_body, request.tools(), None, &ids) {
        warn!(
            request_id = request_id.as_str(),
            trigger = trigger.as_str(),
            "no invoke parser is bundled; tool calls will arrive as text"
        );
    }
    let input = estimate_input_tokens_blocking(&request, config.token_multiplier, &request_id).await;

    let (sink, mut frames) = ChannelSink::new(64);
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = frames.recv().await {
            if stdout.write_all(&chunk.bytes).is_err() {
                break;
            }
            if chunk.flush {
                let _ = stdout.flush();
            }
        }
        let _ = stdout.flush();
    });

    let context = StreamContext::from_config(&config, request_id.clone(), input.input_tokens)
        .with_model(request.model.clone());
    let stream = ClaudeStream::new(context, Arc::new(sink));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    stream.start().await?;
    let client = UpstreamClient::new(&config)?;
    let outcome = match client.send(&upstream_body, &request_id, None).await {
        Ok(body) => relay(body, &mut PlainTextParser, &stream, &cancel).await?,
        Err(e) => {
            stream.fail(&e).await?;
            RelayOutcome::Failed(e)
        }
    };

    drop(stream);
    let _ = printer.await;

    match outcome {
        RelayOutcome::Completed => {
            info!(request_id = request_id.as_str(), "relay completed");
            Ok(())
        }
        RelayOutcome::Cancelled => bail!("cancelled"),
        RelayOutcome::Failed(e) => Err(e.into()),
    }
}
