#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod tools;

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use args::Args;
use clap::Parser;
use futures_util::StreamExt;
use switchboard_config::Config;
use switchboard_llm::{
    Attachment, Engine, Message, ModelTarget, NoTools, NormalizedStreamEvent, ToolDefinition, ToolExecutor,
};
use tools::LocalTools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    switchboard_telemetry::init(&config.telemetry)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    let targets = targets(&config, &args.models)?;
    let history = history(&args).await?;

    let (executor, tools): (Arc<dyn ToolExecutor>, Vec<ToolDefinition>) = if args.tools {
        (Arc::new(LocalTools), LocalTools::definitions())
    } else {
        (Arc::new(NoTools), Vec::new())
    };

    let engine = Engine::new(&config, executor)?;

    let failures = if let [target] = targets.as_slice() {
        single(&engine, history, target.clone(), tools).await
    } else {
        fan_out(&engine, history, targets, tools).await
    };

    if failures > 0 {
        anyhow::bail!("{failures} model(s) failed");
    }
    Ok(())
}

/// Resolve `--model` names, defaulting to the first configured provider
fn targets(config: &Config, names: &[String]) -> anyhow::Result<Vec<ModelTarget>> {
    if names.is_empty() {
        let (name, provider) = config
            .providers
            .first()
            .context("no providers configured; add a [providers.<name>] table")?;
        return Ok(vec![ModelTarget::new(name.as_str(), provider.clone())]);
    }

    names
        .iter()
        .map(|name| {
            ModelTarget::from_config(config, name).with_context(|| format!("unknown provider '{name}'"))
        })
        .collect()
}

async fn history(args: &Args) -> anyhow::Result<Vec<Message>> {
    let mut prompt = Message::user(args.prompt.as_str());
    for path in &args.images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        prompt = prompt.with_attachment(Attachment::new(file_name, image_mime(path), bytes));
    }

    let mut history = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        history.push(Message::system(system.as_str()));
    }
    history.push(prompt);
    Ok(history)
}

/// MIME type implied by an image file extension
fn image_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Stream a single turn to stdout, returning the number of failures
async fn single(engine: &Engine, history: Vec<Message>, target: ModelTarget, tools: Vec<ToolDefinition>) -> usize {
    let mut stream = engine.start_turn(history, target, tools);

    let id = stream.id();
    let canceller = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel(id);
        }
    });

    let mut stdout = std::io::stdout();
    let mut failures = 0;
    while let Some(event) = stream.next().await {
        match event {
            NormalizedStreamEvent::TextDelta(text) => {
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
            NormalizedStreamEvent::ReasoningDelta(text) => eprint!("{text}"),
            NormalizedStreamEvent::ReasoningSealed(_) => {}
            NormalizedStreamEvent::ToolCallRequested { name, arguments, .. } => {
                eprintln!("\n-> {name} {arguments}");
            }
            NormalizedStreamEvent::Completed(reason) => {
                println!();
                tracing::debug!(%reason, "turn completed");
            }
            NormalizedStreamEvent::Failed(error) if error.is_scoped() => {
                eprintln!("\nwarning: {} ({})", error.message, error.code);
            }
            NormalizedStreamEvent::Failed(error) => {
                eprintln!("\nerror: {} ({})", error.message, error.code);
                failures += 1;
            }
        }
    }
    failures
}

/// Stream a fan-out, printing whole lines prefixed with the model name
async fn fan_out(
    engine: &Engine,
    history: Vec<Message>,
    targets: Vec<ModelTarget>,
    tools: Vec<ToolDefinition>,
) -> usize {
    let mut stream = engine.start_fan_out(history, targets, tools);

    let id = stream.id();
    let canceller = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel_all(id);
        }
    });

    let mut pending: HashMap<String, String> = HashMap::new();
    let mut failures = 0;
    while let Some((model, event)) = stream.next().await {
        match event {
            NormalizedStreamEvent::TextDelta(text) => {
                let buffer = pending.entry(model.clone()).or_default();
                buffer.push_str(&text);
                while let Some(end) = buffer.find('\n') {
                    let line: String = buffer.drain(..=end).collect();
                    print!("[{model}] {line}");
                }
            }
            NormalizedStreamEvent::ReasoningDelta(_) | NormalizedStreamEvent::ReasoningSealed(_) => {}
            NormalizedStreamEvent::ToolCallRequested { name, arguments, .. } => {
                println!("[{model}] -> {name} {arguments}");
            }
            NormalizedStreamEvent::Completed(reason) => {
                flush_line(&mut pending, &model);
                println!("[{model}] ({reason})");
            }
            NormalizedStreamEvent::Failed(error) if error.is_scoped() => {
                eprintln!("[{model}] warning: {} ({})", error.message, error.code);
            }
            NormalizedStreamEvent::Failed(error) => {
                flush_line(&mut pending, &model);
                eprintln!("[{model}] error: {} ({})", error.message, error.code);
                failures += 1;
            }
        }
    }
    failures
}

fn flush_line(pending: &mut HashMap<String, String>, model: &str) {
    if let Some(rest) = pending.remove(model)
        && !rest.is_empty()
    {
        println!("[{model}] {rest}");
    }
}
