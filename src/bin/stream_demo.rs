//! Streams two sample prompts from Gemini straight to stdout.
//!
//! Needs `GOOGLE_API_KEY`. Ctrl-C stops the stream in progress.

use anyhow::Result;
use dotenv::dotenv;
use futures::StreamExt;
use log::info;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio_util::sync::CancellationToken;

use chat_relay::config::GeminiConfig;
use chat_relay::model::{build_messages, ChatModel, GeminiModel, Message};

const STRUCTURED_SYSTEM_PROMPT: &str =
    "Eres un asistente amigable que responde en español de manera concisa.";
const STRUCTURED_USER_MESSAGE: &str = "Explicame qué es la inteligencia artificial en 3 oraciones";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let model = GeminiModel::new(&GeminiConfig::from_env()?)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling stream");
            on_interrupt.cancel();
        }
    });

    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"=== Streaming basico ===\n").await?;
    print_stream(&model, build_messages(None, "Contame un chiste"), &cancel, &mut stdout).await?;

    stdout.write_all(b"=== Streaming estructurado ===\n").await?;
    let messages = build_messages(Some(STRUCTURED_SYSTEM_PROMPT), STRUCTURED_USER_MESSAGE);
    print_stream(&model, messages, &cancel, &mut stdout).await?;

    Ok(())
}

async fn print_stream(
    model: &dyn ChatModel,
    messages: Vec<Message>,
    cancel: &CancellationToken,
    stdout: &mut Stdout,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Ok(());
    }

    let mut chunks = model.stream(messages, cancel.child_token()).await?;
    while let Some(chunk) = chunks.next().await {
        stdout.write_all(chunk?.content.as_bytes()).await?;
        stdout.flush().await?;
    }
    stdout.write_all(b"\n\n").await?;
    stdout.flush().await?;

    Ok(())
}
