use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tracing::{info, warn};

mod error;
mod model;
mod quotes;
mod routes;
mod store;

use model::Settings;
use quotes::{ChatCompletionsGenerator, QuoteGenerator, QuoteService};
use routes::AppState;
use store::MemoryStore;

const DEFAULT_PORT: u16 = 17700;

#[derive(Parser, Debug)]
#[command(name = "focus_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:17700
    /// - ip (implies port 17700), e.g. 127.0.0.1
    /// - localhost or localhost:port
    #[arg(long, default_value = "127.0.0.1:17700")]
    listen: String,

    /// Initial focus length in seconds.
    #[arg(long, default_value_t = model::DEFAULT_FOCUS_SECONDS)]
    focus_seconds: i64,

    /// Initial short break length in seconds.
    #[arg(long, default_value_t = model::DEFAULT_SHORT_BREAK_SECONDS)]
    short_break_seconds: i64,

    /// Initial long break length in seconds.
    #[arg(long, default_value_t = model::DEFAULT_LONG_BREAK_SECONDS)]
    long_break_seconds: i64,

    /// Initial number of focus sessions per day to aim for.
    #[arg(long, default_value_t = model::DEFAULT_DAILY_GOAL)]
    daily_goal: i64,

    /// Base URL of an OpenAI-compatible API used for motivational quotes.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Chat model used for motivational quotes.
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    openai_model: String,

    /// API key for quote generation. Without it, quotes come from the built-in list.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Give up on the quote service after this many seconds.
    #[arg(long, default_value_t = 15)]
    quote_timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focus_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let defaults = Settings {
        focus_duration: args.focus_seconds.max(1),
        short_break_duration: args.short_break_seconds.max(1),
        long_break_duration: args.long_break_seconds.max(1),
        daily_goal: args.daily_goal.max(1),
        ..Settings::default()
    };

    let generator: Option<Box<dyn QuoteGenerator>> =
        match args.openai_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(Box::new(ChatCompletionsGenerator::new(
                &args.openai_base_url,
                &args.openai_model,
                key,
                Duration::from_secs(args.quote_timeout_seconds.max(1)),
            )?)),
            _ => {
                warn!("OPENAI_API_KEY not set; motivational quotes use the built-in list");
                None
            }
        };

    let store = Arc::new(MemoryStore::new(defaults));
    let state = AppState {
        sessions: store.clone(),
        settings: store,
        quotes: Arc::new(QuoteService::new(generator)),
    };
    let app = routes::router(state);

    let addr = parse_listen(&args.listen)?;
    info!("Core listening on http://{addr}");
    info!(
        "Defaults: focus={}s short_break={}s long_break={}s daily_goal={}",
        defaults.focus_duration,
        defaults.short_break_duration,
        defaults.long_break_duration,
        defaults.daily_goal
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        if host == "localhost" {
            let port: u16 = port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                    input,
                    DEFAULT_PORT
                )
            })?;
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port));
        }
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_accepts_common_forms() {
        assert_eq!(
            parse_listen("0.0.0.0:9000").unwrap(),
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen("127.0.0.1").unwrap().port(), DEFAULT_PORT);
        assert_eq!(parse_listen("localhost:8080").unwrap().port(), 8080);
        assert_eq!(parse_listen("localhost").unwrap().port(), DEFAULT_PORT);
        assert!(parse_listen("localhost:http").is_err());
        assert!(parse_listen("example.com:80").is_err());
    }
}
