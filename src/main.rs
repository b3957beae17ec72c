mod config;

use msglog::{Bridge, JsonLinesWriter};
use msglog_discord::DiscordSource;
use msglog_gelf::GelfWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Bridge stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = AppConfig::load()?.validate()?;

    tracing::info!(
        graylog = %settings.graylog_addr,
        source = %settings.graylog_source,
        chunk_size = settings.chunk_size,
        stdout = settings.stdout,
        cache_per_channel = settings.max_per_channel,
        "Bridge starting"
    );

    let gelf = GelfWriter::connect(settings.graylog_addr, settings.graylog_source.clone())?
        .with_chunk_size(settings.chunk_size)?;

    let mut builder = Bridge::builder()
        .source(DiscordSource::new(settings.token, settings.max_per_channel))
        .sink(gelf);
    if settings.stdout {
        builder = builder.sink(JsonLinesWriter::stdout());
    }

    builder.build()?.run().await?;

    tracing::info!("Bridge stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "msglog_bridge=info,msglog=info,msglog_discord=info,msglog_gelf=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
