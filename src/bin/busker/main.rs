//! busker CLI entry point.

mod cli;

use busker::backend::{ArtistId, Backend, GatewayConfiguration, HttpBackend, MediaId, MemoryBackend};
use busker::client::BuskerClient;
use busker::media::MediaDraft;
use busker::upload::ClosureObserver;
use busker::Notice;
use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    info!("busker v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.to_config()?;

    let client = if cli.offline {
        let backend = MemoryBackend::new();
        let identity = config
            .backend
            .identity
            .clone()
            .map_or_else(|| backend.caller(), ArtistId::from);
        backend.set_caller(identity.clone());
        info!("Using in-process backend as {identity}");
        BuskerClient::new(config)
            .with_backend(Arc::new(backend))
            .with_identity(identity)
    } else {
        let backend: Arc<dyn Backend> =
            Arc::new(HttpBackend::new(&config.backend, config.upload.chunk_size)?);
        BuskerClient::new(config).with_backend(backend)
    };

    match run(&client, cli.command).await {
        Ok(notice) if notice.is_error() => Err(eyre!("{notice}")),
        Ok(notice) => {
            println!("{notice}");
            Ok(())
        }
        Err(e) => {
            let notice = client.report(&e);
            Err(eyre!("{notice}"))
        }
    }
}

async fn run(client: &BuskerClient, command: Command) -> busker::Result<Notice> {
    match command {
        Command::Upload {
            file,
            title,
            category,
            tags,
            description,
        } => {
            let bytes = tokio::fs::read(&file).await?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut draft = MediaDraft::from_file(&name, bytes)
                .with_category(category)
                .with_tags(&tags)
                .with_description(description);
            if let Some(title) = title {
                draft.title = title;
            }
            let title = draft.title.clone();

            let observer = Arc::new(ClosureObserver(|percent: u8| {
                eprint!("\ruploading {percent:>3}%");
            }));
            let media_id = tokio::select! {
                published = client.publish_media(draft, observer) => published?,
                _ = tokio::signal::ctrl_c() => {
                    return Err(busker::Error::transfer(
                        busker::error::TransferErrorKind::Cancelled,
                        "interrupted",
                    ));
                }
            };
            eprintln!();
            Ok(Notice::success(
                "Media uploaded",
                format!("{title} published as {media_id}"),
            ))
        }

        Command::Delete { media_id } => {
            client.delete_media(&MediaId::from(media_id.as_str())).await?;
            Ok(Notice::success("Media deleted", media_id))
        }

        Command::Donate {
            media_id,
            amount,
            message,
            donor,
        } => {
            let session = client
                .donate(
                    &MediaId::from(media_id),
                    &amount,
                    message.as_deref(),
                    donor.as_deref(),
                )
                .await?;
            Ok(Notice::success(
                "Checkout ready",
                format!("continue at {}", session.url),
            ))
        }

        Command::Resolve { url } => {
            let outcome = client.resolve_payment(&url).await?;
            Ok(Notice::from(&outcome))
        }

        Command::Eligibility { artist } => {
            let eligibility = client.eligibility(&ArtistId::from(artist.as_str())).await;
            let detail = if eligibility.is_available() {
                "Donations available"
            } else {
                eligibility.notice_text().unwrap_or("Still loading")
            };
            Ok(Notice::success(artist, detail))
        }

        Command::ConnectGateway { token } => {
            client.attach_credential(&token).await?;
            Ok(Notice::success("Gateway connected", "Donations are enabled"))
        }

        Command::DisconnectGateway => {
            client.detach_credential().await?;
            Ok(Notice::success("Gateway disconnected", "Donations are disabled"))
        }

        Command::ConfigureGateway {
            secret_key,
            countries,
        } => {
            client
                .configure_gateway(&GatewayConfiguration {
                    allowed_countries: countries,
                    secret_key,
                })
                .await?;
            Ok(Notice::success("Gateway configured", "Checkout is available"))
        }

        Command::List { artist, category } => {
            let media = match (artist, category) {
                (Some(artist), _) => client.artist_media(&ArtistId::from(artist)).await?,
                (None, Some(category)) => client.category_media(category).await?,
                (None, None) => client.all_media().await?,
            };
            for item in &media {
                println!(
                    "{}\t{}\t{}\t{}",
                    item.id,
                    item.category.label(),
                    item.title,
                    item.file.direct_url()
                );
            }
            Ok(Notice::success("Media", format!("{} items", media.len())))
        }
    }
}
