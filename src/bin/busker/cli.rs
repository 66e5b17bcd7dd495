//! Command-line interface definition.

use busker::config::ClientConfig;
use busker::media::MediaCategory;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Publish media and take donations from the command line.
#[derive(Parser, Debug)]
#[command(name = "busker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL.
    #[arg(long, env = "BUSKER_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token for the backend.
    #[arg(long, env = "BUSKER_AUTH_TOKEN", global = true, hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Artist identity to act as.
    #[arg(long, env = "BUSKER_IDENTITY", global = true)]
    pub identity: Option<String>,

    /// Origin the payment gateway redirects back to.
    #[arg(long, env = "BUSKER_ORIGIN", global = true)]
    pub origin: Option<String>,

    /// Use an in-process backend instead of the network.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG", global = true)]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file and publish it.
    Upload {
        /// File to upload.
        file: PathBuf,
        /// Title (defaults to the file name).
        #[arg(long)]
        title: Option<String>,
        /// Category: recording, liveSession or video.
        #[arg(long, default_value = "recording")]
        category: MediaCategory,
        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,
        /// Description.
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a media item.
    Delete {
        /// Media identifier.
        media_id: String,
    },

    /// Start a donation checkout.
    Donate {
        /// Media identifier.
        media_id: String,
        /// Amount, e.g. 5 or 12.50.
        amount: String,
        /// Note for the artist.
        #[arg(long)]
        message: Option<String>,
        /// Donor name.
        #[arg(long)]
        donor: Option<String>,
    },

    /// Resolve the landing URL a payer returned to.
    Resolve {
        /// Landing URL.
        url: String,
    },

    /// Show donation eligibility for an artist.
    Eligibility {
        /// Artist identifier.
        artist: String,
    },

    /// Attach a gateway credential to your artist profile.
    ConnectGateway {
        /// Gateway account token.
        token: String,
    },

    /// Remove your gateway credential.
    DisconnectGateway,

    /// Configure the platform gateway (admin).
    ConfigureGateway {
        /// Gateway secret key.
        #[arg(long, env = "BUSKER_GATEWAY_SECRET", hide_env_values = true)]
        secret_key: String,
        /// Allowed countries, comma-separated.
        #[arg(long, value_delimiter = ',', default_value = "US")]
        countries: Vec<String>,
    },

    /// List published media.
    List {
        /// Only media by this artist.
        #[arg(long)]
        artist: Option<String>,
        /// Only media in this category.
        #[arg(long, conflicts_with = "artist")]
        category: Option<MediaCategory>,
    },
}

impl Cli {
    /// Build the client configuration from file and flags.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<ClientConfig> {
        let mut config = if let Some(ref path) = self.config {
            ClientConfig::from_file(path)?
        } else {
            let path = busker::config::default_config_path();
            if path.exists() {
                ClientConfig::from_file(&path)?
            } else {
                ClientConfig::default()
            }
        };

        if let Some(ref base_url) = self.base_url {
            config.backend.base_url.clone_from(base_url);
        }
        if self.auth_token.is_some() {
            config.backend.auth_token.clone_from(&self.auth_token);
        }
        if self.identity.is_some() {
            config.backend.identity.clone_from(&self.identity);
        }
        if let Some(ref origin) = self.origin {
            config.checkout.origin.clone_from(origin);
        }
        config.log_level.clone_from(&self.log_level);

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_donate_arguments() {
        let cli = Cli::try_parse_from([
            "busker", "--offline", "donate", "m1", "5.00", "--donor", "Sam",
        ])
        .unwrap();
        assert!(cli.offline);
        assert!(matches!(
            cli.command,
            Command::Donate { ref amount, ref donor, .. }
                if amount == "5.00" && donor.as_deref() == Some("Sam")
        ));
    }

    #[test]
    fn test_category_parses_slug() {
        let cli = Cli::try_parse_from([
            "busker", "upload", "set.mp3", "--category", "liveSession",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Upload {
                category: MediaCategory::LiveSession,
                ..
            }
        ));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "busker",
            "--base-url",
            "https://api.busk.example",
            "--origin",
            "https://busk.example",
            "--config",
            "/nonexistent/busker.toml",
            "list",
        ])
        .unwrap();
        // The explicit file is missing, so loading fails.
        assert!(cli.to_config().is_err());

        let cli = Cli::try_parse_from([
            "busker",
            "--base-url",
            "https://api.busk.example",
            "--origin",
            "https://busk.example",
            "list",
        ])
        .unwrap();
        let config = cli.to_config().unwrap();
        assert_eq!(config.backend.base_url, "https://api.busk.example");
        assert_eq!(config.checkout.origin, "https://busk.example");
    }
}
