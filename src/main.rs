use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use shipment_tracking::{Credentials, Operation, TrackingClient, TransportConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    /// Current status
    Details,
    /// Current status with event history
    Events,
    /// Proof of delivery
    Signature,
    /// Status and events for public users
    Public,
}

impl From<Action> for Operation {
    fn from(action: Action) -> Self {
        match action {
            Action::Details => Operation::GetPiece,
            Action::Events => Operation::GetPieceDetail,
            Action::Signature => Operation::GetSignature,
            Action::Public => Operation::StatusPublic,
        }
    }
}

/// Look up parcels on the carrier's tracking gateway.
///
/// Credentials are read from CIG_USER, CIG_PASSWORD, CIG_ENDPOINT, TNT_USER
/// and TNT_PASSWORD, or from a `.env` file.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    #[arg(value_enum)]
    action: Action,

    /// Piece code, or up to 20 codes separated by `;`
    piece_code: String,

    /// Language code forwarded to the gateway (defaults to en)
    #[arg(long, short)]
    language: Option<String>,

    /// Print the parsed response tree instead of the normalized result
    #[arg(long)]
    raw: bool,

    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let credentials = Credentials::from_env().context("Configuration error")?;
    let client = TrackingClient::new(
        credentials,
        &TransportConfig {
            timeout_ms: args.timeout_ms,
        },
    )?;

    let piece_code = args.piece_code.as_str();
    let language = args.language.as_deref();

    let output = if args.raw {
        let tree = client
            .fetch_tree(args.action.into(), piece_code, language)
            .await?;
        to_json(&tree)?
    } else {
        match args.action {
            Action::Details => to_json(&client.get_details(piece_code, language).await?)?,
            Action::Events => {
                to_json(&client.get_details_and_events(piece_code, language).await?)?
            }
            Action::Signature => to_json(&client.get_signature(piece_code, language).await?)?,
            Action::Public => to_json(&client.get_public_details(piece_code, language).await?)?,
        }
    };

    println!("{}", output);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to render result")
}
