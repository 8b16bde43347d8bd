//! Sublink - terminal reader for aligned subtitle pairs
//!
//! Usage:
//!   sublink <content-id>                      # Read one content item
//!   sublink <content-id> --config my.toml     # Explicit config file
//!   sublink <content-id> --no-probe           # Do not poll server health
//!   sublink --recent                          # List recently studied content

mod activity;
mod commands;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use parking_lot::RwLock;
use sublink_core::navigation::{Backends, NavigationController};
use sublink_core::{ApiClient, ContentId, EngineConfig, FileStore};
use tracing::info;

use activity::{Activity, Printer};

const USAGE: &str = "usage: sublink <content-id> [--config PATH] [--no-probe] | sublink --recent";

struct Args {
    content_id: Option<ContentId>,
    config: Option<PathBuf>,
    probe: bool,
    recent: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Args {
            content_id: None,
            config: None,
            probe: true,
            recent: false,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--no-probe" => parsed.probe = false,
                "--recent" => parsed.recent = true,
                "-h" | "--help" => bail!(USAGE),
                other if other.starts_with('-') => bail!("unknown option {}\n{}", other, USAGE),
                other => parsed.content_id = Some(ContentId::from(other)),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sublink_core::logging::init();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = EngineConfig::load(args.config.as_deref()).context("loading configuration")?;
    let client = ApiClient::new(&config.api)?;

    if args.recent {
        return commands::print_recent(&client, None).await;
    }
    let content_id = args.content_id.ok_or_else(|| anyhow!(USAGE))?;

    let dir = store::data_dir(&config.storage);
    let kv = Arc::new(FileStore::open(&dir).with_context(|| format!("opening {}", dir.display()))?);
    info!("Local state in {}", dir.display());

    let controller = NavigationController::new(content_id, config, Backends::from_client(client.clone()), kv);
    let activity = Arc::new(RwLock::new(Activity::new()));
    controller.add_listener(Arc::new(Printer::new(activity.clone())));

    controller.open().await.context("opening content")?;
    if args.probe {
        controller.start_probe()?;
    }

    let result = commands::run(&controller, &client, &activity).await;
    controller.close().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_content_and_options() {
        let args = parse(&["42", "--config", "custom.toml", "--no-probe"]).unwrap();
        assert_eq!(args.content_id, Some(ContentId::from(42)));
        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        assert!(!args.probe);
        assert!(!args.recent);
    }

    #[test]
    fn test_parse_rejects_bad_options() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["--recent"]).unwrap().recent);
    }
}
