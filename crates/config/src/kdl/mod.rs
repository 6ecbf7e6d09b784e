//! KDL configuration parsing.

mod helpers;
mod scheduler;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use crate::Config;

pub use scheduler::{
    parse_issuer_config, parse_scheduler_config, parse_store_config, parse_store_failure_config,
};

/// Parse a complete KDL configuration document
pub fn parse_kdl_document(content: &str) -> Result<Config> {
    let doc: kdl::KdlDocument = content
        .parse()
        .map_err(|e: kdl::KdlError| anyhow!("{}", e))
        .context("Invalid KDL syntax")?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "scheduler" => config.scheduler = parse_scheduler_config(node)?,
            "store-failure" => config.store_failure = parse_store_failure_config(node)?,
            "store" => config.store = parse_store_config(node)?,
            "issuer" => config.issuer = parse_issuer_config(node)?,
            other => {
                warn!(block = other, "Ignoring unknown configuration block");
            }
        }
    }

    debug!(
        scan_interval_secs = config.scheduler.scan_interval_secs,
        policy = %config.store_failure.policy,
        inventory = %config.store.inventory.display(),
        "Parsed KDL configuration"
    );

    Ok(config)
}
