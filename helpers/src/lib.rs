//! Shared Temporal plumbing used by the booking worker and client binaries.

use std::str::FromStr;

use anyhow::Context;
use temporal_client::{Client, RetryClient};
use temporal_sdk::sdk_client_options;
use temporal_sdk_core::Url;

/// Connect to the Temporal server at `address` (e.g. `http://localhost:7233`)
/// inside `namespace`.
///
/// Connect returns a `RetryClient<Client>` which automatically retries
/// transient failures, so callers never wrap it again.
pub async fn get_client(address: &str, namespace: &str) -> Result<RetryClient<Client>, anyhow::Error> {
    let opts = sdk_client_options(Url::from_str(address)?)
        .build()
        .context("failed building Temporal client options")?;

    let client = opts
        .connect(namespace, None)
        .await
        .with_context(|| format!("failed connecting to Temporal server at {address}"))?;

    Ok(client)
}

mod parse_activity_result;

pub use parse_activity_result::parse_activity_result;
