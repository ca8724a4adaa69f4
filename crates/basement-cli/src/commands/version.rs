//! Version command handler

use anyhow::Result;

use basement_core::Client;

use crate::output::{Output, OutputFormat};

/// Show client and cluster versions
pub fn show(client: &Client, output: &Output) -> Result<()> {
    let client_version = client.client_version()?;
    let cluster = client.cluster_version()?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "cli": env!("CARGO_PKG_VERSION"),
                    "client": client_version,
                    "cluster": cluster
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", client_version);
        }
        OutputFormat::Human => {
            println!("basement {}", env!("CARGO_PKG_VERSION"));
            println!("Client:  {}", client_version);
            println!("Cluster:");
            for (node, version) in &cluster {
                println!("  {}: {}", node, version);
            }
        }
    }

    Ok(())
}
