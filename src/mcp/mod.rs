pub mod tools;

use std::sync::Arc;

use anyhow::Result;
use rmcp::transport::io::stdio;
use rmcp::ServiceExt;
use tracing::info;

use crate::vault::Vault;

use self::tools::VaultServer;

/// Start the MCP server on stdio transport.
pub async fn serve(vault: Arc<Vault>) -> Result<()> {
    let server = VaultServer::new(vault);

    info!("starting MCP server on stdio");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
