//! Serve command: run the HTTP upload server

use clap::Args;

use crate::AppContext;
use fieldbook_storage::EntryStore;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind, overrides `server_addr` from the config
    #[arg(long)]
    pub addr: Option<String>,

    /// Bearer token for /api/import, overrides `import_token`
    #[arg(long, env = "FIELDBOOK_IMPORT_TOKEN")]
    pub import_token: Option<String>,
}

pub async fn run(args: &ServeArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let mut config = ctx.config.server();
    if let Some(addr) = &args.addr {
        config.addr = addr.clone();
    }
    if let Some(token) = &args.import_token {
        config.import_token = Some(token.clone());
    }

    tracing::info!("Starting upload server on {}", config.addr);
    let store: std::sync::Arc<dyn EntryStore> = ctx.storage.clone();
    fieldbook_server::run_server(store, config).await
}
