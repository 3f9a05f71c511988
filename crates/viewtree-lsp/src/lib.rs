//! Language Server Protocol implementation for view.tree files.
//!
//! Features:
//! - Structural and style diagnostics, pushed and pulled
//! - Completion for components, properties, binding operators and values
//! - Hover documentation for components, properties and stylesheet rules
//! - Go-to-definition into view, script and stylesheet files

mod backend;
pub mod completion;
pub mod context;
pub mod definition;
pub mod diagnostics;
pub mod document;
pub mod hover;

pub use backend::ViewTreeServer;

use tower_lsp::{LspService, Server};
use viewtree_core::Config;

/// Run the LSP server over stdio.
///
/// This function blocks until the client disconnects.
pub async fn run_lsp_server(config: Config) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| ViewTreeServer::with_config(client, config));
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
