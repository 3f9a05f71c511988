//! LSP backend implementation for view.tree files.
//!
//! This module implements the Language Server Protocol handler
//! using tower-lsp.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use serde_json::json;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use viewtree_core::{completion_context, Config, Error, WorkspaceScanner};

use crate::completion::get_completions;
use crate::context::DocumentContext;
use crate::definition::get_definition;
use crate::diagnostics::get_diagnostics;
use crate::document::DocumentStore;
use crate::hover::get_hover;

/// view.tree Language Server.
pub struct ViewTreeServer {
    /// The LSP client connection.
    client: Client,
    /// Document store for open files.
    documents: DocumentStore,
    /// Workspace index, shared with background scans.
    scanner: Arc<WorkspaceScanner>,
    /// Active configuration.
    config: RwLock<Config>,
}

impl ViewTreeServer {
    /// Create a new language server.
    pub fn new(client: Client) -> Self {
        Self::with_config(client, Config::default())
    }

    /// Create a server with an explicit starting configuration.
    pub fn with_config(client: Client, config: Config) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            scanner: Arc::new(WorkspaceScanner::new(".", config.scan.clone())),
            config: RwLock::new(config),
        }
    }

    fn config(&self) -> Config {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_config(&self, config: Config) {
        self.scanner.set_config(config.scan.clone());
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    fn is_primary(&self, uri: &Url) -> bool {
        file_path(uri)
            .map(|path| self.config().scan.is_primary(&path))
            .unwrap_or(false)
    }

    /// Fold the current text of a document into the workspace index.
    fn index_document(&self, uri: &Url, text: &str) {
        match file_path(uri) {
            Ok(path) => {
                self.scanner.update_file(&path, text);
            }
            Err(e) => log::debug!("Not indexing {}", e),
        }
    }

    /// Run `f` with a context for the open document `uri`.
    fn with_document<R>(&self, uri: &Url, f: impl FnOnce(&DocumentContext<'_>) -> R) -> Option<R> {
        let doc = self.documents.get(uri)?;
        let text = doc.text();
        let path = file_path(uri).ok();
        let root = self.scanner.root();
        let config = self.config();
        let index = self.scanner.index();
        let ctx = DocumentContext {
            text: &text,
            path: path.as_deref(),
            root: &root,
            scan: &config.scan,
            index: &index,
        };
        Some(f(&ctx))
    }

    fn diagnostics_for(&self, uri: &Url, text: &str) -> Vec<Diagnostic> {
        if !self.is_primary(uri) {
            return Vec::new();
        }
        let config = self.config();
        let index = self.scanner.index();
        get_diagnostics(text, &index, &config.diagnostics)
    }

    /// Analyze a document and publish diagnostics.
    async fn analyze_and_publish(&self, uri: Url) {
        if let Some(doc) = self.documents.get(&uri) {
            let diagnostics = self.diagnostics_for(&uri, &doc.text());
            self.client
                .publish_diagnostics(uri, diagnostics, Some(doc.version))
                .await;
        }
    }

    /// Rescan the workspace on a blocking thread.
    fn spawn_full_scan(&self) {
        let scanner = Arc::clone(&self.scanner);
        let client = self.client.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || scanner.full_scan()).await {
                Ok(summary) if summary.completed => {
                    client
                        .log_message(
                            MessageType::INFO,
                            format!(
                                "view.tree index ready: {} components from {} files",
                                summary.components,
                                summary.primary_files + summary.secondary_files
                            ),
                        )
                        .await;
                }
                Ok(_) => {}
                Err(e) => log::error!("Workspace scan failed: {}", e),
            }
        });
    }

    /// Ask the client to report changes to files that are not open.
    async fn register_file_watchers(&self) {
        let scan = self.config().scan;
        let watchers: Vec<_> = [scan.primary_suffix, scan.secondary_suffix]
            .iter()
            .map(|suffix| json!({ "globPattern": format!("**/*{suffix}") }))
            .collect();
        let registration = Registration {
            id: "viewtree-watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: Some(json!({ "watchers": watchers })),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            log::debug!("Client declined file watching: {}", e);
        }
    }
}

fn file_path(uri: &Url) -> viewtree_core::Result<PathBuf> {
    uri.to_file_path()
        .map_err(|_| Error::NotAFileUri(uri.to_string()))
}

/// Workspace root from the initialize request, falling back to `.`
fn workspace_root(params: &InitializeParams) -> PathBuf {
    #[allow(deprecated)]
    let root_uri = params.root_uri.as_ref();
    root_uri
        .and_then(|uri| uri.to_file_path().ok())
        .or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first())
                .and_then(|folder| folder.uri.to_file_path().ok())
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration from initialization options, else `viewtree.toml` in `root`.
fn initial_config(options: Option<serde_json::Value>, root: &Path, fallback: Config) -> Config {
    if let Some(options) = options.filter(|o| !o.is_null()) {
        match Config::from_json(options) {
            Ok(config) => return config,
            Err(e) => log::warn!("Ignoring initialization options: {}", e),
        }
    }
    match Config::workspace_file(root) {
        Some(path) => Config::load(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring {}: {}", path.display(), e);
            fallback
        }),
        None => fallback,
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for ViewTreeServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let root = workspace_root(&params);
        log::info!("Workspace root: {}", root.display());

        let config = initial_config(params.initialization_options, &root, self.config());
        self.scanner.set_root(root);
        self.set_config(config);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        "$".to_string(),
                        "_".to_string(),
                        " ".to_string(),
                        "\t".to_string(),
                    ]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                diagnostic_provider: Some(DiagnosticServerCapabilities::Options(
                    DiagnosticOptions {
                        identifier: Some("view.tree".to_string()),
                        inter_file_dependencies: true,
                        workspace_diagnostics: false,
                        ..Default::default()
                    },
                )),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "viewtree-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "view.tree language server initialized")
            .await;
        self.register_file_watchers().await;
        self.spawn_full_scan();
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;
        let version = params.text_document.version;

        self.documents.open(uri.clone(), &text, version);
        self.index_document(&uri, &text);
        self.analyze_and_publish(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        if let Some(text) = self
            .documents
            .apply_changes(&uri, &params.content_changes, version)
        {
            self.index_document(&uri, &text);
            self.analyze_and_publish(uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = match params.text {
            Some(text) => Some(text),
            None => self.documents.get(&uri).map(|doc| doc.text()),
        };
        if let Some(text) = text {
            self.index_document(&uri, &text);
            self.analyze_and_publish(uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.close(&uri);

        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            let path = match file_path(&change.uri) {
                Ok(path) => path,
                Err(e) => {
                    log::debug!("Ignoring watched file change: {}", e);
                    continue;
                }
            };
            if change.typ == FileChangeType::DELETED {
                self.scanner.remove_file(&path);
                continue;
            }
            // Open documents are tracked through their own notifications
            if self.documents.is_open(&change.uri) {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    self.scanner.update_file(&path, &text);
                }
                Err(e) => log::warn!("Cannot read {}: {}", path.display(), e),
            }
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let Some(folder) = params.event.added.first() else {
            return;
        };
        if let Ok(root) = folder.uri.to_file_path() {
            log::info!("Workspace root changed to {}", root.display());
            self.scanner.set_root(root);
            self.spawn_full_scan();
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let doc = match self.documents.get(&uri) {
            Some(d) => d,
            None => return Ok(None),
        };

        let content = doc.text();
        let context = match completion_context(&content, position) {
            Some(c) => c,
            None => return Ok(Some(CompletionResponse::Array(vec![]))),
        };

        log::debug!("Completion at {}:{:?} as {:?}", uri, position, context);
        let index = self.scanner.index();
        let completions = get_completions(&context, &index);

        Ok(Some(CompletionResponse::Array(completions)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        log::debug!("Hover at {}:{:?}", uri, position);

        Ok(self
            .with_document(&uri, |ctx| get_hover(ctx, position))
            .flatten())
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        log::debug!("Definition at {}:{:?}", uri, position);

        Ok(self
            .with_document(&uri, |ctx| get_definition(ctx, position))
            .flatten())
    }

    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult> {
        let uri = params.text_document.uri;

        let items = match self.documents.get(&uri) {
            Some(doc) => self.diagnostics_for(&uri, &doc.text()),
            None => vec![],
        };

        Ok(DocumentDiagnosticReportResult::Report(
            DocumentDiagnosticReport::Full(RelatedFullDocumentDiagnosticReport {
                related_documents: None,
                full_document_diagnostic_report: FullDocumentDiagnosticReport {
                    result_id: None,
                    items,
                },
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> InitializeParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_root_from_root_uri() {
        let p = params(json!({
            "capabilities": {},
            "rootUri": "file:///work/project",
            "workspaceFolders": [{ "uri": "file:///other", "name": "other" }]
        }));
        assert_eq!(workspace_root(&p), PathBuf::from("/work/project"));
    }

    #[test]
    fn test_root_from_workspace_folder() {
        let p = params(json!({
            "capabilities": {},
            "rootUri": null,
            "workspaceFolders": [{ "uri": "file:///other", "name": "other" }]
        }));
        assert_eq!(workspace_root(&p), PathBuf::from("/other"));
    }

    #[test]
    fn test_root_defaults_to_current_dir() {
        let p = params(json!({ "capabilities": {}, "rootUri": null }));
        assert_eq!(workspace_root(&p), PathBuf::from("."));
    }

    #[test]
    fn test_file_path_rejects_other_schemes() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        assert!(matches!(file_path(&uri), Err(Error::NotAFileUri(_))));
        let uri = Url::parse("file:///w/a.view.tree").unwrap();
        assert_eq!(file_path(&uri).unwrap(), PathBuf::from("/w/a.view.tree"));
    }

    #[test]
    fn test_config_from_options_then_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("viewtree.toml"),
            "[diagnostics]\nunknown_components = false\n",
        )
        .unwrap();

        let from_file = initial_config(None, dir.path(), Config::default());
        assert!(!from_file.diagnostics.unknown_components);

        let from_options = initial_config(
            Some(json!({ "scan": { "maxSecondaryFiles": 7 } })),
            dir.path(),
            Config::default(),
        );
        assert_eq!(from_options.scan.max_secondary_files, 7);
        assert!(from_options.diagnostics.unknown_components);

        let invalid = initial_config(Some(json!({ "scan": 3 })), dir.path(), Config::default());
        assert!(!invalid.diagnostics.unknown_components);
    }
}
