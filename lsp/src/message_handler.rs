//! Request/notification dispatch.
//!
//! Every compiler-touching request goes through the worker harness with a
//! per-category ceiling; the four outcome classes map to distinct wire
//! responses: value, invalid-request error, cancelled, deadline exceeded.
//! Internal errors additionally write a crash artifact.

use crate::core::analysis::{Analysis, SharedAnalysis};
use crate::core::config::ServerConfig;
use crate::core::worker::{CancelToken, QueryError, Worker};
use crate::core::{crash, ContentEdit, SnapshotError};
use crate::features::{self, FeatureError};
use crate::protocol::LspConnection;
use anyhow::Result;
use lsp_server::{Notification, Request, RequestId, Response};
use lsp_types::notification::{
    DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, DidSaveTextDocument,
};
use lsp_types::request::{
    Completion, DocumentHighlightRequest, DocumentSymbolRequest, GotoDefinition, HoverRequest,
    PrepareRenameRequest, References, Rename,
};
use lsp_types::{
    CompletionResponse, DocumentSymbolResponse, GotoDefinitionResponse, PublishDiagnosticsParams,
    Uri,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// JSON-RPC error codes used by the responses below.
mod codes {
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const REQUEST_CANCELLED: i32 = -32800;
    pub const REQUEST_FAILED: i32 = -32803;
}

/// Custom request: run the program in a document through the configured
/// interpreter.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    pub uri: Uri,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

pub enum RunProgram {}

impl lsp_types::request::Request for RunProgram {
    type Params = RunParams;
    type Result = RunResult;
    const METHOD: &'static str = "lume/run";
}

/// Where computed diagnostics go; the stdio transport sends a
/// `textDocument/publishDiagnostics` notification, tests collect them.
pub type DiagnosticsSink = Arc<dyn Fn(PublishDiagnosticsParams) + Send + Sync>;

pub struct MessageHandler {
    analysis: SharedAnalysis,
    worker: Arc<Worker>,
    config: ServerConfig,
    diagnostics_sink: DiagnosticsSink,
}

impl MessageHandler {
    pub fn new(config: ServerConfig, diagnostics_sink: DiagnosticsSink) -> Self {
        Self {
            analysis: Analysis::shared(),
            worker: Arc::new(Worker::new()),
            config,
            diagnostics_sink,
        }
    }

    pub fn analysis(&self) -> SharedAnalysis {
        Arc::clone(&self.analysis)
    }

    /// Run a feature on the sequential worker under the given ceiling.
    fn tracked<T, F>(&self, ceiling: Duration, f: F) -> Result<Result<T, FeatureError>, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Analysis) -> Result<T, FeatureError> + Send + 'static,
    {
        let analysis = Arc::clone(&self.analysis);
        let cancel = CancelToken::new();
        self.worker
            .run_tracked(&cancel, self.config.poll_interval, ceiling, move || {
                let mut guard = analysis.lock();
                f(&mut guard)
            })
    }

    fn respond<C, T>(
        &self,
        connection: &C,
        id: RequestId,
        outcome: Result<Result<T, FeatureError>, QueryError>,
    ) -> Result<()>
    where
        C: LspConnection,
        T: Serialize,
    {
        let response = match outcome {
            Ok(Ok(value)) => Response::new_ok(id, value),
            Ok(Err(FeatureError::InvalidRequest(reason))) => {
                Response::new_err(id, codes::INVALID_PARAMS, reason)
            }
            Ok(Err(FeatureError::Snapshot(SnapshotError::UnknownDocument(uri)))) => {
                Response::new_err(id, codes::INVALID_PARAMS, format!("unknown document: {uri}"))
            }
            Ok(Err(FeatureError::Snapshot(SnapshotError::CompilerPanic(msg)))) => {
                crash::report_internal_error("compile", &msg, self.config.abort_on_internal_error);
                Response::new_err(id, codes::INTERNAL_ERROR, msg)
            }
            Err(QueryError::Cancelled) => {
                Response::new_err(id, codes::REQUEST_CANCELLED, "request cancelled".to_string())
            }
            Err(QueryError::DeadlineExceeded) => Response::new_err(
                id,
                codes::REQUEST_FAILED,
                "max execution time exceeded".to_string(),
            ),
            Err(QueryError::Internal(msg)) => {
                crash::report_internal_error("request", &msg, self.config.abort_on_internal_error);
                Response::new_err(id, codes::INTERNAL_ERROR, msg)
            }
        };
        connection.send_response(response)
    }

    pub fn handle_request<C: LspConnection>(&self, connection: &C, req: Request) -> Result<()> {
        let ceiling = self.config.query_ceiling;

        let req = match Self::cast_request::<Completion>(req) {
            Ok((id, params)) => {
                let uri = params.text_document_position.text_document.uri;
                let position = params.text_document_position.position;
                let outcome = self.tracked(ceiling, move |a| {
                    features::completion::provide(a, &uri, position).map(CompletionResponse::Array)
                });
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<HoverRequest>(req) {
            Ok((id, params)) => {
                let uri = params.text_document_position_params.text_document.uri;
                let position = params.text_document_position_params.position;
                let outcome =
                    self.tracked(ceiling, move |a| features::hover::provide(a, &uri, position));
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<GotoDefinition>(req) {
            Ok((id, params)) => {
                let uri = params.text_document_position_params.text_document.uri;
                let position = params.text_document_position_params.position;
                let outcome = self.tracked(ceiling, move |a| {
                    features::navigation::definition(a, &uri, position)
                        .map(|loc| loc.map(GotoDefinitionResponse::Scalar))
                });
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<References>(req) {
            Ok((id, params)) => {
                let uri = params.text_document_position.text_document.uri;
                let position = params.text_document_position.position;
                let include_declaration = params.context.include_declaration;
                let outcome = self.tracked(ceiling, move |a| {
                    features::navigation::references(a, &uri, position, include_declaration)
                });
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<DocumentHighlightRequest>(req) {
            Ok((id, params)) => {
                let uri = params.text_document_position_params.text_document.uri;
                let position = params.text_document_position_params.position;
                let outcome = self.tracked(ceiling, move |a| {
                    features::navigation::highlights(a, &uri, position)
                });
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<PrepareRenameRequest>(req) {
            Ok((id, params)) => {
                let uri = params.text_document.uri;
                let position = params.position;
                let outcome =
                    self.tracked(ceiling, move |a| features::rename::prepare(a, &uri, position));
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<Rename>(req) {
            Ok((id, params)) => {
                let uri = params.text_document_position.text_document.uri;
                let position = params.text_document_position.position;
                let new_name = params.new_name;
                let outcome = self.tracked(ceiling, move |a| {
                    features::rename::rename(a, &uri, position, &new_name)
                });
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<DocumentSymbolRequest>(req) {
            Ok((id, params)) => {
                let uri = params.text_document.uri;
                let outcome = self.tracked(ceiling, move |a| {
                    features::symbols::provide(a, &uri).map(DocumentSymbolResponse::Nested)
                });
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        let req = match Self::cast_request::<RunProgram>(req) {
            Ok((id, params)) => {
                // Launching the interpreter never touches compiler state;
                // only the text fetch takes the analysis lock.
                let text = self.analysis.lock().store.get_text(&params.uri);
                let outcome = match text {
                    None => Ok(Err(FeatureError::InvalidRequest(format!(
                        "unknown document: {}",
                        params.uri.as_str()
                    )))),
                    Some(text) => {
                        let timeout = params.timeout_ms.map(Duration::from_millis);
                        match features::run::run_program(&self.config, &text, timeout) {
                            Ok(outcome) => Ok(Ok(RunResult {
                                stdout: outcome.stdout,
                                stderr: outcome.stderr,
                                exit_code: outcome.exit_code,
                                timed_out: outcome.timed_out,
                            })),
                            Err(reason) => Ok(Err(FeatureError::InvalidRequest(reason))),
                        }
                    }
                };
                return self.respond(connection, id, outcome);
            }
            Err(req) => req,
        };

        tracing::debug!(method = req.method, "unhandled request");
        Ok(())
    }

    pub fn handle_notification(&self, not: Notification) -> Result<()> {
        let not = match Self::cast_notification::<DidOpenTextDocument>(not) {
            Ok(params) => {
                let uri = params.text_document.uri;
                self.analysis
                    .lock()
                    .store
                    .set_text(&uri, params.text_document.text);
                self.publish_diagnostics_in_background(uri);
                return Ok(());
            }
            Err(not) => not,
        };

        let not = match Self::cast_notification::<DidChangeTextDocument>(not) {
            Ok(params) => {
                let uri = params.text_document.uri;
                let edits: Vec<ContentEdit> = params
                    .content_changes
                    .into_iter()
                    .map(|change| ContentEdit {
                        range: change.range,
                        text: change.text,
                    })
                    .collect();
                self.analysis.lock().store.apply_change(&uri, &edits);
                self.publish_diagnostics_in_background(uri);
                return Ok(());
            }
            Err(not) => not,
        };

        let not = match Self::cast_notification::<DidSaveTextDocument>(not) {
            Ok(_params) => return Ok(()),
            Err(not) => not,
        };

        match Self::cast_notification::<DidCloseTextDocument>(not) {
            Ok(params) => {
                let uri = params.text_document.uri;
                self.analysis.lock().store.remove(&uri);
                // Clear stale diagnostics on close.
                (self.diagnostics_sink)(PublishDiagnosticsParams {
                    uri,
                    diagnostics: vec![],
                    version: None,
                });
            }
            Err(_not) => {}
        }

        Ok(())
    }

    /// Compile on the worker, publish from the background pool. The main
    /// loop never waits for diagnostics.
    fn publish_diagnostics_in_background(&self, uri: Uri) {
        let analysis = Arc::clone(&self.analysis);
        let worker = Arc::clone(&self.worker);
        let sink = Arc::clone(&self.diagnostics_sink);
        let poll = self.config.poll_interval;
        let ceiling = self.config.diagnostics_ceiling;
        let abort = self.config.abort_on_internal_error;

        Worker::run_in_background(move || {
            let cancel = CancelToken::new();
            let query_uri = uri.clone();
            let outcome = worker.run_tracked(&cancel, poll, ceiling, move || {
                let mut guard = analysis.lock();
                features::diagnostics::provide(&mut guard, &query_uri)
            });
            match outcome {
                Ok(Ok(diagnostics)) => sink(PublishDiagnosticsParams {
                    uri,
                    diagnostics,
                    version: None,
                }),
                Ok(Err(e)) => tracing::warn!(uri = uri.as_str(), error = %e, "diagnostics failed"),
                Err(QueryError::Cancelled) => {}
                Err(QueryError::DeadlineExceeded) => {
                    tracing::warn!(uri = uri.as_str(), "diagnostics exceeded their ceiling")
                }
                Err(QueryError::Internal(msg)) => {
                    crash::report_internal_error("diagnostics", &msg, abort)
                }
            }
        });
    }

    fn cast_request<R>(req: Request) -> std::result::Result<(RequestId, R::Params), Request>
    where
        R: lsp_types::request::Request,
        R::Params: DeserializeOwned,
    {
        match req.extract(R::METHOD) {
            Ok(parts) => Ok(parts),
            Err(lsp_server::ExtractError::MethodMismatch(req)) => Err(req),
            Err(lsp_server::ExtractError::JsonError { method, error }) => {
                tracing::error!("failed to deserialize request {}: {}", method, error);
                Err(Request::new(
                    RequestId::from(0),
                    method,
                    serde_json::Value::Null,
                ))
            }
        }
    }

    fn cast_notification<N>(not: Notification) -> std::result::Result<N::Params, Notification>
    where
        N: lsp_types::notification::Notification,
        N::Params: DeserializeOwned,
    {
        match not.extract(N::METHOD) {
            Ok(params) => Ok(params),
            Err(lsp_server::ExtractError::MethodMismatch(not)) => Err(not),
            Err(lsp_server::ExtractError::JsonError { method, error }) => {
                tracing::error!("failed to deserialize notification {}: {}", method, error);
                Err(Notification::new(method, serde_json::Value::Null))
            }
        }
    }
}
