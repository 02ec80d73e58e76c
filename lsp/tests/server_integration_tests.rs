//! End-to-end dispatch: notifications update the store, requests come back
//! as responses, diagnostics are published through the sink.

mod test_utils;

use anyhow::Result;
use lsp_server::{Notification, Request, RequestId, Response};
use lsp_types::notification::Notification as _;
use lsp_types::request::Request as _;
use lsp_types::*;
use lume_lsp::{LspConnection, MessageHandler, RunParams, ServerConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_utils::uri;

#[derive(Clone, Default)]
struct RecordingConnection {
    responses: Arc<Mutex<Vec<Response>>>,
}

impl LspConnection for RecordingConnection {
    fn send_response(&self, response: Response) -> Result<()> {
        self.responses.lock().push(response);
        Ok(())
    }

    fn send_notification(&self, _notification: Notification) -> Result<()> {
        Ok(())
    }
}

struct Server {
    handler: MessageHandler,
    connection: RecordingConnection,
    published: Arc<Mutex<Vec<PublishDiagnosticsParams>>>,
}

fn server() -> Server {
    let published: Arc<Mutex<Vec<PublishDiagnosticsParams>>> = Arc::default();
    let sink_target = Arc::clone(&published);
    let handler = MessageHandler::new(
        ServerConfig::default(),
        Arc::new(move |params| sink_target.lock().push(params)),
    );
    Server {
        handler,
        connection: RecordingConnection::default(),
        published,
    }
}

impl Server {
    fn open(&self, uri: &Uri, text: &str) {
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: "lume".to_string(),
                version: 1,
                text: text.to_string(),
            },
        };
        let not = Notification::new(
            lsp_types::notification::DidOpenTextDocument::METHOD.to_string(),
            params,
        );
        self.handler.handle_notification(not).unwrap();
    }

    fn request<R>(&self, id: i32, params: R::Params) -> Response
    where
        R: lsp_types::request::Request,
        R::Params: serde::Serialize,
    {
        let req = Request::new(RequestId::from(id), R::METHOD.to_string(), params);
        self.handler.handle_request(&self.connection, req).unwrap();
        let mut responses = self.connection.responses.lock();
        let at = responses
            .iter()
            .rposition(|r| r.id == RequestId::from(id))
            .expect("response sent");
        responses.remove(at)
    }

    fn wait_for_diagnostics(&self) -> PublishDiagnosticsParams {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(p) = self.published.lock().last().cloned() {
                return p;
            }
            assert!(Instant::now() < deadline, "diagnostics never published");
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

fn text_document_position(uri: &Uri, line: u32, character: u32) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        position: Position { line, character },
    }
}

#[test]
fn open_publishes_diagnostics_in_the_background() {
    let server = server();
    let u = uri("server-diag.lume");
    server.open(&u, "ex is\n  frobnicate\n");

    let published = server.wait_for_diagnostics();
    assert_eq!(published.uri, u);
    assert_eq!(published.diagnostics.len(), 1);
    assert!(published.diagnostics[0].message.contains("frobnicate"));
}

#[test]
fn change_notifications_reparse_and_republish() {
    let server = server();
    let u = uri("server-change.lume");
    server.open(&u, "ex is\n  frobnicate\n");
    server.wait_for_diagnostics();
    server.published.lock().clear();

    let change = DidChangeTextDocumentParams {
        text_document: VersionedTextDocumentIdentifier {
            uri: u.clone(),
            version: 2,
        },
        content_changes: vec![TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position { line: 1, character: 2 },
                end: Position { line: 1, character: 12 },
            }),
            range_length: None,
            text: "say \"ok\"".to_string(),
        }],
    };
    let not = Notification::new(
        lsp_types::notification::DidChangeTextDocument::METHOD.to_string(),
        change,
    );
    server.handler.handle_notification(not).unwrap();

    let published = server.wait_for_diagnostics();
    assert!(published.diagnostics.is_empty(), "fixed source is clean");
}

#[test]
fn definition_request_round_trips() {
    let server = server();
    let u = uri("server-def.lume");
    server.open(&u, "greeter is\n  greet is\n    say \"hi\"\n  greet\n");

    let response = server.request::<lsp_types::request::GotoDefinition>(
        7,
        GotoDefinitionParams {
            text_document_position_params: text_document_position(&u, 3, 3),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        },
    );
    assert!(response.error.is_none());
    let loc: Location = match serde_json::from_value(response.result.unwrap()).unwrap() {
        GotoDefinitionResponse::Scalar(loc) => loc,
        other => panic!("unexpected response shape: {other:?}"),
    };
    assert_eq!(loc.range.start, Position { line: 1, character: 2 });
}

#[test]
fn renaming_a_builtin_is_rejected_with_a_reason() {
    let server = server();
    let u = uri("server-rename.lume");
    server.open(&u, "ex is\n  say \"x\"\n");

    let response = server.request::<lsp_types::request::Rename>(
        9,
        RenameParams {
            text_document_position: text_document_position(&u, 1, 3),
            new_name: "shout".to_string(),
            work_done_progress_params: Default::default(),
        },
    );
    let error = response.error.expect("rejected");
    assert!(error.message.contains("built in"));
}

#[test]
fn run_request_captures_interpreter_output() {
    let published: Arc<Mutex<Vec<PublishDiagnosticsParams>>> = Arc::default();
    let sink_target = Arc::clone(&published);
    let config = ServerConfig {
        // `cat` echoes the temp file back; good enough for the wire test.
        interpreter: "cat".to_string(),
        ..ServerConfig::default()
    };
    let handler = MessageHandler::new(config, Arc::new(move |p| sink_target.lock().push(p)));
    let connection = RecordingConnection::default();

    let u = uri("server-run.lume");
    let open = DidOpenTextDocumentParams {
        text_document: TextDocumentItem {
            uri: u.clone(),
            language_id: "lume".to_string(),
            version: 1,
            text: "say \"run me\"\n".to_string(),
        },
    };
    handler
        .handle_notification(Notification::new(
            lsp_types::notification::DidOpenTextDocument::METHOD.to_string(),
            open,
        ))
        .unwrap();

    let req = Request::new(
        RequestId::from(11),
        lume_lsp::RunProgram::METHOD.to_string(),
        RunParams {
            uri: u,
            timeout_ms: Some(5_000),
        },
    );
    handler.handle_request(&connection, req).unwrap();

    let responses = connection.responses.lock();
    let response = responses.last().expect("run response");
    assert!(response.error.is_none());
    let result: lume_lsp::RunResult =
        serde_json::from_value(response.result.clone().unwrap()).unwrap();
    assert_eq!(result.stdout, "say \"run me\"\n");
    assert!(!result.timed_out);
}

#[test]
fn completion_after_a_trailing_dot_round_trips() {
    let server = server();
    let u = uri("server-complete.lume");
    server.open(&u, "ex is\n  (1..10).\n");

    let response = server.request::<lsp_types::request::Completion>(
        13,
        CompletionParams {
            text_document_position: text_document_position(&u, 1, 10),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        },
    );
    assert!(response.error.is_none());
    let completions: CompletionResponse =
        serde_json::from_value(response.result.unwrap()).unwrap();
    let CompletionResponse::Array(items) = completions else {
        panic!("array expected");
    };
    assert!(items.iter().any(|i| i.label == "forAll"));
}
