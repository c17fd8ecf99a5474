// JSON-RPC 2.0 method registry, dispatcher and serve loop.
//
// One connection is one serve() call: newline-delimited JSON-RPC messages
// in on the reader, responses and notifications out through a single
// writer task. Requests dispatch concurrently; the writer funnel keeps
// every outbound message an atomic line and notifications in send order.

use crate::messages::logging::{LoggingLevel, LoggingMessageParams, SetLevelParams};
use crate::messages::notifications::{CancelledParams, ProgressParams, ResourceUpdatedParams};
use crate::messages::prompts::{GetPromptParams, ListPromptsParams};
use crate::messages::resources::{
    ListResourceTemplatesParams, ListResourcesParams, ReadResourceParams, ReadResourceResult,
    SubscribeParams, UnsubscribeParams,
};
use crate::messages::tools::{CallToolParams, ListToolsParams, ListToolsResult};
use crate::messages::{
    Implementation, InitializeParams, InitializeResult, LoggingCapability, PromptCapability,
    ResourceCapability, ServerCapabilities, ToolCapability, METHOD_INITIALIZE,
    METHOD_LOGGING_SET_LEVEL, METHOD_PING, METHOD_PROMPTS_GET, METHOD_PROMPTS_LIST,
    METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ, METHOD_RESOURCES_SUBSCRIBE,
    METHOD_RESOURCES_TEMPLATES_LIST, METHOD_RESOURCES_UNSUBSCRIBE, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST, NOTIFICATION_CANCELLED, NOTIFICATION_INITIALIZED, NOTIFICATION_MESSAGE,
    NOTIFICATION_PROGRESS, NOTIFICATION_PROMPTS_LIST_CHANGED, NOTIFICATION_RESOURCES_LIST_CHANGED,
    NOTIFICATION_RESOURCES_UPDATED, NOTIFICATION_ROOTS_LIST_CHANGED,
    NOTIFICATION_TOOLS_LIST_CHANGED,
};
use crate::prompts::PromptProvider;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ResponsePayload};
use crate::resources::ResourceProvider;
use crate::session::CapabilitySession;
use crate::tools::{ToolRegistry, DEFAULT_PAGE_SIZE};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;

/// Per-request context handed to handlers. The cancellation token fires
/// when the client abandons the request or the connection ends; honoring
/// it is best-effort.
#[derive(Clone)]
pub struct RequestContext {
    pub cancel: CancellationToken,
}

/// A registered method implementation: raw params in, result payload or
/// structured error out. Decoding and validating params is the handler's
/// job; the dispatcher has already checked the envelope.
#[async_trait::async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(
        &self,
        params: Option<Value>,
        cx: RequestContext,
    ) -> Result<Value, JsonRpcError>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait::async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Option<Value>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, JsonRpcError>> + Send + 'static,
{
    async fn handle(
        &self,
        params: Option<Value>,
        cx: RequestContext,
    ) -> Result<Value, JsonRpcError> {
        (self.f)(params, cx).await
    }
}

/// Wrap an async closure as a [`MethodHandler`].
pub fn method_fn<F, Fut>(f: F) -> Arc<dyn MethodHandler>
where
    F: Fn(Option<Value>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, JsonRpcError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Handle for emitting server → client notifications. Clones share the
/// connection's outbound funnel, so send order is preserved.
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<String>,
    session: Arc<RwLock<CapabilitySession>>,
}

impl NotificationSender {
    pub fn tools_list_changed(&self) {
        self.send(NOTIFICATION_TOOLS_LIST_CHANGED, None);
    }

    pub fn resources_list_changed(&self) {
        self.send(NOTIFICATION_RESOURCES_LIST_CHANGED, None);
    }

    pub fn prompts_list_changed(&self) {
        self.send(NOTIFICATION_PROMPTS_LIST_CHANGED, None);
    }

    pub fn resource_updated(&self, uri: impl Into<String>) {
        let params = ResourceUpdatedParams { uri: uri.into() };
        self.send_params(NOTIFICATION_RESOURCES_UPDATED, &params);
    }

    pub fn progress(&self, progress_token: Value, progress: f64, total: Option<f64>) {
        let params = ProgressParams {
            progress_token,
            progress,
            total,
        };
        self.send_params(NOTIFICATION_PROGRESS, &params);
    }

    /// Forward a log message to the client, honoring the minimum level it
    /// chose via logging/setLevel.
    pub async fn message(&self, level: LoggingLevel, logger: Option<&str>, data: Value) {
        if level < self.session.read().await.log_level() {
            return;
        }
        let params = LoggingMessageParams {
            level,
            logger: logger.map(str::to_string),
            data,
        };
        self.send_params(NOTIFICATION_MESSAGE, &params);
    }

    fn send_params<T: Serialize>(&self, method: &str, params: &T) {
        match serde_json::to_value(params) {
            Ok(value) => self.send(method, Some(value)),
            Err(err) => tracing::error!(%err, method, "failed to encode notification params"),
        }
    }

    fn send(&self, method: &str, params: Option<Value>) {
        let note = JsonRpcRequest::notification(method, params);
        match serde_json::to_string(&note) {
            Ok(line) => {
                if self.tx.send(line).is_err() {
                    tracing::debug!(method, "notification dropped, connection closed");
                }
            }
            Err(err) => tracing::error!(%err, method, "failed to encode notification"),
        }
    }
}

/// MCP server for one connection: a method registry, the capability
/// session, and the serve loop that ties them to a byte stream.
///
/// Each instance owns its own registry and session; independent servers
/// (e.g. in tests) share nothing.
pub struct McpServer {
    server_info: Implementation,
    instructions: Arc<std::sync::RwLock<Option<String>>>,
    capabilities: Arc<std::sync::RwLock<ServerCapabilities>>,
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
    session: Arc<RwLock<CapabilitySession>>,
    inflight: Arc<Mutex<HashMap<String, CancellationToken>>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl McpServer {
    pub fn new(server_info: Implementation) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut server = Self {
            server_info,
            instructions: Arc::new(std::sync::RwLock::new(None)),
            capabilities: Arc::new(std::sync::RwLock::new(ServerCapabilities {
                logging: Some(LoggingCapability {}),
                ..Default::default()
            })),
            handlers: HashMap::new(),
            session: Arc::new(RwLock::new(CapabilitySession::new())),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        };
        server.register_builtins();
        server
    }

    /// Optional usage text surfaced to the client in the initialize
    /// result.
    pub fn with_instructions(self, instructions: impl Into<String>) -> Self {
        *self
            .instructions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(instructions.into());
        self
    }

    /// Register a handler under a method name. Registering the same name
    /// again replaces the previous handler; the last registration wins.
    /// This is a deliberate contract so feature modules can be wired
    /// independently and overrides are explicit.
    pub fn register_method(&mut self, name: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(method = %name, "method handler replaced");
        } else {
            tracing::debug!(method = %name, "method registered");
        }
    }

    /// Notification handle, valid for the lifetime of the connection.
    /// Messages sent before serve() starts are queued.
    pub fn notifications(&self) -> NotificationSender {
        NotificationSender {
            tx: self.outbound_tx.clone(),
            session: self.session.clone(),
        }
    }

    fn register_builtins(&mut self) {
        let session = self.session.clone();
        let capabilities = self.capabilities.clone();
        let server_info = self.server_info.clone();
        let instructions = self.instructions.clone();
        self.register_method(
            METHOD_INITIALIZE,
            method_fn(move |params, _cx| {
                let session = session.clone();
                let capabilities = capabilities.clone();
                let server_info = server_info.clone();
                let instructions = instructions.clone();
                async move {
                    let args: InitializeParams = params_from(params)?;
                    tracing::info!(
                        client = %args.client_info.name,
                        client_version = %args.client_info.version,
                        "initialize"
                    );
                    let negotiated = session.write().await.begin_initialize(args)?;
                    let capabilities = read_caps(&capabilities);
                    let instructions = instructions
                        .read()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .clone();
                    to_result(&InitializeResult {
                        protocol_version: negotiated,
                        capabilities,
                        server_info,
                        instructions,
                    })
                }
            }),
        );

        self.register_method(
            METHOD_PING,
            method_fn(|_params, _cx| async { Ok(json!({})) }),
        );

        let session = self.session.clone();
        self.register_method(
            NOTIFICATION_INITIALIZED,
            method_fn(move |_params, _cx| {
                let session = session.clone();
                async move {
                    session.write().await.mark_initialized()?;
                    tracing::info!("session ready");
                    Ok(Value::Null)
                }
            }),
        );

        let inflight = self.inflight.clone();
        self.register_method(
            NOTIFICATION_CANCELLED,
            method_fn(move |params, _cx| {
                let inflight = inflight.clone();
                async move {
                    let args: CancelledParams = params_from(params)?;
                    let key = id_key(&args.request_id);
                    match inflight.lock().await.remove(&key) {
                        Some(token) => {
                            tracing::debug!(
                                request = %key,
                                reason = args.reason.as_deref().unwrap_or(""),
                                "request cancelled by client"
                            );
                            token.cancel();
                        }
                        None => {
                            tracing::debug!(request = %key, "cancellation for unknown request");
                        }
                    }
                    Ok(Value::Null)
                }
            }),
        );

        self.register_method(
            NOTIFICATION_ROOTS_LIST_CHANGED,
            method_fn(|_params, _cx| async {
                tracing::debug!("client roots changed");
                Ok(Value::Null)
            }),
        );

        let session = self.session.clone();
        self.register_method(
            METHOD_LOGGING_SET_LEVEL,
            method_fn(move |params, _cx| {
                let session = session.clone();
                async move {
                    let args: SetLevelParams = params_from(params)?;
                    session.write().await.set_log_level(args.level);
                    Ok(json!({}))
                }
            }),
        );
    }

    /// Expose a tool registry through tools/list and tools/call.
    pub fn attach_tools(&mut self, registry: Arc<ToolRegistry>) {
        write_caps(&self.capabilities).tools = Some(ToolCapability { list_changed: true });

        let list_registry = registry.clone();
        self.register_method(
            METHOD_TOOLS_LIST,
            method_fn(move |params, _cx| {
                let registry = list_registry.clone();
                async move {
                    let args: ListToolsParams = params_or_default(params)?;
                    let (tools, next_cursor) =
                        registry.page(args.cursor.as_deref(), DEFAULT_PAGE_SIZE)?;
                    to_result(&ListToolsResult { tools, next_cursor })
                }
            }),
        );

        self.register_method(
            METHOD_TOOLS_CALL,
            method_fn(move |params, cx| {
                let registry = registry.clone();
                async move {
                    let args: CallToolParams = params_from(params)?;
                    let tool = registry.get(&args.name).ok_or_else(|| {
                        JsonRpcError::invalid_params(format!("unknown tool: {}", args.name), None)
                    })?;
                    let arguments = args.arguments.unwrap_or_else(|| json!({}));

                    let outcome = tokio::select! {
                        _ = cx.cancel.cancelled() => {
                            return Err(JsonRpcError::internal_error("request cancelled", None));
                        }
                        outcome = tool.execute(arguments) => outcome,
                    };

                    match outcome {
                        Ok(result) => to_result(&result),
                        Err(err) => Err(match err.downcast::<JsonRpcError>() {
                            Ok(structured) => structured,
                            Err(fault) => JsonRpcError::from_fault(&fault),
                        }),
                    }
                }
            }),
        );
    }

    /// Expose a resource provider through the resources/* methods.
    pub fn attach_resources(&mut self, provider: Arc<dyn ResourceProvider>) {
        let subscribable = provider.supports_subscribe();
        write_caps(&self.capabilities).resources = Some(ResourceCapability {
            subscribe: subscribable,
            list_changed: true,
        });

        let list_provider = provider.clone();
        self.register_method(
            METHOD_RESOURCES_LIST,
            method_fn(move |params, _cx| {
                let provider = list_provider.clone();
                async move {
                    let args: ListResourcesParams = params_or_default(params)?;
                    let result = provider.list(args.cursor).await?;
                    to_result(&result)
                }
            }),
        );

        let templates_provider = provider.clone();
        self.register_method(
            METHOD_RESOURCES_TEMPLATES_LIST,
            method_fn(move |params, _cx| {
                let provider = templates_provider.clone();
                async move {
                    let args: ListResourceTemplatesParams = params_or_default(params)?;
                    let result = provider.templates(args.cursor).await?;
                    to_result(&result)
                }
            }),
        );

        let read_provider = provider.clone();
        self.register_method(
            METHOD_RESOURCES_READ,
            method_fn(move |params, _cx| {
                let provider = read_provider.clone();
                async move {
                    let args: ReadResourceParams = params_from(params)?;
                    let contents = provider.read(&args.uri).await?;
                    to_result(&ReadResourceResult { contents })
                }
            }),
        );

        if subscribable {
            let subscriptions = Arc::new(Mutex::new(HashSet::<String>::new()));

            let subs = subscriptions.clone();
            self.register_method(
                METHOD_RESOURCES_SUBSCRIBE,
                method_fn(move |params, _cx| {
                    let subs = subs.clone();
                    async move {
                        let args: SubscribeParams = params_from(params)?;
                        subs.lock().await.insert(args.uri.clone());
                        tracing::debug!(uri = %args.uri, "resource subscribed");
                        Ok(json!({}))
                    }
                }),
            );

            let subs = subscriptions.clone();
            self.register_method(
                METHOD_RESOURCES_UNSUBSCRIBE,
                method_fn(move |params, _cx| {
                    let subs = subs.clone();
                    async move {
                        let args: UnsubscribeParams = params_from(params)?;
                        if !subs.lock().await.remove(&args.uri) {
                            return Err(JsonRpcError::invalid_params(
                                format!("not subscribed: {}", args.uri),
                                None,
                            ));
                        }
                        tracing::debug!(uri = %args.uri, "resource unsubscribed");
                        Ok(json!({}))
                    }
                }),
            );
        }
    }

    /// Expose a prompt provider through prompts/list and prompts/get.
    pub fn attach_prompts(&mut self, provider: Arc<dyn PromptProvider>) {
        write_caps(&self.capabilities).prompts = Some(PromptCapability { list_changed: true });

        let list_provider = provider.clone();
        self.register_method(
            METHOD_PROMPTS_LIST,
            method_fn(move |params, _cx| {
                let provider = list_provider.clone();
                async move {
                    let args: ListPromptsParams = params_or_default(params)?;
                    let result = provider.list(args.cursor).await?;
                    to_result(&result)
                }
            }),
        );

        self.register_method(
            METHOD_PROMPTS_GET,
            method_fn(move |params, _cx| {
                let provider = provider.clone();
                async move {
                    let args: GetPromptParams = params_from(params)?;
                    let result = provider.get(&args.name, args.arguments).await?;
                    to_result(&result)
                }
            }),
        );
    }

    /// Serve one connection over stdio.
    pub async fn run_stdio(self) -> Result<()> {
        tracing::info!("MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one connection: read newline-delimited requests until EOF,
    /// dispatching each concurrently. Transport faults end the connection
    /// and are reported to the caller; they are never disguised as
    /// JSON-RPC errors.
    pub async fn serve<R, W>(mut self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let outbound_rx = self
            .outbound_rx
            .take()
            .context("serve may only be called once")?;

        let shutdown = CancellationToken::new();
        let dispatcher = Arc::new(Dispatcher {
            handlers: std::mem::take(&mut self.handlers),
            session: self.session.clone(),
            inflight: self.inflight.clone(),
            outbound: self.outbound_tx.clone(),
            shutdown: shutdown.clone(),
        });

        let writer_task = tokio::spawn(write_loop(writer, outbound_rx, shutdown.clone()));

        let mut frames = FramedRead::new(reader, LinesCodec::new());
        let read_result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                frame = frames.next() => match frame {
                    None => break Ok(()),
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        tokio::spawn(dispatcher.clone().handle_line(line));
                    }
                    Some(Err(err)) => {
                        break Err(anyhow::Error::new(err).context("transport read failed"));
                    }
                },
            }
        };

        // Connection-loss semantics: close the session, cancel in-flight
        // handlers, let the writer drain what is already queued.
        self.session.write().await.close();
        shutdown.cancel();

        let write_result = writer_task
            .await
            .context("writer task aborted")?
            .context("transport write failed");

        read_result.and(write_result)
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(line) => {
                    let write = async {
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await
                    };
                    if let Err(err) = write.await {
                        shutdown.cancel();
                        return Err(err.into());
                    }
                }
                None => return Ok(()),
            },
            _ = shutdown.cancelled() => return Ok(()),
        }
    }
}

struct Dispatcher {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
    session: Arc<RwLock<CapabilitySession>>,
    inflight: Arc<Mutex<HashMap<String, CancellationToken>>>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    async fn handle_line(self: Arc<Self>, line: String) {
        // Parse: not JSON at all is a parse error, answered with a null
        // id since none could be read.
        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                self.respond(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error("Parse error", Some(json!(err.to_string()))),
                ));
                return;
            }
        };

        // Well-formed JSON that is not a valid envelope. Echo the id when
        // one is salvageable.
        let fallback_id = envelope_id(&value);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(err) => {
                self.respond(JsonRpcResponse::error(
                    fallback_id,
                    JsonRpcError::invalid_request(err.to_string(), None),
                ));
                return;
            }
        };
        if let Err(err) = request.validate() {
            self.respond(JsonRpcResponse::error(fallback_id, err));
            return;
        }

        let method = request.method.clone();
        tracing::debug!(method = %method, "handling request");

        // Session gate: handshake ordering is enforced before resolution.
        let gate = self.session.read().await.gate(&method);
        if let Err(err) = gate {
            match request.id {
                Some(id) => self.respond(JsonRpcResponse::error(id, err)),
                None => tracing::warn!(method = %method, "dropping premature notification"),
            }
            return;
        }

        // Resolve: exact, case-sensitive match.
        let handler = match self.handlers.get(&method) {
            Some(handler) => handler.clone(),
            None => {
                match request.id {
                    Some(id) => self.respond(JsonRpcResponse::error(
                        id,
                        JsonRpcError::method_not_found(
                            format!("Method '{method}' not found"),
                            None,
                        ),
                    )),
                    None => tracing::debug!(method = %method, "no handler for notification"),
                }
                return;
            }
        };

        // Invoke in a child task so a panicking handler becomes a
        // well-formed Internal error instead of a lost response.
        let cancel = self.shutdown.child_token();
        let key = request.id.as_ref().map(id_key);
        if let Some(key) = &key {
            self.inflight
                .lock()
                .await
                .insert(key.clone(), cancel.clone());
        }

        let cx = RequestContext {
            cancel: cancel.clone(),
        };
        let params = request.params;
        let invocation = tokio::spawn(async move { handler.handle(params, cx).await });
        let outcome = invocation.await;

        if let Some(key) = &key {
            self.inflight.lock().await.remove(key);
        }

        let payload = match outcome {
            Ok(Ok(result)) => ResponsePayload::Result(result),
            Ok(Err(err)) => ResponsePayload::Error(err),
            Err(join_err) => ResponsePayload::Error(JsonRpcError::internal_error(
                "handler aborted",
                Some(json!(join_err.to_string())),
            )),
        };

        match request.id {
            None => {
                if let ResponsePayload::Error(err) = payload {
                    tracing::warn!(method = %method, %err, "notification handler failed");
                }
            }
            Some(id) => {
                if cancel.is_cancelled() {
                    tracing::debug!(method = %method, "response suppressed after cancellation");
                    return;
                }
                self.respond(JsonRpcResponse {
                    jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
                    id,
                    payload,
                });
            }
        }
    }

    fn respond(&self, response: JsonRpcResponse) {
        match serde_json::to_string(&response) {
            Ok(line) => {
                if self.outbound.send(line).is_err() {
                    tracing::debug!("response dropped, connection closed");
                }
            }
            Err(err) => tracing::error!(%err, "failed to encode response"),
        }
    }
}

fn read_caps(caps: &std::sync::RwLock<ServerCapabilities>) -> ServerCapabilities {
    caps.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

fn write_caps(
    caps: &std::sync::RwLock<ServerCapabilities>,
) -> std::sync::RwLockWriteGuard<'_, ServerCapabilities> {
    caps.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn envelope_id(value: &Value) -> Value {
    match value.get("id") {
        Some(id) if id.is_string() || id.is_number() => id.clone(),
        _ => Value::Null,
    }
}

fn id_key(id: &Value) -> String {
    id.to_string()
}

fn params_from<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|err| JsonRpcError::invalid_params(err.to_string(), None))
}

fn params_or_default<T: DeserializeOwned + Default>(
    params: Option<Value>,
) -> Result<T, JsonRpcError> {
    match params {
        None => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|err| JsonRpcError::invalid_params(err.to_string(), None)),
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|err| JsonRpcError::internal_error("failed to encode result", Some(json!(err.to_string()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::prompts::{
        GetPromptResult, ListPromptsResult, Prompt, PromptMessage, Role,
    };
    use crate::messages::resources::{ListResourcesResult, Resource, ResourceContents};
    use crate::messages::tools::{CallToolResult, Tool};
    use crate::messages::Content;
    use crate::tools::{json_schema_object, ToolHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::{timeout, Duration};

    struct TestClient {
        read: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
        write: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    }

    impl TestClient {
        async fn send_raw(&mut self, line: &str) {
            self.write.write_all(line.as_bytes()).await.unwrap();
            self.write.write_all(b"\n").await.unwrap();
        }

        async fn send(&mut self, value: Value) {
            self.send_raw(&value.to_string()).await;
        }

        async fn recv(&mut self) -> Value {
            let mut line = String::new();
            let n = self.read.read_line(&mut line).await.unwrap();
            assert!(n > 0, "connection closed while awaiting a message");
            serde_json::from_str(&line).unwrap()
        }

        async fn expect_silence(&mut self, ms: u64) {
            let mut line = String::new();
            let read = timeout(Duration::from_millis(ms), self.read.read_line(&mut line)).await;
            assert!(read.is_err(), "unexpected message: {line}");
        }

        async fn handshake(&mut self) {
            self.send(json!({
                "jsonrpc": "2.0",
                "id": "init",
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.0.1"}
                }
            }))
            .await;
            let reply = self.recv().await;
            assert!(reply.get("result").is_some(), "initialize failed: {reply}");
            self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .await;
        }
    }

    fn spawn_server(server: McpServer) -> (TestClient, tokio::task::JoinHandle<Result<()>>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let handle = tokio::spawn(server.serve(server_read, server_write));
        let (client_read, client_write) = tokio::io::split(client_io);
        (
            TestClient {
                read: BufReader::new(client_read),
                write: client_write,
            },
            handle,
        )
    }

    fn test_server() -> McpServer {
        McpServer::new(Implementation {
            name: "test-server".to_string(),
            version: "0.0.0".to_string(),
        })
    }

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> Tool {
            Tool {
                name: "echo".to_string(),
                description: "echoes its arguments".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
            Ok(CallToolResult::text(arguments.to_string()))
        }
    }

    struct FailingTool {
        structured: bool,
    }

    #[async_trait::async_trait]
    impl ToolHandler for FailingTool {
        fn definition(&self) -> Tool {
            Tool {
                name: "broken".to_string(),
                description: "always fails".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<CallToolResult> {
            if self.structured {
                Err(JsonRpcError::invalid_params("bad tool arguments", None).into())
            } else {
                anyhow::bail!("backend exploded")
            }
        }
    }

    struct StubResources;

    #[async_trait::async_trait]
    impl ResourceProvider for StubResources {
        fn supports_subscribe(&self) -> bool {
            true
        }

        async fn list(
            &self,
            _cursor: Option<String>,
        ) -> Result<ListResourcesResult, JsonRpcError> {
            Ok(ListResourcesResult {
                resources: vec![Resource {
                    uri: "store://catalog".to_string(),
                    name: "catalog".to_string(),
                    description: None,
                    mime_type: Some("application/json".to_string()),
                }],
                next_cursor: None,
            })
        }

        async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>, JsonRpcError> {
            if uri != "store://catalog" {
                return Err(JsonRpcError::invalid_params(
                    format!("unknown resource: {uri}"),
                    None,
                ));
            }
            Ok(vec![ResourceContents::text(
                uri,
                Some("application/json"),
                "[]",
            )])
        }
    }

    struct StubPrompts;

    #[async_trait::async_trait]
    impl PromptProvider for StubPrompts {
        async fn list(&self, _cursor: Option<String>) -> Result<ListPromptsResult, JsonRpcError> {
            Ok(ListPromptsResult {
                prompts: vec![Prompt {
                    name: "greet".to_string(),
                    description: None,
                    arguments: vec![],
                }],
                next_cursor: None,
            })
        }

        async fn get(
            &self,
            name: &str,
            _arguments: Option<std::collections::HashMap<String, String>>,
        ) -> Result<GetPromptResult, JsonRpcError> {
            if name != "greet" {
                return Err(JsonRpcError::invalid_params(
                    format!("unknown prompt: {name}"),
                    None,
                ));
            }
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: Content::text("hello"),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let (mut client, _handle) = spawn_server(test_server());
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], json!(1));
        assert_eq!(reply["result"], json!({}));
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_yields_method_not_found() {
        let (mut client, _handle) = spawn_server(test_server());
        client.handshake().await;

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "nonexistent"}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], json!(2));
        assert_eq!(reply["error"]["code"], json!(crate::protocol::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_parse_error_before_any_handler_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut server = test_server();
        let counter = calls.clone();
        server.register_method(
            "probe",
            method_fn(move |_params, _cx| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({}))
                }
            }),
        );

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client.send_raw("{invalid json").await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], json!(null));
        assert_eq!(reply["error"]["code"], json!(crate::protocol::PARSE_ERROR));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_method_yields_invalid_request() {
        let (mut client, _handle) = spawn_server(test_server());
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 9, "params": {}}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], json!(9));
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_scalar_params_yield_invalid_request() {
        let (mut client, _handle) = spawn_server(test_server());
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping", "params": 5}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_notifications_never_get_a_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut server = test_server();
        let counter = calls.clone();
        server.register_method(
            "jobs/poke",
            method_fn(move |_params, _cx| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"poked": true}))
                }
            }),
        );

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "method": "jobs/poke"}))
            .await;
        client.expect_silence(200).await;

        // The handler ran; the connection is still healthy.
        client
            .send(json!({"jsonrpc": "2.0", "id": 4, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], json!(4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_requests_rejected_until_handshake_completes() {
        let (mut client, _handle) = spawn_server(test_server());

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INVALID_REQUEST));

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "late", "version": "1"}
                }
            }))
            .await;
        let reply = client.recv().await;
        assert!(reply.get("result").is_some());

        // Initialized notification still pending: requests stay rejected.
        client
            .send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INVALID_REQUEST));

        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        client
            .send(json!({"jsonrpc": "2.0", "id": 4, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["result"], json!({}));
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut server = test_server();
        server.register_method(
            "answer",
            method_fn(|_params, _cx| async { Ok(json!(1)) }),
        );
        server.register_method(
            "answer",
            method_fn(|_params, _cx| async { Ok(json!(2)) }),
        );

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "answer"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["result"], json!(2));
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_internal_error() {
        let mut server = test_server();
        server.register_method(
            "explode",
            method_fn(|_params, _cx| async { panic!("boom") }),
        );

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "explode"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INTERNAL_ERROR));

        // The process and the connection survive.
        client
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}))
            .await;
        assert_eq!(client.recv().await["result"], json!({}));
    }

    #[tokio::test]
    async fn test_cancellation_suppresses_response() {
        let mut server = test_server();
        server.register_method(
            "slow",
            method_fn(|_params, _cx| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!("too late"))
            }),
        );

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 7, "method": "slow"}))
            .await;
        // Let the request start before abandoning it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        client
            .send(json!({
                "jsonrpc": "2.0",
                "method": "notifications/cancelled",
                "params": {"requestId": 7, "reason": "user gave up"}
            }))
            .await;

        client.expect_silence(500).await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], json!(8));
    }

    #[tokio::test]
    async fn test_initialize_reports_capabilities_and_version() {
        let mut server = test_server().with_instructions("storefront tools");
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        server.attach_tools(Arc::new(registry));
        server.attach_resources(Arc::new(StubResources));
        server.attach_prompts(Arc::new(StubPrompts));

        let (mut client, _handle) = spawn_server(server);
        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "1999-01-01",
                    "capabilities": {},
                    "clientInfo": {"name": "old-client", "version": "0"}
                }
            }))
            .await;
        let reply = client.recv().await;
        let result = &reply["result"];
        // Mismatched version: the server answers with what it supports.
        assert_eq!(result["protocolVersion"], json!("2024-11-05"));
        assert_eq!(result["capabilities"]["tools"]["listChanged"], json!(true));
        assert_eq!(result["capabilities"]["resources"]["subscribe"], json!(true));
        assert!(result["capabilities"]["prompts"].is_object());
        assert!(result["capabilities"]["logging"].is_object());
        assert_eq!(result["serverInfo"]["name"], json!("test-server"));
        assert_eq!(result["instructions"], json!("storefront tools"));
    }

    #[tokio::test]
    async fn test_tools_list_and_call() {
        let mut server = test_server();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        server.attach_tools(Arc::new(registry));

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["result"]["tools"][0]["name"], json!("echo"));
        assert!(reply["result"].get("nextCursor").is_none());

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "echo", "arguments": {"k": "v"}}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(
            reply["result"]["content"][0]["text"],
            json!(r#"{"k":"v"}"#)
        );
    }

    #[tokio::test]
    async fn test_cursor_forwarded_to_handler_unmodified() {
        let seen = Arc::new(std::sync::Mutex::new(None::<String>));
        let mut server = test_server();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        server.attach_tools(Arc::new(registry));

        // Override the built-in tools/list (last registration wins) to
        // observe exactly what the dispatcher forwards.
        let observed = seen.clone();
        server.register_method(
            METHOD_TOOLS_LIST,
            method_fn(move |params, _cx| {
                let observed = observed.clone();
                async move {
                    let args: ListToolsParams = params_or_default(params)?;
                    *observed.lock().unwrap() = args.cursor;
                    to_result(&ListToolsResult {
                        tools: vec![],
                        next_cursor: None,
                    })
                }
            }),
        );

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/list",
                "params": {"cursor": "abc"}
            }))
            .await;
        client.recv().await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_tool_faults_map_to_error_taxonomy() {
        let mut server = test_server();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool { structured: false }));
        server.attach_tools(Arc::new(registry));

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "broken"}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INTERNAL_ERROR));
        // The underlying fault is preserved for diagnosis.
        assert!(reply["error"]["data"]
            .as_str()
            .unwrap()
            .contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_structured_tool_error_propagates_verbatim() {
        let mut server = test_server();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool { structured: true }));
        server.attach_tools(Arc::new(registry));

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "broken"}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INVALID_PARAMS));
        assert_eq!(reply["error"]["message"], json!("bad tool arguments"));
    }

    #[tokio::test]
    async fn test_resource_methods_and_subscriptions() {
        let mut server = test_server();
        server.attach_resources(Arc::new(StubResources));

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(
            reply["result"]["resources"][0]["uri"],
            json!("store://catalog")
        );

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "resources/read",
                "params": {"uri": "store://catalog"}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["result"]["contents"][0]["text"], json!("[]"));

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "resources/subscribe",
                "params": {"uri": "store://catalog"}
            }))
            .await;
        assert!(client.recv().await.get("result").is_some());

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "resources/unsubscribe",
                "params": {"uri": "store://catalog"}
            }))
            .await;
        assert!(client.recv().await.get("result").is_some());

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "resources/unsubscribe",
                "params": {"uri": "store://catalog"}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], json!(crate::protocol::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_prompt_methods() {
        let mut server = test_server();
        server.attach_prompts(Arc::new(StubPrompts));

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["result"]["prompts"][0]["name"], json!("greet"));

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "prompts/get",
                "params": {"name": "greet"}
            }))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["result"]["messages"][0]["role"], json!("user"));
    }

    #[tokio::test]
    async fn test_log_messages_honor_set_level() {
        let server = test_server();
        let notifier = server.notifications();

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        client
            .send(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "logging/setLevel",
                "params": {"level": "error"}
            }))
            .await;
        assert!(client.recv().await.get("result").is_some());

        notifier
            .message(LoggingLevel::Info, Some("store"), json!("noise"))
            .await;
        client.expect_silence(200).await;

        notifier
            .message(LoggingLevel::Critical, Some("store"), json!("backend down"))
            .await;
        let note = client.recv().await;
        assert_eq!(note["method"], json!("notifications/message"));
        assert_eq!(note["params"]["level"], json!("critical"));
        assert!(note.get("id").is_none());
    }

    #[tokio::test]
    async fn test_notifications_preserve_send_order() {
        let server = test_server();
        let notifier = server.notifications();

        let (mut client, _handle) = spawn_server(server);
        client.handshake().await;

        notifier.tools_list_changed();
        notifier.resources_list_changed();
        notifier.resource_updated("store://catalog");
        notifier.progress(json!("sync-1"), 0.5, Some(1.0));

        assert_eq!(
            client.recv().await["method"],
            json!("notifications/tools/listChanged")
        );
        assert_eq!(
            client.recv().await["method"],
            json!("notifications/resources/listChanged")
        );
        let updated = client.recv().await;
        assert_eq!(updated["method"], json!("notifications/resources/updated"));
        assert_eq!(updated["params"]["uri"], json!("store://catalog"));
        let progress = client.recv().await;
        assert_eq!(progress["method"], json!("notifications/progress"));
        assert_eq!(progress["params"]["progressToken"], json!("sync-1"));
        assert_eq!(progress["params"]["progress"], json!(0.5));
    }

    #[tokio::test]
    async fn test_serve_ends_cleanly_on_eof() {
        let (client, handle) = spawn_server(test_server());
        drop(client);
        handle.await.unwrap().unwrap();
    }
}
