//! Request dispatch
//!
//! One entry point for both transports: a decoded request goes in, exactly
//! one response comes out (none for notifications). Each tool call walks the
//! same path - exposure check, argument validation, handler invocation under
//! a time budget and the global concurrency ceiling - and every failure mode
//! normalizes into the wire error taxonomy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{OverflowPolicy, ServerConfig};
use crate::error::{ErrorRecord, HostError, Result};
use crate::filter::ExposedView;
use crate::observe::{CallObserver, CallOutcome, NoopObserver};
use crate::protocol::{
    methods, InitializeResult, McpRequest, McpResponse, ToolCallResult, ToolDefinition,
};
use crate::registry::ToolRegistry;

/// Per-invocation state, owned by the dispatcher for one call
#[derive(Debug)]
struct CallContext {
    request_id: Option<Value>,
    tool: String,
    started: Instant,
    timeout: Duration,
}

/// Routes decoded protocol requests to tool handlers
pub struct Dispatcher {
    view: Arc<ExposedView>,
    server_name: String,
    server_version: String,
    call_timeout: Duration,
    overflow: OverflowPolicy,
    /// In-flight slots; the permit travels with the handler task and is
    /// released exactly once, when the handler actually returns
    running: Arc<Semaphore>,
    /// Waiting slots under the queue policy
    pending: Arc<Semaphore>,
    observer: Arc<dyn CallObserver>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("view", &self.view)
            .field("server_name", &self.server_name)
            .field("server_version", &self.server_version)
            .field("call_timeout", &self.call_timeout)
            .field("overflow", &self.overflow)
            .field("running", &self.running)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Build a dispatcher over a sealed registry
    ///
    /// Fails with a fatal configuration error if the bundle is inconsistent
    /// or the registry was not sealed.
    pub fn new(registry: &ToolRegistry, config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        if !registry.is_sealed() {
            return Err(HostError::Config(
                "registry must be sealed before serving".into(),
            ));
        }

        let view = ExposedView::new(registry, &config.filter);
        tracing::info!(
            registered = registry.len(),
            exposed = view.len(),
            "exposed view computed"
        );

        Ok(Self {
            view: Arc::new(view),
            server_name: config.server_name.clone(),
            server_version: config.server_version.clone(),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            overflow: config.overflow,
            running: Arc::new(Semaphore::new(config.max_concurrency)),
            pending: Arc::new(Semaphore::new(config.queue_depth)),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Attach a call observer
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The exposed view this dispatcher serves
    pub fn view(&self) -> &ExposedView {
        &self.view
    }

    /// Handle one decoded request; `None` means notification, no response
    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::for_server(&self.server_name, &self.server_version);
                Some(McpResponse::success(request.id, json!(result)))
            }
            methods::INITIALIZED => None,
            methods::LIST_TOOLS => {
                let tools = self.tool_definitions();
                Some(McpResponse::success(request.id, json!({ "tools": tools })))
            }
            methods::CALL_TOOL => Some(self.call_tool(request.id, &request.params).await),
            methods::PING => Some(McpResponse::success(request.id, self.liveness())),
            other => {
                let err = HostError::MethodNotFound(other.to_string());
                Some(McpResponse::from_record(ErrorRecord::from_error(
                    &err,
                    None,
                    request.id.as_ref(),
                )))
            }
        }
    }

    /// Exposed tool descriptors for `tools/list`
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.view
            .list()
            .map(|tool| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.schema.to_value(),
            })
            .collect()
    }

    /// Liveness answer: timestamp plus server identity, nothing else
    pub fn liveness(&self) -> Value {
        json!({
            "status": "ok",
            "server": self.server_name,
            "version": self.server_version,
            "time": Utc::now().to_rfc3339(),
        })
    }

    /// Dispatch one `tools/call` request through the call state machine
    async fn call_tool(&self, id: Option<Value>, params: &Value) -> McpResponse {
        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => {
                let err = HostError::InvalidInput("\"name\": required property is missing".into());
                return McpResponse::from_record(ErrorRecord::from_error(&err, None, id.as_ref()));
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        // Received -> Filtered: unregistered and filtered-out are the same
        // answer, so the registry's contents never leak
        let descriptor = match self.view.get(name) {
            Some(descriptor) => Arc::clone(descriptor),
            None => {
                let err = HostError::MethodNotFound(format!("Unknown tool: {name}"));
                return McpResponse::from_record(ErrorRecord::from_error(
                    &err,
                    Some(name),
                    id.as_ref(),
                ));
            }
        };

        // Filtered -> Validated: the handler never observes malformed input
        if let Err(err) = descriptor.schema.validate(&arguments) {
            return McpResponse::from_record(ErrorRecord::from_error(&err, Some(name), id.as_ref()));
        }

        // Validated -> Invoking: admission against the concurrency ceiling
        let permit = match self.admit().await {
            Ok(permit) => permit,
            Err(err) => {
                return McpResponse::from_record(ErrorRecord::from_error(&err, Some(name), id.as_ref()))
            }
        };

        let ctx = CallContext {
            request_id: id,
            tool: name.to_string(),
            started: Instant::now(),
            timeout: self.call_timeout,
        };
        self.observer.on_call_start(&ctx.tool);

        let handler = Arc::clone(&descriptor.handler);
        let task = tokio::task::spawn_blocking(move || {
            let result = handler(&arguments);
            drop(permit);
            result
        });

        let (outcome, response) = match tokio::time::timeout(ctx.timeout, task).await {
            // Invoking -> Completed
            Ok(Ok(Ok(value))) => (
                CallOutcome::Completed,
                McpResponse::success(ctx.request_id.clone(), json!(ToolCallResult::json(&value))),
            ),
            // Invoking -> Failed: handler returned an error
            Ok(Ok(Err(err))) => {
                let err = match err {
                    input @ HostError::InvalidInput(_) => input,
                    other => HostError::Internal(format!("tool '{}' failed: {other}", ctx.tool)),
                };
                (
                    CallOutcome::Failed(err.kind()),
                    McpResponse::from_record(ErrorRecord::from_error(
                        &err,
                        Some(&ctx.tool),
                        ctx.request_id.as_ref(),
                    )),
                )
            }
            // Invoking -> Failed: handler panicked; recover, never crash
            Ok(Err(join_err)) => {
                tracing::error!(tool = %ctx.tool, error = %join_err, "tool handler panicked");
                let err = HostError::Internal(format!("tool '{}' failed unexpectedly", ctx.tool));
                (
                    CallOutcome::Failed(err.kind()),
                    McpResponse::from_record(ErrorRecord::from_error(
                        &err,
                        Some(&ctx.tool),
                        ctx.request_id.as_ref(),
                    )),
                )
            }
            // Invoking -> TimedOut: the late result is discarded; the slot is
            // released when the handler returns, not here
            Err(_) => {
                let err = HostError::Timeout {
                    tool: ctx.tool.clone(),
                    timeout_ms: ctx.timeout.as_millis() as u64,
                };
                (
                    CallOutcome::TimedOut,
                    McpResponse::from_record(ErrorRecord::from_error(
                        &err,
                        Some(&ctx.tool),
                        ctx.request_id.as_ref(),
                    )),
                )
            }
        };

        self.observer
            .on_call_end(&ctx.tool, outcome, ctx.started.elapsed());
        response
    }

    /// Acquire an in-flight slot according to the overflow policy
    async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        match self.overflow {
            OverflowPolicy::Reject => Arc::clone(&self.running)
                .try_acquire_owned()
                .map_err(|_| HostError::ServerBusy),
            OverflowPolicy::Queue => {
                // fast path: a free slot needs no queue position
                if let Ok(permit) = Arc::clone(&self.running).try_acquire_owned() {
                    return Ok(permit);
                }
                // bounded queue: hold a waiting slot while parked
                let waiting = Arc::clone(&self.pending)
                    .try_acquire_owned()
                    .map_err(|_| HostError::ServerBusy)?;
                let permit = Arc::clone(&self.running)
                    .acquire_owned()
                    .await
                    .map_err(|_| HostError::Internal("semaphore closed".into()))?;
                drop(waiting);
                Ok(permit)
            }
        }
    }
}
