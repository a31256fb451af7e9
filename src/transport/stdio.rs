//! Line-oriented stdio transport
//!
//! Newline-delimited JSON-RPC over stdin/stdout. Each request runs as its
//! own task, so responses can leave in completion order; a single writer
//! task serializes stdout access. All logging goes to stderr - stdout
//! belongs to the protocol.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::protocol::{McpRequest, McpResponse};

/// MCP server reading requests from stdin and writing responses to stdout
pub struct StdioServer {
    dispatcher: Arc<Dispatcher>,
}

impl StdioServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run until stdin reaches EOF
    pub async fn run(self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        let (tx, mut rx) = mpsc::channel::<McpResponse>(64);

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(response) = rx.recv().await {
                match serde_json::to_string(&response) {
                    Ok(line) => {
                        if stdout.write_all(line.as_bytes()).await.is_err()
                            || stdout.write_all(b"\n").await.is_err()
                            || stdout.flush().await.is_err()
                        {
                            tracing::error!("stdout closed, stopping writer");
                            break;
                        }
                    }
                    Err(e) => tracing::error!("failed to serialize response: {}", e),
                }
            }
        });

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<McpRequest>(trimmed) {
                Ok(request) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = dispatcher.handle(request).await {
                            let _ = tx.send(response).await;
                        }
                    });
                }
                Err(e) => {
                    let response =
                        McpResponse::error(None, -32700, format!("Parse error: {}", e));
                    let _ = tx.send(response).await;
                }
            }
        }

        drop(tx);
        let _ = writer.await;
        Ok(())
    }
}
