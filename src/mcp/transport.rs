//! Stdio and HTTP bindings for [`McpServer`].

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::post,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
// self
use crate::{_prelude::*, mcp::McpServer};

/// Serves line-delimited JSON-RPC over stdin/stdout until EOF or Ctrl-C.
pub async fn serve_stdio(server: Arc<McpServer>) -> std::io::Result<()> {
	let stdin = tokio::io::BufReader::new(tokio::io::stdin());
	let stdout = tokio::io::stdout();

	tokio::select! {
		result = serve_lines(&server, stdin, stdout) => result,
		_ = tokio::signal::ctrl_c() => {
			#[cfg(feature = "tracing")]
			tracing::info!("Received shutdown signal.");

			Ok(())
		},
	}
}

/// Answers each non-empty line of `input` with one line on `output`; notifications get none.
pub async fn serve_lines<R, W>(server: &McpServer, input: R, mut output: W) -> std::io::Result<()>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut lines = input.lines();

	while let Some(line) = lines.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}

		let Some(response) = server.handle_raw(&line).await else {
			continue;
		};
		let mut encoded = serde_json::to_vec(&response).map_err(std::io::Error::other)?;

		encoded.push(b'\n');
		output.write_all(&encoded).await?;
		output.flush().await?;
	}

	Ok(())
}

/// Router accepting JSON-RPC POSTs at `path`.
pub fn router(server: Arc<McpServer>, path: &str) -> Router {
	Router::new().route(path, post(handle_post)).with_state(server)
}

/// Serves the HTTP binding on `address` until Ctrl-C.
pub async fn serve_http(server: Arc<McpServer>, address: &str, path: &str) -> std::io::Result<()> {
	let listener = tokio::net::TcpListener::bind(address).await?;

	#[cfg(feature = "tracing")]
	tracing::info!(address, path, "Listening for MCP messages.");

	axum::serve(listener, router(server, path))
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await
}

async fn handle_post(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
	let raw = String::from_utf8_lossy(&body);

	match server.handle_raw(&raw).await {
		Some(response) => Json(response).into_response(),
		None => StatusCode::ACCEPTED.into_response(),
	}
}
