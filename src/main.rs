//! `search-broker` binary: loads configuration, warms the token cache, and serves MCP over the
//! configured transport.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
// self
use search_broker::{
	auth::{CredentialStore, ReqwestAuthClient, TokenCache},
	config::{Config, Transport},
	http::ReqwestHttpClient,
	mcp::{McpServer, transport},
	retry::RetryPolicy,
	search::ReqwestSearchProxy,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let dotenv = dotenvy::dotenv();

	// Logs go to stderr; stdout belongs to the stdio transport.
	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("search_broker=info")),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	if let Ok(path) = dotenv {
		tracing::debug!(path = %path.display(), "Loaded environment file.");
	}

	let config = Config::from_env()?;

	tracing::info!(
		version = env!("CARGO_PKG_VERSION"),
		transport = ?config.transport,
		"Starting search broker."
	);

	let http = ReqwestHttpClient::with_timeout(config.http_timeout.unsigned_abs())?;
	let retry = RetryPolicy::new().with_max_attempts(config.retry_max_attempts);
	let store =
		CredentialStore::new(config.credentials.clone(), ReqwestAuthClient::new(http.clone()));
	let tokens = Arc::new(
		TokenCache::new(Arc::new(store))
			.with_retry_policy(retry.clone())
			.with_refresh_margin(config.token_refresh_margin),
	);

	match tokens.get_token().await {
		Ok(token) => tracing::info!(expires_at = %token.expires_at, "Auth service verified."),
		Err(e) => tracing::error!(reason = %e.reason(), error = %e, "Auth service check failed."),
	}

	let proxy =
		ReqwestSearchProxy::new(config.search_endpoint(), tokens, http).with_retry_policy(retry);
	let server = Arc::new(McpServer::new(Arc::new(proxy)));

	match config.transport {
		Transport::Stdio => transport::serve_stdio(server).await?,
		Transport::Http =>
			transport::serve_http(server, &config.bind_address(), &config.message_path).await?,
	}

	tracing::info!("Search broker stopped.");

	Ok(())
}
