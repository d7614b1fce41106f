//! Minimal MCP (JSON-RPC 2.0) surface exposing the search tools and documentation resources.
//!
//! [`McpServer`] is transport-agnostic: it turns one decoded message into at most one response.
//! The stdio and HTTP bindings live in [`transport`] behind the `server` feature.

pub mod resources;
pub mod tools;
#[cfg(feature = "server")] pub mod transport;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	http::{ProxyHttpClient, TransportErrorMapper},
	search::{SearchMode, SearchProxy, SearchRequest, SearchResponse},
};

/// MCP protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;
/// The message is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i32 = -32603;

/// Boxed future returned by [`SearchBackend::search`].
pub type SearchFuture<'a> = Pin<Box<dyn Future<Output = Result<SearchResponse>> + 'a + Send>>;

/// Anything able to answer a validated search for a mode.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	/// Runs `request` in `mode`.
	fn search<'a>(&'a self, request: &'a SearchRequest, mode: SearchMode) -> SearchFuture<'a>;
}
impl<C, M> SearchBackend for SearchProxy<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn search<'a>(&'a self, request: &'a SearchRequest, mode: SearchMode) -> SearchFuture<'a> {
		Box::pin(SearchProxy::search(self, request, mode))
	}
}

/// Incoming JSON-RPC message; requests carry an `id`, notifications do not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	/// Protocol tag (`2.0`).
	#[serde(default)]
	pub jsonrpc: Option<String>,
	/// Request id; absent for notifications.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<JsonValue>,
	/// Method name.
	pub method: String,
	/// Method parameters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<JsonValue>,
}

/// Outgoing JSON-RPC response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
	/// Protocol tag (`2.0`).
	pub jsonrpc: String,
	/// Id of the request being answered (`null` when it could not be read).
	pub id: JsonValue,
	/// Success payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<JsonValue>,
	/// Failure payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<JsonRpcError>,
}
impl JsonRpcResponse {
	/// Successful response.
	pub fn success(id: JsonValue, result: JsonValue) -> Self {
		Self { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
	}

	/// Error response.
	pub fn failure(id: JsonValue, error: JsonRpcError) -> Self {
		Self { jsonrpc: "2.0".into(), id, result: None, error: Some(error) }
	}
}

/// JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
	/// Error code.
	pub code: i32,
	/// Human-readable message.
	pub message: String,
	/// Optional structured detail.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<JsonValue>,
}
impl JsonRpcError {
	/// Error without structured detail.
	pub fn new(code: i32, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), data: None }
	}
}

/// Dispatches JSON-RPC messages to the tool and resource handlers.
pub struct McpServer {
	backend: Arc<dyn SearchBackend>,
	initialized: AtomicBool,
}
impl McpServer {
	/// Server name announced during `initialize`.
	pub const NAME: &'static str = "search-broker";

	/// Creates a server answering tool calls through `backend`.
	pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
		Self { backend, initialized: AtomicBool::new(false) }
	}

	/// Returns true once the client sent `notifications/initialized`.
	pub fn is_initialized(&self) -> bool {
		self.initialized.load(Ordering::SeqCst)
	}

	/// Decodes and dispatches one raw message. Returns `None` for notifications.
	pub async fn handle_raw(&self, raw: &str) -> Option<JsonRpcResponse> {
		let value = match serde_json::from_str::<JsonValue>(raw) {
			Ok(value) => value,
			Err(e) => {
				return Some(JsonRpcResponse::failure(
					JsonValue::Null,
					JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
				));
			},
		};
		let id = value.get("id").cloned().unwrap_or(JsonValue::Null);

		match serde_json::from_value::<JsonRpcRequest>(value) {
			Ok(request) => self.handle(request).await,
			Err(e) => Some(JsonRpcResponse::failure(
				id,
				JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
			)),
		}
	}

	/// Dispatches one decoded message. Returns `None` for notifications.
	pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
		let JsonRpcRequest { id, method, params, .. } = request;
		let outcome = match method.as_str() {
			"initialize" => Ok(self.initialize()),
			"notifications/initialized" | "initialized" => {
				self.initialized.store(true, Ordering::SeqCst);

				return None;
			},
			"ping" => Ok(serde_json::json!({})),
			"tools/list" => Ok(serde_json::json!({ "tools": tools::definitions() })),
			"tools/call" => self.call_tool(params).await,
			"resources/list" => Ok(serde_json::json!({ "resources": resources::list() })),
			"resources/read" => read_resource(params),
			_ if id.is_none() => return None,
			other => Err(JsonRpcError::new(METHOD_NOT_FOUND, format!("Unknown method: {other}"))),
		};
		// Notifications never get a reply, even when they name a request method.
		let id = id?;

		Some(match outcome {
			Ok(result) => JsonRpcResponse::success(id, result),
			Err(error) => JsonRpcResponse::failure(id, error),
		})
	}

	fn initialize(&self) -> JsonValue {
		serde_json::json!({
			"protocolVersion": PROTOCOL_VERSION,
			"capabilities": {
				"tools": { "listChanged": false },
				"resources": { "subscribe": false, "listChanged": false }
			},
			"serverInfo": { "name": Self::NAME, "version": env!("CARGO_PKG_VERSION") }
		})
	}

	async fn call_tool(&self, params: Option<JsonValue>) -> Result<JsonValue, JsonRpcError> {
		let params: ToolCallParams = parse_params(params)?;
		let Some(mode) = tools::mode_for(&params.name) else {
			return Err(JsonRpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", params.name)));
		};
		let arguments: tools::SearchArguments =
			serde_json::from_value(params.arguments.unwrap_or_else(|| serde_json::json!({})))
				.map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid arguments: {e}")))?;
		let result = match arguments.into_request(mode) {
			Ok(request) => self.backend.search(&request, mode).await,
			Err(e) => Err(e.into()),
		};
		let internal = |e: serde_json::Error| JsonRpcError::new(INTERNAL_ERROR, e.to_string());
		let payload = match result {
			Ok(response) => tools::ToolCallResult::success(&response).map_err(internal)?,
			Err(err) => tools::ToolCallResult::failure(&err),
		};

		serde_json::to_value(payload).map_err(internal)
	}
}
impl Debug for McpServer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("McpServer").field("initialized", &self.is_initialized()).finish()
	}
}

#[derive(Deserialize)]
struct ToolCallParams {
	name: String,
	#[serde(default)]
	arguments: Option<JsonValue>,
}

#[derive(Deserialize)]
struct ResourceReadParams {
	uri: String,
}

fn read_resource(params: Option<JsonValue>) -> Result<JsonValue, JsonRpcError> {
	let params: ResourceReadParams = parse_params(params)?;
	let contents = resources::read(&params.uri).ok_or_else(|| {
		JsonRpcError::new(INVALID_PARAMS, format!("Unknown resource: {}", params.uri))
	})?;

	Ok(serde_json::json!({ "contents": [contents] }))
}

fn parse_params<T>(params: Option<JsonValue>) -> Result<T, JsonRpcError>
where
	T: for<'de> Deserialize<'de>,
{
	let params = params.ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "Missing params"))?;

	serde_json::from_value(params)
		.map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))
}
