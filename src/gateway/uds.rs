// Strongbox — Unix Domain Socket Server
//
// Listens on a Unix domain socket for newline-delimited JSON-RPC 2.0
// requests. Each connection is handled in a spawned tokio task; each request
// runs on the blocking pool against a freshly opened `Vault`, and the engine
// serialises writers across them.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use crate::config::Settings;
use crate::error::StrongboxError;
use crate::store::IdentityUpdate;
use crate::vault::Vault;

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND,
};

/// Unix Domain Socket server for Strongbox.
pub struct UdsServer {
    settings: Arc<Settings>,
}

impl UdsServer {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Start the UDS server. This runs until the process is terminated.
    pub async fn run(&self) -> Result<(), StrongboxError> {
        let socket_path = &self.settings.socket_path;

        // Ensure the socket directory exists
        if let Some(parent) = socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove stale socket file if it exists
        if socket_path.exists() {
            tokio::fs::remove_file(socket_path).await?;
        }

        let listener = UnixListener::bind(socket_path)?;
        tracing::info!(socket = %socket_path.display(), "Strongbox UDS server listening");

        // Owner-only access to the socket
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(socket_path, perms)?;
        }

        loop {
            let (stream, _addr) = listener.accept().await?;
            let settings = Arc::clone(&self.settings);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, settings).await {
                    tracing::error!("Connection handler error: {}", e);
                }
            });
        }
    }
}

/// Handle a single client connection.
/// Reads newline-delimited JSON-RPC requests and writes responses.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    settings: Arc<Settings>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(cred) = stream.peer_cred() {
        tracing::debug!(uid = cred.uid(), pid = ?cred.pid(), "Client connected");
    }

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let settings = Arc::clone(&settings);
        let response = tokio::task::spawn_blocking(move || process_request(&line, &settings))
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Request task failed: {}", e);
                JsonRpcResponse::error(Value::Null, INTERNAL_ERROR, "internal error")
            });

        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    tracing::debug!("Client disconnected");
    Ok(())
}

/// Why a handler failed: bad parameters, or an error from the vault.
enum Failure {
    Params(String),
    App(StrongboxError),
}

impl From<StrongboxError> for Failure {
    fn from(e: StrongboxError) -> Self {
        Self::App(e)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Self::App(StrongboxError::Other(format!("response encoding failed: {}", e)))
    }
}

type HandlerResult = Result<Value, Failure>;

/// Parse and dispatch a single JSON-RPC request.
fn process_request(raw: &str, settings: &Settings) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let vault = match Vault::open(settings) {
        Ok(vault) => vault,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open database");
            return JsonRpcResponse::error(request.id, INTERNAL_ERROR, "internal error");
        }
    };

    let params = &request.params;
    let result = match request.method.as_str() {
        "health" => handle_health(&vault),
        "register" => handle_register(&vault, params),
        "login" => handle_login(&vault, params),
        "refresh" => handle_refresh(&vault, params),
        "logout" => handle_logout(&vault, params),
        "account.update" => handle_account_update(&vault, params),
        "user.list" => handle_user_list(&vault, params),
        "user.create" => handle_user_create(&vault, params),
        "user.update" => handle_user_update(&vault, params),
        "user.delete" => handle_user_delete(&vault, params),
        "data.get" => handle_data_get(&vault, params),
        "data.all" => handle_data_all(&vault, params),
        "data.set" => handle_data_set(&vault, params),
        "data.delete" => handle_data_delete(&vault, params),
        _ => {
            return JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            )
        }
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(Failure::Params(message)) => {
            JsonRpcResponse::error(request.id, INVALID_PARAMS, message)
        }
        Err(Failure::App(e)) => {
            if e.kind() == crate::error::ErrorKind::Internal {
                tracing::error!(method = %request.method, error = %e, "Request failed");
            } else {
                tracing::debug!(method = %request.method, error = %e, "Request refused");
            }
            JsonRpcResponse::from_error(request.id, &e)
        }
    }
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

fn handle_health(vault: &Vault<'_>) -> HandlerResult {
    to_value(vault.health()?)
}

fn handle_register(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let name = str_param(params, "name")?;
    let password = str_param(params, "password")?;
    to_value(vault.register(name, password)?)
}

fn handle_login(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let name = str_param(params, "name")?;
    let password = str_param(params, "password")?;
    to_value(vault.login(name, password)?)
}

fn handle_refresh(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let refresh_token = str_param(params, "refresh_token")?;
    to_value(vault.refresh(refresh_token)?)
}

fn handle_logout(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let refresh_token = str_param(params, "refresh_token")?;
    vault.logout(refresh_token)?;
    Ok(serde_json::json!({ "logged_out": true }))
}

fn handle_account_update(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let current = str_param(params, "current_password")?;
    let new = str_param(params, "new_password")?;
    vault.update_account(token, current, new)?;
    Ok(serde_json::json!({ "updated": true }))
}

fn handle_user_list(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    to_value(vault.list_users(token)?)
}

fn handle_user_create(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let name = str_param(params, "name")?;
    let password = str_param(params, "password")?;
    let admin = params.get("admin").and_then(Value::as_bool).unwrap_or(false);
    to_value(vault.create_user(token, name, password, admin)?)
}

fn handle_user_update(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let name = str_param(params, "name")?;
    let update = IdentityUpdate {
        password: params
            .get("password")
            .and_then(Value::as_str)
            .map(|p| zeroize::Zeroizing::new(p.to_string())),
        is_admin: params.get("admin").and_then(Value::as_bool),
    };
    vault.update_user(token, name, update)?;
    Ok(serde_json::json!({ "updated": true }))
}

fn handle_user_delete(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let name = str_param(params, "name")?;
    let removed = vault.delete_user(token, name)?;
    Ok(serde_json::json!({ "deleted": true, "data_items": removed }))
}

fn handle_data_get(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let key = str_param(params, "key")?;
    let value = json_text(vault.get_data(token, key)?)?;
    Ok(serde_json::json!({ "key": key, "value": value }))
}

fn handle_data_all(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let value = json_text(vault.get_all_data(token)?)?;
    Ok(serde_json::json!({ "value": value }))
}

fn handle_data_set(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let key = str_param(params, "key")?;
    let value = str_param(params, "value")?;
    let declared_len = params
        .get("content_length")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok());
    vault.set_data(token, key, value.as_bytes(), declared_len)?;
    Ok(serde_json::json!({ "stored": true }))
}

fn handle_data_delete(vault: &Vault<'_>, params: &Value) -> HandlerResult {
    let token = str_param(params, "token")?;
    let key = str_param(params, "key")?;
    let deleted = vault.delete_data(token, key)?;
    Ok(serde_json::json!({ "deleted": deleted }))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn str_param<'p>(params: &'p Value, name: &str) -> Result<&'p str, Failure> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Failure::Params(format!("Missing '{}' parameter", name)))
}

fn to_value<T: Serialize>(value: T) -> HandlerResult {
    Ok(serde_json::to_value(value)?)
}

/// Stored values are JSON text; pass them through as a string so the bytes
/// reach the client unchanged.
fn json_text(bytes: Vec<u8>) -> Result<String, Failure> {
    String::from_utf8(bytes).map_err(|e| {
        Failure::App(StrongboxError::Other(format!("stored value is not UTF-8: {}", e)))
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
