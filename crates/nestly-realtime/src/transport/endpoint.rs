//! Realtime endpoint URL construction.

use nestly_core::error::AppError;

/// Build the WebSocket URL for a base endpoint and realtime path.
///
/// `http` maps to `ws` and `https` to `wss`; `ws`/`wss` pass through.
pub fn websocket_url(endpoint: &str, path: &str) -> Result<String, AppError> {
    let endpoint = endpoint.trim().trim_end_matches('/');

    let (scheme, rest) = endpoint
        .split_once("://")
        .ok_or_else(|| AppError::configuration(format!("Endpoint '{endpoint}' has no scheme")))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(AppError::configuration(format!(
                "Unsupported endpoint scheme '{other}'"
            )));
        }
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(AppError::configuration(format!(
            "Endpoint '{endpoint}' has no host"
        )));
    }

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    Ok(format!("{ws_scheme}://{rest}{path}"))
}
