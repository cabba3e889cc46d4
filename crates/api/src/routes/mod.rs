pub mod health;
pub mod object_info;
pub mod prompt;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the route tree (mounted at the root).
///
/// ```text
/// /ws                          WebSocket (?clientId= to resume a session)
///
/// /prompt                      queue info (GET), submit prompt (POST)
/// /queue                       running and pending items (GET)
///
/// /object_info                 node catalog (GET)
/// /object_info/{node_class}    single node class (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route(
            "/prompt",
            get(prompt::queue_info).post(prompt::submit_prompt),
        )
        .route("/queue", get(prompt::queue_snapshot))
        .route("/object_info", get(object_info::list_nodes))
        .route("/object_info/{node_class}", get(object_info::get_node))
}
