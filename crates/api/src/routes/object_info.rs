use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use relay_core::catalog::NodeDefinition;

use crate::state::AppState;

/// GET /object_info -- every registered node class.
pub async fn list_nodes(State(state): State<AppState>) -> Json<BTreeMap<String, NodeDefinition>> {
    Json(state.catalog.all().clone())
}

/// GET /object_info/{node_class} -- a single class keyed by name, or `{}`
/// when the class is unknown.
pub async fn get_node(
    State(state): State<AppState>,
    Path(node_class): Path<String>,
) -> Json<BTreeMap<String, NodeDefinition>> {
    let mut out = BTreeMap::new();
    if let Some(definition) = state.catalog.get(&node_class) {
        out.insert(node_class, definition.clone());
    }
    Json(out)
}
