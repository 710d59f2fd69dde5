//! Canvas discovery over the property-tree JSON interface.
//!
//! `GET /json/canvas/by-index?d=2` returns the `canvas/by-index` node two levels
//! deep. Every child is one canvas; its display name is the `value` of its `name`
//! child and its mirror root is its `path`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CanvasError, Result};

/// A canvas offered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasInfo {
    pub name: String,
    pub path: String,
}

/// URL of the discovery query.
pub fn discovery_url(host: &str, port: u16) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{host}:{port}/json/canvas/by-index"))
        .map_err(|e| CanvasError::Config(format!("bad discovery host {host}:{port}: {e}")))?;
    url.set_query(Some("d=2"));
    Ok(url)
}

/// Extract the canvas list from a discovery response.
///
/// Missing fields degrade to empty strings, like a missing node would.
pub fn parse_canvas_list(json: &serde_json::Value) -> Vec<CanvasInfo> {
    let Some(children) = json.get("children").and_then(|c| c.as_array()) else {
        return Vec::new();
    };

    children
        .iter()
        .map(|canvas| CanvasInfo {
            name: find_child(canvas, "name")
                .and_then(|n| n.get("value"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned(),
            path: canvas
                .get("path")
                .and_then(|p| p.as_str())
                .unwrap_or_default()
                .to_owned(),
        })
        .collect()
}

fn find_child<'a>(node: &'a serde_json::Value, name: &str) -> Option<&'a serde_json::Value> {
    node.get("children")?
        .as_array()?
        .iter()
        .find(|c| c.get("name").and_then(|n| n.as_str()) == Some(name))
}

/// Run the discovery query.
///
/// Transport and HTTP status failures are [`CanvasError::Transport`]; a body that
/// is not JSON is [`CanvasError::Json`].
pub async fn query_canvases(
    client: &reqwest::Client,
    host: &str,
    port: u16,
) -> Result<Vec<CanvasInfo>> {
    let url = discovery_url(host, port)?;
    tracing::debug!(%url, "querying canvases");

    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| CanvasError::Transport(e.to_string()))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| CanvasError::Transport(e.to_string()))?;
    let json: serde_json::Value = serde_json::from_slice(&body)?;

    let canvases = parse_canvas_list(&json);
    tracing::info!(count = canvases.len(), "canvas query succeeded");
    Ok(canvases)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn url_carries_depth_query() {
        let url = discovery_url("localhost", 8080).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/json/canvas/by-index?d=2");
    }

    #[test]
    fn parses_name_and_path() {
        let body = json!({
            "path": "/canvas/by-index",
            "children": [
                {
                    "path": "/canvas/by-index/texture[0]",
                    "children": [
                        {"name": "size", "value": 512},
                        {"name": "name", "value": "PFD"}
                    ]
                },
                {
                    "path": "/canvas/by-index/texture[1]",
                    "children": []
                }
            ]
        });
        assert_eq!(
            parse_canvas_list(&body),
            vec![
                CanvasInfo {
                    name: "PFD".into(),
                    path: "/canvas/by-index/texture[0]".into()
                },
                CanvasInfo {
                    name: String::new(),
                    path: "/canvas/by-index/texture[1]".into()
                },
            ]
        );
    }

    #[test]
    fn missing_children_is_empty() {
        assert!(parse_canvas_list(&json!({"path": "/x"})).is_empty());
        assert!(parse_canvas_list(&json!([])).is_empty());
    }
}
