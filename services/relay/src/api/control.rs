//! Access list control endpoints.
//!
//! All responses are `text/plain` with status 200; success and failure are
//! distinguished by the `DONE:` / `FAIL:` prefix of the body so that the
//! endpoints stay usable from `curl` in shell scripts.
//!
//! GET /aio?secret=S[&addr=A]     add A (or the caller's own address)
//! GET /list                      one range per line
//! GET /delete?secret=S&addr=A    remove the first range containing A
//! GET /purge?secret=S            remove every range

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::Extensions,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::access::AccessList;

/// Shared state for the control surface.
#[derive(Clone)]
pub struct ControlState {
    pub access: Arc<AccessList>,
    secret: Arc<str>,
}

impl ControlState {
    /// An empty secret makes every mutating request fail.
    pub fn new(access: Arc<AccessList>, secret: impl Into<Arc<str>>) -> Self {
        Self {
            access,
            secret: secret.into(),
        }
    }

    fn check_secret(&self, provided: Option<&str>) -> Result<(), &'static str> {
        let provided = match provided {
            Some(s) if !s.is_empty() => s,
            _ => return Err("FAIL: No Secret\n"),
        };
        if self.secret.is_empty() || !provided.eq_ignore_ascii_case(&self.secret) {
            return Err("FAIL: Unknown Secret\n");
        }
        Ok(())
    }
}

/// Query parameters shared by the control endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ControlQuery {
    pub secret: Option<String>,
    pub addr: Option<String>,
}

/// Create control routes.
pub fn routes() -> Router<ControlState> {
    Router::new()
        .route("/aio", get(add))
        .route("/list", get(list))
        .route("/delete", get(delete))
        .route("/purge", get(purge))
}

async fn add(
    State(state): State<ControlState>,
    extensions: Extensions,
    Query(query): Query<ControlQuery>,
) -> String {
    if let Err(msg) = state.check_secret(query.secret.as_deref()) {
        return msg.to_string();
    }

    let addr = match query.addr.filter(|a| !a.is_empty()) {
        Some(addr) => addr,
        None => match extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(peer)) => peer.ip().to_canonical().to_string(),
            None => {
                warn!("Self-registration without a peer address");
                return "FAIL: \n".to_string();
            }
        },
    };

    if state.access.add(&addr).await {
        format!("DONE: {}\n", addr)
    } else {
        format!("FAIL: {}\n", addr)
    }
}

async fn list(State(state): State<ControlState>) -> String {
    state
        .access
        .list()
        .await
        .iter()
        .map(|net| format!("{}\n", net))
        .collect()
}

async fn delete(State(state): State<ControlState>, Query(query): Query<ControlQuery>) -> String {
    if let Err(msg) = state.check_secret(query.secret.as_deref()) {
        return msg.to_string();
    }

    let Some(addr) = query.addr.filter(|a| !a.is_empty()) else {
        return "FAIL: No Address Provided for Deletion\n".to_string();
    };

    if state.access.remove(&addr).await {
        format!("DONE: Deleted {}\n", addr)
    } else {
        format!("FAIL: Unable to Delete {}\n", addr)
    }
}

async fn purge(State(state): State<ControlState>, Query(query): Query<ControlQuery>) -> String {
    if let Err(msg) = state.check_secret(query.secret.as_deref()) {
        return msg.to_string();
    }

    state.access.clear().await;
    "DONE: Purged\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(secret: &str) -> ControlState {
        ControlState::new(Arc::new(AccessList::new()), secret)
    }

    #[test]
    fn test_check_secret() {
        let state = state("Hunter2");
        assert_eq!(state.check_secret(None), Err("FAIL: No Secret\n"));
        assert_eq!(state.check_secret(Some("")), Err("FAIL: No Secret\n"));
        assert_eq!(state.check_secret(Some("nope")), Err("FAIL: Unknown Secret\n"));
        assert_eq!(state.check_secret(Some("hunter2")), Ok(()));
        assert_eq!(state.check_secret(Some("HUNTER2")), Ok(()));
    }

    #[test]
    fn test_empty_secret_rejects_everything() {
        let state = state("");
        assert_eq!(state.check_secret(Some("anything")), Err("FAIL: Unknown Secret\n"));
    }
}
