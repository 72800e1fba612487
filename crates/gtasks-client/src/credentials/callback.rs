//! Loopback HTTP listener receiving the authorization redirect.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{GTasksError, GTasksResult};

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
    <p>You can close this window and return to your assistant.</p></body></html>";

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl AuthorizationCallback {
    /// Extract the authorization code, checking the anti-forgery state.
    pub fn into_code(self, expected_state: &str) -> GTasksResult<String> {
        if let Some(error) = self.error {
            return Err(GTasksError::authentication(format!(
                "consent was not granted: {error}"
            )));
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(GTasksError::authentication(
                "authorization callback state mismatch",
            ));
        }
        self.code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GTasksError::authentication("authorization callback carried no code"))
    }
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<AuthorizationCallback>>>>;

/// A bound `127.0.0.1:<ephemeral>` listener awaiting one redirect.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackListener {
    pub async fn bind() -> GTasksResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            GTasksError::authentication_from("could not bind loopback callback listener", e)
        })?;
        let addr = listener.local_addr().map_err(|e| {
            GTasksError::authentication_from("could not bind loopback callback listener", e)
        })?;
        debug!(%addr, "Callback listener bound");
        Ok(Self { listener, addr })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.addr.port())
    }

    /// Serve until the first redirect arrives or `timeout` elapses.
    pub async fn wait(self, timeout: Duration) -> GTasksResult<AuthorizationCallback> {
        let (tx, rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(tx)));
        let app = Router::new()
            .route("/", get(receive_callback))
            .with_state(slot);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        // Detached: graceful shutdown lets the browser receive the success page
        tokio::spawn(async move {
            let served = axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Callback listener stopped with error");
            }
        });

        let outcome = tokio::time::timeout(timeout, rx).await;
        let _ = stop_tx.send(());

        match outcome {
            Ok(Ok(callback)) => Ok(callback),
            Ok(Err(_)) => Err(GTasksError::authentication(
                "callback listener closed before consent completed",
            )),
            Err(_) => Err(GTasksError::authentication(format!(
                "timed out after {}s waiting for consent in the browser",
                timeout.as_secs()
            ))),
        }
    }
}

async fn receive_callback(
    State(slot): State<CallbackSlot>,
    Query(callback): Query<AuthorizationCallback>,
) -> Html<&'static str> {
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    if let Some(sender) = sender {
        let _ = sender.send(callback);
    }
    Html(SUCCESS_PAGE)
}
