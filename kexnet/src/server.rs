//! axum front end for the authority and for agents.
//!
//! Each endpoint is a `POST` whose body is the serialized envelope. The
//! synchronous engine runs on the blocking pool, so an acceptor that calls
//! out to the authority never stalls a runtime worker.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use kextrust::{Agent, Authority, Endpoint, KexError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Something that answers serialized envelopes.
pub trait Service: Send + Sync + 'static {
    fn serve(&self, endpoint: Endpoint, payload: &[u8]) -> kextrust::Result<Vec<u8>>;
}

impl Service for Authority {
    fn serve(&self, endpoint: Endpoint, payload: &[u8]) -> kextrust::Result<Vec<u8>> {
        self.handle(endpoint, payload)
    }
}

impl Service for Agent {
    fn serve(&self, endpoint: Endpoint, payload: &[u8]) -> kextrust::Result<Vec<u8>> {
        self.handle(endpoint, payload)
    }
}

/// HTTP status for an engine error.
pub fn status_for(err: &KexError) -> StatusCode {
    match err {
        KexError::UnknownPrincipal(_) | KexError::UnsupportedEndpoint(_) => StatusCode::NOT_FOUND,
        KexError::MalformedEnvelope(_)
        | KexError::DecryptionFailed(_)
        | KexError::SignatureInvalid(_)
        | KexError::CertificateMismatch(_)
        | KexError::NonceMismatch(_)
        | KexError::SelfHandshake(_) => StatusCode::BAD_REQUEST,
        KexError::SessionNotEstablished(_)
        | KexError::InvalidStateTransition { .. }
        | KexError::HandshakeInProgress(_) => StatusCode::CONFLICT,
        KexError::TransportError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn dispatch<S: Service>(service: Arc<S>, endpoint: Endpoint, body: Bytes) -> Response {
    let outcome = tokio::task::spawn_blocking(move || service.serve(endpoint, &body)).await;
    match outcome {
        Ok(Ok(reply)) if reply.is_empty() => StatusCode::OK.into_response(),
        Ok(Ok(reply)) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], reply).into_response(),
        Ok(Err(e)) => {
            warn!(%endpoint, error = %e, "request rejected");
            (status_for(&e), e.to_string()).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn router<S: Service>(service: Arc<S>, endpoints: &[Endpoint]) -> Router {
    let mut router = Router::new().route("/health", get(|| async { "ok" }));
    for &endpoint in endpoints {
        let service = Arc::clone(&service);
        router = router.route(
            endpoint.path(),
            post(move |body: Bytes| dispatch(service, endpoint, body)),
        );
    }
    router.layer(TraceLayer::new_for_http())
}

/// Routes served by the authority.
pub fn authority_router(authority: Arc<Authority>) -> Router {
    router(authority, &[Endpoint::KeyCertificate, Endpoint::SessionCertificate])
}

/// Routes served by an agent.
pub fn agent_router(agent: Arc<Agent>) -> Router {
    router(agent, &[Endpoint::NonceReceipt, Endpoint::ProofReceipt, Endpoint::Message])
}

/// Serve `router` until the listener fails.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(&KexError::UnknownPrincipal("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&KexError::NonceMismatch("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&KexError::SessionNotEstablished("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&KexError::HandshakeInProgress("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&KexError::TransportError("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&KexError::EntropyUnavailable("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
