//! Recording mode: call through, then capture the pair into the cassette.

use crate::cassette::codec::{encode_request, encode_response, Request, Response};
use crate::cassette::session::{lock, ActiveSession, SessionState};
use crate::error::{Error, Result};
use crate::ports::{Message, RpcClient};

/// Performs the live call and appends the encoded pair to the active cassette.
///
/// The request is encoded before the call so a payload that cannot be
/// recorded never reaches the service. Upstream failures are returned as-is
/// and leave the cassette untouched.
pub(crate) async fn record_call<C: RpcClient + ?Sized>(
    inner: &C,
    session: &SessionState,
    active: &ActiveSession,
    method: &str,
    message: &Message,
) -> Result<Message> {
    let request = encode_request(method, message)?;
    let response = inner.request_response(method, message).await?;
    let encoded = encode_response(&response)?;
    commit(session, active, request, encoded)?;
    Ok(response)
}

fn commit(
    session: &SessionState,
    active: &ActiveSession,
    request: Request,
    response: Response,
) -> Result<()> {
    // Checked under the cassette lock: teardown snapshots the cassette under
    // the same lock after retiring the session.
    let mut cassette = lock(&active.cassette);
    if !session.is_current(active.id) {
        tracing::warn!(
            method = request.method(),
            "recording session ended during call"
        );
        return Err(Error::NoCassette);
    }
    let method = request.method().to_string();
    if cassette.append(request, response) {
        tracing::debug!(
            cassette = cassette.name(),
            %method,
            pairs = cassette.len(),
            "recorded call"
        );
    } else {
        tracing::debug!(cassette = cassette.name(), %method, "call already recorded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::codec::{encode_request, encode_response};
    use crate::cassette::format::Cassette;
    use crate::cassette::session::{exclusive, Mode};

    #[test]
    fn commit_after_session_ended_is_no_cassette() {
        let _exclusive = exclusive();
        let session = SessionState::default();
        let cassette = Cassette::new("late");
        let id = session.begin(Mode::Recording, cassette).unwrap();
        let active = session.current().unwrap();
        session.end(id);

        let request = encode_request("Ping", &Message::new("ping")).unwrap();
        let response = encode_response(&Message::new("pong")).unwrap();
        let err = commit(&session, &active, request, response).unwrap_err();

        assert!(matches!(err, Error::NoCassette));
        assert!(lock(&active.cassette).is_empty());
    }
}
