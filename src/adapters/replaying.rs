//! Playing mode: answer calls from the loaded cassette.

use crate::cassette::codec::{decode_response, encode_request};
use crate::cassette::session::{lock, ActiveSession, SessionState};
use crate::error::{Error, Result};
use crate::ports::Message;

/// Looks the call up in the active cassette and decodes the recorded answer.
///
/// A miss is always [`Error::NoRecording`]; the wrapped client is never
/// consulted in this mode.
pub(crate) fn replay_call(
    session: &SessionState,
    active: &ActiveSession,
    method: &str,
    message: &Message,
) -> Result<Message> {
    let request = encode_request(method, message)?;
    let found = {
        let cassette = lock(&active.cassette);
        if !session.is_current(active.id) {
            return Err(Error::NoCassette);
        }
        match cassette.find(&request) {
            Some(response) => Ok(response.clone()),
            None => Err(cassette.name().to_string()),
        }
    };
    match found {
        Ok(response) => {
            tracing::debug!(%method, "replayed call");
            decode_response(&response)
        }
        Err(cassette) => {
            tracing::warn!(
                %method,
                %cassette,
                payload = %request.payload(),
                "no recording matches call"
            );
            Err(Error::NoRecording {
                cassette,
                request: Box::new(request),
            })
        }
    }
}
