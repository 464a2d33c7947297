//! Cassette data structures for recording and replaying calls.

use serde::{Deserialize, Serialize};

use super::codec::{Request, Response};

/// Schema version written to, and required from, every cassette file.
pub const CASSETTE_VERSION: u32 = 2;

/// On-disk document: exactly a version and the ordered pair list.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CassetteFile {
    pub(crate) version: u32,
    pub(crate) reqs: Vec<(Request, Response)>,
}

/// A named, ordered recording of request/response pairs.
///
/// Insertion order is match priority: lookups return the first pair whose
/// request is structurally equal to the one asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cassette {
    name: String,
    pairs: Vec<(Request, Response)>,
}

impl Cassette {
    /// Creates an empty cassette.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::new(),
        }
    }

    /// Creates a cassette holding `pairs` exactly as given.
    pub fn from_pairs(name: impl Into<String>, pairs: Vec<(Request, Response)>) -> Self {
        Self {
            name: name.into(),
            pairs,
        }
    }

    /// Cassette name, from which the file path is derived.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the response recorded for the first request equal to `request`.
    #[must_use]
    pub fn find(&self, request: &Request) -> Option<&Response> {
        self.pairs
            .iter()
            .find(|(r, _)| r == request)
            .map(|(_, resp)| resp)
    }

    /// Appends a pair unless an equal request is already recorded.
    ///
    /// Returns `true` if the pair was appended.
    pub fn append(&mut self, request: Request, response: Response) -> bool {
        if self.find(&request).is_some() {
            return false;
        }
        self.pairs.push((request, response));
        true
    }

    /// Ordered view of all pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(Request, Response)] {
        &self.pairs
    }

    /// Number of recorded pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub(crate) fn to_file(&self) -> CassetteFile {
        CassetteFile {
            version: CASSETTE_VERSION,
            reqs: self.pairs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::codec::{encode_request, encode_response};
    use crate::ports::Message;

    fn req(sku: i64) -> Request {
        let msg = Message::new("shop.GetPriceRequest").with("sku", sku);
        encode_request("GetPrice", &msg).unwrap()
    }

    fn resp(price: f64) -> Response {
        let msg = Message::new("shop.GetPriceResponse").with("price", price);
        encode_response(&msg).unwrap()
    }

    #[test]
    fn append_dedups_equal_requests() {
        let mut cassette = Cassette::new("checkout");
        assert!(cassette.append(req(42), resp(9.99)));
        assert!(!cassette.append(req(42), resp(1.00)));
        assert!(cassette.append(req(99), resp(5.00)));

        assert_eq!(cassette.len(), 2);
        assert_eq!(cassette.find(&req(42)), Some(&resp(9.99)));
    }

    #[test]
    fn find_returns_first_match_from_loaded_pairs() {
        let pairs = vec![
            (req(1), resp(1.0)),
            (req(1), resp(2.0)),
            (req(2), resp(3.0)),
        ];
        let cassette = Cassette::from_pairs("dupes", pairs);
        assert_eq!(cassette.len(), 3);
        assert_eq!(cassette.find(&req(1)), Some(&resp(1.0)));
        assert_eq!(cassette.find(&req(3)), None);
    }

    #[test]
    fn file_form_round_trips_through_json() {
        let mut cassette = Cassette::new("checkout");
        cassette.append(req(42), resp(9.99));
        cassette.append(req(7), resp(0.5));

        let file = cassette.to_file();
        let json = serde_json::to_string_pretty(&file).unwrap();
        let file: CassetteFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file.version, CASSETTE_VERSION);
        assert_eq!(Cassette::from_pairs("checkout", file.reqs), cassette);
    }

    #[test]
    fn file_rejects_extra_top_level_fields() {
        let doc = r#"{"version": 2, "reqs": [], "recorded_at": "yesterday"}"#;
        assert!(serde_json::from_str::<CassetteFile>(doc).is_err());
    }
}
