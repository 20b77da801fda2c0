//! Wire encoding port for combined requests

use querykit_domain::{QueryResult, RawResponse, RequestInit};

/// One deferred request as handed to a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// `"1"`, `"2"`, ... in registration order
    pub id: String,
    /// Absolute URL of the sub-request, query string included.
    pub url: String,
    pub init: RequestInit,
}

/// The demultiplexed outcome for one request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSegment {
    pub id: String,
    pub result: QueryResult<RawResponse>,
}

impl BatchSegment {
    /// A segment carrying a decoded response.
    pub fn ok(id: impl Into<String>, response: RawResponse) -> Self {
        Self { id: id.into(), result: Ok(response) }
    }
}

/// Encoder/decoder pair for one API's batch envelope.
pub trait BatchCodec: Send + Sync {
    /// Where the combined request is sent, given the batch base URL.
    fn endpoint(&self, base_url: &str) -> String;

    /// Builds the combined request. Marker headers must not be encoded.
    fn encode(
        &self,
        batch_id: &str,
        base_url: &str,
        requests: &[BatchRequest],
    ) -> QueryResult<RequestInit>;

    /// Splits the combined response.
    ///
    /// A malformed segment becomes an `Err` for that id only; `Err` from this
    /// method fails every request of the batch.
    fn decode(
        &self,
        response: &RawResponse,
        requests: &[BatchRequest],
    ) -> QueryResult<Vec<BatchSegment>>;
}
