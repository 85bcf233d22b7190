/// Per-message header exchanged before every request and response payload.
///
/// Requests carry `method` and `id`. Responses carry `id`, plus `error` when
/// the call failed. Fields use explicit presence, so an absent field and an
/// empty one are distinguishable on the wire.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Header {
    #[prost(string, optional, tag = "1")]
    pub method: Option<String>,
    #[prost(uint64, optional, tag = "2")]
    pub id: Option<u64>,
    #[prost(string, optional, tag = "3")]
    pub error: Option<String>,
}

impl Header {
    /// Header for a request to `method` identified by `id`.
    pub fn request(method: impl Into<String>, id: u64) -> Self {
        Self {
            method: Some(method.into()),
            id: Some(id),
            error: None,
        }
    }

    /// Header for the response to call `id`. An empty `error` means success
    /// and leaves the field absent.
    pub fn response(id: u64, error: &str) -> Self {
        Self {
            method: None,
            id: Some(id),
            error: (!error.is_empty()).then(|| error.to_string()),
        }
    }
}
