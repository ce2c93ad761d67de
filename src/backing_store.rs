use crate::wire::{GetDataRequest, GetDataResponse};

/// The backing store collaborator: a single synchronous call that takes
/// one composite request and returns one composite response, or a transport
/// error. How that call actually reaches the remote service is deliberately
/// out of scope here, implementors of this trait are the transport.
pub trait BackingStore: Send + Sync {
    fn get_data(
        &self,
        request: GetDataRequest,
    ) -> Result<GetDataResponse, Box<dyn std::error::Error + Send + Sync>>;
}
