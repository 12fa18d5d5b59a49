//! Asset branch: unconditional delegation to the asset store

use super::error::DispatchError;
use super::types::{IncomingRequest, OutgoingResponse};
use super::AssetResolver;

/// Forward the original request, any method and path, and return the store's answer as-is
pub(super) async fn dispatch_asset(
    assets: &dyn AssetResolver,
    request: IncomingRequest,
) -> Result<OutgoingResponse, DispatchError> {
    Ok(assets.resolve(request).await?)
}
