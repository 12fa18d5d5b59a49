//! API branch: chat route matching, method check and inference invocation

use hyper::Method;

use super::error::DispatchError;
use super::route::CHAT_SUBPATH;
use super::types::{ChatRequestPayload, IncomingRequest, OutgoingResponse};
use super::InferenceInvoker;
use crate::logger;

/// Handle a request classified under the API prefix
///
/// Unknown subpaths are rejected before the method is looked at, so they are
/// 404 for every method. The inference backend is called at most once and its
/// response is returned untouched.
pub(super) async fn dispatch_api(
    inference: &dyn InferenceInvoker,
    model: &str,
    subpath: &str,
    request: &IncomingRequest,
) -> Result<OutgoingResponse, DispatchError> {
    if subpath != CHAT_SUBPATH {
        return Err(DispatchError::RouteNotFound {
            path: request.uri().path().to_string(),
        });
    }

    if request.method() != Method::POST {
        return Err(DispatchError::MethodNotAllowed {
            method: request.method().clone(),
        });
    }

    let payload =
        ChatRequestPayload::from_slice(request.body()).map_err(DispatchError::MalformedPayload)?;

    logger::log_chat_invocation(model, payload.message_count());

    let response = inference.invoke(model, payload).await?;
    Ok(response)
}
