use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use harborerp_core::DomainError;
use harborerp_infra::command_dispatcher::DispatchError;

/// Map a dispatch failure onto the wire contract.
///
/// Business rejections (bad quantities, insufficient stock, overpayment) are
/// 400s; state-machine violations and duplicate references are 409s; storage
/// unavailability is the one 503 this core can produce.
pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    let kind = err.kind();
    let message = err.to_string();
    let status = match &err {
        DispatchError::Domain(domain) => match domain {
            DomainError::Validation(_)
            | DomainError::InvalidQuantity(_)
            | DomainError::InsufficientStock { .. }
            | DomainError::OverpaymentNotAllowed { .. }
            | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
            DomainError::InvalidStateTransition(_) | DomainError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            DomainError::NotFound => StatusCode::NOT_FOUND,
        },
        DispatchError::Concurrency(_) => StatusCode::CONFLICT,
        DispatchError::TenantIsolation(_) => StatusCode::FORBIDDEN,
        DispatchError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Publish(_) => StatusCode::BAD_GATEWAY,
        DispatchError::Deserialize(_) | DispatchError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    json_error(status, kind, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
