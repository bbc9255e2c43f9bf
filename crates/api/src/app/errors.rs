//! Fault-to-HTTP mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use col_dispatch::DispatchError;

/// Status for a dispatch fault. Unknown tokens and malformed requests are
/// the client's fault; business refusals are unprocessable; the rest is
/// ours.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::BadRequest(_) | DispatchError::CommandNotFound { .. } => {
            StatusCode::BAD_REQUEST
        }
        DispatchError::Command(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn code_for(err: &DispatchError) -> &'static str {
    match err {
        DispatchError::BadRequest(_) => "bad_request",
        DispatchError::CommandNotFound { .. } => "command_not_found",
        DispatchError::Command(_) => "business_error",
        DispatchError::Unexpected(_) => "unexpected",
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use col_dispatch::CommandError;

    #[test]
    fn fault_status_mapping() {
        assert_eq!(
            status_for(&DispatchError::CommandNotFound { token: "xx".into() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DispatchError::Command(CommandError::invalid("no"))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&DispatchError::Unexpected("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
