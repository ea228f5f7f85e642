// Mapping of sync failures onto HTTP responses
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use vesta_core::{ErrorClass, SyncFailure};

/// Error body returned for every failed notification.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub message: String,
    pub details: Vec<ErrorDetail>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub status_code: u16,
    pub message: String,
    pub referenced_by: String,
}

/// HTTP status for each error class.
pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::ClientInput => StatusCode::BAD_REQUEST,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorClass::External => StatusCode::BAD_GATEWAY,
    }
}

pub fn failure_response(failure: &SyncFailure) -> Response {
    let status = status_for(failure.class());
    let detail = failure.detail();
    let body = ErrorBody {
        message: failure.user_message(),
        details: vec![ErrorDetail {
            status_code: status.as_u16(),
            message: detail.message,
            referenced_by: detail.referenced_by.to_string(),
        }],
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_each_class() {
        assert_eq!(status_for(ErrorClass::ClientInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorClass::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorClass::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(ErrorClass::External), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_body_field_names() {
        let body = ErrorBody {
            message: "Invalid or missing product data".to_string(),
            details: vec![ErrorDetail {
                status_code: 400,
                message: "Product data is invalid or missing".to_string(),
                referenced_by: "Pub/Sub Event".to_string(),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["details"][0]["statusCode"], 400);
        assert_eq!(json["details"][0]["referencedBy"], "Pub/Sub Event");
    }
}
