use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload};

use crate::error::AppError;

/// Header carrying the verified caller subject. Authentication itself happens
/// upstream (identity-aware proxy); this service only consumes the result.
pub const SUBJECT_HEADER: &str = "x-forwarded-user";

/// Request-scoped caller identity. Extracted before any handler logic runs;
/// a missing or empty header rejects the request with 401.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let subject = req
            .headers()
            .get(SUBJECT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        ready(match subject {
            Some(subject) => Ok(Identity { subject }),
            None => Err(AppError::Unauthenticated),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_subject_from_header() {
        let req = TestRequest::default()
            .insert_header((SUBJECT_HEADER, " alice "))
            .to_http_request();
        let identity = Identity::from_request(&req, &mut Payload::None)
            .await
            .unwrap();
        assert_eq!(identity.subject, "alice");
    }

    #[actix_web::test]
    async fn rejects_missing_header() {
        let req = TestRequest::default().to_http_request();
        let result = Identity::from_request(&req, &mut Payload::None).await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    #[actix_web::test]
    async fn rejects_blank_subject() {
        let req = TestRequest::default()
            .insert_header((SUBJECT_HEADER, "   "))
            .to_http_request();
        let result = Identity::from_request(&req, &mut Payload::None).await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }
}
