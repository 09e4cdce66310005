//! The hello endpoint

use crate::http::{HttpRequest, HttpResponse, Router, Status};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Body of `GET /`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub hello: String,
}

impl Default for Greeting {
    fn default() -> Self {
        Greeting {
            hello: "world".to_string(),
        }
    }
}

/// `GET /` answers `{"hello":"world"}`
pub fn hello(_request: &HttpRequest) -> HttpResponse {
    match HttpResponse::json(Status::OK, &Greeting::default()) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to encode greeting");
            HttpResponse::text(Status::INTERNAL_SERVER_ERROR, "internal server error\n")
        }
    }
}

/// Routes served in server mode
pub fn router() -> Router {
    Router::new().get("/", hello)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[test]
    fn test_hello_body() {
        let response = router().dispatch(&HttpRequest::new(Method::Get, "/"));
        assert_eq!(response.status(), Status::OK);
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("application/json")
        );
        assert_eq!(response.body(), br#"{"hello":"world"}"#);

        let greeting: Greeting = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(greeting, Greeting::default());
    }

    #[test]
    fn test_other_routes() {
        let router = router();
        let response = router.dispatch(&HttpRequest::new(Method::Get, "/hello"));
        assert_eq!(response.status(), Status::NOT_FOUND);

        let response = router.dispatch(&HttpRequest::new(Method::Delete, "/"));
        assert_eq!(response.status(), Status::METHOD_NOT_ALLOWED);
    }
}
