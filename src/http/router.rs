//! Exact-path request routing

use super::{HttpRequest, HttpResponse, Method, Status};
use std::fmt;
use std::sync::Arc;

/// Request handler
pub type Handler = Arc<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

#[derive(Clone)]
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Maps (method, path) pairs to handlers
///
/// Unknown paths get 404; a known path requested with another method gets
/// 405 with an `Allow` header listing what the path accepts.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Register a handler for `method` on exactly `path`
    pub fn route<F>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.into(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn get<F>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.route(Method::Get, path, handler)
    }

    /// Find the handler for a request and run it
    pub fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        let path = request.path();
        let mut allowed: Vec<Method> = Vec::new();

        for route in self.routes.iter().filter(|r| r.path == path) {
            if route.method == request.method() {
                return (route.handler)(request);
            }
            allowed.push(route.method);
        }

        if allowed.is_empty() {
            return HttpResponse::text(Status::NOT_FOUND, "404 page not found\n");
        }

        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = HttpResponse::text(Status::METHOD_NOT_ALLOWED, "method not allowed\n");
        response.headers_mut().set("Allow", allow);
        response
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.path)))
            .finish()
    }
}
