//! Ordered regex route tables.
//!
//! Two tables, each one `Vec` of routes per method. Lookup walks the primary
//! routes for the request's method in registration order, then the default
//! routes the same way. The first pattern that matches the *whole* path wins.
//!
//! Register specific routes before catch-alls; register generic fallbacks
//! (a static-file handler, say) as default routes so they never shadow a
//! specific one.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use regex::Regex;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Captures;

struct Route {
    pattern: String,
    regex: Regex,
    handler: BoxedHandler,
}

#[derive(Clone, Copy)]
enum Table {
    Primary,
    Default,
}

/// The application's route table.
///
/// Build it once before starting the server. Methods compare by exact token
/// (`GET` and `get` are different methods). Each builder call returns `self`
/// so registrations chain:
///
/// ```rust
/// use switchyard::{Method, Request, ResponseWriter, Router, StatusCode};
///
/// async fn user(mut res: ResponseWriter, req: Request) -> std::io::Result<()> {
///     let id = req.capture(1).unwrap_or_default().to_owned();
///     res.send(StatusCode::OK, "text/plain", id).await
/// }
///
/// async fn static_files(mut res: ResponseWriter, _req: Request) -> std::io::Result<()> {
///     res.send(StatusCode::OK, "text/plain", "file").await
/// }
///
/// let router = Router::new()
///     .get("/users/([0-9]+)", user)
///     .default_route(Method::GET, "/.*", static_files);
/// assert_eq!(router.len(), 2);
/// ```
///
/// An invalid pattern does not panic here; it is reported by
/// [`Server::start`](crate::Server::start) before the server binds.
#[derive(Default)]
pub struct Router {
    primary: HashMap<Method, Vec<Route>>,
    fallback: HashMap<Method, Vec<Route>>,
    error: Option<Error>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route for `method` whose regex `pattern` must match the whole
    /// path.
    pub fn route(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.insert(Table::Primary, method, pattern, handler);
        self
    }

    /// Adds a fallback route, consulted only when no primary route for the
    /// method matches.
    pub fn default_route(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.insert(Table::Default, method, pattern, handler);
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::DELETE, pattern, handler)
    }

    pub(crate) fn insert_primary(&mut self, method: Method, pattern: &str, handler: impl Handler) {
        self.insert(Table::Primary, method, pattern, handler);
    }

    pub(crate) fn insert_default(&mut self, method: Method, pattern: &str, handler: impl Handler) {
        self.insert(Table::Default, method, pattern, handler);
    }

    fn insert(&mut self, table: Table, method: Method, pattern: &str, handler: impl Handler) {
        // Anchored so that a partial match is never a hit.
        let regex = match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) => re,
            Err(source) => {
                if self.error.is_none() {
                    self.error = Some(Error::Route { pattern: pattern.to_owned(), source });
                }
                return;
            }
        };

        let routes = match table {
            Table::Primary => &mut self.primary,
            Table::Default => &mut self.fallback,
        };
        routes.entry(method).or_default().push(Route {
            pattern: pattern.to_owned(),
            regex,
            handler: handler.into_boxed_handler(),
        });
    }

    /// Surfaces the first registration error, if any.
    pub(crate) fn check(&mut self) -> Result<(), Error> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Primary patterns registered for `method`, in match order.
    pub fn patterns(&self, method: &Method) -> impl Iterator<Item = &str> {
        Self::patterns_in(&self.primary, method)
    }

    /// Default patterns registered for `method`, in match order.
    pub fn default_patterns(&self, method: &Method) -> impl Iterator<Item = &str> {
        Self::patterns_in(&self.fallback, method)
    }

    fn patterns_in<'a>(
        table: &'a HashMap<Method, Vec<Route>>,
        method: &Method,
    ) -> impl Iterator<Item = &'a str> + use<'a> {
        table.get(method).into_iter().flatten().map(|r| r.pattern.as_str())
    }

    /// Total number of routes in both tables.
    pub fn len(&self) -> usize {
        self.primary.values().chain(self.fallback.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First primary match for `method` and `path`, else first default match.
    pub(crate) fn resolve(&self, method: &Method, path: &str) -> Option<(BoxedHandler, Captures)> {
        Self::first_match(self.primary.get(method), path)
            .or_else(|| Self::first_match(self.fallback.get(method), path))
    }

    fn first_match(routes: Option<&Vec<Route>>, path: &str) -> Option<(BoxedHandler, Captures)> {
        routes?.iter().find_map(|route| {
            let caps = route.regex.captures(path)?;
            Some((Arc::clone(&route.handler), Captures::from_regex(&route.regex, &caps)))
        })
    }
}
