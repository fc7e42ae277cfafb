//! # switchyard
//!
//! A small HTTP/1.x server engine. Requests are matched against ordered
//! regular-expression routes and handed to a handler together with the
//! connection's response stream. The same dispatcher runs over plaintext TCP
//! or TLS.
//!
//! ## The contract
//!
//! - **Routing** is first-match-wins in registration order, per method. A
//!   pattern must match the whole path. When no route matches, a parallel
//!   table of *default* routes is tried before answering `404`.
//! - **Handlers** write the entire response themselves (status line, headers,
//!   body). The server adds nothing except its own `400`/`404`/`408`/`431`
//!   answers for requests that never reach a handler.
//! - **One request per connection.** The connection is closed once the
//!   handler returns, fails or panics.
//! - **Threads**: one tokio runtime with a fixed number of workers drives the
//!   accept loop and every connection. Handlers run on a separate pool of the
//!   same size, so a handler that blocks never stalls accepting.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::{Method, Request, ResponseWriter, Router, Server, StatusCode};
//!
//! fn main() -> Result<(), switchyard::Error> {
//!     let router = Router::new()
//!         .get("/hello", hello)
//!         .get("/users/([0-9]+)", user)
//!         .default_route(Method::GET, "/.*", fallback);
//!
//!     Server::new(8080, 4).with_router(router).start()
//! }
//!
//! async fn hello(mut res: ResponseWriter, _req: Request) -> std::io::Result<()> {
//!     res.send(StatusCode::OK, "text/plain", "hi").await
//! }
//!
//! async fn user(mut res: ResponseWriter, req: Request) -> std::io::Result<()> {
//!     let id = req.capture(1).unwrap_or_default().to_owned();
//!     res.send(StatusCode::OK, "text/plain", id).await
//! }
//!
//! async fn fallback(mut res: ResponseWriter, _req: Request) -> std::io::Result<()> {
//!     res.send(StatusCode::OK, "text/plain", "fallback").await
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod parse;
mod request;
mod response;
mod router;
mod server;
mod transport;

pub use config::Config;
pub use error::{BoxError, Error};
pub use handler::{Handler, IntoOutcome};
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
pub use request::{Body, Captures, Request};
pub use response::ResponseWriter;
pub use router::Router;
pub use server::Server;
pub use transport::{Plain, Tls, Transport};
