//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A route table holds handlers of *different* concrete types side by side in
//! one `Vec<Route>`. Rust collections hold one type, so each handler is
//! boxed behind the object-safe [`ErasedHandler`] trait.
//!
//! ```text
//! async fn hello(res: ResponseWriter, req: Request) -> io::Result<()>  ← user writes this
//!        ↓ router.get("/hello", hello)
//! hello.into_boxed_handler()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                          ← stored as BoxedHandler
//!        ↓
//! handler.call(res, req)  at request time             ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(res, req).await.into_outcome() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::ResponseWriter;

/// A heap-allocated, type-erased handler future.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, res: ResponseWriter, req: Request) -> BoxFuture;
}

/// A type-erased handler shared by every connection that resolves to it.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// What a handler may return.
///
/// `()` means the handler finished; `Err` is logged by the dispatcher and the
/// connection is closed. Either way the handler is responsible for whatever
/// bytes reached the client.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> { Ok(()) }
}

impl<E> IntoOutcome for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> { self.map_err(Into::into) }
}

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure of the shape:
///
/// ```text
/// async fn name(res: ResponseWriter, req: Request) -> impl IntoOutcome
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, res: ResponseWriter, req: Request) -> BoxFuture {
        let fut = (self.0)(res, req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
