//! Minimal switchyard example: regex routes, a catch-all default, optional TLS.
//!
//! Run with:
//!   cargo run --example basic
//!   TLS_CERT=cert.pem TLS_KEY=key.pem cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/hello
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/echo -d 'some bytes'
//!   curl http://localhost:3000/anything/else

use std::io;

use switchyard::{Method, Request, ResponseWriter, Router, Server, StatusCode, Tls};

fn main() -> Result<(), switchyard::Error> {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .get("/hello", hello)
        .get("/users/([0-9]+)", get_user)
        .post("/echo", echo)
        .default_route(Method::GET, "/.*", not_here);

    match (std::env::var("TLS_CERT"), std::env::var("TLS_KEY")) {
        (Ok(cert), Ok(key)) => {
            let tls = Tls::from_pem_files(cert, key)?;
            Server::tls(3443, 4, tls).with_router(router).start()
        }
        _ => Server::new(3000, 4).with_router(router).start(),
    }
}

// GET /hello
async fn hello(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "hi").await
}

// GET /users/([0-9]+): capture 1 is the id.
async fn get_user(mut res: ResponseWriter, req: Request) -> io::Result<()> {
    let id = req.capture(1).unwrap_or("unknown");
    let body = format!(r#"{{"id":"{id}","name":"alice"}}"#);
    res.send(StatusCode::OK, "application/json", body).await
}

// POST /echo: reads exactly Content-Length bytes (or a chunked body) and
// sends them back.
async fn echo(mut res: ResponseWriter, mut req: Request) -> io::Result<()> {
    let body = req.body_mut().read_to_end().await?;
    res.send(StatusCode::OK, "application/octet-stream", body).await
}

// Any other GET. A real application might serve static files here.
async fn not_here(mut res: ResponseWriter, req: Request) -> io::Result<()> {
    let body = format!("nothing at {}\n", req.path());
    res.send(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", body).await
}
