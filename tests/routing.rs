use std::io;

use switchyard::{Error, Method, Request, ResponseWriter, Router, Server, StatusCode};

mod common;

async fn hi(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "hi").await
}

async fn fallback(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "fallback").await
}

async fn echo_capture(mut res: ResponseWriter, req: Request) -> io::Result<()> {
    let id = req.capture(1).unwrap_or_default().to_owned();
    res.send(StatusCode::OK, "text/plain", id).await
}

async fn echo_param(mut res: ResponseWriter, req: Request) -> io::Result<()> {
    let body = format!("{}/{}", req.param("user").unwrap_or("-"), req.param("repo").unwrap_or("-"));
    res.send(StatusCode::OK, "text/plain", body).await
}

async fn first(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "first").await
}

async fn second(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "second").await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn primary_then_default_then_404() {
    let mut server = Server::new(0, 2);
    server.add_route(Method::GET, "/hello", hi);
    server.add_default_route(Method::GET, "/.*", fallback);
    let running = common::spawn(server).await;

    let res = common::get(running.addr, "/hello").await;
    assert_eq!(common::status(&res), 200);
    assert_eq!(common::body(&res), "hi");

    let res = common::get(running.addr, "/other").await;
    assert_eq!(common::status(&res), 200);
    assert_eq!(common::body(&res), "fallback");

    let res = common::send(running.addr, b"POST /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert_eq!(common::status(&res), 404);

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capture_group_is_echoed() {
    let server = Server::new(0, 2).with_router(Router::new().get("/users/([0-9]+)", echo_capture));
    let running = common::spawn(server).await;

    let res = common::get(running.addr, "/users/42").await;
    assert_eq!(common::body(&res), "42");

    let res = common::get(running.addr, "/users/abc").await;
    assert_eq!(common::status(&res), 404);

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn named_captures() {
    let router = Router::new().get("/repos/(?P<user>[^/]+)/(?P<repo>[^/]+)", echo_param);
    let running = common::spawn(Server::new(0, 1).with_router(router)).await;

    let res = common::get(running.addr, "/repos/rust-lang/regex").await;
    assert_eq!(common::body(&res), "rust-lang/regex");

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn earlier_registration_wins_over_later_match() {
    let router = Router::new()
        .get("/items/.*", first)
        .get("/items/special", second)
        .get("/other", second);
    let running = common::spawn(Server::new(0, 2).with_router(router)).await;

    assert_eq!(common::body(&common::get(running.addr, "/items/special").await), "first");
    assert_eq!(common::body(&common::get(running.addr, "/other").await), "second");

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_route_does_not_shadow_primary() {
    // Registered before the specific route, but in the default table.
    let mut server = Server::new(0, 2);
    server
        .add_default_route(Method::GET, "/.*", fallback)
        .add_route(Method::GET, "/hello", hi);
    let running = common::spawn(server).await;

    assert_eq!(common::body(&common::get(running.addr, "/hello").await), "hi");
    assert_eq!(common::body(&common::get(running.addr, "/hello/x").await), "fallback");

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_string_is_not_part_of_the_path() {
    let server = Server::new(0, 1).with_router(Router::new().get("/hello", hi));
    let running = common::spawn(server).await;

    let res = common::get(running.addr, "/hello?name=x").await;
    assert_eq!(common::body(&res), "hi");

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_request_gets_400() {
    let running = common::spawn(Server::new(0, 1).with_router(Router::new().get("/.*", hi))).await;

    let res = common::send(running.addr, b"GET /\r\n\r\n").await;
    assert_eq!(common::status(&res), 400);

    let res = common::send(running.addr, b"GET / HTTP/1.1\r\nbroken header\r\n\r\n").await;
    assert_eq!(common::status(&res), 400);

    // The server is still healthy afterwards.
    assert_eq!(common::body(&common::get(running.addr, "/").await), "hi");

    running.stop().await.unwrap();
}

#[test]
fn invalid_pattern_fails_start() {
    let mut server = Server::new(0, 1);
    server.add_route(Method::GET, "/broken(", hi);

    match server.start() {
        Err(Error::Route { pattern, .. }) => assert_eq!(pattern, "/broken("),
        other => panic!("expected a route error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_pattern_fails_serve() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Server::new(0, 1).with_router(Router::new().get("[", hi));

    let err = server.serve_with_shutdown(listener, std::future::pending()).await.unwrap_err();
    assert!(matches!(err, Error::Route { .. }));
}

#[test]
fn bind_failure_is_returned_from_start() {
    // Hold the port so the server cannot take it.
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = switchyard::Config::new(port).ip([127, 0, 0, 1].into());
    let server = Server::with_config(config, switchyard::Plain);

    assert!(matches!(server.start(), Err(Error::Io(_))));
}
