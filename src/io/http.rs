//! HTTP front end
//!
//! Operator pages and admin endpoints are only served to the local host;
//! the vote endpoint encoded in the QR codes is open to the LAN.
//! Uses hyper for the HTTP server.
//!
//! | Method | Path                     | Local only |
//! |--------|--------------------------|------------|
//! | GET    | `/`                      | yes        |
//! | POST   | `/polls`                 | yes        |
//! | GET    | `/polls/{id}`            | yes        |
//! | GET    | `/polls/{id}/qr/{token}` | yes        |
//! | POST   | `/polls/{id}/pack`       | yes        |
//! | GET    | `/polls/{id}/{token}`    | no         |
//! | GET    | `/packs`                 | yes        |
//! | POST   | `/packs/{file}/launch`   | yes        |
//! | DELETE | `/packs/{file}`          | yes        |
//! | GET    | `/health`                | no         |

use crate::domain::poll::Poll;
use crate::services::access::{Access, AccessGuard};
use crate::services::poll_service::{PollService, PollView, ServiceError};
use crate::services::registry::RegistryError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Largest request body read; a poll definition is a few hundred bytes
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Shared state handed to every connection
pub struct AppState {
    service: PollService,
    guard: AccessGuard,
}

impl AppState {
    pub fn new(service: PollService, guard: AccessGuard) -> Self {
        Self { service, guard }
    }

    pub fn service(&self) -> &PollService {
        &self.service
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Setup,
    Health,
    CreatePoll,
    PollPage(&'a str),
    QrImage(&'a str, &'a str),
    Vote(&'a str, &'a str),
    PersistPoll(&'a str),
    ListPacks,
    LaunchPack(&'a str),
    DeletePack(&'a str),
    NotFound,
}

impl Route<'_> {
    /// Routes reachable from other machines
    fn is_public(&self) -> bool {
        matches!(self, Route::Health | Route::Vote(..) | Route::NotFound)
    }

    fn reads_body(&self) -> bool {
        matches!(self, Route::CreatePoll)
    }
}

fn route<'a>(method: &Method, path: &'a str) -> Route<'a> {
    let trimmed = path.trim_matches('/');
    let segments: Vec<&str> =
        if trimmed.is_empty() { Vec::new() } else { trimmed.split('/').collect() };

    match (method, segments.as_slice()) {
        (&Method::GET, &[]) => Route::Setup,
        (&Method::GET, &["health"]) => Route::Health,
        (&Method::POST, &["polls"]) => Route::CreatePoll,
        (&Method::GET, &["polls", id]) => Route::PollPage(id),
        (&Method::GET, &["polls", id, "qr", token]) => Route::QrImage(id, token),
        (&Method::POST, &["polls", id, "pack"]) => Route::PersistPoll(id),
        (&Method::GET, &["polls", id, token]) => Route::Vote(id, token),
        (&Method::GET, &["packs"]) => Route::ListPacks,
        (&Method::POST, &["packs", file, "launch"]) => Route::LaunchPack(file),
        (&Method::DELETE, &["packs", file]) => Route::DeletePack(file),
        _ => Route::NotFound,
    }
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(body.into()))
        .expect("static response should not fail")
}

fn text(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    respond(status, "text/plain; charset=utf-8", body.into())
}

fn json(status: StatusCode, value: &impl serde::Serialize) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, "application/json", body),
        Err(e) => {
            error!(error = %e, "json_encode_failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed")
        }
    }
}

fn redirect_home() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header("Location", "/")
        .body(Full::new(Bytes::new()))
        .expect("static response should not fail")
}

fn denied() -> Response<Full<Bytes>> {
    respond(StatusCode::FORBIDDEN, "text/html; charset=utf-8", DENIED_PAGE)
}

fn error_response(err: &ServiceError) -> Response<Full<Bytes>> {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if matches!(err, ServiceError::Registry(RegistryError::DuplicateId(_))) {
        StatusCode::CONFLICT
    } else if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!(error = %err, "request_failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    text(status, err.to_string())
}

/// Denial response for guarded routes called from another host
fn admit(
    state: &AppState,
    route: &Route<'_>,
    method: &Method,
    path: &str,
    peer: IpAddr,
) -> Option<Response<Full<Bytes>>> {
    if route.is_public() || state.guard.check(peer) == Access::Granted {
        return None;
    }
    info!(peer = %peer, method = %method, path = %path, "request_denied");
    Some(denied())
}

/// Route a fully read request. Separate from hyper types so it can be
/// exercised directly.
pub fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    body: &[u8],
    peer: IpAddr,
) -> Response<Full<Bytes>> {
    let route = route(method, path);
    if let Some(resp) = admit(state, &route, method, path, peer) {
        return resp;
    }
    serve(state, route, body)
}

fn serve(state: &AppState, route: Route<'_>, body: &[u8]) -> Response<Full<Bytes>> {
    let service = &state.service;
    match route {
        Route::Setup => respond(StatusCode::OK, "text/html; charset=utf-8", SETUP_PAGE),
        Route::Health => text(StatusCode::OK, "ok"),
        Route::CreatePoll => {
            let poll: Poll = match serde_json::from_slice(body) {
                Ok(poll) => poll,
                Err(e) => {
                    debug!(error = %e, "poll_definition_rejected");
                    return text(StatusCode::BAD_REQUEST, format!("invalid poll definition: {e}"));
                }
            };
            match service.create_poll(poll) {
                Ok(created) => text(StatusCode::CREATED, created.poll_id.to_string()),
                Err(e) => error_response(&e),
            }
        }
        Route::PollPage(id) => match service.poll_view(id) {
            Some(view) => respond(StatusCode::OK, "text/html; charset=utf-8", render_poll_page(&view)),
            None => redirect_home(),
        },
        Route::QrImage(id, token) => match service.qr_image(id, token) {
            Ok(png) => respond(StatusCode::OK, "image/png", png),
            Err(e) => error_response(&e),
        },
        Route::Vote(id, token) => match service.register_vote(id, token) {
            Ok(ack) => text(StatusCode::OK, ack),
            Err(e) => error_response(&e),
        },
        Route::PersistPoll(id) => match service.persist_poll(id) {
            Ok(path) => json(
                StatusCode::CREATED,
                &serde_json::json!({ "path": path.display().to_string() }),
            ),
            Err(e) => error_response(&e),
        },
        Route::ListPacks => match service.pack_metas() {
            Ok(metas) => json(StatusCode::OK, &metas),
            Err(e) => error_response(&e),
        },
        Route::LaunchPack(file) => match service.launch_pack(file) {
            Ok(created) => text(StatusCode::CREATED, created.poll_id.to_string()),
            Err(e) => error_response(&e),
        },
        Route::DeletePack(file) => match service.delete_pack(file) {
            Ok(()) => Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Full::new(Bytes::new()))
                .expect("static response should not fail"),
            Err(e) => error_response(&e),
        },
        Route::NotFound => text(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer: IpAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // guard first: denied and body-less routes never touch the body
    let route = route(&method, &path);
    if let Some(resp) = admit(&state, &route, &method, &path, peer) {
        return Ok(resp);
    }

    let body = if route.reads_body() {
        match read_body(req.into_body()).await {
            Ok(body) => body,
            Err(resp) => return Ok(resp),
        }
    } else {
        Bytes::new()
    };

    Ok(serve(&state, route, &body))
}

/// Collect at most [`MAX_BODY_BYTES`]; larger bodies get 413
async fn read_body<B>(body: B) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(limit = MAX_BODY_BYTES, "request_body_too_large");
            Err(text(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("request body exceeds {MAX_BODY_BYTES} bytes"),
            ))
        }
        Err(e) => {
            warn!(error = %e, "request_body_read_failed");
            Err(text(StatusCode::BAD_REQUEST, "unreadable request body"))
        }
    }
}

/// Start the poll HTTP server
pub async fn start_http_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    info!(addr = %addr, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state, peer.ip()).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_poll_page(view: &PollView) -> String {
    let mut page = String::with_capacity(2048);
    let topic = escape_html(&view.topic);
    let _ = writeln!(page, "<!DOCTYPE html>");
    let _ = writeln!(page, "<html><head><meta charset=\"utf-8\"><title>{topic}</title></head>");
    let _ = writeln!(page, "<body><h1>{topic}</h1><div class=\"options\">");
    for option in [Some(&view.first), view.middle.as_ref(), Some(&view.last)].into_iter().flatten() {
        let _ = writeln!(
            page,
            "<figure><img src=\"/polls/{}/qr/{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>",
            view.poll_id,
            option.code,
            option.code,
            escape_html(&option.text)
        );
    }
    let _ = writeln!(page, "</div></body></html>");
    page
}

const DENIED_PAGE: &str = "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>denied</title></head>\
<body><h1>Access denied</h1><p>This page is only available on the host running the poll.</p></body></html>\n";

const SETUP_PAGE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>New poll</title></head>
<body>
<h1>New poll</h1>
<form id="setup">
<p><input name="topic" placeholder="Topic" required></p>
<p><input name="option" placeholder="Option 1" required></p>
<p><input name="option" placeholder="Option 2" required></p>
<p><input name="option" placeholder="Option 3 (optional)"></p>
<p><button type="submit">Start poll</button></p>
</form>
<script>
document.getElementById("setup").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  const form = new FormData(ev.target);
  const options = form.getAll("option").map((o) => o.trim()).filter((o) => o.length > 0);
  const res = await fetch("/polls", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ topic: form.get("topic"), options }),
  });
  const body = await res.text();
  if (res.ok) { window.location = "/polls/" + body; } else { alert(body); }
});
</script>
</body></html>
"#;
