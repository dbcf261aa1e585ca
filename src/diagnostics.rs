//! HTTP diagnostics adapter (spec.md §4.J, "Diagnostic HTTP interfaces").
//!
//! Only the shape of these routes is part of the core contract: `/gslb/trace`
//! runs a resolve with a step trace, `/gslb/lookup` the same without it, and
//! `/gslb/hc` (alias `/gslb/healthcheck`) dumps health status. Grounded on
//! the teacher's `shelter::http::post_handler` for the actix-web handler
//! shape (plain async fn taking extractors, returning `impl Responder`).

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::dns::trace::TraceSink;
use crate::dns::view::DEFAULT_VIEW;
use crate::state::GlobalState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/gslb/trace/{name}", web::get().to(trace))
        .route("/gslb/trace/{name}/{qtype}", web::get().to(trace))
        .route("/gslb/trace/{name}/{qtype}/{view}", web::get().to(trace))
        .route("/gslb/lookup/{name}", web::get().to(lookup))
        .route("/gslb/lookup/{name}/{qtype}", web::get().to(lookup))
        .route("/gslb/lookup/{name}/{qtype}/{view}", web::get().to(lookup))
        .route("/gslb/hc", web::get().to(health_dump))
        .route("/gslb/healthcheck", web::get().to(health_dump));
}

async fn resolve_for_diagnostics(
    state: &GlobalState,
    name: &str,
    qtype: &str,
    view: &str,
) -> crate::dns::frontend::LookupResult {
    let snapshot = state.snapshot.load();
    state
        .frontend
        .resolve(&snapshot.zone, &state.health, &state.tokens, &state.backend, name, view, qtype)
        .await
}

/// Runs the same resolution as `resolve_for_diagnostics`, bypassing the
/// front-end cache and recording every step into `trace`.
async fn resolve_with_trace(
    state: &GlobalState,
    name: &str,
    qtype: &str,
    view: &str,
    trace: &TraceSink,
) -> crate::dns::frontend::LookupResult {
    let snapshot = state.snapshot.load();
    state
        .frontend
        .resolve_traced(&snapshot.zone, &state.health, &state.tokens, &state.backend, name, view, qtype, trace)
        .await
}

fn render_sections(result: &crate::dns::frontend::LookupResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("aa: {}\nrcode: {:?}\n", result.aa, result.rcode));
    out.push_str("; ANSWER\n");
    for line in &result.answer {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("; AUTHORITY\n");
    for line in &result.authority {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("; ADDITIONAL\n");
    for line in &result.additional {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Full step-by-step trace (spec.md §4.J: "return plain text containing
/// the step-by-step trace"), gated behind `[lookup] debug` (SPEC_FULL.md
/// §12 "debug trace toggle") since the trace exposes internal resolution
/// decisions that an operator may not want on a public endpoint.
async fn trace(req: HttpRequest, state: web::Data<Arc<GlobalState>>) -> impl Responder {
    let (name, qtype, view) = path_parts(&req);
    if !state.debug.load(std::sync::atomic::Ordering::Relaxed) {
        return HttpResponse::Forbidden()
            .content_type("text/plain")
            .body("tracing disabled; set [lookup] debug: yes in server.conf\n");
    }

    let sink = TraceSink::new();
    let result = resolve_with_trace(&state, &name, &qtype, &view, &sink).await;

    let mut body = String::new();
    for line in sink.into_lines() {
        body.push_str("; ");
        body.push_str(&line);
        body.push('\n');
    }
    body.push_str(&render_sections(&result));
    HttpResponse::Ok().content_type("text/plain").body(body)
}

async fn lookup(req: HttpRequest, state: web::Data<Arc<GlobalState>>) -> impl Responder {
    let (name, qtype, view) = path_parts(&req);
    let result = resolve_for_diagnostics(&state, &name, &qtype, &view).await;
    HttpResponse::Ok().content_type("text/plain").body(render_sections(&result))
}

fn path_parts(req: &HttpRequest) -> (String, String, String) {
    let info = req.match_info();
    let name = info.get("name").unwrap_or_default().to_string();
    let qtype = info.get("qtype").unwrap_or("A").to_ascii_uppercase();
    let view = info.get("view").unwrap_or(DEFAULT_VIEW).to_string();
    (name, qtype, view)
}

/// Sorted `(service target): up/down` table (spec.md §4.J).
async fn health_dump(state: web::Data<Arc<GlobalState>>) -> impl Responder {
    let mut rows = state.health.snapshot().await;
    rows.sort();
    let mut body = String::new();
    for (service, target, up) in rows {
        body.push_str(&format!("{} {}: {}\n", service, target, if up { "up" } else { "down" }));
    }
    HttpResponse::Ok().content_type("text/plain").body(body)
}
