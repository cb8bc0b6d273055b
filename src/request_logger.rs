use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

use crate::auth::guards::{GateDecision, gate_decision};

/// Fairing to log one line per HTTP request with timing and the caller
/// identity the access gate settled on.
pub struct RequestLogger;

#[derive(Clone, Copy)]
struct RequestStart(Instant);

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(|| RequestStart(Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let duration = request
            .local_cache(|| RequestStart(Instant::now()))
            .0
            .elapsed();

        log::info!(
            "{} {} -> {} ({:.2}ms) [{}]",
            request.method(),
            request.uri(),
            response.status().code,
            duration.as_secs_f64() * 1000.0,
            caller_label(gate_decision(request))
        );
    }
}

fn caller_label(decision: Option<&GateDecision>) -> String {
    match decision {
        Some(GateDecision::Admitted(user)) => format!("user={}", user.id),
        Some(GateDecision::Rejected(reason)) => format!("rejected={reason:?}"),
        None => "anonymous".to_string(),
    }
}
