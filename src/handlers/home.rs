use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use tracing::error;

use crate::audit::{self, AuditEvent, AuditKind, fingerprint};
use crate::error::ApiError;
use crate::gate::Decision;
use crate::metrics::{BLOCKS_TOTAL, DECISIONS, EVALUATE_LATENCY, REQUEST_TOTAL, set_tracked};
use crate::models::MessageResponse;
use crate::rate_limit::whole_seconds;
use crate::state::AppState;

pub async fn home_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    // a header that is not valid text counts as no credential at all
    let credential = headers.get(&state.header).and_then(|v| v.to_str().ok());
    let key_id = credential.map(fingerprint);

    let evaluated = state
        .clock
        .now()
        .and_then(|now| state.gate.evaluate(credential, now).map(|d| (now, d)));

    EVALUATE_LATENCY.observe(start_time.elapsed().as_secs_f64());
    set_tracked(state.gate.tracked());

    let (now, decision) = match evaluated {
        Ok(evaluated) => evaluated,
        Err(e) => {
            // fail closed
            error!(error = %e, "Admission check failed");
            state.audit.record(&AuditEvent::new(
                AuditKind::InternalFailure,
                None,
                key_id.as_deref(),
            ));
            DECISIONS.with_label_values(&["internal_failure"]).inc();
            return Err(ApiError::Internal);
        }
    };

    for event in audit::events_for(&decision, now, key_id.as_deref()) {
        state.audit.record(&event);
    }
    DECISIONS.with_label_values(&[decision.label()]).inc();
    if let Decision::RateLimited { escalated: true, .. } = decision {
        BLOCKS_TOTAL.inc();
    }

    respond(&decision)
}

fn respond(decision: &Decision) -> Result<Json<MessageResponse>, ApiError> {
    match decision {
        Decision::Allowed { .. } => Ok(Json(MessageResponse::running())),
        Decision::Unauthenticated => Err(ApiError::Unauthorized),
        Decision::Blocked { .. } => Err(ApiError::Blocked),
        Decision::RateLimited { retry_after, .. } => Err(ApiError::TooManyRequests {
            retry_after_secs: whole_seconds(*retry_after),
        }),
    }
}
