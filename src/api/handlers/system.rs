use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Write;

use crate::api::{state::AppState, types::*};
use crate::monitor::SystemHealthSnapshot;

/// GET /health -- liveness of the orchestrator itself
pub async fn liveness_handler(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "healthy".to_string(),
        service: "vigil".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_seconds(),
        cycle: state.orchestrator.cycle(),
    })
}

/// GET /api/system/health -- best-effort snapshot, never an error
pub async fn get_system_health(State(state): State<AppState>) -> Json<SystemHealthSnapshot> {
    Json(state.orchestrator.snapshot().await)
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Prometheus metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.orchestrator.snapshot().await;
    let summary = &snapshot.summary;

    let mut metrics = format!(
        r#"# HELP vigil_up Orchestrator liveness
# TYPE vigil_up gauge
vigil_up 1

# HELP vigil_uptime_seconds Uptime in seconds
# TYPE vigil_uptime_seconds counter
vigil_uptime_seconds {}

# HELP vigil_cycles_total Probe cycles started
# TYPE vigil_cycles_total counter
vigil_cycles_total {}

# HELP vigil_health_score Overall health score (healthy + 0.5 * degraded) / total
# TYPE vigil_health_score gauge
vigil_health_score {}

# HELP vigil_dependencies Registered dependencies by status at the last completed cycle
# TYPE vigil_dependencies gauge
vigil_dependencies{{status="healthy"}} {}
vigil_dependencies{{status="degraded"}} {}
vigil_dependencies{{status="unhealthy"}} {}
vigil_dependencies{{status="unknown"}} {}
"#,
        state.uptime_seconds(),
        state.orchestrator.cycle(),
        summary.overall_score,
        summary.healthy,
        summary.degraded,
        summary.unhealthy,
        summary.unknown,
    );

    metrics.push_str(
        "\n# HELP vigil_dependency_status Dependency status (1=healthy, 0=degraded, -1=unhealthy, -2=unknown)\n# TYPE vigil_dependency_status gauge\n",
    );
    for dep in &snapshot.dependencies {
        let _ = writeln!(
            metrics,
            "vigil_dependency_status{{dependency=\"{}\"}} {}",
            escape_label(&dep.name),
            dep.status.gauge()
        );
    }

    metrics.push_str(
        "\n# HELP vigil_dependency_latency_ms Latency of the latest probe\n# TYPE vigil_dependency_latency_ms gauge\n",
    );
    for dep in &snapshot.dependencies {
        if let Some(ref sample) = dep.sample {
            let _ = writeln!(
                metrics,
                "vigil_dependency_latency_ms{{dependency=\"{}\"}} {}",
                escape_label(&dep.name),
                sample.latency.as_millis()
            );
        }
    }

    metrics.push_str(
        "\n# HELP vigil_circuit_state Circuit breaker state (0=closed, 1=half_open, 2=open)\n# TYPE vigil_circuit_state gauge\n",
    );
    for dep in &snapshot.dependencies {
        let _ = writeln!(
            metrics,
            "vigil_circuit_state{{dependency=\"{}\"}} {}",
            escape_label(&dep.name),
            dep.breaker.state.gauge()
        );
    }

    metrics.push_str(
        "\n# HELP vigil_circuit_failures Current breaker failure count\n# TYPE vigil_circuit_failures gauge\n",
    );
    for dep in &snapshot.dependencies {
        let _ = writeln!(
            metrics,
            "vigil_circuit_failures{{dependency=\"{}\"}} {}",
            escape_label(&dep.name),
            dep.breaker.failure_count
        );
    }

    metrics.push_str(
        "\n# HELP vigil_circuit_trips_total Times the breaker opened\n# TYPE vigil_circuit_trips_total counter\n",
    );
    for dep in &snapshot.dependencies {
        let _ = writeln!(
            metrics,
            "vigil_circuit_trips_total{{dependency=\"{}\"}} {}",
            escape_label(&dep.name),
            dep.breaker.total_trips
        );
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
