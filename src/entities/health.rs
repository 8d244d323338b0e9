use std::time::Instant;

use crate::sources::biolink::BiolinkClient;

const HEALTH_QUERY: &str = "TP53";

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub ok: bool,
    pub latency_ms: f64,
    pub detail: String,
}

impl HealthReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": self.ok,
            "latency_ms": self.latency_ms,
            "detail": self.detail,
        })
    }

    pub fn to_markdown(&self) -> String {
        let status = if self.ok { "ok" } else { "error" };
        let mut out = String::new();
        out.push_str("# Biolink MCP Health Check\n\n");
        out.push_str("| API | Status | Latency | Detail |\n");
        out.push_str("|-----|--------|---------|--------|\n");
        out.push_str(&format!(
            "| Biolink API | {status} | {}ms | {} |\n",
            self.latency_ms,
            self.detail.replace('|', "\\|")
        ));
        out
    }
}

/// Pings the search endpoint and reports basic health and latency. Never fails.
pub(crate) async fn check(client: &BiolinkClient) -> HealthReport {
    let start = Instant::now();
    let result = client.search_entities(HEALTH_QUERY, 1, 0).await;
    let latency_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

    match result {
        Ok(_) => HealthReport {
            ok: true,
            latency_ms,
            detail: "ok".into(),
        },
        Err(err) => {
            tracing::warn!(base = client.base_url(), "Biolink health check failed: {err}");
            HealthReport {
                ok: false,
                latency_ms,
                detail: format!("{}: {err}", err.kind()),
            }
        }
    }
}
