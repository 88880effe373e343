//! HTTP health gating for module dependencies (§4.7 Start, step 1).

use std::net::IpAddr;
use std::time::Duration;

use discopanel_types::HealthCheckSpec;
use tracing::debug;

/// Polls `http://{ip}:{port}{path}` on `spec.interval_seconds`, up to
/// `spec.retries` attempts, until a `2xx`/`3xx` response, `spec.retries` is
/// exhausted, or `dependency_timeout` (the caller's declared
/// `ModuleDependency.timeout_seconds`, the deadline for this specific
/// dependency edge — not the dependency's own `HealthCheckSpec`) elapses,
/// whichever comes first.
pub async fn wait_until_healthy(ip: IpAddr, port: u16, path: &str, spec: HealthCheckSpec, dependency_timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(spec.timeout_seconds.max(1))).build() {
        Ok(c) => c,
        Err(_) => reqwest::Client::new(),
    };
    let url = format!("http://{ip}:{port}{path}");
    let deadline = tokio::time::Instant::now() + dependency_timeout;

    for attempt in 0..=spec.retries {
        match client.get(&url).send().await {
            Ok(resp) if (200..400).contains(&resp.status().as_u16()) => return true,
            Ok(resp) => debug!(%url, status = %resp.status(), attempt, "health check not yet passing"),
            Err(e) => debug!(%url, error = %e, attempt, "health check request failed"),
        }
        if tokio::time::Instant::now() >= deadline {
            debug!(%url, attempt, "health check dependency timeout elapsed");
            break;
        }
        if attempt < spec.retries {
            tokio::time::sleep(Duration::from_secs(spec.interval_seconds)).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_never_reports_healthy() {
        let spec = HealthCheckSpec {
            interval_seconds: 0,
            retries: 1,
            timeout_seconds: 1,
        };
        let healthy = wait_until_healthy("127.0.0.1".parse().unwrap(), 1, "/health", spec, Duration::from_secs(5)).await;
        assert!(!healthy);
    }

    #[tokio::test]
    async fn dependency_timeout_cuts_off_before_retries_exhaust() {
        // retries=100 with a 1s interval would normally run for ~100s; the
        // declared dependency timeout must stop it far sooner.
        let spec = HealthCheckSpec {
            interval_seconds: 1,
            retries: 100,
            timeout_seconds: 1,
        };
        let start = tokio::time::Instant::now();
        let healthy = wait_until_healthy("127.0.0.1".parse().unwrap(), 1, "/health", spec, Duration::from_millis(50)).await;
        assert!(!healthy);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
