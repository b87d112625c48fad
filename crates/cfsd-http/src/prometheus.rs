//! Prometheus text exposition of the refresh counters.

use cfsd_refresh::RefreshStatus;

fn push_metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
    out.push_str(&format!("{name} {value}\n"));
}

/// Render the controller status in Prometheus text format.
///
/// Last-cycle gauges are only emitted once a cycle has completed.
pub fn render_prometheus(status: &RefreshStatus) -> String {
    let mut out = String::new();

    push_metric(
        &mut out,
        "cfsd_refresh_running",
        "gauge",
        "Whether a refresh cycle is in flight.",
        u64::from(status.is_running()),
    );
    push_metric(
        &mut out,
        "cfsd_refresh_cycles_started_total",
        "counter",
        "Refresh cycles started.",
        status.cycles_started,
    );
    push_metric(
        &mut out,
        "cfsd_refresh_cycles_completed_total",
        "counter",
        "Refresh cycles that published a snapshot.",
        status.cycles_completed,
    );
    push_metric(
        &mut out,
        "cfsd_refresh_cycles_timed_out_total",
        "counter",
        "Refresh cycles abandoned at the cycle deadline.",
        status.cycles_timed_out,
    );
    push_metric(
        &mut out,
        "cfsd_refresh_ticks_skipped_total",
        "counter",
        "Timer ticks dropped while a cycle was in flight.",
        status.ticks_skipped,
    );

    if let Some(last) = &status.last_cycle {
        push_metric(
            &mut out,
            "cfsd_last_cycle_target_groups",
            "gauge",
            "Target groups in the last published snapshot.",
            last.target_groups as u64,
        );
        push_metric(
            &mut out,
            "cfsd_last_cycle_targets",
            "gauge",
            "Scrape targets in the last published snapshot.",
            last.targets as u64,
        );
        push_metric(
            &mut out,
            "cfsd_last_cycle_duration_ms",
            "gauge",
            "Duration of the last published cycle in milliseconds.",
            last.duration_ms,
        );
        push_metric(
            &mut out,
            "cfsd_last_cycle_finished_timestamp_seconds",
            "gauge",
            "Unix time the last snapshot was written.",
            last.finished_at,
        );
    }

    out
}
