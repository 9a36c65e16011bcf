use std::time::Duration;

/// Single rounded component in one of: ms, s, m.
pub(crate) fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms >= 60_000 && ms % 60_000 == 0 {
        return format!("{}m", ms / 60_000);
    }
    if ms >= 1_000 {
        return format!("{}s", (ms + 500) / 1_000);
    }
    format!("{ms}ms")
}

pub(crate) fn format_ms(v: f64) -> String {
    if !v.is_finite() {
        return "-".to_string();
    }
    if v >= 1_000.0 {
        format!("{:.2}s", v / 1_000.0)
    } else {
        format!("{v:.2}ms")
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.1}")
    } else {
        "0".to_string()
    }
}
