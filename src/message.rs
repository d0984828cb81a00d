use std::fmt::Write as _;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::instances::InstanceRecord;

pub const HEALTHY: &str = "✓ Connection successful";
pub const UNHEALTHY: &str = "✗ Connection failed";

/// Numbered list of instances, one per line
pub fn format_candidates(candidates: &[InstanceRecord]) -> String {
    let mut out = String::new();
    for (i, c) in candidates.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {}", i + 1, format_instance(c));
    }
    out
}

/// Numbered list of instances with their probe result
pub fn format_probed(results: &[(InstanceRecord, bool)]) -> String {
    let mut out = String::new();
    for (i, (c, healthy)) in results.iter().enumerate() {
        let status = if *healthy { "up" } else { "down" };
        let _ = writeln!(out, "{:>2}. [{status:>4}] {}", i + 1, format_instance(c));
    }
    out
}

fn format_instance(instance: &InstanceRecord) -> String {
    let mut s = format!("{}  {}", instance.name, instance.flag);
    if let Some(uptime) = instance.uptime_percent {
        let _ = write!(s, "  {uptime}%");
    }
    let _ = write!(s, "  {}", instance.url);
    s
}

pub fn format_health(instance_url: &str, healthy: bool) -> String {
    let status = if healthy { HEALTHY } else { UNHEALTHY };
    format!("{instance_url}: {status}")
}

pub fn format_timestamp_ms(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}
