use serde::Deserialize;

use super::{InstanceRecord, MAX_INSTANCES, UNKNOWN_FLAG};

/// Minimum reported uptime for an instance to be offered
pub const MIN_UPTIME: f64 = 80.0;

/// One `[domain, info]` pair of the directory listing
pub type DirectoryEntry = (String, Option<InstanceInfo>);

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceInfo {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub uri: Option<String>,
    pub flag: Option<String>,
    pub monitor: Option<Monitor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Monitor {
    pub down: Option<bool>,
    pub uptime: Option<f64>,
}

pub fn parse_directory(body: &str) -> serde_json::Result<Vec<DirectoryEntry>> {
    serde_json::from_str(body)
}

/// Keep instances that are up over https, best uptime first
pub fn healthy_instances(entries: Vec<DirectoryEntry>) -> Vec<InstanceRecord> {
    let mut healthy: Vec<InstanceRecord> = entries
        .into_iter()
        .filter_map(|(domain, info)| {
            let info = info?;
            let monitor = info.monitor.as_ref()?;
            let uptime = monitor.uptime?;
            if info.kind.as_deref() != Some("https")
                || monitor.down != Some(false)
                || uptime.is_nan()
                || uptime <= MIN_UPTIME
            {
                return None;
            }
            Some(InstanceRecord {
                url: info.uri?,
                name: domain,
                flag: info.flag.unwrap_or_else(|| UNKNOWN_FLAG.into()),
                uptime_percent: Some(uptime.round()),
            })
        })
        .collect();

    healthy.sort_by(|a, b| {
        let a = a.uptime_percent.unwrap_or_default();
        let b = b.uptime_percent.unwrap_or_default();
        b.total_cmp(&a)
    });
    healthy.truncate(MAX_INSTANCES);
    healthy
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn entry(domain: &str, kind: &str, down: bool, uptime: f64) -> String {
        format!(
            r#"["{domain}", {{"type": "{kind}", "uri": "https://{domain}", "flag": "🇩🇪",
                "monitor": {{"down": {down}, "uptime": {uptime}}}}}]"#
        )
    }

    fn listing(entries: &[String]) -> Vec<DirectoryEntry> {
        parse_directory(&format!("[{}]", entries.join(","))).unwrap()
    }

    #[test]
    fn filters_unhealthy() {
        let entries = listing(&[
            entry("good.example", "https", false, 99.1),
            entry("onion.example", "onion", false, 99.9),
            entry("down.example", "https", true, 99.9),
            entry("flaky.example", "https", false, 80.0),
            r#"["nomonitor.example", {"type": "https", "uri": "https://nomonitor.example", "monitor": null}]"#.into(),
            r#"["null.example", null]"#.into(),
        ]);
        let healthy = healthy_instances(entries);
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].name, "good.example");
        assert_eq!(healthy[0].url, "https://good.example");
        assert_eq!(healthy[0].flag, "🇩🇪");
        assert_abs_diff_eq!(healthy[0].uptime_percent.unwrap(), 99.0);
    }

    #[test]
    fn sorted_by_uptime() {
        let entries = listing(&[
            entry("b.example", "https", false, 90.0),
            entry("a.example", "https", false, 99.6),
            entry("c.example", "https", false, 95.0),
            entry("d.example", "https", false, 90.2),
        ]);
        let names: Vec<_> = healthy_instances(entries).into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a.example", "c.example", "b.example", "d.example"]);
    }

    #[test]
    fn truncated_to_twenty() {
        let entries: Vec<_> = (0..30)
            .map(|i| entry(&format!("i{i}.example"), "https", false, 81.0 + i as f64 / 2.0))
            .collect();
        let healthy = healthy_instances(listing(&entries));
        assert_eq!(healthy.len(), MAX_INSTANCES);
        assert_eq!(healthy[0].name, "i29.example");
    }

    #[test]
    fn missing_flag_is_unknown() {
        let entries = parse_directory(
            r#"[["x.example", {"type": "https", "uri": "https://x.example",
                "monitor": {"down": false, "uptime": 100}}]]"#,
        )
        .unwrap();
        assert_eq!(healthy_instances(entries)[0].flag, UNKNOWN_FLAG);
    }

    #[test]
    fn malformed_payload() {
        assert!(parse_directory("<html>oops</html>").is_err());
        assert!(parse_directory(r#"{"yewtu.be": {}}"#).is_err());
        assert!(parse_directory(r#"[["yewtu.be"]]"#).is_err());
    }
}
