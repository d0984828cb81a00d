pub mod api;
pub mod directory;
pub mod resolver;
pub mod select;

use serde::{Deserialize, Serialize};

pub static DEFAULT_INSTANCE: &str = "https://yewtu.be";
pub static UNKNOWN_FLAG: &str = "unknown";

/// Maximum number of ranked instances kept from the directory
pub const MAX_INSTANCES: usize = 20;

/// One Invidious instance that videos can be redirected to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub url: String,
    pub name: String,
    #[serde(default = "unknown_flag")]
    pub flag: String,
    #[serde(default, rename = "uptime", skip_serializing_if = "Option::is_none")]
    pub uptime_percent: Option<f64>,
}

fn unknown_flag() -> String {
    UNKNOWN_FLAG.into()
}

impl InstanceRecord {
    fn known(url: &str, name: &str, region: &str) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            flag: region.into(),
            uptime_percent: None,
        }
    }
}

/// Instances used when the directory can't be reached
pub fn fallback_instances() -> Vec<InstanceRecord> {
    vec![
        InstanceRecord::known("https://yewtu.be", "yewtu.be", "US"),
        InstanceRecord::known("https://inv.nadeko.net", "inv.nadeko.net", "GB"),
        InstanceRecord::known("https://invidious.fdn.fr", "invidious.fdn.fr", "FR"),
        InstanceRecord::known(
            "https://invidious.privacydev.net",
            "invidious.privacydev.net",
            "US",
        ),
        InstanceRecord::known("https://vid.puffyan.us", "vid.puffyan.us", "US"),
    ]
}

pub fn build_redirect_url(video_id: &str, instance_url: &str) -> String {
    format!("{instance_url}/watch?v={video_id}")
}

/// Display name for an instance URL when none was saved
pub fn name_from_url(instance_url: &str) -> String {
    url::Url::parse(instance_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| instance_url.to_owned())
}
