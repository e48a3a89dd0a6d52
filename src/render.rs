use chrono::{DateTime, Utc};

use crate::discord::{Embed, EmbedField, EmbedFooter, Message, MessageBuilder};
use crate::storage::UptimeWindow;
use crate::{HostIdentity, MetricField, MetricsSnapshot, ProbeOutcome};

pub const COLOR_ONLINE: u32 = 3066993; // Green
pub const COLOR_OFFLINE: u32 = 15158332; // Red

/// Invisible field used to keep the inline grid at two visible columns
const SPACER: &str = "\u{200b}";

fn field(name: impl ToString, value: impl ToString, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.to_string(),
        inline,
    }
}

fn code(value: &str) -> String {
    format!("`{value}`")
}

/// Two inline fields separated by a spacer.
fn pair(fields: &mut Vec<EmbedField>, left: (&str, String), right: (&str, String)) {
    fields.push(field(left.0, left.1, true));
    fields.push(field(SPACER, SPACER, true));
    fields.push(field(right.0, right.1, true));
}

fn uptime_title(window_hours: u32) -> String {
    format!("Uptime ({window_hours}h)")
}

fn last_updated(at: DateTime<Utc>) -> (Option<EmbedFooter>, Option<String>) {
    (
        Some(EmbedFooter {
            text: "Last updated".to_string(),
        }),
        Some(at.to_rfc3339()),
    )
}

pub fn online_embed(
    identity: &HostIdentity,
    snapshot: &MetricsSnapshot,
    window: &UptimeWindow,
    window_hours: u32,
) -> Embed {
    let metric = |metric_field: MetricField| code(snapshot.display(metric_field));

    let mut fields = vec![];
    pair(
        &mut fields,
        ("Host", code(&snapshot.hostname)),
        ("IP", code(&snapshot.address)),
    );
    pair(
        &mut fields,
        ("📊 CPU", metric(MetricField::CpuModel)),
        ("Usage", metric(MetricField::CpuUsage)),
    );
    pair(
        &mut fields,
        ("💾 RAM", metric(MetricField::RamTotal)),
        ("Used", metric(MetricField::RamUsed)),
    );
    pair(
        &mut fields,
        ("💿 Disk", metric(MetricField::DiskTotal)),
        ("Usage", metric(MetricField::DiskUsage)),
    );
    pair(
        &mut fields,
        ("🔄 Processes", metric(MetricField::ProcessCount)),
        ("Load Avg", metric(MetricField::LoadAverage)),
    );

    // only shown once there is history
    if let Some(strip) = window.to_emoji() {
        fields.push(field(uptime_title(window_hours), strip, false));
    }

    let (footer, timestamp) = last_updated(snapshot.captured_at);
    Embed {
        title: Some(format!("🟢 {}", identity.name)),
        description: None,
        color: Some(COLOR_ONLINE),
        fields,
        footer,
        timestamp,
    }
}

pub fn offline_embed(
    identity: &HostIdentity,
    diagnostic: Option<&str>,
    window: &UptimeWindow,
    window_hours: u32,
) -> Embed {
    let mut fields = vec![field("IP", code(&identity.address), false)];
    if let Some(diagnostic) = diagnostic {
        fields.push(field("Error", code(diagnostic), false));
    }
    fields.push(field(uptime_title(window_hours), window, false));

    let (footer, timestamp) = last_updated(Utc::now());
    Embed {
        title: Some(format!("🔴 {}", identity.name)),
        description: Some("**Host is OFFLINE**".to_string()),
        color: Some(COLOR_OFFLINE),
        fields,
        footer,
        timestamp,
    }
}

/// The status message of one host.
pub fn status_message(
    identity: &HostIdentity,
    outcome: &ProbeOutcome,
    window: &UptimeWindow,
    window_hours: u32,
) -> Message {
    let embed = match outcome {
        ProbeOutcome::Online(snapshot) => online_embed(identity, snapshot, window, window_hours),
        ProbeOutcome::Offline { diagnostic } => {
            offline_embed(identity, diagnostic.as_deref(), window, window_hours)
        }
    };

    MessageBuilder::new().add_embed(embed).build()
}
