//! Notification model and eligibility rules.
//!
//! Source data is loose: ids arrive as `_id` or `id` (sometimes as a Mongo
//! `{"$oid": ..}` wrapper), timestamps as RFC 3339 strings or epoch millis,
//! and any field may be missing. Deserialization never fails on an object;
//! it normalizes into [`Notification`] and leaves unusable fields empty so
//! that the eligibility check rejects them instead.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::CoreError;

/// Display time used when a notification carries no usable `displayDuration`.
pub const DEFAULT_DISPLAY_SECS: u64 = 3;

/// Longest accepted `displayDuration`, in seconds. Longer values count as
/// missing and fall back to the default.
pub const MAX_DISPLAY_SECS: f64 = 24.0 * 60.0 * 60.0;

/// A set of notifications as delivered by one source.
pub type NotificationSet = Vec<Notification>;

/// Visual category. Selects an icon/badge and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    /// Case-insensitive parse; anything unrecognized is `Info`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => NotificationKind::Success,
            "warning" | "warn" => NotificationKind::Warning,
            "error" => NotificationKind::Error,
            _ => NotificationKind::Info,
        }
    }

    /// Badge shown next to the title.
    pub fn badge(&self) -> &'static str {
        match self {
            NotificationKind::Info => "[INFO]",
            NotificationKind::Success => "[OK]",
            NotificationKind::Warning => "[WARN]",
            NotificationKind::Error => "[ERROR]",
        }
    }
}

/// The unit of communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawNotification")]
pub struct Notification {
    /// Normalized identity. `None` means untrackable: always re-shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub kind: NotificationKind,
    /// Only an explicit `false` in source data turns this off.
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Seconds on screen. Non-positive values are dropped at parse time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_duration: Option<f64>,
}

impl Notification {
    /// New active notification with a fresh id and no expiry.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            title: title.into(),
            content: content.into(),
            kind: NotificationKind::Info,
            active: true,
            expires_at: None,
            created_at: Some(Utc::now()),
            display_duration: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = normalize_id(&Value::String(id.into()));
        self
    }

    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_display_secs(mut self, secs: f64) -> Self {
        self.display_duration = valid_display_secs(secs);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Identity, or `UnknownIdentity` for untrackable notifications.
    pub fn require_identity(&self) -> Result<&str, CoreError> {
        self.identity().ok_or_else(|| CoreError::UnknownIdentity {
            title: self.title.clone(),
        })
    }

    /// Active and not yet expired at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_some_and(|at| now < at)
    }

    /// How long to keep this notification on screen.
    pub fn display_for(&self, default: Duration) -> Duration {
        self.display_duration
            .and_then(valid_display_secs)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(default)
    }
}

/// Decode a JSON array into notifications, skipping non-object elements.
pub fn collect_lenient(items: Vec<Value>) -> NotificationSet {
    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// Wire shape accepted from the API and the slot.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNotification {
    #[serde(default, rename = "_id")]
    mongo_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    kind: Option<Value>,
    #[serde(default, rename = "type")]
    legacy_kind: Option<Value>,
    #[serde(default)]
    active: Option<Value>,
    #[serde(default)]
    expires_at: Option<Value>,
    #[serde(default)]
    created_at: Option<Value>,
    #[serde(default)]
    display_duration: Option<Value>,
}

impl From<RawNotification> for Notification {
    fn from(raw: RawNotification) -> Self {
        let id = raw
            .mongo_id
            .as_ref()
            .and_then(normalize_id)
            .or_else(|| raw.id.as_ref().and_then(normalize_id));

        let kind = raw
            .kind
            .as_ref()
            .or(raw.legacy_kind.as_ref())
            .and_then(Value::as_str)
            .map(NotificationKind::parse)
            .unwrap_or_default();

        let display_duration = raw
            .display_duration
            .as_ref()
            .and_then(Value::as_f64)
            .and_then(valid_display_secs);

        Self {
            id,
            title: raw.title.as_ref().map(text_of).unwrap_or_default(),
            content: raw.content.as_ref().map(text_of).unwrap_or_default(),
            kind,
            active: !matches!(raw.active, Some(Value::Bool(false))),
            expires_at: raw.expires_at.as_ref().and_then(parse_timestamp),
            created_at: raw.created_at.as_ref().and_then(parse_timestamp),
            display_duration,
        }
    }
}

fn valid_display_secs(secs: f64) -> Option<f64> {
    (secs > 0.0 && secs <= MAX_DISPLAY_SECS).then_some(secs)
}

fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(normalize_id),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// RFC 3339, naive ISO (taken as UTC), epoch millis, or `{"$date": ..}`.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => map.get("$date").and_then(parse_timestamp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn parse(value: Value) -> Notification {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn mongo_id_takes_precedence() {
        let n = parse(json!({"_id": "abc", "id": "xyz", "title": "t"}));
        assert_eq!(n.identity(), Some("abc"));

        let n = parse(json!({"_id": {"$oid": "65f0c0ffee"}}));
        assert_eq!(n.identity(), Some("65f0c0ffee"));

        let n = parse(json!({"id": 42}));
        assert_eq!(n.identity(), Some("42"));
    }

    #[test]
    fn blank_id_is_untrackable() {
        let n = parse(json!({"id": "   ", "title": "No id"}));
        assert!(n.identity().is_none());
        assert!(matches!(
            n.require_identity(),
            Err(CoreError::UnknownIdentity { .. })
        ));
    }

    #[test]
    fn only_explicit_false_deactivates() {
        assert!(parse(json!({})).active);
        assert!(parse(json!({"active": null})).active);
        assert!(parse(json!({"active": "false"})).active);
        assert!(!parse(json!({"active": false})).active);
    }

    #[test]
    fn eligibility_requires_future_expiry() {
        let now = Utc::now();
        let future = (now + ChronoDuration::minutes(5)).to_rfc3339();
        let past = (now - ChronoDuration::minutes(5)).to_rfc3339();

        assert!(parse(json!({"id": "a", "expiresAt": future})).is_eligible(now));
        assert!(!parse(json!({"id": "b", "expiresAt": past})).is_eligible(now));
        assert!(!parse(json!({"id": "c"})).is_eligible(now));
        assert!(!parse(json!({"id": "d", "expiresAt": "next tuesday"})).is_eligible(now));
        assert!(!parse(json!({"id": "e", "active": false, "expiresAt": future})).is_eligible(now));
    }

    #[test]
    fn expiry_equal_to_now_is_not_eligible() {
        let now = Utc::now();
        let n = Notification::new("t", "c").expiring_at(now);
        assert!(!n.is_eligible(now));
    }

    #[test]
    fn timestamps_accept_several_encodings() {
        let millis = parse(json!({"expiresAt": 1_700_000_000_000i64}));
        assert_eq!(millis.expires_at.unwrap().timestamp(), 1_700_000_000);

        let naive = parse(json!({"expiresAt": "2030-01-02T03:04:05"}));
        assert_eq!(naive.expires_at.unwrap().to_rfc3339(), "2030-01-02T03:04:05+00:00");

        let wrapped = parse(json!({"createdAt": {"$date": "2024-05-01T00:00:00Z"}}));
        assert!(wrapped.created_at.is_some());
    }

    #[test]
    fn kind_reads_type_alias_and_defaults_to_info() {
        assert_eq!(parse(json!({"kind": "Warning"})).kind, NotificationKind::Warning);
        assert_eq!(parse(json!({"type": "success"})).kind, NotificationKind::Success);
        assert_eq!(parse(json!({"type": "sparkly"})).kind, NotificationKind::Info);
        assert_eq!(parse(json!({})).kind, NotificationKind::Info);
    }

    #[test]
    fn display_duration_defaults_when_missing_or_invalid() {
        let default = Duration::from_secs(DEFAULT_DISPLAY_SECS);
        assert_eq!(parse(json!({})).display_for(default), default);
        assert_eq!(parse(json!({"displayDuration": 0})).display_for(default), default);
        assert_eq!(parse(json!({"displayDuration": -4})).display_for(default), default);
        assert_eq!(
            parse(json!({"displayDuration": 1.5})).display_for(default),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn oversized_display_duration_falls_back_to_default() {
        let default = Duration::from_secs(DEFAULT_DISPLAY_SECS);
        let decoded = parse(json!({"id": "big", "displayDuration": 1e20}));
        assert_eq!(decoded.display_duration, None);
        assert_eq!(decoded.display_for(default), default);

        let built = Notification::new("t", "c").with_display_secs(1e30);
        assert_eq!(built.display_duration, None);

        // Set directly, bypassing both constructors.
        let mut raw = Notification::new("t", "c");
        raw.display_duration = Some(1e20);
        assert_eq!(raw.display_for(default), default);
        raw.display_duration = Some(f64::NAN);
        assert_eq!(raw.display_for(default), default);

        let longest = Notification::new("t", "c").with_display_secs(MAX_DISPLAY_SECS);
        assert_eq!(longest.display_for(default), Duration::from_secs(86_400));
    }

    #[test]
    fn serialized_form_reads_back() {
        let expires = Utc::now() + ChronoDuration::hours(1);
        let original = Notification::new("Quiz", "Unit 3 quiz on Friday")
            .with_id("n1")
            .with_kind(NotificationKind::Warning)
            .expiring_at(expires)
            .with_display_secs(5.0);

        let json = serde_json::to_value(&original).unwrap();
        assert_eq!(json["id"], "n1");
        assert_eq!(json["kind"], "warning");
        assert!(json.get("expiresAt").is_some());

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back.identity(), Some("n1"));
        assert_eq!(back.kind, NotificationKind::Warning);
        assert_eq!(back.display_duration, Some(5.0));
    }

    #[test]
    fn collect_lenient_skips_non_objects() {
        let set = collect_lenient(vec![json!({"id": "a"}), json!(7), json!("x"), json!({"id": "b"})]);
        let ids: Vec<_> = set.iter().filter_map(Notification::identity).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
