//! data structures for the notifications alertmanager posts to the webhook
use std::collections::BTreeMap;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_with::rust::double_option;

/// the only webhook payload version we understand
pub const SUPPORTED_VERSION: &str = "4";

/// label and annotation sets, serialized with sorted keys
pub type LabelSet = BTreeMap<String, String>;

/// notification sent by alertmanager. Absent fields stay absent and explicit
/// `null`s stay `null` when the notification is encoded again, the only field
/// we add is `@timestamp`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items, clippy::option_option)]
pub struct Notification {
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	alerts: Option<Option<Vec<Alert>>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	common_annotations: Option<Option<LabelSet>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	common_labels: Option<Option<LabelSet>>,
	#[serde(rename = "externalURL", default, with = "double_option", skip_serializing_if = "Option::is_none")]
	external_url: Option<Option<String>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	group_labels: Option<Option<LabelSet>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	receiver: Option<Option<String>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	status: Option<Option<String>>,
	#[serde(default)]
	version: String,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	group_key: Option<Option<String>>,

	/// time the notification was received by us, never read from the request
	#[serde(rename = "@timestamp", skip_deserializing, skip_serializing_if = "Option::is_none")]
	timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items, clippy::option_option)]
struct Alert {
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	annotations: Option<Option<LabelSet>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	ends_at: Option<Option<Rfc3339>>,
	#[serde(rename = "generatorURL", default, with = "double_option", skip_serializing_if = "Option::is_none")]
	generator_url: Option<Option<String>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	labels: Option<Option<LabelSet>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	starts_at: Option<Option<Rfc3339>>,
	#[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
	status: Option<Option<String>>,
}

/// RFC 3339 timestamp which is validated on decode but re-emitted with the
/// exact text alertmanager sent
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
struct Rfc3339(String);

impl<'de> Deserialize<'de> for Rfc3339 {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;

		DateTime::parse_from_rfc3339(&raw)
			.map_err(|err| de::Error::custom(format!("invalid RFC 3339 timestamp {raw:?}: {err}")))?;

		Ok(Self(raw))
	}
}

impl Notification {
	/// webhook payload version, empty if the field was missing
	pub fn version(&self) -> &str {
		&self.version
	}

	/// whether we know how to forward this payload version
	pub fn is_supported_version(&self) -> bool {
		self.version == SUPPORTED_VERSION
	}

	/// labels shared by all alerts, `None` if absent or `null`
	pub fn common_labels(&self) -> Option<&LabelSet> {
		self.common_labels.as_ref().and_then(Option::as_ref)
	}

	pub fn timestamp(&self) -> Option<&str> {
		self.timestamp.as_deref()
	}

	/// record the time the notification was received
	pub fn stamp(&mut self, zone: TimestampZone) {
		self.timestamp = Some(zone.now());
	}
}

/// time zone used for the `@timestamp` field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampZone {
	#[default]
	Local,
	Utc,
}

impl TimestampZone {
	/// current time as RFC 3339 with second precision
	pub fn now(self) -> String {
		match self {
			Self::Local => Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
			Self::Utc => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::{json, Value};

	use super::*;

	fn alertmanager_payload() -> Value {
		json!({
			"version": "4",
			"groupKey": "{}:{alertname=\"HighLoad\"}",
			"status": "firing",
			"receiver": "kafka",
			"groupLabels": {"alertname": "HighLoad"},
			"commonLabels": {"alertname": "HighLoad", "severity": "critical"},
			"commonAnnotations": {"summary": "load is high"},
			"externalURL": "http://alertmanager:9093",
			"alerts": [{
				"status": "firing",
				"labels": {"instance": "node-1:9100", "alertname": "HighLoad"},
				"annotations": {"summary": "load is high"},
				"startsAt": "2022-03-01T12:00:00.123456789+01:00",
				"endsAt": "0001-01-01T00:00:00Z",
				"generatorURL": "http://prometheus:9090/graph?g0.expr=up"
			}]
		})
	}

	#[test]
	fn reencoding_preserves_fields() {
		let input = alertmanager_payload();
		let notification: Notification = serde_json::from_value(input.clone()).unwrap();

		assert!(notification.is_supported_version());
		assert_eq!(serde_json::to_value(&notification).unwrap(), input);
	}

	#[test]
	fn timestamps_are_emitted_verbatim() {
		let notification: Notification = serde_json::from_value(alertmanager_payload()).unwrap();
		let encoded = serde_json::to_string(&notification).unwrap();

		assert!(encoded.contains(r#""startsAt":"2022-03-01T12:00:00.123456789+01:00""#));
		assert!(encoded.contains(r#""endsAt":"0001-01-01T00:00:00Z""#));
	}

	#[test]
	fn invalid_alert_timestamp_is_rejected() {
		let mut input = alertmanager_payload();
		input["alerts"][0]["startsAt"] = json!("yesterday");

		let err = serde_json::from_value::<Notification>(input).unwrap_err();
		assert!(err.to_string().contains("yesterday"));
	}

	#[test]
	fn absent_fields_stay_absent() {
		let input = json!({"version": "4", "status": "firing", "receiver": "r1", "alerts": []});
		let notification: Notification = serde_json::from_value(input.clone()).unwrap();

		assert_eq!(serde_json::to_value(&notification).unwrap(), input);
	}

	#[test]
	fn explicit_nulls_stay_null() {
		let input = json!({
			"version": "4",
			"status": "firing",
			"commonLabels": null,
			"externalURL": null,
			"alerts": [{"status": "resolved", "startsAt": "2022-03-01T12:00:00Z", "endsAt": null, "labels": null}]
		});
		let notification: Notification = serde_json::from_value(input.clone()).unwrap();

		assert_eq!(notification.common_labels(), None);
		assert_eq!(serde_json::to_value(&notification).unwrap(), input);
	}

	#[test]
	fn null_alert_list_stays_null() {
		let input = json!({"version": "4", "alerts": null});
		let notification: Notification = serde_json::from_value(input.clone()).unwrap();

		assert_eq!(serde_json::to_value(&notification).unwrap(), input);
	}

	#[test]
	fn missing_version_is_unsupported() {
		let notification: Notification = serde_json::from_value(json!({"status": "firing"})).unwrap();

		assert_eq!(notification.version(), "");
		assert!(!notification.is_supported_version());
	}

	#[test]
	fn incoming_timestamp_is_ignored() {
		let notification: Notification =
			serde_json::from_value(json!({"version": "4", "@timestamp": "forged"})).unwrap();

		assert_eq!(notification.timestamp(), None);
	}

	#[test]
	fn stamp_adds_rfc3339_timestamp() {
		let mut notification: Notification = serde_json::from_value(json!({"version": "4"})).unwrap();
		let before = Utc::now();
		notification.stamp(TimestampZone::Utc);

		let stamped = DateTime::parse_from_rfc3339(notification.timestamp().unwrap()).unwrap();
		assert!((stamped.with_timezone(&Utc) - before).num_seconds().abs() <= 1);

		let encoded = serde_json::to_value(&notification).unwrap();
		assert_eq!(encoded["@timestamp"], json!(notification.timestamp().unwrap()));
	}

	#[test]
	fn timestamp_zone_from_settings() {
		let zone: TimestampZone = serde_json::from_value(json!("utc")).unwrap();
		assert_eq!(zone, TimestampZone::Utc);
		assert!(serde_json::from_value::<TimestampZone>(json!("mars")).is_err());
	}
}
