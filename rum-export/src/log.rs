use bytes::Bytes;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value as OtelValue;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope};
use opentelemetry_proto::tonic::logs::v1::{
    LogRecord as OtelLogRecord, ResourceLogs, ScopeLogs,
};

use rum_common::Attributes;
use rum_common::constants::{SDK_NAME, SDK_VERSION};

use crate::error::ExportError;
use crate::exporter::{OtlpEncode, otel_attributes, otel_resource};

/// A log record, such as one chunk of a session recording.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Milliseconds since the UNIX epoch, possibly fractional.
    pub timestamp_ms: f64,
    /// The payload.
    pub body: Bytes,
    /// Record attributes.
    pub attributes: Attributes,
}

impl LogRecord {
    /// Creates a log record.
    pub fn new(timestamp_ms: f64, body: impl Into<Bytes>, attributes: Attributes) -> Self {
        Self {
            timestamp_ms,
            body: body.into(),
            attributes,
        }
    }

    fn time_unix_nano(&self) -> u64 {
        if self.timestamp_ms.is_finite() && self.timestamp_ms > 0.0 {
            (self.timestamp_ms * 1_000_000.0) as u64
        } else {
            0
        }
    }

    fn into_otel(self) -> OtelLogRecord {
        let time_unix_nano = self.time_unix_nano();

        // Chunk boundaries can split multi-byte characters. Such chunks are sent as bytes so that
        // the receiving side can reassemble the exact payload.
        let body = match std::str::from_utf8(&self.body) {
            Ok(body) => OtelValue::StringValue(body.to_owned()),
            Err(_) => OtelValue::BytesValue(self.body.to_vec()),
        };

        OtelLogRecord {
            time_unix_nano,
            observed_time_unix_nano: time_unix_nano,
            body: Some(AnyValue { value: Some(body) }),
            attributes: otel_attributes(self.attributes),
            ..Default::default()
        }
    }
}

impl OtlpEncode for LogRecord {
    fn encode_batch(batch: Vec<Self>, resource: Attributes) -> Result<Bytes, ExportError> {
        let request = ExportLogsServiceRequest {
            resource_logs: vec![ResourceLogs {
                resource: Some(otel_resource(resource)),
                scope_logs: vec![ScopeLogs {
                    scope: Some(InstrumentationScope {
                        name: SDK_NAME.to_owned(),
                        version: SDK_VERSION.to_owned(),
                        ..Default::default()
                    }),
                    log_records: batch.into_iter().map(LogRecord::into_otel).collect(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };

        Ok(serde_json::to_vec(&request)?.into())
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry_proto::tonic::common::v1::KeyValue;
    use rum_common::AttributeValue;

    use super::*;

    fn decode(body: &[u8]) -> ExportLogsServiceRequest {
        serde_json::from_slice(body).unwrap()
    }

    #[test]
    fn test_encode_batch() {
        let mut attributes = Attributes::new();
        attributes.insert("rr-web.chunk".to_owned(), AttributeValue::Int(1));

        let mut resource = Attributes::new();
        resource.insert("app".to_owned(), "shop".into());

        let body = LogRecord::encode_batch(
            vec![LogRecord::new(1_234.5, "{}", attributes)],
            resource,
        )
        .unwrap();

        let request = decode(&body);
        let resource_logs = &request.resource_logs[0];

        let resource = resource_logs.resource.as_ref().unwrap();
        assert_eq!(resource.attributes[0].key, "app");

        let scope_logs = &resource_logs.scope_logs[0];
        assert_eq!(scope_logs.scope.as_ref().unwrap().name, SDK_NAME);

        let record = &scope_logs.log_records[0];
        assert_eq!(record.time_unix_nano, 1_234_500_000);
        assert_eq!(
            record.body,
            Some(AnyValue {
                value: Some(OtelValue::StringValue("{}".to_owned()))
            })
        );
        assert_eq!(
            record.attributes,
            vec![KeyValue {
                key: "rr-web.chunk".to_owned(),
                value: Some(AnyValue {
                    value: Some(OtelValue::IntValue(1))
                }),
            }]
        );
    }

    #[test]
    fn test_split_character_is_sent_as_bytes() {
        let body = "é".as_bytes()[..1].to_vec();
        let record = LogRecord::new(1.0, body.clone(), Attributes::new()).into_otel();

        assert_eq!(
            record.body,
            Some(AnyValue {
                value: Some(OtelValue::BytesValue(body))
            })
        );
    }
}
