use std::collections::BTreeMap;

use bytes::Bytes;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope as OtelScope;
use opentelemetry_proto::tonic::trace::v1::span::SpanKind;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span as OtelSpan};

use rum_common::Attributes;
use rum_export::{ExportError, OtlpEncode, otel_attributes, otel_resource};

use crate::span::{InstrumentationScope, SpanData};

fn decode_id(id: &str) -> Vec<u8> {
    hex::decode(id).unwrap_or_default()
}

impl SpanData {
    fn into_otel(self) -> OtelSpan {
        let start_time_unix_nano = self.start_time.as_nanos();
        let end_time_unix_nano = self
            .end_time
            .map_or(start_time_unix_nano, |end| end.as_nanos());

        OtelSpan {
            trace_id: decode_id(&self.context.trace_id),
            span_id: decode_id(&self.context.span_id),
            parent_span_id: self
                .parent_span_id
                .as_deref()
                .map(decode_id)
                .unwrap_or_default(),
            flags: u32::from(self.context.is_sampled),
            name: self.name,
            kind: SpanKind::Internal as i32,
            start_time_unix_nano,
            end_time_unix_nano,
            attributes: otel_attributes(self.attributes),
            ..Default::default()
        }
    }
}

impl OtlpEncode for SpanData {
    fn encode_batch(batch: Vec<Self>, resource: Attributes) -> Result<Bytes, ExportError> {
        let mut by_scope: BTreeMap<InstrumentationScope, Vec<OtelSpan>> = BTreeMap::new();
        for span in batch {
            by_scope
                .entry(span.scope.clone())
                .or_default()
                .push(span.into_otel());
        }

        let scope_spans = by_scope
            .into_iter()
            .map(|(scope, spans)| ScopeSpans {
                scope: Some(OtelScope {
                    name: scope.name,
                    version: scope.version,
                    ..Default::default()
                }),
                spans,
                ..Default::default()
            })
            .collect();

        let request = ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: Some(otel_resource(resource)),
                scope_spans,
                ..Default::default()
            }],
        };

        Ok(serde_json::to_vec(&request)?.into())
    }
}

#[cfg(test)]
mod tests {
    use rum_common::UnixMillis;

    use super::*;
    use crate::span::SpanContext;

    fn span(name: &str, scope: &str) -> SpanData {
        SpanData {
            name: name.to_owned(),
            context: SpanContext {
                trace_id: "0102030405060708090a0b0c0d0e0f10".to_owned(),
                span_id: "1112131415161718".to_owned(),
                is_sampled: true,
            },
            parent_span_id: None,
            start_time: UnixMillis::from_millis(1_000),
            end_time: Some(UnixMillis::from_millis(1_500)),
            attributes: Attributes::from([("page".to_owned(), "/".into())]),
            scope: InstrumentationScope {
                name: scope.to_owned(),
                version: "1.0".to_owned(),
            },
        }
    }

    #[test]
    fn test_encode_groups_by_scope() {
        let batch = vec![
            span("document load", "document-load"),
            span("record init", "splunk.rr-web"),
            span("click", "document-load"),
        ];
        let resource = Attributes::from([("app".to_owned(), "shop".into())]);

        let body = SpanData::encode_batch(batch, resource).unwrap();
        let request: ExportTraceServiceRequest = serde_json::from_slice(&body).unwrap();

        let resource_spans = &request.resource_spans[0];
        assert_eq!(
            resource_spans.resource.as_ref().unwrap().attributes[0].key,
            "app"
        );

        let scopes: Vec<_> = resource_spans
            .scope_spans
            .iter()
            .map(|s| {
                let names: Vec<_> = s.spans.iter().map(|span| span.name.as_str()).collect();
                (s.scope.as_ref().unwrap().name.as_str(), names)
            })
            .collect();
        assert_eq!(
            scopes,
            vec![
                ("document-load", vec!["document load", "click"]),
                ("splunk.rr-web", vec!["record init"]),
            ]
        );

        let otel = &resource_spans.scope_spans[0].spans[0];
        assert_eq!(otel.trace_id, (1..=16).collect::<Vec<u8>>());
        assert_eq!(otel.span_id, (0x11..=0x18).collect::<Vec<u8>>());
        assert!(otel.parent_span_id.is_empty());
        assert_eq!(otel.start_time_unix_nano, 1_000_000_000);
        assert_eq!(otel.end_time_unix_nano, 1_500_000_000);
        assert_eq!(otel.kind, SpanKind::Internal as i32);
        assert_eq!(otel.attributes[0].key, "page");
    }
}
