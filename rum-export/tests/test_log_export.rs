use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value as OtelValue;
use rum_common::{AttributeValue, Attributes, MemoryStorage, Resource};
use rum_export::{
    BatchConfig, BatchProcessor, FnResource, LogRecord, LogSink, MemoryTransport, OtlpExporter,
    PersistentTransport, TransportError,
};

const URL: &str = "https://rum.example.com/v1/logs";

fn exporter(
    transport: Arc<dyn rum_export::Transport>,
    resource: Resource,
) -> OtlpExporter<LogRecord> {
    OtlpExporter::new(
        URL.to_owned(),
        BTreeMap::from([("Authorization".to_owned(), "secret".to_owned())]),
        transport,
        Arc::new(resource),
    )
}

fn decode(body: &[u8]) -> ExportLogsServiceRequest {
    serde_json::from_slice(body).unwrap()
}

fn bodies(request: &ExportLogsServiceRequest) -> Vec<String> {
    request.resource_logs[0].scope_logs[0]
        .log_records
        .iter()
        .map(|record| match record.body.as_ref().and_then(|b| b.value.as_ref()) {
            Some(OtelValue::StringValue(s)) => s.clone(),
            other => panic!("unexpected body {other:?}"),
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_batches_flow_to_collector() {
    rum_test::setup();

    let transport = MemoryTransport::new();
    let resource = Resource::default();
    resource.set("app", "shop");

    let config = BatchConfig {
        max_export_batch_size: 2,
        scheduled_delay: Duration::from_millis(4_000),
    };
    let processor = BatchProcessor::start(
        config,
        exporter(Arc::new(transport.clone()), resource.clone()),
    );
    let sink: &dyn LogSink = &processor;

    sink.emit(LogRecord::new(1.0, "a", Attributes::new()));
    sink.emit(LogRecord::new(2.0, "b", Attributes::new()));
    // Resource changes apply to batches exported afterwards.
    resource.set("kloudmate.sessionReplay", "rrweb");
    sink.emit(LogRecord::new(3.0, "c", Attributes::new()));

    tokio::time::advance(Duration::from_millis(4_001)).await;
    processor.force_flush().await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.url == URL));
    assert_eq!(requests[0].headers["Authorization"], "secret");

    let first = decode(&requests[0].body);
    let second = decode(&requests[1].body);
    assert_eq!(bodies(&first), vec!["a", "b"]);
    assert_eq!(bodies(&second), vec!["c"]);

    let resource_keys: Vec<_> = second.resource_logs[0]
        .resource
        .as_ref()
        .unwrap()
        .attributes
        .iter()
        .map(|kv| kv.key.as_str())
        .collect();
    assert_eq!(resource_keys, vec!["app", "kloudmate.sessionReplay"]);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_queue_survives_failures() {
    rum_test::setup();

    let network = MemoryTransport::new();
    let storage = MemoryStorage::new();
    let transport = PersistentTransport::new(Arc::new(network.clone()), Arc::new(storage.clone()));

    let resource = FnResource(|| {
        let mut attributes = Attributes::new();
        attributes.insert("app".to_owned(), AttributeValue::from("shop"));
        attributes
    });
    let exporter = OtlpExporter::<LogRecord>::new(
        URL.to_owned(),
        BTreeMap::new(),
        Arc::new(transport.clone()),
        Arc::new(resource),
    );
    let processor = BatchProcessor::start(BatchConfig::default(), exporter);

    network.fail_next(TransportError::Network("offline".to_owned()));
    processor.emit(LogRecord::new(1.0, "lost?", Attributes::new()));
    processor.force_flush().await;

    assert!(network.requests().is_empty());
    assert_eq!(transport.pending(), 1);

    // A later page load picks up the staged request.
    let reloaded = PersistentTransport::new(Arc::new(network.clone()), Arc::new(storage));
    assert_eq!(reloaded.resend_pending().await, 1);

    let requests = network.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(bodies(&decode(&requests[0].body)), vec!["lost?"]);
    assert_eq!(reloaded.pending(), 0);
}
