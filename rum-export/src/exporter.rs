use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use opentelemetry_proto::tonic::common::v1::any_value::Value as OtelValue;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource as OtelResource;

use rum_common::{AttributeValue, Attributes, Resource};

use crate::error::ExportError;
use crate::transport::{ExportRequest, Transport};

/// Receives flushed batches from a [`BatchProcessor`](crate::BatchProcessor).
///
/// Errors are logged by the batch processor and never reach the producer of the records.
pub trait Exporter<T>: Send + Sync + 'static {
    /// Exports a batch of records.
    fn export(&self, batch: Vec<T>) -> impl Future<Output = Result<(), ExportError>> + Send;
}

/// Provides resource attributes, looked up once per exported batch.
pub trait ResourceAttributes: Send + Sync {
    /// Returns the current resource attributes.
    fn resource_attributes(&self) -> Attributes;
}

impl ResourceAttributes for Resource {
    fn resource_attributes(&self) -> Attributes {
        self.snapshot()
    }
}

/// Adapts a closure to [`ResourceAttributes`].
pub struct FnResource<F>(pub F);

impl<F> ResourceAttributes for FnResource<F>
where
    F: Fn() -> Attributes + Send + Sync,
{
    fn resource_attributes(&self) -> Attributes {
        (self.0)()
    }
}

/// Encodes a batch of records into an OTLP JSON export request.
pub trait OtlpEncode: Sized {
    /// Encodes the batch together with the resource attributes.
    fn encode_batch(batch: Vec<Self>, resource: Attributes) -> Result<Bytes, ExportError>;
}

/// Converts a rum attribute value into an OTLP value.
pub fn otel_value(value: AttributeValue) -> AnyValue {
    let value = match value {
        AttributeValue::Bool(b) => OtelValue::BoolValue(b),
        AttributeValue::Int(i) => OtelValue::IntValue(i),
        AttributeValue::Double(d) => OtelValue::DoubleValue(d),
        AttributeValue::String(s) => OtelValue::StringValue(s),
    };

    AnyValue { value: Some(value) }
}

/// Converts rum attributes into OTLP key values, ordered by key.
pub fn otel_attributes(attributes: Attributes) -> Vec<KeyValue> {
    attributes
        .into_iter()
        .map(|(key, value)| KeyValue {
            key,
            value: Some(otel_value(value)),
        })
        .collect()
}

/// Converts resource attributes into an OTLP resource.
pub fn otel_resource(attributes: Attributes) -> OtelResource {
    OtelResource {
        attributes: otel_attributes(attributes),
        ..Default::default()
    }
}

/// Exports batches as OTLP JSON over a [`Transport`].
pub struct OtlpExporter<T> {
    url: String,
    headers: BTreeMap<String, String>,
    transport: Arc<dyn Transport>,
    resource: Arc<dyn ResourceAttributes>,
    _record: PhantomData<fn(T)>,
}

impl<T> OtlpExporter<T> {
    /// Creates an exporter sending to `url`.
    pub fn new(
        url: String,
        headers: BTreeMap<String, String>,
        transport: Arc<dyn Transport>,
        resource: Arc<dyn ResourceAttributes>,
    ) -> Self {
        Self {
            url,
            headers,
            transport,
            resource,
            _record: PhantomData,
        }
    }

    /// Returns the collector URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<T> fmt::Debug for OtlpExporter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpExporter")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> Exporter<T> for OtlpExporter<T>
where
    T: OtlpEncode + Send + 'static,
{
    fn export(&self, batch: Vec<T>) -> impl Future<Output = Result<(), ExportError>> + Send {
        let len = batch.len();
        let request = T::encode_batch(batch, self.resource.resource_attributes()).map(|body| {
            ExportRequest {
                url: self.url.clone(),
                headers: self.headers.clone(),
                body,
            }
        });

        let transport = Arc::clone(&self.transport);
        async move {
            let request = request?;
            rum_log::trace!(
                url = request.url,
                size = request.body.len(),
                "sending batch of {len} records"
            );
            transport.send(request).await?;
            Ok(())
        }
    }
}
