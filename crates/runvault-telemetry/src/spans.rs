//! Span helpers for artifact storage calls

use crate::attributes::*;
use std::fmt::Display;
use tracing::Span;

/// Identifies one storage call
#[derive(Debug, Clone)]
pub struct StorageSpanAttributes {
    /// `list`, `get`, `put` or `delete`
    pub operation: &'static str,
    pub scheme: String,
    pub bucket: String,
    pub root_prefix: String,
    pub path: String,
}

/// Create a span for a storage call.
///
/// The outcome field starts empty; fill it with [`record_outcome`] once the
/// call returns.
pub fn storage_span(attrs: &StorageSpanAttributes) -> Span {
    tracing::info_span!(
        "storage_call",
        { STORAGE_OPERATION } = attrs.operation,
        { STORAGE_SCHEME } = %attrs.scheme,
        { STORAGE_BUCKET } = %attrs.bucket,
        { STORAGE_ROOT_PREFIX } = %attrs.root_prefix,
        { STORAGE_PATH } = %attrs.path,
        { STORAGE_OUTCOME } = tracing::field::Empty,
    )
}

/// Record `ok` or the error message on a span made by [`storage_span`].
pub fn record_outcome<T, E: Display>(span: &Span, result: &Result<T, E>) {
    match result {
        Ok(_) => {
            span.record(STORAGE_OUTCOME, "ok");
        }
        Err(err) => {
            span.record(STORAGE_OUTCOME, tracing::field::display(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    fn attrs() -> StorageSpanAttributes {
        StorageSpanAttributes {
            operation: "list",
            scheme: "s3".to_string(),
            bucket: "bucket".to_string(),
            root_prefix: "exp1".to_string(),
            path: "models".to_string(),
        }
    }

    /// Collects every span field value as `(name, value)`
    #[derive(Clone, Default)]
    struct FieldCapture {
        values: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl FieldCapture {
        fn values_of(&self, name: &str) -> Vec<String> {
            self.values
                .lock()
                .unwrap()
                .iter()
                .filter(|(field, _)| field == name)
                .map(|(_, value)| value.clone())
                .collect()
        }
    }

    struct Collect<'a>(&'a mut Vec<(String, String)>);

    impl Visit for Collect<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for FieldCapture {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            let mut values = self.values.lock().unwrap();
            attrs.record(&mut Collect(&mut values));
        }

        fn on_record(&self, _id: &Id, record: &Record<'_>, _ctx: Context<'_, S>) {
            let mut values = self.values.lock().unwrap();
            record.record(&mut Collect(&mut values));
        }
    }

    #[test]
    fn test_storage_span_records_outcome() {
        let capture = FieldCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let span = storage_span(&attrs());
            assert!(capture.values_of(STORAGE_OUTCOME).is_empty());

            let ok: Result<(), String> = Ok(());
            record_outcome(&span, &ok);

            let err: Result<(), String> = Err("denied".to_string());
            record_outcome(&span, &err);
        });

        assert_eq!(capture.values_of(STORAGE_OPERATION), vec!["list"]);
        assert_eq!(capture.values_of(STORAGE_SCHEME), vec!["s3"]);
        assert_eq!(capture.values_of(STORAGE_PATH), vec!["models"]);
        assert_eq!(capture.values_of(STORAGE_OUTCOME), vec!["ok", "denied"]);
    }

    #[tokio::test]
    async fn test_storage_span_instruments_future() {
        use tracing::Instrument;

        let span = storage_span(&attrs());
        let value = async { 42 }.instrument(span.clone()).await;
        assert_eq!(value, 42);
    }
}
