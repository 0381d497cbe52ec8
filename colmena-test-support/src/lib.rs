//! Shared test utilities used across colmena crates.

pub mod ci;

pub mod tracing {
    //! A capturing layer for asserting spans and events in tests.

    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex, PoisonError},
    };

    use tracing::{
        Event, Level, Subscriber,
        field::{Field, Visit},
        span::{Attributes, Id},
    };
    use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

    /// Layer that keeps every closed span and every event it observes.
    ///
    /// # Examples
    /// ```
    /// use colmena_test_support::tracing::RecordingLayer;
    /// use tracing_subscriber::layer::SubscriberExt;
    ///
    /// let layer = RecordingLayer::default();
    /// let subscriber = tracing_subscriber::registry().with(layer.clone());
    /// tracing::subscriber::with_default(subscriber, || {
    ///     tracing::info!(pages = 3, "scanned");
    /// });
    /// let events = layer.events();
    /// assert_eq!(events[0].fields["pages"], "3");
    /// assert_eq!(events[0].message(), Some("scanned"));
    /// ```
    #[derive(Clone, Default)]
    pub struct RecordingLayer {
        spans: Arc<Mutex<Vec<SpanRecord>>>,
        events: Arc<Mutex<Vec<EventRecord>>>,
    }

    impl RecordingLayer {
        /// Returns the closed spans in closing order.
        #[must_use]
        pub fn spans(&self) -> Vec<SpanRecord> {
            self.spans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Returns the recorded events in emission order.
        #[must_use]
        pub fn events(&self) -> Vec<EventRecord> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Returns `true` when a span called `name` has closed.
        #[must_use]
        pub fn saw_span(&self, name: &str) -> bool {
            self.spans().iter().any(|span| span.name == name)
        }
    }

    /// A closed span and the fields recorded against it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SpanRecord {
        /// Span name from its metadata.
        pub name: String,
        /// Fields recorded at creation or later.
        pub fields: HashMap<String, String>,
    }

    /// An emitted event.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EventRecord {
        /// Event level.
        pub level: Level,
        /// Event target, usually the emitting module path.
        pub target: String,
        /// Structured fields, including `message`.
        pub fields: HashMap<String, String>,
    }

    impl EventRecord {
        /// Returns the formatted event message, if any.
        #[must_use]
        pub fn message(&self) -> Option<&str> {
            self.fields.get("message").map(String::as_str)
        }
    }

    struct PendingSpan(SpanRecord);

    impl<S> Layer<S> for RecordingLayer
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            let mut record = SpanRecord {
                name: attrs.metadata().name().to_owned(),
                fields: HashMap::new(),
            };
            attrs.record(&mut Fields(&mut record.fields));
            span.extensions_mut().insert(PendingSpan(record));
        }

        fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            if let Some(PendingSpan(record)) = span.extensions_mut().get_mut::<PendingSpan>() {
                values.record(&mut Fields(&mut record.fields));
            }
        }

        fn on_close(&self, id: Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(&id) else {
                return;
            };
            if let Some(PendingSpan(record)) = span.extensions_mut().remove::<PendingSpan>() {
                self.spans
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(record);
            }
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut Fields(&mut fields));
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(EventRecord {
                    level: *event.metadata().level(),
                    target: event.metadata().target().to_owned(),
                    fields,
                });
        }
    }

    struct Fields<'a>(&'a mut HashMap<String, String>);

    impl Visit for Fields<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.0.insert(field.name().to_owned(), value.to_string());
        }

        fn record_i64(&mut self, field: &Field, value: i64) {
            self.0.insert(field.name().to_owned(), value.to_string());
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.0.insert(field.name().to_owned(), value.to_string());
        }
    }
}
