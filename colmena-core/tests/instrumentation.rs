//! Tracing emitted by long-running operations.

use std::sync::Arc;

use colmena_core::{DisjointSetStruct, MemoryBudget, TerminationToken, Untracked};
use colmena_test_support::tracing::RecordingLayer;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[test]
fn merge_and_count_open_named_spans() {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    tracing::subscriber::with_default(subscriber, || {
        let mut left = DisjointSetStruct::new(6, Arc::new(Untracked)).expect("allocation");
        let mut right = DisjointSetStruct::new(6, Arc::new(Untracked)).expect("allocation");
        right.union(2, 3).expect("in range");
        left.merge(&right).expect("same capacity");
        assert_eq!(left.set_count_with(&|| true).expect("live").completed(), Some(5));
    });

    let spans = layer.spans();
    let merge = spans
        .iter()
        .find(|span| span.name == "colmena.merge")
        .expect("merge span must exist");
    assert_eq!(merge.fields.get("capacity"), Some(&"6".to_owned()));
    assert!(layer.saw_span("colmena.set_count"));
}

#[test]
fn allocation_and_release_are_logged() {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    tracing::subscriber::with_default(subscriber, || {
        let mut dss = DisjointSetStruct::new(10, Arc::new(MemoryBudget::unbounded()))
            .expect("allocation");
        dss.release();
    });

    let events = layer.events();
    let allocated = events
        .iter()
        .filter(|event| event.message() == Some("paged array allocated"))
        .count();
    let released = events
        .iter()
        .filter(|event| event.message() == Some("paged array released"))
        .count();
    assert_eq!((allocated, released), (2, 2));
}

#[test]
fn refusals_warn_with_requested_bytes() {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    tracing::subscriber::with_default(subscriber, || {
        assert!(DisjointSetStruct::new(10, Arc::new(MemoryBudget::new(8))).is_err());
    });

    let events = layer.events();
    let warning = events
        .iter()
        .find(|event| event.level == Level::WARN)
        .expect("refusal must warn");
    assert_eq!(warning.fields.get("requested"), Some(&"80".to_owned()));
    assert_eq!(warning.fields.get("available"), Some(&"8".to_owned()));
}

#[test]
fn termination_is_logged_with_progress() {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let token = TerminationToken::new();
    token.terminate();

    tracing::subscriber::with_default(subscriber, || {
        let mut dss = DisjointSetStruct::new(4, Arc::new(Untracked)).expect("allocation");
        let outcome = dss.set_count_with(&token).expect("live");
        assert!(!outcome.is_completed());
    });

    let events = layer.events();
    let stopped = events
        .iter()
        .find(|event| event.message() == Some("set count terminated"))
        .expect("termination must be logged");
    assert_eq!(stopped.level, Level::INFO);
    assert_eq!(stopped.fields.get("visited"), Some(&"0".to_owned()));
}

#[test]
fn plain_set_count_opens_its_span() {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    tracing::subscriber::with_default(subscriber, || {
        let mut dss = DisjointSetStruct::new(4, Arc::new(Untracked)).expect("allocation");
        dss.union(0, 3).expect("in range");
        assert_eq!(dss.set_count().expect("live"), 3);
    });

    let span = layer
        .spans()
        .into_iter()
        .find(|span| span.name == "colmena.set_count")
        .expect("set count span must exist");
    assert_eq!(span.fields.get("capacity"), Some(&"4".to_owned()));
}
