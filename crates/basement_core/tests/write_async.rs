mod common;

use basement_core::{
    Container, ContainerError, HandleCache, OpenError, TransactionError, Value, WorkQueue,
};
use common::{add_person, age_of, file_config};
use std::sync::mpsc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn release_on(queue: &WorkQueue) {
    queue.sync(HandleCache::release);
}

#[test]
fn write_async_does_not_run_on_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);
    let queue = WorkQueue::new("test.async.gate").unwrap();

    let (open_gate, gate) = mpsc::channel::<()>();
    queue.dispatch(move || {
        let _ = gate.recv();
    });

    container.write_async(
        &ann,
        Some(&queue),
        |ann, tx| tx.set(ann, "age", 31_i64),
        |err| panic!("unexpected write failure: {err}"),
    );
    assert_eq!(age_of(&ann), 30);

    open_gate.send(()).unwrap();
    queue.sync(|| ()).unwrap();
    assert_eq!(age_of(&ann), 31);
    release_on(&queue);
}

#[test]
fn writes_on_one_queue_apply_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);
    let queue = WorkQueue::new("test.async.order").unwrap();

    for index in 0..10 {
        container.write_async(
            &ann,
            Some(&queue),
            move |ann, tx| {
                let mut tags = ann.values("tags")?;
                tags.push(Value::from(index.to_string()));
                tx.set_values(ann, "tags", tags)
            },
            |err| panic!("unexpected write failure: {err}"),
        );
    }
    queue.sync(|| ()).unwrap();

    let expected: Vec<Value> = (0..10).map(|index| Value::from(index.to_string())).collect();
    assert_eq!(ann.values("tags").unwrap(), expected);
    release_on(&queue);
}

#[test]
fn deleted_object_is_reported_to_handler_on_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);
    let queue = WorkQueue::new("test.async.invalidated").unwrap();

    let (gate_tx, gate) = mpsc::channel::<()>();
    queue.dispatch(move || {
        let _ = gate.recv();
    });

    let (report, reports) = mpsc::channel();
    let observer = queue.clone();
    container.write_async(
        &ann,
        Some(&queue),
        |ann, tx| tx.set(ann, "age", 31_i64),
        move |err| {
            let _ = report.send((observer.is_current(), err));
        },
    );
    container.write_with(&ann, |ann, tx| tx.delete(ann)).unwrap();
    gate_tx.send(()).unwrap();

    let (on_queue, err) = reports.recv_timeout(WAIT).unwrap();
    assert!(on_queue);
    assert!(matches!(
        err,
        ContainerError::Transaction(TransactionError::ObjectInvalidated { .. })
    ));
    release_on(&queue);
}

#[test]
fn failed_async_block_rolls_back_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);
    let queue = WorkQueue::new("test.async.abort").unwrap();

    let (report, reports) = mpsc::channel();
    container.write_async(
        &ann,
        Some(&queue),
        |ann, tx| {
            tx.set(ann, "age", 99_i64)?;
            Err(TransactionError::abort("rejected"))
        },
        move |err| {
            let _ = report.send(err);
        },
    );

    let err = reports.recv_timeout(WAIT).unwrap();
    assert!(matches!(
        err,
        ContainerError::Transaction(TransactionError::Aborted(_))
    ));
    assert_eq!(age_of(&ann), 30);
    release_on(&queue);
}

#[test]
fn open_failure_on_the_queue_goes_to_handler() {
    let dir = tempfile::tempdir().unwrap();
    let newer = Container::new(file_config(dir.path()).with_schema_version(2));
    let ann = add_person(&newer, "ann", "Ann", 30);
    let older = Container::new(file_config(dir.path()).with_schema_version(1));
    let queue = WorkQueue::new("test.async.open").unwrap();

    let (report, reports) = mpsc::channel();
    older.write_async(
        &ann,
        Some(&queue),
        |ann, tx| tx.set(ann, "age", 31_i64),
        move |err| {
            let _ = report.send(err);
        },
    );

    let err = reports.recv_timeout(WAIT).unwrap();
    assert!(matches!(
        err,
        ContainerError::Open(OpenError::SchemaVersionMismatch {
            on_disk: 2,
            requested: 1
        })
    ));
    assert_eq!(age_of(&ann), 30);
}

#[test]
fn container_queue_is_used_when_none_is_given() {
    let dir = tempfile::tempdir().unwrap();
    let queue = WorkQueue::new("test.async.default").unwrap();
    let container = Container::with_queue(file_config(dir.path()), queue.clone());
    let ann = add_person(&container, "ann", "Ann", 30);

    let (report, reports) = mpsc::channel();
    let observer = queue.clone();
    container.write_async(
        &ann,
        None,
        move |ann, tx| {
            let _ = report.send(observer.is_current());
            tx.set(ann, "age", 31_i64)
        },
        |err| panic!("unexpected write failure: {err}"),
    );

    assert!(reports.recv_timeout(WAIT).unwrap());
    queue.sync(|| ()).unwrap();
    assert_eq!(age_of(&ann), 31);
    release_on(&queue);
}

#[test]
fn background_queue_is_the_last_resort() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);

    let (report, reports) = mpsc::channel();
    container.write_async(
        &ann,
        None,
        move |ann, tx| {
            let _ = report.send(WorkQueue::background().unwrap().is_current());
            tx.set(ann, "age", 31_i64)
        },
        |err| panic!("unexpected write failure: {err}"),
    );

    assert!(reports.recv_timeout(WAIT).unwrap());
    release_on(WorkQueue::background().unwrap());
    assert_eq!(age_of(&ann), 31);
}
