#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use penumbra::callbacks::{self, after_query_callback, query_callback};
use penumbra::{
    BoxError, Callbacks, Db, InstanceFlag, MemoryExecutor, PenumbraError, ResultSet, Scope, Value,
};

#[derive(Debug, Default, PartialEq)]
struct Item {
    id: i64,
    title: String,
    touched: bool,
}

fn touch(item: &mut Item) -> Result<(), BoxError> {
    item.touched = true;
    Ok(())
}

penumbra::record! {
    Item => "items" {
        id,
        title,
    }
    after_find = touch;
}

fn items() -> ResultSet {
    ResultSet::new(["id", "title"])
        .row([Value::Int(1), "first".into()])
        .row([Value::Int(2), "second".into()])
}

#[test]
fn custom_stage_sees_the_query_results() {
    let exec = Arc::new(MemoryExecutor::new());
    exec.push_result(items());
    let mut db = Db::new(Arc::clone(&exec));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    db.callbacks_mut()
        .query_mut()
        .register("audit", move |scope: &mut Scope<'_>| {
            sink.lock().push((scope.sql().to_owned(), scope.rows_affected()));
        })
        .expect("register");

    assert_eq!(
        db.callbacks().query().names(),
        [callbacks::QUERY, callbacks::PRELOAD, callbacks::AFTER_QUERY, "audit"]
    );

    let mut list: Vec<Item> = Vec::new();
    db.find(&mut list).expect("query");
    assert_eq!(*seen.lock(), [("SELECT * FROM \"items\"".to_owned(), 2)]);
}

#[test]
fn upstream_stage_can_raise_skip_flag() {
    let exec = Arc::new(MemoryExecutor::new());
    let mut chain = Callbacks::empty();
    chain
        .query_mut()
        .register("guard", |scope: &mut Scope<'_>| {
            scope.set_flag(InstanceFlag::SkipQuery);
        })
        .expect("register guard");
    chain
        .query_mut()
        .register(callbacks::QUERY, query_callback)
        .expect("register query");
    let db = Db::builder(Arc::clone(&exec)).with_callbacks(chain).build();

    let mut list: Vec<Item> = Vec::new();
    let outcome = db.query().run(&mut list);

    assert!(outcome.is_ok());
    assert!(outcome.sql.is_empty());
    assert!(exec.statements().is_empty());
}

#[test]
fn replacing_the_query_stage_keeps_its_position() {
    let exec = Arc::new(MemoryExecutor::new());
    let mut db = Db::new(Arc::clone(&exec));
    db.callbacks_mut()
        .query_mut()
        .replace(callbacks::QUERY, |scope: &mut Scope<'_>| {
            scope.add_error(PenumbraError::Statement("read-only replica".into()));
        })
        .expect("replace");

    assert_eq!(db.callbacks().query().names()[0], callbacks::QUERY);

    let mut list: Vec<Item> = Vec::new();
    let err = db.find(&mut list).unwrap_err();
    assert_eq!(err.to_string(), "statement error: read-only replica");
    assert!(exec.statements().is_empty());
}

#[test]
fn removing_after_query_disables_hooks() {
    let exec = Arc::new(MemoryExecutor::new());
    exec.push_result(items()).push_result(items());
    let mut db = Db::new(Arc::clone(&exec));

    let mut list: Vec<Item> = Vec::new();
    db.find(&mut list).expect("query");
    assert!(list.iter().all(|item| item.touched));

    db.callbacks_mut()
        .query_mut()
        .remove(callbacks::AFTER_QUERY)
        .expect("remove");
    db.find(&mut list).expect("query");
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|item| !item.touched));

    let err = db
        .callbacks_mut()
        .query_mut()
        .remove(callbacks::AFTER_QUERY)
        .unwrap_err();
    assert_eq!(err.code(), "UnknownCallback");
}

#[test]
fn stages_after_a_failure_are_still_invoked_but_see_the_error() {
    let exec = Arc::new(MemoryExecutor::new());
    exec.push_error("boom");
    let mut chain = Callbacks::empty();
    chain
        .query_mut()
        .register(callbacks::QUERY, query_callback)
        .expect("register query");
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    chain
        .query_mut()
        .register("observer", move |scope: &mut Scope<'_>| {
            *sink.lock() = scope.error().map(PenumbraError::code);
        })
        .expect("register observer");
    chain
        .query_mut()
        .register(callbacks::AFTER_QUERY, after_query_callback)
        .expect("register after_query");
    let db = Db::builder(Arc::clone(&exec)).with_callbacks(chain).build();

    let mut item = Item::default();
    let err = db.find(&mut item).unwrap_err();

    assert_eq!(err.code(), "Execution");
    assert_eq!(*observed.lock(), Some("Execution"));
    assert!(!item.touched);
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut chains = Callbacks::default();
    let err = chains
        .query_mut()
        .register(callbacks::PRELOAD, |_: &mut Scope<'_>| {})
        .unwrap_err();
    assert_eq!(err.code(), "DuplicateCallback");
    assert_eq!(chains.query().len(), 3);
}
