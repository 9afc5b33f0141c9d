#![allow(missing_docs)]

use std::sync::{Arc, Once};

use parking_lot::Mutex;
use penumbra::{
    BoxError, Config, Db, Direction, MemoryExecutor, PenumbraError, Preloader, ResultSet, Scope,
    Value,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("penumbra=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

#[derive(Debug, Default, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: Option<String>,
}

penumbra::record! {
    User => "users" {
        id,
        name,
        email,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Audited {
    id: i64,
    name: String,
    loaded: bool,
}

fn mark_loaded(record: &mut Audited) -> Result<(), BoxError> {
    if record.name == "bad" {
        return Err(format!("record {} rejected", record.id).into());
    }
    record.loaded = true;
    Ok(())
}

penumbra::record! {
    Audited => "audited" {
        id,
        name,
    }
    after_find = mark_loaded;
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Note {
    body: String,
    author: String,
}

penumbra::record! {
    Note => "notes" {
        body,
        author,
    }
}

fn setup() -> (Arc<MemoryExecutor>, Db) {
    init_tracing();
    let exec = Arc::new(MemoryExecutor::new());
    let db = Db::new(Arc::clone(&exec));
    (exec, db)
}

fn two_users() -> ResultSet {
    ResultSet::new(["id", "name", "email"])
        .row([Value::Int(1), "A".into(), Value::Null])
        .row([Value::Int(2), "B".into(), "b@example.com".into()])
}

#[test]
fn two_rows_fill_a_sequence_in_order() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut users: Vec<User> = Vec::new();
    let outcome = db.query().run(&mut users);

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.rows_affected, 2);
    assert_eq!(outcome.sql, "SELECT * FROM \"users\"");
    assert_eq!(
        users,
        vec![
            User {
                id: 1,
                name: "A".into(),
                email: None,
            },
            User {
                id: 2,
                name: "B".into(),
                email: Some("b@example.com".into()),
            },
        ]
    );
    assert_eq!(exec.opened(), exec.closed());
}

#[test]
fn zero_rows_into_a_single_record_is_not_found() {
    let (exec, db) = setup();
    exec.push_result(ResultSet::new(["id", "name", "email"]));

    let mut user = User {
        id: 7,
        name: "keep".into(),
        email: None,
    };
    let err = db.find(&mut user).unwrap_err();

    assert!(err.is_record_not_found());
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "keep");
    assert_eq!(exec.opened(), exec.closed());
}

#[test]
fn zero_rows_into_a_sequence_is_empty_without_error() {
    let (exec, db) = setup();
    exec.push_result(ResultSet::new(["id", "name", "email"]));

    let mut users = vec![User::default()];
    let rows = db.find(&mut users).expect("empty result is not an error");

    assert_eq!(rows, 0);
    assert!(users.is_empty());
}

#[test]
fn boxed_elements_are_distinct_allocations() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut users: Vec<Box<User>> = Vec::new();
    db.find(&mut users).expect("query");

    assert_eq!(users.len(), 2);
    assert!(!std::ptr::eq(&*users[0], &*users[1]));
    users[0].name.push('!');
    assert_eq!(users[0].name, "A!");
    assert_eq!(users[1].name, "B");
}

#[test]
fn boxed_single_record_is_populated() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut user: Box<User> = Box::default();
    db.find(&mut user).expect("query");
    assert_eq!(user.id, 2);
}

#[test]
fn primary_key_order_appears_exactly_once() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut users: Vec<User> = Vec::new();
    let outcome = db
        .query()
        .order("name")
        .order("\"users\".\"id\" DESC")
        .order_by_primary_key(Direction::Desc)
        .run(&mut users);

    assert!(outcome.is_ok());
    assert_eq!(outcome.sql.matches("\"users\".\"id\" DESC").count(), 1);
    assert_eq!(
        exec.statements()[0].sql,
        "SELECT * FROM \"users\" ORDER BY name,\"users\".\"id\" DESC"
    );
}

#[test]
fn last_uses_descending_primary_key() {
    let (exec, db) = setup();
    exec.push_result(
        ResultSet::new(["id", "name", "email"]).row([Value::Int(9), "Z".into(), Value::Null]),
    );

    let mut user = User::default();
    db.query().last(&mut user).expect("query");

    assert_eq!(user.id, 9);
    assert_eq!(
        exec.statements()[0].sql,
        "SELECT * FROM \"users\" ORDER BY \"users\".\"id\" DESC LIMIT 1"
    );
}

#[test]
fn skip_query_is_a_complete_no_op() {
    let (exec, db) = setup();

    let mut users = vec![User {
        id: 5,
        name: "untouched".into(),
        email: None,
    }];
    let outcome = db
        .query()
        .where_clause("id = ?", [Value::Int(5)])
        .query_option("FOR UPDATE")
        .skip_query()
        .run(&mut users);

    assert!(outcome.is_ok());
    assert!(outcome.sql.is_empty());
    assert!(outcome.params.is_empty());
    assert_eq!(outcome.rows_affected, 0);
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "untouched");
    assert!(exec.statements().is_empty());
}

#[test]
fn only_preload_bypasses_the_query_stage() {
    let (exec, db) = setup();

    let mut user = User::default();
    let outcome = db.query().only_preload().run(&mut user);

    assert!(outcome.is_ok());
    assert!(exec.statements().is_empty());
    assert_eq!(user, User::default());
}

#[test]
fn unmapped_columns_are_ignored() {
    let (exec, db) = setup();
    exec.push_result(
        ResultSet::new(["id", "nickname", "name", "email"])
            .row([Value::Int(1), "ace".into(), "A".into(), Value::Null]),
    );

    let mut users: Vec<User> = Vec::new();
    let outcome = db.query().run(&mut users);

    assert!(outcome.is_ok());
    assert!(outcome.column_errors.is_empty());
    assert_eq!(users[0].name, "A");
}

#[test]
fn query_destination_leaves_the_original_untouched() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let original = User {
        id: 42,
        name: "original".into(),
        email: None,
    };
    let mut users = vec![original.clone()];
    let mut other: Vec<User> = Vec::new();
    let outcome = db.query().destination(&mut other).run(&mut users);

    assert!(outcome.is_ok());
    assert_eq!(users, vec![original]);
    assert_eq!(other.len(), 2);
    assert_eq!(other[1].email.as_deref(), Some("b@example.com"));
}

#[test]
fn query_destination_may_be_a_different_record_type() {
    let (exec, db) = setup();
    exec.push_result(
        ResultSet::new(["id", "name", "email"]).row([Value::Int(3), "C".into(), Value::Null]),
    );

    let mut user = User {
        id: 11,
        name: "original".into(),
        email: None,
    };
    let mut audited = Audited::default();
    let outcome = db.query().destination(&mut audited).run(&mut user);

    assert!(outcome.is_ok());
    assert_eq!(outcome.sql, "SELECT * FROM \"users\"");
    assert_eq!(user.id, 11);
    assert_eq!(user.name, "original");
    assert_eq!(audited.id, 3);
    assert_eq!(audited.name, "C");
    // Hooks follow the scope's own destination, which has none.
    assert!(!audited.loaded);
}

#[test]
fn after_find_runs_on_every_loaded_record() {
    let (exec, db) = setup();
    exec.push_result(
        ResultSet::new(["id", "name"])
            .row([Value::Int(1), "a".into()])
            .row([Value::Int(2), "b".into()]),
    );

    let mut records: Vec<Audited> = Vec::new();
    db.find(&mut records).expect("query");

    assert!(records.iter().all(|r| r.loaded));
}

#[test]
fn after_find_failure_stops_at_first_error() {
    let (exec, db) = setup();
    exec.push_result(
        ResultSet::new(["id", "name"])
            .row([Value::Int(1), "ok".into()])
            .row([Value::Int(2), "bad".into()])
            .row([Value::Int(3), "ok".into()]),
    );

    let mut records: Vec<Audited> = Vec::new();
    let err = db.find(&mut records).unwrap_err();

    assert!(matches!(err, PenumbraError::AfterFind(_)));
    assert_eq!(err.to_string(), "after_find hook failed: record 2 rejected");
    assert_eq!(records.len(), 3);
    assert!(records[0].loaded);
    assert!(!records[2].loaded);
}

#[test]
fn after_find_is_skipped_when_the_query_failed() {
    let (exec, db) = setup();
    exec.push_result(ResultSet::new(["id", "name"]));

    let mut record = Audited::default();
    let err = db.find(&mut record).unwrap_err();

    assert!(err.is_record_not_found());
    assert!(!record.loaded);
}

#[test]
fn iterator_is_closed_on_every_exit_path() {
    let exec = Arc::new(MemoryExecutor::new());
    let db = Db::builder(Arc::clone(&exec))
        .with_config(Config::strict())
        .build();
    exec.push_result(two_users())
        .push_result(two_users().fail_after_rows("connection reset"))
        .push_result(
            ResultSet::new(["id", "name", "email"]).row([Value::Bytes(vec![0xff]), "x".into(), Value::Null]),
        )
        .push_result(ResultSet::new(["id", "name", "email"]));

    let mut users: Vec<User> = Vec::new();
    assert!(db.find(&mut users).is_ok());

    let err = db.find(&mut users).unwrap_err();
    assert_eq!(err.code(), "Execution");
    assert_eq!(users.len(), 2);

    let err = db.find(&mut users).unwrap_err();
    assert!(matches!(err, PenumbraError::Scan { ref column, .. } if column == "id"));

    let mut user = User::default();
    assert!(db.find(&mut user).unwrap_err().is_record_not_found());

    assert_eq!(exec.opened(), 4);
    assert_eq!(exec.closed(), 4);
}

#[test]
fn skip_policy_collects_column_errors() {
    let (exec, db) = setup();
    exec.push_result(
        ResultSet::new(["id", "name", "email"])
            .row([Value::Text("not a number".into()), "A".into(), Value::Null])
            .row([Value::Int(2), "B".into(), Value::Null]),
    );

    let mut users: Vec<User> = Vec::new();
    let outcome = db.query().run(&mut users);

    assert!(outcome.is_ok());
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id, 0);
    assert_eq!(outcome.column_errors.len(), 1);
    assert_eq!(outcome.column_errors[0].column, "id");
}

#[test]
fn query_option_is_appended_with_one_space() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut users: Vec<User> = Vec::new();
    let outcome = db
        .query()
        .where_clause("id > ?", [Value::Int(0)])
        .query_option("FOR UPDATE")
        .run(&mut users);

    assert_eq!(outcome.sql, "SELECT * FROM \"users\" WHERE (id > ?) FOR UPDATE");
    assert_eq!(outcome.params, vec![Value::Int(0)]);
    assert_eq!(exec.statements()[0].sql, outcome.sql);
}

#[test]
fn executor_failure_is_recorded() {
    let (exec, db) = setup();
    exec.push_error("database is locked");

    let mut users: Vec<User> = Vec::new();
    let err = db.find(&mut users).unwrap_err();
    assert_eq!(err.to_string(), "execution error: database is locked");
    assert_eq!(exec.opened(), 0);
}

#[test]
fn unsupported_destination_never_reaches_the_executor() {
    let (exec, db) = setup();

    let mut count = 0i64;
    let err = db.find(&mut count).unwrap_err();

    assert_eq!(err.code(), "UnsupportedDestination");
    assert!(err.to_string().contains("i64"));
    assert!(exec.statements().is_empty());
}

#[test]
fn raw_statement_runs_verbatim() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut users: Vec<User> = Vec::new();
    let outcome = db
        .query()
        .raw("SELECT id, name, email FROM people WHERE id < ?", [Value::Int(3)])
        .order_by_primary_key(Direction::Asc)
        .run(&mut users);

    assert!(outcome.is_ok());
    assert_eq!(outcome.sql, "SELECT id, name, email FROM people WHERE id < ?");
    assert_eq!(users.len(), 2);
}

struct RecordingPreloader {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Preloader for RecordingPreloader {
    fn preload(&self, scope: &mut Scope<'_>, association: &str) -> Result<(), BoxError> {
        if association == "broken" {
            return Err("no such association".into());
        }
        self.seen
            .lock()
            .push(format!("{association}:{}", scope.rows_affected()));
        Ok(())
    }
}

#[test]
fn preload_stage_calls_the_preloader_in_order() {
    init_tracing();
    let exec = Arc::new(MemoryExecutor::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let db = Db::builder(Arc::clone(&exec))
        .with_preloader(RecordingPreloader {
            seen: Arc::clone(&seen),
        })
        .build();
    exec.push_result(two_users()).push_result(two_users());

    let mut users: Vec<User> = Vec::new();
    db.query()
        .preload("orders")
        .preload("profile")
        .preload("orders")
        .find(&mut users)
        .expect("query");
    assert_eq!(*seen.lock(), ["orders:2", "profile:2"]);

    let err = db
        .query()
        .preload("broken")
        .find(&mut users)
        .unwrap_err();
    assert!(matches!(err, PenumbraError::Preload { ref association, .. } if association == "broken"));
}

#[test]
fn preload_without_a_preloader_fails() {
    let (exec, db) = setup();
    exec.push_result(two_users());

    let mut users: Vec<User> = Vec::new();
    let err = db.query().preload("orders").find(&mut users).unwrap_err();
    assert_eq!(err.code(), "Preload");
}

#[test]
fn primary_key_order_is_dropped_without_a_primary_key() {
    let (exec, db) = setup();
    exec.push_result(ResultSet::new(["body", "author"]).row(["hello".into(), "ada".into()]));

    let mut notes: Vec<Note> = Vec::new();
    let outcome = db
        .query()
        .order_by_primary_key(Direction::Asc)
        .run(&mut notes);

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.sql, "SELECT * FROM \"notes\"");
    assert!(!exec.statements()[0].sql.contains("ORDER BY"));
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].author, "ada");
}

#[test]
fn shared_handle_serves_concurrent_calls() {
    const PER_TYPE: usize = 4;
    let (exec, db) = setup();
    for _ in 0..PER_TYPE * 3 {
        exec.push_result(ResultSet::new(["id", "name"]).row([Value::Int(1), "shared".into()]));
    }
    let db = Arc::new(db);

    let handles: Vec<_> = (0..PER_TYPE * 3)
        .map(|n| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || match n % 3 {
                0 => {
                    let mut users: Vec<User> = Vec::new();
                    db.find(&mut users).map(|_| users.len())
                }
                1 => {
                    let mut audited: Vec<Audited> = Vec::new();
                    let rows = db.find(&mut audited)?;
                    assert!(audited.iter().all(|a| a.loaded));
                    Ok(rows as usize)
                }
                _ => {
                    let mut notes: Vec<Note> = Vec::new();
                    db.find(&mut notes).map(|_| notes.len())
                }
            })
        })
        .collect();

    for handle in handles {
        let loaded = handle.join().expect("worker panicked").expect("query");
        assert_eq!(loaded, 1);
    }
    assert_eq!(db.models().len(), 3);
    assert_eq!(exec.statements().len(), PER_TYPE * 3);
    assert_eq!(exec.opened(), exec.closed());
    for table in ["users", "audited", "notes"] {
        let expected = format!("SELECT * FROM \"{table}\"");
        let hits = exec.statements().iter().filter(|s| s.sql == expected).count();
        assert_eq!(hits, PER_TYPE, "{table}");
    }
}
