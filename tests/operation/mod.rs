use bson::{bson, doc, Bson, Document};
use futures::StreamExt;
use serde_derive::Deserialize;

use mongodb_operations::{CancellationToken, Error, Result};
use mongodb_operations::coll::options::CursorOptions;
use mongodb_operations::common::{Namespace, ReadMode, ReadPreference};
use mongodb_operations::cursor::{BatchCursor, CommandCursor, CursorEnumerable};
use mongodb_operations::operation::{CursorCommandOperation, ExplainOperation, ExplainVerbosity,
                                    ReadCommandOperation, WriteCommandOperation};
use mongodb_operations::topology::ServerType;
use mongodb_operations::wire_protocol::flags::OpQueryFlags;

use crate::support::{MockBinding, MockServer, Reply, Sent};

use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct Person {
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct CountReply {
    n: i32,
}

fn last_command(server: &MockServer) -> (String, Document, OpQueryFlags) {
    match server.sent().pop() {
        Some(Sent::Command { database, command, flags }) => (database, command, flags),
        other => panic!("expected a command, got {:?}", other),
    }
}

fn cursor_reply(id: i64, batch_field: &str, batch: Vec<Bson>) -> Reply {
    let mut cursor = Document::new();
    cursor.insert("id", Bson::I64(id));
    cursor.insert("ns", Bson::String(String::from("test.people")));
    cursor.insert(batch_field, Bson::Array(batch));
    Reply::Command(doc! { "ok": 1, "cursor": cursor })
}

fn people(names: &[&str]) -> Vec<Bson> {
    names.iter().map(|name| Bson::Document(doc! { "name": *name })).collect()
}

fn aggregate<T: serde::de::DeserializeOwned + Send>(options: CursorOptions) -> CursorCommandOperation<T> {
    CursorCommandOperation::new(Namespace::new("test", "people"),
                                doc! { "aggregate": "people", "pipeline": [] },
                                options)
}

#[test]
fn reads_through_mongos_carry_read_preference() {
    let secondary = ReadPreference::new(ReadMode::Secondary, None).with_max_staleness(Duration::from_secs(90));
    let server = MockServer::new(ServerType::Mongos, 6).with_read_preference(secondary).shared();
    let binding = MockBinding::new(&server);

    let reply: Document = ReadCommandOperation::new("test", doc! { "count": "people" })
        .execute(&binding, &CancellationToken::new())
        .unwrap();
    assert_eq!(reply, doc! { "ok": 1 });

    let (database, command, flags) = last_command(&server);
    assert_eq!(database, "test");
    assert_eq!(command,
               doc! {
                   "$query": { "count": "people" },
                   "$readPreference": { "mode": "secondary", "maxStalenessSeconds": 90 }
               });
    assert!(flags.contains(OpQueryFlags::SLAVE_OK));
}

#[test]
fn reads_on_standalone_use_only_the_flag() {
    let secondary = ReadPreference::new(ReadMode::Secondary, None);
    let server = MockServer::new(ServerType::Standalone, 6).with_read_preference(secondary).shared();
    let binding = MockBinding::new(&server);

    ReadCommandOperation::<Document>::new("test", doc! { "count": "people" })
        .execute(&binding, &CancellationToken::new())
        .unwrap();

    let (_, command, flags) = last_command(&server);
    assert_eq!(command, doc! { "count": "people" });
    assert!(flags.contains(OpQueryFlags::SLAVE_OK));
}

#[test]
fn primary_reads_do_not_set_slave_ok() {
    let server = MockServer::new(ServerType::Mongos, 6).with_read_preference(ReadPreference::primary()).shared();
    let binding = MockBinding::new(&server);

    ReadCommandOperation::<Document>::new("test", doc! { "count": "people" })
        .execute(&binding, &CancellationToken::new())
        .unwrap();

    let (_, command, flags) = last_command(&server);
    assert_eq!(command, doc! { "count": "people" });
    assert!(flags.is_empty());
}

#[test]
fn replies_deserialize_into_typed_results() {
    let server = MockServer::modern().shared();
    server.reply(Reply::Command(doc! { "ok": 1, "n": 5 }));
    let binding = MockBinding::new(&server);

    let reply: CountReply = ReadCommandOperation::new("test", doc! { "count": "people" })
        .execute(&binding, &CancellationToken::new())
        .unwrap();

    assert_eq!(reply, CountReply { n: 5 });
}

#[test]
fn failed_commands_release_their_channel() {
    let server = MockServer::modern().shared();
    server.reply(Reply::Command(doc! { "ok": 0, "code": 26, "codeName": "NamespaceNotFound", "errmsg": "ns not found" }));
    let binding = MockBinding::new(&server);

    let error = ReadCommandOperation::<Document>::new("test", doc! { "count": "people" })
        .execute(&binding, &CancellationToken::new())
        .unwrap_err();

    match error {
        Error::CommandError(exception) => {
            assert_eq!(exception.code, 26);
            assert_eq!(exception.message, "ns not found");
        }
        other => panic!("expected a command error, got {:?}", other),
    }
    assert_eq!(server.sources_outstanding(), 0);
    assert_eq!(server.channels_outstanding(), 0);
}

#[test]
fn write_commands_surface_write_concern_errors() {
    let server = MockServer::modern().shared();
    server.reply(Reply::Command(doc! {
        "ok": 1,
        "n": 1,
        "writeConcernError": { "code": 64, "codeName": "WriteConcernFailed", "errmsg": "waiting for replication timed out" }
    }));
    let binding = MockBinding::new(&server);

    let error = WriteCommandOperation::<Document>::new("test", doc! { "insert": "people", "documents": [{}] })
        .execute(&binding, &CancellationToken::new())
        .unwrap_err();

    assert!(error.is_write_concern_error());
    match error {
        Error::WriteConcernError(exception) => {
            assert_eq!(exception.write_concern_error.code, 64);
            assert_eq!(exception.write_concern_error.code_name, Some(String::from("WriteConcernFailed")));
            assert_eq!(exception.reply.get_i32("n").unwrap(), 1);
        }
        other => panic!("expected a write concern error, got {:?}", other),
    }

    let (_, _, flags) = last_command(&server);
    assert!(flags.is_empty());
}

#[test]
fn write_commands_return_the_reply() {
    let server = MockServer::modern().shared();
    server.reply(Reply::Command(doc! { "ok": 1, "n": 3 }));
    let binding = MockBinding::new(&server);

    let reply: CountReply = WriteCommandOperation::new("test", doc! { "delete": "people", "deletes": [] })
        .execute(&binding, &CancellationToken::new())
        .unwrap();

    assert_eq!(reply.n, 3);
}

#[test]
fn cursor_respects_limit_across_batches() {
    let server = MockServer::modern().shared();
    server.reply(cursor_reply(42, "firstBatch", people(&["a", "b"])));
    server.reply(cursor_reply(42, "nextBatch", people(&["c", "d"])));
    server.reply(Reply::Command(doc! { "ok": 1, "cursorsKilled": [Bson::I64(42)] }));
    let binding = MockBinding::new(&server);

    let options = CursorOptions { batch_size: 2, limit: 3, max_time: Some(Duration::from_millis(100)) };
    let cursor: CommandCursor<Person> = aggregate(options).execute(&binding, &CancellationToken::new()).unwrap();
    assert!(cursor.holds_channel_source());
    assert_eq!(server.channels_outstanding(), 0);

    let mut enumerable = CursorEnumerable::new(cursor);
    let names: Vec<_> = enumerable.enumerate()
        .unwrap()
        .map(|person| person.map(|person| person.name))
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(names, vec!["a", "b", "c"]);

    let commands = server.commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0], doc! { "aggregate": "people", "pipeline": [], "cursor": { "batchSize": 2 } });
    assert_eq!(commands[1].get_i64("getMore").unwrap(), 42);
    assert_eq!(commands[1].get_str("collection").unwrap(), "people");
    assert_eq!(commands[1].get_i32("batchSize").unwrap(), 1);
    assert_eq!(commands[1].get_i64("maxTimeMS").unwrap(), 100);
    assert_eq!(commands[2].get_str("killCursors").unwrap(), "people");
    assert_eq!(commands[2].get_array("cursors").unwrap(), &vec![Bson::I64(42)]);

    assert_eq!(server.sources_outstanding(), 0);
}

#[test]
fn negative_limit_returns_a_single_batch() {
    let server = MockServer::modern().shared();
    server.reply(cursor_reply(42, "firstBatch", people(&["a", "b"])));
    server.reply(Reply::Command(doc! { "ok": 1, "cursorsKilled": [Bson::I64(42)] }));
    let binding = MockBinding::new(&server);

    let options = CursorOptions { batch_size: 0, limit: -2, max_time: None };
    let mut cursor: CommandCursor<Person> = aggregate(options).execute(&binding, &CancellationToken::new()).unwrap();
    let cancel = CancellationToken::new();

    let batch = futures::executor::block_on(cursor.try_next_batch(&cancel)).unwrap().unwrap();
    assert_eq!(batch.len(), 2);
    assert!(futures::executor::block_on(cursor.try_next_batch(&cancel)).unwrap().is_none());

    let commands = server.commands();
    assert_eq!(commands[0].get_document("cursor").unwrap(), &doc! { "batchSize": 2 });
    assert!(commands[1].contains_key("killCursors"));
    assert_eq!(commands.len(), 2);
    assert_eq!(cursor.cursor_id(), 0);
    assert_eq!(server.sources_outstanding(), 0);
}

#[test]
fn smallest_negative_limit_is_a_single_batch() {
    let server = MockServer::modern().shared();
    server.reply(cursor_reply(0, "firstBatch", people(&["a"])));
    let binding = MockBinding::new(&server);

    let options = CursorOptions { batch_size: 0, limit: i32::MIN, max_time: None };
    let mut cursor: CommandCursor<Person> = aggregate(options).execute(&binding, &CancellationToken::new()).unwrap();
    let cancel = CancellationToken::new();

    let commands = server.commands();
    assert_eq!(commands[0].get_document("cursor").unwrap(), &doc! { "batchSize": i32::MAX });

    let batch = futures::executor::block_on(cursor.try_next_batch(&cancel)).unwrap().unwrap();
    assert_eq!(batch, vec![Person { name: String::from("a") }]);
    assert!(futures::executor::block_on(cursor.try_next_batch(&cancel)).unwrap().is_none());
    assert_eq!(server.commands().len(), 1);
}

#[test]
fn exhausted_cursor_releases_its_source_immediately() {
    let server = MockServer::modern().shared();
    server.reply(cursor_reply(0, "firstBatch", people(&["a"])));
    let binding = MockBinding::new(&server);

    let mut cursor: CommandCursor<Person> = aggregate(CursorOptions::new())
        .execute(&binding, &CancellationToken::new())
        .unwrap();

    assert!(!cursor.holds_channel_source());
    assert_eq!(server.sources_outstanding(), 0);
    assert_eq!(cursor.namespace(), &Namespace::new("test", "people"));

    let cancel = CancellationToken::new();
    let batch = futures::executor::block_on(cursor.try_next_batch(&cancel)).unwrap().unwrap();
    assert_eq!(batch, vec![Person { name: String::from("a") }]);
    assert!(futures::executor::block_on(cursor.try_next_batch(&cancel)).unwrap().is_none());
    assert_eq!(server.commands().len(), 1);
}

#[test]
fn get_more_follows_the_reply_namespace() {
    let server = MockServer::modern().shared();
    server.reply(Reply::Command(doc! {
        "ok": 1,
        "cursor": { "id": Bson::I64(7), "ns": "other.things", "firstBatch": [] }
    }));
    server.reply(Reply::Command(doc! {
        "ok": 1,
        "cursor": { "id": Bson::I64(0), "ns": "other.things", "nextBatch": [{ "name": "z" }] }
    }));
    let binding = MockBinding::new(&server);

    let cursor: CommandCursor<Person> = aggregate(CursorOptions::new())
        .execute(&binding, &CancellationToken::new())
        .unwrap();
    assert_eq!(cursor.namespace().full_name(), "other.things");

    let mut enumerable = CursorEnumerable::new(cursor);
    let people: Vec<_> = enumerable.enumerate().unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(people, vec![Person { name: String::from("z") }]);

    let (database, command, _) = last_command(&server);
    assert_eq!(database, "other");
    assert_eq!(command.get_str("collection").unwrap(), "things");
    assert!(!command.contains_key("batchSize"));
    assert_eq!(server.sources_outstanding(), 0);
}

#[test]
fn disposing_a_cursor_sends_nothing() {
    let server = MockServer::modern().shared();
    server.reply(cursor_reply(42, "firstBatch", people(&["a", "b"])));
    let binding = MockBinding::new(&server);

    let cursor: CommandCursor<Person> = aggregate(CursorOptions::new())
        .execute(&binding, &CancellationToken::new())
        .unwrap();
    assert_eq!(server.sources_outstanding(), 1);

    let mut enumerable = CursorEnumerable::new(cursor);
    {
        let mut enumerator = enumerable.enumerate().unwrap();
        assert!(enumerator.move_next().unwrap());
    }

    assert_eq!(server.sources_outstanding(), 0);
    assert_eq!(server.commands().len(), 1);
}

#[test]
fn closing_reports_unknown_cursors() {
    let server = MockServer::modern().shared();
    server.reply(cursor_reply(42, "firstBatch", people(&["a"])));
    server.reply(Reply::Command(doc! { "ok": 1, "cursorsKilled": [], "cursorsNotFound": [Bson::I64(42)] }));
    let binding = MockBinding::new(&server);

    let mut cursor: CommandCursor<Person> = aggregate(CursorOptions::new())
        .execute(&binding, &CancellationToken::new())
        .unwrap();

    match cursor.close(&CancellationToken::new()) {
        Err(Error::CursorNotFoundError(id)) => assert_eq!(id, 42),
        other => panic!("expected CursorNotFoundError, got {:?}", other),
    }
    assert!(!cursor.holds_channel_source());
    assert_eq!(server.sources_outstanding(), 0);

    // Closing twice does nothing.
    cursor.close(&CancellationToken::new()).unwrap();
    assert_eq!(server.commands().len(), 2);

    match futures::executor::block_on(cursor.try_next_batch(&CancellationToken::new())) {
        Err(Error::Disposed(_)) => (),
        other => panic!("expected Disposed, got {:?}", other),
    }
}

#[test]
fn explain_wraps_the_command() {
    let server = MockServer::modern().shared();
    server.reply(Reply::Command(doc! { "ok": 1, "queryPlanner": { "winningPlan": { "stage": "COLLSCAN" } } }));
    let binding = MockBinding::new(&server);

    let reply = ExplainOperation::new("test", doc! { "count": "people" }, ExplainVerbosity::AllPlansExecution)
        .execute(&binding, &CancellationToken::new())
        .unwrap();
    assert!(reply.contains_key("queryPlanner"));

    let (database, command, _) = last_command(&server);
    assert_eq!(database, "test");
    assert_eq!(command, doc! { "explain": { "count": "people" }, "verbosity": "allPlansExecution" });
}

#[tokio::test]
async fn async_cursor_matches_blocking_cursor() {
    let script = |server: &Arc<MockServer>| {
        server.reply(cursor_reply(42, "firstBatch", people(&["a"])));
        server.reply(cursor_reply(0, "nextBatch", people(&["b", "c"])));
    };

    let blocking_server = MockServer::modern().shared();
    script(&blocking_server);
    let blocking = {
        let server = blocking_server.clone();
        tokio::task::spawn_blocking(move || {
            let binding = MockBinding::new(&server);
            let cursor: CommandCursor<Person> = aggregate(CursorOptions::new())
                .execute(&binding, &CancellationToken::new())?;
            CursorEnumerable::new(cursor).enumerate()?.collect::<Result<Vec<_>>>()
        })
        .await
        .unwrap()
        .unwrap()
    };

    let async_server = MockServer::modern().shared();
    script(&async_server);
    let binding = MockBinding::new(&async_server);
    let cancel = CancellationToken::new();
    let cursor: CommandCursor<Person> = aggregate(CursorOptions::new())
        .execute_async(&binding, &cancel)
        .await
        .unwrap();
    let mut enumerable = CursorEnumerable::with_cancellation(cursor, cancel);
    let streamed: Vec<_> = enumerable.enumerate().unwrap().into_stream().collect().await;
    let streamed: Vec<_> = streamed.into_iter().collect::<Result<_>>().unwrap();

    assert_eq!(blocking, streamed);
    assert_eq!(blocking_server.commands(), async_server.commands());
    assert_eq!(async_server.sources_outstanding(), 0);
}

#[tokio::test]
async fn cancelled_read_releases_resources() {
    let server = MockServer::modern().shared();
    server.hang();
    let binding = MockBinding::new(&server);
    let cancel = CancellationToken::new();

    let operation = ReadCommandOperation::<Document>::new("test", doc! { "count": "people" });
    let canceller = cancel.clone();
    let (result, _) = tokio::join!(operation.execute_async(&binding, &cancel), async move {
        tokio::task::yield_now().await;
        canceller.cancel();
    });

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(server.sources_outstanding(), 0);
    assert_eq!(server.channels_outstanding(), 0);
}
