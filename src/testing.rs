//! Scripted in-memory connection for unit tests.

use crate::{Connection, ConnectionSource, Error, Executed, Result, Row, Value};
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use std::{
    collections::VecDeque,
    future::Future,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Acquire,
    Begin,
    Fetch(String, Vec<Value>),
    Execute(String, Vec<Value>),
    Savepoint(String),
    RollbackToSavepoint(String),
    ReleaseSavepoint(String),
    Commit,
    Rollback,
    Close,
}

type Failure = Arc<dyn Fn(&str, &[Value]) -> bool + Send + Sync>;

#[derive(Default)]
pub(crate) struct Journal {
    pub events: Vec<Event>,
    results: VecDeque<Vec<Row>>,
    fail_when: Option<Failure>,
    next_key: u64,
}

/// Records every call and answers fetches with queued results.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSource {
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the rows returned by the next fetch.
    pub fn returning(self, rows: Vec<Row>) -> Self {
        self.journal.lock().unwrap().results.push_back(rows);
        self
    }

    /// Makes `execute` fail whenever `predicate` holds.
    pub fn failing_when(
        self,
        predicate: impl Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.journal.lock().unwrap().fail_when = Some(Arc::new(predicate));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.journal.lock().unwrap().events.clone()
    }

    /// Parameter rows of every successful `execute`, in call order.
    pub fn executed(&self) -> Vec<Vec<Value>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Execute(_, params) => Some(params),
                _ => None,
            })
            .collect()
    }

    /// Parameter rows of every `execute` still in effect once savepoint
    /// rollbacks are replayed.
    pub fn applied(&self) -> Vec<Vec<Value>> {
        let mut applied = Vec::new();
        let mut savepoints = Vec::new();
        for event in self.events() {
            match event {
                Event::Execute(_, params) => applied.push(params),
                Event::Savepoint(name) => savepoints.push((name, applied.len())),
                Event::RollbackToSavepoint(name) => {
                    if let Some((_, mark)) = savepoints.iter().rev().find(|(n, _)| *n == name) {
                        applied.truncate(*mark);
                    }
                }
                Event::ReleaseSavepoint(name) => {
                    if let Some(at) = savepoints.iter().rposition(|(n, _)| *n == name) {
                        savepoints.truncate(at);
                    }
                }
                _ => {}
            }
        }
        applied
    }

    pub fn connection(&self) -> ScriptedConnection {
        ScriptedConnection {
            journal: self.journal.clone(),
        }
    }
}

impl ConnectionSource for ScriptedSource {
    type Connection = ScriptedConnection;

    fn acquire(&self) -> impl Future<Output = Result<ScriptedConnection>> + Send {
        self.journal.lock().unwrap().events.push(Event::Acquire);
        let connection = self.connection();
        async move { Ok(connection) }
    }
}

pub(crate) struct ScriptedConnection {
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedConnection {
    fn record(&self, event: Event) {
        self.journal.lock().unwrap().events.push(event);
    }
}

impl Connection for ScriptedConnection {
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::Begin);
        async { Ok(()) }
    }

    fn fetch<'a>(&'a mut self, sql: &'a str, params: &'a [Value]) -> BoxStream<'a, Result<Row>> {
        let mut journal = self.journal.lock().unwrap();
        journal
            .events
            .push(Event::Fetch(sql.to_owned(), params.to_vec()));
        let rows = journal.results.pop_front().unwrap_or_default();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Executed>> + Send {
        let mut journal = self.journal.lock().unwrap();
        let failed = journal
            .fail_when
            .as_ref()
            .is_some_and(|fail| fail(sql, params));
        let result = if failed {
            Err(Error::Database(sqlx::Error::Protocol(format!(
                "scripted failure executing `{sql}`"
            ))))
        } else {
            journal
                .events
                .push(Event::Execute(sql.to_owned(), params.to_vec()));
            journal.next_key += 1;
            Ok(Executed {
                rows_affected: 1,
                generated_keys: vec![Value::UInt(journal.next_key)],
            })
        };
        async move { result }
    }

    fn savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::Savepoint(name.to_owned()));
        async { Ok(()) }
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::RollbackToSavepoint(name.to_owned()));
        async { Ok(()) }
    }

    fn release_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::ReleaseSavepoint(name.to_owned()));
        async { Ok(()) }
    }

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::Commit);
        async { Ok(()) }
    }

    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::Rollback);
        async { Ok(()) }
    }

    fn close(self) -> impl Future<Output = Result<()>> + Send {
        self.record(Event::Close);
        async { Ok(()) }
    }
}
