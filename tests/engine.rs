use futures::{
    stream::{self, BoxStream},
    StreamExt, TryStreamExt,
};
use sqlx_plus::{
    batch::execute_batch, params, record, sql_enum, BindingSet, Connection, ConnectionSource,
    Error, Executed, Query, Result, Row, Session, SqlPlus, Statement, Value,
};
use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex},
};

#[derive(Default)]
struct Shared {
    log: Vec<String>,
    results: VecDeque<Vec<Row>>,
    executed: Vec<Vec<Value>>,
}

/// Answers fetches with canned rows and remembers everything it was asked.
#[derive(Clone, Default)]
struct Canned {
    shared: Arc<Mutex<Shared>>,
}

impl Canned {
    fn answer(self, rows: Vec<Row>) -> Self {
        self.shared.lock().unwrap().results.push_back(rows);
        self
    }

    fn log(&self) -> Vec<String> {
        self.shared.lock().unwrap().log.clone()
    }

    fn executed(&self) -> Vec<Vec<Value>> {
        self.shared.lock().unwrap().executed.clone()
    }

    fn note(&self, entry: impl Into<String>) {
        self.shared.lock().unwrap().log.push(entry.into());
    }
}

impl ConnectionSource for Canned {
    type Connection = Canned;

    fn acquire(&self) -> impl Future<Output = Result<Canned>> + Send {
        self.note("acquire");
        let connection = self.clone();
        async move { Ok(connection) }
    }
}

impl Connection for Canned {
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.note("begin");
        async { Ok(()) }
    }

    fn fetch<'a>(&'a mut self, sql: &'a str, _params: &'a [Value]) -> BoxStream<'a, Result<Row>> {
        self.note(format!("fetch {sql}"));
        let rows = self
            .shared
            .lock()
            .unwrap()
            .results
            .pop_front()
            .unwrap_or_default();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Executed>> + Send {
        self.note(format!("execute {sql}"));
        self.shared.lock().unwrap().executed.push(params.to_vec());
        async {
            Ok(Executed {
                rows_affected: 1,
                generated_keys: Vec::new(),
            })
        }
    }

    fn savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        self.note(format!("savepoint {name}"));
        async { Ok(()) }
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        self.note(format!("rollback to {name}"));
        async { Ok(()) }
    }

    fn release_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        self.note(format!("release {name}"));
        async { Ok(()) }
    }

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.note("commit");
        async { Ok(()) }
    }

    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.note("rollback");
        async { Ok(()) }
    }

    fn close(self) -> impl Future<Output = Result<()>> + Send {
        self.note("close");
        async { Ok(()) }
    }
}

sql_enum! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum PayType {
        Hourly = "HOURLY",
        Salary = "SALARY",
    }
}

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Address {
        pub address_id: Option<i64>,
        pub street: Option<String>,
        pub city: Option<String>,
        pub state: Option<String>,
        pub zip: Option<String>,
    }
}

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Employee {
        pub employee_id: i64,
        pub name: String,
        pub pay_type: Option<PayType>,
    }
}

fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns.into_iter().collect()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

#[test]
fn test_placeholders_inside_literals_and_comments_are_ignored() {
    let statement = Statement::parse(
        "SELECT ':not_a_param', \"?\" -- :comment ?\n FROM t /* :x ? */ WHERE a = :a AND b = ? AND c::text = :a",
    )
    .unwrap();
    assert_eq!(statement.len(), 3);
    assert_eq!(statement.names(), vec!["a"]);
    assert_eq!(
        statement.normalized(),
        "SELECT ':not_a_param', \"?\" -- :comment ?\n FROM t /* :x ? */ WHERE a = ? AND b = ? AND c::text = ?"
    );
}

#[test]
fn test_missing_parameters_are_listed_in_order() {
    let mut query =
        Query::new("INSERT INTO address VALUES (:address_id, :street, :city, :state, :zip)")
            .unwrap();
    query.bind("street", "Maple Street").unwrap().bind("zip", "12345").unwrap();
    let error = query.bindings().validate().unwrap_err();
    assert_eq!(
        error.to_string(),
        "Missing parameter values for the following parameters: [address_id, city, state]"
    );
}

#[test]
fn test_object_binding_is_all_or_nothing() {
    let mut query = Query::new("UPDATE employee SET name = :name WHERE salary > :salary").unwrap();
    let employee = Employee {
        employee_id: 1,
        name: "Billy Bob".into(),
        pay_type: None,
    };
    let error = query.bind_object(&employee).unwrap_err();
    assert!(matches!(error, Error::ReflectionBind { ref parameter, .. } if parameter == "salary"));
    assert!(query.bindings().is_untouched());
    assert!(!query.bindings().is_bound(1));
}

#[tokio::test]
async fn test_select_records_through_sql_plus() {
    let canned = Canned::default().answer(vec![
        row([
            ("ADDRESS_ID", Value::Int(1)),
            ("STREET", text("Maple Street")),
            ("CITY", text("Anytown")),
        ]),
        row([
            ("ADDRESS_ID", Value::Int(2)),
            ("STREET", text("Elm Street")),
            ("CITY", text("Anytown")),
        ]),
    ]);
    let db = SqlPlus::new(canned.clone());
    let addresses: Vec<Address> = db
        .fetch_as("SELECT * FROM address WHERE city = ?", &params!["Anytown"])
        .await
        .unwrap();
    assert_eq!(addresses.len(), 2);
    assert_eq!(addresses[1].street.as_deref(), Some("Elm Street"));
    assert_eq!(addresses[1].state, None);
    assert_eq!(
        canned.log(),
        vec![
            "acquire",
            "begin",
            "fetch SELECT * FROM address WHERE city = ?",
            "commit",
            "close"
        ]
    );
}

#[tokio::test]
async fn test_keyed_map_and_enum_members() {
    let canned = Canned::default().answer(vec![
        row([
            ("EMPLOYEE_ID", Value::Int(7)),
            ("NAME", text("Ann")),
            ("PAY_TYPE", text("HOURLY")),
        ]),
        row([
            ("EMPLOYEE_ID", Value::Int(7)),
            ("NAME", text("Ann B.")),
            ("PAY_TYPE", text("SALARY")),
        ]),
    ]);
    let db = SqlPlus::new(canned);
    let mut query = Query::new("SELECT * FROM employee").unwrap();
    query.key_field("employee_id");
    let staff: HashMap<i64, Employee> = db
        .transact(move |session| Box::pin(async move { query.interpret(session).await }))
        .await
        .unwrap();
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[&7].name, "Ann B.");
    assert_eq!(staff[&7].pay_type, Some(PayType::Salary));
}

#[tokio::test]
async fn test_bad_enum_value_rolls_back() {
    let canned = Canned::default().answer(vec![row([
        ("EMPLOYEE_ID", Value::Int(7)),
        ("PAY_TYPE", text("salary")),
    ])]);
    let db = SqlPlus::new(canned.clone());
    let error = db
        .find_unique::<Employee>("SELECT * FROM employee", &[])
        .await
        .unwrap_err();
    assert!(matches!(error, Error::EnumCoercion { ref value, .. } if value == "salary"));
    assert_eq!(canned.log().last().map(String::as_str), Some("close"));
    assert!(canned.log().iter().any(|entry| entry == "rollback"));
}

#[tokio::test]
async fn test_scalar_query() {
    let canned = Canned::default()
        .answer(vec![row([("COUNT(*)", Value::Int(2))])])
        .answer(vec![]);
    let db = SqlPlus::new(canned);
    assert_eq!(
        db.query_scalar::<i64>("SELECT COUNT(*) FROM address").await.unwrap(),
        2
    );
    assert!(matches!(
        db.query_scalar::<i64>("SELECT COUNT(*) FROM address").await,
        Err(Error::EmptyResult { .. })
    ));
}

#[tokio::test]
async fn test_batch_of_twenty_two_in_chunks_of_four() {
    let canned = Canned::default();
    let mut session = Session::new(canned.clone());
    let statement =
        Arc::new(Statement::parse("INSERT INTO address (address_id, city) VALUES (:address_id, :city)").unwrap());
    let rows = (0..22).map(|id| {
        let mut bindings = BindingSet::new(statement.clone());
        bindings
            .bind_object(&Address {
                address_id: Some(id),
                city: Some("Anytown".into()),
                ..Address::default()
            })
            .unwrap();
        bindings
    });
    let outcomes: Vec<_> = execute_batch(&mut session, &statement, rows.collect::<Vec<_>>(), 4)
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let sizes: Vec<_> = outcomes.iter().map(|o| o.len()).collect();
    assert_eq!(sizes, vec![4, 4, 4, 4, 4, 2]);
    let ids: Vec<_> = canned.executed().into_iter().map(|p| p[0].clone()).collect();
    assert_eq!(ids, (0..22).map(Value::Int).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_session_nested_units_commit_once() {
    let canned = Canned::default();
    let db = SqlPlus::new(canned.clone());
    db.transact(|session| {
        Box::pin(async move {
            Query::new("DELETE FROM address")?
                .execute_update(session)
                .await?;
            session
                .transact(|session| {
                    Box::pin(async move {
                        Query::new("DELETE FROM employee")?
                            .execute_update(session)
                            .await
                    })
                })
                .await
        })
    })
    .await
    .unwrap();
    assert_eq!(
        canned.log(),
        vec![
            "acquire",
            "begin",
            "execute DELETE FROM address",
            "execute DELETE FROM employee",
            "commit",
            "close"
        ]
    );
}
