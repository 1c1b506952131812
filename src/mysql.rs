use crate::{
    Config, Connection, ConnectionSource, Error, Executed, Result, Row, SqlPlus, Value,
};
use futures::stream::{BoxStream, StreamExt};
use rust_decimal::Decimal;
use sqlx::{
    mysql::{MySqlArguments, MySqlRow},
    pool::PoolConnection,
    query::Query,
    Column, MySql, MySqlPool, Row as _, TypeInfo, ValueRef,
};
use std::future::Future;
use time::{Date, PrimitiveDateTime, Time};

/// Type alias for SQLx Query with MySQL arguments
pub type Q<'q> = Query<'q, MySql, MySqlArguments>;

/// A connection checked out of a [`MySqlPool`]. Closing it returns it to the
/// pool.
pub struct MySqlPooled {
    inner: PoolConnection<MySql>,
}

impl MySqlPooled {
    pub fn new(inner: PoolConnection<MySql>) -> Self {
        Self { inner }
    }

    async fn raw(&mut self, sql: &str) -> Result<()> {
        let conn: &mut sqlx::MySqlConnection = &mut self.inner;
        sqlx::Executor::execute(conn, sql).await?;
        Ok(())
    }
}

impl ConnectionSource for MySqlPool {
    type Connection = MySqlPooled;

    fn acquire(&self) -> impl Future<Output = Result<MySqlPooled>> + Send {
        let acquired = sqlx::Pool::acquire(self);
        async move { Ok(MySqlPooled::new(acquired.await?)) }
    }
}

impl Connection for MySqlPooled {
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.raw("BEGIN")
    }

    fn fetch<'a>(&'a mut self, sql: &'a str, params: &'a [Value]) -> BoxStream<'a, Result<Row>> {
        bind_all(sql, params)
            .fetch(&mut *self.inner)
            .map(|row| row.map_err(Error::from).and_then(decode_row))
            .boxed()
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Executed>> + Send {
        async move {
            let done = bind_all(sql, params).execute(&mut *self.inner).await?;
            let rows_affected = done.rows_affected();
            Ok(Executed {
                rows_affected,
                generated_keys: generated_keys(done.last_insert_id(), rows_affected),
            })
        }
    }

    fn savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        let sql = format!("SAVEPOINT {name}");
        async move { self.raw(&sql).await }
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        let sql = format!("ROLLBACK TO SAVEPOINT {name}");
        async move { self.raw(&sql).await }
    }

    fn release_savepoint(&mut self, name: &str) -> impl Future<Output = Result<()>> + Send {
        let sql = format!("RELEASE SAVEPOINT {name}");
        async move { self.raw(&sql).await }
    }

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.raw("COMMIT")
    }

    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.raw("ROLLBACK")
    }

    fn close(self) -> impl Future<Output = Result<()>> + Send {
        drop(self.inner);
        async { Ok(()) }
    }
}

/// MySQL only reports the first id of an insert. The rest are taken as
/// consecutive, one per affected row, which holds for plain single and
/// multi-row inserts but not for `ON DUPLICATE KEY UPDATE`, where an updated
/// row counts twice.
fn generated_keys(last_insert_id: u64, rows_affected: u64) -> Vec<Value> {
    match (last_insert_id, rows_affected) {
        (0, _) | (_, 0) => Vec::new(),
        (first, count) => (0..count).map(|i| Value::UInt(first + i)).collect(),
    }
}

fn bind_all<'q>(sql: &'q str, params: &'q [Value]) -> Q<'q> {
    params.iter().fold(sqlx::query::<MySql>(sql), bind_value)
}

fn bind_value<'q>(q: Q<'q>, value: &'q Value) -> Q<'q> {
    match value {
        Value::Null => q.bind(None::<String>),
        Value::Bool(v) => q.bind(*v),
        Value::Int(v) => q.bind(*v),
        Value::UInt(v) => q.bind(*v),
        Value::Float(v) => q.bind(*v),
        Value::Decimal(v) => q.bind(*v),
        Value::Text(v) => q.bind(v.as_str()),
        Value::Bytes(v) => q.bind(v.as_slice()),
        Value::Date(v) => q.bind(*v),
        Value::Time(v) => q.bind(*v),
        Value::DateTime(v) => q.bind(*v),
    }
}

fn decode_row(row: MySqlRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|column| {
            decode_column(&row, column.ordinal()).map(|value| (column.name().to_owned(), value))
        })
        .collect()
}

/// Decodes a column by the type the server reports for it. Types without a
/// dedicated variant come back as text, or as bytes when not valid UTF-8.
fn decode_column(row: &MySqlRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_owned();
    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Int(row.try_get_unchecked(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::UInt(row.try_get_unchecked(index)?),
        "FLOAT" => Value::Float(row.try_get_unchecked::<f32, _>(index)?.into()),
        "DOUBLE" => Value::Float(row.try_get_unchecked(index)?),
        "DECIMAL" => Value::Decimal(row.try_get_unchecked::<Decimal, _>(index)?),
        "DATE" => Value::Date(row.try_get_unchecked::<Date, _>(index)?),
        "TIME" => Value::Time(row.try_get_unchecked::<Time, _>(index)?),
        "DATETIME" | "TIMESTAMP" => {
            Value::DateTime(row.try_get_unchecked::<PrimitiveDateTime, _>(index)?)
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::Bytes(row.try_get_unchecked(index)?)
        }
        _ => match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Bytes(row.try_get_unchecked(index)?),
        },
    };
    Ok(value)
}

impl SqlPlus<MySqlPool> {
    /// Connects a pool to `url` with default settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(Config {
            database_url: Some(url.to_owned()),
            ..Config::default()
        })
        .await
    }

    /// Connects a pool to the configured database.
    pub async fn connect_with(config: Config) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_owned()))?;
        let pool = MySqlPool::connect(url).await?;
        Ok(Self::with_config(pool, config))
    }

    /// Connects using [`Config::from_env`].
    pub async fn connect_from_env() -> Result<Self> {
        Self::connect_with(Config::from_env()?).await
    }
}
