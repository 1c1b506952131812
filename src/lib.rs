//! # sqlx-plus
//!
//! Parameterized SQL on top of SQLx: named and positional placeholders, binding
//! from record fields, mapping rows back onto records, keyed result maps and
//! chunked batches, all inside explicit units of work.
//!
//! ## Features
//!
//! - **Named Placeholders**: Mix `:param_name` and `?` in the same statement; placeholder-like
//!   text inside string literals and comments is left alone
//! - **Strict Binding**: Unknown, duplicate and missing parameters are reported before anything runs
//! - **Object Binding**: Bind every named placeholder from the matching field of a [`record!`] struct
//! - **Result Mapping**: Column labels such as `ADDRESS_ID` land in `address_id`, with per-query
//!   column overrides
//! - **Return Shapes**: Ask for a record, a scalar, a `Vec` or a `HashMap` keyed by a field
//! - **Chunked Batches**: Execute and read large batches a fixed number of rows at a time
//! - **Explicit Sessions**: Pass the session into nested units of work; only the outermost one commits
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx-plus = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Examples
//!
//! ### Basic Query Execution
//!
//! ```rust,no_run
//! use sqlx_plus::{params, SqlPlus};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = SqlPlus::connect("mysql://localhost/test").await?;
//!
//! let inserted = db
//!     .update("INSERT INTO users (id, name) VALUES (?, ?)", &params![42, "John Doe"])
//!     .await?;
//! println!("Inserted {inserted} rows");
//! # Ok(())
//! # }
//! ```
//!
//! ### Typed Query Results
//!
//! ```rust,no_run
//! use sqlx_plus::{record, Query, SqlPlus};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct User {
//!         pub id: i32,
//!         pub name: String,
//!         pub email: Option<String>,
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let db = SqlPlus::connect("mysql://localhost/test").await?;
//! let users: Vec<User> = db
//!     .transact(|session| {
//!         Box::pin(async move {
//!             let mut query =
//!                 Query::new("SELECT id, name, email FROM users WHERE age >= :min_age")?;
//!             query.bind("min_age", 18)?;
//!             query.fetch_as(session).await
//!         })
//!     })
//!     .await?;
//! for user in users {
//!     println!("{}: {:?}", user.name, user.email);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Keyed Results
//!
//! ```rust,no_run
//! # use sqlx_plus::{record, Query, SqlPlus};
//! # record! {
//! #     #[derive(Debug, Default)]
//! #     pub struct User { pub id: i32, pub name: String }
//! # }
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let db = SqlPlus::connect("mysql://localhost/test").await?;
//! let by_id: HashMap<i32, User> = db
//!     .transact(|session| {
//!         Box::pin(async move {
//!             let mut query = Query::new("SELECT id, name FROM users")?;
//!             query.key_field("id");
//!             query.interpret(session).await
//!         })
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Using with Transactions
//!
//! Every statement handed the same session shares one connection and one
//! transaction. The outermost [`SqlPlus::transact`] commits when its work
//! succeeds and rolls back on any error.
//!
//! ```rust,no_run
//! use sqlx_plus::{Query, SqlPlus};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let db = SqlPlus::connect("mysql://localhost/test").await?;
//! db.transact(|session| {
//!     Box::pin(async move {
//!         let mut debit = Query::new(
//!             "UPDATE accounts SET balance = balance - :amount WHERE id = :from_id",
//!         )?;
//!         debit.bind("amount", 100)?.bind("from_id", 1)?;
//!         debit.execute_update(session).await?;
//!
//!         let mut credit = Query::new(
//!             "UPDATE accounts SET balance = balance + :amount WHERE id = :to_id",
//!         )?;
//!         credit.bind("amount", 100)?.bind("to_id", 2)?;
//!         credit.execute_update(session).await
//!     })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Parse**: [`Statement`] lexes the SQL once, skipping literals and comments, and replaces
//!    every placeholder with `?`
//! 2. **Bind**: [`BindingSet`] records one value per placeholder and validates completeness
//! 3. **Execute**: a [`Connection`] runs the normalized SQL with the values in placeholder order
//! 4. **Materialize**: [`ResultMapper`] and the [`ReturnShape`] of the requested type turn the rows
//!    into the result
//!
//! ## Limitations
//!
//! - Ships a MySQL adapter only; other databases plug in through [`ConnectionSource`] and
//!   [`Connection`]
//! - Placeholder names must match `[a-zA-Z0-9_]+`
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod batch;
pub mod binding;
pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod mysql;
pub mod query;
pub mod query_as;
pub mod record;
pub mod row;
pub mod session;
pub mod shape;
pub mod statement;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::ChunkOutcome;
pub use binding::BindingSet;
pub use builder::QueryBuilder;
pub use config::Config;
pub use driver::{Connection, ConnectionSource, Executed, RowFailure};
pub use error::{Error, Result};
pub use mapper::{ColumnMapping, ResultMapper};
pub use query::Query;
pub use record::{Bindable, Record};
pub use row::Row;
pub use session::{Session, SqlPlus};
pub use shape::{Assembled, FromRow, ReturnShape, RowShape, ShapeContext};
pub use statement::{Placeholder, Statement};
pub use value::{FromValue, ToValue, Value};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::{
        params, record, sql_enum, Bindable, FromRow, FromValue, Query, QueryBuilder, Record,
        ReturnShape, Row, Session, SqlPlus, ToValue, Value,
    };
}
