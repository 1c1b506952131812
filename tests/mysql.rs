//! Runs against a live MySQL server when `DATABASE_URL` is set (a `.env` file
//! is honoured); skipped otherwise.

use sqlx::MySqlPool;
use sqlx_plus::{params, record, Config, Error, Query, SqlPlus, Value};
use std::collections::BTreeMap;

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Office {
        pub office_id: Option<i64>,
        pub office_name: Option<String>,
        pub opened: Option<time::Date>,
        pub budget: Option<rust_decimal::Decimal>,
    }
}

fn init_logs() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

async fn connect() -> Option<SqlPlus<MySqlPool>> {
    init_logs();
    let config = Config::from_env().ok()?;
    if config.database_url.is_none() {
        log::warn!("DATABASE_URL is not set, skipping MySQL test");
        return None;
    }
    Some(SqlPlus::connect_with(config).await.expect("connect to DATABASE_URL"))
}

#[tokio::test]
async fn test_mysql_round_trip() {
    let Some(db) = connect().await else {
        return;
    };
    db.test_connection().await.unwrap();
    db.batch_exec(&[
        "DROP TABLE IF EXISTS sqlx_plus_office",
        "CREATE TABLE sqlx_plus_office (
            office_id BIGINT PRIMARY KEY AUTO_INCREMENT,
            office_name VARCHAR(100) NOT NULL,
            opened DATE NULL,
            budget DECIMAL(12, 2) NULL
        )",
    ])
    .await
    .unwrap();

    let mut insert = Query::new(
        "INSERT INTO sqlx_plus_office (office_name, opened, budget) VALUES (:office_name, :opened, :budget)",
    )
    .unwrap();
    for (name, budget) in [("Anytown", 1500), ("Springfield", 2500), ("Shelbyville", 900)] {
        insert
            .bind_object(&Office {
                office_name: Some(name.into()),
                opened: Some(time::macros::date!(2024 - 01 - 15)),
                budget: Some(rust_decimal::Decimal::new(budget * 100, 2)),
                ..Office::default()
            })
            .unwrap()
            .finish_batch()
            .unwrap();
    }
    insert.chunk_size(2);
    let ids: Vec<i64> = db
        .transact(move |session| {
            Box::pin(async move { insert.execute_update_returning_keys(session).await })
        })
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let mut by_id = Query::new("SELECT * FROM sqlx_plus_office WHERE budget > :min").unwrap();
    by_id.bind("min", 1000).unwrap().key_field("office_id");
    let offices: BTreeMap<i64, Office> = db
        .transact(move |session| Box::pin(async move { by_id.interpret(session).await }))
        .await
        .unwrap();
    assert_eq!(offices.len(), 2);
    assert!(offices
        .values()
        .all(|office| office.opened == Some(time::macros::date!(2024 - 01 - 15))));

    let total: i64 = db
        .query_scalar("SELECT COUNT(*) FROM sqlx_plus_office")
        .await
        .unwrap();
    assert_eq!(total, 3);

    // a failing statement undoes the whole unit of work
    let error = db
        .transact(|session| {
            Box::pin(async move {
                Query::new("DELETE FROM sqlx_plus_office")?
                    .execute_update(session)
                    .await?;
                Query::new("INSERT INTO sqlx_plus_office (office_name) VALUES (NULL)")?
                    .execute_update(session)
                    .await
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Database(..)));
    let rows = db
        .fetch(
            "SELECT office_name FROM sqlx_plus_office WHERE office_name = ?",
            &params!["Anytown"],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("office_name"), Some(&Value::Text("Anytown".into())));

    db.batch_exec(&["DROP TABLE sqlx_plus_office"]).await.unwrap();
}
