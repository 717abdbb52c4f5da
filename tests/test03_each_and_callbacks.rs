use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sqlite_bridge::prelude::*;
use tokio::sync::oneshot;

async fn numbers(count: i64) -> Result<Connection, SqliteBridgeError> {
    let conn = Connection::open(":memory:", OpenOptions::new()).await?;
    conn.exec_sql("create table nums (n integer)", ()).await?;
    for n in 0..count {
        conn.exec_sql("insert into nums (n) values (?)", n).await?;
    }
    Ok(conn)
}

#[tokio::test]
async fn each_streams_rows_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(5).await?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let (done_tx, done_rx) = oneshot::channel();

    let count = conn
        .each("select n from nums order by n", ())
        .on_row(move |row| {
            sink.lock().expect("sink").push(row.get(0).and_then(Value::as_int));
            Ok(())
        })
        .on_complete(move |outcome| {
            let _ = done_tx.send(outcome);
        })
        .await?;

    let seen = seen.lock().expect("seen").clone();
    assert_eq!(count, 5);
    assert_eq!(seen, (0..5).map(Some).collect::<Vec<_>>());
    assert_eq!(done_rx.await?, Ok(5));
    Ok(())
}

#[tokio::test]
async fn each_on_an_empty_result_completes_with_zero() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(3).await?;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let (done_tx, done_rx) = oneshot::channel();

    let count = conn
        .each("select n from nums where n < 0", ())
        .on_row(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_complete(move |outcome| {
            let _ = done_tx.send(outcome);
        })
        .await?;

    assert_eq!(count, 0);
    assert_eq!(done_rx.await?, Ok(0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn each_honours_a_mode_override() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(1).await?;
    let (row_tx, row_rx) = std::sync::mpsc::channel();
    conn.each("select n from nums", ())
        .mode(DisplayMode::new(RowShape::Named, ValueTyping::Stringified))
        .on_row(move |row| {
            row_tx.send(row)?;
            Ok(())
        })
        .await?;
    let row = row_rx.recv()?;
    assert_eq!(row.get_named("n"), Some(&Value::Text("0".into())));
    Ok(())
}

#[tokio::test]
async fn each_without_row_callback_fails_fast() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(2).await?;
    let (done_tx, done_rx) = oneshot::channel();
    let outcome = conn
        .each("select n from nums", ())
        .on_complete(move |outcome| {
            let _ = done_tx.send(outcome);
        })
        .run()
        .await;
    assert!(matches!(outcome, Err(SqliteBridgeError::CallbackContract(_))));
    assert_eq!(done_rx.await?, outcome);
    Ok(())
}

#[tokio::test]
async fn row_callback_errors_stop_iteration() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(10).await?;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let outcome = conn
        .each("select n from nums", ())
        .on_row(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                return Err("enough".into());
            }
            Ok(())
        })
        .await;
    assert_eq!(outcome, Err(SqliteBridgeError::RowCallback("enough".into())));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // the aborted statement was finalized
    assert_eq!(conn.exec_sql("drop table nums", ()).await?, None);
    Ok(())
}

#[tokio::test]
async fn row_callback_panics_are_reported() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(3).await?;
    let outcome = conn
        .each("select n from nums", ())
        .on_row(|_| panic!("bad row handler"))
        .await;
    assert!(matches!(outcome, Err(SqliteBridgeError::RowCallback(_))));
    assert_eq!(conn.all("select n from nums", ()).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn callback_and_deferred_agree() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(0).await?;
    let calls = Arc::new(AtomicUsize::new(0));

    let (tx, rx) = oneshot::channel();
    let counter = Arc::clone(&calls);
    let value = conn
        .exec_sql("insert into nums (n) values (?)", 11_i64)
        .with_callback(move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        })
        .await;
    assert_eq!(value, Ok(Some(1)));
    assert_eq!(rx.await?, value);

    let (tx, rx) = oneshot::channel();
    let counter = Arc::clone(&calls);
    let value = conn
        .get("select nope from nums", ())
        .with_callback(move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        })
        .await;
    assert!(matches!(value, Err(SqliteBridgeError::Prepare(_))));
    assert_eq!(rx.await?, value);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn fire_and_forget_calls_run_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let conn = numbers(0).await?;
    for n in 0..3_i64 {
        drop(conn.exec_sql("insert into nums (n) values (?)", n));
    }
    let (tx, rx) = oneshot::channel();
    drop(conn.exec_sql("insert into nums (n) values (?)", 3_i64).with_callback(move |outcome| {
        let _ = tx.send(outcome);
    }));

    assert_eq!(rx.await?, Ok(Some(4)));
    let rows = conn.all("select n from nums order by rowid", ()).await?;
    let values: Vec<_> = rows.iter().filter_map(|row| row.get(0).and_then(Value::as_int)).collect();
    assert_eq!(values, vec![0, 1, 2, 3]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connections_keep_their_own_modes() -> Result<(), Box<dyn std::error::Error>> {
    let positional = numbers(1).await?;
    let named = numbers(1).await?;
    named.set_row_shape(RowShape::Named);
    named.set_value_typing(ValueTyping::Stringified);

    let (a, b) = tokio::join!(
        positional.get("select n from nums", ()),
        named.get("select n from nums", ())
    );
    assert_eq!(a?, Some(Row::Positional(vec![Value::Integer(0)])));
    let b = b?.expect("row");
    assert_eq!(b.get_named("n"), Some(&Value::Text("0".into())));
    Ok(())
}
