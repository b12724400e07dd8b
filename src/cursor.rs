//! Batched row iteration over a server-side cursor
//!
//! `each(batch_size)` runs inside a dedicated transaction on a pooled
//! connection: DECLARE, FETCH in batches, CLOSE, COMMIT. Rows arrive in
//! strict fetch order; a `false` from the callback stops iteration
//! before the next batch is fetched. Cancellation and errors close the
//! cursor and roll the transaction back — resources are released on
//! every exit path.

use crate::error::SyncError;
use crate::introspect::{CancelToken, Row, SchemaClient};

const CURSOR_NAME: &str = "relq_each_cursor";

/// Iterate `sql`'s result rows in batches, invoking `callback` per row.
/// Returns the number of rows delivered.
pub async fn each<F>(
    client: &dyn SchemaClient,
    sql: &str,
    batch_size: u32,
    cancel: &CancelToken,
    mut callback: F,
) -> Result<u64, SyncError>
where
    F: FnMut(Row) -> bool + Send,
{
    if batch_size == 0 {
        return Err(SyncError::Query("batch size must be >= 1".to_string()));
    }
    if !client.is_pooled() {
        return Err(SyncError::Configuration(
            "cursor iteration requires a pooled connection; enable pooling or use pagination"
                .to_string(),
        ));
    }

    client
        .execute("BEGIN")
        .await
        .map_err(|e| SyncError::Connectivity(e.to_string()))?;
    if let Err(e) = client
        .execute(&format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {sql}"))
        .await
    {
        let _ = client.execute("ROLLBACK").await;
        return Err(SyncError::Query(e.to_string()));
    }

    let mut delivered = 0u64;
    let outcome = loop {
        if let Err(err) = cancel.check("cursor fetch") {
            break Err(err);
        }

        let batch = match client
            .query(&format!("FETCH FORWARD {batch_size} FROM {CURSOR_NAME}"))
            .await
        {
            Ok(batch) => batch,
            Err(e) => break Err(SyncError::Query(e.to_string())),
        };
        if batch.is_empty() {
            break Ok(());
        }

        let batch_len = batch.len();
        let mut stopped = false;
        for row in batch {
            delivered += 1;
            if !callback(row) {
                stopped = true;
                break;
            }
        }
        if stopped || batch_len < batch_size as usize {
            break Ok(());
        }
    };

    match outcome {
        Ok(()) => {
            let _ = client.execute(&format!("CLOSE {CURSOR_NAME}")).await;
            client
                .execute("COMMIT")
                .await
                .map_err(|e| SyncError::Connectivity(e.to_string()))?;
            Ok(delivered)
        }
        Err(err) => {
            // Close then roll back, even when the close itself fails.
            let _ = client.execute(&format!("CLOSE {CURSOR_NAME}")).await;
            let _ = client.execute("ROLLBACK").await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::ClientError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Pooled fake serving `total` numbered rows through FETCH FORWARD.
    struct CursorClient {
        total: usize,
        served: Mutex<usize>,
        statements: Mutex<Vec<String>>,
        pooled: bool,
    }

    impl CursorClient {
        fn new(total: usize) -> Self {
            Self {
                total,
                served: Mutex::new(0),
                statements: Mutex::new(Vec::new()),
                pooled: true,
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }

        fn fetch_count(&self) -> usize {
            self.statements()
                .iter()
                .filter(|s| s.starts_with("FETCH"))
                .count()
        }
    }

    #[async_trait]
    impl SchemaClient for CursorClient {
        async fn ping(&self) -> Result<(), ClientError> {
            Ok(())
        }

        async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
            self.statements.lock().unwrap().push(sql.to_string());
            let batch_size: usize = sql
                .split_whitespace()
                .nth(2)
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let mut served = self.served.lock().unwrap();
            let remaining = self.total - *served;
            let count = remaining.min(batch_size);
            let rows = (0..count)
                .map(|i| Row::new().with("n", (*served + i).to_string()))
                .collect();
            *served += count;
            Ok(rows)
        }

        async fn execute(&self, sql: &str) -> Result<u64, ClientError> {
            self.statements.lock().unwrap().push(sql.to_string());
            Ok(0)
        }

        fn is_pooled(&self) -> bool {
            self.pooled
        }
    }

    #[tokio::test]
    async fn test_rows_arrive_in_order() {
        let client = CursorClient::new(7);
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        let delivered = each(&client, "SELECT n FROM series", 3, &cancel, |row| {
            seen.push(row.get_i64("n").unwrap());
            true
        })
        .await
        .unwrap();

        assert_eq!(delivered, 7);
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(client.fetch_count(), 3, "7 rows at batch size 3 is 3 fetches");

        let statements = client.statements();
        assert_eq!(statements.first().map(|s| s.as_str()), Some("BEGIN"));
        assert!(statements.iter().any(|s| s.starts_with("DECLARE")));
        assert!(statements.iter().any(|s| s.starts_with("CLOSE")));
        assert_eq!(statements.last().map(|s| s.as_str()), Some("COMMIT"));
    }

    #[tokio::test]
    async fn test_false_from_callback_stops_before_next_batch() {
        let client = CursorClient::new(100);
        let cancel = CancelToken::new();
        let mut seen = 0;

        let delivered = each(&client, "SELECT n FROM series", 10, &cancel, |_| {
            seen += 1;
            seen < 5
        })
        .await
        .unwrap();

        assert_eq!(delivered, 5);
        assert_eq!(client.fetch_count(), 1, "no further batch after the stop");
    }

    #[tokio::test]
    async fn test_unpooled_client_is_a_configuration_error() {
        let mut client = CursorClient::new(10);
        client.pooled = false;
        let cancel = CancelToken::new();

        let err = each(&client, "SELECT 1", 10, &cancel, |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(client.statements().is_empty(), "no transaction was opened");
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let client = CursorClient::new(10);
        let cancel = CancelToken::new();
        let err = each(&client, "SELECT 1", 0, &cancel, |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Query(_)));
    }

    #[tokio::test]
    async fn test_cancellation_closes_and_rolls_back() {
        let client = CursorClient::new(100);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = each(&client, "SELECT n FROM series", 10, &cancel, |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled(_)));

        let statements = client.statements();
        assert!(statements.iter().any(|s| s.starts_with("CLOSE")));
        assert_eq!(statements.last().map(|s| s.as_str()), Some("ROLLBACK"));
    }
}
