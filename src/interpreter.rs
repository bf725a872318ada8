use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, trace};

use crate::dataset::{Datasets, ResultSet, TableName, Value};

const SQL_KEYWORDS: [&str; 8] = [
    "select", "from", "where", "and", "or", "order by", "group by", "having",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryError {
    InvalidSyntax,
    UnknownTable,
    Aborted,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidSyntax => {
                write!(f, "Invalid SQL syntax. Please use proper SQL keywords.")
            }
            QueryError::UnknownTable => write!(
                f,
                "Invalid table name. Available tables: categories, employees, products"
            ),
            QueryError::Aborted => write!(f, "Query execution stopped unexpectedly."),
        }
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryStats {
    pub rows: usize,
    pub elapsed: Duration,
}

impl QueryStats {
    pub fn summary(&self) -> String {
        format!(
            "{} rows in {:.3} seconds",
            self.rows,
            self.elapsed.as_secs_f64()
        )
    }
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: String,
    pub result: Result<ResultSet, QueryError>,
    pub stats: QueryStats,
}

/// Resolves query text against the static tables.
///
/// There is no parser: the query only has to mention a sql keyword and one of
/// the table names. The keyword check ignores case, the table lookup does not.
pub fn interpret(query: &str, datasets: &Datasets) -> Result<ResultSet, QueryError> {
    let lowered = query.to_lowercase();
    if !SQL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return Err(QueryError::InvalidSyntax);
    }

    let table = TableName::ALL
        .into_iter()
        .find(|t| query.contains(t.as_str()))
        .ok_or(QueryError::UnknownTable)?;
    let data = datasets.table(table);

    if table == TableName::Categories && lowered.contains("where") && lowered.contains("beverages")
    {
        trace!("Applying beverages filter");
        let Some(name_idx) = data.column_index("categoryName") else {
            return Ok(data.retain_rows(|_| false));
        };
        return Ok(data.retain_rows(|row| {
            matches!(row.get(name_idx), Some(Value::Text(name)) if name == "Beverages")
        }));
    }

    Ok(data.clone())
}

/// A query running on a background thread. Completes exactly once.
pub struct PendingQuery {
    query: String,
    receiver: Receiver<QueryOutcome>,
    started: Instant,
}

impl PendingQuery {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn running_for(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non blocking check for the outcome.
    pub fn poll(&self) -> Option<QueryOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // The worker can only vanish by panicking
                error!("Worker of query \"{}\" died without a result", self.query);
                Some(QueryOutcome {
                    query: self.query.clone(),
                    result: Err(QueryError::Aborted),
                    stats: QueryStats {
                        rows: 0,
                        elapsed: self.started.elapsed(),
                    },
                })
            }
        }
    }

    #[cfg(test)]
    pub fn wait(&self) -> Option<QueryOutcome> {
        self.receiver.recv().ok()
    }
}

pub struct QueryRunner {
    datasets: Arc<Datasets>,
    max_delay: Duration,
}

impl QueryRunner {
    pub fn new(datasets: Arc<Datasets>, max_delay: Duration) -> Self {
        Self {
            datasets,
            max_delay,
        }
    }

    /// Starts a query. Successful results become visible after a random delay
    /// in `[0, max_delay)` which is included in the reported elapsed time.
    pub fn spawn(&self, query: &str) -> PendingQuery {
        let (sender, receiver) = mpsc::channel();
        let started = Instant::now();
        let datasets = Arc::clone(&self.datasets);
        let max_delay_ms = self.max_delay.as_millis() as u64;
        let text = query.to_string();

        info!("Running query: {text}");
        thread::spawn(move || {
            let result = interpret(&text, &datasets);
            if result.is_ok() && max_delay_ms > 0 {
                let delay = rand::thread_rng().gen_range(0..max_delay_ms);
                debug!("Simulating {delay}ms of query latency");
                thread::sleep(Duration::from_millis(delay));
            }
            let rows = result.as_ref().map(|r| r.len()).unwrap_or(0);
            let outcome = QueryOutcome {
                query: text,
                result,
                stats: QueryStats {
                    rows,
                    elapsed: started.elapsed(),
                },
            };
            // The receiver is gone when the app quit while the query ran
            let _ = sender.send(outcome);
        });

        PendingQuery {
            query: query.to_string(),
            receiver,
            started,
        }
    }
}
