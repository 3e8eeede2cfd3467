//! Race-free aggregation of failure records.
//!
//! Producers hold a [`FailureSink`] and only ever send. A single spawned
//! task owns the record list and appends in arrival order. The list is
//! handed back through the task's join handle once every sink is gone.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Output of one invocation that reported issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Checker command identifier
    pub command: String,
    /// Captured combined output
    pub output: Vec<u8>,
}

impl FailureRecord {
    pub fn new(command: impl Into<String>, output: Vec<u8>) -> Self {
        Self {
            command: command.into(),
            output,
        }
    }
}

/// Sending half given to running jobs.
#[derive(Debug, Clone)]
pub struct FailureSink {
    tx: mpsc::Sender<FailureRecord>,
}

impl FailureSink {
    /// Queue a record, waiting if the channel is full.
    pub async fn send(&self, record: FailureRecord) {
        if let Err(e) = self.tx.send(record).await {
            log::error!("collector stopped before receiving output of {}", e.0.command);
        }
    }
}

/// The single consumer of failure records.
pub struct Collector {
    tx: mpsc::Sender<FailureRecord>,
    handle: JoinHandle<Vec<FailureRecord>>,
}

impl Collector {
    /// Start the consumer task with a channel of `capacity` records.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<FailureRecord>(capacity.max(1));
        let handle = tokio::spawn(async move {
            let mut records = Vec::new();
            while let Some(record) = rx.recv().await {
                records.push(record);
            }
            records
        });
        Self { tx, handle }
    }

    /// A new sending handle.
    pub fn sink(&self) -> FailureSink {
        FailureSink {
            tx: self.tx.clone(),
        }
    }

    /// Close the channel and wait for the consumer to drain it.
    ///
    /// Must be called only after every job holding a sink has finished;
    /// the returned list is complete once this resolves.
    pub async fn finish(self) -> Vec<FailureRecord> {
        let Collector { tx, handle } = self;
        drop(tx);
        match handle.await {
            Ok(records) => records,
            Err(e) => {
                log::error!("failure collector task did not complete: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_collector() {
        let collector = Collector::spawn(4);
        assert!(collector.finish().await.is_empty());
    }

    #[tokio::test]
    async fn test_preserves_arrival_order() {
        let collector = Collector::spawn(1);
        let sink = collector.sink();
        for i in 0..10 {
            sink.send(FailureRecord::new("lint", format!("{}", i).into_bytes()))
                .await;
        }
        drop(sink);
        let records = collector.finish().await;
        let outputs: Vec<String> = records
            .iter()
            .map(|r| String::from_utf8(r.output.clone()).unwrap())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(outputs, expected);
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let collector = Collector::spawn(2);
        let mut handles = Vec::new();
        for p in 0..8 {
            let sink = collector.sink();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    sink.send(FailureRecord::new(format!("c{}", p), vec![i])).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let records = collector.finish().await;
        assert_eq!(records.len(), 8 * 25);

        // Per-producer order survives interleaving
        let c3: Vec<u8> = records
            .iter()
            .filter(|r| r.command == "c3")
            .map(|r| r.output[0])
            .collect();
        assert_eq!(c3, (0..25).collect::<Vec<u8>>());
    }
}
