//! The single consumer that turns lines into delivered alerts.

use std::future::Future;

use poolwatch_alerts::AlertDispatcher;
use poolwatch_core::{AlertKind, ProcessorStats, StreamProcessor};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::source::LineSource;

/// Owns the processor and dispatcher for one watch session.
#[derive(Debug)]
pub struct Runner {
    processor: StreamProcessor,
    dispatcher: AlertDispatcher,
}

impl Runner {
    /// Creates a runner.
    #[must_use]
    pub const fn new(processor: StreamProcessor, dispatcher: AlertDispatcher) -> Self {
        Self {
            processor,
            dispatcher,
        }
    }

    /// Returns the processor.
    #[must_use]
    pub const fn processor(&self) -> &StreamProcessor {
        &self.processor
    }

    /// Handles one line, delivering any alerts before returning.
    pub async fn handle_line(&mut self, line: &str) {
        let Ok(intents) = self.processor.ingest_line(line) else {
            return;
        };

        for intent in &intents {
            let report = self.dispatcher.dispatch(intent).await;
            if report.failed > 0 && !report.any_delivered() {
                warn!(kind = %intent.kind, "alert was not delivered by any sink");
            }
        }
    }

    /// Consumes lines until the channel closes or `shutdown` resolves.
    ///
    /// Each line is fully processed, alerts included, before the next one is
    /// read or shutdown is observed.
    pub async fn run<F>(&mut self, mut lines: mpsc::Receiver<String>, shutdown: F) -> ProcessorStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                next = lines.recv() => {
                    let Some(line) = next else {
                        debug!("line source finished");
                        break;
                    };
                    self.handle_line(&line).await;
                }
            }
        }

        let stats = self.processor.stats();
        info!(
            lines_accepted = stats.lines_accepted,
            lines_rejected = stats.lines_rejected,
            failover_events = stats.failover_events,
            error_rate_checks = stats.error_rate_checks,
            alerts_emitted = stats.alerts_emitted,
            alerts_suppressed = stats.alerts_suppressed,
            active_pool = %self.processor.active_pool(),
            "watcher stopped"
        );
        for kind in AlertKind::ALL {
            if let Some(at) = self.processor.debouncer().last_fired(kind) {
                info!(kind = %kind, last_fired = %at, "last alert");
            }
        }
        stats
    }
}

/// Spawns `source`, feeds its lines to `runner`, and stops both on shutdown.
///
/// Source errors are logged; the runner still drains whatever was queued.
pub async fn watch<F>(
    runner: &mut Runner,
    source: LineSource,
    capacity: usize,
    shutdown: F,
) -> ProcessorStats
where
    F: Future<Output = ()>,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let reader = tokio::spawn(async move {
        if let Err(e) = source.run(tx).await {
            warn!(error = %e, "line source failed");
        }
    });

    let stats = runner.run(rx, shutdown).await;
    reader.abort();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use poolwatch_alerts::{AlertSink, DeliveryReceipt};
    use poolwatch_core::{AlertIntent, RecordParser, WatcherConfig};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct RecordingSink {
        seen: Mutex<Vec<AlertKind>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, intent: &AlertIntent) -> poolwatch_alerts::Result<DeliveryReceipt> {
            self.seen.lock().unwrap().push(intent.kind);
            Ok(DeliveryReceipt::new(self.name()))
        }
    }

    fn runner(config: WatcherConfig) -> (Runner, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = AlertDispatcher::new();
        dispatcher.add_sink(sink.clone());
        let processor = StreamProcessor::new(config).unwrap();
        (Runner::new(processor, dispatcher), sink)
    }

    fn line(pool: &str, status: u16) -> String {
        format!(r#"10.0.0.1 - - [01/Jan/2025:00:00:00 +0000] "GET / HTTP/1.1" {status} 12 pool="{pool}""#)
    }

    #[tokio::test]
    async fn drains_channel_until_closed() {
        let (mut runner, sink) = runner(WatcherConfig::default());
        let (tx, rx) = mpsc::channel(8);

        tx.send(line("blue", 200)).await.unwrap();
        tx.send("garbage".to_string()).await.unwrap();
        tx.send(line("green", 200)).await.unwrap();
        drop(tx);

        let stats = runner.run(rx, std::future::pending()).await;

        assert_eq!(stats.lines_accepted, 2);
        assert_eq!(stats.lines_rejected, 1);
        assert_eq!(stats.alerts_emitted, 1);
        assert_eq!(sink.seen.lock().unwrap().as_slice(), [AlertKind::Failover]);
        assert_eq!(runner.processor().active_pool(), "green");
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let (mut runner, sink) = runner(WatcherConfig::default());
        let (_tx, rx) = mpsc::channel::<String>(8);

        let stats = runner.run(rx, async {}).await;

        assert_eq!(stats, ProcessorStats::default());
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_rate_alert_reaches_sink() {
        let config = WatcherConfig::default()
            .with_window_capacity(4)
            .with_check_interval(4);
        let (mut runner, sink) = runner(config);

        for status in [200, 502, 503, 200] {
            runner.handle_line(&line("blue", status)).await;
        }

        assert_eq!(sink.seen.lock().unwrap().as_slice(), [AlertKind::ErrorRate]);
    }

    #[tokio::test]
    async fn text_only_parser_rejects_json_lines() {
        let processor = StreamProcessor::new(WatcherConfig::default())
            .unwrap()
            .with_parser(RecordParser::text_only());
        let mut runner = Runner::new(processor, AlertDispatcher::new());

        runner.handle_line(r#"{"pool":"green","status":200}"#).await;

        let stats = runner.processor().stats();
        assert_eq!(stats.lines_rejected, 1);
        assert_eq!(stats.failover_events, 0);
        assert_eq!(runner.processor().active_pool(), "blue");
    }

    #[tokio::test]
    async fn watch_reads_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        std::fs::write(&path, format!("{}\n{}\n", line("blue", 200), line("green", 200))).unwrap();

        let (mut runner, sink) = runner(WatcherConfig::default());
        let source = LineSource::File(
            crate::source::FileTailer::new(&path)
                .with_poll_interval(std::time::Duration::from_millis(10)),
        );

        let seen = Arc::clone(&sink);
        let shutdown = async move {
            while seen.seen.lock().unwrap().is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        };

        let stats = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            watch(&mut runner, source, 4, shutdown),
        )
        .await
        .unwrap();

        assert_eq!(stats.alerts_emitted, 1);
        assert_eq!(sink.seen.lock().unwrap().as_slice(), [AlertKind::Failover]);
    }
}
