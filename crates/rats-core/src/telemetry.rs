//! Log output for harness runs.
//!
//! Logs always go to stderr, in text or JSON, so stdout stays free for the
//! `rats` report. The global subscriber can be set once per process; later
//! [`init_tracing`] calls are no-ops.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install stderr logging at `level`, or at `RUST_LOG` when it is set.
pub fn init_tracing(json: bool, level: Level) {
    subscriber(json, level, std::io::stderr).try_init().ok();
}

fn subscriber<W>(json: bool, level: Level, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let output = fmt::layer().with_target(false).with_writer(writer);
    let output: Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync> = if json {
        output.json().boxed()
    } else {
        output.boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::info;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(json: bool) -> String {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = subscriber(json, Level::INFO, move || sink.clone());
        tracing::subscriber::with_default(subscriber, || {
            info!(command = "cf app my-app", "cf");
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_json_lines_use_the_log_writer() {
        let out = capture(true);
        let line: serde_json::Value = serde_json::from_str(out.trim()).expect("one JSON line");
        assert_eq!(line["fields"]["message"], "cf");
        assert_eq!(line["fields"]["command"], "cf app my-app");
    }

    #[test]
    fn test_text_lines_use_the_log_writer() {
        let out = capture(false);
        assert!(out.contains("cf app my-app"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
    }
}
