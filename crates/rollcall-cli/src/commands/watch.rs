//! Watch command handler
//!
//! Follows the live user list and reprints it after every change.

use std::future::Future;

use anyhow::Result;
use tracing::debug;

use rollcall_core::{Config, Session, SessionEvent, SessionHandle};

use crate::output::Output;

/// Follow the user list until interrupted
pub async fn run(config: Config, search: Option<String>, output: &Output) -> Result<()> {
    let query = search.unwrap_or_default();
    output.message(&format!(
        "Watching {} (Ctrl-C to stop)",
        config.server_url
    ));

    let mut handle = Session::new(config)?.spawn();
    follow(&mut handle, &query, output, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    handle.shutdown().await;
    Ok(())
}

/// Print every view change until `stop` resolves or the session ends
///
/// `stop` is polled across iterations, so a signal that arrives while a
/// view is being printed still ends the loop.
async fn follow<F>(handle: &mut SessionHandle, query: &str, output: &Output, stop: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = handle.views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = handle.views.borrow_and_update().clone();
                output.print_view(&view, query);
            }
            event = handle.events.recv() => {
                match event {
                    Some(SessionEvent::Connected) => output.message("● connected"),
                    Some(SessionEvent::Disconnected) => output.message("○ disconnected, reconnecting..."),
                    Some(other) => debug!("Session event: {:?}", other),
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::output::OutputFormat;

    fn offline_config() -> Config {
        let mut config = Config::default();
        // Nothing listens on the discard port
        config.server_url = "http://127.0.0.1:9".to_string();
        config.request_timeout_secs = 2;
        config
    }

    #[tokio::test]
    async fn test_follow_stops_on_signal_while_busy() {
        let output = Output::new(OutputFormat::Quiet);
        let mut handle = Session::new(offline_config()).unwrap().spawn();

        // The failed snapshot keeps the loop busy before the stop fires
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            follow(
                &mut handle,
                "",
                &output,
                tokio::time::sleep(Duration::from_millis(300)),
            ),
        )
        .await;
        assert!(result.is_ok(), "follow did not stop");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_follow_stops_immediately() {
        let output = Output::new(OutputFormat::Quiet);
        let mut handle = Session::new(offline_config()).unwrap().spawn();

        let result =
            tokio::time::timeout(Duration::from_secs(1), follow(&mut handle, "", &output, async {}))
                .await;
        assert!(result.is_ok());

        handle.shutdown().await;
    }
}
