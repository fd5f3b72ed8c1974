// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process shutdown signaling.
//!
//! One [`CancellationToken`] fans out to everything with a run loop: the
//! gateway's graceful shutdown, the sweep task, and campaign runners all
//! watch the same token.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawn a task that cancels the returned token on SIGTERM or SIGINT.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "shutdown signal received");
        trigger.cancel();
    });

    token
}

/// Resolve when a termination signal arrives, naming which one.
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            // No SIGTERM stream; Ctrl+C still works.
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl+C"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_starts_uncancelled() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn child_tokens_follow_the_root() {
        let token = install_signal_handler();
        let child = token.child_token();
        token.cancel();
        assert!(child.is_cancelled());
    }
}
