// crates/flowgate-server/src/mail.rs
// ============================================================================
// Module: Mail Wiring
// Description: Config-driven selection of the mail capability.
// Purpose: Keep SMTP delivery behind the narrow core Mailer interface.
// Dependencies: flowgate-core, flowgate-config, tokio, tracing
// ============================================================================

//! ## Overview
//! SMTP delivery itself is an external collaborator; the platform only
//! speaks the [`Mailer`] capability. [`RelayMailer`] represents a configured
//! relay: it enforces the configured send timeout and hands the message to
//! the transport hook. The default transport logs deliveries through
//! `tracing` (development behavior); deployments inject a real SMTP
//! transport at startup. Without any relay configuration the
//! [`flowgate_core::NoopMailer`] is wired instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowgate_config::MailConfig;
use flowgate_core::MailError;
use flowgate_core::MailMessage;
use flowgate_core::Mailer;
use flowgate_core::NoopMailer;

// ============================================================================
// SECTION: Transport Hook
// ============================================================================

/// Transport actually moving a message to the relay.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Send`] when the relay rejects the message.
    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Development transport: records the delivery in the process log.
pub struct TracingTransport;

#[async_trait]
impl MailTransport for TracingTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "mail delivered (log)");
        Ok(())
    }
}

// ============================================================================
// SECTION: Relay Mailer
// ============================================================================

/// Mailer bound to a configured relay, enforcing the send timeout.
///
/// # Invariants
/// - Every delivery observes `send_timeout`; overruns surface as
///   [`MailError::Timeout`].
pub struct RelayMailer {
    /// Transport hook.
    transport: Arc<dyn MailTransport>,
    /// Send deadline.
    send_timeout: Duration,
}

impl RelayMailer {
    /// Creates a relay mailer over a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn MailTransport>, send_timeout: Duration) -> Self {
        Self {
            transport,
            send_timeout,
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        match tokio::time::timeout(self.send_timeout, self.transport.deliver(message)).await {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(format!(
                "send exceeded {} ms",
                self.send_timeout.as_millis()
            ))),
        }
    }
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Builds the mail capability for the given configuration: a relay mailer
/// when an SMTP host is configured, the noop mailer otherwise.
#[must_use]
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    if config.smtp_host.is_some() {
        Arc::new(RelayMailer::new(
            Arc::new(TracingTransport),
            Duration::from_secs(config.send_timeout_secs),
        ))
    } else {
        Arc::new(NoopMailer)
    }
}
