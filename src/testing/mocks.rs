//! Mock implementations for testing
//!
//! Provides a mock [`Transport`] that records every publish and subscribe
//! so the publisher and event dispatch can be tested without a broker.

use crate::transport::{mqtt::ConnectionState, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

pub type PublishedMessage = (String, Vec<u8>);

/// Error returned by [`MockTransport`]
#[derive(Debug, Error)]
pub enum MockTransportError {
    #[error("Mock {0} failure")]
    Injected(&'static str),
    #[error("Mock transport not connected: {0:?}")]
    NotConnected(ConnectionState),
}

/// Mock transport for testing
///
/// Clones share their records, so a test keeps one clone and hands the
/// other to the code under test.
#[derive(Debug, Clone)]
pub struct MockTransport {
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub subscriptions: Arc<Mutex<Vec<String>>>,
    pub disconnect_count: Arc<Mutex<usize>>,
    should_fail: Arc<AtomicBool>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            published_messages: Arc::default(),
            subscriptions: Arc::default(),
            disconnect_count: Arc::default(),
            should_fail: Arc::default(),
            state: Arc::new(watch::channel(ConnectionState::Connected).0),
        }
    }
}

impl MockTransport {
    /// Connected mock that accepts every request
    pub fn new() -> Self {
        Self::default()
    }

    /// Connected mock that rejects every request
    pub fn with_failure() -> Self {
        let transport = Self::default();
        transport.set_should_fail(true);
        transport
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    pub async fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn get_disconnect_count(&self) -> usize {
        *self.disconnect_count.lock().await
    }

    pub async fn clear_history(&self) {
        self.published_messages.lock().await.clear();
        self.subscriptions.lock().await.clear();
        *self.disconnect_count.lock().await = 0;
    }

    fn check(&self, operation: &'static str) -> Result<(), MockTransportError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(MockTransportError::Injected(operation));
        }
        let state = self.connection_state();
        if state != ConnectionState::Connected {
            return Err(MockTransportError::NotConnected(state));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.check("publish")?;
        self.published_messages
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error> {
        self.check("subscribe")?;
        self.subscriptions.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn wait_until_connected(&self) -> Result<(), Self::Error> {
        let mut state_rx = self.state.subscribe();
        loop {
            if *state_rx.borrow_and_update() == ConnectionState::Connected {
                return Ok(());
            }
            if state_rx.changed().await.is_err() {
                return Err(MockTransportError::NotConnected(self.connection_state()));
            }
        }
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        *self.disconnect_count.lock().await += 1;
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }
}
