//! Impure I/O operations for MQTT client
//!
//! [`MqttClient`] owns the rumqttc event loop and drives it on the calling
//! task. [`MqttHandle`] is the cloneable side: it enqueues requests on the
//! client channel and observes the connection state.

use super::connection::{
    configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig, REQUEST_CHANNEL_CAPACITY,
};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::BridgeConfig;
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

/// Upper bound on flushing the DISCONNECT packet during shutdown
pub const DISCONNECT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT client owning the network event loop
pub struct MqttClient {
    client_id: String,
    endpoint: String,
    subscribe_topic: String,
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    reconnect_config: ReconnectConfig,
}

impl MqttClient {
    /// Create the client from configuration
    ///
    /// Reads the certificate material; no network I/O happens until
    /// [`MqttClient::run`] polls the event loop.
    pub fn new(config: &BridgeConfig) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        let (state_tx, state_rx) =
            watch::channel(ConnectionState::Disconnected("Not yet connected".to_string()));

        Ok(MqttClient {
            client_id: config.client_id.clone(),
            endpoint: format!("{}:{}", config.endpoint, config.port),
            subscribe_topic: config.subscribe_topic.clone(),
            client,
            event_loop: Some(event_loop),
            state_tx,
            state_rx,
            reconnect_config: ReconnectConfig::default(),
        })
    }

    /// Override the reconnection backoff policy
    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.reconnect_config = reconnect_config;
        self
    }

    /// Cloneable handle for publishing from other tasks
    pub fn handle(&self) -> MqttHandle {
        MqttHandle {
            client: self.client.clone(),
            state_rx: self.state_rx.clone(),
        }
    }

    /// Get current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Drive the event loop until `shutdown_rx` turns true
    ///
    /// Events are dispatched one at a time. Connection errors are followed by
    /// a backoff sleep and another poll, which makes rumqttc reconnect. On
    /// shutdown a DISCONNECT is sent and flushed before returning.
    pub async fn run(&mut self, shutdown_rx: watch::Receiver<bool>) -> Result<(), MqttError> {
        let mut event_loop = self.event_loop.take().ok_or(MqttError::EventLoopTaken)?;
        let span = crate::mqtt_span!(client_id = %self.client_id, endpoint = %self.endpoint);

        async {
            self.poll_until_shutdown(&mut event_loop, shutdown_rx).await;
            self.shutdown(&mut event_loop).await;
        }
        .instrument(span)
        .await;

        Ok(())
    }

    async fn poll_until_shutdown(
        &self,
        event_loop: &mut EventLoop,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Connecting to MQTT broker");
        Self::transition(&self.state_tx, ConnectionEvent::ConnectStarted);

        let handle = self.handle();
        let mut reconnect_attempts = 0u32;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT event loop");
                        break;
                    }
                }

                event = event_loop.poll() => match event {
                    Ok(event) => {
                        let route = MessageHandler::route_mqtt_event(&event);
                        if route == EventRoute::ConnectionAcknowledged {
                            reconnect_attempts = 0;
                        }
                        Self::process_event_route(
                            route,
                            &handle,
                            &self.subscribe_topic,
                            &self.state_tx,
                        )
                        .await;
                    }
                    Err(e) => {
                        Self::transition(
                            &self.state_tx,
                            MessageHandler::classify_connection_error(&e),
                        );

                        let decision = HealthMonitor::should_attempt_reconnection(
                            reconnect_attempts,
                            &self.reconnect_config,
                            *shutdown_rx.borrow(),
                        );
                        match decision {
                            ReconnectionDecision::Proceed { attempt, delay } => {
                                reconnect_attempts = attempt;
                                Self::transition(
                                    &self.state_tx,
                                    ConnectionEvent::ReconnectionStarted(attempt),
                                );
                                warn!(
                                    attempt = attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    "Attempting reconnection after delay"
                                );
                                if !Self::interruptible_sleep(shutdown_rx.clone(), delay).await {
                                    break;
                                }
                            }
                            ReconnectionDecision::AbortShutdownRequested => {
                                info!("Shutdown signal received, stopping reconnection");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Send DISCONNECT and flush it while the broker closes the socket
    async fn shutdown(&self, event_loop: &mut EventLoop) {
        if !Self::request_disconnect(&self.handle(), &self.state_tx).await {
            return;
        }

        let drained = tokio::time::timeout(DISCONNECT_DRAIN_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(event) => debug!(target: "mqtt_transport", "Drained event: {:?}", event),
                    Err(e) => {
                        debug!(target: "mqtt_transport", "Event loop closed: {}", e);
                        break;
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Broker did not close the connection in time, dropping it");
        }
        info!("MQTT client disconnected");
    }

    /// Mark the connection as closing and ask the broker to disconnect
    ///
    /// Returns true when a DISCONNECT was queued and the event loop should
    /// be drained. Nothing is sent when the connection was not up.
    pub async fn request_disconnect<T: Transport>(
        transport: &T,
        state_tx: &watch::Sender<ConnectionState>,
    ) -> bool {
        let was_connected = HealthMonitor::can_publish(&state_tx.borrow());
        Self::transition(state_tx, ConnectionEvent::DisconnectRequested);

        if !was_connected {
            info!("MQTT event loop stopped while not connected");
            return false;
        }

        match transport.disconnect().await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to request disconnect: {}", e);
                false
            }
        }
    }

    /// Act on a routed MQTT event
    ///
    /// Generic over [`Transport`] so the dispatch rules can run against a
    /// mock. A successful CONNACK triggers exactly one subscription.
    pub async fn process_event_route<T: Transport>(
        route: EventRoute,
        transport: &T,
        subscribe_topic: &str,
        state_tx: &watch::Sender<ConnectionState>,
    ) {
        match route {
            EventRoute::ConnectionAcknowledged => {
                Self::transition(state_tx, ConnectionEvent::ConnAckReceived);
                match transport.subscribe(subscribe_topic).await {
                    Ok(()) => info!(topic = %subscribe_topic, "Subscribed to topic"),
                    Err(e) => error!(topic = %subscribe_topic, error = %e, "Failed to subscribe"),
                }
            }
            EventRoute::ConnectionRefused(code) => {
                Self::transition(state_tx, ConnectionEvent::ConnectRefused(code));
            }
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => {
                info!(
                    topic = %topic,
                    retain = retain,
                    payload = %MessageHandler::decode_payload(&payload),
                    "Message received"
                );
            }
            EventRoute::Disconnected => {
                Self::transition(state_tx, ConnectionEvent::DisconnectedByBroker);
                warn!("Unexpected disconnect from broker, reconnection will follow");
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                reason_codes,
            } => {
                info!(packet_id = packet_id, granted = ?reason_codes, "Subscription confirmed");
            }
            EventRoute::PublishAcknowledged { packet_id } => {
                info!(packet_id = packet_id, "Message published successfully");
            }
            EventRoute::InfrastructureEvent(event_str) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
            }
            EventRoute::OutgoingEvent => {}
        }
    }

    /// Apply a connection event to the shared state, logging real changes
    fn transition(state_tx: &watch::Sender<ConnectionState>, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = state_tx.send_replace(next.clone());
        if previous != next {
            HealthMonitor::log_state_transition(&previous, &next);
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Cloneable request handle onto the MQTT connection
#[derive(Clone)]
pub struct MqttHandle {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
}

impl MqttHandle {
    /// Check connection state before operations
    fn check_connection_state(&self) -> Result<(), MqttError> {
        let current_state = self.state_rx.borrow().clone();
        if !HealthMonitor::can_publish(&current_state) {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MqttHandle {
    type Error = MqttError;

    /// Publish at QoS 1, not retained
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.check_connection_state()?;

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error> {
        let current_state = self.state_rx.borrow().clone();
        if !HealthMonitor::can_subscribe(&current_state) {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }

        info!("Subscribing to topic: {}", topic);
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| {
                MqttError::SubscriptionFailed(format!("Failed to subscribe to {topic}: {e}").into())
            })
    }

    async fn wait_until_connected(&self) -> Result<(), Self::Error> {
        let mut state_rx = self.state_rx.clone();
        loop {
            if HealthMonitor::can_publish(&state_rx.borrow_and_update()) {
                return Ok(());
            }
            state_rx
                .changed()
                .await
                .map_err(|_| MqttError::StateChannelClosed)?;
        }
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::DisconnectFailed(Box::new(e)))
    }

    fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }
}
