//! Dispatch of routed MQTT events against the mock transport

use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{
    ConnAck, ConnectReturnCode, Disconnect, DisconnectReasonCode, Packet, Publish,
};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::Event;
use telemetry_bridge::testing::MockTransport;
use telemetry_bridge::transport::mqtt::{
    ConnectionState, EventRoute, MessageHandler, MqttClient,
};
use tokio::sync::watch;

const SUBSCRIBE_TOPIC: &str = "commands/bridge";

fn connack(code: ConnectReturnCode) -> Event {
    Event::Incoming(Packet::ConnAck(ConnAck {
        session_present: false,
        code,
        properties: None,
    }))
}

async fn dispatch(
    event: &Event,
    transport: &MockTransport,
    state_tx: &watch::Sender<ConnectionState>,
) {
    let route = MessageHandler::route_mqtt_event(event);
    MqttClient::process_event_route(route, transport, SUBSCRIBE_TOPIC, state_tx).await;
}

#[tokio::test]
async fn test_connack_subscribes_exactly_once() {
    let transport = MockTransport::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    dispatch(&connack(ConnectReturnCode::Success), &transport, &state_tx).await;

    assert_eq!(*state_rx.borrow(), ConnectionState::Connected);
    assert_eq!(transport.get_subscriptions().await, vec![SUBSCRIBE_TOPIC]);
}

#[tokio::test]
async fn test_every_reconnect_resubscribes() {
    let transport = MockTransport::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    dispatch(&connack(ConnectReturnCode::Success), &transport, &state_tx).await;
    let disconnect = Event::Incoming(Packet::Disconnect(Disconnect {
        reason_code: DisconnectReasonCode::ServerShuttingDown,
        properties: None,
    }));
    dispatch(&disconnect, &transport, &state_tx).await;
    assert!(matches!(*state_rx.borrow(), ConnectionState::Disconnected(_)));

    dispatch(&connack(ConnectReturnCode::Success), &transport, &state_tx).await;
    assert_eq!(
        transport.get_subscriptions().await,
        vec![SUBSCRIBE_TOPIC, SUBSCRIBE_TOPIC]
    );
}

#[tokio::test]
async fn test_refused_connack_does_not_subscribe() {
    let transport = MockTransport::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    dispatch(&connack(ConnectReturnCode::NotAuthorized), &transport, &state_tx).await;

    assert!(transport.get_subscriptions().await.is_empty());
    assert!(matches!(
        &*state_rx.borrow(),
        ConnectionState::Disconnected(reason) if reason.contains("NotAuthorized")
    ));
}

#[tokio::test]
async fn test_failed_subscription_keeps_connection() {
    let transport = MockTransport::with_failure();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    dispatch(&connack(ConnectReturnCode::Success), &transport, &state_tx).await;

    assert_eq!(*state_rx.borrow(), ConnectionState::Connected);
    assert!(transport.get_subscriptions().await.is_empty());
}

#[tokio::test]
async fn test_incoming_message_is_only_logged() {
    let transport = MockTransport::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);

    let publish = Event::Incoming(Packet::Publish(Publish {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: Bytes::from(SUBSCRIBE_TOPIC),
        pkid: 7,
        payload: Bytes::from_static(&[0x6f, 0x6b, 0xff]),
        properties: None,
    }));
    assert!(matches!(
        MessageHandler::route_mqtt_event(&publish),
        EventRoute::MessageReceived { .. }
    ));
    dispatch(&publish, &transport, &state_tx).await;

    assert_eq!(*state_rx.borrow(), ConnectionState::Connected);
    assert!(transport.get_published_messages().await.is_empty());
    assert!(transport.get_subscriptions().await.is_empty());
}

#[tokio::test]
async fn test_acknowledgements_do_not_change_state() {
    let transport = MockTransport::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);

    for route in [
        EventRoute::PublishAcknowledged { packet_id: 3 },
        EventRoute::SubscriptionConfirmed {
            packet_id: 1,
            reason_codes: vec!["QoS1".to_string()],
        },
        EventRoute::InfrastructureEvent("PingResp".to_string()),
        EventRoute::OutgoingEvent,
    ] {
        MqttClient::process_event_route(route, &transport, SUBSCRIBE_TOPIC, &state_tx).await;
    }

    assert_eq!(*state_rx.borrow(), ConnectionState::Connected);
    assert!(transport.get_subscriptions().await.is_empty());
}
