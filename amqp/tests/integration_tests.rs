//! Integration tests for [`AmqpChannel`] against a real RabbitMQ instance.
//!
//! These tests use testcontainers to spin up RabbitMQ and validate:
//! - Fabric declaration, registration, and the publish/consume round-trip
//! - Ack removing a delivery permanently
//! - Reject-with-requeue redelivering a message
//! - Bounded waits timing out on an empty queue
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` by default because they require Docker and take several
//! seconds each to spin up a broker:
//! ```bash
//! cargo test -p conveyor-amqp --test integration_tests -- --ignored
//! ```
//!
//! # Panics
//!
//! These tests use `expect()` and `panic!()` for setup failures, which is
//! acceptable in test code.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use conveyor_amqp::AmqpChannel;
use conveyor_core::channel::{Channel, ConsumeOptions, WaitOutcome};
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::rabbitmq::RabbitMq;

const AMQP_PORT: u16 = 5672;

/// Start a RabbitMQ container and return its AMQP URI.
async fn start_rabbitmq() -> (testcontainers::ContainerAsync<RabbitMq>, String) {
    let container = RabbitMq::default()
        .start()
        .await
        .expect("Failed to start RabbitMQ container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(AMQP_PORT)
        .await
        .expect("Failed to get port");

    (container, format!("amqp://guest:guest@{host}:{port}/%2f"))
}

/// Publish a message through a separate raw lapin connection.
async fn publish(uri: &str, exchange: &str, routing_key: &str, payload: &[u8]) {
    let connection = Connection::connect(uri, ConnectionProperties::default())
        .await
        .expect("Failed to connect publisher");
    let channel = connection
        .create_channel()
        .await
        .expect("Failed to open publisher channel");

    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default(),
        )
        .await
        .expect("Failed to publish")
        .await
        .expect("Publish was not confirmed");
}

async fn connected_channel(uri: &str, queue: &str) -> AmqpChannel {
    let channel = AmqpChannel::builder()
        .uri(uri)
        .exchange("conveyor-test-exchange", "direct")
        .queue(queue)
        .routing_key(queue)
        .connect()
        .await
        .expect("Failed to connect channel");

    channel
        .setup_fabric()
        .await
        .expect("Failed to declare fabric");
    channel
        .register_consumer(&ConsumeOptions::queue(queue))
        .await
        .expect("Failed to register consumer");

    channel
}

#[tokio::test]
#[ignore]
async fn publish_consume_ack_round_trip() {
    let (_container, uri) = start_rabbitmq().await;
    let channel = connected_channel(&uri, "round-trip").await;

    publish(&uri, "conveyor-test-exchange", "round-trip", b"hello").await;

    let outcome = channel
        .wait(Some(Duration::from_secs(10)))
        .await
        .expect("Wait failed");

    let WaitOutcome::Delivery(delivery) = outcome else {
        panic!("Expected a delivery, got a timeout");
    };
    assert_eq!(delivery.payload, b"hello");
    assert_eq!(delivery.routing_key, "round-trip");
    assert!(!delivery.redelivered);

    channel
        .ack(delivery.delivery_tag)
        .await
        .expect("Ack failed");

    // Acked permanently: the queue is empty again.
    let outcome = channel
        .wait(Some(Duration::from_secs(2)))
        .await
        .expect("Wait failed");
    assert!(matches!(outcome, WaitOutcome::TimedOut));
}

#[tokio::test]
#[ignore]
async fn reject_with_requeue_redelivers_the_message() {
    let (_container, uri) = start_rabbitmq().await;
    let channel = connected_channel(&uri, "requeue").await;

    publish(&uri, "conveyor-test-exchange", "requeue", b"again").await;

    let first = channel
        .wait(Some(Duration::from_secs(10)))
        .await
        .expect("Wait failed");
    let WaitOutcome::Delivery(first) = first else {
        panic!("Expected a delivery, got a timeout");
    };

    channel
        .reject(first.delivery_tag, true)
        .await
        .expect("Reject failed");

    let second = channel
        .wait(Some(Duration::from_secs(10)))
        .await
        .expect("Wait failed");
    let WaitOutcome::Delivery(second) = second else {
        panic!("Expected a redelivery, got a timeout");
    };
    assert_eq!(second.payload, b"again");
    assert!(second.redelivered);

    channel
        .ack(second.delivery_tag)
        .await
        .expect("Ack failed");
}

#[tokio::test]
#[ignore]
async fn wait_on_an_empty_queue_times_out() {
    let (_container, uri) = start_rabbitmq().await;
    let channel = connected_channel(&uri, "empty").await;

    let outcome = channel
        .wait(Some(Duration::from_secs(1)))
        .await
        .expect("Wait failed");

    assert!(matches!(outcome, WaitOutcome::TimedOut));
    assert!(channel.is_ready());
}
