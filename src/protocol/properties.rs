//! Client properties advertised in Start-Ok.

use crate::codec::{FieldTable, FieldValue};
use crate::config::ConnectionConfig;

/// Product name reported to the broker
pub const PRODUCT: &str = "amqp-handshake";

/// Broker features this client understands.
const CAPABILITIES: &[&str] = &[
    "publisher_confirms",
    "exchange_exchange_bindings",
    "basic.nack",
    "consumer_cancel_notify",
    "connection.blocked",
    "authentication_failure_close",
];

/// Build the `client-properties` table for `config`.
pub fn client_properties(config: &ConnectionConfig) -> FieldTable {
    let capabilities: FieldTable = CAPABILITIES
        .iter()
        .map(|name| ((*name).to_string(), FieldValue::Bool(true)))
        .collect();

    let mut properties = FieldTable::new()
        .with("product", PRODUCT)
        .with("version", crate::VERSION)
        .with(
            "platform",
            format!("Rust ({}/{})", std::env::consts::OS, std::env::consts::ARCH),
        )
        .with("information", "https://www.rabbitmq.com/amqp-0-9-1-reference.html")
        .with("capabilities", capabilities);

    if let Some(name) = config.connection_name() {
        properties.insert("connection_name", name);
    }

    properties
}
