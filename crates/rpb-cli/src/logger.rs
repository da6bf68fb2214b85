//! Logging target printing observed traffic through tracing

use rpb_core::{MessageData, NodeId, ObjectId, ProtocolId, ProtocolType, ValueType};
use rpb_engine::LoggingTarget;
use tracing::info;

pub struct TracingLogger;

impl LoggingTarget for TracingLogger {
    fn add_log_data(
        &self,
        node: NodeId,
        protocol: ProtocolId,
        protocol_type: ProtocolType,
        object: ObjectId,
        data: &MessageData,
    ) {
        info!(
            target: "rpb::traffic",
            node = node.0,
            protocol = protocol.0,
            protocol_type = %protocol_type,
            object = %object,
            addressing = %data.addressing(),
            "{}",
            format_values(data)
        );
    }
}

fn format_values(data: &MessageData) -> String {
    match data.value_type() {
        ValueType::None => "poll".to_string(),
        ValueType::String => data.string().unwrap_or_default(),
        ValueType::Int | ValueType::Float => data
            .numeric_values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    }
}
