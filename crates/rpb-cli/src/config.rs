//! Configuration document loading and the quick bypass builder

use anyhow::{bail, Context, Result};
use rpb_core::{EngineConfig, HandlingConfig, IdAllocator, NodeConfig, ProtocolConfig, ProtocolRole};
use std::net::IpAddr;
use std::path::Path;

/// Read an engine configuration, TOML or JSON by file extension
pub fn load(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let config = parse(&text, extension).with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn parse(text: &str, extension: &str) -> Result<EngineConfig> {
    let config = match extension.to_ascii_lowercase().as_str() {
        "toml" => toml::from_str(text)?,
        "json" => serde_json::from_str(text)?,
        other => bail!("Unsupported configuration format '{}' (expected .toml or .json)", other),
    };
    Ok(config)
}

/// One OSC endpoint of a quick bypass
pub struct OscEndpoint {
    pub ip: IpAddr,
    pub send_port: u16,
    pub listen_port: u16,
}

/// Single-node OSC to OSC bypass with freshly allocated ids
pub fn quick_bypass(ids: &IdAllocator, a: OscEndpoint, b: OscEndpoint) -> Result<EngineConfig> {
    let node = NodeConfig::new(ids.next_node_id(), HandlingConfig::Bypass)
        .with_protocol(ProtocolConfig::osc(
            ids.next_protocol_id(),
            ProtocolRole::A,
            a.ip,
            a.send_port,
            a.listen_port,
        ))
        .with_protocol(ProtocolConfig::osc(
            ids.next_protocol_id(),
            ProtocolRole::B,
            b.ip,
            b.send_port,
            b.listen_port,
        ));
    let config = EngineConfig {
        logging_enabled: true,
        nodes: vec![node],
    };
    config.validate().context("Invalid bypass parameters")?;
    Ok(config)
}
