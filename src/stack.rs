/// Stack data model, create-request schema, and the pure field formatters used
/// by the stack list cards.
use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ActionError;

// ── StackSummary ──────────────────────────────────────────────────────────────

/// Server-owned snapshot of one stack. Every field may be absent; the client
/// never mutates one, it only replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackSummary {
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub pod_id: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub node_public_ip: Option<String>,
    /// Kept as raw JSON: the mapping shape is rendered leniently.
    #[serde(default)]
    pub ports: Option<Value>,
    #[serde(default)]
    pub ttl_expires_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub requested_cpu_milli: Option<i64>,
    #[serde(default)]
    pub requested_memory_bytes: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortMapping {
    pub container_port: u32,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub node_port: Option<u32>,
}

impl StackSummary {
    pub fn port_mappings(&self) -> Option<Vec<PortMapping>> {
        let ports = self.ports.as_ref()?;
        serde_json::from_value(ports.clone()).ok()
    }
}

#[derive(Debug, Deserialize)]
struct StackListBody {
    #[serde(default)]
    stacks: Option<Vec<StackSummary>>,
}

/// Decode a `GET /stacks` body. `{"stacks": null}` is an empty list.
pub fn decode_stack_list(body: &Value) -> Result<Vec<StackSummary>, String> {
    serde_json::from_value::<StackListBody>(body.clone())
        .map(|b| b.stacks.unwrap_or_default())
        .map_err(|e| format!("unexpected stack list payload: {e}"))
}

/// Presentation class for the open-ended status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Creating,
    Running,
    Stopped,
    Failed,
    NodeDeleted,
    Unknown,
}

impl StatusClass {
    pub fn of(status: Option<&str>) -> Self {
        match status.map(str::trim).unwrap_or("") {
            "creating" => StatusClass::Creating,
            "running" => StatusClass::Running,
            "stopped" => StatusClass::Stopped,
            "failed" => StatusClass::Failed,
            "node_deleted" => StatusClass::NodeDeleted,
            _ => StatusClass::Unknown,
        }
    }
}

// ── Field formatters ──────────────────────────────────────────────────────────

pub const MISSING: &str = "-";

pub fn format_text(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => MISSING.to_string(),
    }
}

/// Absent → `-`; RFC 3339 → canonical UTC with millis; anything else verbatim.
pub fn format_timestamp(value: Option<&str>) -> String {
    let Some(raw) = value.filter(|s| !s.trim().is_empty()) else {
        return MISSING.to_string();
    };
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => ts.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
        Err(_) => raw.to_string(),
    }
}

pub fn format_bytes(value: Option<i64>) -> String {
    const KIB: f64 = 1024.0;
    let Some(n) = value else {
        return MISSING.to_string();
    };
    let f = n as f64;
    if f < KIB {
        format!("{n} B")
    } else if f < KIB * KIB {
        format!("{:.1} KB", f / KIB)
    } else if f < KIB * KIB * KIB {
        format!("{:.1} MB", f / (KIB * KIB))
    } else {
        format!("{:.2} GB", f / (KIB * KIB * KIB))
    }
}

pub fn format_cpu_milli(value: Option<i64>) -> String {
    match value {
        Some(n) => format!("{n}m"),
        None => MISSING.to_string(),
    }
}

/// `80/TCP -> 31001, 53/UDP -> 31002`; unknown shapes are shown as compact JSON.
pub fn format_ports(stack: &StackSummary) -> String {
    let Some(raw) = &stack.ports else {
        return MISSING.to_string();
    };
    match stack.port_mappings() {
        Some(list) if list.is_empty() => MISSING.to_string(),
        Some(list) => list
            .iter()
            .map(|p| {
                let proto = p.protocol.as_deref().unwrap_or("TCP");
                match p.node_port {
                    Some(np) => format!("{}/{proto} -> {np}", p.container_port),
                    None => format!("{}/{proto}", p.container_port),
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        None if raw.is_null() => MISSING.to_string(),
        None => raw.to_string(),
    }
}

// ── Create request ────────────────────────────────────────────────────────────

pub const MAX_TARGET_PORTS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortSpec {
    pub container_port: u16,
    pub protocol: Protocol,
}

/// Wire shape of `target_port`. The service has been seen accepting both; the
/// config picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PortEncoding {
    /// `[{"container_port": 80, "protocol": "TCP"}]`
    #[default]
    List,
    /// `80` (single TCP port only)
    Integer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetPort {
    Single(u16),
    List(Vec<PortSpec>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateStackRequest {
    pub target_port: TargetPort,
    pub pod_spec: String,
}

/// Parse `PORT[/PROTO]` entries separated by commas.
pub fn parse_port_specs(input: &str) -> Result<Vec<PortSpec>, ActionError> {
    let entries: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if entries.is_empty() {
        return Err(ActionError::validation("target_port is required"));
    }
    if entries.len() > MAX_TARGET_PORTS {
        return Err(ActionError::validation(format!(
            "target_port exceeds limit (max {MAX_TARGET_PORTS})"
        )));
    }

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(entries.len());
    for entry in entries {
        let (port_str, proto_str) = match entry.split_once('/') {
            Some((p, proto)) => (p.trim(), Some(proto.trim())),
            None => (entry, None),
        };
        let port: u16 = port_str
            .parse()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| ActionError::validation(format!("invalid target_port {entry:?}: port must be 1-65535")))?;
        let protocol = match proto_str.map(str::to_ascii_lowercase).as_deref() {
            None | Some("tcp") => Protocol::Tcp,
            Some("udp") => Protocol::Udp,
            Some(other) => {
                return Err(ActionError::validation(format!(
                    "invalid target_port {entry:?}: protocol {other:?} must be tcp or udp"
                )));
            }
        };
        let spec = PortSpec { container_port: port, protocol };
        if !seen.insert(spec) {
            return Err(ActionError::validation(format!("duplicate target_port entry {entry:?}")));
        }
        specs.push(spec);
    }
    Ok(specs)
}

pub fn build_create_request(
    port_input: &str,
    pod_spec: &str,
    encoding: PortEncoding,
) -> Result<CreateStackRequest, ActionError> {
    let specs = parse_port_specs(port_input)?;
    if pod_spec.trim().is_empty() {
        return Err(ActionError::validation("pod_spec is required"));
    }
    let target_port = match encoding {
        PortEncoding::List => TargetPort::List(specs),
        PortEncoding::Integer => match specs.as_slice() {
            [PortSpec { container_port, protocol: Protocol::Tcp }] => TargetPort::Single(*container_port),
            _ => {
                return Err(ActionError::validation(
                    "integer target_port encoding accepts exactly one TCP port",
                ));
            }
        },
    };
    Ok(CreateStackRequest { target_port, pod_spec: pod_spec.to_string() })
}

pub const DEFAULT_POD_SPEC: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: challenge
spec:
  containers:
    - name: app
      image: nginx:stable
      ports:
        - containerPort: 80
          protocol: TCP
      resources:
        requests:
          cpu: "100m"
          memory: "128Mi"
        limits:
          cpu: "100m"
          memory: "128Mi""#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_format_bytes_thresholds() {
        assert_eq!(format_bytes(Some(512)), "512 B");
        assert_eq!(format_bytes(Some(1023)), "1023 B");
        assert_eq!(format_bytes(Some(1536)), "1.5 KB");
        assert_eq!(format_bytes(Some(2_097_152)), "2.0 MB");
        assert_eq!(format_bytes(Some(1_073_741_824)), "1.00 GB");
        assert_eq!(format_bytes(None), "-");
    }

    #[test]
    fn test_format_cpu_milli() {
        assert_eq!(format_cpu_milli(Some(250)), "250m");
        assert_eq!(format_cpu_milli(None), "-");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(None), "-");
        assert_eq!(format_timestamp(Some("")), "-");
        assert_eq!(
            format_timestamp(Some("2025-03-01T10:00:00+09:00")),
            "2025-03-01T01:00:00.000Z"
        );
        assert_eq!(format_timestamp(Some("yesterday-ish")), "yesterday-ish");
    }

    #[test]
    fn test_format_text_missing_and_empty() {
        assert_eq!(format_text(None), "-");
        assert_eq!(format_text(Some("  ")), "-");
        assert_eq!(format_text(Some("ns-1")), "ns-1");
    }

    #[test]
    fn test_format_ports() {
        let mut s = StackSummary {
            ports: Some(serde_json::json!([
                {"container_port": 80, "protocol": "TCP", "node_port": 31001},
                {"container_port": 53, "protocol": "UDP"}
            ])),
            ..Default::default()
        };
        assert_eq!(format_ports(&s), "80/TCP -> 31001, 53/UDP");

        s.ports = Some(serde_json::json!("odd"));
        assert_eq!(format_ports(&s), "\"odd\"");

        s.ports = None;
        assert_eq!(format_ports(&s), "-");
    }

    #[test]
    fn test_decode_stack_list() {
        let body = serde_json::json!({"stacks": [
            {"stack_id": "a", "status": "running", "requested_memory_bytes": 134217728},
            {"stack_id": "b", "node_public_ip": null}
        ]});
        let stacks = decode_stack_list(&body).unwrap();
        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[0].stack_id, "a");
        assert_eq!(stacks[0].requested_memory_bytes, Some(134_217_728));
        assert_eq!(stacks[1].node_public_ip, None);

        assert!(decode_stack_list(&serde_json::json!({"stacks": null})).unwrap().is_empty());
        assert!(decode_stack_list(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_status_class() {
        assert_eq!(StatusClass::of(Some("running")), StatusClass::Running);
        assert_eq!(StatusClass::of(Some("node_deleted")), StatusClass::NodeDeleted);
        assert_eq!(StatusClass::of(Some("weird")), StatusClass::Unknown);
        assert_eq!(StatusClass::of(None), StatusClass::Unknown);
    }

    #[test]
    fn test_parse_port_specs() {
        let specs = parse_port_specs("80, 8080/tcp ,53/UDP").unwrap();
        assert_eq!(
            specs,
            vec![
                PortSpec { container_port: 80, protocol: Protocol::Tcp },
                PortSpec { container_port: 8080, protocol: Protocol::Tcp },
                PortSpec { container_port: 53, protocol: Protocol::Udp },
            ]
        );
    }

    #[test]
    fn test_parse_port_specs_rejects_bad_input() {
        for bad in ["", " , ", "0", "70000", "http", "80/sctp", "80, 80/tcp"] {
            let err = parse_port_specs(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "input {bad:?}");
        }
        let many = (1..=25).map(|p| p.to_string()).collect::<Vec<_>>().join(",");
        assert!(parse_port_specs(&many).is_err());
    }

    #[test]
    fn test_create_request_list_encoding() {
        let req = build_create_request("80", DEFAULT_POD_SPEC, PortEncoding::List).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json["target_port"],
            serde_json::json!([{"container_port": 80, "protocol": "TCP"}])
        );
        assert_eq!(json["pod_spec"], serde_json::json!(DEFAULT_POD_SPEC));
    }

    #[test]
    fn test_create_request_integer_encoding() {
        let req = build_create_request("8080", "kind: Pod", PortEncoding::Integer).unwrap();
        assert_eq!(serde_json::to_value(&req).unwrap()["target_port"], serde_json::json!(8080));

        assert!(build_create_request("80,81", "kind: Pod", PortEncoding::Integer).is_err());
        assert!(build_create_request("53/udp", "kind: Pod", PortEncoding::Integer).is_err());
    }

    #[test]
    fn test_create_request_requires_pod_spec() {
        let err = build_create_request("80", "   ", PortEncoding::List).unwrap_err();
        assert_eq!(err.to_string(), "pod_spec is required");
    }
}
