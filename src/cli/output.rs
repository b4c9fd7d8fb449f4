//! Output formatting for dissection results.
//!
//! Text output prints a summary line per frame followed by the indented
//! tree; JSON output prints one object per frame (JSON Lines).

use std::io::Write;

use clap::ValueEnum;
use serde_json::{json, Map, Value};

use crate::session::Dissection;
use crate::tree::{hex, FieldValue, Node, ResultTree};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Summary line plus indented tree (default)
    Text,
    /// JSON Lines (one JSON object per frame)
    Json,
}

/// Formats dissections for output.
pub struct OutputFormatter {
    format: OutputFormat,
    summary_only: bool,
}

impl OutputFormatter {
    /// Create a new formatter with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            summary_only: false,
        }
    }

    /// Print only the summary of each frame.
    pub fn summary_only(mut self, summary_only: bool) -> Self {
        self.summary_only = summary_only;
        self
    }

    /// Format one dissection and write it to the given writer.
    pub fn write<W: Write>(&self, dissection: &Dissection, writer: &mut W) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => self.write_text(dissection, writer),
            OutputFormat::Json => self.write_json(dissection, writer),
        }
    }

    fn write_text<W: Write>(&self, dissection: &Dissection, writer: &mut W) -> std::io::Result<()> {
        let summary = dissection.summary();
        let frame = &dissection.frame;
        writeln!(
            writer,
            "{:>6} {} {:<10} {}",
            frame.number,
            FieldValue::Time(frame.timestamp_us),
            summary.protocol,
            summary.info
        )?;
        if !self.summary_only {
            for line in dissection.tree().render_text().lines() {
                writeln!(writer, "    {line}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_json<W: Write>(&self, dissection: &Dissection, writer: &mut W) -> std::io::Result<()> {
        let summary = dissection.summary();
        let frame = &dissection.frame;
        let mut obj = Map::new();
        obj.insert("frame".into(), json!(frame.number));
        obj.insert("timestamp_us".into(), json!(frame.timestamp_us));
        obj.insert("protocols".into(), json!(summary.protocols));
        obj.insert("protocol".into(), json!(summary.protocol));
        obj.insert("info".into(), json!(summary.info));
        if !self.summary_only {
            let tree = dissection.tree();
            let roots: Vec<Value> = tree
                .roots()
                .iter()
                .filter_map(|id| tree.node(*id))
                .map(|node| node_json(tree, node))
                .collect();
            obj.insert("tree".into(), Value::Array(roots));
        }
        writeln!(writer, "{}", Value::Object(obj))
    }
}

/// Typed JSON rendering of a field value.
fn value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::None => Value::Null,
        FieldValue::UInt8(v) => json!(v),
        FieldValue::UInt16(v) => json!(v),
        FieldValue::UInt32(v) => json!(v),
        FieldValue::UInt64(v) => json!(v),
        FieldValue::Int64(v) | FieldValue::Time(v) | FieldValue::Duration(v) => json!(v),
        FieldValue::Bool(v) => json!(v),
        FieldValue::Bytes(b) => json!(hex(b)),
        other => json!(other.to_string()),
    }
}

fn node_json(tree: &ResultTree, node: &Node) -> Value {
    let mut obj = Map::new();
    if !node.abbrev.is_empty() {
        obj.insert("name".into(), json!(node.abbrev));
    }
    obj.insert("text".into(), json!(node.display_text()));
    if !node.value.is_none() {
        obj.insert("value".into(), value_json(&node.value));
    }
    obj.insert("source".into(), json!(node.range.source.0));
    obj.insert("offset".into(), json!(node.range.offset));
    obj.insert("length".into(), json!(node.range.len));
    if node.generated {
        obj.insert("generated".into(), json!(true));
    }
    if let Some(expert) = &node.expert {
        obj.insert(
            "expert".into(),
            json!({
                "severity": expert.severity.as_str(),
                "kind": expert.kind,
                "message": expert.message,
            }),
        );
    }
    if !node.children.is_empty() {
        let children: Vec<Value> = node
            .children
            .iter()
            .filter_map(|id| tree.node(*id))
            .map(|child| node_json(tree, child))
            .collect();
        obj.insert("children".into(), Value::Array(children));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::{dissect_frame, EthBuilder};

    fn sample() -> Dissection {
        let frame = EthBuilder::new().ipv4_udp([10, 0, 0, 1], [10, 0, 0, 2], 40000, 40001, b"hi");
        dissect_frame(&frame)
    }

    #[test]
    fn test_text_output() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let mut out = Vec::new();
        formatter.write(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let first = text.lines().next().unwrap();
        assert!(first.contains("UDP"));
        assert!(first.ends_with("40000 → 40001 Len=2"));
        assert!(text.contains("    Internet Protocol Version 4, Src: 10.0.0.1, Dst: 10.0.0.2\n"));
    }

    #[test]
    fn test_summary_only() {
        let formatter = OutputFormatter::new(OutputFormat::Text).summary_only(true);
        let mut out = Vec::new();
        formatter.write(&sample(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_json_output() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let mut out = Vec::new();
        formatter.write(&sample(), &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["frame"], json!(1));
        assert_eq!(value["protocols"], json!("frame:eth:ip:udp"));
        let tree = value["tree"].as_array().unwrap();
        let udp = tree.iter().find(|n| n["name"] == json!("udp")).unwrap();
        let src_port = udp["children"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["name"] == json!("udp.srcport"))
            .unwrap();
        assert_eq!(src_port["value"], json!(40000));
        assert_eq!(src_port["offset"], json!(34));
    }

    #[test]
    fn test_value_json() {
        assert_eq!(value_json(&FieldValue::bytes(b"\x01\x02")), json!("0102"));
        assert_eq!(value_json(&FieldValue::string("x")), json!("x"));
        assert_eq!(value_json(&FieldValue::None), Value::Null);
    }
}
