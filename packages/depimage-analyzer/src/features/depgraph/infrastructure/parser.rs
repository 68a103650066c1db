//! Minimal DOT-format reader for DepGraph files.
//!
//! The design treats the DOT dialect and its parser as an external
//! collaborator (spec §1, §6): "the engine only consumes the parsed
//! graph structure." This reader exists only to give the binary a real
//! input path; it recognizes one pragmatic node/edge label convention
//! rather than the full DOT grammar:
//!
//! ```dot
//! digraph g {
//!   n0 [label="input:user_input"];
//!   n1 [label="literal:<script>"];
//!   n2 [label="op:htmlspecialchars"];
//!   n3 [label="sink"];
//!   n0 -> n2 [label="0"];
//!   n2 -> n3 [label="0"];
//! }
//! ```

use super::super::domain::{DepGraph, Node, NodeId};
use crate::errors::{EngineError, EngineResult};
use rustc_hash::FxHashMap;

pub fn parse_str(source: &str) -> EngineResult<DepGraph> {
    let mut graph = DepGraph::new();
    let mut ids: FxHashMap<String, NodeId> = FxHashMap::default();
    // (parent, child_index, child) deferred until every node line is seen,
    // since DOT allows edges to reference nodes declared later.
    let mut pending_edges: Vec<(String, usize, String)> = Vec::new();

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim().trim_end_matches(';').trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with("digraph") || line == "}" || line == "{" {
            continue;
        }

        if let Some(arrow) = line.find("->") {
            let (lhs, rest) = line.split_at(arrow);
            let rhs = &rest[2..];
            let from = lhs.trim().to_string();
            let (to, idx) = parse_edge_target(rhs, lineno)?;
            pending_edges.push((from, idx, to));
            continue;
        }

        let (name, label) = parse_node_line(line, lineno)?;
        let node = parse_node_label(&label, lineno)?;
        let id = graph.add_node(node);
        ids.insert(name, id);
    }

    for (from, idx, to) in pending_edges {
        let from_id = *ids
            .get(&from)
            .ok_or_else(|| EngineError::parse_error(format!("edge references undeclared node {from}")))?;
        let to_id = *ids
            .get(&to)
            .ok_or_else(|| EngineError::parse_error(format!("edge references undeclared node {to}")))?;
        graph.add_child(from_id, idx, to_id);
    }

    Ok(graph)
}

fn parse_node_line(line: &str, lineno: usize) -> EngineResult<(String, String)> {
    let bracket = line
        .find('[')
        .ok_or_else(|| EngineError::parse_error(format!("line {lineno}: expected `[label=...]`")))?;
    let name = line[..bracket].trim().to_string();
    let attrs = &line[bracket + 1..];
    let close = attrs
        .rfind(']')
        .ok_or_else(|| EngineError::parse_error(format!("line {lineno}: unterminated `[`")))?;
    let attrs = &attrs[..close];
    let label = extract_quoted(attrs, "label").ok_or_else(|| {
        EngineError::parse_error(format!("line {lineno}: missing label attribute"))
    })?;
    Ok((name, label))
}

fn parse_edge_target(rhs: &str, lineno: usize) -> EngineResult<(String, usize)> {
    let bracket = rhs.find('[');
    let (name, attrs) = match bracket {
        Some(b) => (rhs[..b].trim().to_string(), Some(&rhs[b + 1..])),
        None => (rhs.trim().to_string(), None),
    };
    let idx = attrs
        .and_then(|a| extract_quoted(a, "label"))
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(0);
    if name.is_empty() {
        return Err(EngineError::parse_error(format!("line {lineno}: empty edge target")));
    }
    Ok((name, idx))
}

fn extract_quoted(attrs: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=\"");
    let start = attrs.find(&needle)? + needle.len();
    let end = attrs[start..].find('"')? + start;
    Some(attrs[start..end].to_string())
}

fn parse_node_label(label: &str, lineno: usize) -> EngineResult<Node> {
    if label == "sink" {
        return Ok(Node::Sink);
    }
    if let Some(rest) = label.strip_prefix("input:") {
        return Ok(Node::Input { name: rest.to_string() });
    }
    if let Some(rest) = label.strip_prefix("literal:") {
        return Ok(Node::Literal { value: rest.as_bytes().to_vec() });
    }
    if let Some(rest) = label.strip_prefix("op:") {
        return Ok(Node::Operation { op: rest.to_string() });
    }
    Err(EngineError::parse_error(format!(
        "line {lineno}: unrecognized node label {label:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_straight_line_graph() {
        let dot = r#"
            digraph g {
              n0 [label="input:user_input"];
              n1 [label="op:htmlspecialchars"];
              n2 [label="sink"];
              n0 -> n1 [label="0"];
              n1 -> n2 [label="0"];
            }
        "#;
        let graph = parse_str(dot).unwrap();
        assert_eq!(graph.node_count(), 3);
        let input = graph.find_input("user_input").unwrap();
        assert!(matches!(graph.node(input), Node::Input { .. }));
    }

    #[test]
    fn rejects_unknown_label() {
        let dot = r#"digraph g { n0 [label="mystery"]; }"#;
        assert!(parse_str(dot).is_err());
    }
}
