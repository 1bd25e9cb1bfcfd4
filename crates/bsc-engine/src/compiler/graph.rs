//! Graphviz export of the AST store

use crate::compiler::ast::{AstStore, ValueType};
use crate::compiler::error::CompileResult;
use std::fmt::Write;

/// Render `store` as a Graphviz digraph.
///
/// Nodes are named by their offset, so the picture lines up with the `.ast`
/// file and with error messages.
pub fn to_dot(store: &AstStore) -> CompileResult<String> {
    let nodes = store.nodes()?;
    let mut out = String::from("digraph L {\nnode [shape=Mrecord]\n");

    for node in &nodes {
        let mut label = node.node_type.name().to_string();
        for token in &node.tokens {
            let _ = write!(label, "<br/><font point-size=\"10\">{}</font>", escape(token));
        }
        if node.value_type != ValueType::None {
            let _ = write!(label, "<br/><i>{}</i>", node.value_type);
        }
        if let Some(value) = node.folded_value() {
            let _ = write!(label, "<br/>= {}", value);
        }
        let _ = writeln!(out, "{} [label=<{}>]", node.id.offset(), label);
    }

    for node in &nodes {
        for child in node.children.iter().filter(|child| !child.is_none()) {
            let _ = writeln!(out, "{} -> {}", node.id.offset(), child.offset());
        }
    }

    out.push_str("}\n");
    Ok(out)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{NewNode, NodeId, NodeType};

    #[test]
    fn test_dot_has_nodes_and_edges() {
        let mut store = AstStore::new();
        let stmt = store
            .append_child(NewNode::new(NodeType::Statement), NodeId::NONE, 0)
            .unwrap();
        let decl = store
            .append_child(
                NewNode::new(NodeType::Declaration)
                    .with_token("short")
                    .with_token("x")
                    .with_value_type(ValueType::Short),
                stmt,
                1,
            )
            .unwrap();

        let dot = to_dot(&store).unwrap();
        assert!(dot.starts_with("digraph L {\nnode [shape=Mrecord]\n"));
        assert!(dot.contains(&format!(
            "{} [label=<Declaration<br/><font point-size=\"10\">short</font>\
             <br/><font point-size=\"10\">x</font><br/><i>short</i>>]",
            decl.offset()
        )));
        assert!(dot.contains(&format!("{} -> {}", stmt.offset(), decl.offset())));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_empty_store() {
        assert_eq!(to_dot(&AstStore::new()).unwrap(), "digraph L {\nnode [shape=Mrecord]\n}\n");
    }
}
