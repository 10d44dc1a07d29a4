//! Plain-text rendering of a variable tree.

use crate::inspect::tree::{NodeId, VariableTree};

/// Render the tree as indented labels, expanding `depth` levels below the
/// root. A depth of 1 shows only the frame's bindings.
pub fn render(tree: &mut VariableTree, depth: usize) -> String {
    let mut out = String::new();
    let root = tree.root();
    let top = tree.expand(root).to_vec();
    for child in top {
        render_node(tree, child, 0, depth, &mut out);
    }
    out
}

fn render_node(tree: &mut VariableTree, id: NodeId, level: usize, depth: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    for (idx, line) in tree.label(id).lines().enumerate() {
        out.push_str(&indent);
        if idx > 0 {
            out.push_str("  ");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    if level + 1 >= depth || !tree.has_children(id) {
        return;
    }
    let children = tree.expand(id).to_vec();
    for child in children {
        render_node(tree, child, level + 1, depth, out);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use expect_test::expect;
    use smol_str::SmolStr;

    use super::*;
    use crate::inspect::handlers::HandlerRegistry;
    use crate::value::{ObjectValue, Value};

    fn sample() -> VariableTree {
        let bindings = vec![
            ("a", Value::Int(1)),
            ("ax", Value::from(vec![5_i64, 6, 7])),
            (
                "b",
                Value::Map(vec![
                    (Value::from("d"), Value::Int(4)),
                    (Value::from("c"), Value::Int(3)),
                ]),
            ),
            ("e", ObjectValue::new("TestClass").with_field("x", Value::Int(456)).into()),
            ("ls", Value::from("\n  SELECT *\n  FROM mytable")),
        ];
        VariableTree::from_bindings(
            bindings.into_iter().map(|(name, value)| (SmolStr::from(name), value)),
            Arc::new(HandlerRegistry::new()),
        )
    }

    #[test]
    fn renders_top_level_only_at_depth_one() {
        let mut tree = sample();
        expect![[r#"
            a = {int} 1
            ax = {list} [5, 6, 7]
            b = {map} {"d": 4, "c": 3}
            e = {TestClass} <TestClass object>
            ls = {str} "\n  SELECT *\n  FROM mytable"
        "#]]
        .assert_eq(&render(&mut tree, 1));
    }

    #[test]
    fn renders_nested_levels() {
        let mut tree = sample();
        expect![[r#"
            a = {int} 1
            ax = {list} [5, 6, 7]
              __len__ = {int} 3
              0 = {int} 5
              1 = {int} 6
              2 = {int} 7
            b = {map} {"d": 4, "c": 3}
              __len__ = {int} 2
              c = {int} 3
              d = {int} 4
            e = {TestClass} <TestClass object>
              x = {int} 456
            ls = {str} "\n  SELECT *\n  FROM mytable"
              __str__ = {str}
                  SELECT *
                  FROM mytable
        "#]]
        .assert_eq(&render(&mut tree, 3));
    }
}
