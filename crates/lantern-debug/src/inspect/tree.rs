//! Lazily populated variable tree.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::config::DEFAULT_LABEL_WIDTH;
use crate::inspect::handlers::{ChildSink, HandlerRegistry};
use crate::value::Value;

pub const LEN_CHILD: &str = "__len__";
pub const TEXT_CHILD: &str = "__str__";

/// Index of a node inside its [`VariableTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Classification of a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Mapping,
    Sequence,
    Structured,
    Text,
    /// Full printable form of a text value. Always a leaf.
    RawText,
    Scalar,
}

impl NodeKind {
    fn classify(value: &Value, handlers: &HandlerRegistry) -> Self {
        match value {
            Value::Map(_) => NodeKind::Mapping,
            Value::List(_) => NodeKind::Sequence,
            Value::Object(_) => NodeKind::Structured,
            Value::Opaque { type_name, .. } if handlers.contains(type_name) => {
                NodeKind::Structured
            }
            Value::Str(_) => NodeKind::Text,
            _ => NodeKind::Scalar,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableNode {
    name: String,
    value: Value,
    kind: NodeKind,
    has_children: bool,
    expanded: bool,
    synthetic: bool,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl VariableNode {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether the node was added by the inspector rather than the value.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Value part of the label.
    #[must_use]
    pub fn display_value(&self) -> String {
        match (&self.kind, &self.value) {
            (NodeKind::RawText, Value::Str(text)) => text.clone(),
            (_, value) => value.repr(),
        }
    }
}

/// Inspection tree for one frame's bindings.
///
/// Nodes live in an arena owned by the tree; parent links are indices.
#[derive(Debug, Clone)]
pub struct VariableTree {
    nodes: Vec<VariableNode>,
    handlers: Arc<HandlerRegistry>,
    label_width: usize,
}

impl VariableTree {
    /// Build the synthetic root mapping over `bindings`.
    #[must_use]
    pub fn from_bindings(
        bindings: impl IntoIterator<Item = (SmolStr, Value)>,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        let entries = bindings
            .into_iter()
            .map(|(name, value)| (Value::Str(name.to_string()), value))
            .collect();
        let mut tree = Self {
            nodes: Vec::new(),
            handlers,
            label_width: DEFAULT_LABEL_WIDTH,
        };
        tree.push_node(None, String::new(), Value::Map(entries), false);
        tree
    }

    #[must_use]
    pub fn with_label_width(mut self, label_width: usize) -> Self {
        self.label_width = label_width;
        self
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id. Ids are only handed out by this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &VariableNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn has_children(&self, id: NodeId) -> bool {
        self.node(id).has_children
    }

    #[must_use]
    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.node(id).expanded
    }

    /// Children computed so far, without populating.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Populate if needed and return the children.
    pub fn expand(&mut self, id: NodeId) -> &[NodeId] {
        self.populate_children(id);
        self.children(id)
    }

    /// Compute children once. Later calls are no-ops.
    pub fn populate_children(&mut self, id: NodeId) {
        let idx = id.index();
        if self.nodes[idx].expanded {
            return;
        }
        self.nodes[idx].expanded = true;
        let value = std::mem::take(&mut self.nodes[idx].value);
        match self.nodes[idx].kind {
            NodeKind::Mapping => self.populate_mapping(id, &value),
            NodeKind::Sequence => {
                if let Value::List(items) = &value {
                    for (index, item) in items.iter().enumerate() {
                        self.push_node(Some(id), index.to_string(), item.clone(), false);
                    }
                }
            }
            NodeKind::Structured => self.populate_structured(id, &value),
            NodeKind::Text => {
                self.push_node(Some(id), TEXT_CHILD.to_string(), value.clone(), true);
            }
            NodeKind::RawText | NodeKind::Scalar => {}
        }
        self.nodes[idx].value = value;
    }

    fn populate_mapping(&mut self, id: NodeId, value: &Value) {
        let Value::Map(entries) = value else {
            return;
        };
        let first = self.nodes[id.index()].children.len();
        for (key, item) in entries {
            self.push_node(Some(id), key.key_text(), item.clone(), false);
        }
        let all_text = entries.iter().all(|(key, _)| matches!(key, Value::Str(_)));
        if all_text {
            let mut entry_ids = self.nodes[id.index()].children.split_off(first);
            entry_ids.sort_by(|a, b| self.nodes[a.index()].name.cmp(&self.nodes[b.index()].name));
            self.nodes[id.index()].children.extend(entry_ids);
        }
    }

    fn populate_structured(&mut self, id: NodeId, value: &Value) {
        if let Value::Object(object) = value {
            for (name, field) in &object.fields {
                self.push_node(Some(id), name.to_string(), field.clone(), false);
            }
        }
        let Some(handler) = self.handlers.get(value.type_name()).cloned() else {
            return;
        };
        let mut sink = ChildSink::default();
        handler.contribute(value, &mut sink);
        for (name, child) in sink.into_entries() {
            self.push_node(Some(id), name.to_string(), child, true);
        }
    }

    fn push_node(
        &mut self,
        parent: Option<NodeId>,
        name: String,
        value: Value,
        synthetic: bool,
    ) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        let raw_text = parent.is_some_and(|parent| self.node(parent).kind == NodeKind::Text);
        let kind = if raw_text {
            NodeKind::RawText
        } else {
            NodeKind::classify(&value, &self.handlers)
        };
        let (has_children, len) = match (&kind, &value) {
            (NodeKind::Mapping, Value::Map(entries)) => (!entries.is_empty(), Some(entries.len())),
            (NodeKind::Sequence, Value::List(items)) => (!items.is_empty(), Some(items.len())),
            (NodeKind::Structured, Value::Object(object)) => (
                !object.fields.is_empty() || self.handlers.contains(&object.type_name),
                None,
            ),
            (NodeKind::Structured, _) | (NodeKind::Text, _) => (true, None),
            _ => (false, None),
        };
        self.nodes.push(VariableNode {
            name,
            value,
            kind,
            has_children,
            expanded: false,
            synthetic,
            children: Vec::new(),
            parent,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
            if let Some(len) = len {
                let len = i64::try_from(len).unwrap_or(i64::MAX);
                self.push_node(Some(id), LEN_CHILD.to_string(), Value::Int(len), true);
            }
        }
        id
    }

    /// `name = {type} value`, truncated to the label width.
    ///
    /// Raw text children keep their full text.
    #[must_use]
    pub fn label(&self, id: NodeId) -> String {
        let node = self.node(id);
        let label = format!(
            "{} = {{{}}} {}",
            node.name,
            node.value.type_name(),
            node.display_value()
        );
        if node.kind == NodeKind::RawText {
            return label;
        }
        truncate_label(label, self.label_width)
    }

    /// Expression that evaluates to this node from the frame's scope, e.g.
    /// `items[0]`, `config['mode']` or `point.x`.
    #[must_use]
    pub fn access_path(&self, id: NodeId) -> String {
        let node = self.node(id);
        let Some(parent_id) = node.parent else {
            return String::new();
        };
        let parent = self.node(parent_id);
        let mut path = self.access_path(parent_id);
        if parent.parent.is_none() {
            path.push_str(&node.name);
            return path;
        }
        if node.synthetic {
            path.push('.');
            path.push_str(&node.name);
            return path;
        }
        match parent.kind {
            NodeKind::Sequence => {
                path.push('[');
                path.push_str(&node.name);
                path.push(']');
            }
            NodeKind::Mapping => {
                path.push_str("['");
                path.push_str(&node.name);
                path.push_str("']");
            }
            _ => {
                path.push('.');
                path.push_str(&node.name);
            }
        }
        path
    }

    /// Walk a path of child names from the root, populating on the way.
    pub fn find(&mut self, path: &[&str]) -> Option<NodeId> {
        let mut current = self.root();
        for segment in path {
            let children = self.expand(current).to_vec();
            current = children
                .into_iter()
                .find(|child| self.nodes[child.index()].name == *segment)?;
        }
        Some(current)
    }
}

fn truncate_label(label: String, width: usize) -> String {
    if label.chars().count() <= width {
        return label;
    }
    let keep = width.saturating_sub(3);
    let mut out: String = label.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectValue;

    fn tree(bindings: Vec<(&str, Value)>) -> VariableTree {
        VariableTree::from_bindings(
            bindings
                .into_iter()
                .map(|(name, value)| (SmolStr::from(name), value)),
            Arc::new(HandlerRegistry::new()),
        )
    }

    fn child_names(tree: &mut VariableTree, id: NodeId) -> Vec<String> {
        let children = tree.expand(id).to_vec();
        children
            .into_iter()
            .map(|child| tree.node(child).name().to_string())
            .collect()
    }

    #[test]
    fn root_is_sorted_without_len_child() {
        let mut tree = tree(vec![("b", Value::Int(1)), ("a", Value::Int(2))]);
        let root = tree.root();
        assert_eq!(child_names(&mut tree, root), vec!["a", "b"]);
    }

    #[test]
    fn len_child_exists_before_expansion() {
        let mut tree = tree(vec![("xs", Value::from(vec![5_i64, 6, 7]))]);
        let xs = tree.find(&["xs"]).unwrap();
        assert!(!tree.is_expanded(xs));
        assert_eq!(tree.children(xs).len(), 1);
        assert_eq!(tree.label(tree.children(xs)[0]), "__len__ = {int} 3");
        assert_eq!(child_names(&mut tree, xs), vec!["__len__", "0", "1", "2"]);
    }

    #[test]
    fn population_is_idempotent() {
        let entries = vec![
            (Value::from("k"), Value::Int(1)),
            (Value::from("j"), Value::Int(2)),
        ];
        let mut tree = tree(vec![("m", Value::Map(entries))]);
        let m = tree.find(&["m"]).unwrap();
        let first = tree.expand(m).to_vec();
        let nodes = tree.len();
        let second = tree.expand(m).to_vec();
        assert_eq!(first, second);
        assert_eq!(tree.len(), nodes);
    }

    #[test]
    fn mixed_keys_keep_entry_order() {
        let mut tree = tree(vec![(
            "m",
            Value::Map(vec![
                (Value::from("z"), Value::Int(1)),
                (Value::Int(3), Value::Int(2)),
                (Value::from("a"), Value::Int(3)),
            ]),
        )]);
        let m = tree.find(&["m"]).unwrap();
        assert_eq!(child_names(&mut tree, m), vec!["__len__", "z", "3", "a"]);
    }

    #[test]
    fn text_has_single_leaf_with_full_text() {
        let mut tree = tree(vec![("sql", Value::from("SELECT *\nFROM t"))]);
        let sql = tree.find(&["sql"]).unwrap();
        assert!(tree.has_children(sql));
        assert_eq!(tree.label(sql), "sql = {str} \"SELECT *\\nFROM t\"");
        let raw = tree.expand(sql)[0];
        assert_eq!(tree.node(raw).kind(), NodeKind::RawText);
        assert!(!tree.has_children(raw));
        assert_eq!(tree.label(raw), "__str__ = {str} SELECT *\nFROM t");
        tree.populate_children(raw);
        assert!(tree.children(raw).is_empty());
    }

    #[test]
    fn empty_containers_report_no_children() {
        let mut tree = tree(vec![
            ("empty", Value::List(Vec::new())),
            ("bare", Value::from(ObjectValue::new("Marker"))),
            ("n", Value::Int(0)),
        ]);
        for name in ["empty", "bare", "n"] {
            let id = tree.find(&[name]).unwrap();
            assert!(!tree.has_children(id), "{name}");
        }
    }

    #[test]
    fn object_with_handler_has_children() {
        let mut handlers = HandlerRegistry::new();
        handlers.register("Marker", |_: &Value, out: &mut ChildSink| {
            out.push("handler test", 1_234_567_890_i64);
        });
        let mut tree = VariableTree::from_bindings(
            [(SmolStr::from("m"), Value::from(ObjectValue::new("Marker")))],
            Arc::new(handlers),
        );
        let m = tree.find(&["m"]).unwrap();
        assert!(tree.has_children(m));
        assert_eq!(child_names(&mut tree, m), vec!["handler test"]);
    }

    #[test]
    fn access_paths_follow_container_kind() {
        let config = Value::Map(vec![(Value::from("mode"), Value::from("fast"))]);
        let point = ObjectValue::new("Point")
            .with_field("x", Value::Int(1))
            .with_field("tags", Value::from(vec!["a"]));
        let mut tree = tree(vec![("config", config), ("point", point.into())]);

        let mode = tree.find(&["config", "mode"]).unwrap();
        assert_eq!(tree.access_path(mode), "config['mode']");
        let x = tree.find(&["point", "x"]).unwrap();
        assert_eq!(tree.access_path(x), "point.x");
        let tag = tree.find(&["point", "tags", "0"]).unwrap();
        assert_eq!(tree.access_path(tag), "point.tags[0]");
        let len = tree.find(&["point", "tags", "__len__"]).unwrap();
        assert_eq!(tree.access_path(len), "point.tags.__len__");
    }

    #[test]
    fn long_labels_are_truncated() {
        let long = "x".repeat(300);
        let mut tree = tree(vec![("s", Value::from(long))]).with_label_width(40);
        let s = tree.find(&["s"]).unwrap();
        let label = tree.label(s);
        assert_eq!(label.chars().count(), 40);
        assert!(label.ends_with("..."));
    }
}
