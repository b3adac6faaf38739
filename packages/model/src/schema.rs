//! # Grammar
//!
//! Immutable mapping from type name to node and mark definitions.
//!
//! A `Schema` is compiled once from declarative [`NodeSpec`] and [`MarkSpec`]
//! records and then shared (cheap `Clone`) by every snapshot built on it.
//! Compilation parses content expressions, resolves groups and derives the
//! structural flags that nodes carry.

use crate::attrs::Attrs;
use crate::content::ContentExpr;
use crate::error::SchemaError;
use crate::mark::Mark;
use crate::node::{Fragment, Node, NodeFlags, TEXT_NODE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Attribute declaration. An attribute without a default is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl AttrSpec {
    pub fn required() -> Self {
        Self { default: None }
    }

    pub fn with_default(value: impl Into<Value>) -> Self {
        Self {
            default: Some(value.into()),
        }
    }
}

/// Declarative node type record contributed by an extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub name: String,

    /// Content expression (empty for leaves)
    #[serde(default)]
    pub content: String,

    /// Space separated group names
    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub inline: bool,

    /// Whitespace-significant content (code blocks, chunks)
    #[serde(default)]
    pub code: bool,

    #[serde(default)]
    pub attrs: BTreeMap<String, AttrSpec>,

    /// Allowed marks: `None` = default, `"_"` = all, `""` = none,
    /// otherwise space separated mark names
    #[serde(default)]
    pub marks: Option<String>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            group: String::new(),
            inline: false,
            code: false,
            attrs: BTreeMap::new(),
            marks: None,
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        self.attrs.insert(name.into(), spec);
        self
    }

    pub fn marks(mut self, marks: impl Into<String>) -> Self {
        self.marks = Some(marks.into());
        self
    }
}

/// Declarative mark type record contributed by an extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSpec {
    pub name: String,

    #[serde(default)]
    pub attrs: BTreeMap<String, AttrSpec>,

    /// Whether the mark extends to text typed at its end
    #[serde(default = "default_true")]
    pub inclusive: bool,

    /// Marks this one excludes: `None` = same type only, `"_"` = all
    #[serde(default)]
    pub excludes: Option<String>,

    /// Content carrying this mark is code (no input rules, no other marks)
    #[serde(default)]
    pub code: bool,
}

fn default_true() -> bool {
    true
}

impl MarkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            inclusive: true,
            excludes: None,
            code: false,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        self.attrs.insert(name.into(), spec);
        self
    }

    pub fn non_inclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn excludes(mut self, excludes: impl Into<String>) -> Self {
        self.excludes = Some(excludes.into());
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MarkFilter {
    All,
    None,
    Only(Vec<String>),
}

/// Compiled node type
#[derive(Debug, Clone)]
pub struct NodeType {
    spec: NodeSpec,
    content: ContentExpr,
    groups: Vec<String>,
    flags: NodeFlags,
    allowed_marks: MarkFilter,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub fn content_expr(&self) -> &ContentExpr {
        &self.content
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.leaf
    }

    pub fn is_inline(&self) -> bool {
        self.flags.inline
    }

    pub fn is_textblock(&self) -> bool {
        self.flags.textblock
    }

    pub fn is_code(&self) -> bool {
        self.flags.code
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }
}

/// Compiled mark type
#[derive(Debug, Clone)]
pub struct MarkType {
    spec: MarkSpec,
    rank: usize,
}

impl MarkType {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &MarkSpec {
        &self.spec
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn is_code(&self) -> bool {
        self.spec.code
    }

    pub fn is_inclusive(&self) -> bool {
        self.spec.inclusive
    }

    /// Whether this mark type excludes `other` from the same mark set
    pub fn excludes(&self, other: &str) -> bool {
        match self.spec.excludes.as_deref() {
            None => other == self.spec.name,
            Some("_") => true,
            Some(list) => list.split_whitespace().any(|name| name == other),
        }
    }
}

struct SchemaInner {
    nodes: Vec<NodeType>,
    node_index: HashMap<String, usize>,
    marks: Vec<MarkType>,
    mark_index: HashMap<String, usize>,
    top_node: String,
}

/// Immutable, shareable grammar
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("top_node", &self.inner.top_node)
            .field("nodes", &self.inner.nodes.iter().map(NodeType::name).collect::<Vec<_>>())
            .field("marks", &self.inner.marks.iter().map(MarkType::name).collect::<Vec<_>>())
            .finish()
    }
}

impl Schema {
    /// Compile a grammar from node and mark records
    pub fn new(nodes: Vec<NodeSpec>, marks: Vec<MarkSpec>, top_node: &str) -> Result<Self, SchemaError> {
        let mut node_index = HashMap::new();
        for (i, spec) in nodes.iter().enumerate() {
            if node_index.insert(spec.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateType(spec.name.clone()));
            }
        }
        let mut mark_index = HashMap::new();
        for (i, spec) in marks.iter().enumerate() {
            if node_index.contains_key(&spec.name) || mark_index.insert(spec.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateType(spec.name.clone()));
            }
        }
        if !node_index.contains_key(top_node) {
            return Err(SchemaError::MissingTopNode(top_node.to_string()));
        }
        if !node_index.contains_key(TEXT_NODE) {
            return Err(SchemaError::MissingText);
        }

        // Parse content expressions first; flags depend on the whole set
        let mut exprs = Vec::with_capacity(nodes.len());
        for spec in &nodes {
            let expr = ContentExpr::parse(&spec.content).map_err(|e| SchemaError::InvalidContent {
                node_type: spec.name.clone(),
                message: e.to_string(),
            })?;
            exprs.push(expr);
        }

        let groups: Vec<Vec<String>> = nodes
            .iter()
            .map(|spec| spec.group.split_whitespace().map(str::to_string).collect())
            .collect();
        let inline_of = |name: &str| -> Option<bool> {
            if let Some(&i) = node_index.get(name) {
                return Some(nodes[i].inline || nodes[i].name == TEXT_NODE);
            }
            // A group is inline if any member is inline
            let members: Vec<usize> = (0..nodes.len())
                .filter(|&i| groups[i].iter().any(|g| g == name))
                .collect();
            if members.is_empty() {
                None
            } else {
                Some(members.iter().any(|&i| nodes[i].inline || nodes[i].name == TEXT_NODE))
            }
        };

        let mut compiled = Vec::with_capacity(nodes.len());
        for ((spec, expr), node_groups) in nodes.iter().zip(exprs).zip(groups.iter()) {
            let mut inline_content = false;
            for name in expr.names() {
                match inline_of(name) {
                    Some(inline) => inline_content |= inline,
                    None => {
                        return Err(SchemaError::InvalidContent {
                            node_type: spec.name.clone(),
                            message: format!("unknown type or group '{}'", name),
                        })
                    }
                }
            }
            for mark_name in spec.marks.as_deref().unwrap_or_default().split_whitespace() {
                if mark_name != "_" && !mark_index.contains_key(mark_name) {
                    return Err(SchemaError::UnknownMarkType(mark_name.to_string()));
                }
            }
            let is_text = spec.name == TEXT_NODE;
            let allowed_marks = match spec.marks.as_deref() {
                Some("_") => MarkFilter::All,
                Some("") => MarkFilter::None,
                Some(list) => MarkFilter::Only(list.split_whitespace().map(str::to_string).collect()),
                None if spec.code => MarkFilter::None,
                None if inline_content => MarkFilter::All,
                None => MarkFilter::None,
            };
            compiled.push(NodeType {
                flags: NodeFlags {
                    leaf: expr.is_empty() && !is_text,
                    inline: spec.inline || is_text,
                    textblock: inline_content,
                    code: spec.code,
                },
                spec: spec.clone(),
                content: expr,
                groups: node_groups.clone(),
                allowed_marks,
            });
        }

        let marks = marks
            .into_iter()
            .enumerate()
            .map(|(rank, spec)| MarkType { spec, rank })
            .collect();

        Ok(Self {
            inner: Arc::new(SchemaInner {
                nodes: compiled,
                node_index,
                marks,
                mark_index,
                top_node: top_node.to_string(),
            }),
        })
    }

    pub fn top_node(&self) -> &str {
        &self.inner.top_node
    }

    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.inner.node_index.get(name).map(|&i| &self.inner.nodes[i])
    }

    pub fn mark_type(&self, name: &str) -> Option<&MarkType> {
        self.inner.mark_index.get(name).map(|&i| &self.inner.marks[i])
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.inner.node_index.contains_key(name)
    }

    pub fn has_mark(&self, name: &str) -> bool {
        self.inner.mark_index.contains_key(name)
    }

    pub fn node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.inner.nodes.iter()
    }

    pub fn mark_types(&self) -> impl Iterator<Item = &MarkType> {
        self.inner.marks.iter()
    }

    fn require_node(&self, name: &str) -> Result<&NodeType, SchemaError> {
        self.node_type(name)
            .ok_or_else(|| SchemaError::UnknownNodeType(name.to_string()))
    }

    /// Fill defaults and reject missing required attributes
    pub fn compute_attrs(
        type_name: &str,
        specs: &BTreeMap<String, AttrSpec>,
        given: &Attrs,
    ) -> Result<Attrs, SchemaError> {
        let mut out = Attrs::new();
        for (name, spec) in specs {
            match given.get(name).or(spec.default.as_ref()) {
                Some(value) => {
                    out.insert(name.clone(), value.clone());
                }
                None => {
                    return Err(SchemaError::MissingAttr {
                        type_name: type_name.to_string(),
                        attr: name.clone(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Create a non-text node, validating attributes and direct content
    pub fn node(&self, type_name: &str, attrs: Attrs, content: Vec<Node>) -> Result<Node, SchemaError> {
        let node_type = self.require_node(type_name)?;
        if type_name == TEXT_NODE {
            return Err(SchemaError::InvalidContent {
                node_type: TEXT_NODE.to_string(),
                message: "use Schema::text to create text nodes".to_string(),
            });
        }
        let attrs = Self::compute_attrs(type_name, &node_type.spec.attrs, &attrs)?;
        let content = Fragment::from(crate::node::normalize_inline(content));
        self.check_content(type_name, &content)?;
        Ok(Node::new_element(type_name, attrs, content, Vec::new(), node_type.flags))
    }

    /// Create a text node
    pub fn text(&self, text: impl Into<String>, marks: Vec<Mark>) -> Result<Node, SchemaError> {
        let text = text.into();
        if text.is_empty() {
            return Err(SchemaError::EmptyText);
        }
        for mark in &marks {
            if !self.has_mark(&mark.mark_type) {
                return Err(SchemaError::UnknownMarkType(mark.mark_type.clone()));
            }
        }
        Ok(Node::new_text(text, marks))
    }

    /// Create a mark, filling attribute defaults
    pub fn mark(&self, type_name: &str, attrs: Attrs) -> Result<Mark, SchemaError> {
        let mark_type = self
            .mark_type(type_name)
            .ok_or_else(|| SchemaError::UnknownMarkType(type_name.to_string()))?;
        let attrs = Self::compute_attrs(type_name, &mark_type.spec.attrs, &attrs)?;
        Ok(Mark::with_attrs(type_name, attrs))
    }

    /// Replace the type and attributes of a node, keeping content and marks
    pub fn retype(&self, node: &Node, type_name: &str, attrs: Attrs) -> Result<Node, SchemaError> {
        let retyped = self.node(type_name, attrs, node.children().to_vec())?;
        Ok(retyped.with_marks(node.marks().to_vec()))
    }

    /// Whether nodes of `parent_type` may hold inline content with `mark_type`
    pub fn allows_mark(&self, parent_type: &str, mark_type: &str) -> bool {
        match self.node_type(parent_type).map(|t| &t.allowed_marks) {
            Some(MarkFilter::All) => true,
            Some(MarkFilter::Only(list)) => list.iter().any(|m| m == mark_type),
            _ => false,
        }
    }

    pub fn mark_rank(&self, mark_type: &str) -> usize {
        self.mark_type(mark_type).map(MarkType::rank).unwrap_or(usize::MAX)
    }

    /// Add a mark to a set, honouring exclusion rules and rank ordering
    pub fn add_mark(&self, mark: &Mark, set: &[Mark]) -> Vec<Mark> {
        if mark.is_in_set(set) {
            return set.to_vec();
        }
        let Some(new_type) = self.mark_type(&mark.mark_type) else {
            return set.to_vec();
        };
        let mut out = Vec::with_capacity(set.len() + 1);
        for other in set {
            if new_type.excludes(&other.mark_type) {
                continue;
            }
            if self
                .mark_type(&other.mark_type)
                .map(|t| t.excludes(&mark.mark_type))
                .unwrap_or(false)
            {
                return set.to_vec();
            }
            out.push(other.clone());
        }
        let rank = new_type.rank();
        let index = out
            .iter()
            .position(|m| self.mark_rank(&m.mark_type) > rank)
            .unwrap_or(out.len());
        out.insert(index, mark.clone());
        out
    }

    fn is_a(&self, node: &Node, name: &str) -> bool {
        node.node_type() == name
            || self
                .node_type(node.node_type())
                .map(|t| t.in_group(name))
                .unwrap_or(false)
    }

    /// Validate the direct children of a node of `type_name`
    pub fn check_content(&self, type_name: &str, content: &Fragment) -> Result<(), SchemaError> {
        let node_type = self.require_node(type_name)?;
        let children = content.as_slice();
        if !node_type.content.matches(children, &|node: &Node, name: &str| self.is_a(node, name)) {
            return Err(SchemaError::ContentMismatch {
                node_type: type_name.to_string(),
                expected: node_type.spec.content.clone(),
                found: children
                    .iter()
                    .map(Node::node_type)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        for child in children {
            for mark in child.marks() {
                if !self.allows_mark(type_name, &mark.mark_type) {
                    return Err(SchemaError::MarkNotAllowed {
                        mark: mark.mark_type.clone(),
                        node_type: type_name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Deep validation of a node and all its descendants
    pub fn check(&self, node: &Node) -> Result<(), SchemaError> {
        if node.is_text() {
            if node.text_len() == 0 {
                return Err(SchemaError::EmptyText);
            }
            for mark in node.marks() {
                if !self.has_mark(&mark.mark_type) {
                    return Err(SchemaError::UnknownMarkType(mark.mark_type.clone()));
                }
            }
            return Ok(());
        }
        let node_type = self.require_node(node.node_type())?;
        Self::compute_attrs(node.node_type(), &node_type.spec.attrs, node.attrs())?;
        self.check_content(node.node_type(), node.content())?;
        for child in node.children() {
            self.check(child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::attrs;
    use crate::test_support::{doc, para, schema};

    #[test]
    fn test_flags_are_derived() {
        let schema = schema();
        assert!(schema.node_type("paragraph").unwrap().is_textblock());
        assert!(!schema.node_type("body").unwrap().is_textblock());
        assert!(schema.node_type("hard_break").unwrap().is_leaf());
        assert!(schema.node_type("hard_break").unwrap().is_inline());
        assert!(schema.node_type("code_block").unwrap().is_code());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let nodes = vec![
            NodeSpec::new("doc", "text*"),
            NodeSpec::new("text", "").group("inline"),
            NodeSpec::new("doc", "text*"),
        ];
        assert_eq!(
            Schema::new(nodes, vec![], "doc").unwrap_err(),
            SchemaError::DuplicateType("doc".into())
        );
    }

    #[test]
    fn test_unknown_content_name_rejected() {
        let nodes = vec![
            NodeSpec::new("doc", "widget+"),
            NodeSpec::new("text", "").group("inline"),
        ];
        assert!(matches!(
            Schema::new(nodes, vec![], "doc"),
            Err(SchemaError::InvalidContent { .. })
        ));
    }

    #[test]
    fn test_node_creation_validates_content() {
        let schema = schema();
        let text = schema.text("hi", vec![]).unwrap();
        assert!(schema.node("body", Attrs::new(), vec![text]).is_err());
        assert!(schema.node("body", Attrs::new(), vec![]).is_err());
        assert!(schema.node("body", Attrs::new(), vec![para(&schema, "x")]).is_ok());
    }

    #[test]
    fn test_required_attrs() {
        let schema = schema();
        assert!(matches!(
            schema.node("heading", Attrs::new(), vec![]),
            Err(SchemaError::MissingAttr { .. })
        ));
        let heading = schema.node("heading", attrs([("level", 2)]), vec![]).unwrap();
        assert_eq!(heading.attr_u64("level"), Some(2));
    }

    #[test]
    fn test_marks_not_allowed_in_code() {
        let schema = schema();
        let strong = schema.text("x", vec![Mark::new("strong")]).unwrap();
        assert!(matches!(
            schema.node("code_block", Attrs::new(), vec![strong]),
            Err(SchemaError::MarkNotAllowed { .. })
        ));
    }

    #[test]
    fn test_add_mark_orders_by_rank_and_excludes() {
        let schema = schema();
        let set = schema.add_mark(&Mark::new("em"), &[]);
        let set = schema.add_mark(&Mark::new("strong"), &set);
        assert_eq!(set[0].mark_type, "strong");
        assert_eq!(set[1].mark_type, "em");

        // code excludes everything else
        let coded = schema.add_mark(&Mark::new("code"), &set);
        assert_eq!(coded, vec![Mark::new("code")]);
        let unchanged = schema.add_mark(&Mark::new("strong"), &coded);
        assert_eq!(unchanged, coded);
    }

    #[test]
    fn test_check_whole_document() {
        let schema = schema();
        let d = doc(&schema, vec![para(&schema, "Hello")]);
        assert!(schema.check(&d).is_ok());
    }
}
