//! The selection tree: fields and relationships to fetch, per node.

use serde_json::Value as Json;

use super::{PlanError, PlanResult};

/// How a child table joins its parent: `parent.parent_column = child.child_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    /// Table of the related object.
    pub table: String,
    pub parent_column: String,
    pub child_column: String,
}

impl JoinLink {
    pub fn new(
        table: impl Into<String>,
        parent_column: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            parent_column: parent_column.into(),
            child_column: child_column.into(),
        }
    }
}

/// Side of a join a column belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Parent(String),
    Child(String),
    Literal(Json),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// An extra join predicate, ANDed with the natural join condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull(Operand),
    And(Vec<Predicate>),
}

impl Predicate {
    /// `child.column = literal`, the usual scoping predicate.
    pub fn child_equals(column: impl Into<String>, value: impl Into<Json>) -> Self {
        Predicate::Compare {
            left: Operand::Child(column.into()),
            op: CompareOp::Eq,
            right: Operand::Literal(value.into()),
        }
    }
}

/// A joined child of a [`FetchNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchChild {
    pub name: String,
    pub link: JoinLink,
    pub predicate: Option<Predicate>,
    pub node: FetchNode,
}

/// One table in the selection tree.
///
/// Fields and children keep insertion order so alias allocation is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchNode {
    fields: Vec<String>,
    children: Vec<FetchChild>,
}

impl FetchNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a column for selection. Adding it again is a no-op.
    pub fn add_field(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.fields.contains(&name) {
            self.fields.push(name);
        }
        self
    }

    /// Add a relationship and return its node.
    ///
    /// Re-adding a relationship returns the existing child; a differing
    /// predicate on the second call is ignored.
    pub fn add_relationship(
        &mut self,
        name: &str,
        link: JoinLink,
        predicate: Option<Predicate>,
    ) -> &mut FetchNode {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => {
                if self.children[index].predicate != predicate {
                    tracing::debug!(
                        relationship = name,
                        "relationship re-added with a different predicate; keeping the first"
                    );
                }
                index
            }
            None => {
                self.children.push(FetchChild {
                    name: name.to_string(),
                    link,
                    predicate,
                    node: FetchNode::new(),
                });
                self.children.len() - 1
            }
        };
        &mut self.children[index].node
    }

    pub fn get_child(&self, name: &str) -> PlanResult<&FetchNode> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.node)
            .ok_or_else(|| PlanError::UnknownRelationship(name.to_string()))
    }

    pub fn get_child_mut(&mut self, name: &str) -> PlanResult<&mut FetchNode> {
        self.children
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.node)
            .ok_or_else(|| PlanError::UnknownRelationship(name.to_string()))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn children(&self) -> &[FetchChild] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.children.is_empty()
    }
}
