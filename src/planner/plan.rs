//! Flattened fetch plans: alias-qualified columns and a LEFT JOIN list.

use std::fmt;

use serde_json::Value as Json;

use super::alias::{AliasAllocator, AliasOptions};
use super::tree::{CompareOp, FetchNode, Operand, Predicate};
use super::PlanResult;

/// A table with its alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

/// An alias-qualified column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
}

/// Operand of a resolved join condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Column(ColumnRef),
    Literal(Json),
}

/// A join condition with every column qualified by its alias.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Term,
        op: CompareOp,
        right: Term,
    },
    IsNull(Term),
    And(Vec<Condition>),
}

impl Condition {
    fn resolve(predicate: &Predicate, parent: &str, child: &str) -> Self {
        let term = |operand: &Operand| match operand {
            Operand::Parent(column) => Term::Column(ColumnRef::new(parent, column.as_str())),
            Operand::Child(column) => Term::Column(ColumnRef::new(child, column.as_str())),
            Operand::Literal(value) => Term::Literal(value.clone()),
        };
        match predicate {
            Predicate::Compare { left, op, right } => Condition::Compare {
                left: term(left),
                op: *op,
                right: term(right),
            },
            Predicate::IsNull(operand) => Condition::IsNull(term(operand)),
            Predicate::And(parts) => Condition::And(
                parts
                    .iter()
                    .map(|p| Condition::resolve(p, parent, child))
                    .collect(),
            ),
        }
    }
}

/// One LEFT JOIN in the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Relationship names from the root to this table.
    pub path: Vec<String>,
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Condition,
}

/// The fetch plan handed to the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub root: TableRef,
    pub columns: Vec<ColumnRef>,
    pub joins: Vec<Join>,
}

impl FetchPlan {
    /// Build a plan for `node` rooted at `table AS alias`.
    pub fn build(
        node: &FetchNode,
        table: &str,
        alias: &str,
        options: AliasOptions,
    ) -> PlanResult<Self> {
        let mut aliases = AliasAllocator::new(alias, options);
        let mut plan = FetchPlan {
            root: TableRef {
                table: table.to_string(),
                alias: alias.to_string(),
            },
            columns: Vec::new(),
            joins: Vec::new(),
        };
        node.build_fetch_plan(alias, &mut aliases, &mut Vec::new(), &mut plan)?;
        Ok(plan)
    }

    /// Alias of the table reached by `path`; the empty path is the root.
    pub fn alias_for(&self, path: &[&str]) -> Option<&str> {
        if path.is_empty() {
            return Some(&self.root.alias);
        }
        self.joins
            .iter()
            .find(|j| j.path.iter().map(String::as_str).eq(path.iter().copied()))
            .map(|j| j.table.alias.as_str())
    }
}

impl FetchNode {
    /// Depth-first: emit this node's columns under `alias`, then for each
    /// child allocate an alias, emit its join and recurse.
    pub fn build_fetch_plan(
        &self,
        alias: &str,
        aliases: &mut AliasAllocator,
        path: &mut Vec<String>,
        plan: &mut FetchPlan,
    ) -> PlanResult<()> {
        plan.columns
            .extend(self.fields().iter().map(|f| ColumnRef::new(alias, f.as_str())));

        for child in self.children() {
            let child_alias = aliases.allocate(alias, &child.name)?;
            tracing::debug!(
                relationship = %child.name,
                table = %child.link.table,
                alias = %child_alias,
                "planned join"
            );

            let natural = Condition::Compare {
                left: Term::Column(ColumnRef::new(alias, child.link.parent_column.as_str())),
                op: CompareOp::Eq,
                right: Term::Column(ColumnRef::new(
                    child_alias.as_str(),
                    child.link.child_column.as_str(),
                )),
            };
            let on = match &child.predicate {
                Some(extra) => {
                    Condition::And(vec![natural, Condition::resolve(extra, alias, &child_alias)])
                }
                None => natural,
            };

            path.push(child.name.clone());
            plan.joins.push(Join {
                path: path.clone(),
                join_type: JoinType::Left,
                table: TableRef {
                    table: child.link.table.clone(),
                    alias: child_alias.clone(),
                },
                on,
            });
            child
                .node
                .build_fetch_plan(&child_alias, aliases, path, plan)?;
            path.pop();
        }
        Ok(())
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Json) -> fmt::Result {
    match value {
        Json::Null => write!(f, "NULL"),
        Json::Bool(true) => write!(f, "TRUE"),
        Json::Bool(false) => write!(f, "FALSE"),
        Json::Number(n) => write!(f, "{}", n),
        Json::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        other => write!(f, "'{}'", other.to_string().replace('\'', "''")),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Column(column) => write!(f, "{}", column),
            Term::Literal(value) => write_literal(f, value),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.as_sql(), right)
            }
            Condition::IsNull(term) => write!(f, "{} IS NULL", term),
            Condition::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    match part {
                        Condition::And(_) => write!(f, "({})", part)?,
                        _ => write!(f, "{}", part)?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            write!(f, "SELECT {}.*", self.root.alias)?;
        } else {
            let columns: Vec<String> = self.columns.iter().map(ToString::to_string).collect();
            write!(f, "SELECT {}", columns.join(", "))?;
        }
        write!(f, "\nFROM {} AS {}", self.root.table, self.root.alias)?;
        for join in &self.joins {
            let keyword = match join.join_type {
                JoinType::Left => "LEFT JOIN",
            };
            write!(
                f,
                "\n{} {} AS {} ON {}",
                keyword, join.table.table, join.table.alias, join.on
            )?;
        }
        Ok(())
    }
}
