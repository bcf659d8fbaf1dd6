//! Translating selections into the fetch tree.

use super::{Selection, SelectionError, SelectionResult, SelectionSet};
use crate::planner::{AliasOptions, FetchNode, FetchPlan, JoinLink};

impl SelectionSet {
    /// Build the fetch tree for this set.
    ///
    /// Plain fields fetch their storage column, derived fields fetch the
    /// columns they depend on, representations fetch their single column.
    /// Bulk-loaded and custom fields, bulk-loaded relationships and all
    /// collections are left to augmentation.
    pub fn to_fetch_tree(&self) -> FetchNode {
        let mut node = FetchNode::new();
        self.add_to_node(&mut node);
        node
    }

    fn add_to_node(&self, node: &mut FetchNode) {
        for selection in self {
            match selection {
                Selection::Field(field) => {
                    node.add_field(field.storage_name());
                }
                Selection::Derived(field) => {
                    for column in &field.depends_on {
                        node.add_field(column.as_str());
                    }
                }
                Selection::BulkLoaded(_) | Selection::Collection { .. } => {}
                Selection::Relationship {
                    def,
                    table,
                    selections,
                } => {
                    if def.bulk_loaded {
                        continue;
                    }
                    let link = JoinLink::new(
                        table.as_str(),
                        def.join.parent.as_str(),
                        def.join.child.as_str(),
                    );
                    let child = node.add_relationship(&def.name, link, None);
                    selections.add_to_node(child);
                }
                Selection::Representation { field, .. } => {
                    node.add_field(field.storage_name());
                }
            }
        }
    }

    /// Build the fetch plan rooted at this set's table.
    pub fn fetch_plan(&self, root_alias: &str, options: AliasOptions) -> SelectionResult<FetchPlan> {
        let table = self
            .table()
            .ok_or_else(|| SelectionError::NotAnObject(self.owner_name().to_string()))?;
        let plan = FetchPlan::build(&self.to_fetch_tree(), table, root_alias, options)?;
        tracing::debug!(
            object = self.owner_name(),
            joins = plan.joins.len(),
            columns = plan.columns.len(),
            "built fetch plan"
        );
        Ok(plan)
    }
}
