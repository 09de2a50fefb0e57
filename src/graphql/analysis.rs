//! Query shape analysis
//!
//! Computes the nesting depth and field-count complexity of a parsed
//! GraphQL operation. Fields reached through inline fragments and fragment
//! spreads are counted once per occurrence as written.

use async_graphql::parser::types::{
    ExecutableDocument, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
};
use async_graphql::parser::Positioned;
use async_graphql::Name;
use std::collections::HashMap;
use thiserror::Error;

/// Fragment definitions of a document, keyed by fragment name
pub type FragmentMap = HashMap<Name, Positioned<FragmentDefinition>>;

/// Errors raised while walking a selection tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A fragment spread revisits a fragment already on the current path
    #[error("Query too complex: fragment '{name}' spreads itself")]
    CyclicFragment { name: String },

    /// The requested operation is not defined in the document
    #[error("Operation not found: {name}")]
    OperationNotFound { name: String },
}

/// Depth and complexity of one operation
///
/// A root field is depth 1; an empty selection set is depth 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryShape {
    pub depth: usize,
    pub complexity: usize,
}

/// Analyze a single operation against the document's fragments
pub fn analyze_operation(
    operation: &OperationDefinition,
    fragments: &FragmentMap,
) -> Result<QueryShape, AnalysisError> {
    ShapeWalker::new(fragments).walk(&operation.selection_set.node, 0)
}

/// Select an operation from a document and analyze it
///
/// Without an operation name the document must contain exactly one
/// operation.
pub fn analyze_document(
    document: &ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<QueryShape, AnalysisError> {
    let (_, operation) = select_operation(document, operation_name).ok_or_else(|| {
        AnalysisError::OperationNotFound {
            name: operation_name.unwrap_or("<anonymous>").to_string(),
        }
    })?;
    analyze_operation(&operation.node, &document.fragments)
}

/// Find the operation the engine will execute for `operation_name`
pub fn select_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Option<(Option<&'a Name>, &'a Positioned<OperationDefinition>)> {
    match operation_name {
        Some(wanted) => document
            .operations
            .iter()
            .find(|(name, _)| name.map(|n| n.as_str()) == Some(wanted)),
        None => {
            let mut operations = document.operations.iter();
            let first = operations.next();
            if operations.next().is_some() {
                return None;
            }
            first
        }
    }
}

struct ShapeWalker<'a> {
    fragments: &'a FragmentMap,
    // fragments entered on the current root-to-leaf path
    path: Vec<&'a str>,
}

impl<'a> ShapeWalker<'a> {
    fn new(fragments: &'a FragmentMap) -> Self {
        Self {
            fragments,
            path: Vec::new(),
        }
    }

    fn walk(
        &mut self,
        selection_set: &'a SelectionSet,
        depth: usize,
    ) -> Result<QueryShape, AnalysisError> {
        let mut shape = QueryShape {
            depth,
            complexity: 0,
        };

        for item in &selection_set.items {
            let child = match &item.node {
                Selection::Field(field) => {
                    let nested = self.walk(&field.node.selection_set.node, depth + 1)?;
                    QueryShape {
                        depth: nested.depth,
                        complexity: nested.complexity.saturating_add(1),
                    }
                }
                Selection::InlineFragment(fragment) => {
                    self.walk(&fragment.node.selection_set.node, depth)?
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    let Some(fragment) = self.fragments.get(name) else {
                        continue;
                    };
                    if self.path.contains(&name) {
                        return Err(AnalysisError::CyclicFragment {
                            name: name.to_string(),
                        });
                    }

                    self.path.push(name);
                    let nested = self.walk(&fragment.node.selection_set.node, depth);
                    self.path.pop();
                    nested?
                }
            };

            shape.depth = shape.depth.max(child.depth);
            shape.complexity = shape.complexity.saturating_add(child.complexity);
        }

        Ok(shape)
    }
}
