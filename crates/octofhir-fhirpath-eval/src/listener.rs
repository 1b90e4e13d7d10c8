//! Evaluation listeners
//!
//! Listeners observe sub-expression evaluation boundaries without affecting
//! results. The built-in trace listener assembles a tree mirroring the AST's
//! evaluation structure, used to explain which sub-clause of a failed
//! constraint produced `false` or empty.

use crate::Collection;
use octofhir_fhirpath_ast::ExpressionNode;
use std::fmt::Write as _;

/// Observer notified around every sub-expression evaluation
pub trait EvaluationListener {
    /// Called immediately before an expression is evaluated
    fn before_evaluation(&mut self, expression: &ExpressionNode, input: &Collection);

    /// Called immediately after an expression is evaluated
    fn after_evaluation(&mut self, expression: &ExpressionNode, result: &Collection);
}

/// One node of the recorded evaluation trace
#[derive(Debug, Clone)]
pub struct TraceNode {
    /// Rendering of the sub-expression
    pub expression: String,
    /// Rendering of the input focus
    pub input: String,
    /// Rendering of the result; empty until `after_evaluation` fires
    pub result: String,
    /// Whether the sub-expression produced `false` or the empty collection
    pub failed: bool,
    /// Child trace nodes, one per nested sub-evaluation
    pub children: Vec<usize>,
}

/// Built-in listener recording a tree of (expression, input, result)
///
/// Purely observational: it never changes what the evaluator returns.
#[derive(Debug, Default)]
pub struct EvaluationTraceListener {
    nodes: Vec<TraceNode>,
    stack: Vec<usize>,
    roots: Vec<usize>,
}

impl EvaluationTraceListener {
    /// Create an empty trace listener
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded nodes, in creation order
    pub fn nodes(&self) -> &[TraceNode] {
        &self.nodes
    }

    /// The root of the last completed evaluation, if any
    pub fn root(&self) -> Option<&TraceNode> {
        self.roots.last().map(|&index| &self.nodes[index])
    }

    /// Discard all recorded traces
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.stack.clear();
        self.roots.clear();
    }

    /// Render a human-readable explanation of the last evaluation,
    /// flagging every sub-clause that produced `false` or empty
    pub fn explain(&self) -> String {
        let mut out = String::new();
        if let Some(&root) = self.roots.last() {
            self.render(root, 0, &mut out);
        }
        out
    }

    fn render(&self, index: usize, depth: usize, out: &mut String) {
        let node = &self.nodes[index];
        let marker = if node.failed { "✗" } else { " " };
        let _ = writeln!(
            out,
            "{}{marker} {} = {}",
            "  ".repeat(depth),
            node.expression,
            node.result
        );
        for &child in &node.children {
            self.render(child, depth + 1, out);
        }
    }
}

impl EvaluationListener for EvaluationTraceListener {
    fn before_evaluation(&mut self, expression: &ExpressionNode, input: &Collection) {
        let index = self.nodes.len();
        self.nodes.push(TraceNode {
            expression: expression.to_string(),
            input: input.to_string(),
            result: String::new(),
            failed: false,
            children: Vec::new(),
        });
        if let Some(&parent) = self.stack.last() {
            self.nodes[parent].children.push(index);
        } else {
            self.roots.push(index);
        }
        self.stack.push(index);
    }

    fn after_evaluation(&mut self, _expression: &ExpressionNode, result: &Collection) {
        if let Some(index) = self.stack.pop() {
            let failed = result.is_empty() || result.single_boolean() == Some(false);
            self.nodes[index].result = result.to_string();
            self.nodes[index].failed = failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_fhirpath_ast::{Identifier, Literal};

    #[test]
    fn trace_records_nesting_and_failures() {
        let mut listener = EvaluationTraceListener::new();
        let outer = ExpressionNode::Identifier(Identifier::new("name"));
        let inner = ExpressionNode::Literal(Literal::Boolean(false));

        listener.before_evaluation(&outer, &Collection::empty());
        listener.before_evaluation(&inner, &Collection::empty());
        listener.after_evaluation(&inner, &Collection::boolean(false));
        listener.after_evaluation(&outer, &Collection::boolean(true));

        let root = listener.root().unwrap();
        assert_eq!(root.expression, "name");
        assert!(!root.failed);
        assert_eq!(root.children.len(), 1);
        assert!(listener.nodes()[root.children[0]].failed);
        assert!(listener.explain().contains("✗"));
    }
}
