//! The tree-walking interpreter
//!
//! `evaluate(expression, focus, scope) -> focus` for every AST form.
//! Lambda-style functions re-evaluate their argument expression once per
//! input item, with the item as the new focus and `$index`/`$total` carried
//! in an explicit [`Scope`] value, so nested lambdas cannot cross-talk.

use crate::{Collection, EvaluationContext, FunctionRegistry};
use octofhir_fhirpath_ast::{
    ExpressionNode, FunctionCall, Identifier, IndexerExpr, Invocation, Literal, QualifiedName,
    TypeOp, TypeOpExpr, UnionExpr,
};
use octofhir_fhirpath_diagnostics::{FP0102, FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::{
    Date, DateTime, FhirPathType, Fraction, Quantity, SystemValue, Time, TypeRegistry,
};

const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";
const CURRENCY_SYSTEM: &str = "urn:iso:std:iso:4217";

/// Implicit-variable bindings for lambda evaluation
///
/// A fresh value is built per input item; nothing is rebound in place.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// `$index`: 0-based position in the ancestor input collection
    pub index: Option<i32>,
    /// `$total`: the running aggregate inside `aggregate()`
    pub total: Option<Collection>,
}

impl Scope {
    fn item(&self, index: usize) -> Self {
        Self {
            index: i32::try_from(index).ok(),
            total: self.total.clone(),
        }
    }
}

/// The expression evaluator: one per evaluation call, borrowing the
/// function registry and the mutable context
pub struct Evaluator<'a> {
    functions: &'a FunctionRegistry,
    ctx: &'a mut EvaluationContext,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator over a context
    pub fn new(functions: &'a FunctionRegistry, ctx: &'a mut EvaluationContext) -> Self {
        Self { functions, ctx }
    }

    /// The evaluation context
    pub fn ctx(&mut self) -> &mut EvaluationContext {
        self.ctx
    }

    /// Evaluate an expression against a focus collection
    pub fn evaluate(
        &mut self,
        expr: &ExpressionNode,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        log::trace!("evaluate {expr} against {focus}");
        self.notify_before(expr, focus);
        let result = self.eval_inner(expr, focus, scope);
        // listeners stay balanced even when evaluation fails
        match &result {
            Ok(collection) => self.notify_after(expr, collection),
            Err(_) => self.notify_after(expr, &Collection::empty()),
        }
        result
    }

    fn notify_before(&self, expr: &ExpressionNode, input: &Collection) {
        for listener in self.ctx.listeners() {
            listener.lock().before_evaluation(expr, input);
        }
    }

    fn notify_after(&self, expr: &ExpressionNode, result: &Collection) {
        for listener in self.ctx.listeners() {
            listener.lock().after_evaluation(expr, result);
        }
    }

    fn eval_inner(
        &mut self,
        expr: &ExpressionNode,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        match expr {
            ExpressionNode::Literal(literal) => Ok(literal_collection(literal)),
            ExpressionNode::Identifier(id) => Ok(self.member_access(focus, id)),
            ExpressionNode::ExternalConstant(id) => Ok(self.ctx.external_constant(&id.name)),
            ExpressionNode::This => Ok(focus.clone()),
            ExpressionNode::Index => scope
                .index
                .map(|i| Collection::singleton(FhirPathNode::integer(i)))
                .ok_or_else(|| {
                    FhirPathError::evaluation(
                        FP0102,
                        "Variable '$index' is not defined in this context",
                    )
                }),
            ExpressionNode::Total => scope.total.clone().ok_or_else(|| {
                FhirPathError::evaluation(
                    FP0102,
                    "Variable '$total' is not defined in this context",
                )
            }),
            ExpressionNode::Invocation(inv) => {
                let input = self.evaluate(&inv.target, focus, scope)?;
                match &inv.invocation {
                    Invocation::Member(id) => Ok(self.member_access(&input, id)),
                    Invocation::Function(call) => self.apply_function(call, &input, scope),
                }
            }
            ExpressionNode::Function(call) => self.apply_function(call, focus, scope),
            ExpressionNode::Indexer(ix) => self.eval_indexer(ix, focus, scope),
            ExpressionNode::Polarity(polarity) => self.eval_polarity(polarity, focus, scope),
            ExpressionNode::BinaryOp(binary) => self.eval_binary(binary, focus, scope),
            ExpressionNode::TypeOp(type_op) => self.eval_type_op(type_op, focus, scope),
            ExpressionNode::Union(union) => self.eval_union(union, focus, scope),
        }
    }

    /// Member access: children with a matching name, flattened in order.
    ///
    /// A singleton focus whose type-name closure contains the identifier
    /// matches the focus itself, so `Patient.name` works from the root.
    fn member_access(&self, input: &Collection, id: &Identifier) -> Collection {
        if input.is_singleton()
            && let Some(node) = input.first()
            && type_closure_contains(self.ctx.registry(), &node.ty(), &id.name)
        {
            return input.clone();
        }
        let mut result = Collection::empty();
        for node in input {
            for child in node.children() {
                if child.name() == id.name {
                    result.push(child.clone());
                }
            }
        }
        result
    }

    fn eval_indexer(
        &mut self,
        ix: &IndexerExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let items = self.evaluate(&ix.target, focus, scope)?;
        let index = self.evaluate(&ix.index, focus, scope)?;
        if index.is_empty() {
            return Ok(Collection::empty());
        }
        let position = index
            .exactly_one()?
            .value()
            .and_then(SystemValue::as_integer)
            .ok_or_else(|| {
                FhirPathError::evaluation(
                    FP0102,
                    "Indexer expression must evaluate to a single integer",
                )
            })?;
        let result = usize::try_from(position)
            .ok()
            .and_then(|i| items.get(i).cloned());
        Ok(result.map_or_else(Collection::empty, Collection::singleton))
    }

    fn eval_union(
        &mut self,
        union: &UnionExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&union.left, focus, scope)?;
        let right = self.evaluate(&union.right, focus, scope)?;
        let mut result = Collection::empty();
        for node in left.into_iter().chain(right) {
            result.push_distinct(node);
        }
        Ok(result)
    }

    fn eval_type_op(
        &mut self,
        type_op: &TypeOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let nodes = self.evaluate(&type_op.target, focus, scope)?;
        let ty = self.resolve_type(&type_op.type_name)?;
        match type_op.op {
            TypeOp::Is => self.type_test(&nodes, &ty),
            TypeOp::As => Ok(self.type_filter(&nodes, &ty)),
        }
    }

    fn type_test(&self, nodes: &Collection, ty: &FhirPathType) -> Result<Collection> {
        if nodes.is_empty() {
            return Ok(Collection::boolean(false));
        }
        let node = nodes.exactly_one()?;
        Ok(Collection::boolean(self.is_assignable(ty, node)))
    }

    fn type_filter(&self, nodes: &Collection, ty: &FhirPathType) -> Collection {
        nodes
            .iter()
            .filter(|node| self.is_assignable(ty, node))
            .cloned()
            .collect()
    }

    fn resolve_type(&self, name: &QualifiedName) -> Result<FhirPathType> {
        self.ctx
            .registry()
            .resolve(name.namespace.as_deref(), &name.name)
            .ok_or_else(|| FhirPathError::unknown_type(&name.to_string()))
    }

    /// Runtime type test with System/FHIR namespace equivalence and the
    /// quantity-specialization unit inspection
    pub(crate) fn is_assignable(&self, target: &FhirPathType, node: &FhirPathNode) -> bool {
        let registry = self.ctx.registry();
        let mut node_ty = node.ty();
        if target.is_system()
            && let Some(value) = node.value()
        {
            node_ty = value.type_of();
        }
        if !target.is_system() && quantity_specialization(&target.name) {
            return registry.is_subtype_of(&node_ty, &FhirPathType::fhir("Quantity"))
                && quantity_specialization_matches(&target.name, node);
        }
        registry.is_subtype_of(&node_ty, target)
    }

    fn apply_function(
        &mut self,
        call: &FunctionCall,
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let name = call.name.name.as_str();
        let args = &call.args;
        match name {
            "where" => self.fn_where(args, input, scope),
            "select" => self.fn_select(args, input, scope),
            "exists" => self.fn_exists(args, input, scope),
            "all" => self.fn_all(args, input, scope),
            "repeat" => self.fn_repeat(args, input, scope),
            "aggregate" => self.fn_aggregate(args, input, scope),
            "iif" => self.fn_iif(args, input, scope),
            "trace" => self.fn_trace(args, input, scope),
            "ofType" | "as" => {
                let ty = self.type_argument(args, name)?;
                Ok(self.type_filter(input, &ty))
            }
            "is" => {
                let ty = self.type_argument(args, name)?;
                self.type_test(input, &ty)
            }
            _ => {
                let Some(def) = self.functions.lookup(name) else {
                    return Err(FhirPathError::function_not_found(name));
                };
                if args.len() < def.min_arity() || args.len() > def.max_arity() {
                    return Err(FhirPathError::unexpected_argument_count(args.len(), name));
                }
                let def = def.clone();
                let evaluated = args
                    .iter()
                    .map(|arg| self.evaluate(arg, input, scope))
                    .collect::<Result<Vec<_>>>()?;
                def.apply(self.ctx, input, &evaluated)
            }
        }
    }

    fn type_argument(&self, args: &[ExpressionNode], name: &str) -> Result<FhirPathType> {
        if args.len() != 1 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), name));
        }
        let qualified = type_name_from_expr(&args[0])
            .ok_or_else(|| FhirPathError::unknown_type(&args[0].to_string()))?;
        self.resolve_type(&qualified)
    }

    fn fn_where(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.len() != 1 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "where"));
        }
        let mut result = Collection::empty();
        for (i, node) in input.iter().enumerate() {
            let item = Collection::singleton(node.clone());
            if self.evaluate(&args[0], &item, &scope.item(i))?.is_true() {
                result.push(node.clone());
            }
        }
        Ok(result)
    }

    fn fn_select(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.len() != 1 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "select"));
        }
        let mut result = Collection::empty();
        for (i, node) in input.iter().enumerate() {
            let item = Collection::singleton(node.clone());
            result.extend(self.evaluate(&args[0], &item, &scope.item(i))?);
        }
        Ok(result)
    }

    fn fn_exists(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.len() > 1 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "exists"));
        }
        if args.is_empty() {
            return Ok(Collection::boolean(!input.is_empty()));
        }
        for (i, node) in input.iter().enumerate() {
            let item = Collection::singleton(node.clone());
            if self.evaluate(&args[0], &item, &scope.item(i))?.is_true() {
                return Ok(Collection::boolean(true));
            }
        }
        Ok(Collection::boolean(false))
    }

    fn fn_all(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.len() != 1 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "all"));
        }
        for (i, node) in input.iter().enumerate() {
            let item = Collection::singleton(node.clone());
            let result = self.evaluate(&args[0], &item, &scope.item(i))?;
            if result.single_boolean() == Some(false) {
                return Ok(Collection::boolean(false));
            }
        }
        Ok(Collection::boolean(true))
    }

    /// Recursive projection: re-applies the expression to each round of new
    /// results. Already-collected nodes are not re-expanded, which bounds
    /// the loop on cyclic data.
    fn fn_repeat(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.len() != 1 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "repeat"));
        }
        let mut result = Collection::empty();
        let mut frontier: Vec<FhirPathNode> = input.iter().cloned().collect();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (i, node) in frontier.iter().enumerate() {
                let item = Collection::singleton(node.clone());
                let projected = self.evaluate(&args[0], &item, &scope.item(i))?;
                for produced in projected {
                    if !result.contains(&produced) {
                        result.push(produced.clone());
                        next.push(produced);
                    }
                }
            }
            frontier = next;
        }
        Ok(result)
    }

    fn fn_aggregate(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.is_empty() || args.len() > 2 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "aggregate"));
        }
        let mut total = match args.get(1) {
            Some(init) => self.evaluate(init, input, scope)?,
            None => Collection::empty(),
        };
        for (i, node) in input.iter().enumerate() {
            let item = Collection::singleton(node.clone());
            let item_scope = Scope {
                index: i32::try_from(i).ok(),
                total: Some(total),
            };
            total = self.evaluate(&args[0], &item, &item_scope)?;
        }
        Ok(total)
    }

    fn fn_iif(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.len() < 2 || args.len() > 3 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "iif"));
        }
        let criterion = self.evaluate(&args[0], input, scope)?;
        if !criterion.is_empty() && criterion.single_boolean().is_none() {
            return Err(FhirPathError::evaluation(
                FP0102,
                "'iff' function criterion must evaluate to a boolean or empty",
            ));
        }
        if criterion.is_true() {
            self.evaluate(&args[1], input, scope)
        } else if let Some(otherwise) = args.get(2) {
            self.evaluate(otherwise, input, scope)
        } else {
            Ok(Collection::empty())
        }
    }

    fn fn_trace(
        &mut self,
        args: &[ExpressionNode],
        input: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        if args.is_empty() || args.len() > 2 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "trace"));
        }
        let name = self.evaluate(&args[0], input, scope)?;
        let nodes = match args.get(1) {
            Some(projection) => self.evaluate(projection, input, scope)?,
            None => input.clone(),
        };
        if !nodes.is_empty() {
            log::debug!("{name}: {nodes}");
        }
        Ok(input.clone())
    }
}

/// Convert a literal term into its singleton value collection
fn literal_collection(literal: &Literal) -> Collection {
    let value = match literal {
        Literal::Null => return Collection::empty(),
        Literal::Boolean(b) => SystemValue::Boolean(*b),
        Literal::Integer(i) => SystemValue::Integer(*i),
        Literal::Decimal(d) => SystemValue::Decimal(*d),
        Literal::String(s) => SystemValue::String(s.clone()),
        Literal::Date(d) => SystemValue::Date(date_from_literal(d)),
        Literal::DateTime(dt) => SystemValue::DateTime(DateTime::new(
            date_from_literal(&dt.date),
            dt.time.as_ref().map(time_from_literal),
            dt.offset_minutes,
        )),
        Literal::Time(t) => SystemValue::Time(time_from_literal(t)),
        Literal::Quantity(q) => SystemValue::Quantity(Quantity::new(q.value, q.unit.clone())),
    };
    Collection::singleton(FhirPathNode::from_value(value))
}

fn date_from_literal(literal: &octofhir_fhirpath_ast::DateLiteral) -> Date {
    Date {
        year: literal.year,
        month: literal.month,
        day: literal.day,
    }
}

fn time_from_literal(literal: &octofhir_fhirpath_ast::TimeLiteral) -> Time {
    Time {
        hour: literal.hour,
        minute: literal.minute,
        second: literal.second,
        fraction: literal.fraction.map(|f| Fraction {
            nanos: f.nanos,
            digits: f.digits,
        }),
    }
}

/// Extract a type name from an argument expression (`Quantity`,
/// `FHIR.Patient`, `System.String`)
pub(crate) fn type_name_from_expr(expr: &ExpressionNode) -> Option<QualifiedName> {
    match expr {
        ExpressionNode::Identifier(id) => Some(QualifiedName::unqualified(id.name.clone())),
        ExpressionNode::Invocation(inv) => {
            let ExpressionNode::Identifier(namespace) = inv.target.as_ref() else {
                return None;
            };
            let Invocation::Member(name) = &inv.invocation else {
                return None;
            };
            Some(QualifiedName::qualified(
                namespace.name.clone(),
                name.name.clone(),
            ))
        }
        _ => None,
    }
}

/// Whether a model type's name chain (excluding `Any`) contains `name`
fn type_closure_contains(registry: &TypeRegistry, ty: &FhirPathType, name: &str) -> bool {
    if ty.is_system() {
        return false;
    }
    let mut current = Some(ty.clone());
    while let Some(t) = current {
        if t.name == "Any" {
            break;
        }
        if t.name == name {
            return true;
        }
        current = registry.base_type(&t);
    }
    false
}

pub(crate) fn quantity_specialization(name: &str) -> bool {
    matches!(
        name,
        "Age" | "Count" | "Distance" | "Duration" | "MoneyQuantity" | "SimpleQuantity"
    )
}

/// Specialized quantity types are discriminated by their runtime unit
/// system, not by nominal type alone
fn quantity_specialization_matches(name: &str, node: &FhirPathNode) -> bool {
    let Some(object) = node.json().and_then(serde_json::Value::as_object) else {
        return false;
    };
    let system = object.get("system").and_then(serde_json::Value::as_str);
    let code = object.get("code").and_then(serde_json::Value::as_str);
    let has_value = object.contains_key("value");
    match name {
        "Age" | "Distance" | "Duration" => {
            system == Some(UCUM_SYSTEM) && code.is_some() && has_value
        }
        "Count" => system == Some(UCUM_SYSTEM) && code == Some("1"),
        "MoneyQuantity" => system == Some(CURRENCY_SYSTEM),
        "SimpleQuantity" => !object.contains_key("comparator"),
        _ => false,
    }
}
