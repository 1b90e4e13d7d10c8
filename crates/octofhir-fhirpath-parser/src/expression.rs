//! Expression parser: recursive descent with precedence climbing
//!
//! One function per precedence level, loosest binding first:
//! implies, or/xor, and, in/contains, equality, inequality, union,
//! is/as, additive, multiplicative, polarity, postfix, term.

use crate::combinators::{
    Input, PResult, any_identifier, backtrack, cut_with, external_constant_name,
    identifier_or_keyword, keyword, number_literal, qualified_name, quantity_unit, string_literal,
    temporal_literal, ws,
};
use octofhir_fhirpath_ast::{
    BinaryOp, BinaryOpExpr, ExpressionNode, FunctionCall, Identifier, IndexerExpr, Invocation,
    InvocationExpr, Literal, PolarityOp, PolarityExpr, QuantityLiteral, TypeOp, TypeOpExpr,
    UnionExpr,
};
use rust_decimal::Decimal;

/// Top-level entry: a full expression surrounded by optional trivia
pub(crate) fn entry(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    ws(input)?;
    let expr = expression(input)?;
    ws(input)?;
    Ok(expr)
}

/// A complete expression (used for parenthesized groups, indexers, arguments)
pub(crate) fn expression(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    implies_expr(input)
}

fn binary(op: BinaryOp, left: ExpressionNode, right: ExpressionNode) -> ExpressionNode {
    ExpressionNode::BinaryOp(BinaryOpExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn implies_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = or_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        if keyword("implies")(input).is_err() {
            *input = checkpoint;
            return Ok(left);
        }
        ws(input)?;
        let right = or_expr(input)?;
        left = binary(BinaryOp::Implies, left, right);
    }
}

fn or_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = and_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if keyword("or")(input).is_ok() {
            BinaryOp::Or
        } else if keyword("xor")(input).is_ok() {
            BinaryOp::Xor
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let right = and_expr(input)?;
        left = binary(op, left, right);
    }
}

fn and_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = membership_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        if keyword("and")(input).is_err() {
            *input = checkpoint;
            return Ok(left);
        }
        ws(input)?;
        let right = membership_expr(input)?;
        left = binary(BinaryOp::And, left, right);
    }
}

fn membership_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = equality_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if keyword("in")(input).is_ok() {
            BinaryOp::In
        } else if keyword("contains")(input).is_ok() {
            BinaryOp::Contains
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let right = equality_expr(input)?;
        left = binary(op, left, right);
    }
}

fn equality_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = inequality_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if strip(input, "!=") {
            BinaryOp::Ne
        } else if strip(input, "!~") {
            BinaryOp::NotEquivalent
        } else if strip(input, "=") {
            BinaryOp::Eq
        } else if strip(input, "~") {
            BinaryOp::Equivalent
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let right = inequality_expr(input)?;
        left = binary(op, left, right);
    }
}

fn inequality_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = union_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if strip(input, "<=") {
            BinaryOp::Le
        } else if strip(input, ">=") {
            BinaryOp::Ge
        } else if strip(input, "<") {
            BinaryOp::Lt
        } else if strip(input, ">") {
            BinaryOp::Gt
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let right = union_expr(input)?;
        left = binary(op, left, right);
    }
}

fn union_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = type_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        if !strip(input, "|") {
            *input = checkpoint;
            return Ok(left);
        }
        ws(input)?;
        let right = type_expr(input)?;
        left = ExpressionNode::Union(UnionExpr {
            left: Box::new(left),
            right: Box::new(right),
        });
    }
}

fn type_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = additive_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if keyword("is")(input).is_ok() {
            TypeOp::Is
        } else if keyword("as")(input).is_ok() {
            TypeOp::As
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let Ok(type_name) = qualified_name(input) else {
            return cut_with("type specifier");
        };
        left = ExpressionNode::TypeOp(TypeOpExpr {
            op,
            target: Box::new(left),
            type_name,
        });
    }
}

fn additive_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = multiplicative_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if strip(input, "+") {
            BinaryOp::Add
        } else if strip(input, "-") {
            BinaryOp::Sub
        } else if strip(input, "&") {
            BinaryOp::Concat
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let right = multiplicative_expr(input)?;
        left = binary(op, left, right);
    }
}

fn multiplicative_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut left = polarity_expr(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        let op = if strip(input, "*") {
            BinaryOp::Mul
        } else if strip(input, "/") {
            BinaryOp::Div
        } else if keyword("div")(input).is_ok() {
            BinaryOp::IntDiv
        } else if keyword("mod")(input).is_ok() {
            BinaryOp::Mod
        } else {
            *input = checkpoint;
            return Ok(left);
        };
        ws(input)?;
        let right = polarity_expr(input)?;
        left = binary(op, left, right);
    }
}

fn polarity_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let op = if strip(input, "+") {
        PolarityOp::Plus
    } else if strip(input, "-") {
        PolarityOp::Minus
    } else {
        return postfix_expr(input);
    };
    ws(input)?;
    let operand = polarity_expr(input)?;
    Ok(ExpressionNode::Polarity(PolarityExpr {
        op,
        operand: Box::new(operand),
    }))
}

fn postfix_expr(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let mut expr = term(input)?;
    loop {
        let checkpoint = *input;
        ws(input)?;
        if strip(input, ".") {
            ws(input)?;
            let Ok(name) = invocation_name(input) else {
                return cut_with("invocation");
            };
            ws(input)?;
            let invocation = if input.starts_with('(') {
                Invocation::Function(FunctionCall {
                    name: Identifier::new(name),
                    args: function_args(input)?,
                })
            } else {
                Invocation::Member(Identifier::new(name))
            };
            expr = ExpressionNode::Invocation(InvocationExpr {
                target: Box::new(expr),
                invocation,
            });
        } else if strip(input, "[") {
            ws(input)?;
            let index = expression(input)?;
            ws(input)?;
            if !strip(input, "]") {
                return cut_with("indexer");
            }
            expr = ExpressionNode::Indexer(IndexerExpr {
                target: Box::new(expr),
                index: Box::new(index),
            });
        } else {
            *input = checkpoint;
            return Ok(expr);
        }
    }
}

/// Names after `.` may be keywords (`contains()`, `div`) or delimited
fn invocation_name(input: &mut Input<'_>) -> PResult<String> {
    if input.starts_with('`') {
        any_identifier(input)
    } else {
        identifier_or_keyword(input)
    }
}

fn function_args(input: &mut Input<'_>) -> PResult<Vec<ExpressionNode>> {
    // caller peeked the opening parenthesis
    *input = &input[1..];
    ws(input)?;
    if strip(input, ")") {
        return Ok(Vec::new());
    }
    let mut args = vec![expression(input)?];
    loop {
        ws(input)?;
        if strip(input, ",") {
            ws(input)?;
            args.push(expression(input)?);
        } else if strip(input, ")") {
            return Ok(args);
        } else {
            return cut_with("argument list");
        }
    }
}

fn term(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    match input.chars().next() {
        None => backtrack(),
        Some('(') => {
            *input = &input[1..];
            ws(input)?;
            let expr = expression(input)?;
            ws(input)?;
            if !strip(input, ")") {
                return cut_with("parenthesized expression");
            }
            Ok(expr)
        }
        Some('{') => {
            *input = &input[1..];
            ws(input)?;
            if !strip(input, "}") {
                return cut_with("empty collection literal");
            }
            Ok(ExpressionNode::Literal(Literal::Null))
        }
        Some('@') => temporal_literal(input).map(ExpressionNode::Literal),
        Some('\'') => string_literal(input)
            .map(|s| ExpressionNode::Literal(Literal::String(s))),
        Some('%') => {
            *input = &input[1..];
            let Ok(name) = external_constant_name(input) else {
                return cut_with("external constant");
            };
            Ok(ExpressionNode::ExternalConstant(Identifier::new(name)))
        }
        Some('$') => special_variable(input),
        Some(c) if c.is_ascii_digit() => number_term(input),
        _ => {
            if keyword("true")(input).is_ok() {
                return Ok(ExpressionNode::Literal(Literal::Boolean(true)));
            }
            if keyword("false")(input).is_ok() {
                return Ok(ExpressionNode::Literal(Literal::Boolean(false)));
            }
            let name = any_identifier(input)?;
            let checkpoint = *input;
            ws(input)?;
            if input.starts_with('(') {
                let args = function_args(input)?;
                return Ok(ExpressionNode::Function(FunctionCall {
                    name: Identifier::new(name),
                    args,
                }));
            }
            *input = checkpoint;
            Ok(ExpressionNode::Identifier(Identifier::new(name)))
        }
    }
}

fn special_variable(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    *input = &input[1..];
    let Ok(name) = identifier_or_keyword(input) else {
        return cut_with("special variable");
    };
    match name.as_str() {
        "this" => Ok(ExpressionNode::This),
        "index" => Ok(ExpressionNode::Index),
        "total" => Ok(ExpressionNode::Total),
        _ => cut_with("special variable"),
    }
}

fn number_term(input: &mut Input<'_>) -> PResult<ExpressionNode> {
    let number = number_literal(input)?;
    let checkpoint = *input;
    ws(input)?;
    if let Ok(unit) = quantity_unit(input) {
        let value = match &number {
            Literal::Integer(i) => Some(Decimal::from(*i)),
            Literal::Decimal(d) => Some(*d),
            _ => None,
        };
        if let Some(value) = value {
            return Ok(ExpressionNode::Literal(Literal::Quantity(QuantityLiteral {
                value,
                unit,
            })));
        }
    }
    *input = checkpoint;
    Ok(ExpressionNode::Literal(number))
}

fn strip(input: &mut Input<'_>, token: &str) -> bool {
    match input.strip_prefix(token) {
        Some(rest) => {
            *input = rest;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(text: &str) -> ExpressionNode {
        let mut input = text;
        let expr = entry(&mut input).expect("parse failed");
        assert_eq!(input, "", "unconsumed input");
        expr
    }

    #[test]
    fn union_binds_tighter_than_comparison() {
        let expr = parse_ok("a | b = c");
        let ExpressionNode::BinaryOp(eq) = &expr else {
            panic!("expected equality at the top");
        };
        assert_eq!(eq.op, BinaryOp::Eq);
        assert!(matches!(eq.left.as_ref(), ExpressionNode::Union(_)));
    }

    #[test]
    fn is_parses_qualified_type_name() {
        let expr = parse_ok("value is System.String");
        let ExpressionNode::TypeOp(op) = &expr else {
            panic!("expected type op");
        };
        assert_eq!(op.type_name.namespace.as_deref(), Some("System"));
        assert_eq!(op.type_name.name, "String");
    }

    #[test]
    fn keyword_function_names_work_after_dot() {
        let expr = parse_ok("name.given.contains('x')");
        let ExpressionNode::Invocation(inv) = &expr else {
            panic!("expected invocation");
        };
        let Invocation::Function(call) = &inv.invocation else {
            panic!("expected function call");
        };
        assert_eq!(call.name.name, "contains");
    }

    #[test]
    fn quantity_literal_with_calendar_unit() {
        let expr = parse_ok("4 days");
        let ExpressionNode::Literal(Literal::Quantity(q)) = &expr else {
            panic!("expected quantity literal");
        };
        assert_eq!(q.unit, "days");
    }

    #[test]
    fn polarity_applies_to_postfix_chain() {
        let expr = parse_ok("-a.b * 2");
        let ExpressionNode::BinaryOp(mul) = &expr else {
            panic!("expected multiplication");
        };
        assert!(matches!(mul.left.as_ref(), ExpressionNode::Polarity(_)));
    }

    #[test]
    fn lambda_arguments_stay_unevaluated() {
        let expr = parse_ok("name.where(use = 'official')");
        let ExpressionNode::Invocation(inv) = &expr else {
            panic!("expected invocation");
        };
        let Invocation::Function(call) = &inv.invocation else {
            panic!("expected function call");
        };
        assert_eq!(call.args.len(), 1);
        assert!(matches!(call.args[0], ExpressionNode::BinaryOp(_)));
    }

    #[test]
    fn delimited_identifiers_parse() {
        let expr = parse_ok("`PlanDefinition`.action");
        let ExpressionNode::Invocation(inv) = &expr else {
            panic!("expected invocation");
        };
        let ExpressionNode::Identifier(root) = inv.target.as_ref() else {
            panic!("expected identifier root");
        };
        assert_eq!(root.name, "PlanDefinition");
    }

    #[test]
    fn dollar_variables_parse() {
        assert_eq!(parse_ok("$this"), ExpressionNode::This);
        assert_eq!(parse_ok("$index"), ExpressionNode::Index);
        assert_eq!(parse_ok("$total"), ExpressionNode::Total);
    }
}
