//! FHIRPath expression parser using Winnow
//!
//! Recursive descent with precedence climbing, one function per precedence
//! level. The parser is pure and deterministic: the same source text always
//! produces the same AST, and malformed input always produces a
//! [`FhirPathError::Parse`](octofhir_fhirpath_diagnostics::FhirPathError)
//! identifying the offending position.

mod combinators;
mod expression;

use octofhir_fhirpath_ast::ExpressionNode;
use octofhir_fhirpath_diagnostics::{FP0001, FhirPathError, Result, Span};
use winnow::Parser;

/// Parse a FHIRPath expression into its AST
///
/// The whole input must be consumed; trailing tokens are an error.
pub fn parse(text: &str) -> Result<ExpressionNode> {
    expression::entry
        .parse(text)
        .map_err(|err| {
            let offset = err.offset().min(text.len());
            let message = render_message(err.inner());
            FhirPathError::parse(FP0001, message, Span::point(offset))
        })
}

fn render_message(inner: &winnow::error::ContextError) -> String {
    let rendered = inner.to_string();
    if rendered.is_empty() {
        "Unexpected token".to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_fhirpath_ast::{BinaryOp, ExpressionNode, Invocation, Literal};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parses_member_chain() {
        let ast = parse("Patient.name.given").unwrap();
        let ExpressionNode::Invocation(inv) = &ast else {
            panic!("expected invocation, got {ast:?}");
        };
        let Invocation::Member(id) = &inv.invocation else {
            panic!("expected member access");
        };
        assert_eq!(id.name, "given");
    }

    #[test]
    fn parses_operator_precedence() {
        let ast = parse("1 + 2 * 3").unwrap();
        let ExpressionNode::BinaryOp(add) = &ast else {
            panic!("expected binary op");
        };
        assert_eq!(add.op, BinaryOp::Add);
        let ExpressionNode::BinaryOp(mul) = add.right.as_ref() else {
            panic!("expected multiplication on the right");
        };
        assert_eq!(mul.op, BinaryOp::Mul);
    }

    #[test]
    fn trailing_tokens_are_an_error() {
        let err = parse("1 + 2 )").unwrap_err();
        assert!(err.is_parse(), "expected parse error, got {err:?}");
    }

    #[rstest]
    #[case("")]
    #[case("1 +")]
    #[case("where(")]
    #[case("a..b")]
    #[case("'unterminated")]
    #[case("/* unterminated")]
    fn malformed_input_is_rejected(#[case] text: &str) {
        assert!(parse(text).is_err(), "expected parse failure for {text:?}");
    }

    #[rstest]
    #[case("@-1010")]
    #[case("@2010:XX")]
    #[case("@2010-05-32")]
    #[case("@2019-10-11T29")]
    #[case("@2019-10-11T01:78:00")]
    #[case("@2012-04-15T15:00:00.1234567890")]
    #[case("@2020-01-01T10:00:00+0500")]
    fn malformed_temporal_literals_are_rejected(#[case] text: &str) {
        assert!(parse(text).is_err(), "expected parse failure for {text:?}");
    }

    #[rstest]
    #[case("true")]
    #[case("42")]
    #[case("4.5")]
    #[case("'some text'")]
    #[case("@2020")]
    #[case("@2020-01")]
    #[case("@2020-01-01")]
    #[case("@2012-04-15T15:00:00Z")]
    #[case("@2012-04-15T15:00:00.123-05:00")]
    #[case("@T14:30:00.5")]
    #[case("4.5 'mg'")]
    fn literals_round_trip_through_display(#[case] text: &str) {
        let first = parse(text).unwrap();
        let second = parse(&first.to_string()).unwrap();
        assert_eq!(first, second, "round-trip changed {text:?}");
    }

    #[test]
    fn comments_are_skipped() {
        let ast = parse("1 /* block */ + // line\n 2").unwrap();
        let ExpressionNode::BinaryOp(add) = &ast else {
            panic!("expected binary op");
        };
        assert_eq!(*add.left, ExpressionNode::Literal(Literal::Integer(1)));
        assert_eq!(*add.right, ExpressionNode::Literal(Literal::Integer(2)));
    }
}
