//! Unit tests for the fixture parser.
#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use rstest::rstest;
use serde_json::json;

use driftcheck_model::Expression;

use super::*;

#[rstest]
fn parses_a_single_line_resource_block() {
    let body = parse(
        "main.tf",
        r#"resource "azurerm_resource_group" "rg" { location = "westeurope" }"#,
    )
    .expect("parse");

    let block = &body.blocks[0];
    assert_eq!(block.block_type, "resource");
    assert_eq!(block.labels, vec!["azurerm_resource_group", "rg"]);

    let attr = &block.body.attributes[0];
    assert_eq!(attr.name, "location");
    assert_eq!(attr.expr, Expression::Literal(json!("westeurope")));
}

#[rstest]
fn tracks_positions_line_and_column() {
    let source = "resource \"azurerm_resource_group\" \"rg\" {\n  location = \"westeurope\"\n}\n";
    let body = parse("main.tf", source).expect("parse");

    let block = &body.blocks[0];
    assert_eq!(block.type_range.start, Pos::new(1, 1, 0));
    assert_eq!(block.type_range.end, Pos::new(1, 9, 8));
    // def_range runs through the closing quote of the last label.
    assert_eq!(block.def_range.start, Pos::new(1, 1, 0));
    assert_eq!(block.def_range.end, Pos::new(1, 39, 38));
    assert_eq!(block.label_ranges.len(), 2);

    let attr = &block.body.attributes[0];
    assert_eq!(attr.name_range.start, Pos::new(2, 3, 43));
    assert_eq!(attr.name_range.end, Pos::new(2, 11, 51));
    assert_eq!(attr.range.start, Pos::new(2, 3, 43));
    assert_eq!(attr.range.end, Pos::new(2, 26, 66));
}

#[rstest]
fn parses_nested_blocks() {
    let source = r#"
resource "azurerm_resource_group" "rg" {
  location = "westeurope"
  timeouts {
    create = "30m"
  }
}
"#;
    let body = parse("main.tf", source).expect("parse");
    let nested = &body.blocks[0].body.blocks[0];
    assert_eq!(nested.block_type, "timeouts");
    assert!(nested.labels.is_empty());
    assert_eq!(nested.body.attributes[0].name, "create");
}

#[rstest]
#[case::number("count = 3", Expression::Literal(json!(3)))]
#[case::float("threshold = 0.75", Expression::Literal(json!(0.75)))]
#[case::bool_true("enabled = true", Expression::Literal(json!(true)))]
#[case::bool_false("enabled = false", Expression::Literal(json!(false)))]
#[case::reference("location = var.location", Expression::Raw("var.location".into()))]
#[case::function("name = join(\"-\", [1, 2])", Expression::Raw("join(\"-\", [1, 2])".into()))]
fn parses_attribute_expressions(#[case] source: &str, #[case] expected: Expression) {
    let body = parse("main.tf", source).expect("parse");
    assert_eq!(body.attributes[0].expr, expected);
}

#[rstest]
fn raw_expression_inside_a_single_line_block_stops_at_the_brace() {
    let body = parse("main.tf", r#"lifecycle { prevent_destroy = var.locked }"#).expect("parse");
    let attr = &body.blocks[0].body.attributes[0];
    assert_eq!(attr.expr, Expression::Raw("var.locked".into()));
}

#[rstest]
fn string_escapes_are_decoded() {
    let body = parse("main.tf", r#"greeting = "line\none \"two\"""#).expect("parse");
    assert_eq!(
        body.attributes[0].expr,
        Expression::Literal(json!("line\none \"two\""))
    );
}

#[rstest]
fn comments_are_skipped() {
    let source = "# leading comment\nlocation = \"westeurope\" \n// trailing comment\n";
    let body = parse("main.tf", source).expect("parse");
    assert_eq!(body.attributes.len(), 1);
}

#[rstest]
#[case::unterminated_string(r#"location = "westeurope"#)]
#[case::dangling_name("location\n")]
#[case::unclosed_block(r#"resource "a" "b" {"#)]
#[case::missing_expression("location =\n")]
fn malformed_sources_are_rejected(#[case] source: &str) {
    parse("main.tf", source).expect_err("malformed source");
}

#[rstest]
fn parse_error_names_the_location() {
    let err = parse("main.tf", "location = \"oops").expect_err("unterminated");
    assert_eq!(err.filename, "main.tf");
    assert_eq!(err.line, 1);
    assert!(err.to_string().starts_with("main.tf:1:"));
}
