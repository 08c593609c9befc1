//! Pretty printer: renders an AST back to SUTRA source.
//!
//! Output always re-parses to an equal `Program`.

use crate::parser::ast::*;
use sutra_core::{escape_string, format_number};

/// Pretty-print a `Program` back to SUTRA source, one statement per line.
pub fn pretty_print(program: &Program) -> String {
    let mut output = String::new();

    for header in &program.headers {
        output.push_str(&format!(
            "# {} \"{}\"\n",
            header.key,
            escape_string(&header.value)
        ));
    }
    if !program.headers.is_empty() && !program.statements.is_empty() {
        output.push('\n');
    }

    for statement in &program.statements {
        output.push_str(&pretty_print_statement(statement));
        output.push('\n');
    }

    output
}

/// Render one statement, including its terminating `;`.
pub fn pretty_print_statement(statement: &Statement) -> String {
    match statement {
        Statement::Intent(p) => format!("INTENT {};", pretty_print_predicate(p)),
        Statement::Fact(p) => format!("FACT {};", pretty_print_predicate(p)),
        Statement::Query {
            predicate,
            from_agent,
        } => format!(
            "QUERY {} FROM {};",
            pretty_print_predicate(predicate),
            quote(from_agent)
        ),
        Statement::Offer {
            offer_id,
            to_agent,
            fields,
        } => {
            let body = fields
                .iter()
                .map(|f| format!("{}: {}", f.key, pretty_print_value(&f.value)))
                .collect::<Vec<_>>()
                .join(", ");
            if body.is_empty() {
                format!("OFFER id={} TO {} {{}};", quote(offer_id), quote(to_agent))
            } else {
                format!(
                    "OFFER id={} TO {} {{ {} }};",
                    quote(offer_id),
                    quote(to_agent),
                    body
                )
            }
        }
        Statement::Accept { offer_id } => format!("ACCEPT {};", quote(offer_id)),
        Statement::Reject { offer_id, reason } => match reason {
            Some(r) => format!("REJECT {} REASON {};", quote(offer_id), quote(r)),
            None => format!("REJECT {};", quote(offer_id)),
        },
        Statement::Commit {
            predicate,
            deadline,
        } => match deadline {
            Some(d) => format!("COMMIT {} BY {};", pretty_print_predicate(predicate), quote(d)),
            None => format!("COMMIT {};", pretty_print_predicate(predicate)),
        },
        Statement::Act(p) => format!("ACT {};", pretty_print_predicate(p)),
    }
}

fn pretty_print_predicate(predicate: &Predicate) -> String {
    let args = predicate
        .args
        .iter()
        .map(|a| format!("{}={}", a.name, pretty_print_value(&a.value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({})", predicate.name, args)
}

fn pretty_print_value(value: &ValueNode) -> String {
    match value {
        ValueNode::String(s) => quote(s),
        ValueNode::Number(n) => format_number(*n),
        ValueNode::Bool(b) => b.to_string(),
        ValueNode::Null => "null".to_string(),
        ValueNode::Map(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, pretty_print_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        ValueNode::List(items) => {
            let parts: Vec<String> = items.iter().map(pretty_print_value).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn test_pretty_print_statements() {
        let program = Program {
            headers: vec![Header {
                key: "from".into(),
                value: "alice".into(),
            }],
            statements: vec![
                Statement::Fact(
                    Predicate::new("available")
                        .with_arg("item", ValueNode::String("TV".into()))
                        .with_arg("price", ValueNode::Number(100.0)),
                ),
                Statement::Offer {
                    offer_id: "o1".into(),
                    to_agent: "bob".into(),
                    fields: vec![OfferField {
                        key: "give".into(),
                        value: ValueNode::Map(vec![("money".into(), ValueNode::Number(10.5))]),
                    }],
                },
                Statement::Reject {
                    offer_id: "o1".into(),
                    reason: Some("say \"no\"".into()),
                },
            ],
        };

        let printed = pretty_print(&program);
        assert_eq!(
            printed,
            "# from \"alice\"\n\n\
             FACT available(item=\"TV\", price=100);\n\
             OFFER id=\"o1\" TO \"bob\" { give: {money: 10.5} };\n\
             REJECT \"o1\" REASON \"say \\\"no\\\"\";\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_ast() {
        let source = r#"
            # from "alice"
            INTENT buy(item="TV", budget=-20.25);
            QUERY available(item="TV") FROM "shop";
            OFFER id="o1" TO "b" {};
            OFFER id="o2" TO "b" { tags: [1, "two", null, true], nested: { a: { b: [] } } };
            ACCEPT "o1";
            REJECT "o2";
            COMMIT deliver() BY "friday";
            ACT ship(note="line\nbreak\ttab\\slash");
        "#;
        let first = parse(source).unwrap();
        let second = parse(&pretty_print(&first)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_program_prints_empty() {
        assert_eq!(pretty_print(&Program::default()), "");
    }
}
