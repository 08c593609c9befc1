//! SUTRA Test Utilities
//!
//! Shared test infrastructure for the SUTRA workspace:
//! - Proptest generators for AST nodes, programs and runtime values
//! - Fixtures: agents, signers and sample programs
//! - Custom assertions for ledgers, sandbox results and front-end errors
//!
//! Only integration tests (`tests/` directories) should depend on this crate.

pub use sutra_core::{
    AgentState, Args, CanonicalContent, Ed25519Signer, Keyword, Ledgers, Signature, Signer,
    SignerError, Value,
};
pub use sutra_dsl::{DslError, NamedArg, OfferField, Predicate, Program, Statement, ValueNode};
pub use sutra_runtime::{EngineError, SandboxResult};

use std::sync::Arc;

/// Install a test-friendly tracing subscriber. Honours `RUST_LOG`, defaults
/// to `warn`, and is safe to call from every test.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies producing valid SUTRA syntax trees.

    use super::*;
    use proptest::prelude::*;
    use sutra_dsl::Header;

    const RESERVED: [&str; 4] = ["id", "true", "false", "null"];

    /// Identifier usable as predicate, argument, field or map key.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}".prop_filter("reserved word", |s| !RESERVED.contains(&s.as_str()))
    }

    /// Agent name such as `bob` or `buyer@home`.
    pub fn arb_agent_name() -> impl Strategy<Value = String> {
        "[a-z]{1,8}(@[a-z]{1,6})?"
    }

    /// String content, including characters that need escaping.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 _.\\-\"\\\\\n\t]{0,12}"
    }

    /// Numbers with an exact decimal rendering.
    pub fn arb_number() -> impl Strategy<Value = f64> {
        prop_oneof![
            (-10_000i32..10_000).prop_map(f64::from),
            (-4_000i32..4_000).prop_map(|n| f64::from(n) / 4.0),
        ]
    }

    pub fn arb_keyword() -> impl Strategy<Value = Keyword> {
        prop::sample::select(Keyword::ALL.to_vec())
    }

    fn arb_leaf() -> impl Strategy<Value = ValueNode> {
        prop_oneof![
            arb_text().prop_map(ValueNode::String),
            arb_number().prop_map(ValueNode::Number),
            any::<bool>().prop_map(ValueNode::Bool),
            Just(ValueNode::Null),
        ]
    }

    /// Literal value, nested up to three levels of maps and lists.
    pub fn arb_value_node() -> impl Strategy<Value = ValueNode> {
        arb_leaf().prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(ValueNode::List),
                prop::collection::vec((arb_identifier(), inner), 0..4).prop_map(ValueNode::Map),
            ]
        })
    }

    pub fn arb_predicate() -> impl Strategy<Value = Predicate> {
        (
            arb_identifier(),
            prop::collection::vec((arb_identifier(), arb_value_node()), 0..4),
        )
            .prop_map(|(name, args)| Predicate {
                name,
                args: args
                    .into_iter()
                    .map(|(name, value)| NamedArg { name, value })
                    .collect(),
            })
    }

    fn arb_offer_id() -> impl Strategy<Value = String> {
        "o[0-9]{1,2}"
    }

    pub fn arb_statement() -> impl Strategy<Value = Statement> {
        prop_oneof![
            arb_predicate().prop_map(Statement::Intent),
            arb_predicate().prop_map(Statement::Fact),
            (arb_predicate(), arb_agent_name()).prop_map(|(predicate, from_agent)| {
                Statement::Query {
                    predicate,
                    from_agent,
                }
            }),
            (
                arb_offer_id(),
                arb_agent_name(),
                prop::collection::vec((arb_identifier(), arb_value_node()), 0..3),
            )
                .prop_map(|(offer_id, to_agent, fields)| Statement::Offer {
                    offer_id,
                    to_agent,
                    fields: fields
                        .into_iter()
                        .map(|(key, value)| OfferField { key, value })
                        .collect(),
                }),
            arb_offer_id().prop_map(|offer_id| Statement::Accept { offer_id }),
            (arb_offer_id(), proptest::option::of(arb_text()))
                .prop_map(|(offer_id, reason)| Statement::Reject { offer_id, reason }),
            (arb_predicate(), proptest::option::of(arb_text())).prop_map(
                |(predicate, deadline)| Statement::Commit {
                    predicate,
                    deadline,
                }
            ),
            arb_predicate().prop_map(Statement::Act),
        ]
    }

    pub fn arb_program() -> impl Strategy<Value = Program> {
        (
            prop::collection::vec((arb_identifier(), arb_agent_name()), 0..3),
            prop::collection::vec(arb_statement(), 0..8),
        )
            .prop_map(|(headers, statements)| Program {
                headers: headers
                    .into_iter()
                    .map(|(key, value)| Header { key, value })
                    .collect(),
                statements,
            })
    }

    /// Resolved predicate arguments.
    pub fn arb_args() -> impl Strategy<Value = Args> {
        prop::collection::btree_map(arb_identifier(), arb_value_node(), 0..4).prop_map(|m| {
            m.into_iter()
                .map(|(k, v)| (k, v.resolve()))
                .collect::<Args>()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built agents, signers and programs.

    use super::*;

    /// A negotiation touching every statement kind.
    pub const NEGOTIATION: &str = r#"
# from "buyer@home"

INTENT buy(item="TV", budget=500);
FACT available(item="TV", price=450);
QUERY available(item="TV") FROM "seller@shop";
OFFER id="o1" TO "seller@shop" { give: { money: 450 }, want: { item: "TV" } };
OFFER id="o2" TO "seller@shop" { give: { money: 300 } };
ACCEPT "o1";
REJECT "o2" REASON "too low";
COMMIT pay(amount=450) BY "2025-01-01";
ACT transfer(amount=450, to="seller@shop");
"#;

    /// Deterministic Ed25519 signer; distinct seeds give distinct keys.
    pub fn ed25519_signer(agent_id: &str, seed: u8) -> Arc<Ed25519Signer> {
        Arc::new(Ed25519Signer::from_secret_bytes(agent_id, &[seed; 32]))
    }

    /// Agent carrying a deterministic Ed25519 signer.
    pub fn signed_agent(agent_id: &str) -> AgentState {
        AgentState::with_signer(agent_id, ed25519_signer(agent_id, 7))
    }

    /// Agent with one record in every ledger and an open offer `o1`.
    pub fn populated_agent(agent_id: &str) -> AgentState {
        let mut agent = AgentState::new(agent_id);
        let args = |k: &str, v: Value| -> Args { [(k.to_string(), v)].into_iter().collect() };
        agent.add_fact("available", args("item", Value::String("TV".into())));
        agent.add_intent("buy", args("budget", Value::Number(500.0)));
        agent.add_offer("o1", agent_id, "bob", args("price", Value::Number(10.0)), None);
        agent.add_commit("deliver", Args::new(), Some("friday".to_string()), None);
        agent.add_action("ship", Args::new());
        agent
    }

    /// Signer that refuses to sign COMMIT content for one predicate and
    /// delegates everything else to an Ed25519 signer.
    pub struct FailingSigner {
        refuse_predicate: String,
        inner: Ed25519Signer,
    }

    impl FailingSigner {
        pub fn new(agent_id: &str, refuse_predicate: &str) -> Self {
            Self {
                refuse_predicate: refuse_predicate.to_string(),
                inner: Ed25519Signer::from_secret_bytes(agent_id, &[9u8; 32]),
            }
        }
    }

    impl Signer for FailingSigner {
        fn signer_id(&self) -> &str {
            self.inner.signer_id()
        }

        fn sign(&self, content: &CanonicalContent) -> Result<Signature, SignerError> {
            let predicate = content.get("predicate").and_then(Value::as_str);
            if predicate == Some(self.refuse_predicate.as_str()) {
                return Err(SignerError::SigningFailed {
                    signer: self.signer_id().to_string(),
                    reason: format!("refused to sign {}", self.refuse_predicate),
                });
            }
            self.inner.sign(content)
        }

        fn verify(&self, signature: &Signature, content: &CanonicalContent) -> bool {
            self.inner.verify(signature, content)
        }
    }

    /// Agent whose signer fails on COMMIT `bad_call_that_throws`.
    pub fn failing_agent(agent_id: &str) -> AgentState {
        AgentState::with_signer(
            agent_id,
            Arc::new(FailingSigner::new(agent_id, "bad_call_that_throws")),
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions with SUTRA-specific failure messages.

    use super::*;

    /// Assert that two ledger sets are identical, naming the first ledger that
    /// differs.
    #[track_caller]
    pub fn assert_ledgers_eq(actual: &Ledgers, expected: &Ledgers) {
        assert_eq!(actual.belief_base, expected.belief_base, "belief_base differs");
        assert_eq!(actual.goal_set, expected.goal_set, "goal_set differs");
        assert_eq!(actual.offer_ledger, expected.offer_ledger, "offer_ledger differs");
        assert_eq!(actual.commit_ledger, expected.commit_ledger, "commit_ledger differs");
        assert_eq!(actual.action_queue, expected.action_queue, "action_queue differs");
        assert_eq!(actual.message_log, expected.message_log, "message_log differs");
    }

    /// Assert that a sandbox run was clean.
    #[track_caller]
    pub fn assert_clean(result: &SandboxResult) {
        assert!(
            result.is_clean(),
            "Expected clean sandbox run, got violations: {:?}",
            result.violations
        );
    }

    /// Assert that a sandbox run failed with a violation containing `needle`.
    #[track_caller]
    pub fn assert_violation(result: &SandboxResult, needle: &str) {
        assert!(!result.success, "Expected failed sandbox run, got success");
        assert!(
            result.violations.iter().any(|v| v.contains(needle)),
            "Expected a violation containing {:?}, got: {:?}",
            needle,
            result.violations
        );
    }

    /// Assert that `safe_execute` reported a rollback.
    #[track_caller]
    pub fn assert_rolled_back(outcome: &(Vec<String>, bool)) {
        let (responses, ok) = outcome;
        assert!(!ok, "Expected rollback, got success: {:?}", responses);
        assert_eq!(responses.len(), 1, "Expected one rollback line: {:?}", responses);
        assert!(
            responses[0].starts_with("[TX ROLLBACK] "),
            "Expected [TX ROLLBACK] line, got: {}",
            responses[0]
        );
    }

    /// Assert that parsing failed at the given location.
    #[track_caller]
    pub fn assert_parse_error_at<T: std::fmt::Debug>(
        result: &Result<T, DslError>,
        line: usize,
        column: usize,
    ) {
        match result {
            Err(DslError::Parse(e)) => {
                assert_eq!((e.line, e.column), (line, column), "Wrong parse error location: {}", e);
            }
            other => panic!("Expected parse error at {}:{}, got: {:?}", line, column, other),
        }
    }

    /// Assert that lexing failed at the given location.
    #[track_caller]
    pub fn assert_lex_error_at<T: std::fmt::Debug>(
        result: &Result<T, DslError>,
        line: usize,
        column: usize,
    ) {
        match result {
            Err(DslError::Lex(e)) => {
                assert_eq!((e.line, e.column), (line, column), "Wrong lex error location: {}", e);
            }
            other => panic!("Expected lex error at {}:{}, got: {:?}", line, column, other),
        }
    }
}
