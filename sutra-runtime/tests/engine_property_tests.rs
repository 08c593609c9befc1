//! Property-Based Tests for the SUTRA execution engine
//!
//! Properties:
//! - FACT/INTENT/ACT programs produce one response per statement, in order.
//! - The sandbox drops exactly the statements whose keyword is denied.
//! - Sandbox runs never share state.
//! - A failing `safe_execute` leaves every ledger untouched.

use proptest::prelude::*;
use std::collections::BTreeSet;
use sutra_core::{AgentState, CapabilityPolicy, Keyword, SandboxConfig};
use sutra_dsl::{pretty_print, Program, Statement};
use sutra_runtime::{execute, safe_execute, Sandbox, Transaction};
use sutra_test_utils::{assertions, fixtures, generators};

fn arb_record_statement() -> impl Strategy<Value = Statement> {
    prop_oneof![
        generators::arb_predicate().prop_map(Statement::Fact),
        generators::arb_predicate().prop_map(Statement::Intent),
        generators::arb_predicate().prop_map(Statement::Act),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_one_response_per_record_statement(
        statements in prop::collection::vec(arb_record_statement(), 0..12)
    ) {
        let program = Program { headers: vec![], statements };
        let mut agent = AgentState::new("alice");
        let responses = execute(&program, &mut agent).unwrap();

        prop_assert_eq!(responses.len(), program.statements.len());
        for (response, statement) in responses.iter().zip(&program.statements) {
            let tag = format!("[{}] ", statement.keyword());
            prop_assert!(response.starts_with(&tag), "{} vs {}", response, tag);
        }
        let sizes = agent.sizes();
        prop_assert_eq!(sizes.beliefs + sizes.goals + sizes.actions, program.statements.len());
    }

    #[test]
    fn prop_sandbox_counts_blocked_statements(
        program in generators::arb_program(),
        denied in prop::collection::btree_set(generators::arb_keyword(), 0..4),
    ) {
        let sandbox = Sandbox::new(SandboxConfig {
            capabilities: CapabilityPolicy::Deny(denied.clone()),
            ..SandboxConfig::default()
        });
        let result = sandbox.execute(&pretty_print(&program));

        let total = program.statements.len();
        let blocked = program
            .statements
            .iter()
            .filter(|s| denied.contains(&s.keyword()))
            .count();
        prop_assert_eq!(result.stats.statements_total, total);
        prop_assert_eq!(result.stats.statements_blocked, blocked);
        prop_assert_eq!(result.stats.statements_executed, total - blocked);
        if blocked > 0 {
            prop_assert!(!result.success);
        }
    }

    #[test]
    fn prop_sandbox_runs_are_isolated(program in generators::arb_program()) {
        let sandbox = Sandbox::default();
        let source = pretty_print(&program);
        let first = sandbox.execute(&source);
        let second = sandbox.execute(&source);
        prop_assert_eq!(first.stats, second.stats);
        prop_assert_eq!(first.responses, second.responses);
        prop_assert_eq!(first.violations, second.violations);
    }

    #[test]
    fn prop_failed_safe_execute_changes_nothing(program in generators::arb_program()) {
        let mut agent = fixtures::failing_agent("alice");
        let _ = safe_execute(&mut agent, fixtures::NEGOTIATION);
        let before = agent.ledgers().clone();

        let source = format!("{}\nCOMMIT bad_call_that_throws();", pretty_print(&program));
        let outcome = safe_execute(&mut agent, &source);
        assertions::assert_rolled_back(&outcome);
        assertions::assert_ledgers_eq(agent.ledgers(), &before);
    }

    #[test]
    fn prop_rollback_all_restores_outermost(
        programs in prop::collection::vec(generators::arb_program(), 1..4)
    ) {
        let mut agent = fixtures::populated_agent("alice");
        let before = agent.ledgers().clone();
        let mut tx = Transaction::new(&mut agent);
        for program in &programs {
            tx.begin();
            let _ = tx.execute(&pretty_print(program));
        }
        prop_assert_eq!(tx.depth(), programs.len());
        tx.rollback_all();
        assertions::assert_ledgers_eq(tx.agent().ledgers(), &before);
    }
}

#[test]
fn test_all_keywords_denied_blocks_everything() {
    let sandbox = Sandbox::new(SandboxConfig {
        capabilities: CapabilityPolicy::Deny(Keyword::ALL.into_iter().collect::<BTreeSet<_>>()),
        ..SandboxConfig::default()
    });
    let result = sandbox.execute(fixtures::NEGOTIATION);
    assert_eq!(result.stats.statements_executed, 0);
    assert_eq!(result.stats.statements_blocked, 9);
    assert!(result.responses.is_empty());
}
