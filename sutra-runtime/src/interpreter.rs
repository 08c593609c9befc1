//! Interpreter: executes a parsed `Program` against one agent.
//!
//! Statements run strictly in source order. Each produces response lines
//! (one per statement, except QUERY which emits one line per match). A
//! failing statement aborts the rest of the program; earlier statements stay
//! applied.

use sutra_core::{
    commitment_content, format_args, offer_content, AgentState, Args, Signature,
};
use sutra_dsl::{Predicate, Program, Statement};
use thiserror::Error;

/// Interpreter failure. Aborts the current `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Signing failed for {statement}: {reason}")]
    SigningFailed { statement: String, reason: String },
}

/// Executes programs against a borrowed agent.
pub struct Interpreter<'a> {
    agent: &'a mut AgentState,
}

impl<'a> Interpreter<'a> {
    pub fn new(agent: &'a mut AgentState) -> Self {
        Self { agent }
    }

    /// Execute every statement of `program`, returning the response lines.
    pub fn execute(&mut self, program: &Program) -> Result<Vec<String>, RuntimeError> {
        let from_agent = program
            .header("from")
            .unwrap_or(self.agent.agent_id())
            .to_string();

        let mut responses = Vec::with_capacity(program.statements.len());
        for statement in &program.statements {
            tracing::debug!(
                agent_id = %self.agent.agent_id(),
                keyword = %statement.keyword(),
                "executing statement"
            );
            self.execute_statement(statement, &from_agent, &mut responses)?;
        }
        Ok(responses)
    }

    fn execute_statement(
        &mut self,
        statement: &Statement,
        from_agent: &str,
        out: &mut Vec<String>,
    ) -> Result<(), RuntimeError> {
        match statement {
            Statement::Intent(p) => {
                let args = p.resolve_args();
                out.push(format!("[INTENT] {}", render(p, &args)));
                self.agent.add_intent(&p.name, args);
            }
            Statement::Fact(p) => {
                let args = p.resolve_args();
                out.push(format!("[FACT] {}", render(p, &args)));
                self.agent.add_fact(&p.name, args);
            }
            Statement::Query { predicate, .. } => {
                let args = predicate.resolve_args();
                let matches = self.agent.query_facts(&predicate.name, &args);
                if matches.is_empty() {
                    out.push(format!(
                        "[QUERY] No matching facts for {}",
                        render(predicate, &args)
                    ));
                } else {
                    out.extend(matches.iter().map(|f| format!("[QUERY RESULT] {}", f)));
                }
            }
            Statement::Offer {
                offer_id,
                to_agent,
                fields,
            } => {
                let fields: Args = fields
                    .iter()
                    .map(|f| (f.key.clone(), f.value.resolve()))
                    .collect();
                let signature = self.sign_offer(offer_id, from_agent, to_agent, &fields)?;
                out.push(format!(
                    "[OFFER] id=\"{}\" → {}{}",
                    offer_id,
                    to_agent,
                    signature_note(signature.as_ref())
                ));
                self.agent
                    .add_offer(offer_id, from_agent, to_agent, fields, signature);
            }
            Statement::Accept { offer_id } => {
                if self.agent.accept_offer(offer_id) {
                    out.push(format!("[ACCEPT] Offer \"{}\" accepted", offer_id));
                } else {
                    tracing::warn!(offer_id = %offer_id, "accept failed: offer missing or settled");
                    out.push(format!(
                        "[ACCEPT FAILED] Offer \"{}\" not found or not open",
                        offer_id
                    ));
                }
            }
            Statement::Reject { offer_id, reason } => {
                if self.agent.reject_offer(offer_id, reason.as_deref()) {
                    match reason.as_deref() {
                        Some(r) if !r.is_empty() => {
                            out.push(format!("[REJECT] Offer \"{}\" rejected: {}", offer_id, r))
                        }
                        _ => out.push(format!("[REJECT] Offer \"{}\" rejected", offer_id)),
                    }
                } else {
                    tracing::warn!(offer_id = %offer_id, "reject failed: offer missing or settled");
                    out.push(format!(
                        "[REJECT FAILED] Offer \"{}\" not found or not open",
                        offer_id
                    ));
                }
            }
            Statement::Commit {
                predicate,
                deadline,
            } => {
                let args = predicate.resolve_args();
                let signature = self.sign_commitment(predicate, &args, deadline.as_deref())?;
                let by = deadline
                    .as_ref()
                    .map(|d| format!(" BY \"{}\"", d))
                    .unwrap_or_default();
                out.push(format!(
                    "[COMMIT] {}{}{}",
                    render(predicate, &args),
                    by,
                    signature_note(signature.as_ref())
                ));
                self.agent
                    .add_commit(&predicate.name, args, deadline.clone(), signature);
            }
            Statement::Act(p) => {
                let args = p.resolve_args();
                out.push(format!("[ACT] {}", render(p, &args)));
                self.agent.add_action(&p.name, args);
            }
        }
        Ok(())
    }

    fn sign_offer(
        &self,
        offer_id: &str,
        from_agent: &str,
        to_agent: &str,
        fields: &Args,
    ) -> Result<Option<Signature>, RuntimeError> {
        let Some(signer) = self.agent.signer() else {
            return Ok(None);
        };
        let content = offer_content(offer_id, from_agent, to_agent, fields);
        signer.sign(&content).map(Some).map_err(|e| {
            tracing::warn!(offer_id = %offer_id, error = %e, "offer signing failed");
            RuntimeError::SigningFailed {
                statement: format!("OFFER id=\"{}\"", offer_id),
                reason: e.to_string(),
            }
        })
    }

    fn sign_commitment(
        &self,
        predicate: &Predicate,
        args: &Args,
        deadline: Option<&str>,
    ) -> Result<Option<Signature>, RuntimeError> {
        let Some(signer) = self.agent.signer() else {
            return Ok(None);
        };
        let content = commitment_content(&predicate.name, args, self.agent.agent_id(), deadline);
        signer.sign(&content).map(Some).map_err(|e| {
            tracing::warn!(predicate = %predicate.name, error = %e, "commitment signing failed");
            RuntimeError::SigningFailed {
                statement: format!("COMMIT {}", render(predicate, args)),
                reason: e.to_string(),
            }
        })
    }
}

/// Execute `program` against `agent`.
pub fn execute(program: &Program, agent: &mut AgentState) -> Result<Vec<String>, RuntimeError> {
    Interpreter::new(agent).execute(program)
}

fn render(predicate: &Predicate, args: &Args) -> String {
    format!("{}({})", predicate.name, format_args(args))
}

fn signature_note(signature: Option<&Signature>) -> String {
    match signature {
        Some(sig) => format!(" (signed {}:{}...)", sig.algorithm, sig.short()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sutra_core::{Ed25519Signer, OfferStatus, Value};
    use sutra_dsl::parse;

    fn run(source: &str, agent: &mut AgentState) -> Vec<String> {
        let program = parse(source).unwrap();
        execute(&program, agent).unwrap()
    }

    #[test]
    fn test_one_response_per_statement_in_order() {
        let mut agent = AgentState::new("alice");
        let responses = run(
            r#"FACT a(x=1); INTENT b(); ACT c(y="z"); FACT d(flag=true);"#,
            &mut agent,
        );
        assert_eq!(
            responses,
            vec![
                "[FACT] a(x=1)",
                "[INTENT] b()",
                r#"[ACT] c(y="z")"#,
                "[FACT] d(flag=true)",
            ]
        );
        assert_eq!(agent.beliefs().len(), 2);
        assert_eq!(agent.goals().len(), 1);
        assert_eq!(agent.actions().len(), 1);
    }

    #[test]
    fn test_query_result_reproduces_fact() {
        let mut agent = AgentState::new("alice");
        let responses = run(
            r#"FACT available(item="TV", price=100); QUERY available(item="TV") FROM "x";"#,
            &mut agent,
        );
        assert_eq!(
            responses[1],
            r#"[QUERY RESULT] FACT available(item="TV", price=100)"#
        );
    }

    #[test]
    fn test_query_without_match() {
        let mut agent = AgentState::new("alice");
        let responses = run(r#"QUERY missing(k="v") FROM "x";"#, &mut agent);
        assert_eq!(responses, vec![r#"[QUERY] No matching facts for missing(k="v")"#]);
    }

    #[test]
    fn test_query_emits_line_per_match() {
        let mut agent = AgentState::new("alice");
        let responses = run("FACT p(a=1); FACT p(a=1, b=2); QUERY p(a=1) FROM \"me\";", &mut agent);
        assert_eq!(responses.len(), 4);
        assert!(responses[2..].iter().all(|r| r.starts_with("[QUERY RESULT]")));
    }

    #[test]
    fn test_offer_accept_twice() {
        let mut agent = AgentState::new("alice");
        let responses = run(
            r#"OFFER id="o1" TO "b" { give: { money: 10 } }; ACCEPT "o1"; ACCEPT "o1";"#,
            &mut agent,
        );
        assert_eq!(responses[0], r#"[OFFER] id="o1" → b"#);
        assert_eq!(responses[1], r#"[ACCEPT] Offer "o1" accepted"#);
        assert_eq!(responses[2], r#"[ACCEPT FAILED] Offer "o1" not found or not open"#);
        assert_eq!(agent.sizes().offers, 1);
        assert_eq!(agent.offer("o1").map(|o| o.status), Some(OfferStatus::Accepted));

        let give = agent.offer("o1").and_then(|o| o.fields.get("give").cloned());
        assert_eq!(
            give.and_then(|g| g.as_map().and_then(|m| m.get("money").cloned())),
            Some(Value::Number(10.0))
        );
    }

    #[test]
    fn test_reject_with_reason() {
        let mut agent = AgentState::new("alice");
        let responses = run(
            r#"OFFER id="o1" TO "b" {}; REJECT "o1" REASON "price"; REJECT "o9";"#,
            &mut agent,
        );
        assert_eq!(responses[1], r#"[REJECT] Offer "o1" rejected: price"#);
        assert_eq!(responses[2], r#"[REJECT FAILED] Offer "o9" not found or not open"#);
    }

    #[test]
    fn test_from_header_sets_offer_origin() {
        let mut agent = AgentState::new("alice");
        run(r#"# from "alice@home" OFFER id="o1" TO "b" {};"#, &mut agent);
        assert_eq!(agent.offer("o1").map(|o| o.from_agent.as_str()), Some("alice@home"));

        let mut agent = AgentState::new("carol");
        run(r#"OFFER id="o1" TO "b" {};"#, &mut agent);
        assert_eq!(agent.offer("o1").map(|o| o.from_agent.as_str()), Some("carol"));
    }

    #[test]
    fn test_commit_with_deadline_unsigned() {
        let mut agent = AgentState::new("alice");
        let responses = run(r#"COMMIT deliver(item="TV") BY "2025-01-01";"#, &mut agent);
        assert_eq!(responses, vec![r#"[COMMIT] deliver(item="TV") BY "2025-01-01""#]);
        assert!(!agent.commitments()[0].is_signed());
    }

    #[test]
    fn test_signer_attaches_verifiable_signatures() {
        let signer = Arc::new(Ed25519Signer::from_secret_bytes("alice", &[1u8; 32]));
        let mut agent = AgentState::with_signer("alice", signer.clone());
        let responses = run(
            r#"OFFER id="o1" TO "bob" { price: 5 }; COMMIT pay(amount=5) BY "now";"#,
            &mut agent,
        );
        assert!(responses[0].contains("(signed ed25519:"));
        assert!(responses[1].contains("(signed ed25519:"));

        let offer = agent.offer("o1").unwrap();
        assert!(sutra_core::verify_offer(signer.as_ref(), offer));
        assert!(sutra_core::verify_commitment(
            signer.as_ref(),
            "alice",
            &agent.commitments()[0]
        ));
    }

    #[test]
    fn test_log_mirrors_every_mutation() {
        let mut agent = AgentState::new("alice");
        run(
            r#"FACT a(); INTENT b(); OFFER id="o" TO "x" {}; ACCEPT "o"; COMMIT c(); ACT d();"#,
            &mut agent,
        );
        assert_eq!(agent.log().len(), 6);
    }
}
