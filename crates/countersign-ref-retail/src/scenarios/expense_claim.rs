//! Scenario 2: Store Expense Claim
//!
//! Sub-case A: a claim over the cap without receipts never enters the
//! workflow; the form check reports both problems at once.
//!
//! Sub-case B: a valid claim reaches the two finance controllers under an
//! `all` policy. The first controller rejects, which ends the request; the
//! second controller's approval is refused.

use countersign_contracts::{
    error::{ApprovalError, ApprovalResult},
    ids::ActorId,
    node::Action,
    request::{NewRequest, Priority, RequestType},
};

use crate::{
    mock_data,
    runtime::{print_refusal, print_state, RetailRuntime, ScenarioOutcome},
};

fn claim(amount: f64, receipts: &[&str]) -> NewRequest {
    NewRequest {
        template_id: "expense".to_string(),
        title: "Display case repair ST-0187".to_string(),
        request_type: RequestType::Expense,
        business_id: "exp-5531".to_string(),
        applicant: ActorId::new("sm.petit"),
        form_data: mock_data::expense_form(amount, receipts),
        priority: Priority::Medium,
        deadline_date: None,
    }
}

pub fn run_scenario() -> ApprovalResult<ScenarioOutcome> {
    println!("=== Scenario 2: Store Expense Claim (form check, veto) ===");
    println!();
    run(&RetailRuntime::new()?)
}

pub fn run(runtime: &RetailRuntime) -> ApprovalResult<ScenarioOutcome> {

    println!("  ── Sub-case A: claim of 7 400 EUR without receipts ──");
    match runtime.engine.submit_new(claim(7_400.0, &[])) {
        Err(error @ ApprovalError::FormInvalid { .. }) => print_refusal("Submit", &error),
        Err(other) => return Err(other),
        Ok(id) => println!("  UNEXPECTED: claim {id} was accepted"),
    }
    println!();

    println!("  ── Sub-case B: claim of 1 260 EUR with receipts ──");
    let request_id = runtime
        .engine
        .submit_new(claim(1_260.0, &["invoice-FR-88213.pdf"]))?;
    println!("  Submitted {request_id} by sm.petit");

    let node = runtime.node(&request_id, 0)?;
    let state = runtime.engine.process_action(
        &request_id,
        &node,
        &ActorId::new("fc.bernard"),
        Action::Reject,
        "Cases are under warranty; claim the supplier",
    )?;
    print_state("Controller fc.bernard rejects", &state);

    match runtime.engine.process_action(
        &request_id,
        &node,
        &ActorId::new("fc.martin"),
        Action::Approve,
        "",
    ) {
        Err(error) => print_refusal("Controller fc.martin approves", &error),
        Ok(state) => print_state("UNEXPECTED approval", &state),
    }
    println!();

    runtime.finish(&request_id)
}
