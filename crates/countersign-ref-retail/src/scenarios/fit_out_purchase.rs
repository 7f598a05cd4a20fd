//! Scenario 5: Store Fit-out Purchase
//!
//! After the store manager approves, finance and procurement run in
//! parallel. The procurement buyer transfers the decision to a colleague
//! and loses the right to act; the finance controller adds a treasury
//! co-signer. The request completes only when both parallel nodes close.

use countersign_contracts::{
    error::ApprovalResult,
    ids::ActorId,
    node::{Action, ApproverRef},
    request::{NewRequest, Priority, RequestType},
};

use crate::{
    mock_data,
    runtime::{print_refusal, print_state, RetailRuntime, ScenarioOutcome},
};

pub fn run_scenario() -> ApprovalResult<ScenarioOutcome> {
    println!("=== Scenario 5: Fit-out Purchase (parallel, transfer, add-sign) ===");
    println!();
    run(&RetailRuntime::new()?)
}

pub fn run(runtime: &RetailRuntime) -> ApprovalResult<ScenarioOutcome> {
    let request_id = runtime.engine.submit_new(NewRequest {
        template_id: "fit-out-purchase".to_string(),
        title: "Fit-out PO for ST-0412".to_string(),
        request_type: RequestType::Purchase,
        business_id: "po-77120".to_string(),
        applicant: ActorId::new("pm.moreau"),
        form_data: mock_data::fit_out_purchase_form(),
        priority: Priority::Medium,
        deadline_date: None,
    })?;
    println!("  Submitted {request_id} by pm.moreau");

    let manager = runtime.node(&request_id, 0)?;
    let state = runtime.engine.process_action(
        &request_id,
        &manager,
        &ActorId::new("sm.dupont"),
        Action::Approve,
        "Matches the fit-out budget",
    )?;
    print_state("Store manager approves", &state);

    let finance = runtime.node(&request_id, 1)?;
    let procurement = runtime.node(&request_id, 2)?;

    let state = runtime.engine.process_action(
        &request_id,
        &procurement,
        &ActorId::new("pr.roux"),
        Action::Transfer {
            to: ApproverRef::new("pr.garcia", "Elsa Garcia"),
        },
        "Elsa owns the Agencement Alpes account",
    )?;
    print_state("pr.roux transfers to pr.garcia", &state);

    if let Err(error) = runtime.engine.process_action(
        &request_id,
        &procurement,
        &ActorId::new("pr.roux"),
        Action::Approve,
        "",
    ) {
        print_refusal("pr.roux approves anyway", &error);
    }

    let state = runtime.engine.process_action(
        &request_id,
        &finance,
        &ActorId::new("fc.martin"),
        Action::AddSign {
            approver: ApproverRef::new("tr.lambert", "Denis Lambert"),
        },
        "Above 50k, treasury co-signs",
    )?;
    print_state("fc.martin adds tr.lambert", &state);

    let waiting = runtime.engine.inbox(&ActorId::new("tr.lambert"))?;
    println!("  {:<32} {} open item(s)", "Inbox of tr.lambert", waiting.len());

    for (node, who) in [(finance, "fc.martin"), (procurement, "pr.garcia"), (finance, "tr.lambert")] {
        let state = runtime
            .engine
            .process_action(&request_id, &node, &ActorId::new(who), Action::Approve, "")?;
        print_state(&format!("{who} approves"), &state);
    }
    println!();

    runtime.finish(&request_id)
}
