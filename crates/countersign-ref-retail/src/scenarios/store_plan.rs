//! Scenario 1: New Store Plan
//!
//! Two sequential single-approver nodes. The regional manager signs off,
//! the expansion director becomes the active node, and the director's
//! approval completes the request.

use countersign_contracts::{
    error::ApprovalResult,
    ids::ActorId,
    node::Action,
    request::{NewRequest, Priority, RequestType},
};

use crate::{
    mock_data,
    runtime::{print_state, RetailRuntime, ScenarioOutcome},
};

pub fn run_scenario() -> ApprovalResult<ScenarioOutcome> {
    println!("=== Scenario 1: New Store Plan (sequential sign-off) ===");
    println!();
    run(&RetailRuntime::new()?)
}

pub fn run(runtime: &RetailRuntime) -> ApprovalResult<ScenarioOutcome> {
    let request_id = runtime.engine.submit_new(NewRequest {
        template_id: "store-plan".to_string(),
        title: "Open ST-0412 Lyon Part-Dieu".to_string(),
        request_type: RequestType::StorePlan,
        business_id: "plan-0412".to_string(),
        applicant: ActorId::new("pm.moreau"),
        form_data: mock_data::store_plan_form("ST-0412"),
        priority: Priority::High,
        deadline_date: None,
    })?;
    println!("  Submitted {request_id} by pm.moreau");

    let regional = runtime.node(&request_id, 0)?;
    let state = runtime.engine.process_action(
        &request_id,
        &regional,
        &ActorId::new("rm.girard"),
        Action::Approve,
        "Catchment study is convincing",
    )?;
    print_state("Regional manager approves", &state);

    let director = runtime.node(&request_id, 1)?;
    let state = runtime.engine.process_action(
        &request_id,
        &director,
        &ActorId::new("ed.roussel"),
        Action::Approve,
        "Go for November opening",
    )?;
    print_state("Expansion director approves", &state);
    println!();

    runtime.finish(&request_id)
}
