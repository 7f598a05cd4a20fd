//! Scenario 3: Store Lease Contract
//!
//! A lease goes to legal review, then the landlord pulls out. A colleague
//! tries to withdraw on the applicant's behalf and is refused; the applicant
//! withdraws, and legal's late approval is refused because the request is
//! cancelled.

use countersign_contracts::{
    error::ApprovalResult,
    ids::ActorId,
    node::Action,
    request::{NewRequest, Priority, RequestType},
};

use crate::{
    mock_data,
    runtime::{print_refusal, print_state, RetailRuntime, ScenarioOutcome},
};

pub fn run_scenario() -> ApprovalResult<ScenarioOutcome> {
    println!("=== Scenario 3: Store Lease Contract (withdrawal) ===");
    println!();
    run(&RetailRuntime::new()?)
}

pub fn run(runtime: &RetailRuntime) -> ApprovalResult<ScenarioOutcome> {
    let applicant = ActorId::new("re.garnier");
    let request_id = runtime.engine.submit_new(NewRequest {
        template_id: "lease-contract".to_string(),
        title: "9-year lease for ST-0412".to_string(),
        request_type: RequestType::Contract,
        business_id: "lease-0412".to_string(),
        applicant: applicant.clone(),
        form_data: mock_data::lease_contract_form(),
        priority: Priority::High,
        deadline_date: None,
    })?;
    println!("  Submitted {request_id} by {applicant}");

    if let Err(error) = runtime
        .engine
        .withdraw(&request_id, &ActorId::new("rm.girard"), "landlord withdrew")
    {
        print_refusal("rm.girard withdraws", &error);
    }

    runtime
        .engine
        .withdraw(&request_id, &applicant, "Landlord accepted a competing offer")?;
    println!("  {:<32} done", format!("{applicant} withdraws"));

    let legal = runtime.node(&request_id, 0)?;
    match runtime.engine.process_action(
        &request_id,
        &legal,
        &ActorId::new("lg.fontaine"),
        Action::Approve,
        "Clauses reviewed",
    ) {
        Err(error) => print_refusal("Legal approves", &error),
        Ok(state) => print_state("UNEXPECTED approval", &state),
    }
    println!();

    runtime.finish(&request_id)
}
