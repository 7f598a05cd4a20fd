//! Scenario 4: Candidate Location Sign-off
//!
//! The site scout named on the form must confirm the survey within 24 hours.
//! The clock is moved past the deadline and the escalation fires once, to
//! the expansion lead. After the scout confirms, processing deadlines again
//! fires nothing; the expansion committee then approves by majority.

use chrono::Duration;

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
    println!("=== Scenario 4: Candidate Location (deadline escalation) ===");
    println!();
    run(&RetailRuntime::new()?)
}

pub fn run(runtime: &RetailRuntime) -> ApprovalResult<ScenarioOutcome> {
    let request_id = runtime.engine.submit_new(NewRequest {
        template_id: "candidate-location".to_string(),
        title: "Candidate site CL-2291 Grenoble".to_string(),
        request_type: RequestType::Other,
        business_id: "site-2291".to_string(),
        applicant: ActorId::new("dev.caron"),
        form_data: mock_data::candidate_location_form(),
        priority: Priority::Urgent,
        deadline_date: None,
    })?;
    println!("  Submitted {request_id} by dev.caron");

    let scout_node = runtime.node(&request_id, 0)?;
    let fired = runtime.engine.run_escalations()?;
    println!("  {:<32} {fired} escalation(s)", "Deadlines processed at submit");

    runtime.clock.advance(Duration::hours(30));
    println!("  [30 hours pass without a decision]");
    let fired = runtime.engine.run_escalations()?;
    println!("  {:<32} {fired} escalation(s)", "Deadlines processed");

    let state = runtime.engine.process_action(
        &request_id,
        &scout_node,
        &ActorId::new("sc.lefebvre"),
        Action::Approve,
        "Survey confirmed on site",
    )?;
    print_state("Scout sc.lefebvre confirms", &state);

    runtime.clock.advance(Duration::hours(48));
    let fired = runtime.engine.run_escalations()?;
    println!("  {:<32} {fired} escalation(s)", "Deadlines processed again");

    let committee = runtime.node(&request_id, 1)?;
    for (member, comment) in [("ec.blanc", "Strong footfall"), ("ec.mercier", "Rent is acceptable")] {
        let state = runtime.engine.process_action(
            &request_id,
            &committee,
            &ActorId::new(member),
            Action::Approve,
            comment,
        )?;
        print_state(&format!("Committee {member} approves"), &state);
    }
    println!();

    runtime.finish(&request_id)
}
