//! COUNTERSIGN Retail Reference Runtime: Demo CLI
//!
//! Runs one or all of the five store-lifecycle approval scenarios. Each
//! scenario wires the real engine, template catalog, form validator, and
//! hash-chained history log together over mock retail data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- store-plan
//!   cargo run -p demo -- expense-claim
//!   cargo run -p demo -- lease-contract
//!   cargo run -p demo -- candidate-location
//!   cargo run -p demo -- fit-out-purchase

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use countersign_contracts::error::ApprovalResult;
use countersign_ref_retail::{
    runtime::ScenarioOutcome,
    scenarios::{candidate_location, expense_claim, fit_out_purchase, lease_contract, store_plan},
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// COUNTERSIGN retail approval workflow demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "COUNTERSIGN retail reference runtime demo",
    long_about = "Runs COUNTERSIGN store-lifecycle scenarios showing sequential and parallel\n\
                  approval nodes, form validation, withdrawal, deadline escalation,\n\
                  and audit chain integrity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all five retail scenarios in sequence.
    RunAll,
    /// Scenario 1: Store Plan (two sequential approvals).
    StorePlan,
    /// Scenario 2: Expense Claim (form validation, all-policy veto).
    ExpenseClaim,
    /// Scenario 3: Lease Contract (applicant withdrawal).
    LeaseContract,
    /// Scenario 4: Candidate Location (deadline escalation, majority committee).
    CandidateLocation,
    /// Scenario 5: Fit-out Purchase (parallel nodes, transfer, add-sign).
    FitOutPurchase,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // RUST_LOG=debug shows node evaluation and scheduler activity.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::StorePlan => store_plan::run_scenario().map(|o| vec![o]),
        Command::ExpenseClaim => expense_claim::run_scenario().map(|o| vec![o]),
        Command::LeaseContract => lease_contract::run_scenario().map(|o| vec![o]),
        Command::CandidateLocation => candidate_location::run_scenario().map(|o| vec![o]),
        Command::FitOutPurchase => fit_out_purchase::run_scenario().map(|o| vec![o]),
    };

    match result {
        Ok(outcomes) => {
            print_summary(&outcomes);
            if outcomes.iter().all(|o| o.chain_verified) {
                println!("All selected scenarios completed successfully.");
            } else {
                eprintln!("Demo error: an audit chain failed verification");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> ApprovalResult<Vec<ScenarioOutcome>> {
    let outcomes = vec![
        store_plan::run_scenario()?,
        expense_claim::run_scenario()?,
        lease_contract::run_scenario()?,
        candidate_location::run_scenario()?,
        fit_out_purchase::run_scenario()?,
    ];
    info!(count = outcomes.len(), "scenarios finished");
    Ok(outcomes)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("COUNTERSIGN Approval Workflow Engine");
    println!("Retail Reference Demo");
    println!("====================================");
    println!();
    println!("Per request:");
    println!("  [1] Form data checked against the template's schema and rules");
    println!("  [2] Template resolved into frozen nodes and approvers");
    println!("  [3] Actions evaluated per node policy: any / all / majority");
    println!("  [4] Sequence groups advance once every node in the group approves");
    println!("  [5] Every accepted action appended to a SHA-256 hash chain");
    println!();
}

fn print_summary(outcomes: &[ScenarioOutcome]) {
    println!("Summary");
    println!("-------");
    for outcome in outcomes {
        println!(
            "  {}  {:<10} {:>2} history entries  {} escalation(s)  chain {}",
            outcome.request_id,
            format!("{:?}", outcome.status),
            outcome.history_len,
            outcome.escalations,
            if outcome.chain_verified { "ok" } else { "BROKEN" }
        );
    }
    println!();
}
