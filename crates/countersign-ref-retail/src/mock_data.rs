//! Simulated store-lifecycle data for the COUNTERSIGN reference runtime.
//!
//! All data in this module is hardcoded and fictional. It stands in for the
//! store plan, site, contract, and procurement records the engine only ever
//! sees as opaque `form_data`.

use serde_json::{json, Value};

// ── Store plans ──────────────────────────────────────────────────────────────

/// Form data for a new store plan.
pub fn store_plan_form(store_code: &str) -> Value {
    json!({
        "store_code": store_code,
        "city": "Lyon",
        "district": "Part-Dieu",
        "format": "city",
        "sales_area_m2": 640,
        "capex": 1_180_000,
        "opening_target": "2026-11-15",
        "catchment": {
            "population_10min": 48_200,
            "competitors_within_1km": 3
        }
    })
}

// ── Expenses ─────────────────────────────────────────────────────────────────

/// Form data for a store expense claim.
pub fn expense_form(amount: f64, receipts: &[&str]) -> Value {
    json!({
        "store_code": "ST-0187",
        "category": "maintenance",
        "description": "Emergency repair of refrigerated display cases",
        "amount": amount,
        "currency": "EUR",
        "receipts": receipts
    })
}

/// Custom form rule `receipts-attached`: claims carry at least one receipt.
pub fn receipts_attached(form: &Value) -> Option<String> {
    let count = form
        .get("receipts")
        .and_then(Value::as_array)
        .map_or(0, |receipts| receipts.len());
    (count == 0).then(|| "at least one receipt must be attached".to_string())
}

// ── Contracts ────────────────────────────────────────────────────────────────

pub fn lease_contract_form() -> Value {
    json!({
        "store_code": "ST-0412",
        "landlord": "SCI Rhone Commerce",
        "term_years": 9,
        "break_option_years": 3,
        "annual_rent": 96_000,
        "currency": "EUR",
        "indexation": "ILC"
    })
}

// ── Candidate locations ──────────────────────────────────────────────────────

/// A candidate site, naming the scout who surveyed it.
pub fn candidate_location_form() -> Value {
    json!({
        "site_id": "CL-2291",
        "address": "14 rue de la Republique, Grenoble",
        "scout": { "id": "sc.lefebvre", "name": "Theo Lefebvre" },
        "footfall_weekday": 5_400,
        "footfall_saturday": 8_900,
        "rent_per_m2": 310,
        "surface_m2": 520
    })
}

// ── Fit-out purchases ────────────────────────────────────────────────────────

pub fn fit_out_purchase_form() -> Value {
    json!({
        "store_code": "ST-0412",
        "supplier": "Agencement Alpes SARL",
        "lines": [
            { "item": "checkout counters", "qty": 4, "unit_price": 3_800 },
            { "item": "shelving bays", "qty": 62, "unit_price": 410 },
            { "item": "LED lighting kit", "qty": 1, "unit_price": 14_500 }
        ],
        "total": 55_120,
        "currency": "EUR"
    })
}
