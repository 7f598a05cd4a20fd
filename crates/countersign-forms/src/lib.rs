//! # countersign-forms
//!
//! Form data validation for COUNTERSIGN submissions.
//!
//! [`validator::SchemaFormValidator`] implements
//! [`countersign_core::traits::FormValidator`]. It checks a request's
//! `form_data` in two passes:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Rules**: `RequiredField`, `AllowedValues`, `MaxNumber`, and named
//!    `Custom` functions evaluated against the payload.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use countersign_forms::validator::SchemaFormValidator;
//!
//! let mut forms = SchemaFormValidator::new();
//! forms.register_rule("opening-after-lease", Box::new(|form| {
//!     let lease = form.get("lease_start")?.as_str()?;
//!     let opening = form.get("opening_date")?.as_str()?;
//!     (opening < lease).then(|| "opening date precedes lease start".to_string())
//! }));
//! ```

pub mod validator;

pub use validator::{CustomRuleFn, SchemaFormValidator};
