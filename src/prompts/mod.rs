//! System prompts
//!
//! This module provides the fixed instruction prepended to every conversation
//! sent to the model.

pub mod extraction_prompt;

use chrono::NaiveDate;

/// Builds the system prompt for one model call
///
/// # Examples
///
/// ```
/// use finbot::prompts::build_system_prompt;
/// use chrono::NaiveDate;
///
/// let prompt = build_system_prompt(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(), "S/");
/// assert!(prompt.contains("Alimentación"));
/// ```
pub fn build_system_prompt(today: NaiveDate, currency_symbol: &str) -> String {
    extraction_prompt::generate_extraction_prompt(today, currency_symbol)
}
