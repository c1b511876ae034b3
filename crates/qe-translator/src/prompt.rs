//! Prompt construction for SQL generation
use qe_core::IntentType;
use serde::{Deserialize, Serialize};

pub const SCHEMA_DESCRIPTION: &str = "Database Schema:
- sales: sale_id, user_id, product_id, sale_date, quantity, unit_price, total_amount, discount_amount, sales_channel, region
- users: user_id, username, registration_date, country, age, status
- products: product_id, product_name, category, price, cost, launch_date, brand

RULES:
- Use 'sales' table for transactions
- Use 'total_amount' for revenue
- Always use proper JOINs
- Limit results to 50 records max";

pub const SYSTEM_INSTRUCTIONS: &str = "You are an expert SQL generator for business intelligence. \
Generate a single, executable SQLite query that retrieves the requested data. \
Return ONLY the SQL query, no explanations.";

/// What the text-generation service receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_instructions: String,
    pub schema_description: String,
    pub task_description: String,
}

impl GenerationRequest {
    pub fn for_intent(
        intent_type: &IntentType,
        metric: &str,
        dimension: Option<&str>,
        raw_prompt: &str,
        enhanced_prompt: &str,
    ) -> Self {
        let task_description = format!(
            "Intent: {}\nMetric: {}\nDimension: {}\nUser Query: {}\nContext: {}\n\nGenerate the optimal SQL query.",
            intent_type,
            metric,
            dimension.unwrap_or("None"),
            raw_prompt,
            enhanced_prompt
        );

        Self {
            system_instructions: SYSTEM_INSTRUCTIONS.to_string(),
            schema_description: SCHEMA_DESCRIPTION.to_string(),
            task_description,
        }
    }

    /// System message: instructions followed by the schema preamble
    pub fn system_message(&self) -> String {
        format!("{}\n\n{}", self.system_instructions, self.schema_description)
    }
}
