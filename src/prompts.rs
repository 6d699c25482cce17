//! Prompts for LLM-based bank statement extraction.
//!
//! The wording here is a contract with the model: the parser in
//! [`crate::pipeline::parse`] expects exactly the header line requested
//! below. Change the two together or not at all.

use crate::table::STATEMENT_COLUMNS;

/// Instructions placed before the statement text.
///
/// The placeholder `{header}` is replaced with the comma-joined
/// [`STATEMENT_COLUMNS`].
pub const STATEMENT_EXTRACTION_PROMPT: &str = r#"You are an expert financial data analyst specializing in bank statements. Your task is to extract transaction data from the following text and format it as comma-separated values (CSV).

The CSV must have these exact columns: "Date", "Transaction ID", "Sender/Receiver Name", "Debit", "Credit".

- "Date": The transaction date. Standardize it to YYYY-MM-DD format if possible.
- "Transaction ID": The unique reference code for the transaction.
- "Sender/Receiver Name": The name of the other party (sender or receiver).
- "Debit": The outgoing amount.
- "Credit": The incoming amount.

The first line of your output must be the headers: "{header}".
Analyze the text carefully. If a value for a column is not present in a transaction, leave it blank.
If a value contains a comma, wrap it in double quotes.
Output ONLY the CSV. Do NOT wrap it in ``` fences and do NOT add commentary.

Here is the text from the bank statement:
"#;

/// Header line the model is asked to emit first.
pub fn statement_header_line() -> String {
    STATEMENT_COLUMNS.join(",")
}

/// Build the full extraction prompt for the raw statement text.
///
/// Deterministic: the same text always yields the same prompt.
pub fn build_extraction_prompt(raw_text: &str) -> String {
    let instructions = STATEMENT_EXTRACTION_PROMPT.replace("{header}", &statement_header_line());
    let mut prompt = String::with_capacity(instructions.len() + raw_text.len());
    prompt.push_str(&instructions);
    prompt.push_str(raw_text);
    prompt
}
