//! Prompt file helpers.

/// System instruction sent with every request unless overridden in config.
pub const SYSTEM_INSTRUCTION: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/system_instruction.md"
));
