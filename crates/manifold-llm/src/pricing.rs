//! Static per-model token pricing
//!
//! Lookups use the exact lowercase model name. An unknown key yields
//! `None` ("unpriced"), which is distinct from a priced model whose
//! computed cost happens to be `0.0`.

use manifold_config::ProviderKind;

/// (model, USD per 1K input tokens, USD per 1K output tokens)
type PriceRow = (&'static str, f64, f64);

const OPENAI_PRICES: &[PriceRow] = &[
    ("gpt-4o", 0.005, 0.015),
    ("gpt-4o-mini", 0.000_15, 0.0006),
    ("gpt-4", 0.03, 0.06),
    ("gpt-4-32k", 0.06, 0.12),
    ("gpt-3.5-turbo", 0.0015, 0.002),
];

const CLAUDE_PRICES: &[PriceRow] = &[
    ("anthropic.claude-3-5-sonnet-20241022-v2:0", 0.003, 0.015),
    ("anthropic.claude-3-5-haiku-20241022-v1:0", 0.0008, 0.004),
    ("anthropic.claude-3-opus-20240229-v1:0", 0.015, 0.075),
    ("us.anthropic.claude-3-7-sonnet-20250219-v1:0", 0.003, 0.015),
];

const GEMINI_PRICES: &[PriceRow] = &[
    ("gemini-2.0-flash-exp", 0.000_075, 0.0003),
    ("gemini-1.5-pro", 0.001_25, 0.005),
    ("gemini-1.5-flash", 0.000_075, 0.0003),
    ("gemini-1.0-pro", 0.0005, 0.0015),
];

const QWEN_PRICES: &[PriceRow] = &[
    ("qwen-turbo", 0.002, 0.006),
    ("qwen-plus", 0.004, 0.012),
    ("qwen-max", 0.02, 0.06),
    ("qwen2-72b-instruct", 0.004, 0.012),
    ("qwen2-7b-instruct", 0.001, 0.003),
];

const DEEPSEEK_PRICES: &[PriceRow] = &[
    ("deepseek-chat", 0.000_14, 0.000_28),
    ("deepseek-coder", 0.000_14, 0.000_28),
    ("deepseek-r1", 0.000_55, 0.0022),
    ("deepseek-r1-distill-qwen-32b", 0.000_27, 0.0011),
    ("deepseek-r1-distill-llama-8b", 0.000_14, 0.000_28),
];

const fn table(kind: ProviderKind) -> &'static [PriceRow] {
    match kind {
        ProviderKind::Openai => OPENAI_PRICES,
        ProviderKind::Claude => CLAUDE_PRICES,
        ProviderKind::Gemini => GEMINI_PRICES,
        ProviderKind::Qwen => QWEN_PRICES,
        ProviderKind::Deepseek => DEEPSEEK_PRICES,
    }
}

fn lookup(kind: ProviderKind, model: &str) -> Option<&'static PriceRow> {
    let key = model.to_lowercase();
    table(kind).iter().find(|(name, _, _)| *name == key)
}

/// USD per 1K input tokens for an exact model key, if priced
pub fn input_price_per_1k(kind: ProviderKind, model: &str) -> Option<f64> {
    lookup(kind, model).map(|(_, input, _)| *input)
}

/// USD per 1K output tokens for an exact model key, if priced
pub fn output_price_per_1k(kind: ProviderKind, model: &str) -> Option<f64> {
    lookup(kind, model).map(|(_, _, output)| *output)
}

/// Cost of one completion, or `None` when the model is unpriced
pub fn completion_cost(kind: ProviderKind, model: &str, prompt_tokens: u32, completion_tokens: u32) -> Option<f64> {
    let input = input_price_per_1k(kind, model)?;
    let output = output_price_per_1k(kind, model)?;

    Some(f64::from(prompt_tokens) / 1000.0 * input + f64::from(completion_tokens) / 1000.0 * output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priced_model_computes_cost() {
        let cost = completion_cost(ProviderKind::Openai, "gpt-4o", 1000, 1000).unwrap();
        assert!((cost - 0.02).abs() < 1e-9);
    }

    #[test]
    fn lookup_is_case_insensitive_on_input() {
        assert!(input_price_per_1k(ProviderKind::Openai, "GPT-4o").is_some());
    }

    #[test]
    fn unpriced_model_is_none_not_zero() {
        assert_eq!(completion_cost(ProviderKind::Openai, "gpt-unknown", 1000, 1000), None);
        // A priced model with zero tokens costs Some(0.0) — distinguishable
        // from the unpriced case above.
        assert_eq!(completion_cost(ProviderKind::Openai, "gpt-4o", 0, 0), Some(0.0));
    }

    #[test]
    fn tables_keyed_per_kind() {
        assert!(input_price_per_1k(ProviderKind::Qwen, "qwen-turbo").is_some());
        assert_eq!(input_price_per_1k(ProviderKind::Openai, "qwen-turbo"), None);
    }
}
