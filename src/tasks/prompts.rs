// src/tasks/prompts.rs
// Prompt construction for sentiment analysis

use std::fmt;

const INSTRUCTION: &str = "Classify the sentiment. Respond ONLY with JSON: \
{\"sentiment\": \"<positive|neutral|negative>\", \"confidence\": 0..1}";

const FEW_SHOTS: &[(&str, &str, f32)] = &[
    (
        "I absolutely love this product! Exceeded expectations.",
        "positive",
        0.95,
    ),
    ("Terrible service, complete waste of money.", "negative", 0.92),
    ("The weather is cloudy today.", "neutral", 0.80),
];

/// In-context-learning mode for the sentiment prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IclMode {
    #[default]
    ZeroShot,
    FewShot,
}

impl IclMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zero-shot" => Some(Self::ZeroShot),
            "few-shot" => Some(Self::FewShot),
            _ => None,
        }
    }
}

impl fmt::Display for IclMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroShot => f.write_str("zero-shot"),
            Self::FewShot => f.write_str("few-shot"),
        }
    }
}

/// Build the sentiment classification prompt for one piece of text.
pub fn build_sentiment_prompt(text: &str, icl: IclMode) -> String {
    let mut lines: Vec<String> = vec![INSTRUCTION.to_string()];
    if icl == IclMode::FewShot {
        lines.push("Examples:".to_string());
        for (example, sentiment, confidence) in FEW_SHOTS {
            lines.push(format!(
                "input: \"{example}\"\noutput: {{\"sentiment\": \"{sentiment}\", \"confidence\": {confidence}}}"
            ));
        }
    }
    lines.push("-------YOUR TURN-------".to_string());
    lines.push(format!("Input: \"{text}\""));
    lines.join("\n")
}
