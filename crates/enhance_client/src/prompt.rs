//! Instruction presets and the rule that turns an instruction plus input text
//! into the single prompt sent to the model.

use std::fmt;
use std::str::FromStr;

/// Label of the dropdown entry that switches to a free-form instruction.
pub const CUSTOM_LABEL: &str = "Write your own prompt";

/// Built-in instructions, in dropdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Summarize,
    Explain,
    Enhance,
    Proofread,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Summarize,
        Preset::Explain,
        Preset::Enhance,
        Preset::Proofread,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Preset::Summarize => "Summarize",
            Preset::Explain => "Explain",
            Preset::Enhance => "Enhance",
            Preset::Proofread => "Proofread",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.label() == s)
            .ok_or_else(|| format!("unknown preset: {s}"))
    }
}

/// What the user asked the model to do with the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Preset(Preset),
    /// Free-form instruction typed by the user, already trimmed.
    Custom(String),
}

impl Instruction {
    /// Free-form instruction. Surrounding whitespace is dropped.
    pub fn custom(text: &str) -> Self {
        Instruction::Custom(text.trim().to_string())
    }

    /// A preset when `label` names one exactly, otherwise a custom instruction.
    pub fn from_label(label: &str) -> Self {
        match label.trim().parse::<Preset>() {
            Ok(preset) => Instruction::Preset(preset),
            Err(_) => Instruction::custom(label),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Instruction::Preset(p) => p.label(),
            Instruction::Custom(s) => s,
        }
    }

    // Presets, dropdown labels and an empty custom entry only make sense with
    // input text; any other custom instruction can stand on its own.
    fn requires_text(&self) -> bool {
        let label = self.as_str();
        label.is_empty()
            || label == CUSTOM_LABEL
            || Preset::ALL.iter().any(|p| p.label() == label)
    }
}

/// Rejected send: there is nothing to ask the model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Please enter a prompt or some text before sending.")]
    NothingToSend,
}

impl PromptError {
    /// Heading shown above the message.
    pub fn title(&self) -> &'static str {
        "Nothing to send"
    }
}

/// Build the prompt for `instruction` applied to `text`.
///
/// `text` is trimmed first. A custom instruction with no text is sent on its
/// own; otherwise the instruction is followed by the text.
pub fn compose(instruction: &Instruction, text: &str) -> Result<String, PromptError> {
    let text = text.trim();
    let requires_text = instruction.requires_text();

    if text.is_empty() {
        return if requires_text {
            Err(PromptError::NothingToSend)
        } else {
            Ok(instruction.as_str().to_string())
        };
    }

    let prompt = format!("{} the following text:\n\n{}", instruction.as_str(), text);
    Ok(prompt.trim().to_string())
}
