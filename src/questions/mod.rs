//! Reflection prompts shown from the menu.

mod flow;

pub use flow::QuestionsFlow;

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Prompt {
    HowItWorks,
    BetterToday,
    LifeMeaning,
    Advice,
}

impl Prompt {
    /// Display order, top to bottom.
    pub const ALL: [Prompt; 4] = [
        Prompt::HowItWorks,
        Prompt::BetterToday,
        Prompt::LifeMeaning,
        Prompt::Advice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Prompt::HowItWorks => "how-it-works",
            Prompt::BetterToday => "better-today",
            Prompt::LifeMeaning => "life-meaning",
            Prompt::Advice => "advice",
        }
    }

    /// The question answered through this prompt's input, if any.
    pub fn question(self) -> Option<QuestionType> {
        match self {
            Prompt::BetterToday => Some(QuestionType::BetterToday),
            Prompt::LifeMeaning => Some(QuestionType::LifeMeaning),
            Prompt::HowItWorks | Prompt::Advice => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    BetterToday,
    LifeMeaning,
}

impl QuestionType {
    pub const ALL: [QuestionType; 2] = [QuestionType::BetterToday, QuestionType::LifeMeaning];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::BetterToday => "better_today",
            QuestionType::LifeMeaning => "life_meaning",
        }
    }

    pub fn prompt(self) -> Prompt {
        match self {
            QuestionType::BetterToday => Prompt::BetterToday,
            QuestionType::LifeMeaning => Prompt::LifeMeaning,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "better_today" => Ok(QuestionType::BetterToday),
            "life_meaning" => Ok(QuestionType::LifeMeaning),
            other => Err(anyhow!("unknown question type: {other}")),
        }
    }
}

pub const ADVICE_LINES: [&str; 4] = [
    "Do one small thing today that your future self will thank you for.",
    "Put the phone down for the first hour of the morning.",
    "Tell someone you appreciate them.",
    "Write down what went well, however small.",
];
