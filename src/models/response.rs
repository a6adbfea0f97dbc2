use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A participant's answer to one presented video or attention probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Regret,
    NoRegret,
    NoRemember,
    Skip,
}

impl Response {
    pub const ALL: [Response; 4] = [
        Response::Regret,
        Response::NoRegret,
        Response::NoRemember,
        Response::Skip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Regret => "regret",
            Response::NoRegret => "noRegret",
            Response::NoRemember => "noRemember",
            Response::Skip => "skip",
        }
    }

    /// Whether this response counts toward the rated-video total.
    pub fn counts_as_rating(&self) -> bool {
        !matches!(self, Response::Skip)
    }
}

impl FromStr for Response {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Response::ALL
            .into_iter()
            .find(|r| r.as_str() == value)
            .ok_or_else(|| anyhow!("unknown response '{value}'"))
    }
}

/// Which attention-check stimulus is being shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttentionSide {
    Left,
    Right,
}

impl AttentionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionSide::Left => "LEFT",
            AttentionSide::Right => "RIGHT",
        }
    }
}

impl FromStr for AttentionSide {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "LEFT" => Ok(AttentionSide::Left),
            "RIGHT" => Ok(AttentionSide::Right),
            other => Err(anyhow!("unknown attention side '{other}'")),
        }
    }
}
