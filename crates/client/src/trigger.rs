//! Trigger payloads and local input validation.

use std::str::FromStr;

use serde::Serialize;

use crate::error::ValidationError;

/// Processing strategy requested from the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    Parallel,
    Loop,
    Whole,
}

impl FromStr for ProcessType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "loop" => Ok(Self::Loop),
            "whole" => Ok(Self::Whole),
            other => Err(ValidationError::UnknownProcessType(other.to_string())),
        }
    }
}

/// JSON body accepted by the trigger endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TriggerPayload {
    /// Plain trigger with an optional message.
    Message {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Data-processing trigger over a list of items.
    #[serde(rename_all = "camelCase")]
    Process {
        process_type: ProcessType,
        items: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_concurrency: Option<u32>,
    },
}

impl TriggerPayload {
    /// Plain trigger payload.
    pub fn message(message: Option<String>) -> Self {
        Self::Message { message }
    }

    /// Build the data-processing variant from raw form input.
    ///
    /// The item list is split on commas and newlines, trimmed, with empty
    /// entries discarded; an input that trims to nothing is rejected here,
    /// before any network call. The concurrency hint is forwarded only when
    /// it parses as a positive integer, otherwise it is omitted entirely.
    pub fn process(
        process_type: ProcessType,
        raw_items: &str,
        raw_concurrency: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let items = parse_item_list(raw_items);
        if items.is_empty() {
            return Err(ValidationError::EmptyItemList);
        }

        Ok(Self::Process {
            process_type,
            items,
            max_concurrency: raw_concurrency.and_then(parse_max_concurrency),
        })
    }
}

/// Split raw input on commas and newlines, trimming and dropping empties.
pub fn parse_item_list(input: &str) -> Vec<String> {
    input
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a concurrency hint; anything but a positive integer is discarded.
pub fn parse_max_concurrency(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok().filter(|n| *n > 0)
}
