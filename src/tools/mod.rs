//! Tool dispatch for live sessions
//!
//! The remote model issues named tool calls with JSON arguments; arguments
//! are validated into typed records at the router boundary before anything
//! executes.

mod builtin;

pub use builtin::Toolbox;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::MemoryCategory;
use crate::{Error, Result};

/// A tool advertised to the inference service at connect time
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Arguments for a web search
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchArgs {
    /// The search query string
    pub query: String,
}

/// Arguments for a weather lookup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WeatherArgs {
    /// City and state/country
    pub location: String,
}

/// Arguments for saving a memory fact
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveMemoryArgs {
    /// The fact or preference to remember
    pub content: String,
    /// Category of the fact (defaults to general)
    #[serde(default)]
    pub category: Option<MemoryCategory>,
}

/// Arguments for listing memory facts
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ListMemoriesArgs {
    /// Optional category filter
    #[serde(default)]
    pub category: Option<MemoryCategory>,
}

/// A validated tool call, keyed by tool name
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    WebSearch(SearchArgs),
    GetWeather(WeatherArgs),
    MemorySave(SaveMemoryArgs),
    MemoryList(ListMemoriesArgs),
}

impl ToolCall {
    /// Validate raw arguments against the named tool's schema
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` for an unknown tool name and
    /// `Error::Tool` when the arguments do not match the tool's schema
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        fn typed<T: serde::de::DeserializeOwned>(name: &str, args: &Value) -> Result<T> {
            serde_json::from_value(args.clone())
                .map_err(|e| Error::Tool(format!("{name}: invalid arguments: {e}")))
        }

        match name {
            "web_search" => Ok(Self::WebSearch(typed(name, args)?)),
            "get_weather" => Ok(Self::GetWeather(typed(name, args)?)),
            "memory_save" => Ok(Self::MemorySave(typed(name, args)?)),
            "memory_list" => Ok(Self::MemoryList(typed(name, args)?)),
            _ => Err(Error::Protocol(format!("unknown tool: {name}"))),
        }
    }

    /// The wire name of the tool being called
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WebSearch(_) => "web_search",
            Self::GetWeather(_) => "get_weather",
            Self::MemorySave(_) => "memory_save",
            Self::MemoryList(_) => "memory_list",
        }
    }
}

/// Executes validated tool calls
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Execute a call, returning a JSON-serializable result payload
    ///
    /// # Errors
    ///
    /// Returns error if execution fails; the router converts failures
    /// into structured error payloads rather than tearing down the session
    async fn execute(&self, call: ToolCall) -> Result<Value>;
}
