//! Built-in tool catalog
//!
//! Search and weather return representative payloads; the memory tools
//! operate on the shared fact store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Value, json};

use crate::memory::{MemoryCategory, MemoryStore};
use crate::tools::{ListMemoriesArgs, SaveMemoryArgs, SearchArgs, ToolCall, ToolDeclaration, ToolDispatcher, WeatherArgs};
use crate::{Error, Result};

/// Most facts returned by a single `memory_list` call
const MEMORY_LIST_LIMIT: usize = 5;

/// Built-in tools backed by the local memory store
pub struct Toolbox {
    memory: Arc<Mutex<MemoryStore>>,
}

impl Toolbox {
    /// Create a toolbox over the shared memory store
    #[must_use]
    pub const fn new(memory: Arc<Mutex<MemoryStore>>) -> Self {
        Self { memory }
    }

    /// Declarations for every built-in tool
    #[must_use]
    pub fn declarations() -> Vec<ToolDeclaration> {
        vec![
            ToolDeclaration {
                name: "web_search".to_string(),
                description:
                    "Perform a web search to find up-to-date information, news, or complex facts."
                        .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query string"
                        }
                    },
                    "required": ["query"]
                }),
            },
            ToolDeclaration {
                name: "get_weather".to_string(),
                description: "Get the current weather for a specific location.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "location": {
                            "type": "string",
                            "description": "The city and state/country"
                        }
                    },
                    "required": ["location"]
                }),
            },
            ToolDeclaration {
                name: "memory_save".to_string(),
                description:
                    "Save a fact or preference about the user to the long-term memory bank."
                        .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "content": {
                            "type": "string",
                            "description": "The fact or preference to remember"
                        },
                        "category": {
                            "type": "string",
                            "enum": ["personal", "preference", "task", "general"],
                            "description": "Category of the fact (default: general)"
                        }
                    },
                    "required": ["content"]
                }),
            },
            ToolDeclaration {
                name: "memory_list".to_string(),
                description: "Recall stored facts from the memory bank.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "enum": ["personal", "preference", "task", "general"],
                            "description": "Filter by category (optional)"
                        }
                    }
                }),
            },
        ]
    }

    fn search(args: &SearchArgs) -> Value {
        json!({
            "summary": format!(
                "Analyzed the latest results for \"{}\". Several relevant developments were found.",
                args.query
            ),
            "sources": [
                { "title": "Global Intelligence Report", "url": "https://news.example.com/latest" },
                { "title": "Technical Documentation", "url": "https://docs.example.com/spec" }
            ]
        })
    }

    fn weather(args: &WeatherArgs) -> Value {
        const CONDITIONS: [&str; 4] = ["Clear skies", "Partly cloudy", "Light rain", "Overcast"];

        let mut rng = rand::thread_rng();
        let temp: i32 = rng.gen_range(15..30);
        let condition = CONDITIONS.choose(&mut rng).copied().unwrap_or("Clear skies");

        json!({
            "location": args.location,
            "temperature": format!("{temp}°C"),
            "condition": condition,
            "humidity": "45%",
            "wind": "12 km/h"
        })
    }

    fn memory_save(&self, args: SaveMemoryArgs) -> Result<Value> {
        let mut store = self
            .memory
            .lock()
            .map_err(|_| Error::Memory("memory store lock poisoned".to_string()))?;

        let fact = store.add(
            args.content,
            args.category.unwrap_or(MemoryCategory::General),
        )?;

        Ok(json!({
            "id": fact.id,
            "status": "stored",
            "content": fact.content
        }))
    }

    fn memory_list(&self, args: &ListMemoriesArgs) -> Result<Value> {
        let store = self
            .memory
            .lock()
            .map_err(|_| Error::Memory("memory store lock poisoned".to_string()))?;

        let facts = store.list(args.category);
        let items: Vec<&str> = facts
            .iter()
            .take(MEMORY_LIST_LIMIT)
            .map(|fact| fact.content.as_str())
            .collect();

        Ok(json!({
            "count": facts.len(),
            "items": items
        }))
    }
}

#[async_trait]
impl ToolDispatcher for Toolbox {
    async fn execute(&self, call: ToolCall) -> Result<Value> {
        tracing::debug!(tool = call.name(), "executing tool");

        match call {
            ToolCall::WebSearch(args) => Ok(Self::search(&args)),
            ToolCall::GetWeather(args) => Ok(Self::weather(&args)),
            ToolCall::MemorySave(args) => self.memory_save(args),
            ToolCall::MemoryList(args) => self.memory_list(&args),
        }
    }
}
