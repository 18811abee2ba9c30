//! Wire types on both sides of the bridge.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`claude`] | Claude Messages requests as sent by clients |
//! | [`openai`] | OpenAI-style chat requests and stream chunks sent/received upstream |
//! | [`events`] | Parser events consumed by the encoder and the Claude stream events it emits |

pub mod claude;
pub mod events;
pub mod openai;

pub use claude::{
    ClaudeContent, ClaudeContentBlock, ClaudeMessage, ClaudeRequest, ClaudeRole,
    ClaudeToolDefinition, SystemPrompt, ToolInputSchema,
};
pub use events::{ClaudeStreamEvent, ParsedInvokeCall, ParserEvent};
pub use openai::{OpenAIChatMessage, OpenAIChatRequest, OpenAIStreamChunk};
