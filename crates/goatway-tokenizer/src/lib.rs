pub mod count;
pub mod error;
pub mod registry;
pub mod types;

pub use count::{count_message, count_messages, count_request, count_tokens};
pub use error::TokenizerError;
pub use registry::{Encoding, EncodingRegistry};
pub use types::{ContentPart, ImageUrl, Message, MessageContent, ToolCall, ToolDefinition};
