pub mod query;
pub mod stack;
pub mod user_agent;

pub use query::{append_query, parse_query_string};
pub use stack::{first_frame_location, format_stack, StackLocation};
pub use user_agent::UserAgentInfo;
