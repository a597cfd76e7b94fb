mod buffering;
mod sse_parser;

pub use buffering::CircularLineBuffer;
pub use sse_parser::{decode_sse_stream, parse_sse_text, sse_events, SseDecoder, SseEvent, SseEventStream};
