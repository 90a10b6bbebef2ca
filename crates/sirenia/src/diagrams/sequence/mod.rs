mod blocks;
mod describe;
mod extract;

pub use describe::{sequence_detailed, sequence_short, sequence_short_html};
pub use extract::parse_sequence;
