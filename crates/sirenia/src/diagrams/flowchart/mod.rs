mod describe;
mod extract;
mod linearize;

pub use describe::{flowchart_detailed, flowchart_short, flowchart_short_html};
pub use extract::parse_flowchart;
