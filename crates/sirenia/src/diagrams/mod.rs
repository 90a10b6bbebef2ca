pub mod flowchart;
pub mod journey;
pub mod sequence;
pub mod timeline;
