#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
pub mod aggregate;
pub mod chart;
pub mod data;
pub mod pipeline;
pub mod report;
pub mod stats;
