//! SteadyBench Report - Result Model
//!
//! Plain serializable data describing one harness run. Rendering (tables,
//! JSON files, dashboards) is left to the caller; every type derives
//! `serde::Serialize` and `serde::Deserialize`.

mod report;

pub use report::{
    CaseMetrics, CaseResult, PipelineStatus, RatioMetrics, Report, ReportConfig, ReportMeta,
    ReportSummary, SCHEMA_VERSION, SystemInfo,
};
