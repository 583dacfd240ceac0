//! Benchmark Registry
//!
//! Cases are collected into parameter groups. Every case in a group is run
//! against every parameter tuple the group yields, and at most one case per
//! group is its baseline.
//!
//! ```ignore
//! let mut registry = Registry::new();
//! registry.register(
//!     ParameterGroup::from_values("sort", vec![100usize, 10_000])
//!         .baseline("std", |n: &usize| sort_std(*n))
//!         .case("radix", |n: &usize| sort_radix(*n)),
//! );
//! let plan = registry.plan(None)?;
//! ```
//!
//! Groups are type-erased behind [`ExecutionPlan`] so the harness can run
//! groups with different parameter types in one pass.

use crate::error::{ConfigurationError, PipelineError, panic_message};
use crate::pipeline::{Pipeline, PipelineId, PipelineRunner};
use crate::sink::BlackHole;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Debug;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

// ─── Routines ───────────────────────────────────────────────────────────────

/// A measured unit of work. Whatever it returns is routed into the sink.
pub struct Routine<P> {
    call: Box<dyn Fn(&P, &BlackHole)>,
}

impl<P> Routine<P> {
    /// Wrap a closure; its return value is consumed by the sink.
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&P) -> R + 'static,
    {
        Self {
            call: Box::new(move |params, sink| sink.consume(f(params))),
        }
    }

    /// One invocation
    #[inline(always)]
    pub fn invoke(&self, params: &P, sink: &BlackHole) {
        (self.call)(params, sink)
    }
}

impl<P> Debug for Routine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Routine")
    }
}

type Hook = Box<dyn Fn()>;

/// A named benchmark case
pub struct BenchmarkCase<P> {
    name: String,
    description: Option<String>,
    routine: Routine<P>,
    is_baseline: bool,
    setup: Option<Hook>,
    teardown: Option<Hook>,
}

impl<P: 'static> BenchmarkCase<P> {
    /// Case from a synchronous closure
    pub fn new<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&P) -> R + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            routine: Routine::new(f),
            is_baseline: false,
            setup: None,
            teardown: None,
        }
    }

    /// Case from an async closure.
    ///
    /// Each invocation is driven to completion on a dedicated current-thread
    /// tokio runtime owned by the case, so the measured time includes the
    /// whole future.
    pub fn new_async<F, Fut>(name: impl Into<String>, f: F) -> std::io::Result<Self>
    where
        F: Fn(&P) -> Fut + 'static,
        Fut: Future,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self::new(name, move |params: &P| runtime.block_on(f(params))))
    }
}

impl<P> BenchmarkCase<P> {
    /// Attach a description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark as the group's baseline
    pub fn as_baseline(mut self) -> Self {
        self.is_baseline = true;
        self
    }

    /// Run once per group before this case's first measured pipeline
    pub fn setup(mut self, f: impl Fn() + 'static) -> Self {
        self.setup = Some(Box::new(f));
        self
    }

    /// Run once per group after this case's last measured pipeline
    pub fn teardown(mut self, f: impl Fn() + 'static) -> Self {
        self.teardown = Some(Box::new(f));
        self
    }

    /// Case name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the group's baseline
    pub fn is_baseline(&self) -> bool {
        self.is_baseline
    }

    /// The measured routine
    pub fn routine(&self) -> &Routine<P> {
        &self.routine
    }
}

// ─── Parameter groups ───────────────────────────────────────────────────────

/// Restartable producer of parameter tuples.
///
/// Implemented for every `Fn() -> impl IntoIterator` closure.
pub trait ParameterSource<P> {
    /// Produce the tuples from the start
    fn values(&self) -> Box<dyn Iterator<Item = P> + '_>;
}

impl<P, F, I> ParameterSource<P> for F
where
    F: Fn() -> I,
    I: IntoIterator<Item = P>,
    I::IntoIter: 'static,
{
    fn values(&self) -> Box<dyn Iterator<Item = P> + '_> {
        Box::new(self().into_iter())
    }
}

/// Named set of cases sharing one parameter source
pub struct ParameterGroup<P> {
    name: String,
    source: Box<dyn ParameterSource<P>>,
    describe: Box<dyn Fn(&P) -> String>,
    cases: Vec<BenchmarkCase<P>>,
}

impl<P: Debug + 'static> ParameterGroup<P> {
    /// Group drawing tuples from `source`, described with `Debug`
    pub fn new(name: impl Into<String>, source: impl ParameterSource<P> + 'static) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
            describe: Box::new(|params| format!("{params:?}")),
            cases: Vec::new(),
        }
    }

    /// Group over a fixed list of tuples
    pub fn from_values(name: impl Into<String>, values: Vec<P>) -> Self
    where
        P: Clone,
    {
        Self::new(name, move || values.clone())
    }
}

impl ParameterGroup<()> {
    /// Group with a single empty parameter tuple
    pub fn unit(name: impl Into<String>) -> Self {
        Self::new(name, || std::iter::once(())).describe_with(|_| String::new())
    }
}

impl<P: 'static> ParameterGroup<P> {
    /// Override how tuples are rendered in pipeline ids and reports
    pub fn describe_with(mut self, describe: impl Fn(&P) -> String + 'static) -> Self {
        self.describe = Box::new(describe);
        self
    }

    /// Add a case from a closure
    pub fn case<F, R>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&P) -> R + 'static,
    {
        self.with_case(BenchmarkCase::new(name, f))
    }

    /// Add the baseline case from a closure
    pub fn baseline<F, R>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&P) -> R + 'static,
    {
        self.with_case(BenchmarkCase::new(name, f).as_baseline())
    }

    /// Add a fully built case
    pub fn with_case(mut self, case: BenchmarkCase<P>) -> Self {
        self.cases.push(case);
        self
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered cases
    pub fn cases(&self) -> &[BenchmarkCase<P>] {
        &self.cases
    }

    fn validate_cases(&self) -> Result<(), ConfigurationError> {
        if self.cases.is_empty() {
            return Err(ConfigurationError::EmptyGroup(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.name.trim().is_empty() {
                return Err(ConfigurationError::MalformedCase {
                    group: self.name.clone(),
                    reason: "case name is empty".to_string(),
                });
            }
            if case.name.contains('/') {
                return Err(ConfigurationError::MalformedCase {
                    group: self.name.clone(),
                    reason: format!("case name '{}' contains '/'", case.name),
                });
            }
            if !seen.insert(case.name.as_str()) {
                return Err(ConfigurationError::DuplicateCase {
                    group: self.name.clone(),
                    case: case.name.clone(),
                });
            }
        }

        let baselines: Vec<String> = self
            .cases
            .iter()
            .filter(|c| c.is_baseline)
            .map(|c| c.name.clone())
            .collect();
        if baselines.len() > 1 {
            return Err(ConfigurationError::DuplicateBaseline {
                group: self.name.clone(),
                cases: baselines,
            });
        }

        Ok(())
    }
}

// ─── Type erasure ───────────────────────────────────────────────────────────

trait GroupPlanner {
    fn name(&self) -> &str;
    fn case_count(&self) -> usize;
    fn plan<'r>(
        &'r self,
        filter: Option<&Regex>,
    ) -> Result<Option<Box<dyn PlannedGroup + 'r>>, ConfigurationError>;
}

impl<P: 'static> GroupPlanner for ParameterGroup<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn case_count(&self) -> usize {
        self.cases.len()
    }

    fn plan<'r>(
        &'r self,
        filter: Option<&Regex>,
    ) -> Result<Option<Box<dyn PlannedGroup + 'r>>, ConfigurationError> {
        self.validate_cases()?;

        let params: Vec<P> = self.source.values().collect();
        if params.is_empty() {
            return Err(ConfigurationError::EmptyParameterGroup(self.name.clone()));
        }

        let selected: Vec<&BenchmarkCase<P>> = self
            .cases
            .iter()
            .filter(|case| {
                filter.is_none_or(|re| re.is_match(&format!("{}/{}", self.name, case.name)))
            })
            .collect();
        if selected.is_empty() {
            tracing::debug!(group = %self.name, "no cases match filter; skipping group");
            return Ok(None);
        }

        let descriptions = params.iter().map(|p| (self.describe)(p)).collect();
        Ok(Some(Box::new(Planned {
            group: self,
            params,
            descriptions,
            selected,
        })))
    }
}

/// A validated group with its parameter tuples materialized
pub trait PlannedGroup {
    /// Group name
    fn name(&self) -> &str;

    /// Cases selected for execution × parameter tuples
    fn pipeline_count(&self) -> usize;

    /// Names of the selected cases, in registration order
    fn case_names(&self) -> Vec<&str>;

    /// Run every selected case over every tuple, sequentially.
    ///
    /// Setup and teardown hooks run once per case around its pipelines.
    fn execute(&self, runner: &PipelineRunner) -> Vec<Pipeline>;
}

struct Planned<'r, P> {
    group: &'r ParameterGroup<P>,
    params: Vec<P>,
    descriptions: Vec<String>,
    selected: Vec<&'r BenchmarkCase<P>>,
}

impl<P> Planned<'_, P> {
    fn pipelines_for(&self, case: &BenchmarkCase<P>) -> Vec<Pipeline> {
        self.descriptions
            .iter()
            .enumerate()
            .map(|(tuple_index, parameters)| {
                let id = PipelineId {
                    group: self.group.name.clone(),
                    case: case.name.clone(),
                    parameters: parameters.clone(),
                    tuple_index,
                };
                Pipeline::new(id, case.description.clone(), case.is_baseline)
            })
            .collect()
    }
}

fn run_hook(hook: &Hook) -> Result<(), String> {
    catch_unwind(AssertUnwindSafe(hook)).map_err(|payload| panic_message(payload.as_ref()))
}

impl<P> PlannedGroup for Planned<'_, P> {
    fn name(&self) -> &str {
        &self.group.name
    }

    fn pipeline_count(&self) -> usize {
        self.selected.len() * self.params.len()
    }

    fn case_names(&self) -> Vec<&str> {
        self.selected.iter().map(|c| c.name.as_str()).collect()
    }

    fn execute(&self, runner: &PipelineRunner) -> Vec<Pipeline> {
        let mut pipelines = Vec::with_capacity(self.pipeline_count());

        for case in &self.selected {
            let mut case_pipelines = self.pipelines_for(case);

            if let Some(setup) = &case.setup {
                if let Err(msg) = run_hook(setup) {
                    for pipeline in &mut case_pipelines {
                        pipeline.fail(PipelineError::Panicked(format!("setup panicked: {msg}")));
                    }
                    pipelines.extend(case_pipelines);
                    continue;
                }
            }

            for (pipeline, params) in case_pipelines.iter_mut().zip(&self.params) {
                tracing::info!(pipeline = %pipeline.id(), "running");
                runner.run(pipeline, &case.routine, params);
            }

            if let Some(teardown) = &case.teardown {
                if let Err(msg) = run_hook(teardown) {
                    for pipeline in &mut case_pipelines {
                        pipeline.fail(PipelineError::Panicked(format!("teardown panicked: {msg}")));
                    }
                }
            }

            pipelines.extend(case_pipelines);
        }

        pipelines
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// All registered parameter groups, in registration order
#[derive(Default)]
pub struct Registry {
    groups: Vec<Box<dyn GroupPlanner>>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group
    pub fn register<P: 'static>(&mut self, group: ParameterGroup<P>) -> &mut Self {
        self.groups.push(Box::new(group));
        self
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether nothing was registered
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of cases across all groups
    pub fn case_count(&self) -> usize {
        self.groups.iter().map(|g| g.case_count()).sum()
    }

    /// Validate every group and materialize its parameter tuples.
    ///
    /// Validation covers all groups, including ones the filter excludes, so
    /// a malformed registry is rejected before anything is measured. Groups
    /// with no case matching `filter` are left out of the plan.
    pub fn plan(&self, filter: Option<&Regex>) -> Result<ExecutionPlan<'_>, ConfigurationError> {
        if self.groups.is_empty() {
            return Err(ConfigurationError::EmptyRegistry);
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name()) {
                return Err(ConfigurationError::DuplicateGroup(group.name().to_string()));
            }
        }

        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if let Some(planned) = group.plan(filter)? {
                groups.push(planned);
            }
        }

        Ok(ExecutionPlan { groups })
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.groups.iter().map(|g| g.name()))
            .finish()
    }
}

/// Validated groups ready to run
pub struct ExecutionPlan<'r> {
    groups: Vec<Box<dyn PlannedGroup + 'r>>,
}

impl<'r> ExecutionPlan<'r> {
    /// Planned groups, in registration order
    pub fn groups(&self) -> &[Box<dyn PlannedGroup + 'r>] {
        &self.groups
    }

    /// Total pipelines across all groups
    pub fn pipeline_count(&self) -> usize {
        self.groups.iter().map(|g| g.pipeline_count()).sum()
    }

    /// Whether the filter left nothing to run
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Run all groups one after another
    pub fn execute(&self, runner: &PipelineRunner) -> Vec<Pipeline> {
        let mut pipelines = Vec::with_capacity(self.pipeline_count());
        for group in &self.groups {
            tracing::debug!(
                group = group.name(),
                pipelines = group.pipeline_count(),
                "group start"
            );
            pipelines.extend(group.execute(runner));
        }
        pipelines
    }
}
