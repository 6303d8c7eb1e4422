//! Bundled demo pipeline:
//!
//! ```text
//! process_data ──┬── analyze_results
//!                └── generate_reports
//! ```

use std::time::Duration;

use serde_json::{json, Value};
use taskflow_core::executor::TaskGraph;
use taskflow_core::{
    ParamSchema, ParamSpec, ParamType, TaskContext, TaskSpec, WorkflowBuilder, WorkflowError,
};

/// Knobs for the demo run.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Length of one simulated work unit
    pub unit: Duration,
    /// Task that should fail instead of completing
    pub fail: Option<String>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            unit: Duration::from_millis(100),
            fail: None,
        }
    }
}

pub fn build(opts: &DemoOptions) -> Result<TaskGraph, WorkflowError> {
    let processing = ParamSchema::new()
        .param(
            "date",
            ParamSpec::required()
                .with_type(ParamType::String)
                .with_description("Processing date in YYYY-MM-DD format"),
        )
        .param(
            "region",
            ParamSpec::required()
                .with_type(ParamType::String)
                .with_description("Geographic region to process"),
        )
        .param(
            "batch_size",
            ParamSpec::optional()
                .with_default(1000)
                .with_type(ParamType::Integer)
                .with_description("Number of records to process at once"),
        );

    let analysis = ParamSchema::new()
        .param(
            "model_type",
            ParamSpec::required()
                .with_type(ParamType::String)
                .with_description("Type of analysis model to use"),
        )
        .param(
            "threshold",
            ParamSpec::optional()
                .with_default(0.5)
                .with_type(ParamType::Float)
                .with_description("Analysis threshold"),
        );

    let reporting = ParamSchema::new()
        .param(
            "report_format",
            ParamSpec::optional()
                .with_default("pdf")
                .with_type(ParamType::String)
                .with_description("Output format for reports"),
        )
        .param(
            "include_graphs",
            ParamSpec::optional()
                .with_default(true)
                .with_type(ParamType::Bool)
                .with_description("Whether to include graphs in reports"),
        );

    WorkflowBuilder::new()
        .task(step("process_data", 10, opts, process_data).params(processing))
        .task(
            step("analyze_results", 15, opts, analyze_results)
                .depends_on(["process_data"])
                .params(analysis),
        )
        .task(
            step("generate_reports", 12, opts, generate_reports)
                .depends_on(["process_data"])
                .params(reporting),
        )
        .build()
}

/// Wrap a result function into a task that simulates `units` of work.
fn step(
    name: &'static str,
    units: u32,
    opts: &DemoOptions,
    finish: fn(&TaskContext) -> Value,
) -> TaskSpec {
    let work = opts.unit * units;
    let fail = opts.fail.as_deref() == Some(name);

    TaskSpec::new(name, move |ctx: TaskContext| async move {
        tokio::select! {
            _ = tokio::time::sleep(work) => {}
            _ = ctx.cancelled() => anyhow::bail!("{name} cancelled"),
        }
        if fail {
            anyhow::bail!("{name} failed on request (--fail)");
        }
        Ok(finish(&ctx))
    })
}

fn text(ctx: &TaskContext, name: &str) -> String {
    match ctx.param(name) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn process_data(ctx: &TaskContext) -> Value {
    tracing::info!(
        date = %text(ctx, "date"),
        region = %text(ctx, "region"),
        batch_size = %text(ctx, "batch_size"),
        "processing data"
    );
    json!(format!(
        "Processed data for {} in {}",
        text(ctx, "date"),
        text(ctx, "region")
    ))
}

fn analyze_results(ctx: &TaskContext) -> Value {
    tracing::info!(
        model_type = %text(ctx, "model_type"),
        threshold = %text(ctx, "threshold"),
        "analyzing results"
    );
    json!(format!("Analysis done with {}", text(ctx, "model_type")))
}

fn generate_reports(ctx: &TaskContext) -> Value {
    tracing::info!(
        report_format = %text(ctx, "report_format"),
        include_graphs = %text(ctx, "include_graphs"),
        "generating reports"
    );
    json!(format!("Reports generated in {}", text(ctx, "report_format")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use taskflow_core::Params;

    #[test]
    fn demo_has_two_levels() {
        let graph = build(&DemoOptions::default()).unwrap();
        let plan = graph.execution_plan().unwrap();
        assert_eq!(
            plan.to_vecs(),
            vec![
                vec!["process_data".to_string()],
                vec!["analyze_results".to_string(), "generate_reports".to_string()],
            ]
        );
        for name in ["process_data", "analyze_results", "generate_reports"] {
            assert!(graph.contains(name));
        }
    }

    #[test]
    fn reporting_defaults_fill_in() {
        let graph = build(&DemoOptions::default()).unwrap();
        let schema = graph
            .get("generate_reports")
            .and_then(|n| n.param_schema())
            .unwrap();
        let validated = schema.validate(&Params::new()).unwrap();
        assert_eq!(validated.get("report_format"), Some(&json!("pdf")));

        let ctx = TaskContext::standalone("generate_reports", validated, BTreeMap::new());
        assert_eq!(generate_reports(&ctx), json!("Reports generated in pdf"));
    }
}
