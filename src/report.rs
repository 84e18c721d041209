//! Output files for an experiment sweep: flow-time CSVs, a gnuplot script
//! and a JSON summary.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::SimulationError;
use crate::experiment::{ExperimentPlan, RunResult};
use crate::shop::dispatch::DispatchPolicy;
use crate::shop::system::MachineReport;

/// Runs of one (scenario, policy) pair, one per max-wait duration
#[derive(Debug)]
pub struct ResultGroup<'a> {
    pub scenario: &'a str,
    pub policy: DispatchPolicy,
    pub runs: Vec<&'a RunResult>,
}

impl ResultGroup<'_> {
    pub fn csv_name(&self) -> String {
        format!("output_{}_{}.csv", self.scenario, self.policy)
    }
}

/// Group results by scenario and policy, keeping plan order
pub fn group_results(results: &[RunResult]) -> Vec<ResultGroup<'_>> {
    let mut groups: Vec<ResultGroup<'_>> = Vec::new();
    for result in results {
        let same_group = groups
            .last()
            .map_or(false, |group| group.scenario == result.scenario && group.policy == result.report.policy);
        match groups.last_mut() {
            Some(group) if same_group => group.runs.push(result),
            _ => groups.push(ResultGroup {
                scenario: &result.scenario,
                policy: result.report.policy,
                runs: vec![result],
            }),
        }
    }
    groups
}

/// One row per product index: `<index>, <minutes at wait 0>, <minutes at wait 1>, ...`
///
/// Every run must have produced at least `target` finished products.
pub fn write_flow_times<W: Write>(out: &mut W, group: &ResultGroup<'_>, target: usize) -> Result<(), SimulationError> {
    for result in &group.runs {
        if result.report.finished() < target {
            return Err(SimulationError::InsufficientOutput {
                run: format!(
                    "{}/{}/wait={:.0}s",
                    group.scenario, group.policy, result.report.max_wait_duration
                ),
                expected: target,
                got: result.report.finished(),
            });
        }
    }

    for index in 0..target {
        write!(out, "{}", index)?;
        for result in &group.runs {
            write!(out, ", {:.6}", result.report.flow_times[index] / 60.0)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn products_plot(scenario: &str, policy: DispatchPolicy, max_waits: &[f64], target: usize) -> String {
    let series: Vec<String> = max_waits
        .iter()
        .enumerate()
        .map(|(i, wait)| format!("using 1:{} title '{:.0}' w boxes ls {}", i + 2, wait, i + 1))
        .collect();

    format!(
        r#"
### config={scenario}, strategy={policy} ###

set terminal svg size 1200 900

# plot 1. x-axis: products, y-axis: flow time of product

set out 'plot_products_{scenario}_{policy}.svg'
set title "Flow Time (config={scenario}, strategy={policy})"
set xlabel "Product #"
set ylabel "Minutes"
set key title "Max Wait (min)"
set key bottom center out
set key horizontal

set xrange [0:{target}]
set style fill solid

plot 'output_{scenario}_{policy}.csv' \
    {series}"#,
        series = series.join(", \\\n '' ")
    )
}

pub fn box_plot(scenario: &str, policy: DispatchPolicy, max_waits: &[f64]) -> String {
    let tics: Vec<String> = max_waits
        .iter()
        .enumerate()
        .map(|(i, wait)| format!("'{:.0}' {}", wait, i))
        .collect();
    let series: Vec<String> = max_waits
        .iter()
        .enumerate()
        .map(|(i, wait)| format!("using ({}):{} title '{:.0}'", i, i + 2, wait))
        .collect();

    format!(
        r#"

# plot 2. x-axis: max-wait parameter, y-axis: flow times of products

set out 'plot_box_{scenario}_{policy}.svg'
set title "Flow Time Distribution (config={scenario}, strategy={policy})"
set style fill solid 0.25 border -1
set style boxplot outliers pointtype 7
set style data boxplot
set key off

set xlabel "Max Wait (minutes)"
unset xrange
unset yrange

set xtics ({tics})

plot 'output_{scenario}_{policy}.csv' \
    {series}"#,
        tics = tics.join(", "),
        series = series.join(", \\\n  '' ")
    )
}

pub fn frequency_plot(scenario: &str, policy: DispatchPolicy, max_waits: &[f64]) -> String {
    let series: Vec<String> = max_waits
        .iter()
        .enumerate()
        .map(|(i, wait)| {
            format!(
                "using (rounded(${})):(1) title '{:.0}' smooth frequency with boxes",
                i + 2,
                wait
            )
        })
        .collect();

    format!(
        r#"

# plot 3. x-axis: flow time interval, y-axis: number of products

bin_width = 5;  # 5 minutes

set out 'plot_freq_{scenario}_{policy}.svg'
set title "Frequency of flow times (config={scenario}, strategy={policy})"
set boxwidth (bin_width) absolute
set style fill solid 1.0 noborder

set key title "Max Wait (min)"
set key bottom center out

set xtics auto
set xrange [0:]
set xlabel "Flow Time (minutes, interval)"
set ylabel "Number of products"

bin_number(x) = floor(x/bin_width)
rounded(x) = bin_width * ( bin_number(x) + 0.5 )

plot 'output_{scenario}_{policy}.csv' \
    {series}"#,
        series = series.join(", \\\n '' ")
    )
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    scenario: &'a str,
    policy: DispatchPolicy,
    max_wait_duration: f64,
    finished: usize,
    spoiled: usize,
    mean_flow_time: Option<f64>,
    avg_queue_length: f64,
    simulated_time: f64,
    machines: &'a [MachineReport],
}

/// Write every output file into `out_dir` and return the paths written
pub fn write_outputs(out_dir: &Path, plan: &ExperimentPlan, results: &[RunResult]) -> Result<Vec<PathBuf>, SimulationError> {
    fs::create_dir_all(out_dir)?;
    let target = plan.base.target_num;
    let max_waits: Vec<f64> = plan.max_wait_durations.iter().map(|wait| wait / 60.0).collect();
    let mut written = Vec::new();

    let groups = group_results(results);
    let mut products = Vec::new();
    let mut boxes = Vec::new();
    let mut frequencies = Vec::new();

    for group in &groups {
        let path = out_dir.join(group.csv_name());
        let mut out = BufWriter::new(File::create(&path)?);
        write_flow_times(&mut out, group, target)?;
        out.flush()?;
        info!("Wrote {}", path.display());
        written.push(path);

        products.push(products_plot(group.scenario, group.policy, &max_waits, target));
        boxes.push(box_plot(group.scenario, group.policy, &max_waits));
        frequencies.push(frequency_plot(group.scenario, group.policy, &max_waits));
    }

    let script = out_dir.join("plot.gnuplot");
    let mut contents = products.join("\n\n");
    contents.push_str(&boxes.join("\n\n"));
    contents.push_str(&frequencies.join("\n\n"));
    contents.push('\n');
    fs::write(&script, contents)?;
    written.push(script);

    let summary: Vec<RunSummary<'_>> = results
        .iter()
        .map(|result| RunSummary {
            scenario: &result.scenario,
            policy: result.report.policy,
            max_wait_duration: result.report.max_wait_duration,
            finished: result.report.finished(),
            spoiled: result.report.spoiled,
            mean_flow_time: result.report.mean_flow_time(),
            avg_queue_length: result.report.avg_queue_length,
            simulated_time: result.report.simulated_time,
            machines: &result.report.machines,
        })
        .collect();
    let summary_path = out_dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    written.push(summary_path);

    Ok(written)
}
