// src/pipelines/cascade.rs: Stage-by-stage QC classification of the samples of an analysis run

use std::collections::BTreeSet;

use log::{debug, info};

use crate::config::defs::{InputRule, PipelineError, QcRule, Stage};
use crate::utils::notifications::{Event, Level, Notification, NotificationSink};
use crate::utils::table::StageTable;

pub type SampleSet = BTreeSet<String>;


/// Classification of one stage's input population. The three sets partition
/// `input`; a stage that did not execute passes all of it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub executed: bool,
    pub input: SampleSet,
    pub passed: SampleSet,
    pub failed_qc: SampleSet,
    pub unrelated_failure: SampleSet,
}

impl StageOutcome {
    /// Unknown (error), failed (warning) and passed (info) events. Empty when
    /// the stage did not execute.
    pub fn notification(&self, analysis_run: &str) -> Notification {
        if !self.executed {
            return Notification::default();
        }
        let label = self.stage.label();
        let event = |level: Level, outcome: &str, samples: &SampleSet| Event {
            analysis_run: analysis_run.to_string(),
            level,
            message: format!("{} QC {}", label, outcome),
            samples: samples.iter().cloned().collect(),
        };
        Notification::new(vec![
            (self.stage.unknown_event(), event(Level::Error, "unknown", &self.unrelated_failure)),
            (self.stage.failed_event(), event(Level::Warning, "failed", &self.failed_qc)),
            (self.stage.passed_event(), event(Level::Info, "passed", &self.passed)),
        ])
    }
}


/// Splits `input` into passed, failed QC and unrelated failures using the
/// stage's table. Table rows outside `input` are not classified, but their QC
/// cells must still be valid.
///
/// # Arguments
///
/// * `stage` - Stage being evaluated, provides the QC rule.
/// * `input` - Samples expected to reach this stage.
/// * `table` - The stage's results, empty if the stage did not execute.
///
/// # Returns
/// StageOutcome, or UnknownQcValue if any row's QC cell is outside the rule's domain.
pub fn evaluate_stage(stage: Stage, input: &SampleSet, table: &StageTable) -> Result<StageOutcome, PipelineError> {
    let executed = !table.is_empty();
    let mut outcome = StageOutcome {
        stage,
        executed,
        input: input.clone(),
        passed: SampleSet::new(),
        failed_qc: SampleSet::new(),
        unrelated_failure: SampleSet::new(),
    };

    if !executed {
        outcome.passed = input.clone();
        return Ok(outcome);
    }

    let rule = stage.qc_rule();
    for sample_id in table.sample_ids() {
        let passed = passes_qc(stage, rule, table, sample_id)?;
        if !input.contains(sample_id) {
            continue;
        }
        if passed {
            outcome.passed.insert(sample_id.to_string());
        } else {
            outcome.failed_qc.insert(sample_id.to_string());
        }
    }
    outcome.unrelated_failure = input.iter().filter(|id| !table.contains(id.as_str())).cloned().collect();

    Ok(outcome)
}

fn passes_qc(stage: Stage, rule: QcRule, table: &StageTable, sample_id: &str) -> Result<bool, PipelineError> {
    let unknown = |column: &str, value: Option<&str>| PipelineError::UnknownQcValue {
        stage: stage.label().to_string(),
        sample: sample_id.to_string(),
        column: column.to_string(),
        value: value.unwrap_or_default().to_string(),
    };

    match rule {
        QcRule::AlwaysPass => Ok(true),
        QcRule::PositiveCount(column) => {
            let value = table.value(sample_id, column);
            let count = value
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c >= 0.0)
                .ok_or_else(|| unknown(column, value))?;
            Ok(count > 0.0)
        }
        QcRule::Flag(column) => {
            let value = table.value(sample_id, column);
            match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
                Some("true") => Ok(true),
                Some("false") => Ok(false),
                _ => Err(unknown(column, value)),
            }
        }
        QcRule::Status { column, pass, fail } => {
            let value = table.value(sample_id, column);
            match value {
                Some(v) if v == pass => Ok(true),
                Some(v) if v == fail => Ok(false),
                _ => Err(unknown(column, value)),
            }
        }
    }
}


/// The four stage tables of an analysis run.
#[derive(Debug, Clone)]
pub struct StageTables {
    pub contamination_removal: StageTable,
    pub primer_autodetection: StageTable,
    pub ncov: StageTable,
    pub pangolin: StageTable,
}

impl StageTables {
    /// Tables for a run where no stage executed.
    pub fn empty() -> Self {
        StageTables {
            contamination_removal: StageTable::empty(&Stage::ContaminationRemoval.schema()),
            primer_autodetection: StageTable::empty(&Stage::PrimerAutodetection.schema()),
            ncov: StageTable::empty(&Stage::Ncov.schema()),
            pangolin: StageTable::empty(&Stage::Pangolin.schema()),
        }
    }

    pub fn get(&self, stage: Stage) -> &StageTable {
        match stage {
            Stage::ContaminationRemoval => &self.contamination_removal,
            Stage::PrimerAutodetection => &self.primer_autodetection,
            Stage::Ncov => &self.ncov,
            Stage::Pangolin => &self.pangolin,
        }
    }

    /// Tables in pipeline order.
    pub fn in_order(&self) -> [&StageTable; 4] {
        Stage::ALL.map(|stage| self.get(stage))
    }
}


/// Outcomes of all stages of one analysis run, in pipeline order.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    outcomes: Vec<StageOutcome>,
}

impl Cascade {
    /// Evaluates every stage once, in order, narrowing the population to the
    /// previous stage's passed samples.
    ///
    /// # Arguments
    ///
    /// * `population` - All samples of the analysis run.
    /// * `tables` - The stage tables.
    ///
    /// # Returns
    /// Cascade holding one StageOutcome per stage.
    pub fn run(population: &[String], tables: &StageTables) -> Result<Self, PipelineError> {
        let all_samples: SampleSet = population.iter().cloned().collect();
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(Stage::ALL.len());

        for stage in Stage::ALL {
            let input = match (stage.input_rule(), outcomes.last()) {
                (InputRule::FullPopulation, _) | (_, None) => all_samples.clone(),
                (InputRule::PreviousPassed, Some(previous)) => previous.passed.clone(),
                (InputRule::PreviousPassedUnlessSkipped(upstream), Some(previous)) => {
                    let upstream_executed = outcomes
                        .iter()
                        .find(|o| o.stage == upstream)
                        .map(|o| o.executed)
                        .unwrap_or(false);
                    if upstream_executed {
                        previous.passed.clone()
                    } else {
                        debug!("{} did not execute, {} sees every sample", upstream.label(), stage.label());
                        all_samples.clone()
                    }
                }
            };

            let outcome = evaluate_stage(stage, &input, tables.get(stage))?;
            if outcome.executed {
                info!(
                    "{}: {} passed, {} failed QC, {} unrelated failures out of {} samples",
                    stage.label(),
                    outcome.passed.len(),
                    outcome.failed_qc.len(),
                    outcome.unrelated_failure.len(),
                    outcome.input.len()
                );
            } else {
                info!("{}: not executed", stage.label());
            }
            outcomes.push(outcome);
        }

        Ok(Cascade { outcomes })
    }

    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, stage: Stage) -> &StageOutcome {
        // every stage is evaluated by run()
        &self.outcomes[Stage::ALL.iter().position(|s| *s == stage).unwrap_or_default()]
    }

    /// Samples recorded nowhere they were expected, over all stages.
    pub fn global_unrelated_failures(&self) -> SampleSet {
        self.outcomes
            .iter()
            .flat_map(|o| o.unrelated_failure.iter().cloned())
            .collect()
    }

    /// Samples reported as Failed: all unrelated failures plus QC failures of
    /// stages whose QC failure is fatal (contamination removal only).
    pub fn global_failed_samples(&self) -> SampleSet {
        let mut failed = self.global_unrelated_failures();
        for outcome in self.outcomes.iter().filter(|o| o.stage.qc_failure_is_fatal()) {
            failed.extend(outcome.failed_qc.iter().cloned());
        }
        failed
    }

    /// One notification per executed stage, in pipeline order.
    pub fn notifications(&self, analysis_run: &str) -> Vec<Notification> {
        self.outcomes
            .iter()
            .map(|o| o.notification(analysis_run))
            .filter(|n| !n.is_empty())
            .collect()
    }

    pub fn publish(&self, analysis_run: &str, sink: &dyn NotificationSink) {
        for notification in self.notifications(analysis_run) {
            notification.publish(sink);
        }
    }
}
