/*!
 * Scenario Runner
 * Runs scenarios in order, logging failures and carrying on
 */

use super::{Scenario, ScenarioContext};
use crate::monitoring::span_operation;
use crate::syscalls::iouring::RingStatistics;
use crate::syscalls::{AddressingMode, Advisory, Backend, Dispatcher};
use serde::Serialize;
use std::error::Error;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the failure is expected for this addressing mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,
    pub duration_us: u64,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub backend: Backend,
    pub addressing: AddressingMode,
    pub scenarios: Vec<ScenarioReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ring: Option<RingStatistics>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn get(&self, scenario: Scenario) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.scenario == scenario)
    }
}

/// Run `scenarios` in order
///
/// A failing scenario is logged and recorded; the rest still run.
pub fn run(dispatcher: &mut Dispatcher, ctx: &ScenarioContext, scenarios: &[Scenario]) -> RunReport {
    info!(
        backend = %dispatcher.backend(),
        addressing = %dispatcher.addressing(),
        root = %ctx.root.display(),
        count = scenarios.len(),
        "running scenarios"
    );

    let mut reports = Vec::with_capacity(scenarios.len());
    for &scenario in scenarios {
        let span = span_operation(scenario.name());
        let _entered = span.enter();
        let start = Instant::now();

        let result = scenario.execute(dispatcher, ctx);
        let duration_us = start.elapsed().as_micros() as u64;
        let advisories = dispatcher.take_advisories();

        let mut note = None;
        let error = match result {
            Ok(()) => {
                span.record_result(true);
                info!(scenario = scenario.name(), "scenario passed");
                None
            }
            Err(e) => {
                let message = error_chain(&e);
                span.record_error(&message);
                note = scenario.known_failure(dispatcher.addressing());
                match note {
                    Some(reason) => warn!(
                        scenario = scenario.name(),
                        error = %message,
                        reason = reason,
                        "scenario failed as expected"
                    ),
                    None => error!(scenario = scenario.name(), error = %message, "scenario failed"),
                }
                Some(message)
            }
        };

        reports.push(ScenarioReport {
            scenario,
            passed: error.is_none(),
            error,
            note,
            advisories,
            duration_us,
        });
    }

    let report = RunReport {
        backend: dispatcher.backend(),
        addressing: dispatcher.addressing(),
        scenarios: reports,
        ring: dispatcher.stats(),
    };
    info!(
        passed = report.passed(),
        failed = report.failed(),
        "scenarios finished"
    );
    report
}

/// Render an error with its sources, outermost first
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
