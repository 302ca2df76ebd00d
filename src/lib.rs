//! compflow-rust: fachada del workspace.
//!
//! Re-exporta el motor (`comp-core`) y los steps concretos (`comp-adapters`)
//! y ofrece `run_compliance`, el recorrido completo del pipeline de
//! compliance sobre un store y un generador dados.

pub use comp_adapters as adapters;
pub use comp_core as engine;

use comp_adapters::{CheckAuthoringStep, ConsolidateChecksStep, ControlExtractionStep, PromptStepError, TextGenerator};
use comp_core::{BatchRunner, CacheStore, EngineError, PipelineConfig, RunId, StepError, StepExecutor};
use serde_json::{json, Value};

/// Benchmark -> controles -> checks (en paralelo) -> consolidación.
///
/// Con el mismo `run` y el mismo store, una segunda llamada no vuelve a
/// invocar al generador para nada que ya esté en el cache.
pub fn run_compliance<S, G>(config: &PipelineConfig,
                            store: &S,
                            run: RunId,
                            generator: &G,
                            benchmark: &str,
                            parallelism: usize)
                            -> Result<Value, StepError<PromptStepError>>
    where S: CacheStore + ?Sized,
          G: TextGenerator
{
    let exec = StepExecutor::new(config, store, run)?;

    let extract = exec.step("extract", "controls")?;
    let extraction = ControlExtractionStep::new(generator).map_err(PromptStepError::from)
                                                          .map_err(StepError::Compute)?;
    let controls = exec.execute(extract, &extraction, &json!({ "benchmark": benchmark }))?;

    let inputs: Vec<Value> = controls["controls"].as_array()
                                                 .into_iter()
                                                 .flatten()
                                                 .map(|control| {
                                                     let mut input = control.clone();
                                                     input["benchmark"] = json!(benchmark);
                                                     input
                                                 })
                                                 .collect();
    log::info!("{benchmark}: {} controls", inputs.len());

    let author = exec.step("author", "check")?;
    let authoring = CheckAuthoringStep::new(generator).map_err(PromptStepError::from)
                                                      .map_err(StepError::Compute)?;
    let checks = BatchRunner::new(&exec, parallelism).run(author, &authoring, &inputs)?;

    let consolidate = exec.step("consolidate", "checks")?;
    exec.execute(consolidate, &ConsolidateChecksStep, &json!({ "benchmark": benchmark, "checks": checks }))
        .map_err(|e| match e {
            StepError::Engine(e) => StepError::Engine(e),
            StepError::Compute(never) => match never {},
        })
}

/// Comprueba que la configuración declare los steps que usa `run_compliance`.
pub fn check_compliance_pipeline(config: &PipelineConfig) -> Result<(), EngineError> {
    for (module, step) in [("extract", "controls"), ("author", "check"), ("consolidate", "checks")] {
        if config.step(module, step).is_none() {
            return Err(EngineError::UnknownStep { module: module.to_string(),
                                                  step: step.to_string() });
        }
    }
    Ok(())
}
