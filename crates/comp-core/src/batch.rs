//! Batch Orchestrator: ejecuta un step sobre una colección de inputs con
//! paralelismo acotado.
//!
//! Los resultados siempre salen en el orden de los inputs, sin importar el
//! orden en que terminan. Si algún item falla el batch entero falla (`run`),
//! aunque los items que sí terminaron quedan persistidos en el cache.

use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde_json::Value;

use crate::errors::{EngineError, StepError};
use crate::pipeline::StepRef;
use crate::step::{StepExecutor, StepTransform};
use crate::store::CacheStore;

pub struct BatchRunner<'e, 'a, S: CacheStore + ?Sized> {
    executor: &'e StepExecutor<'a, S>,
    parallelism: usize,
}

impl<'e, 'a, S: CacheStore + ?Sized> BatchRunner<'e, 'a, S> {
    /// `parallelism` es el máximo de items en vuelo; 0 se trata como 1.
    pub fn new(executor: &'e StepExecutor<'a, S>, parallelism: usize) -> Self {
        Self { executor,
               parallelism: parallelism.max(1) }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Resultado por item, en el orden de `inputs`. Sólo falla por completo si
    /// no se puede crear el pool de workers.
    pub fn run_each<T>(&self,
                       step: StepRef<'_>,
                       transform: &T,
                       inputs: &[Value])
                       -> Result<Vec<Result<Value, StepError<T::Error>>>, EngineError>
        where T: StepTransform + ?Sized
    {
        let workers = self.parallelism.min(inputs.len());
        if workers <= 1 {
            return Ok(inputs.iter()
                            .map(|input| self.executor.execute(step, transform, input))
                            .collect());
        }

        let pool = ThreadPoolBuilder::new().num_threads(workers)
                                           .thread_name(|i| format!("compflow-worker-{i}"))
                                           .build()
                                           .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
        info!("{}: {} inputs on {workers} workers", step.qualified_name(), inputs.len());

        // `collect` sobre un iterador indexado conserva la posición de cada
        // input.
        Ok(pool.install(|| {
                   inputs.par_iter()
                         .map(|input| self.executor.execute(step, transform, input))
                         .collect()
               }))
    }

    /// Todos los outputs en orden, o el error del primer item (por posición)
    /// que falló.
    pub fn run<T>(&self, step: StepRef<'_>, transform: &T, inputs: &[Value]) -> Result<Vec<Value>, StepError<T::Error>>
        where T: StepTransform + ?Sized
    {
        let results = self.run_each(step, transform, inputs)?;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!("{}: {failed} of {} items failed, batch aborted", step.qualified_name(), results.len());
        }
        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use crate::step::{FnTransform, StepOutput};
    use crate::store::{InMemoryCacheStore, RunId};
    use serde_json::json;
    use std::fmt;

    #[derive(Debug)]
    struct Boom(String);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom on {}", self.0)
        }
    }

    impl std::error::Error for Boom {}

    fn config() -> PipelineConfig {
        PipelineConfig::load(json!({
            "m": {"double": {"input": {"id": "string", "n": "integer"}, "output": {"id": "string", "n": "integer"}}}
        })).unwrap()
    }

    fn doubler() -> FnTransform<impl Fn(&Value) -> Result<StepOutput, Boom> + Send + Sync, Boom> {
        FnTransform::new("id", |input: &Value| {
            let n = input["n"].as_i64().unwrap_or_default();
            if n < 0 {
                return Err(Boom(input["id"].as_str().unwrap_or_default().to_string()));
            }
            Ok(StepOutput::Record(json!({"id": input["id"], "n": n * 2})))
        })
    }

    #[test]
    fn empty_batch_is_empty() {
        let cfg = config();
        let store = InMemoryCacheStore::default();
        let exec = StepExecutor::new(&cfg, &store, RunId::new("r").unwrap()).unwrap();
        let step = exec.step("m", "double").unwrap();
        assert!(BatchRunner::new(&exec, 4).run(step, &doubler(), &[]).unwrap().is_empty());
    }

    #[test]
    fn first_failure_by_position_fails_the_batch() {
        let cfg = config();
        let store = InMemoryCacheStore::default();
        let exec = StepExecutor::new(&cfg, &store, RunId::new("r").unwrap()).unwrap();
        let step = exec.step("m", "double").unwrap();
        let inputs: Vec<Value> = [("a", 1), ("b", -1), ("c", 3), ("d", -4)].iter()
                                                                          .map(|(id, n)| json!({"id": id, "n": n}))
                                                                          .collect();
        for parallelism in [1, 3] {
            let runner = BatchRunner::new(&exec, parallelism);
            let each = runner.run_each(step, &doubler(), &inputs).unwrap();
            assert_eq!(each.len(), 4);
            assert_eq!(each[0].as_ref().unwrap(), &json!({"id": "a", "n": 2}));
            assert!(each[1].is_err());

            match runner.run(step, &doubler(), &inputs) {
                Err(StepError::Compute(Boom(id))) => assert_eq!(id, "b"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
