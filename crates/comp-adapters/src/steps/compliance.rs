//! Steps del pipeline de compliance: benchmark -> controles -> checks ->
//! consolidación.
//!
//! Los dos primeros son LLM (`PromptStep` con plantillas fijas); la
//! consolidación es pura.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::convert::Infallible;

use comp_core::step::{field_key, strip_code_fence, StepOutput, StepTransform};
use log::{debug, warn};
use serde_json::{json, Map, Value};

use super::llm::{PromptStep, PromptStepError};
use crate::generation::TextGenerator;
use crate::template::{PromptTemplate, TemplateError};

pub const CONTROL_EXTRACTION_PROMPT: &str = "You are a security compliance analyst.
List every control of the {{benchmark}} benchmark.
Reply with a YAML sequence only. Each item is a mapping with keys id, title, description and audit (a list of audit procedure lines).";

pub const CHECK_AUTHORING_PROMPT: &str = "You are a security compliance engineer.
Write one automated check for control {{id}} of the {{benchmark}} benchmark: {{title}}.
{{description}}
Audit procedure: {{audit}}
Reply with a YAML mapping only, with keys id, title, severity (low, medium, high or critical), resource and condition.";

const UNSPECIFIED_SEVERITY: &str = "unspecified";

/// `{benchmark}` -> `{controls[]: {id, title, description, audit[]}}`.
pub struct ControlExtractionStep<G> {
    prompt: PromptStep<G>,
}

impl<G: TextGenerator> ControlExtractionStep<G> {
    pub fn new(generator: G) -> Result<Self, TemplateError> {
        Ok(Self::with_template(PromptTemplate::parse(CONTROL_EXTRACTION_PROMPT)?, generator))
    }

    pub fn with_template(template: PromptTemplate, generator: G) -> Self {
        Self { prompt: PromptStep::new(template, generator, "benchmark").with_item_key("id") }
    }
}

impl<G: TextGenerator> StepTransform for ControlExtractionStep<G> {
    type Error = PromptStepError;

    fn cache_key(&self, input: &Value) -> Option<String> {
        self.prompt.cache_key(input)
    }

    fn item_key(&self, item: &Value) -> Option<String> {
        self.prompt.item_key(item)
    }

    fn compute(&self, input: &Value) -> Result<StepOutput, PromptStepError> {
        self.prompt.compute(input)
    }
}

/// Control -> un check. El `control_id` del check siempre es el del input.
pub struct CheckAuthoringStep<G> {
    prompt: PromptStep<G>,
}

impl<G: TextGenerator> CheckAuthoringStep<G> {
    pub fn new(generator: G) -> Result<Self, TemplateError> {
        Ok(Self { prompt: PromptStep::new(PromptTemplate::parse(CHECK_AUTHORING_PROMPT)?, generator, "id") })
    }
}

impl<G: TextGenerator> StepTransform for CheckAuthoringStep<G> {
    type Error = PromptStepError;

    fn cache_key(&self, input: &Value) -> Option<String> {
        self.prompt.cache_key(input)
    }

    fn compute(&self, input: &Value) -> Result<StepOutput, PromptStepError> {
        let reply = self.prompt.ask(input)?;
        let parsed: Value = serde_yaml::from_str(strip_code_fence(&reply)).map_err(|e| PromptStepError::Reply(e.to_string()))?;
        let Value::Object(mut check) = parsed else {
            return Err(PromptStepError::Reply("expected a mapping".into()));
        };

        let control_id = field_key(input, "id").unwrap_or_default();
        let has_id = check.get("id").and_then(Value::as_str).is_some_and(|id| !id.trim().is_empty());
        if !has_id {
            check.insert("id".into(), Value::String(format!("{control_id}-check")));
        }
        check.insert("control_id".into(), Value::String(control_id));
        if let Some(Value::String(severity)) = check.get_mut("severity") {
            *severity = severity.trim().to_ascii_lowercase();
        }
        Ok(StepOutput::Record(Value::Object(check)))
    }
}

/// Consolidación de checks: `{benchmark, checks[]}` ->
/// `{benchmark, checks[], severity_counts}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolidateChecksStep;

impl StepTransform for ConsolidateChecksStep {
    type Error = Infallible;

    fn cache_key(&self, input: &Value) -> Option<String> {
        field_key(input, "benchmark")
    }

    fn item_key(&self, item: &Value) -> Option<String> {
        field_key(item, "id")
    }

    fn compute(&self, input: &Value) -> Result<StepOutput, Infallible> {
        Ok(StepOutput::Record(consolidate_checks(input)))
    }
}

/// Elimina duplicados por id de check (gana el primero), ordena por id de
/// control y cuenta por severidad.
pub fn consolidate_checks(input: &Value) -> Value {
    let mut seen = HashSet::new();
    let mut checks: Vec<&Map<String, Value>> = Vec::new();
    for check in input.get("checks").and_then(Value::as_array).into_iter().flatten() {
        let Some(obj) = check.as_object() else {
            warn!("dropping non-mapping check entry");
            continue;
        };
        let Some(id) = field_key(check, "id") else {
            warn!("dropping check without id");
            continue;
        };
        if !seen.insert(id.clone()) {
            debug!("duplicate check `{id}` dropped");
            continue;
        }
        checks.push(obj);
    }
    checks.sort_by(|a, b| compare_control_ids(str_field(a, "control_id"), str_field(b, "control_id")));

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for check in &checks {
        let severity = match str_field(check, "severity").trim() {
            "" => UNSPECIFIED_SEVERITY.to_string(),
            s => s.to_ascii_lowercase(),
        };
        *counts.entry(severity).or_default() += 1;
    }

    json!({
        "benchmark": input.get("benchmark").cloned().unwrap_or(Value::Null),
        "checks": checks.into_iter().cloned().map(Value::Object).collect::<Vec<_>>(),
        "severity_counts": counts,
    })
}

fn str_field<'v>(obj: &'v Map<String, Value>, name: &str) -> &'v str {
    obj.get(name).and_then(Value::as_str).unwrap_or_default()
}

/// Orden natural por segmentos: `1.2` < `1.10` < `2`.
pub fn compare_control_ids(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}
