use std::path::PathBuf;

use comp_adapters::{CheckAuthoringStep, ConsolidateChecksStep, ControlExtractionStep, PromptStepError,
                    ScriptedGenerator};
use comp_core::store::sanitize_key;
use comp_core::{BatchRunner, ExecutionOutcome, FsCacheStore, PipelineConfig, RunId, StepError, StepExecutor};
use serde_json::{json, Value};

const CONTROLS_REPLY: &str = "```yaml
- id: \"1.10\"
  title: Disable telnet
  description: Telnet transmits credentials in clear text.
  audit: [\"systemctl is-enabled telnet.socket\"]
- id: \"1.2\"
  title: Enable firewall
  description: A host firewall must be active.
  audit: [\"ufw status\"]
- id: \"1.3\"
  title: Disable root login
  description: Root must not log in over SSH.
  audit: [\"grep PermitRootLogin /etc/ssh/sshd_config\"]
```";

fn pipeline() -> PipelineConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../pipelines/compliance.yaml");
    PipelineConfig::load(path).unwrap()
}

fn generator() -> ScriptedGenerator {
    ScriptedGenerator::new().reply_when("List every control of the CIS Ubuntu", CONTROLS_REPLY)
                            .reply_when("control 1.10 ", "id: telnet-off\ntitle: telnet disabled\nseverity: High\nresource: service\ncondition: telnet.socket disabled")
                            .reply_when("control 1.2 ", "id: fw-on\ntitle: firewall on\nseverity: medium\nresource: service\ncondition: ufw active")
                            .reply_when("control 1.3 ", "id: telnet-off\ntitle: duplicate id\nseverity: low\nresource: file\ncondition: PermitRootLogin no")
}

fn author_inputs(benchmark: &str, controls: &Value) -> Vec<Value> {
    controls["controls"].as_array()
                        .map(|items| {
                            items.iter()
                                 .map(|c| {
                                     let mut input = c.clone();
                                     input["benchmark"] = json!(benchmark);
                                     input
                                 })
                                 .collect()
                        })
                        .unwrap_or_default()
}

#[test]
fn compliance_pipeline_runs_and_resumes_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = pipeline();
    assert_eq!(cfg.step_count(), 3);
    assert!(cfg.unresolved_references().is_empty());

    let gen = generator();
    let run = RunId::new("cis-ubuntu").unwrap();
    let benchmark = "CIS Ubuntu";

    let mut consolidated = Value::Null;
    for attempt in 0..2 {
        let store = FsCacheStore::new(dir.path());
        let exec = StepExecutor::new(&cfg, &store, run.clone()).unwrap();

        let extract = exec.step("extract", "controls").unwrap();
        let controls = exec.execute_traced(extract, &ControlExtractionStep::new(&gen).unwrap(), &json!({"benchmark": benchmark}))
                           .unwrap();
        let expected = if attempt == 0 { ExecutionOutcome::Computed } else { ExecutionOutcome::CacheHit };
        assert_eq!(controls.outcome, expected);
        assert_eq!(controls.record["controls"].as_array().map(Vec::len), Some(3));

        let author = exec.step("author", "check").unwrap();
        let checks = BatchRunner::new(&exec, 2).run(author, &CheckAuthoringStep::new(&gen).unwrap(),
                                                    &author_inputs(benchmark, &controls.record))
                                               .unwrap();
        let control_ids: Vec<&str> = checks.iter().filter_map(|c| c["control_id"].as_str()).collect();
        assert_eq!(control_ids, vec!["1.10", "1.2", "1.3"]);

        let consolidate = exec.step("consolidate", "checks").unwrap();
        consolidated = exec.execute(consolidate, &ConsolidateChecksStep, &json!({"benchmark": benchmark, "checks": checks}))
                           .unwrap();
    }

    // 1 extracción + 3 checks, nada en el segundo intento.
    assert_eq!(gen.calls(), 4);

    let ids: Vec<&str> = consolidated["checks"].as_array()
                                               .unwrap()
                                               .iter()
                                               .filter_map(|c| c["id"].as_str())
                                               .collect();
    assert_eq!(ids, vec!["fw-on", "telnet-off"]);
    assert_eq!(consolidated["severity_counts"], json!({"high": 1, "medium": 1}));

    let base = dir.path().join("cis-ubuntu");
    let key = sanitize_key(benchmark).unwrap();
    assert_ne!(key, "CIS_Ubuntu");
    assert!(base.join("run.yaml").is_file());
    assert!(base.join(format!("sec0_extract/step0_controls/output/{key}/1.10.yaml")).is_file());
    assert!(base.join(format!("sec0_extract/step0_controls/output/{key}/.index.yaml")).is_file());
    assert!(base.join(format!("sec0_extract/step0_controls/input/{key}.yaml")).is_file());
    assert!(base.join("sec1_author/step0_check/output/1.2.yaml").is_file());
    assert!(base.join(format!("sec2_consolidate/step0_checks/output/{key}/fw-on.yaml")).is_file());
}

#[test]
fn backend_failure_surfaces_as_compute_error() {
    let cfg = pipeline();
    let store = comp_core::InMemoryCacheStore::default();
    let exec = StepExecutor::new(&cfg, &store, RunId::new("r").unwrap()).unwrap();
    let gen = ScriptedGenerator::new().fail_when("benchmark", "rate limited");

    let step = exec.step("extract", "controls").unwrap();
    let err = exec.execute(step, &ControlExtractionStep::new(&gen).unwrap(), &json!({"benchmark": "CIS"}))
                  .unwrap_err();
    assert!(matches!(err, StepError::Compute(PromptStepError::Generation(_))));
    assert_eq!(gen.calls(), 1);
}
