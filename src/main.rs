//! Demo del pipeline de compliance en modo dry run.
//!
//! Usa `ScriptedGenerator` en lugar de un backend real y un cache en disco
//! según `COMPFLOW_*`. Ejecutarlo dos veces con el mismo `COMPFLOW_RUN_ID`
//! muestra que la segunda pasada sale entera del cache.

use std::process::exit;

use comp_adapters::ScriptedGenerator;
use comp_core::{EngineSettings, FsCacheStore, PipelineConfig};
use compflow_rust::{check_compliance_pipeline, run_compliance};

const DEMO_BENCHMARK: &str = "CIS Demo Linux";

const DEMO_CONTROLS: &str = "- id: \"1.1\"
  title: Disable telnet
  description: Telnet sends credentials in clear text.
  audit: [\"systemctl is-enabled telnet.socket\"]
- id: \"1.2\"
  title: Enable the host firewall
  description: Inbound traffic must be filtered.
  audit: [\"ufw status\"]
- id: \"2.1\"
  title: Disable root SSH login
  description: Administrators log in with personal accounts.
  audit: [\"sshd -T | grep permitrootlogin\"]";

fn demo_generator() -> ScriptedGenerator {
    ScriptedGenerator::new().reply_when("List every control", DEMO_CONTROLS)
                            .reply_when("control 1.1 ", "id: telnet-disabled\ntitle: Telnet socket disabled\nseverity: high\nresource: service/telnet.socket\ncondition: is-enabled == disabled")
                            .reply_when("control 1.2 ", "id: firewall-active\ntitle: Firewall active\nseverity: medium\nresource: service/ufw\ncondition: status == active")
                            .reply_when("control 2.1 ", "id: ssh-no-root\ntitle: Root SSH login disabled\nseverity: high\nresource: file/etc/ssh/sshd_config\ncondition: PermitRootLogin == no")
}

fn main() {
    let _ = dotenvy::dotenv();
    let settings = match EngineSettings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[main-core] {e}");
            exit(2);
        }
    };
    let config_path = std::env::args().nth(1).map(Into::into).unwrap_or_else(|| settings.pipeline.clone());
    let config = match PipelineConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[main-core] {e}");
            exit(4);
        }
    };
    if let Err(e) = check_compliance_pipeline(&config) {
        eprintln!("[main-core] {e}");
        exit(4);
    }

    let store = FsCacheStore::new(&settings.cache_dir);
    let generator = demo_generator();
    println!("run {} en {}", settings.run_id, settings.cache_dir.display());
    match run_compliance(&config, &store, settings.run_id.clone(), &generator, DEMO_BENCHMARK, settings.parallelism) {
        Ok(report) => {
            match serde_yaml::to_string(&report) {
                Ok(text) => print!("{text}"),
                Err(e) => eprintln!("[main-core] {e}"),
            }
            println!("llamadas al generador: {}", generator.calls());
        }
        Err(e) => {
            eprintln!("[main-core] {e}");
            exit(5);
        }
    }
}
