use std::path::{Path, PathBuf};
use std::process::exit;

use comp_core::{coerce_record, CacheStore, EngineSettings, FsCacheStore, PipelineConfig, RunId};

const USAGE: &str = "Uso:
  comp-cli inspect [--config <yaml>]
  comp-cli validate --module <M> --step <S> --record <yaml> [--config <yaml>]
  comp-cli cache --run <ID> [--dir <DIR>]
  comp-cli clear --run <ID> [--dir <DIR>]";

/// Flags `--nombre valor` a partir de `args[2..]`.
struct Flags(Vec<(String, String)>);

impl Flags {
    fn parse(args: &[String]) -> Self {
        let mut out = Vec::new();
        let mut i = 0;
        while i < args.len() {
            if let Some(name) = args[i].strip_prefix("--") {
                i += 1;
                if i < args.len() {
                    out.push((name.to_string(), args[i].clone()));
                }
            }
            i += 1;
        }
        Flags(out)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn require(&self, name: &str, cmd: &str) -> String {
        match self.get(name) {
            Some(v) => v.to_string(),
            None => {
                eprintln!("[comp {cmd}] falta --{name}\n{USAGE}");
                exit(2);
            }
        }
    }
}

fn main() {
    // Cargar .env si existe (COMPFLOW_*)
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{USAGE}");
        exit(2);
    }
    let settings = match EngineSettings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[comp] configuración inválida: {e}");
            exit(2);
        }
    };
    let flags = Flags::parse(&args[2..]);
    let config_path = flags.get("config").map(PathBuf::from).unwrap_or_else(|| settings.pipeline.clone());
    let cache_dir = flags.get("dir").map(PathBuf::from).unwrap_or_else(|| settings.cache_dir.clone());

    match args[1].as_str() {
        "inspect" => inspect(&load(&config_path, "inspect")),
        "validate" => {
            let config = load(&config_path, "validate");
            validate(&config,
                     &flags.require("module", "validate"),
                     &flags.require("step", "validate"),
                     Path::new(&flags.require("record", "validate")));
        }
        "cache" => {
            let run = run_id(&flags.require("run", "cache"), "cache");
            list_cache(&FsCacheStore::new(cache_dir), &run);
        }
        "clear" => {
            let run = run_id(&flags.require("run", "clear"), "clear");
            let store = FsCacheStore::new(cache_dir);
            match store.clear_run(&run) {
                Ok(n) => println!("run {run}: {n} entradas eliminadas"),
                Err(e) => {
                    eprintln!("[comp clear] {e}");
                    exit(5);
                }
            }
        }
        other => {
            eprintln!("comando desconocido: {other}\n{USAGE}");
            exit(2);
        }
    }
}

fn load(path: &Path, cmd: &str) -> PipelineConfig {
    match PipelineConfig::load(path) {
        Ok(c) => c,
        Err(e @ comp_core::EngineError::ConfigNotFound(_)) => {
            eprintln!("[comp {cmd}] {e}");
            exit(4);
        }
        Err(e) => {
            eprintln!("[comp {cmd}] {e}");
            exit(5);
        }
    }
}

fn run_id(raw: &str, cmd: &str) -> RunId {
    RunId::new(raw).unwrap_or_else(|e| {
                       eprintln!("[comp {cmd}] {e}");
                       exit(2);
                   })
}

fn inspect(config: &PipelineConfig) {
    println!("definition_hash: {}", config.definition_hash());
    for module in config.modules() {
        println!("sec{}_{} ({} steps)", module.index, module.name, module.steps.len());
        for step in &module.steps {
            println!("  step{}_{}", step.index, step.name);
            print!("    input: {}", step.input_shape);
            print!("    output: {}", step.output_shape);
        }
    }
    let unresolved = config.unresolved_references();
    if !unresolved.is_empty() {
        println!("referencias sin resolver:");
        for (step, reference) in &unresolved {
            println!("  {step}: {reference}");
        }
        exit(4);
    }
}

fn validate(config: &PipelineConfig, module: &str, step: &str, record_path: &Path) {
    let Some(step_ref) = config.step(module, step) else {
        eprintln!("[comp validate] step desconocido: {module}.{step}");
        exit(4);
    };
    let text = match std::fs::read_to_string(record_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("[comp validate] no se pudo leer {}: {e}", record_path.display());
            exit(5);
        }
    };
    let record: serde_json::Value = match serde_yaml::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("[comp validate] YAML inválido: {e}");
            exit(5);
        }
    };
    match coerce_record(step_ref.input_shape(), &record) {
        Ok(coerced) => match serde_yaml::to_string(&coerced) {
            Ok(out) => print!("{out}"),
            Err(e) => {
                eprintln!("[comp validate] {e}");
                exit(5);
            }
        },
        Err(e) => {
            eprintln!("rechazado: {e}");
            exit(4);
        }
    }
}

fn list_cache(store: &FsCacheStore, run: &RunId) {
    match store.manifest(run) {
        Ok(Some(m)) => println!("run {} (engine {}, creado {})", m.run_id, m.engine_version, m.created_at.to_rfc3339()),
        Ok(None) => {}
        Err(e) => eprintln!("[comp cache] manifiesto ilegible: {e}"),
    }
    match store.list(Path::new(run.as_str())) {
        Ok(entries) if entries.is_empty() => {
            eprintln!("[comp cache] run sin entradas: {run}");
            exit(4);
        }
        Ok(entries) => {
            for entry in entries {
                println!("{}", entry.display());
            }
        }
        Err(e) => {
            eprintln!("[comp cache] {e}");
            exit(5);
        }
    }
}
