//! Layout del cache en disco.
//!
//! ```text
//! <run>/sec<mi>_<module>/step<si>_<step>/
//!     input/<key>.yaml
//!     output/<key>.yaml                         (output singular)
//!     output/<key>/<item>.yaml + .index.yaml    (output lista)
//!     input.yaml, output.yaml                   (input y output singulares: último registro)
//! ```
//!
//! `<key>` sale de la naming function del step. Las entradas con clave son las
//! únicas que consulta el lookup; `input.yaml`/`output.yaml` son una copia del
//! último registro calculado por un step de input y output singulares.

use std::path::{Path, PathBuf};

use crate::constants::{ENTRY_EXTENSION, LIST_INDEX};
use crate::hashing::hash_str;
use crate::pipeline::StepRef;

use super::RunId;

const MAX_KEY_LEN: usize = 120;
const DIGEST_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct StepLayout {
    dir: PathBuf,
    input_list: bool,
}

impl StepLayout {
    pub fn new(run: &RunId, step: StepRef<'_>) -> Self {
        let dir = Path::new(run.as_str()).join(format!("sec{}_{}", step.module.index, step.module.name))
                                         .join(format!("step{}_{}", step.step.index, step.step.name));
        Self { dir,
               input_list: step.input_shape().is_list() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn input_entry(&self, key: &str) -> PathBuf {
        self.dir.join("input").join(entry_file(key))
    }

    pub fn output_entry(&self, key: &str) -> PathBuf {
        self.dir.join("output").join(entry_file(key))
    }

    /// Directorio de items de un output tipo lista.
    pub fn items_dir(&self, key: &str) -> PathBuf {
        self.dir.join("output").join(key)
    }

    pub fn item_entry(&self, key: &str, item_key: &str) -> PathBuf {
        self.items_dir(key).join(entry_file(item_key))
    }

    /// Se escribe después de todos los items: su presencia marca el output
    /// como completo.
    pub fn list_index(&self, key: &str) -> PathBuf {
        self.items_dir(key).join(LIST_INDEX)
    }

    /// `(input.yaml, output.yaml)` para steps de input singular; el executor
    /// solo los escribe si además el output es singular.
    pub fn latest_entries(&self) -> Option<(PathBuf, PathBuf)> {
        (!self.input_list).then(|| {
                                (self.dir.join(format!("input.{ENTRY_EXTENSION}")),
                                 self.dir.join(format!("output.{ENTRY_EXTENSION}")))
                            })
    }
}

fn entry_file(key: &str) -> String {
    format!("{key}.{ENTRY_EXTENSION}")
}

/// Normaliza una clave de cache a un nombre de archivo seguro.
///
/// Caracteres fuera de `[A-Za-z0-9._-]` pasan a `_` y se quitan puntos
/// iniciales. Si la clave cambió o es demasiado larga se le añade un sufijo
/// hash de la clave original, así dos claves distintas nunca comparten
/// archivo. `None` si no queda nada utilizable.
pub fn sanitize_key(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars()
                             .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
                             .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }
    if cleaned == raw && cleaned.len() <= MAX_KEY_LEN {
        return Some(cleaned.to_string());
    }
    let digest = hash_str(raw);
    let keep = cleaned.len().min(MAX_KEY_LEN - DIGEST_LEN - 1);
    Some(format!("{}-{}", &cleaned[..keep], &digest[..DIGEST_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use serde_json::json;

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_key("1.1.2").as_deref(), Some("1.1.2"));
        assert_eq!(sanitize_key("item-4_a").as_deref(), Some("item-4_a"));
        assert!(sanitize_key("CIS 1.1").unwrap().starts_with("CIS_1.1-"));
        assert!(sanitize_key("..hidden").unwrap().starts_with("hidden-"));
        assert_eq!(sanitize_key("   "), None);
        assert_eq!(sanitize_key("///"), None);
        let long = "x".repeat(300);
        let key = sanitize_key(&long).unwrap();
        assert_eq!(key.len(), MAX_KEY_LEN);
    }

    #[test]
    fn keys_differing_in_replaced_characters_stay_distinct() {
        let keys: Vec<String> = ["CIS 1.1", "CIS/1.1", "CIS_1.1", "CIS:1.1"].iter()
                                                                           .map(|k| sanitize_key(k).unwrap())
                                                                           .collect();
        assert_eq!(keys[2], "CIS_1.1");
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(sanitize_key("CIS 1.1"), sanitize_key("CIS 1.1"));
    }

    #[test]
    fn entries_are_keyed_for_every_input_kind() {
        let cfg = PipelineConfig::load(json!({
            "m1": {"s1": {"input": {"x": "string"}, "output": {"y": "integer"}}},
            "m2": {"each": {"input": {"items[]": "string"}, "output": {"out[]": {"id": "string"}}}}
        })).unwrap();
        let run = RunId::new("r").unwrap();

        let single = StepLayout::new(&run, cfg.step("m1", "s1").unwrap());
        assert_eq!(single.input_entry("k"), PathBuf::from("r/sec0_m1/step0_s1/input/k.yaml"));
        assert_eq!(single.output_entry("k"), PathBuf::from("r/sec0_m1/step0_s1/output/k.yaml"));
        assert_eq!(single.latest_entries(),
                   Some((PathBuf::from("r/sec0_m1/step0_s1/input.yaml"), PathBuf::from("r/sec0_m1/step0_s1/output.yaml"))));

        let each = StepLayout::new(&run, cfg.step("m2", "each").unwrap());
        assert_eq!(each.input_entry("k"), PathBuf::from("r/sec1_m2/step0_each/input/k.yaml"));
        assert_eq!(each.item_entry("k", "a"), PathBuf::from("r/sec1_m2/step0_each/output/k/a.yaml"));
        assert_eq!(each.list_index("k"), PathBuf::from("r/sec1_m2/step0_each/output/k/.index.yaml"));
        assert_eq!(each.latest_entries(), None);
    }
}
