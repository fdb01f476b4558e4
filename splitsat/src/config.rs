//! Solver configuration.
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// The normal form nodes are brought into before they are fingerprinted.
///
/// `Normal` only sorts literals within clauses. `Lou` additionally renames variables into
/// first-appearance order (the "linearly ordered, unsorted" condition). `Lo` also sorts the
/// clauses lexicographically. `Flo` iterates renaming and sorting to a fixed point, and `Flop`
/// does the same with shorter clauses ordered first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalForm {
    Normal,
    Lou,
    Lo,
    Flo,
    Flop,
}

impl NormalForm {
    /// The name used on the command line and in config files.
    pub fn name(self) -> &'static str {
        match self {
            NormalForm::Normal => "normal",
            NormalForm::Lou => "lou",
            NormalForm::Lo => "lo",
            NormalForm::Flo => "flo",
            NormalForm::Flop => "flop",
        }
    }
}

impl FromStr for NormalForm {
    type Err = String;

    fn from_str(name: &str) -> Result<NormalForm, String> {
        match name {
            "normal" => Ok(NormalForm::Normal),
            "lou" => Ok(NormalForm::Lou),
            "lo" => Ok(NormalForm::Lo),
            "flo" => Ok(NormalForm::Flo),
            "flop" => Ok(NormalForm::Flop),
            _ => Err(format!("unknown normal form '{}'", name)),
        }
    }
}

/// How the splitter picks the next variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// The smallest variable of the set. After renaming this is variable 1.
    FirstVariable,
    /// The variable occurring in the most clauses, smallest id on ties. Effective on
    /// factorization encodings.
    Thief,
}

/// Configurable parameters used during solving.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Normal form applied to every node. (Default: flo)
    pub mode: NormalForm,

    /// Normal form used when preparing child sets for the workers. `None` means the same as
    /// `mode`. A cheaper child form trades node sharing for normalization time; the verdict is
    /// unaffected.
    pub start_mode: Option<NormalForm>,

    /// Worker count. 0 uses all available CPUs, 1 disables parallelism. (Default: 0)
    pub threads: usize,

    /// Stop as soon as a satisfying leaf is found instead of completing the DAG. (Default: false)
    pub exit_upon_solving: bool,

    /// Memoize nodes in the per-solve store. Disabling degenerates the DAG into a tree.
    /// (Default: true)
    pub use_runtime_db: bool,

    /// Consult and feed the persistent fingerprint store. (Default: false)
    pub use_global_db: bool,

    /// Location of the persistent fingerprint store.
    pub global_db_path: PathBuf,

    /// Do not mirror the persistent store's keys in memory; scan the file per lookup. Slower,
    /// but keeps huge stores out of memory. (Default: false)
    pub gdb_no_mem: bool,

    /// Re-evaluate the final assignment against the original formula. (Default: false)
    pub verify: bool,

    /// Always order clauses by size ascending, whatever the normal form. (Default: false)
    pub sort_by_size: bool,

    /// Split variable selection. (Default: first variable)
    pub split_policy: SplitPolicy,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            mode: NormalForm::Flo,
            start_mode: None,
            threads: 0,
            exit_upon_solving: false,
            use_runtime_db: true,
            use_global_db: false,
            global_db_path: PathBuf::from("splitsat-global.db"),
            gdb_no_mem: false,
            verify: false,
            sort_by_size: false,
            split_policy: SplitPolicy::FirstVariable,
        }
    }
}

impl SolverConfig {
    /// The normal form for child sets, defaulting to `mode`.
    pub fn start_mode(&self) -> NormalForm {
        self.start_mode.unwrap_or(self.mode)
    }

    /// The worker count with `threads = 0` resolved to the CPU count.
    pub fn worker_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_mode_defaults_to_mode() {
        let mut config = SolverConfig::default();
        assert_eq!(config.start_mode(), NormalForm::Flo);
        config.start_mode = Some(NormalForm::Lou);
        assert_eq!(config.start_mode(), NormalForm::Lou);
    }

    #[test]
    fn normal_form_names_roundtrip() {
        for &form in &[
            NormalForm::Normal,
            NormalForm::Lou,
            NormalForm::Lo,
            NormalForm::Flo,
            NormalForm::Flop,
        ] {
            assert_eq!(form.name().parse::<NormalForm>(), Ok(form));
        }
        assert!("florp".parse::<NormalForm>().is_err());
    }
}
