//! PETSc-style options database and typed views over it.
//!
//! Options are stored as `key -> value` strings with the leading dash removed. Every
//! solver object reads its options under an *options prefix*, so a nested preconditioner
//! with prefix `fieldsplit_1_assembled_` reads `-fieldsplit_1_assembled_pc_type`.
//!
//! ```
//! use kryst_assembled::config::options::OptionsDb;
//! let db: OptionsDb = "-assembled_pc_type lu -assembled_mat_type dense".parse().unwrap();
//! assert_eq!(db.get_string("assembled_mat_type", "aij"), "dense");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::context::ksp_context::KspType;
use crate::context::pc_context::PcType;
use crate::error::KError;
use crate::preconditioner::sor::MatSorType;

/// Runtime option store shared by `Pc` and `Ksp` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsDb {
    entries: BTreeMap<String, String>,
}

impl OptionsDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse command-line style arguments: `-key value` pairs and bare `-flag`s.
    ///
    /// A token that starts with `-` followed by a digit or `.` is a value (negative number),
    /// not a key.
    pub fn parse_args<I, S>(args: I) -> Result<Self, KError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut db = Self::new();
        let mut pending: Option<String> = None;
        for arg in args {
            let arg = arg.as_ref();
            if is_key(arg) {
                if let Some(key) = pending.take() {
                    db.set_flag(&key);
                }
                pending = Some(arg.trim_start_matches('-').to_string());
            } else if let Some(key) = pending.take() {
                db.set(&key, arg);
            } else {
                return Err(KError::InvalidOption { key: String::new(), value: arg.to_string() });
            }
        }
        if let Some(key) = pending {
            db.set_flag(&key);
        }
        Ok(db)
    }

    /// Set `key` (with or without a leading dash) to `value`.
    pub fn set(&mut self, key: &str, value: impl fmt::Display) {
        self.entries.insert(key.trim_start_matches('-').to_string(), value.to_string());
    }

    /// Set a flag with no value.
    pub fn set_flag(&mut self, key: &str) {
        self.entries.insert(key.trim_start_matches('-').to_string(), String::new());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key.trim_start_matches('-'))
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, KError> {
        self.get_parsed(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, KError> {
        self.get_parsed(key, default)
    }

    /// A bare flag counts as `true`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, KError> {
        match self.get(key) {
            None => Ok(default),
            Some("") => Ok(true),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(key, v)),
            },
        }
    }

    /// Keys starting with `prefix`, in sorted order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, KError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| invalid(key, v)),
        }
    }
}

impl FromStr for OptionsDb {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_args(s.split_whitespace())
    }
}

impl fmt::Display for OptionsDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            if v.is_empty() {
                writeln!(f, "-{}", k)?;
            } else {
                writeln!(f, "-{} {}", k, v)?;
            }
        }
        Ok(())
    }
}

fn is_key(arg: &str) -> bool {
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some('-'), Some(c)) => !(c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

fn invalid(key: &str, value: &str) -> KError {
    KError::InvalidOption { key: key.to_string(), value: value.to_string() }
}

/// Preconditioner types & parameters, read under a prefix.
#[derive(Debug, Clone)]
pub struct PcOptions {
    /// Type of preconditioner (none, jacobi, sor, ilu, lu, ksp, python)
    pub pc_type: Option<PcType>,

    /// Relaxation factor ω for SOR
    pub sor_omega: f64,

    /// Number of SOR sweeps
    pub sor_its: usize,

    /// Sweep direction for SOR
    pub sor_type: MatSorType,

    /// Registered plugin name for `python` PCs
    pub python_type: Option<String>,
}

impl Default for PcOptions {
    fn default() -> Self {
        Self {
            pc_type: None,
            sor_omega: 1.0,
            sor_its: 1,
            sor_type: MatSorType::SYMMETRIC_SWEEP,
            python_type: None,
        }
    }
}

impl PcOptions {
    pub fn from_db(db: &OptionsDb, prefix: &str) -> Result<Self, KError> {
        let key = |name: &str| format!("{prefix}{name}");
        let mut opts = Self::default();
        if let Some(name) = db.get(&key("pc_type")) {
            opts.pc_type = Some(name.parse()?);
        }
        opts.sor_omega = db.get_f64(&key("pc_sor_omega"), opts.sor_omega)?;
        opts.sor_its = db.get_usize(&key("pc_sor_its"), opts.sor_its)?;
        if db.get_bool(&key("pc_sor_forward"), false)? {
            opts.sor_type = MatSorType::APPLY_LOWER;
        }
        if db.get_bool(&key("pc_sor_backward"), false)? {
            opts.sor_type = MatSorType::APPLY_UPPER;
        }
        if db.get_bool(&key("pc_sor_symmetric"), false)? {
            opts.sor_type = MatSorType::SYMMETRIC_SWEEP;
        }
        opts.python_type = db.get(&key("pc_python_type")).map(str::to_string);
        Ok(opts)
    }
}

/// Krylov solver types & parameters, read under a prefix.
#[derive(Debug, Clone)]
pub struct KspOptions {
    pub ksp_type: Option<KspType>,
    pub rtol: f64,
    pub atol: f64,
    pub max_it: usize,
    pub gmres_restart: usize,
}

impl Default for KspOptions {
    fn default() -> Self {
        Self { ksp_type: None, rtol: 1e-5, atol: 1e-50, max_it: 10_000, gmres_restart: 30 }
    }
}

impl KspOptions {
    pub fn from_db(db: &OptionsDb, prefix: &str) -> Result<Self, KError> {
        let key = |name: &str| format!("{prefix}{name}");
        let mut opts = Self::default();
        if let Some(name) = db.get(&key("ksp_type")) {
            opts.ksp_type = Some(name.parse()?);
        }
        opts.rtol = db.get_f64(&key("ksp_rtol"), opts.rtol)?;
        opts.atol = db.get_f64(&key("ksp_atol"), opts.atol)?;
        opts.max_it = db.get_usize(&key("ksp_max_it"), opts.max_it)?;
        opts.gmres_restart = db.get_usize(&key("ksp_gmres_restart"), opts.gmres_restart)?;
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_flags_and_negative_values() {
        let args = ["-pc_type", "sor", "-pc_sor_symmetric", "-shift", "-1.5", "-ksp_monitor"];
        let db = OptionsDb::parse_args(args).unwrap();
        assert_eq!(db.get("pc_type"), Some("sor"));
        assert_eq!(db.get("pc_sor_symmetric"), Some(""));
        assert_eq!(db.get_f64("shift", 0.0).unwrap(), -1.5);
        assert!(db.get_bool("ksp_monitor", false).unwrap());
        assert_eq!(db.len(), 4);
    }

    #[test]
    fn stray_value_is_rejected() {
        assert!(matches!(OptionsDb::parse_args(["lu"]), Err(KError::InvalidOption { .. })));
    }

    #[test]
    fn typed_getters_report_bad_values() {
        let db: OptionsDb = "-ksp_max_it lots".parse().unwrap();
        let err = db.get_usize("ksp_max_it", 1).unwrap_err();
        assert!(matches!(err, KError::InvalidOption { ref key, .. } if key == "ksp_max_it"));
        assert_eq!(db.get_usize("missing", 7).unwrap(), 7);
    }

    #[test]
    fn prefixed_views() {
        let db: OptionsDb = "-assembled_pc_type sor -assembled_pc_sor_omega 1.3 -assembled_pc_sor_forward \
             -assembled_ksp_ksp_type cg"
            .parse()
            .unwrap();
        let pc = PcOptions::from_db(&db, "assembled_").unwrap();
        assert_eq!(pc.pc_type, Some(PcType::Sor));
        assert_eq!(pc.sor_omega, 1.3);
        assert_eq!(pc.sor_type, MatSorType::APPLY_LOWER);
        let ksp = KspOptions::from_db(&db, "assembled_ksp_").unwrap();
        assert_eq!(ksp.ksp_type, Some(KspType::Cg));
        let keys: Vec<_> = db.keys_with_prefix("assembled_pc_sor").collect();
        assert_eq!(keys, vec!["assembled_pc_sor_forward", "assembled_pc_sor_omega"]);
    }
}
