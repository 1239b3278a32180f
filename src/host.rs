//! The tabular host that receives materialized rows.
//!
//! Coordinates are 1-based: `obs` is the row, `var` is the column.

use std::collections::BTreeMap;

use auto_impl::auto_impl;
use thiserror::Error;

/// A failed host call, carrying the host's own return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("host call failed with code {code}")]
pub struct HostError {
    pub code: i32,
}

impl HostError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

#[auto_impl(&mut, Box)]
pub trait Host {
    /// Number of observations the host currently holds
    fn nobs(&self) -> usize;

    fn store_number(&mut self, var: usize, obs: usize, value: f64) -> Result<(), HostError>;

    fn store_str(&mut self, var: usize, obs: usize, value: &str) -> Result<(), HostError>;

    /// Publish a named value for the host-side script to read.
    fn save_macro(&mut self, name: &str, value: &str) -> Result<(), HostError>;

    fn display(&mut self, msg: &str);

    fn error(&mut self, msg: &str);
}

/// An in-memory host
///
/// Missing cells are simply absent. Stores past `capacity` observations fail
/// with [`MemoryHost::OUT_OF_RANGE`], and single cells can be made to fail
/// with [`MemoryHost::fail_store_at`].
#[derive(Debug, Default)]
pub struct MemoryHost {
    obs: usize,
    capacity: Option<usize>,
    fail_at: Option<(usize, usize, i32)>,
    numbers: BTreeMap<(usize, usize), f64>,
    strings: BTreeMap<(usize, usize), String>,
    macros: BTreeMap<String, String>,
    displayed: Vec<String>,
    errors: Vec<String>,
}

impl MemoryHost {
    pub const OUT_OF_RANGE: i32 = 498;

    pub fn new() -> Self {
        Self::default()
    }

    /// A host that accepts at most `capacity` observations
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Set the observation count, as the host script does after `prepare`.
    pub fn set_obs(&mut self, obs: usize) {
        self.obs = obs;
    }

    /// Make the store into (`obs`, `var`) fail with `code`.
    pub fn fail_store_at(&mut self, obs: usize, var: usize, code: i32) {
        self.fail_at = Some((obs, var, code));
    }

    pub fn number(&self, var: usize, obs: usize) -> Option<f64> {
        self.numbers.get(&(obs, var)).copied()
    }

    pub fn string(&self, var: usize, obs: usize) -> Option<&str> {
        self.strings.get(&(obs, var)).map(String::as_str)
    }

    /// Values stored in column `var`, in row order
    pub fn numbers_in(&self, var: usize) -> Vec<(usize, f64)> {
        self.numbers
            .iter()
            .filter(|((_, v), _)| *v == var)
            .map(|((obs, _), value)| (*obs, *value))
            .collect()
    }

    pub fn strings_in(&self, var: usize) -> Vec<(usize, &str)> {
        self.strings
            .iter()
            .filter(|((_, v), _)| *v == var)
            .map(|((obs, _), value)| (*obs, value.as_str()))
            .collect()
    }

    pub fn macro_value(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    pub fn displayed(&self) -> &[String] {
        &self.displayed
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn check(&self, var: usize, obs: usize) -> Result<(), HostError> {
        if obs == 0 || var == 0 || self.capacity.is_some_and(|cap| obs > cap) {
            return Err(HostError::new(Self::OUT_OF_RANGE));
        }
        match self.fail_at {
            Some((o, v, code)) if o == obs && v == var => Err(HostError::new(code)),
            _ => Ok(()),
        }
    }
}

impl Host for MemoryHost {
    fn nobs(&self) -> usize {
        self.obs
    }

    fn store_number(&mut self, var: usize, obs: usize, value: f64) -> Result<(), HostError> {
        self.check(var, obs)?;
        self.numbers.insert((obs, var), value);
        Ok(())
    }

    fn store_str(&mut self, var: usize, obs: usize, value: &str) -> Result<(), HostError> {
        self.check(var, obs)?;
        self.strings.insert((obs, var), value.to_string());
        Ok(())
    }

    fn save_macro(&mut self, name: &str, value: &str) -> Result<(), HostError> {
        self.macros.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn display(&mut self, msg: &str) {
        self.displayed.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }
}
