//! Derivation registry.
//!
//! A [`Derivation`] reads named columns of the record set and produces one or
//! more new columns. The [`DerivationRegistry`] holds derivations in a fixed
//! total order: a derivation may read raw columns and the outputs of earlier
//! derivations, never later ones.
//!
//! Before any row is processed the registry walks the order and checks that
//! every input is available, so a misnamed or missing raw column halts the
//! run with [`SddError::MissingColumn`] instead of producing partial output.
//!
//! # Example
//!
//! ```ignore
//! use sdd_derive::build_default_registry;
//!
//! let registry = build_default_registry(&params);
//! let derived = registry.apply(&record_set)?;
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info};

use sdd_ingest::RecordSet;
use sdd_model::{ColumnKind, Params, Response, SddError};

/// Behavioural theme a derivation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Theme {
    General,
    Alcohol,
    Smoking,
    ECigarettes,
    Drugs,
    Wellbeing,
    Lessons,
    MultiBehaviour,
    /// Exclusion flags.
    Flags,
}

impl Theme {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Alcohol => "Alcohol",
            Self::Smoking => "Smoking",
            Self::ECigarettes => "E-cigarettes",
            Self::Drugs => "Drugs",
            Self::Wellbeing => "Wellbeing",
            Self::Lessons => "Lessons",
            Self::MultiBehaviour => "Multi-behaviour",
            Self::Flags => "Exclusion flags",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A column written by a derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Input columns of one derivation, classified as responses.
///
/// Columns are held in the order the derivation declared them.
pub struct Inputs {
    columns: Vec<Vec<Response>>,
    height: usize,
}

impl Inputs {
    pub fn new(columns: Vec<Vec<Response>>, height: usize) -> Self {
        Self { columns, height }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn column(&self, index: usize) -> &[Response] {
        &self.columns[index]
    }

    /// Applies `f` to every row and returns the stored values.
    ///
    /// The slice handed to `f` holds the row's inputs in declaration order.
    pub fn map_rows<F>(&self, f: F) -> Vec<f64>
    where
        F: Fn(&[Response]) -> Response,
    {
        let mut row = Vec::with_capacity(self.columns.len());
        (0..self.height)
            .map(|idx| {
                row.clear();
                row.extend(self.columns.iter().map(|column| column[idx]));
                f(&row).to_f64()
            })
            .collect()
    }
}

type ComputeFn = Box<dyn Fn(&Inputs) -> Vec<Vec<f64>> + Send + Sync>;

/// A pure record-level transform.
pub struct Derivation {
    name: String,
    theme: Theme,
    inputs: Vec<String>,
    outputs: Vec<OutputColumn>,
    compute: ComputeFn,
}

impl Derivation {
    /// Creates a derivation producing one column per output, in order.
    pub fn new<F>(
        name: impl Into<String>,
        theme: Theme,
        inputs: Vec<String>,
        outputs: Vec<OutputColumn>,
        compute: F,
    ) -> Self
    where
        F: Fn(&Inputs) -> Vec<Vec<f64>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            theme,
            inputs,
            outputs,
            compute: Box::new(compute),
        }
    }

    /// Creates a single-output derivation evaluated row by row.
    ///
    /// The output column carries the derivation's name.
    pub fn row_wise<F>(
        name: impl Into<String>,
        theme: Theme,
        inputs: Vec<String>,
        kind: ColumnKind,
        f: F,
    ) -> Self
    where
        F: Fn(&[Response]) -> Response + Send + Sync + 'static,
    {
        let name = name.into();
        let outputs = vec![OutputColumn {
            name: name.clone(),
            kind,
        }];
        Self::new(name, theme, inputs, outputs, move |inputs: &Inputs| {
            vec![inputs.map_rows(&f)]
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputColumn] {
        &self.outputs
    }

    fn run(&self, record_set: &mut RecordSet) -> Result<()> {
        let columns = self
            .inputs
            .iter()
            .map(|name| record_set.responses(name))
            .collect::<Result<Vec<_>>>()?;
        let inputs = Inputs::new(columns, record_set.height());
        let values = (self.compute)(&inputs);
        if values.len() != self.outputs.len() {
            bail!(
                "derivation `{}` produced {} column(s), expected {}",
                self.name,
                values.len(),
                self.outputs.len()
            );
        }
        for (output, column) in self.outputs.iter().zip(values) {
            record_set.set_column(&output.name, column, output.kind)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation")
            .field("name", &self.name)
            .field("theme", &self.theme)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Ordered catalogue of derivations.
#[derive(Debug, Default)]
pub struct DerivationRegistry {
    derivations: Vec<Derivation>,
}

impl DerivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a derivation to the order.
    ///
    /// A derivation with the same name is replaced in place.
    pub fn register(&mut self, derivation: Derivation) {
        match self
            .derivations
            .iter_mut()
            .find(|existing| existing.name == derivation.name)
        {
            Some(existing) => *existing = derivation,
            None => self.derivations.push(derivation),
        }
    }

    pub fn len(&self) -> usize {
        self.derivations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derivations.is_empty()
    }

    /// Looks up a derivation by its name or by one of its output columns.
    pub fn get(&self, name: &str) -> Option<&Derivation> {
        self.derivations.iter().find(|derivation| {
            derivation.name == name || derivation.outputs.iter().any(|output| output.name == name)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Derivation> + '_ {
        self.derivations.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.derivations.iter().map(Derivation::name)
    }

    /// Every output column, in registry order.
    pub fn output_columns(&self) -> Vec<&str> {
        self.derivations
            .iter()
            .flat_map(|derivation| derivation.outputs.iter().map(|output| output.name.as_str()))
            .collect()
    }

    /// Inputs that no earlier derivation produces, in first-use order.
    pub fn raw_inputs(&self) -> Vec<&str> {
        let mut produced = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut raw = Vec::new();
        for derivation in &self.derivations {
            for input in &derivation.inputs {
                if !produced.contains(input.as_str()) && seen.insert(input.as_str()) {
                    raw.push(input.as_str());
                }
            }
            produced.extend(derivation.outputs.iter().map(|output| output.name.as_str()));
        }
        raw
    }

    /// Verifies that every input is a column of the record set or an output
    /// of an earlier derivation.
    pub fn check(&self, record_set: &RecordSet) -> Result<()> {
        let mut available: BTreeSet<String> = record_set.column_names().into_iter().collect();
        for derivation in &self.derivations {
            for input in &derivation.inputs {
                if !available.contains(input) {
                    return Err(SddError::MissingColumn {
                        column: input.clone(),
                        needed_by: derivation.name.clone(),
                    }
                    .into());
                }
            }
            available.extend(derivation.outputs.iter().map(|output| output.name.clone()));
        }
        Ok(())
    }

    /// Runs every derivation in order and returns the extended record set.
    pub fn apply(&self, record_set: &RecordSet) -> Result<RecordSet> {
        self.check(record_set)?;
        let start = Instant::now();
        let mut derived = record_set.clone();
        for derivation in &self.derivations {
            let step = Instant::now();
            derivation.run(&mut derived)?;
            debug!(
                derivation = %derivation.name,
                theme = %derivation.theme,
                duration_ms = step.elapsed().as_millis(),
                "derivation applied"
            );
        }
        info!(
            derivations = self.derivations.len(),
            rows = derived.height(),
            duration_ms = start.elapsed().as_millis(),
            "derivations complete"
        );
        Ok(derived)
    }

    /// Runs a single derivation against a record set holding its inputs.
    pub fn apply_one(&self, record_set: &RecordSet, name: &str) -> Result<RecordSet> {
        let derivation = self
            .get(name)
            .ok_or_else(|| anyhow!("unknown derivation `{name}`"))?;
        for input in &derivation.inputs {
            record_set.require(input, &derivation.name)?;
        }
        let mut derived = record_set.clone();
        derivation.run(&mut derived)?;
        Ok(derived)
    }
}

/// Builds the full derivation catalogue for a run.
pub fn build_default_registry(params: &Params) -> DerivationRegistry {
    let mut registry = DerivationRegistry::new();
    crate::general::register(&mut registry);
    crate::alcohol::register(&mut registry, params);
    crate::smoking::register(&mut registry);
    crate::ecig::register(&mut registry);
    crate::drugs::register(&mut registry, params);
    crate::wellbeing::register(&mut registry);
    crate::lessons::register(&mut registry);
    crate::multi::register(&mut registry);
    registry
}

/// Owned input names from string literals.
pub(crate) fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| (*name).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataFrame, NamedFrom, Series};

    fn frame(columns: &[(&str, Vec<f64>)]) -> RecordSet {
        let columns = columns
            .iter()
            .map(|(name, values)| Series::new((*name).into(), values.clone()).into())
            .collect();
        RecordSet::from_frame(DataFrame::new(columns).unwrap())
    }

    fn doubler(name: &str, input: &str) -> Derivation {
        Derivation::row_wise(name, Theme::General, names(&[input]), ColumnKind::Continuous, |row| {
            match row[0] {
                Response::Value(value) => Response::Value(value * 2.0),
                missing => missing,
            }
        })
    }

    #[test]
    fn check_rejects_forward_reference() {
        let mut registry = DerivationRegistry::new();
        registry.register(doubler("b", "a"));
        registry.register(doubler("c", "d"));
        registry.register(doubler("d", "x"));
        let set = frame(&[("x", vec![1.0]), ("a", vec![1.0])]);
        let error = registry.check(&set).unwrap_err();
        match error.downcast_ref::<SddError>() {
            Some(SddError::MissingColumn { column, needed_by }) => {
                assert_eq!(column, "d");
                assert_eq!(needed_by, "c");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn apply_chains_and_preserves_sentinels() {
        let mut registry = DerivationRegistry::new();
        registry.register(doubler("b", "a"));
        registry.register(doubler("c", "b"));
        let set = frame(&[("a", vec![1.0, -8.0])]);
        let derived = registry.apply(&set).unwrap();
        assert_eq!(derived.values("c").unwrap(), vec![Some(4.0), Some(-8.0)]);
        assert_eq!(derived.kind("c"), ColumnKind::Continuous);
        assert_eq!(set.data.width(), 1);
        assert_eq!(registry.raw_inputs(), vec!["a"]);
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = DerivationRegistry::new();
        registry.register(doubler("b", "a"));
        registry.register(doubler("b", "z"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("b").unwrap().inputs(), ["z".to_string()]);
    }
}
