//! SPARQL 1.1 JSON results decoding.

use std::collections::HashMap;

use serde::Deserialize;

use semem_core::error::{Error, Result};
use semem_core::storage::QueryRows;

/// A `SELECT` result document.
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlResults {
    /// Projected variable names
    #[serde(default)]
    pub head: Head,
    /// Solution bindings
    pub results: Bindings,
}

/// The `head` section of a results document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Head {
    /// Projected variable names
    #[serde(default)]
    pub vars: Vec<String>,
}

/// The `results` section of a results document.
#[derive(Debug, Clone, Deserialize)]
pub struct Bindings {
    /// One map per solution, variable name → term
    pub bindings: Vec<HashMap<String, Term>>,
}

/// An RDF term binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Term {
    /// `uri`, `literal`, or `bnode`
    #[serde(rename = "type")]
    pub kind: String,
    /// Lexical value
    pub value: String,
    /// Literal datatype IRI, when typed
    #[serde(default)]
    pub datatype: Option<String>,
    /// Language tag, when tagged
    #[serde(rename = "xml:lang", default)]
    pub lang: Option<String>,
}

/// An `ASK` result document.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResult {
    /// The answer
    pub boolean: bool,
}

/// A solution row with typed accessors.
pub struct Row<'a>(pub &'a HashMap<String, Term>);

impl Row<'_> {
    /// String value of a variable.
    ///
    /// # Errors
    ///
    /// `PersistenceFailed` when the variable is unbound.
    pub fn required(&self, var: &str) -> Result<&str> {
        self.0
            .get(var)
            .map(|term| term.value.as_str())
            .ok_or_else(|| Error::PersistenceFailed(format!("result row missing variable '{var}'")))
    }

    /// String value of an optional variable.
    #[must_use]
    pub fn optional(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(|term| term.value.as_str())
    }

    /// Integer value of a variable.
    ///
    /// # Errors
    ///
    /// `PersistenceFailed` when unbound or not an integer.
    pub fn integer(&self, var: &str) -> Result<i64> {
        self.required(var)?.parse().map_err(|_| {
            Error::PersistenceFailed(format!("variable '{var}' is not an integer"))
        })
    }

    /// Float value of a variable.
    ///
    /// # Errors
    ///
    /// `PersistenceFailed` when unbound or not a float.
    pub fn float(&self, var: &str) -> Result<f32> {
        self.required(var)?
            .parse()
            .map_err(|_| Error::PersistenceFailed(format!("variable '{var}' is not a float")))
    }
}

/// Flatten a results document into the opaque row format of the storage
/// trait.
#[must_use]
pub fn to_query_rows(results: &SparqlResults) -> QueryRows {
    results
        .results
        .bindings
        .iter()
        .map(|binding| {
            binding
                .iter()
                .map(|(var, term)| {
                    let mut object = serde_json::Map::new();
                    object.insert("type".into(), term.kind.clone().into());
                    object.insert("value".into(), term.value.clone().into());
                    if let Some(datatype) = &term.datatype {
                        object.insert("datatype".into(), datatype.clone().into());
                    }
                    if let Some(lang) = &term.lang {
                        object.insert("xml:lang".into(), lang.clone().into());
                    }
                    (var.clone(), serde_json::Value::Object(object))
                })
                .collect()
        })
        .collect()
}
