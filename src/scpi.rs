//! SCPI command path construction.
//!
//! The instrument's command namespace is hierarchical and open ended, so
//! commands are not enumerated anywhere in this crate. A [`CommandPath`]
//! captures "the path so far" and only turns into a wire string at the
//! terminal [`query`](CommandPath::query) or [`set`](CommandPath::set) call.

use std::fmt;

use crate::session::{Pulser, Response};
use crate::Result;

/// An unresolved, hierarchical SCPI address such as `PULSE1:WIDTH`.
///
/// Paths are immutable: [`extend`](CommandPath::extend) returns a new path
/// and never mutates the receiver, so chains built from a common root do not
/// alias each other. Path segments are always joined with `:`; the configured
/// argument separator is used for the command prefix and between argument
/// values only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPath {
    segments: Vec<String>,
    arg_separator: String,
}

impl CommandPath {
    /// An empty path. Usually minted via [`Pulser::node`] instead.
    pub fn root<S: Into<String>>(arg_separator: S) -> Self {
        Self {
            segments: Vec::new(),
            arg_separator: arg_separator.into(),
        }
    }

    /// Returns a new path with `name` (upper-cased) appended.
    pub fn extend<S: AsRef<str>>(&self, name: S) -> CommandPath {
        let mut segments = self.segments.clone();
        segments.push(name.as_ref().to_ascii_uppercase());
        CommandPath {
            segments,
            arg_separator: self.arg_separator.clone(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The wire form of the query for this path, e.g. `:PULSE1:WIDTH?`.
    pub fn query_string(&self) -> String {
        format!("{}{}?", self.arg_separator, self.segments.join(":"))
    }

    /// The wire form of a set command for this path,
    /// e.g. `:PULSE1:WIDTH 2.5e-5`.
    pub fn command_string<V: fmt::Display>(&self, values: &[V]) -> String {
        let values: Vec<String> = values.iter().map(|value| value.to_string()).collect();
        format!(
            "{}{} {}",
            self.arg_separator,
            self.segments.join(":"),
            values.join(&self.arg_separator)
        )
    }

    /// Resolves the path as a query and returns the device's reply.
    pub fn query(&self, session: &mut Pulser) -> Result<Response> {
        session.query(&self.query_string())
    }

    /// Resolves the path as a set command carrying `values` and returns the
    /// device's (error-checked) response line.
    pub fn set<V: fmt::Display>(&self, session: &mut Pulser, values: &[V]) -> Result<String> {
        session.command(&self.command_string(values))
    }
}
