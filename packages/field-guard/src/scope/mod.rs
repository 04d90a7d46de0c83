//! Row-level data scoping: JOIN and WHERE fragments spliced into a statement.

mod rewriter;

pub use rewriter::apply_scope;

use crate::{
    config::ScopeConfig,
    error::ScopeError,
    log::SCOPE,
    metrics::{SCOPE_ERROR_TOTAL, SCOPE_REWRITES_TOTAL},
};
use metrics::counter;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, warn};

///
/// Supplies the fragments for a data scope and decides whether an operation may use it.
///
pub trait DataScopeStrategy: Send + Sync + Debug {
    /// JOIN fragment, including the `JOIN` keyword
    fn join_clause(&self) -> Option<String>;

    /// Condition ANDed into the statement's WHERE, without the keyword
    fn where_clause(&self) -> Option<String>;

    /// Checks the operation's rights and exclusions before the scope is applied.
    fn validate(&self, rights: &[String], exclusions: &[String]) -> Result<(), ScopeError>;
}

///
/// Scoping for one operation, passed explicitly by the host.
///
#[derive(Clone, Debug, Default)]
pub struct ScopeSettings {
    pub enabled: bool,
    pub strategy: Option<Arc<dyn DataScopeStrategy>>,
    pub rights: Vec<String>,
    pub exclusions: Vec<String>,
}

impl ScopeSettings {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(strategy: Arc<dyn DataScopeStrategy>) -> Self {
        ScopeSettings {
            enabled: true,
            strategy: Some(strategy),
            ..Default::default()
        }
    }

    /// Settings for the configured [`StaticScope`], enabled only when the configuration enables it.
    pub fn from_config(config: &ScopeConfig) -> Self {
        ScopeSettings {
            enabled: config.enabled,
            strategy: Some(Arc::new(StaticScope::from_config(config))),
            ..Default::default()
        }
    }

    pub fn with_rights<I, S>(mut self, rights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rights = rights.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions = exclusions.into_iter().map(Into::into).collect();
        self
    }

    ///
    /// Applies the strategy to `sql`.
    ///
    /// Disabled settings, or settings without a strategy, return `sql` unchanged.
    ///
    pub fn rewrite(&self, sql: &str) -> Result<String, ScopeError> {
        let Some(strategy) = self.strategy.as_ref().filter(|_| self.enabled) else {
            return Ok(sql.to_string());
        };

        let result = strategy
            .validate(&self.rights, &self.exclusions)
            .and_then(|_| {
                apply_scope(
                    sql,
                    strategy.join_clause().as_deref().unwrap_or_default(),
                    strategy.where_clause().as_deref().unwrap_or_default(),
                )
            });

        match &result {
            Ok(rewritten) => {
                counter!(SCOPE_REWRITES_TOTAL).increment(1);
                debug!(target: SCOPE, msg = "Applied data scope", ?strategy, sql = rewritten);
            }
            Err(err) => {
                counter!(SCOPE_ERROR_TOTAL).increment(1);
                warn!(target: SCOPE, msg = "Data scope not applied", error = err.to_string());
            }
        }

        result
    }
}

///
/// A fixed scope from configuration.
///
/// Requires every configured right. Rejected when the operation excludes the scope by name.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticScope {
    pub name: Option<String>,
    pub join: Option<String>,
    pub where_clause: Option<String>,
    pub required_rights: Vec<String>,
}

impl StaticScope {
    pub fn from_config(config: &ScopeConfig) -> Self {
        StaticScope {
            name: config.name.clone(),
            join: config.join.clone(),
            where_clause: config.where_clause.clone(),
            required_rights: config.required_rights.clone(),
        }
    }
}

impl DataScopeStrategy for StaticScope {
    fn join_clause(&self) -> Option<String> {
        self.join.clone()
    }

    fn where_clause(&self) -> Option<String> {
        self.where_clause.clone()
    }

    fn validate(&self, rights: &[String], exclusions: &[String]) -> Result<(), ScopeError> {
        if let Some(missing) = self
            .required_rights
            .iter()
            .find(|required| !rights.contains(required))
        {
            return Err(ScopeError::Rejected {
                reason: format!("missing right {missing}"),
            });
        }

        if let Some(name) = self.name.as_ref().filter(|name| exclusions.contains(name)) {
            return Err(ScopeError::Rejected {
                reason: format!("scope {name} is excluded"),
            });
        }

        Ok(())
    }
}
