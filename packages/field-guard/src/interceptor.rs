use crate::{
    cache::StatementCache,
    cipher::CipherSuite,
    config::FieldGuardConfig,
    decryptor::{Decryptor, FieldDescriptorProvider, Row},
    error::Error,
    log::CONTEXT,
    orchestrator::{self, OperationContext, Parameters},
    registry::{EncryptConfigManager, FieldRegistry},
    scope::ScopeSettings,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

///
/// The hooks a host calls around statement execution.
///
/// `before_prepare` encrypts parameters and applies the data scope, `after_execute` restores parameters and
/// `after_materialize` decrypts result rows. `execute` wraps all three around a host closure.
///
pub struct Interceptor {
    registry: Arc<dyn FieldRegistry>,
    ciphers: CipherSuite,
    cache: StatementCache,
    decryptor: Decryptor,
    scope: ScopeSettings,
}

impl Interceptor {
    pub fn new(
        registry: Arc<dyn FieldRegistry>,
        ciphers: CipherSuite,
        cache: StatementCache,
        descriptors: Arc<dyn FieldDescriptorProvider>,
    ) -> Self {
        let decryptor = Decryptor::new(descriptors, ciphers.clone());
        Interceptor {
            registry,
            ciphers,
            cache,
            decryptor,
            scope: ScopeSettings::disabled(),
        }
    }

    /// Replaces the default scope returned by [`scope`](Self::scope).
    pub fn with_scope(mut self, scope: ScopeSettings) -> Self {
        self.scope = scope;
        self
    }

    ///
    /// Builds the registry, cipher suite, statement cache and default scope from configuration.
    ///
    /// Returns the registry manager as well, so the host can reload the column configuration.
    ///
    pub fn from_config(
        config: &FieldGuardConfig,
        descriptors: Arc<dyn FieldDescriptorProvider>,
    ) -> Result<(Self, EncryptConfigManager), Error> {
        let ciphers = CipherSuite::from_config(&config.cipher)?;
        let manager = EncryptConfigManager::init(config)?;
        let cache = StatementCache::from_config(&config.cache);

        let interceptor = Interceptor::new(Arc::new(manager.clone()), ciphers, cache, descriptors)
            .with_scope(ScopeSettings::from_config(&config.scope));
        Ok((interceptor, manager))
    }

    pub fn ciphers(&self) -> &CipherSuite {
        &self.ciphers
    }

    pub fn cache(&self) -> &StatementCache {
        &self.cache
    }

    ///
    /// The configured scope. Disabled unless configuration enables it.
    ///
    /// Hosts pass it to the hooks as is, or clone it and add the operation's rights and exclusions.
    ///
    pub fn scope(&self) -> &ScopeSettings {
        &self.scope
    }

    ///
    /// Encrypts `params` for `sql` and applies the data scope.
    ///
    /// Returns the SQL to execute and the context that [`after_execute`](Self::after_execute) must receive.
    /// If scoping fails, parameters are restored before the error is returned.
    ///
    pub fn before_prepare(
        &self,
        sql: &str,
        params: &mut dyn Parameters,
        scope: &ScopeSettings,
    ) -> Result<(String, OperationContext), Error> {
        let gather = self.cache.get_or_analyze(sql);
        let mut context = OperationContext::new();

        orchestrator::encrypt(
            &mut context,
            &gather,
            self.registry.as_ref(),
            &self.ciphers,
            params,
        )?;

        match scope.rewrite(sql) {
            Ok(rewritten) => {
                debug!(
                    target: CONTEXT,
                    msg = "Prepared statement",
                    id = %context.id(),
                    encrypted = context.len()
                );
                Ok((rewritten, context))
            }
            Err(err) => {
                if let Err(restore_err) = orchestrator::restore(context, params) {
                    warn!(
                        target: CONTEXT,
                        msg = "Parameters could not all be restored",
                        error = restore_err.to_string()
                    );
                }
                Err(err.into())
            }
        }
    }

    pub fn after_execute(
        &self,
        context: OperationContext,
        params: &mut dyn Parameters,
    ) -> Result<(), Error> {
        orchestrator::restore(context, params)
    }

    pub fn after_materialize<R: Row>(&self, rows: &mut [R]) -> Result<usize, Error> {
        Ok(self.decryptor.decrypt_rows(rows)?)
    }

    ///
    /// Runs `run` with the rewritten SQL and encrypted parameters, then restores the parameters.
    ///
    /// Parameters are restored whether `run` succeeds, fails or panics. A panic is resumed once the parameters are
    /// restored. A failure of `run` takes precedence over a restore failure.
    ///
    pub fn execute<P, T, E, F>(
        &self,
        sql: &str,
        params: &mut P,
        scope: &ScopeSettings,
        run: F,
    ) -> Result<T, Error>
    where
        P: Parameters,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: FnOnce(&str, &P) -> Result<T, E>,
    {
        let (sql, context) = self.before_prepare(sql, params, scope)?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| run(&sql, params)));
        let restored = self.after_execute(context, params);

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                if let Err(restore_err) = restored {
                    warn!(
                        target: CONTEXT,
                        msg = "Parameters could not all be restored",
                        error = restore_err.to_string()
                    );
                }
                panic::resume_unwind(payload);
            }
        };

        match (result, restored) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), restored) => {
                if let Err(restore_err) = restored {
                    warn!(
                        target: CONTEXT,
                        msg = "Parameters could not all be restored",
                        error = restore_err.to_string()
                    );
                }
                Err(Error::Execute(err.into()))
            }
        }
    }
}
