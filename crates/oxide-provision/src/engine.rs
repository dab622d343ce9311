//! The reconciliation engine.
//!
//! Each request runs to completion or aborts on the first fatal error. A run
//! holds two [`ConnectionManager`]s against the maintenance database: the
//! admin session issues role and ownership statements, and the user session
//! issues `CREATE DATABASE` so the new database is owned by the managed user.
//! Both are closed before the run returns, whatever the outcome.
//!
//! Known database conditions are only ever suppressed where a policy says so:
//!
//! | Event  | Statement         | Condition           | Policy              | Action                     |
//! |--------|-------------------|---------------------|---------------------|----------------------------|
//! | Create | `CREATE USER`     | `DuplicateUser`     | `Adopt`             | reset password and grants  |
//! | Create | `CREATE USER`     | `DuplicateUser`     | `DeleteAndRecreate` | drop and recreate          |
//! | Create | `DROP USER`       | `DependentObjects`  | `DeleteAndRecreate` | drop database, retry       |
//! | Create | `CREATE DATABASE` | `DuplicateDatabase` | `Adopt`             | transfer ownership         |
//! | Create | `CREATE DATABASE` | `DuplicateDatabase` | `DeleteAndRecreate` | drop and recreate          |
//! | Update | `CREATE USER`     | `DuplicateUser`     | `Create`            | ignore                     |
//! | Update | `CREATE DATABASE` | `DuplicateDatabase` | `Create`            | ignore                     |
//!
//! Everything else is re-raised.

use std::sync::Arc;

use oxide_provision_core::statement::{validate_identifier, validate_password};
use oxide_provision_core::{
    Credentials, ErrorKind, IdentityToken, OnCreateIfExists, OnDelete, ReconcileRequest,
    RequestType, ResourceSpec, Statement,
};
use tracing::{debug, info, warn};

use crate::config::ProvisionConfig;
use crate::connection::{ConnectTarget, ConnectionManager, Connector, PgConnector};
use crate::error::{ProvisionError, Result};
use crate::secrets::SecretResolver;

/// Reconciles user/database pairs.
pub struct Reconciler {
    resolver: Arc<dyn SecretResolver>,
    connector: Arc<dyn Connector>,
    config: ProvisionConfig,
}

impl Reconciler {
    /// Creates a reconciler over an arbitrary connector.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn SecretResolver>,
        connector: Arc<dyn Connector>,
        config: ProvisionConfig,
    ) -> Self {
        Self {
            resolver,
            connector,
            config,
        }
    }

    /// Creates a reconciler that talks to PostgreSQL.
    #[must_use]
    pub fn postgres(resolver: Arc<dyn SecretResolver>, config: ProvisionConfig) -> Self {
        let connector = Arc::new(PgConnector::new(config.ssl_mode));
        Self::new(resolver, connector, config)
    }

    /// Dispatches a request to [`create`](Self::create),
    /// [`update`](Self::update) or [`delete`](Self::delete).
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of the run.
    pub async fn reconcile(&self, request: &ReconcileRequest) -> Result<IdentityToken> {
        let spec = &request.spec;
        info!(
            request_type = request.request_type.as_str(),
            host = %spec.host,
            port = spec.port,
            database = %spec.database_name,
            "Reconciling"
        );

        let token = match request.request_type {
            RequestType::Create => self.create(spec).await?,
            RequestType::Update => self.update(spec, request.prior_token()?).await?,
            RequestType::Delete => self.delete(spec, request.prior_token()?).await?,
        };

        info!(
            request_type = request.request_type.as_str(),
            identity = %token,
            "Reconciliation complete"
        );
        Ok(token)
    }

    /// Creates the user and database, resolving conflicts with
    /// `onCreateIfExists`.
    ///
    /// # Errors
    ///
    /// Fails on a username collision, on any unsuppressed database error, and
    /// on secret or connection failures.
    pub async fn create(&self, spec: &ResourceSpec) -> Result<IdentityToken> {
        spec.validate()?;
        let mut run = self.start(spec);
        let result = run.create().await;
        run.close().await;
        result
    }

    /// Applies the Update policy axes.
    ///
    /// # Errors
    ///
    /// Fails with [`ProvisionError::Identity`] before any SQL if `prior_token`
    /// does not match the current inputs, and otherwise like
    /// [`create`](Self::create).
    pub async fn update(&self, spec: &ResourceSpec, prior_token: &str) -> Result<IdentityToken> {
        spec.validate()?;
        let mut run = self.start(spec);
        let result = run.update(prior_token).await;
        run.close().await;
        result
    }

    /// Drops the database and user unless `onDelete` is `Retain`.
    ///
    /// # Errors
    ///
    /// Fails with [`ProvisionError::Identity`] before any SQL if `prior_token`
    /// does not match the current inputs, and otherwise like
    /// [`create`](Self::create).
    pub async fn delete(&self, spec: &ResourceSpec, prior_token: &str) -> Result<IdentityToken> {
        if spec.policies.on_delete == OnDelete::Retain {
            info!(identity = prior_token, "Retaining user and database");
            return Ok(IdentityToken::unchecked(prior_token));
        }
        spec.validate()?;
        let mut run = self.start(spec);
        let result = run.delete(prior_token).await;
        run.close().await;
        result
    }

    /// Returns the statements a Create would start with, without connecting.
    ///
    /// # Errors
    ///
    /// Fails on invalid specs, secret failures and username collisions.
    pub async fn preview_create(&self, spec: &ResourceSpec) -> Result<Vec<Statement>> {
        spec.validate()?;
        let admin = self.resolver.resolve(&spec.admin_secret_id).await?;
        let user = self.resolver.resolve(&spec.user_secret_id).await?;
        check_logins(&admin, &user)?;
        Ok(vec![
            Statement::create_user(&user.username, &user.password),
            Statement::create_database(&spec.database_name),
        ])
    }

    fn start<'a>(&self, spec: &'a ResourceSpec) -> Run<'a> {
        let target = ConnectTarget::new(&spec.host, spec.port, &self.config.admin_database);
        Run {
            spec,
            admin: ConnectionManager::new(
                "admin",
                &spec.admin_secret_id,
                target.clone(),
                Arc::clone(&self.resolver),
                Arc::clone(&self.connector),
            ),
            user: ConnectionManager::new(
                "user",
                &spec.user_secret_id,
                target,
                Arc::clone(&self.resolver),
                Arc::clone(&self.connector),
            ),
        }
    }
}

/// Rejects login pairs the engine must not act on.
fn check_logins(admin: &Credentials, user: &Credentials) -> Result<()> {
    validate_identifier("username", &user.username)?;
    validate_password("password", &user.password)?;
    if admin.username == user.username {
        return Err(ProvisionError::UsernameCollision {
            username: user.username.clone(),
        });
    }
    Ok(())
}

/// Turns a tolerated condition into success.
fn tolerate(result: Result<()>, kind: ErrorKind, statement: &Statement) -> Result<()> {
    match result {
        Err(err) if err.statement_kind() == Some(kind) => {
            debug!(statement = %statement, condition = ?kind, "Object already exists");
            Ok(())
        }
        other => other,
    }
}

/// State of one reconciliation.
struct Run<'a> {
    spec: &'a ResourceSpec,
    admin: ConnectionManager,
    user: ConnectionManager,
}

impl Run<'_> {
    async fn close(&mut self) {
        self.admin.close().await;
        self.user.close().await;
    }

    /// Resolves both logins and checks they can be acted on.
    async fn logins(&mut self) -> Result<(Credentials, Credentials)> {
        let admin = self.admin.credentials().await?.clone();
        let user = self.user.credentials().await?.clone();
        check_logins(&admin, &user)?;
        Ok((admin, user))
    }

    /// Recomputes the identity from the user secret and compares it.
    async fn verify_identity(&mut self, prior_token: &str) -> Result<IdentityToken> {
        let username = self.user.credentials().await?.username.clone();
        let token = IdentityToken::validate(
            prior_token,
            &self.spec.host,
            &self.spec.database_name,
            &username,
        )?;
        Ok(token)
    }

    async fn create(&mut self) -> Result<IdentityToken> {
        let (_, user) = self.logins().await?;
        let policy = self.spec.policies.on_create_if_exists;
        self.create_user(&user, policy).await?;
        self.create_database(&user, policy).await?;
        Ok(IdentityToken::compute(
            &self.spec.host,
            &self.spec.database_name,
            &user.username,
        ))
    }

    async fn create_user(&mut self, user: &Credentials, policy: OnCreateIfExists) -> Result<()> {
        let create = Statement::create_user(&user.username, &user.password);
        match self.admin.execute(&create).await {
            Ok(()) => {
                info!(username = %user.username, "Created user");
                Ok(())
            }
            Err(err) if err.statement_kind() == Some(ErrorKind::DuplicateUser) => match policy {
                OnCreateIfExists::Fail => Err(err),
                OnCreateIfExists::Adopt => {
                    warn!(username = %user.username, "User already exists, adopting");
                    self.admin
                        .execute(&Statement::alter_user_password(
                            &user.username,
                            &user.password,
                        ))
                        .await?;
                    self.admin
                        .execute(&Statement::alter_user_permissions(&user.username))
                        .await
                }
                OnCreateIfExists::DeleteAndRecreate => {
                    warn!(username = %user.username, "User already exists, recreating");
                    self.drop_user_for_recreate(&user.username).await?;
                    self.admin.execute(&create).await
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Drops `username`. If the role still owns the target database, that
    /// database is dropped too and the drop retried; the database step
    /// recreates it.
    async fn drop_user_for_recreate(&mut self, username: &str) -> Result<()> {
        let drop_user = Statement::drop_user(username, false);
        match self.admin.execute(&drop_user).await {
            Err(err) if err.statement_kind() == Some(ErrorKind::DependentObjects) => {
                warn!(
                    username,
                    database = %self.spec.database_name,
                    "User owns objects, dropping database first"
                );
                self.admin
                    .execute(&Statement::drop_database(&self.spec.database_name, true))
                    .await?;
                self.admin.execute(&drop_user).await
            }
            other => other,
        }
    }

    async fn create_database(
        &mut self,
        user: &Credentials,
        policy: OnCreateIfExists,
    ) -> Result<()> {
        let database = &self.spec.database_name;
        let create = Statement::create_database(database);
        match self.user.execute(&create).await {
            Ok(()) => {
                info!(database = %database, owner = %user.username, "Created database");
                Ok(())
            }
            Err(err) if err.statement_kind() == Some(ErrorKind::DuplicateDatabase) => {
                match policy {
                    OnCreateIfExists::Fail => Err(err),
                    OnCreateIfExists::Adopt => {
                        warn!(database = %database, "Database already exists, adopting");
                        self.admin
                            .execute(&Statement::alter_database_owner(database, &user.username))
                            .await
                    }
                    OnCreateIfExists::DeleteAndRecreate => {
                        warn!(database = %database, "Database already exists, recreating");
                        self.admin
                            .execute(&Statement::drop_database(database, false))
                            .await?;
                        self.user.execute(&create).await
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn update(&mut self, prior_token: &str) -> Result<IdentityToken> {
        let token = self.verify_identity(prior_token).await?;
        let (_, user) = self.logins().await?;
        let policies = self.spec.policies;
        let database = &self.spec.database_name;

        if policies.on_update_if_user_does_not_exist.creates() {
            let create = Statement::create_user(&user.username, &user.password);
            let result = self.admin.execute(&create).await;
            tolerate(result, ErrorKind::DuplicateUser, &create)?;
        }

        if policies.on_update_set_user_password.applies() {
            self.admin
                .execute(&Statement::alter_user_password(
                    &user.username,
                    &user.password,
                ))
                .await?;
            info!(username = %user.username, "Updated password");
        }

        if policies.on_update_set_user_permissions.applies() {
            self.admin
                .execute(&Statement::alter_user_permissions(&user.username))
                .await?;
        }

        if policies.on_update_if_database_does_not_exist.creates() {
            let create = Statement::create_database(database);
            let result = self.user.execute(&create).await;
            tolerate(result, ErrorKind::DuplicateDatabase, &create)?;
        }

        if policies.on_update_set_database_ownership.applies() {
            self.admin
                .execute(&Statement::alter_database_owner(database, &user.username))
                .await?;
        }

        Ok(token)
    }

    async fn delete(&mut self, prior_token: &str) -> Result<IdentityToken> {
        let token = self.verify_identity(prior_token).await?;
        let (_, user) = self.logins().await?;

        self.admin
            .execute(&Statement::drop_database(&self.spec.database_name, true))
            .await?;
        self.admin
            .execute(&Statement::drop_user(&user.username, true))
            .await?;
        info!(
            database = %self.spec.database_name,
            username = %user.username,
            "Dropped database and user"
        );
        Ok(token)
    }
}
