#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oxide_provision::prelude::*;

pub const ADMIN_PASSWORD: &str = "toor";
pub const USER_PASSWORD: &str = "s3cret";

/// A role as the fake server sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeUser {
    pub password: String,
    pub createdb: bool,
    pub login: bool,
    pub superuser: bool,
}

/// A database as the fake server sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDatabase {
    pub owner: String,
    pub oid: u32,
}

#[derive(Default)]
struct State {
    users: HashMap<String, FakeUser>,
    databases: HashMap<String, FakeDatabase>,
    next_oid: u32,
    executed: Vec<Statement>,
    failures: HashMap<&'static str, DatabaseError>,
    opened: usize,
    closed: usize,
}

/// Statement tag, as PostgreSQL reports it in command completion.
pub fn tag(statement: &Statement) -> &'static str {
    match statement {
        Statement::CreateUser { .. } => "CREATE USER",
        Statement::AlterUserPassword { .. } => "ALTER USER PASSWORD",
        Statement::AlterUserPermissions { .. } => "ALTER USER PERMISSIONS",
        Statement::DropUser { .. } => "DROP USER",
        Statement::CreateDatabase { .. } => "CREATE DATABASE",
        Statement::DropDatabase { .. } => "DROP DATABASE",
        Statement::AlterDatabaseOwner { .. } => "ALTER DATABASE OWNER",
    }
}

fn undefined_role(name: &str) -> DatabaseError {
    DatabaseError::with_code(format!("role \"{name}\" does not exist"), "42704")
}

fn undefined_database(name: &str) -> DatabaseError {
    DatabaseError::with_code(format!("database \"{name}\" does not exist"), "3D000")
}

impl State {
    fn apply(
        &mut self,
        session_user: &str,
        statement: &Statement,
    ) -> std::result::Result<(), DatabaseError> {
        self.executed.push(statement.clone());
        if let Some(err) = self.failures.get(tag(statement)) {
            return Err(err.clone());
        }

        let caller = self
            .users
            .get(session_user)
            .cloned()
            .ok_or_else(|| undefined_role(session_user))?;

        match statement {
            Statement::CreateUser { name, password } => {
                if !caller.superuser {
                    return Err(DatabaseError::with_code(
                        "permission denied to create role",
                        "42501",
                    ));
                }
                if self.users.contains_key(name) {
                    return Err(DatabaseError::with_code(
                        format!("role \"{name}\" already exists"),
                        "42710",
                    ));
                }
                self.users.insert(
                    name.clone(),
                    FakeUser {
                        password: password.clone(),
                        createdb: true,
                        login: true,
                        superuser: false,
                    },
                );
            }
            Statement::AlterUserPassword { name, password } => {
                let user = self.users.get_mut(name).ok_or_else(|| undefined_role(name))?;
                user.password = password.clone();
            }
            Statement::AlterUserPermissions { name } => {
                let user = self.users.get_mut(name).ok_or_else(|| undefined_role(name))?;
                user.createdb = true;
                user.login = true;
            }
            Statement::DropUser { name, if_exists } => {
                if !self.users.contains_key(name) {
                    return if *if_exists {
                        Ok(())
                    } else {
                        Err(undefined_role(name))
                    };
                }
                if self.databases.values().any(|db| &db.owner == name) {
                    return Err(DatabaseError::with_code(
                        format!("role \"{name}\" cannot be dropped because some objects depend on it"),
                        "2BP01",
                    ));
                }
                self.users.remove(name);
            }
            Statement::CreateDatabase { name } => {
                if !caller.createdb && !caller.superuser {
                    return Err(DatabaseError::with_code(
                        "permission denied to create database",
                        "42501",
                    ));
                }
                if self.databases.contains_key(name) {
                    return Err(DatabaseError::with_code(
                        format!("database \"{name}\" already exists"),
                        "42P04",
                    ));
                }
                self.next_oid += 1;
                self.databases.insert(
                    name.clone(),
                    FakeDatabase {
                        owner: session_user.to_string(),
                        oid: self.next_oid,
                    },
                );
            }
            Statement::DropDatabase { name, if_exists } => {
                if self.databases.remove(name).is_none() && !*if_exists {
                    return Err(undefined_database(name));
                }
            }
            Statement::AlterDatabaseOwner { name, owner } => {
                if !self.users.contains_key(owner) {
                    return Err(undefined_role(owner));
                }
                let db = self
                    .databases
                    .get_mut(name)
                    .ok_or_else(|| undefined_database(name))?;
                db.owner = owner.clone();
            }
        }
        Ok(())
    }
}

/// An in-memory model of the parts of PostgreSQL the reconciler touches.
#[derive(Clone)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    /// A server with a `root` superuser.
    pub fn new() -> Self {
        let server = Self {
            state: Arc::new(Mutex::new(State::default())),
        };
        server.state.lock().unwrap().users.insert(
            "root".to_string(),
            FakeUser {
                password: ADMIN_PASSWORD.to_string(),
                createdb: true,
                login: true,
                superuser: true,
            },
        );
        server
    }

    pub fn add_user(&self, name: &str, password: &str, createdb: bool, login: bool) {
        self.state.lock().unwrap().users.insert(
            name.to_string(),
            FakeUser {
                password: password.to_string(),
                createdb,
                login,
                superuser: false,
            },
        );
    }

    pub fn add_database(&self, name: &str, owner: &str) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.next_oid += 1;
        let oid = state.next_oid;
        state.databases.insert(
            name.to_string(),
            FakeDatabase {
                owner: owner.to_string(),
                oid,
            },
        );
        oid
    }

    /// Makes every statement with this tag fail with `err`.
    pub fn fail_on(&self, statement_tag: &'static str, err: DatabaseError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(statement_tag, err);
    }

    pub fn user(&self, name: &str) -> Option<FakeUser> {
        self.state.lock().unwrap().users.get(name).cloned()
    }

    pub fn database(&self, name: &str) -> Option<FakeDatabase> {
        self.state.lock().unwrap().databases.get(name).cloned()
    }

    /// Tags of every statement attempted so far, in order.
    pub fn tags(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().executed.iter().map(tag).collect()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().executed.clear();
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

struct FakeSession {
    state: Arc<Mutex<State>>,
    username: String,
    open: bool,
}

#[async_trait]
impl Session for FakeSession {
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<(), DatabaseError> {
        if !self.open {
            return Err(DatabaseError::without_code("session is closed"));
        }
        self.state.lock().unwrap().apply(&self.username, statement)
    }

    async fn close(&mut self) -> std::result::Result<(), DatabaseError> {
        if self.open {
            self.open = false;
            self.state.lock().unwrap().closed += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for FakeServer {
    async fn connect(
        &self,
        _target: &ConnectTarget,
        credentials: &Credentials,
    ) -> std::result::Result<Box<dyn Session>, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        let authenticated = state
            .users
            .get(&credentials.username)
            .is_some_and(|user| user.login && user.password == credentials.password);
        if !authenticated {
            return Err(DatabaseError::with_code(
                format!(
                    "password authentication failed for user \"{}\"",
                    credentials.username
                ),
                "28P01",
            ));
        }
        state.opened += 1;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            username: credentials.username.clone(),
            open: true,
        }))
    }
}

/// Secrets for `root` (admin) and `svc` (user).
pub fn secrets() -> StaticSecretStore {
    StaticSecretStore::new()
        .with_secret("admin", &Credentials::new("root", ADMIN_PASSWORD), "v1")
        .with_secret("svc", &Credentials::new("svc", USER_PASSWORD), "v1")
}

/// `db.local:5432`, database `app`, managed by the `admin` and `svc` secrets.
pub fn spec(policies: Policies) -> ResourceSpec {
    ResourceSpec::new("db.local", "admin", "svc", "app")
        .port(5432)
        .policies(policies)
}

pub const TOKEN: &str = "db.local/app/svc";

pub fn reconciler(server: &FakeServer, secrets: StaticSecretStore) -> Reconciler {
    Reconciler::new(
        Arc::new(secrets),
        Arc::new(server.clone()),
        ProvisionConfig::default(),
    )
}

pub fn create_request(policies: Policies) -> ReconcileRequest {
    ReconcileRequest::new(RequestType::Create, None, spec(policies)).unwrap()
}

pub fn update_request(token: &str, policies: Policies) -> ReconcileRequest {
    ReconcileRequest::new(RequestType::Update, Some(token.to_string()), spec(policies)).unwrap()
}

pub fn delete_request(token: &str, policies: Policies) -> ReconcileRequest {
    ReconcileRequest::new(RequestType::Delete, Some(token.to_string()), spec(policies)).unwrap()
}
