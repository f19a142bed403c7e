//! Execution context: active database/tenant selector
//!
//! Every store call is parameterized by a context carrying the tenant the
//! operation targets. Cross-tenant operations (e.g. farm-wide searches)
//! must save and restore the selector around each switch.

/// Tenant selector plus the known tenant list of the farm.
#[derive(Debug, Clone)]
pub struct StoreContext {
    database: String,
    main_database: String,
    virtual_databases: Vec<String>,
}

impl StoreContext {
    pub fn new(main_database: impl Into<String>) -> Self {
        let main = main_database.into();
        Self {
            database: main.clone(),
            main_database: main,
            virtual_databases: Vec::new(),
        }
    }

    /// Currently selected database.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn set_database(&mut self, database: impl Into<String>) {
        self.database = database.into();
    }

    pub fn main_database(&self) -> &str {
        &self.main_database
    }

    /// Declare an additional tenant hosted by this farm.
    pub fn add_virtual_database(&mut self, database: impl Into<String>) {
        let db = database.into();
        if db != self.main_database && !self.virtual_databases.contains(&db) {
            self.virtual_databases.push(db);
        }
    }

    /// All tenants, main first, no duplicates.
    pub fn all_databases(&self) -> Vec<String> {
        let mut all = vec![self.main_database.clone()];
        all.extend(self.virtual_databases.iter().cloned());
        all
    }
}
