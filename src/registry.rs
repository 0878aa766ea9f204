//! Record Type Registry
//!
//! Statically declared record types and their inheritance links. Every type
//! descends from the base type [`BASE_TYPE`]; a type without a `parent` sits
//! directly under it. Shared columns, `LastEdited` included, live in the table
//! of the topmost ancestor, which is why only those ancestors get queried.

use crate::store::ChangedRow;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use validator::Validate;

/// Root of the type hierarchy. Never scanned itself.
pub const BASE_TYPE: &str = "DataObject";

/// Modification timestamp column shared by every record table
pub const LAST_EDITED: &str = "LastEdited";

/// Identifier column
pub const ID_COLUMN: &str = "ID";

/// Table name suffixes added by the versioning layer
pub const VERSIONED_SUFFIXES: [&str; 3] = ["_versions", "_Versions", "_Live"];

const DEFAULT_SKIPPED: [&str; 3] = ["RememberLoginHash", "LoginSession", "LoginAttempt"];

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to load registry: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid type definition: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Type '{0}' is declared more than once")]
    Duplicate(String),

    #[error("Type name '{0}' is reserved for the base type")]
    Reserved(String),

    #[error("Type '{child}' names unknown parent '{parent}'")]
    UnknownParent { child: String, parent: String },

    #[error("Inheritance cycle through type '{0}'")]
    Cycle(String),
}

/// Type definition as written in the registry file
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordTypeDef {
    #[validate(length(min = 1, message = "Type name must not be empty"))]
    pub name: String,

    /// Direct supertype; `None` means directly under the base type
    #[serde(default)]
    pub parent: Option<String>,

    /// Storage table, defaults to the type name
    #[serde(default)]
    pub table: Option<String>,

    #[serde(default = "default_title_field")]
    #[validate(length(min = 1))]
    pub title_field: String,

    /// CMS edit URL template, `{id}` is replaced with the record ID
    #[serde(default)]
    pub edit_link: Option<String>,

    /// Public URL template, `{id}` is replaced with the record ID
    #[serde(default)]
    pub public_link: Option<String>,
}

fn default_title_field() -> String {
    "Title".to_string()
}

/// Skip-list applied to both the type scan and the table scan
#[derive(Debug, Clone, PartialEq)]
pub struct SkipList {
    pub skip_types: HashSet<String>,
    pub skip_tables: HashSet<String>,
}

fn default_skipped() -> HashSet<String> {
    DEFAULT_SKIPPED.iter().map(|s| s.to_string()).collect()
}

impl Default for SkipList {
    fn default() -> Self {
        Self {
            skip_types: default_skipped(),
            skip_tables: default_skipped(),
        }
    }
}

impl SkipList {
    pub fn skips_type(&self, name: &str) -> bool {
        self.skip_types.contains(name)
    }

    pub fn skips_table(&self, name: &str) -> bool {
        self.skip_tables.contains(name)
    }
}

/// A record that can be edited in the CMS
pub trait EditLinkProvider: Send + Sync {
    fn cms_edit_link(&self, id: &str) -> String;
}

/// A record with a public page
pub trait PublicLinkProvider: Send + Sync {
    fn link(&self, id: &str) -> String;
}

/// URL template with an `{id}` placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTemplate(String);

impl LinkTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    fn render(&self, id: &str) -> String {
        self.0.replace("{id}", id)
    }
}

impl EditLinkProvider for LinkTemplate {
    fn cms_edit_link(&self, id: &str) -> String {
        self.render(id)
    }
}

impl PublicLinkProvider for LinkTemplate {
    fn link(&self, id: &str) -> String {
        self.render(id)
    }
}

/// One fetched record, ready for the report
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInstance {
    pub id: String,
    pub title: String,
    pub last_edited: String,
    pub cms_edit_link: Option<String>,
    pub link: Option<String>,
}

/// A resolved record type
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: String,
    pub parent: Option<String>,
    pub table: String,
    pub title_field: String,
    edit_link: Option<LinkTemplate>,
    public_link: Option<LinkTemplate>,
}

impl RecordType {
    fn from_def(def: RecordTypeDef) -> Self {
        Self {
            table: def.table.unwrap_or_else(|| def.name.clone()),
            name: def.name,
            parent: def.parent,
            title_field: def.title_field,
            edit_link: def.edit_link.map(LinkTemplate::new),
            public_link: def.public_link.map(LinkTemplate::new),
        }
    }

    /// Edit link capability, if the type has one
    pub fn edit_links(&self) -> Option<&dyn EditLinkProvider> {
        self.edit_link.as_ref().map(|t| t as &dyn EditLinkProvider)
    }

    /// Public link capability, if the type has one
    pub fn public_links(&self) -> Option<&dyn PublicLinkProvider> {
        self.public_link.as_ref().map(|t| t as &dyn PublicLinkProvider)
    }

    /// Build a report instance from a raw row of this type's table
    pub fn instance(&self, row: &ChangedRow) -> RecordInstance {
        let id = row.text(ID_COLUMN).unwrap_or_default();
        let title = row
            .text(&self.title_field)
            .or_else(|| row.text("Name"))
            .unwrap_or_else(|| format!("#{}", id));

        RecordInstance {
            cms_edit_link: self.edit_links().map(|p| p.cms_edit_link(&id)),
            link: self.public_links().map(|p| p.link(&id)),
            title,
            last_edited: row.last_edited.clone(),
            id,
        }
    }
}

/// Registry file contents
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_skipped")]
    skip_types: HashSet<String>,
    #[serde(default = "default_skipped")]
    skip_tables: HashSet<String>,
    #[serde(default)]
    types: Vec<RecordTypeDef>,
}

/// All record types known to the reporter, in declaration order
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<RecordType>,
    index: HashMap<String, usize>,
}

impl TypeRegistry {
    /// Load the registry and skip-list from a TOML/YAML/JSON file
    pub fn load(path: &Path) -> Result<(Self, SkipList), RegistryError> {
        let file: RegistryFile = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;

        let registry = Self::from_definitions(file.types)?;
        debug!(
            "Loaded {} record types from {}",
            registry.types.len(),
            path.display()
        );
        let skip = SkipList {
            skip_types: file.skip_types,
            skip_tables: file.skip_tables,
        };
        Ok((registry, skip))
    }

    /// Build and validate a registry from type definitions
    pub fn from_definitions(defs: Vec<RecordTypeDef>) -> Result<Self, RegistryError> {
        let mut types = Vec::with_capacity(defs.len());
        let mut index = HashMap::new();

        for def in defs {
            def.validate()?;
            if def.name == BASE_TYPE {
                return Err(RegistryError::Reserved(def.name));
            }
            if index.insert(def.name.clone(), types.len()).is_some() {
                return Err(RegistryError::Duplicate(def.name));
            }
            types.push(RecordType::from_def(def));
        }

        let registry = Self { types, index };
        registry.check_hierarchy()?;
        Ok(registry)
    }

    fn check_hierarchy(&self) -> Result<(), RegistryError> {
        for ty in &self.types {
            let mut current = ty;
            let mut steps = 0;
            while let Some(parent) = current.parent.as_deref().filter(|p| *p != BASE_TYPE) {
                current = self.get(parent).ok_or_else(|| RegistryError::UnknownParent {
                    child: current.name.clone(),
                    parent: parent.to_string(),
                })?;
                steps += 1;
                if steps > self.types.len() {
                    return Err(RegistryError::Cycle(ty.name.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// Every subtype of the base type
    pub fn subtypes(&self) -> impl Iterator<Item = &RecordType> {
        self.types.iter()
    }

    pub fn table_name(&self, name: &str) -> Option<&str> {
        self.get(name).map(|t| t.table.as_str())
    }

    /// Base table names of every mapped type
    pub fn table_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.table.as_str()).collect()
    }

    /// Shallowest type under the base type in `name`'s ancestor chain
    pub fn topmost_ancestor(&self, name: &str) -> Option<&RecordType> {
        let mut current = self.get(name)?;
        while let Some(parent) = current.parent.as_deref().filter(|p| *p != BASE_TYPE) {
            current = self.get(parent)?;
        }
        Some(current)
    }

    /// Tables owned by a record type, versioned and live copies included.
    /// The base type's own table counts as owned.
    pub fn owned_tables(&self) -> HashSet<String> {
        let mut owned = HashSet::from([BASE_TYPE.to_string()]);
        for table in self.table_names() {
            for suffix in VERSIONED_SUFFIXES {
                owned.insert(format!("{}{}", table, suffix));
            }
            owned.insert(table.to_string());
        }
        owned
    }

    /// Deduplicated topmost ancestors of every type not on the skip-list
    pub fn types_to_check(&self, skip: &SkipList) -> Vec<&RecordType> {
        let mut seen = HashSet::new();
        self.subtypes()
            .filter(|t| !skip.skips_type(&t.name))
            .filter_map(|t| self.topmost_ancestor(&t.name))
            .filter(|a| !skip.skips_type(&a.name))
            .filter(|a| seen.insert(a.name.clone()))
            .collect()
    }
}
