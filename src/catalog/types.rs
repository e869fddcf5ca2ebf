//! Entity descriptors: tables, columns, references, embeds and ordering for runtime use.

use std::fmt;

/// The ten record kinds the console manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Product,
    UnitOfMeasure,
    RawMaterial,
    Recipe,
    Purchase,
    Production,
    Sale,
    User,
    Role,
    UserRole,
}

impl EntityKind {
    /// Declaration order; referenced entities come before the entities that reference them.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Product,
        EntityKind::UnitOfMeasure,
        EntityKind::RawMaterial,
        EntityKind::Recipe,
        EntityKind::Purchase,
        EntityKind::Production,
        EntityKind::Sale,
        EntityKind::User,
        EntityKind::Role,
        EntityKind::UserRole,
    ];

    /// Route name of the entity list (`/products`, `/raw-materials`, ...) without the slash.
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::UnitOfMeasure => "units",
            EntityKind::RawMaterial => "raw-materials",
            EntityKind::Recipe => "recipes",
            EntityKind::Purchase => "purchases",
            EntityKind::Production => "productions",
            EntityKind::Sale => "sales",
            EntityKind::User => "users",
            EntityKind::Role => "roles",
            EntityKind::UserRole => "user-roles",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Storage kind of a column. Drives SQL casts, request value checks and id parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    BigSerial,
    BigInt,
    Text,
    Numeric,
    Date,
    Timestamptz,
    Uuid,
}

impl ColumnKind {
    /// PostgreSQL type used for parameter casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnKind::BigSerial | ColumnKind::BigInt => "int8",
            ColumnKind::Text => "text",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Date => "date",
            ColumnKind::Timestamptz => "timestamptz",
            ColumnKind::Uuid => "uuid",
        }
    }

    /// PostgreSQL type used in CREATE TABLE.
    pub fn ddl_type(&self) -> &'static str {
        match self {
            ColumnKind::BigSerial => "BIGSERIAL",
            ColumnKind::BigInt => "BIGINT",
            ColumnKind::Text => "TEXT",
            ColumnKind::Numeric => "NUMERIC",
            ColumnKind::Date => "DATE",
            ColumnKind::Timestamptz => "TIMESTAMPTZ",
            ColumnKind::Uuid => "UUID",
        }
    }
}

/// Per-column request rules.
#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub format: Option<&'static str>,
    pub max_length: Option<u32>,
    pub min_length: Option<u32>,
    pub pattern: Option<&'static str>,
    pub allowed: Option<Vec<serde_json::Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Value the service fills in when a create omits the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generated {
    /// Server assigns it (serial key, creation timestamp); never writable.
    Server,
    /// Service generates a random UUID when absent; the caller may supply one.
    UuidIfAbsent,
}

#[derive(Clone, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    /// Read-only columns exist in the schema but are rejected in create and patch bodies.
    pub writable: bool,
    pub unique: bool,
    pub generated: Option<Generated>,
    pub rule: ValidationRule,
}

impl ColumnDef {
    pub fn new(name: &'static str, kind: ColumnKind) -> Self {
        ColumnDef {
            name,
            kind,
            required: false,
            writable: true,
            unique: false,
            generated: None,
            rule: ValidationRule::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn server_generated(mut self) -> Self {
        self.generated = Some(Generated::Server);
        self.writable = false;
        self
    }

    pub fn uuid_if_absent(mut self) -> Self {
        self.generated = Some(Generated::UuidIfAbsent);
        self
    }

    pub fn non_negative(mut self) -> Self {
        self.rule.minimum = Some(0.0);
        self
    }

    pub fn format(mut self, format: &'static str) -> Self {
        self.rule.format = Some(format);
        self
    }

    pub fn max_length(mut self, max: u32) -> Self {
        self.rule.max_length = Some(max);
        self
    }
}

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDelete {
    Restrict,
    Cascade,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Restrict => "RESTRICT",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

/// Foreign key: `column` holds a value of `target.target_column`.
#[derive(Clone, Debug)]
pub struct ReferenceDef {
    pub column: &'static str,
    pub target: EntityKind,
    pub target_column: &'static str,
    pub on_delete: OnDelete,
}

/// Read-time join attaching selected columns of the referenced row under `name`.
#[derive(Clone, Debug)]
pub struct EmbedDef {
    /// Key in the response row; the related table name.
    pub name: &'static str,
    /// Our column; must be the column of one of the entity's references.
    pub via: &'static str,
    pub columns: &'static [&'static str],
}

/// Create-time alias: `input` names a natural key of `target` that resolves into `column`.
#[derive(Clone, Debug)]
pub struct NaturalKeyDef {
    pub input: &'static str,
    pub column: &'static str,
    pub target: EntityKind,
    pub target_column: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn desc(column: &str) -> Self {
        OrderSpec {
            column: column.to_string(),
            direction: SortDirection::Desc,
        }
    }

    pub fn asc(column: &str) -> Self {
        OrderSpec {
            column: column.to_string(),
            direction: SortDirection::Asc,
        }
    }
}

/// Column matched by a list search term.
#[derive(Clone, Debug)]
pub enum SearchField {
    Own(&'static str),
    /// A column of an embedded row, by embed name.
    Embedded { embed: &'static str, column: &'static str },
}

#[derive(Clone, Debug)]
pub struct EntityDef {
    pub kind: EntityKind,
    pub table: &'static str,
    pub pk: &'static str,
    pub created_column: &'static str,
    pub columns: Vec<ColumnDef>,
    pub references: Vec<ReferenceDef>,
    pub embeds: Vec<EmbedDef>,
    pub natural_keys: Vec<NaturalKeyDef>,
    pub default_order: OrderSpec,
    pub search: Vec<SearchField>,
}

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_column(&self) -> &ColumnDef {
        self.columns
            .iter()
            .find(|c| c.name == self.pk)
            .unwrap_or(&self.columns[0])
    }

    pub fn reference(&self, column: &str) -> Option<&ReferenceDef> {
        self.references.iter().find(|r| r.column == column)
    }

    pub fn embed(&self, name: &str) -> Option<&EmbedDef> {
        self.embeds.iter().find(|e| e.name == name)
    }

    pub fn natural_key(&self, input: &str) -> Option<&NaturalKeyDef> {
        self.natural_keys.iter().find(|n| n.input == input)
    }
}
