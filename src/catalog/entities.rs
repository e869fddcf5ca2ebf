//! The bakery schema: one descriptor per entity.

use crate::catalog::types::*;

fn id() -> ColumnDef {
    ColumnDef::new("id", ColumnKind::BigSerial).server_generated()
}

fn created_at(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, ColumnKind::Timestamptz).server_generated()
}

fn restrict(column: &'static str, target: EntityKind, target_column: &'static str) -> ReferenceDef {
    ReferenceDef {
        column,
        target,
        target_column,
        on_delete: OnDelete::Restrict,
    }
}

fn cascade(column: &'static str, target: EntityKind, target_column: &'static str) -> ReferenceDef {
    ReferenceDef {
        column,
        target,
        target_column,
        on_delete: OnDelete::Cascade,
    }
}

const NAME: &[&str] = &["name"];
const NAME_ABBREVIATION: &[&str] = &["name", "abbreviation"];

fn products_embed(via: &'static str) -> EmbedDef {
    EmbedDef {
        name: "products",
        via,
        columns: NAME,
    }
}

fn units_embed(via: &'static str) -> EmbedDef {
    EmbedDef {
        name: "units_of_measure",
        via,
        columns: NAME_ABBREVIATION,
    }
}

fn raw_materials_embed(via: &'static str) -> EmbedDef {
    EmbedDef {
        name: "raw_materials",
        via,
        columns: NAME,
    }
}

pub fn product() -> EntityDef {
    EntityDef {
        kind: EntityKind::Product,
        table: "products",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("name", ColumnKind::Text).required().max_length(200),
            ColumnDef::new("description", ColumnKind::Text),
            created_at("created_at"),
        ],
        references: vec![],
        embeds: vec![],
        natural_keys: vec![],
        default_order: OrderSpec::desc("created_at"),
        search: vec![SearchField::Own("name"), SearchField::Own("description")],
    }
}

pub fn unit_of_measure() -> EntityDef {
    EntityDef {
        kind: EntityKind::UnitOfMeasure,
        table: "units_of_measure",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("name", ColumnKind::Text).required().max_length(100),
            ColumnDef::new("abbreviation", ColumnKind::Text).max_length(20),
            created_at("created_at"),
        ],
        references: vec![],
        embeds: vec![],
        natural_keys: vec![],
        default_order: OrderSpec::desc("created_at"),
        search: vec![SearchField::Own("name"), SearchField::Own("abbreviation")],
    }
}

pub fn raw_material() -> EntityDef {
    EntityDef {
        kind: EntityKind::RawMaterial,
        table: "raw_materials",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("name", ColumnKind::Text).required().max_length(200),
            ColumnDef::new("unit_id", ColumnKind::BigInt).required(),
            created_at("created_at"),
        ],
        references: vec![restrict("unit_id", EntityKind::UnitOfMeasure, "id")],
        embeds: vec![units_embed("unit_id")],
        natural_keys: vec![],
        default_order: OrderSpec::desc("created_at"),
        search: vec![SearchField::Own("name")],
    }
}

pub fn recipe() -> EntityDef {
    EntityDef {
        kind: EntityKind::Recipe,
        table: "recipes",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("product_id", ColumnKind::BigInt).required(),
            ColumnDef::new("raw_material_id", ColumnKind::BigInt).required(),
            ColumnDef::new("required_quantity", ColumnKind::Numeric)
                .required()
                .non_negative(),
            ColumnDef::new("unit_id", ColumnKind::BigInt).required(),
            created_at("created_at"),
        ],
        references: vec![
            restrict("product_id", EntityKind::Product, "id"),
            restrict("raw_material_id", EntityKind::RawMaterial, "id"),
            restrict("unit_id", EntityKind::UnitOfMeasure, "id"),
        ],
        embeds: vec![
            products_embed("product_id"),
            raw_materials_embed("raw_material_id"),
            units_embed("unit_id"),
        ],
        natural_keys: vec![],
        default_order: OrderSpec::desc("created_at"),
        search: vec![
            SearchField::Embedded {
                embed: "products",
                column: "name",
            },
            SearchField::Embedded {
                embed: "raw_materials",
                column: "name",
            },
        ],
    }
}

pub fn purchase() -> EntityDef {
    EntityDef {
        kind: EntityKind::Purchase,
        table: "purchases",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("raw_material_id", ColumnKind::BigInt).required(),
            ColumnDef::new("quantity", ColumnKind::Numeric).required().non_negative(),
            ColumnDef::new("total_cost", ColumnKind::Numeric).required().non_negative(),
            ColumnDef::new("purchase_date", ColumnKind::Date).required(),
            created_at("created_at"),
        ],
        references: vec![restrict("raw_material_id", EntityKind::RawMaterial, "id")],
        embeds: vec![raw_materials_embed("raw_material_id")],
        natural_keys: vec![],
        default_order: OrderSpec::desc("purchase_date"),
        search: vec![SearchField::Embedded {
            embed: "raw_materials",
            column: "name",
        }],
    }
}

pub fn production() -> EntityDef {
    EntityDef {
        kind: EntityKind::Production,
        table: "productions",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("product_id", ColumnKind::BigInt).required(),
            ColumnDef::new("quantity_produced", ColumnKind::Numeric)
                .required()
                .non_negative(),
            ColumnDef::new("production_date", ColumnKind::Date).required(),
            ColumnDef::new("unit_production_cost", ColumnKind::Numeric).non_negative(),
            created_at("created_at"),
        ],
        references: vec![restrict("product_id", EntityKind::Product, "id")],
        embeds: vec![products_embed("product_id")],
        natural_keys: vec![],
        default_order: OrderSpec::desc("created_at"),
        search: vec![SearchField::Embedded {
            embed: "products",
            column: "name",
        }],
    }
}

pub fn sale() -> EntityDef {
    EntityDef {
        kind: EntityKind::Sale,
        table: "sales",
        pk: "id",
        created_column: "created_at",
        columns: vec![
            id(),
            ColumnDef::new("product_id", ColumnKind::BigInt).required(),
            ColumnDef::new("quantity_sold", ColumnKind::Numeric)
                .required()
                .non_negative(),
            ColumnDef::new("unit_sale_price", ColumnKind::Numeric)
                .required()
                .non_negative(),
            ColumnDef::new("sale_date", ColumnKind::Date).required(),
            ColumnDef::new("weighted_average_cost_at_sale", ColumnKind::Numeric).non_negative(),
            created_at("created_at"),
        ],
        references: vec![restrict("product_id", EntityKind::Product, "id")],
        embeds: vec![products_embed("product_id")],
        natural_keys: vec![],
        default_order: OrderSpec::desc("sale_date"),
        search: vec![SearchField::Embedded {
            embed: "products",
            column: "name",
        }],
    }
}

pub fn user() -> EntityDef {
    EntityDef {
        kind: EntityKind::User,
        table: "user",
        pk: "user_id",
        created_column: "user_created_at",
        columns: vec![
            ColumnDef::new("user_id", ColumnKind::Uuid).uuid_if_absent(),
            ColumnDef::new("user_name", ColumnKind::Text)
                .required()
                .unique()
                .max_length(100),
            ColumnDef::new("user_email", ColumnKind::Text)
                .required()
                .format("email"),
            ColumnDef::new("user_state", ColumnKind::Text).read_only(),
            created_at("user_created_at"),
        ],
        references: vec![],
        embeds: vec![],
        natural_keys: vec![],
        default_order: OrderSpec::desc("user_created_at"),
        search: vec![SearchField::Own("user_name"), SearchField::Own("user_email")],
    }
}

pub fn role() -> EntityDef {
    EntityDef {
        kind: EntityKind::Role,
        table: "rol",
        pk: "rol_id",
        created_column: "rol_created_at",
        columns: vec![
            ColumnDef::new("rol_id", ColumnKind::BigSerial).server_generated(),
            ColumnDef::new("rol_id_ext", ColumnKind::Text)
                .unique()
                .uuid_if_absent(),
            ColumnDef::new("rol_name", ColumnKind::Text).required().max_length(100),
            ColumnDef::new("rol_state", ColumnKind::Text).read_only(),
            created_at("rol_created_at"),
        ],
        references: vec![],
        embeds: vec![],
        natural_keys: vec![],
        default_order: OrderSpec::desc("rol_created_at"),
        search: vec![SearchField::Own("rol_name")],
    }
}

pub fn user_role() -> EntityDef {
    EntityDef {
        kind: EntityKind::UserRole,
        table: "user_rol",
        pk: "userrol_id",
        created_column: "userrol_created_at",
        columns: vec![
            ColumnDef::new("userrol_id", ColumnKind::BigSerial).server_generated(),
            ColumnDef::new("user_id", ColumnKind::Uuid).required(),
            ColumnDef::new("rol_id", ColumnKind::BigInt).required(),
            ColumnDef::new("userrol_state", ColumnKind::Text).read_only(),
            created_at("userrol_created_at"),
        ],
        references: vec![
            cascade("user_id", EntityKind::User, "user_id"),
            cascade("rol_id", EntityKind::Role, "rol_id"),
        ],
        embeds: vec![
            EmbedDef {
                name: "user",
                via: "user_id",
                columns: &["user_name"],
            },
            EmbedDef {
                name: "rol",
                via: "rol_id",
                columns: &["rol_name", "rol_id_ext"],
            },
        ],
        natural_keys: vec![
            NaturalKeyDef {
                input: "user_name",
                column: "user_id",
                target: EntityKind::User,
                target_column: "user_name",
            },
            NaturalKeyDef {
                input: "rol_idext",
                column: "rol_id",
                target: EntityKind::Role,
                target_column: "rol_id_ext",
            },
        ],
        default_order: OrderSpec::desc("userrol_created_at"),
        search: vec![
            SearchField::Embedded {
                embed: "user",
                column: "user_name",
            },
            SearchField::Embedded {
                embed: "rol",
                column: "rol_name",
            },
        ],
    }
}

pub fn definition(kind: EntityKind) -> EntityDef {
    match kind {
        EntityKind::Product => product(),
        EntityKind::UnitOfMeasure => unit_of_measure(),
        EntityKind::RawMaterial => raw_material(),
        EntityKind::Recipe => recipe(),
        EntityKind::Purchase => purchase(),
        EntityKind::Production => production(),
        EntityKind::Sale => sale(),
        EntityKind::User => user(),
        EntityKind::Role => role(),
        EntityKind::UserRole => user_role(),
    }
}
