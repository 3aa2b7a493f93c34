// src/catalog/tables.rs

use super::{
    branches, Derivation, Reference, Requirement, Source, StoreErrorPolicy, TableDescriptor,
};
use crate::decode::{
    ColumnRule,
    Coercion::{self, *},
    JsonFallback,
};

/// Slug of the branch every order without an explicit branch is assigned to.
pub const DEFAULT_BRANCH_SLUG: &str = "san-joaquin";

const fn col(name: &'static str, coercion: Coercion) -> ColumnRule {
    ColumnRule::new(name, coercion)
}

const CATEGORIES: &[ColumnRule] = &[
    col("id", Integer),
    col("name", Text),
    col("description", NullableText),
    col("image_url", NullableText),
    col("display_order", NullableInteger),
    col("is_active", Bool),
    col("created_at", NullableText),
];

const CLIENTS: &[ColumnRule] = &[
    col("id", Integer),
    col("name", Text),
    col("email", NullableText),
    col("phone", NullableText),
    col("address", NullableText),
    col("notes", NullableText),
    col("total_orders", NullableInteger),
    col("total_spent", NullableFloat),
    col("created_at", NullableText),
];

const BUSINESS_INFO: &[ColumnRule] = &[
    col("id", Integer),
    col("name", Text),
    col("description", NullableText),
    col("logo_url", NullableText),
    col("phone", NullableText),
    col("email", NullableText),
    col("address", NullableText),
    col("opening_hours", Json(JsonFallback::EmptyObject)),
    col("social_links", Json(JsonFallback::EmptyObject)),
    col("updated_at", NullableText),
];

const BRANCHES: &[ColumnRule] = &[
    col("slug", Text),
    col("name", Text),
    col("address", Text),
    col("phone", NullableText),
    col("maps_url", NullableText),
    col("whatsapp_url", NullableText),
    col("instagram_url", NullableText),
    col("is_active", Bool),
];

const ORDERS: &[ColumnRule] = &[
    col("id", Integer),
    col("client_id", NullableInteger),
    col("customer_name", Text),
    col("customer_phone", NullableText),
    col("delivery_address", NullableText),
    col("items", Json(JsonFallback::EmptyList)),
    col("subtotal", Float),
    col("delivery_fee", NullableFloat),
    col("total", Float),
    col("status", NullableText),
    col("payment_method", NullableText),
    col("notes", NullableText),
    col("branch_id", NullableInteger),
    col("created_at", NullableText),
];

const PRODUCTS: &[ColumnRule] = &[
    col("id", Integer),
    col("category_id", NullableInteger),
    col("name", Text),
    col("description", NullableText),
    col("price", Float),
    col("image_url", NullableText),
    col("is_available", Bool),
    col("is_featured", Bool),
    col("created_at", NullableText),
];

/// Admin ids come from the external identity provider, hence text.
const ADMIN_USERS: &[ColumnRule] = &[
    col("id", Text),
    col("email", Text),
    col("full_name", NullableText),
    col("role", NullableText),
    col("is_active", Bool),
    col("created_at", NullableText),
];

const INVENTORY: &[ColumnRule] = &[
    col("id", Integer),
    col("product_id", Integer),
    col("quantity", Integer),
    col("min_stock", NullableInteger),
    col("unit", NullableText),
    col("updated_at", NullableText),
];

const DEFAULT_BRANCH: Reference = Reference {
    table: "branches",
    key_column: "slug",
    key: DEFAULT_BRANCH_SLUG,
    id_column: "id",
};

/// Load order. `branches` must precede `orders`.
pub static TABLES: &[TableDescriptor] = &[
    TableDescriptor {
        name: "categories",
        source: Source::Csv("categories.csv"),
        policy: CATEGORIES,
        derivations: &[],
        conflict_key: "id",
        requirement: Requirement::Required,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &[],
    },
    TableDescriptor {
        name: "clients",
        source: Source::Csv("clients.csv"),
        policy: CLIENTS,
        derivations: &[],
        conflict_key: "id",
        requirement: Requirement::Required,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &[],
    },
    TableDescriptor {
        name: "business_info",
        source: Source::Csv("business_info.csv"),
        policy: BUSINESS_INFO,
        derivations: &[],
        conflict_key: "id",
        requirement: Requirement::Optional,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &[],
    },
    TableDescriptor {
        name: "branches",
        source: Source::Embedded(branches::seed_rows),
        policy: BRANCHES,
        derivations: &[],
        conflict_key: "slug",
        requirement: Requirement::Required,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &[],
    },
    TableDescriptor {
        name: "orders",
        source: Source::Csv("orders.csv"),
        policy: ORDERS,
        derivations: &[
            Derivation::FillEmpty {
                column: "status",
                value: "pending",
            },
            Derivation::StampReference {
                column: "branch_id",
                reference: DEFAULT_BRANCH,
            },
        ],
        conflict_key: "id",
        requirement: Requirement::Required,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &["clients", "branches"],
    },
    TableDescriptor {
        name: "products",
        source: Source::Csv("products.csv"),
        policy: PRODUCTS,
        derivations: &[],
        conflict_key: "id",
        requirement: Requirement::Required,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &["categories"],
    },
    // collides with accounts the identity provider already created
    TableDescriptor {
        name: "admin_users",
        source: Source::Csv("admin_users.csv"),
        policy: ADMIN_USERS,
        derivations: &[Derivation::FillEmpty {
            column: "role",
            value: "admin",
        }],
        conflict_key: "id",
        requirement: Requirement::Optional,
        on_store_error: StoreErrorPolicy::Warn,
        depends_on: &[],
    },
    TableDescriptor {
        name: "inventory",
        source: Source::Csv("inventory.csv"),
        policy: INVENTORY,
        derivations: &[],
        conflict_key: "id",
        requirement: Requirement::Optional,
        on_store_error: StoreErrorPolicy::Fatal,
        depends_on: &["products"],
    },
];

/// Look up a descriptor by table name.
pub fn find(name: &str) -> Option<&'static TableDescriptor> {
    TABLES.iter().find(|t| t.name == name)
}
