// Esquema Diesel de las tablas de catálogo (SQLite).
// Tablas: categories, items
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    categories (id) {
        id -> BigInt,
        name -> Text,
        is_deleted -> Bool,
    }
}
diesel::table! {
    items (id) {
        id -> BigInt,
        category_id -> Nullable<BigInt>,
        name -> Text,
        is_deleted -> Bool,
        deleted_at -> Nullable<BigInt>,
        version -> BigInt,
    }
}
diesel::joinable!(items -> categories (category_id));
allow_tables_to_appear_in_same_query!(categories, items);
