// Kept in sync with `db::SCHEMA_SQL`.

diesel::table! {
    tasks (id) {
        id -> Text,
        ext_id -> Text,
        status -> Text,
        workflow -> Text,
        current_step -> Nullable<Text>,
        context -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    thread_logs (id) {
        id -> Text,
        ext_id -> Text,
        input -> Nullable<Text>,
        response -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, thread_logs,);
