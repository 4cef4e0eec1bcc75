diesel::table! {
    documents (id) {
        id -> Integer,
        title -> Text,
        content -> Text,
        markdown -> Nullable<Text>,
        metadata -> Nullable<Text>,
        folder -> Nullable<Text>,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    chats (id) {
        id -> Integer,
        document_id -> Integer,
        title -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    messages (id) {
        id -> Integer,
        chat_id -> Integer,
        role -> Text,
        content -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    chunks (id) {
        id -> Integer,
        document_id -> Integer,
        chunk_index -> Integer,
        content -> Text,
        embedding -> Nullable<Binary>,
        metadata -> Nullable<Text>,
    }
}

diesel::joinable!(chats -> documents (document_id));
diesel::joinable!(messages -> chats (chat_id));
diesel::joinable!(chunks -> documents (document_id));

diesel::allow_tables_to_appear_in_same_query!(documents, chats, messages, chunks);
