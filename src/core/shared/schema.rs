diesel::table! {
    organizations (id) {
        id -> Text,
        name -> Text,
        super_admin_email -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    branches (id) {
        id -> Int4,
        organization_id -> Text,
        name -> Text,
        contact_email -> Nullable<Text>,
    }
}

diesel::table! {
    departments (id) {
        id -> Int4,
        organization_id -> Text,
        name -> Text,
    }
}

diesel::table! {
    categories (id) {
        id -> Int4,
        organization_id -> Text,
        name -> Text,
    }
}

diesel::table! {
    priorities (id) {
        id -> Int4,
        organization_id -> Text,
        name -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        organization_id -> Text,
        email -> Text,
        full_name -> Text,
        role -> Text,
        branch_id -> Nullable<Int4>,
        department_id -> Nullable<Int4>,
        is_active -> Bool,
    }
}

diesel::table! {
    tickets (id) {
        id -> Int4,
        organization_id -> Text,
        subject -> Text,
        description -> Text,
        status -> Text,
        priority_id -> Int4,
        category_id -> Int4,
        branch_id -> Int4,
        department_id -> Int4,
        requester_id -> Int4,
        assigned_to -> Nullable<Int4>,
        due_date -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        version -> Int4,
    }
}

diesel::table! {
    ticket_history (id) {
        id -> Int4,
        ticket_id -> Int4,
        changed_by -> Int4,
        field_changed -> Text,
        old_value -> Nullable<Text>,
        new_value -> Nullable<Text>,
        changed_at -> Timestamptz,
    }
}

diesel::joinable!(ticket_history -> tickets (ticket_id));
diesel::joinable!(ticket_history -> users (changed_by));
diesel::joinable!(branches -> organizations (organization_id));
diesel::joinable!(departments -> organizations (organization_id));
diesel::joinable!(categories -> organizations (organization_id));
diesel::joinable!(priorities -> organizations (organization_id));

diesel::allow_tables_to_appear_in_same_query!(
    organizations,
    branches,
    departments,
    categories,
    priorities,
    users,
    tickets,
    ticket_history,
);
