//! Built-in resource schemas

use super::{FieldRule, Schema};

pub fn leave() -> Schema {
    Schema::object(
        "leaves",
        vec![
            FieldRule::string("status").required(),
            FieldRule::date("start_date"),
            FieldRule::date("end_date"),
            FieldRule::string("reason").nullable(),
            FieldRule::string("user_id").nullable(),
        ],
    )
}

pub fn attendance() -> Schema {
    Schema::object(
        "attendances",
        vec![
            FieldRule::integer("hours_worked").required(),
            FieldRule::date("date").required(),
            FieldRule::string("user_id").nullable(),
        ],
    )
}

pub fn user() -> Schema {
    Schema::object(
        "users",
        vec![
            FieldRule::string("email").required(),
            FieldRule::string("first_name").nullable(),
            FieldRule::string("last_name").nullable(),
            FieldRule::string("subject").required(),
        ],
    )
}
