#[allow(warnings, clippy::all)]
pub(crate) mod short_link {
    use sea_orm::entity::prelude::*;

    #[sea_orm::model]
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "short_links")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub short_id: String,
        #[sea_orm(unique)]
        pub id: Uuid,
        #[sea_orm(column_type = "Text")]
        pub long_url: String,
        pub created_at: TimeDateTimeWithTimeZone,
    }

    impl ActiveModelBehavior for ActiveModel {}
}
