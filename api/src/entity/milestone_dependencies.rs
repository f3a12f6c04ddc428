use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "milestone_dependencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub dependent_milestone_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub prerequisite_milestone_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
