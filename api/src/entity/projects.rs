use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub budget: f64,
    pub actual_cost: f64,
    pub status: String,
    pub manager_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_team_members::Entity")]
    ProjectTeamMembers,
    #[sea_orm(has_many = "super::tasks::Entity")]
    Tasks,
}

impl Related<super::project_team_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectTeamMembers.def()
    }
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
