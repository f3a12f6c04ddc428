use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub author_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub is_edited: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::comment_mentions::Entity")]
    CommentMentions,
}

impl Related<super::comment_mentions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommentMentions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
