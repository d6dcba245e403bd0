use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{ImportJobStatus, ScheduleInterval, ScheduleMethod};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "import_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub feed_url: String,
    pub status: ImportJobStatus,
    pub schedule_interval: ScheduleInterval,
    pub schedule_method: ScheduleMethod,
    pub batch_size: i32,
    pub total_items: i64,
    pub processed_items: i64,
    pub last_run_at: Option<DateTimeUtc>,
    pub last_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
