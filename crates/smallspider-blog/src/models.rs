//! Blog models: Post, Category and Tag.
//!
//! The admin stores every record as a JSON object; the structs here are the
//! typed view of those objects, and [`Record::fields_schema`] is the schema
//! the admin validates forms against.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallspider_admin::checks::USER_MODEL;
use smallspider_admin::db::AdminDbExecutor;
use smallspider_admin::model_admin::{Choice, FieldSchema, FieldType};
use smallspider_core::{SpiderError, SpiderResult};

/// Publication state shared by all blog models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum Status {
    /// Visible.
    Normal,
    /// Soft-deleted.
    Deleted,
    /// Not yet published. Posts only.
    Draft,
}

impl Status {
    /// The stored integer.
    pub const fn code(self) -> u64 {
        match self {
            Self::Deleted => 0,
            Self::Normal => 1,
            Self::Draft => 2,
        }
    }

    /// The label shown in the admin.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "正常",
            Self::Deleted => "删除",
            Self::Draft => "草稿",
        }
    }

    fn choice(self) -> Choice {
        Choice::new(self.code(), self.label())
    }
}

impl TryFrom<u64> for Status {
    type Error = String;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Deleted),
            1 => Ok(Self::Normal),
            2 => Ok(Self::Draft),
            other => Err(format!("unknown status {other}")),
        }
    }
}

impl From<Status> for u64 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

/// A blog model stored by the admin.
pub trait Record: Serialize + DeserializeOwned {
    /// The model name in lowercase.
    const MODEL_NAME: &'static str;

    /// The application label.
    const APP_LABEL: &'static str = "blog";

    /// `"app_label.model_name"`.
    fn model_key() -> String {
        format!("{}.{}", Self::APP_LABEL, Self::MODEL_NAME)
    }

    /// The stored fields, in form order.
    fn fields_schema() -> Vec<FieldSchema>;

    /// Reads a stored object.
    fn from_json(value: Value) -> SpiderResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            SpiderError::Internal(format!("malformed {} record: {e}", Self::model_key()))
        })
    }
}

/// Loads every stored object of a model.
pub async fn load_all<R: Record>(db: &dyn AdminDbExecutor) -> SpiderResult<Vec<R>> {
    db.all_objects(&R::model_key())
        .await?
        .into_iter()
        .map(R::from_json)
        .collect()
}

fn owner_field() -> FieldSchema {
    FieldSchema::new("owner", FieldType::ForeignKey)
        .relation(USER_MODEL)
        .label("作者")
}

fn created_time_field() -> FieldSchema {
    FieldSchema::new("created_time", FieldType::DateTimeField)
        .auto_now_add()
        .label("创建时间")
}

/// A post category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Primary key.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Normal or deleted.
    pub status: Status,
    /// Whether the category appears in the navigation bar.
    pub is_nav: bool,
    /// The user who last saved it.
    pub owner: u64,
    /// Creation time.
    pub created_time: DateTime<Utc>,
}

impl Record for Category {
    const MODEL_NAME: &'static str = "category";

    fn fields_schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("name", FieldType::CharField)
                .max_length(50)
                .label("名称"),
            FieldSchema::new("status", FieldType::PositiveIntegerField)
                .choices(vec![Status::Normal.choice(), Status::Deleted.choice()])
                .default_value(Status::Normal.code())
                .label("状态"),
            FieldSchema::new("is_nav", FieldType::BooleanField)
                .optional()
                .default_value(false)
                .label("是否为导航"),
            owner_field(),
            created_time_field(),
        ]
    }
}

/// A post tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Primary key.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Normal or deleted.
    pub status: Status,
    /// The user who last saved it.
    pub owner: u64,
    /// Creation time.
    pub created_time: DateTime<Utc>,
}

impl Record for Tag {
    const MODEL_NAME: &'static str = "tag";

    fn fields_schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("name", FieldType::CharField)
                .max_length(10)
                .label("名称"),
            FieldSchema::new("status", FieldType::PositiveIntegerField)
                .choices(vec![Status::Normal.choice(), Status::Deleted.choice()])
                .default_value(Status::Normal.code())
                .label("状态"),
            owner_field(),
            created_time_field(),
        ]
    }
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Primary key.
    pub id: u64,
    /// Headline.
    pub title: String,
    /// Summary shown in listings.
    #[serde(default)]
    pub desc: String,
    /// Markdown body.
    #[serde(default)]
    pub content: String,
    /// Normal, deleted or draft.
    pub status: Status,
    /// The category it is filed under.
    pub category: u64,
    /// Attached tags.
    #[serde(default)]
    pub tags: Vec<u64>,
    /// The user who last saved it.
    pub owner: u64,
    /// Creation time.
    pub created_time: DateTime<Utc>,
}

impl Record for Post {
    const MODEL_NAME: &'static str = "post";

    fn fields_schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("title", FieldType::CharField)
                .max_length(255)
                .label("标题"),
            FieldSchema::new("desc", FieldType::CharField)
                .max_length(1024)
                .optional()
                .widget("textarea")
                .label("摘要"),
            FieldSchema::new("content", FieldType::TextField)
                .label("正文")
                .help_text("正文必须为MarkDown格式"),
            FieldSchema::new("status", FieldType::PositiveIntegerField)
                .choices(vec![
                    Status::Normal.choice(),
                    Status::Deleted.choice(),
                    Status::Draft.choice(),
                ])
                .default_value(Status::Normal.code())
                .label("状态"),
            FieldSchema::new("category", FieldType::ForeignKey)
                .relation(Category::model_key())
                .label("分类"),
            FieldSchema::new("tags", FieldType::ManyToManyField)
                .relation(Tag::model_key())
                .optional()
                .label("标签"),
            owner_field(),
            created_time_field(),
        ]
    }
}
