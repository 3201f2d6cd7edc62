//! Database Models - records stored in the five site tables, plus the
//! insert/update payloads the routers hand to the [`Store`](super::Store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Admin users
// ============================================================================

/// Admin user row. The hash never leaves the server.
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public projection of an admin user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminProfile {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<AdminUser> for AdminProfile {
    fn from(user: AdminUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAdminUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}

// ============================================================================
// Blog categories
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct BlogCategory {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Editable category fields, used for both create and full replace.
#[derive(Debug, Clone)]
pub struct CategoryFields {
    pub name: String,
    pub slug: String,
}

// ============================================================================
// Blog posts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    /// Column values are constrained by the schema; anything else reads as draft.
    pub fn from_column(value: &str) -> Self {
        match value {
            "published" => PostStatus::Published,
            _ => PostStatus::Draft,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blog post with its category resolved through the left join.
///
/// `category` is `None` both when the post has no category and when the
/// referenced category has since been deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub video_url: String,
    pub category_id: Option<String>,
    pub author_id: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: Option<BlogCategory>,
}

/// Flat row produced by the posts/categories join.
#[derive(Debug, FromRow)]
pub struct BlogPostRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub video_url: String,
    pub category_id: Option<String>,
    pub author_id: Option<String>,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cat_id: Option<String>,
    pub cat_name: Option<String>,
    pub cat_slug: Option<String>,
    pub cat_created_at: Option<DateTime<Utc>>,
}

impl From<BlogPostRow> for BlogPost {
    fn from(row: BlogPostRow) -> Self {
        let category = match (row.cat_id, row.cat_name, row.cat_slug, row.cat_created_at) {
            (Some(id), Some(name), Some(slug), Some(created_at)) => Some(BlogCategory {
                id,
                name,
                slug,
                created_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            excerpt: row.excerpt,
            featured_image: row.featured_image,
            video_url: row.video_url,
            category_id: row.category_id,
            author_id: row.author_id,
            status: PostStatus::from_column(&row.status),
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            category,
        }
    }
}

/// Editable post fields with defaults already applied. Create and update
/// both carry the full set; an update replaces every one of them.
#[derive(Debug, Clone)]
pub struct PostFields {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub video_url: String,
    pub category_id: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
}

/// Equality filters for the post listing. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub slug: Option<String>,
    pub category_id: Option<String>,
    pub exclude: Option<String>,
    pub limit: Option<u32>,
}

// ============================================================================
// Page views
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }

    /// Client-reported labels are not trusted; unknown ones count as desktop.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "mobile" => DeviceType::Mobile,
            "tablet" => DeviceType::Tablet,
            _ => DeviceType::Desktop,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageView {
    pub id: String,
    pub page_path: String,
    pub page_title: String,
    pub referrer: String,
    pub user_agent: String,
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub country: String,
    pub city: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct PageViewRow {
    pub id: String,
    pub page_path: String,
    pub page_title: String,
    pub referrer: String,
    pub user_agent: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub country: String,
    pub city: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<PageViewRow> for PageView {
    fn from(row: PageViewRow) -> Self {
        Self {
            id: row.id,
            page_path: row.page_path,
            page_title: row.page_title,
            referrer: row.referrer,
            user_agent: row.user_agent,
            device_type: DeviceType::from_label(&row.device_type),
            browser: row.browser,
            os: row.os,
            country: row.country,
            city: row.city,
            session_id: row.session_id,
            created_at: row.created_at,
        }
    }
}

/// Page-view event with defaults applied, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewPageView {
    pub id: String,
    pub page_path: String,
    pub page_title: String,
    pub referrer: String,
    pub user_agent: String,
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub country: String,
    pub city: String,
    pub session_id: String,
}

// ============================================================================
// Site content
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Input,
    Textarea,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Input => "input",
            FieldType::Textarea => "textarea",
        }
    }

    pub fn from_column(value: &str) -> Self {
        match value {
            "textarea" => FieldType::Textarea,
            _ => FieldType::Input,
        }
    }
}

/// One editable piece of fixed site copy, addressed by its stable key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteContentItem {
    pub key: String,
    pub value: String,
    pub section: String,
    pub label: String,
    #[serde(default)]
    pub field_type: FieldType,
}

#[derive(Debug, FromRow)]
pub struct SiteContentRow {
    pub key: String,
    pub value: String,
    pub section: String,
    pub label: String,
    pub field_type: String,
}

impl From<SiteContentRow> for SiteContentItem {
    fn from(row: SiteContentRow) -> Self {
        Self {
            key: row.key,
            value: row.value,
            section: row.section,
            label: row.label,
            field_type: FieldType::from_column(&row.field_type),
        }
    }
}
