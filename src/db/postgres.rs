//! PostgreSQL implementation of [`Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::{Duration, Instant};

use super::models::{
    AdminUser, BlogCategory, BlogPost, BlogPostRow, CategoryFields, NewAdminUser, NewPageView,
    PageView, PageViewRow, PostFields, PostFilter, SiteContentItem, SiteContentRow,
};
use super::{Store, StoreError};

const ADMIN_COLUMNS: &str = "id, email, password_hash, created_at";

const CATEGORY_COLUMNS: &str = "id, name, slug, created_at";

/// Post columns plus the left-joined category, aliased so a missing
/// category comes back as four nulls.
const POST_SELECT: &str = "\
    SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image, p.video_url, \
           p.category_id, p.author_id, p.status, p.published_at, p.created_at, p.updated_at, \
           c.id AS cat_id, c.name AS cat_name, c.slug AS cat_slug, c.created_at AS cat_created_at \
    FROM blog_posts p \
    LEFT JOIN blog_categories c ON p.category_id = c.id";

const PAGE_VIEW_COLUMNS: &str = "\
    id, page_path, page_title, referrer, user_agent, device_type, \
    browser, os, country, city, session_id, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the `WHERE`/`ORDER BY`/`LIMIT` tail for a post listing.
fn push_post_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    builder.push(" WHERE TRUE");

    if let Some(status) = filter.status {
        builder.push(" AND p.status = ").push_bind(status.as_str());
    }
    if let Some(slug) = &filter.slug {
        builder.push(" AND p.slug = ").push_bind(slug.clone());
    }
    if let Some(category_id) = &filter.category_id {
        builder.push(" AND p.category_id = ").push_bind(category_id.clone());
    }
    if let Some(exclude) = &filter.exclude {
        builder.push(" AND p.id <> ").push_bind(exclude.clone());
    }

    builder.push(" ORDER BY p.created_at DESC");

    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ").push_bind(i64::from(limit));
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>, StoreError> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM admin_users WHERE email = $1");
        let user = sqlx::query_as::<_, AdminUser>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<AdminUser>, StoreError> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM admin_users WHERE id = $1");
        let user = sqlx::query_as::<_, AdminUser>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_admin(&self, user: NewAdminUser) -> Result<AdminUser, StoreError> {
        let query = format!(
            "INSERT INTO admin_users (id, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING {ADMIN_COLUMNS}"
        );
        let user = sqlx::query_as::<_, AdminUser>(&query)
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_categories(&self) -> Result<Vec<BlogCategory>, StoreError> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM blog_categories ORDER BY name");
        let categories = sqlx::query_as::<_, BlogCategory>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn insert_category(
        &self,
        id: &str,
        fields: &CategoryFields,
    ) -> Result<BlogCategory, StoreError> {
        let query = format!(
            "INSERT INTO blog_categories (id, name, slug) \
             VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        let category = sqlx::query_as::<_, BlogCategory>(&query)
            .bind(id)
            .bind(&fields.name)
            .bind(&fields.slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(category)
    }

    async fn update_category(&self, id: &str, fields: &CategoryFields) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE blog_categories SET name = $1, slug = $2 WHERE id = $3")
            .bind(&fields.name)
            .bind(&fields.slug)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_category(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blog_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<BlogPost>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(POST_SELECT);
        push_post_filter(&mut builder, filter);

        let rows = builder
            .build_query_as::<BlogPostRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BlogPost::from).collect())
    }

    async fn get_post(&self, id: &str) -> Result<Option<BlogPost>, StoreError> {
        let query = format!("{POST_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, BlogPostRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(BlogPost::from))
    }

    async fn insert_post(
        &self,
        id: &str,
        author_id: Option<&str>,
        fields: &PostFields,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO blog_posts (id, title, slug, content, excerpt, featured_image, video_url,
                                    category_id, author_id, status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.slug)
        .bind(&fields.content)
        .bind(&fields.excerpt)
        .bind(&fields.featured_image)
        .bind(&fields.video_url)
        .bind(&fields.category_id)
        .bind(author_id)
        .bind(fields.status.as_str())
        .bind(fields.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_post(&self, id: &str, fields: &PostFields) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE blog_posts
            SET title = $1, slug = $2, content = $3, excerpt = $4, featured_image = $5,
                video_url = $6, category_id = $7, status = $8, published_at = $9,
                updated_at = now()
            WHERE id = $10
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.slug)
        .bind(&fields.content)
        .bind(&fields.excerpt)
        .bind(&fields.featured_image)
        .bind(&fields.video_url)
        .bind(&fields.category_id)
        .bind(fields.status.as_str())
        .bind(fields.published_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_page_view(&self, view: &NewPageView) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO page_views (id, page_path, page_title, referrer, user_agent, device_type,
                                    browser, os, country, city, session_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&view.id)
        .bind(&view.page_path)
        .bind(&view.page_title)
        .bind(&view.referrer)
        .bind(&view.user_agent)
        .bind(view.device_type.as_str())
        .bind(&view.browser)
        .bind(&view.os)
        .bind(&view.country)
        .bind(&view.city)
        .bind(&view.session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_page_views(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PageView>, StoreError> {
        let rows = match since {
            Some(since) => {
                let query = format!(
                    "SELECT {PAGE_VIEW_COLUMNS} FROM page_views \
                     WHERE created_at >= $1 ORDER BY created_at ASC"
                );
                sqlx::query_as::<_, PageViewRow>(&query)
                    .bind(since)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query =
                    format!("SELECT {PAGE_VIEW_COLUMNS} FROM page_views ORDER BY created_at ASC");
                sqlx::query_as::<_, PageViewRow>(&query)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(PageView::from).collect())
    }

    async fn list_content(&self) -> Result<Vec<SiteContentItem>, StoreError> {
        let rows = sqlx::query_as::<_, SiteContentRow>(
            "SELECT key, value, section, label, field_type FROM site_content ORDER BY section, key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SiteContentItem::from).collect())
    }

    async fn update_content_value(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE site_content SET value = $1, updated_at = now() WHERE key = $2")
                .bind(value)
                .bind(key)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn seed_content(&self, items: &[SiteContentItem]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO site_content (key, value, section, label, field_type)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (key) DO NOTHING
                "#,
            )
            .bind(&item.key)
            .bind(&item.value)
            .bind(&item.section)
            .bind(&item.label)
            .bind(item.field_type.as_str())
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}
