//! In-process [`Store`] used when no `DATABASE_URL` is configured and by the
//! test-suite. Mirrors the PostgreSQL schema's constraints: unique admin
//! email and category slug, weak category references, insert-only page views.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::models::{
    AdminUser, BlogCategory, BlogPost, CategoryFields, NewAdminUser, NewPageView, PageView,
    PostFields, PostFilter, SiteContentItem,
};
use super::{Store, StoreError};

#[derive(Debug, Clone)]
struct StoredPost {
    seq: u64,
    id: String,
    author_id: Option<String>,
    fields: PostFields,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    next_seq: u64,
    admins: Vec<AdminUser>,
    categories: Vec<BlogCategory>,
    posts: Vec<StoredPost>,
    page_views: Vec<PageView>,
    content: Vec<SiteContentItem>,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn slug_taken(&self, slug: &str, except: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.slug == slug && c.id != except)
    }

    fn join(&self, post: &StoredPost) -> BlogPost {
        let category = post.fields.category_id.as_ref().and_then(|id| {
            self.categories
                .iter()
                .find(|category| &category.id == id)
                .cloned()
        });

        BlogPost {
            id: post.id.clone(),
            title: post.fields.title.clone(),
            slug: post.fields.slug.clone(),
            content: post.fields.content.clone(),
            excerpt: post.fields.excerpt.clone(),
            featured_image: post.fields.featured_image.clone(),
            video_url: post.fields.video_url.clone(),
            category_id: post.fields.category_id.clone(),
            author_id: post.author_id.clone(),
            status: post.fields.status,
            published_at: post.fields.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
            category,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    content_loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the site-content table has been read.
    pub fn content_loads(&self) -> usize {
        self.content_loads.load(Ordering::SeqCst)
    }
}

fn matches(post: &StoredPost, filter: &PostFilter) -> bool {
    filter.status.is_none_or(|status| post.fields.status == status)
        && filter
            .slug
            .as_ref()
            .is_none_or(|slug| &post.fields.slug == slug)
        && filter
            .category_id
            .as_ref()
            .is_none_or(|id| post.fields.category_id.as_ref() == Some(id))
        && filter.exclude.as_ref().is_none_or(|id| &post.id != id)
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<Duration, StoreError> {
        Ok(Duration::ZERO)
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.admins.iter().find(|u| u.email == email).cloned())
    }

    async fn find_admin_by_id(&self, id: &str) -> Result<Option<AdminUser>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.admins.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_admin(&self, user: NewAdminUser) -> Result<AdminUser, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.admins.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("uq_admin_users_email".to_string()));
        }

        let admin = AdminUser {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.admins.push(admin.clone());
        Ok(admin)
    }

    async fn list_categories(&self) -> Result<Vec<BlogCategory>, StoreError> {
        let tables = self.tables.read().await;
        let mut categories = tables.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(
        &self,
        id: &str,
        fields: &CategoryFields,
    ) -> Result<BlogCategory, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&fields.slug, id) {
            return Err(StoreError::Conflict("uq_blog_categories_slug".to_string()));
        }

        let category = BlogCategory {
            id: id.to_string(),
            name: fields.name.clone(),
            slug: fields.slug.clone(),
            created_at: Utc::now(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: &str, fields: &CategoryFields) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&fields.slug, id) {
            return Err(StoreError::Conflict("uq_blog_categories_slug".to_string()));
        }

        match tables.categories.iter_mut().find(|c| c.id == id) {
            Some(category) => {
                category.name = fields.name.clone();
                category.slug = fields.slug.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_category(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<BlogPost>, StoreError> {
        let tables = self.tables.read().await;
        let mut posts: Vec<&StoredPost> =
            tables.posts.iter().filter(|p| matches(p, filter)).collect();
        posts.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));

        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
        Ok(posts
            .into_iter()
            .take(limit)
            .map(|p| tables.join(p))
            .collect())
    }

    async fn get_post(&self, id: &str) -> Result<Option<BlogPost>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.join(p)))
    }

    async fn insert_post(
        &self,
        id: &str,
        author_id: Option<&str>,
        fields: &PostFields,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let seq = tables.seq();
        let now = Utc::now();
        tables.posts.push(StoredPost {
            seq,
            id: id.to_string(),
            author_id: author_id.map(str::to_string),
            fields: fields.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn update_post(&self, id: &str, fields: &PostFields) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.fields = fields.clone();
                post.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_post(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.posts.retain(|p| p.id != id);
        Ok(())
    }

    async fn insert_page_view(&self, view: &NewPageView) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.page_views.push(PageView {
            id: view.id.clone(),
            page_path: view.page_path.clone(),
            page_title: view.page_title.clone(),
            referrer: view.referrer.clone(),
            user_agent: view.user_agent.clone(),
            device_type: view.device_type,
            browser: view.browser.clone(),
            os: view.os.clone(),
            country: view.country.clone(),
            city: view.city.clone(),
            session_id: view.session_id.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_page_views(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PageView>, StoreError> {
        let tables = self.tables.read().await;
        // Rows are appended in creation order, so insertion order is ascending.
        Ok(tables
            .page_views
            .iter()
            .filter(|v| since.is_none_or(|since| v.created_at >= since))
            .cloned()
            .collect())
    }

    async fn list_content(&self) -> Result<Vec<SiteContentItem>, StoreError> {
        self.content_loads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().await;
        let mut items = tables.content.clone();
        items.sort_by(|a, b| (&a.section, &a.key).cmp(&(&b.section, &b.key)));
        Ok(items)
    }

    async fn update_content_value(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.content.iter_mut().find(|item| item.key == key) {
            Some(item) => {
                item.value = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn seed_content(&self, items: &[SiteContentItem]) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let mut inserted = 0;
        for item in items {
            if tables.content.iter().any(|existing| existing.key == item.key) {
                continue;
            }
            tables.content.push(item.clone());
            inserted += 1;
        }
        Ok(inserted)
    }
}
