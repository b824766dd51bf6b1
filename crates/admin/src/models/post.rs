//! News posts.

use amicale_core::PostId;
use amicale_core::records::{Editable, FormDraft, ImageSlots, Record};
use amicale_core::remote::Sort;
use amicale_core::schema::{FieldKind, FieldSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Create/edit buffer for a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub image_urls: Vec<String>,
    pub published: bool,
}

impl FormDraft for PostDraft {
    fn attach_image(&mut self, url: String) {
        self.image_urls.push(url);
    }
}

impl Record for Post {
    type Id = PostId;
    type Draft = PostDraft;

    const COLLECTION: &'static str = "posts";
    const SORT: Sort = Sort::descending("created_at");

    fn id(&self) -> PostId {
        self.id
    }
}

impl Editable for Post {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::required("content", FieldKind::LongText),
        FieldSpec::optional("excerpt", FieldKind::LongText),
        FieldSpec::optional("image_urls", FieldKind::UrlList),
        FieldSpec::required("published", FieldKind::Boolean),
    ];
    const IMAGES: ImageSlots = ImageSlots::Multiple;

    fn to_draft(&self) -> PostDraft {
        PostDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            excerpt: self.excerpt.clone(),
            image_urls: self.image_urls.clone(),
            published: self.published,
        }
    }
}
