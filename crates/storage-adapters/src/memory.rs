//! In-memory repositories backed by `DashMap`.
//!
//! Used by the CLI and the integration tests; nothing here survives the
//! process.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    Fingerprint, Post, PostId, PostRepository, Tag, TagId, TagRepository, User, UserId,
    UserRepository,
};

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: DashMap<PostId, Post>,
    tags: DashMap<PostId, Vec<Tag>>,
    /// Stored in both directions.
    relations: DashMap<PostId, BTreeSet<PostId>>,
    last_id: AtomicU64,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Post> {
        self.posts
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value().clone())
    }

    fn replace_relations(&self, id: PostId, related: &[Post]) {
        let previous = self.relations.remove(&id).map(|(_, set)| set).unwrap_or_default();
        for other in previous {
            if let Some(mut set) = self.relations.get_mut(&other) {
                set.remove(&id);
            }
        }

        let current: BTreeSet<PostId> = related.iter().filter_map(|post| post.id).collect();
        for other in &current {
            self.relations.entry(*other).or_default().insert(id);
        }
        self.relations.insert(id, current);
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_by_id(&self, id: PostId) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> anyhow::Result<Option<Post>> {
        Ok(self
            .posts
            .iter()
            .find(|entry| entry.fingerprint.as_ref() == Some(fingerprint))
            .map(|entry| entry.value().clone()))
    }

    async fn find_tags(&self, id: PostId) -> anyhow::Result<Vec<Tag>> {
        Ok(self.tags.get(&id).map(|entry| entry.value().clone()).unwrap_or_default())
    }

    async fn find_relations(&self, id: PostId) -> anyhow::Result<Vec<Post>> {
        let ids: Vec<PostId> = self
            .relations
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|other| self.posts.get(&other).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn save(&self, post: &Post, tags: &[Tag], relations: &[Post]) -> anyhow::Result<PostId> {
        if let Some(missing) = relations
            .iter()
            .find(|p| !p.id.is_some_and(|id| self.posts.contains_key(&id)))
        {
            anyhow::bail!("related post {} is not persisted", missing.repr());
        }

        let id = match post.id {
            Some(id) => {
                self.last_id.fetch_max(id.0, Ordering::SeqCst);
                id
            }
            None => PostId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1),
        };

        let mut stored = post.clone();
        stored.id = Some(id);
        self.posts.insert(id, stored);
        self.tags.insert(id, tags.to_vec());
        self.replace_relations(id, relations);

        tracing::debug!(id = %id, name = %post.name, "Saved post in memory");
        Ok(id)
    }
}

#[derive(Default)]
pub struct InMemoryTagRepository {
    /// Keyed by lowercased name.
    tags: DashMap<String, Tag>,
    last_id: AtomicU64,
}

impl InMemoryTagRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Tag>> {
        Ok(self.tags.get(&name.to_lowercase()).map(|entry| entry.value().clone()))
    }

    async fn create(&self, name: &str) -> anyhow::Result<Tag> {
        let tag = self
            .tags
            .entry(name.to_lowercase())
            .or_insert_with(|| Tag {
                id: Some(TagId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)),
                name: name.to_string(),
            })
            .clone();
        Ok(tag)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: DashMap<UserId, User>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn saved(repo: &InMemoryPostRepository, name: &str, fingerprint: &str) -> Post {
        let mut post = Post::new(name);
        post.fingerprint = Some(Fingerprint::new(fingerprint));
        let id = block_on(repo.save(&post, &[], &[])).unwrap();
        post.id = Some(id);
        post
    }

    #[test]
    fn test_save_assigns_ids_and_finds_by_fingerprint() {
        let repo = InMemoryPostRepository::new();
        let first = saved(&repo, "a", "aaa");
        let second = saved(&repo, "b", "bbb");

        assert_eq!(first.id, Some(PostId(1)));
        assert_eq!(second.id, Some(PostId(2)));
        assert_eq!(repo.len(), 2);

        let found = block_on(repo.find_by_fingerprint(&Fingerprint::new("bbb"))).unwrap();
        assert_eq!(found.map(|p| p.name), Some("b".to_string()));
        assert!(block_on(repo.find_by_fingerprint(&Fingerprint::new("ccc"))).unwrap().is_none());
        assert_eq!(repo.find_by_name("a").and_then(|p| p.id), Some(PostId(1)));
    }

    #[test]
    fn test_relations_are_symmetric_and_replaced() {
        let repo = InMemoryPostRepository::new();
        let a = saved(&repo, "a", "1");
        let b = saved(&repo, "b", "2");
        let mut c = saved(&repo, "c", "3");

        block_on(repo.save(&c, &[], &[a.clone(), b.clone()])).unwrap();
        let from_a = block_on(repo.find_relations(a.id.unwrap())).unwrap();
        assert_eq!(from_a.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["c"]);

        c.source = "edited".to_string();
        block_on(repo.save(&c, &[], &[b.clone()])).unwrap();
        assert!(block_on(repo.find_relations(a.id.unwrap())).unwrap().is_empty());
        let from_c = block_on(repo.find_relations(c.id.unwrap())).unwrap();
        assert_eq!(from_c.len(), 1);
        assert_eq!(from_c[0].id, b.id);
    }

    #[test]
    fn test_save_rejects_unpersisted_relations() {
        let repo = InMemoryPostRepository::new();
        let err = block_on(repo.save(&Post::new("a"), &[], &[Post::new("ghost")])).unwrap_err();
        assert!(err.to_string().contains("@ghost"));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_tags_are_case_insensitive_and_created_once() {
        let repo = InMemoryTagRepository::new();
        let created = block_on(repo.create("Landscape")).unwrap();
        let again = block_on(repo.create("landscape")).unwrap();
        assert_eq!(created, again);

        let found = block_on(repo.find_by_name("LANDSCAPE")).unwrap().unwrap();
        assert_eq!(found.name, "Landscape");
        assert!(block_on(repo.find_by_name("portrait")).unwrap().is_none());
    }

    #[test]
    fn test_users() {
        let repo = InMemoryUserRepository::new();
        repo.insert(User {
            id: UserId(7),
            name: "mod".to_string(),
        });
        assert_eq!(
            block_on(repo.find_by_id(UserId(7))).unwrap().map(|u| u.name),
            Some("mod".to_string())
        );
        assert!(block_on(repo.find_by_id(UserId(8))).unwrap().is_none());
    }
}
