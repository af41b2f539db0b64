// Marketplace posts and their comments. Comments are ancestor-keyed under
// their post, and the post carries an append-only list of comment IDs in
// creation order; both sides are maintained here.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::json;

use crate::error::{StoreError, StoreResult};
use crate::model::{Comment, Post};
use crate::store::key::{Key, Kind};
use crate::store::props::{self, Properties};
use crate::store::query::Query;
use crate::store::Datastore;

/// A post together with its joined comments. The join is a second query
/// and is not transactional with the post read: the comments can reflect a
/// slightly earlier or later state than the post snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Outcome of a multi-record denormalization write. There is no atomicity
/// across the set; `updated < attempted` means some records are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub attempted: usize,
    pub updated: usize,
}

fn post_key(post_id: &str) -> Key {
    Key::new(Kind::Post, post_id)
}

fn comment_key(post_id: &str, comment_id: &str) -> Key {
    Key::child(Kind::Post, post_id, Kind::Comment, comment_id)
}

/// Upsert a post record.
pub fn save_post(store: &dyn Datastore, post: &Post) -> StoreResult<()> {
    store.put(&post_key(&post.post_id), &post.to_props())
}

/// Overwrite an existing post. Unlike save_post this fails NotFound when
/// the ID is unknown.
pub fn update_post(store: &dyn Datastore, post: &Post) -> StoreResult<()> {
    store.update(&post_key(&post.post_id), &post.to_props())
}

/// Delete a post and the comments keyed under it. Idempotent: deleting an
/// unknown ID succeeds. The multi-record delete is sequential, not atomic.
pub fn delete_post(store: &dyn Datastore, post_id: &str) -> StoreResult<()> {
    let key = post_key(post_id);
    let comments = store.query(&Query::kind(Kind::Comment).ancestor(key.clone()))?;
    for (comment_key, _) in comments {
        store.delete(&comment_key)?;
    }
    store.delete(&key)?;
    Ok(())
}

/// All posts, newest first.
pub fn load_posts(store: &dyn Datastore) -> StoreResult<Vec<Post>> {
    let rows = store.query(&Query::kind(Kind::Post).order("-created"))?;
    rows.iter().map(|(_, props)| Post::from_props(props)).collect()
}

/// Posts authored by one user, newest first.
pub fn load_posts_by_user(store: &dyn Datastore, username: &str) -> StoreResult<Vec<Post>> {
    let rows = store.query(
        &Query::kind(Kind::Post)
            .filter("username", username)
            .order("-created"),
    )?;
    rows.iter().map(|(_, props)| Post::from_props(props)).collect()
}

/// Load one post and join its comments via an ancestor query, ordered by
/// creation (their position in the post's append-only comment list; any
/// record not on the list sorts after it by date then ID).
pub fn load_post(store: &dyn Datastore, post_id: &str) -> StoreResult<PostDetail> {
    let key = post_key(post_id);
    let post_props = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;
    let post = Post::from_props(&post_props)?;

    let rows = store.query(&Query::kind(Kind::Comment).ancestor(key))?;
    let mut comments = rows
        .iter()
        .map(|(_, props)| Comment::from_props(props))
        .collect::<StoreResult<Vec<Comment>>>()?;

    let positions: HashMap<&str, usize> = post
        .comments
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    comments.sort_by(|a, b| {
        match (
            positions.get(a.comment_id.as_str()),
            positions.get(b.comment_id.as_str()),
        ) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => (a.date.as_str(), a.comment_id.as_str())
                .cmp(&(b.date.as_str(), b.comment_id.as_str())),
        }
    });

    tracing::info!("loaded post {} with {} comments", post_id, comments.len());
    Ok(PostDetail { post, comments })
}

pub fn load_comment(
    store: &dyn Datastore,
    post_id: &str,
    comment_id: &str,
) -> StoreResult<Comment> {
    let key = comment_key(post_id, comment_id);
    let props = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;
    Comment::from_props(&props)
}

/// Persist a comment under its post and append the comment ID to the
/// post's comment list exactly once. The two writes are sequential: a
/// failure between them leaves a comment record the list does not yet
/// reference (picked up by the join's straggler ordering).
pub fn create_comment(store: &dyn Datastore, comment: &Comment) -> StoreResult<()> {
    store.put(
        &comment_key(&comment.post_id, &comment.comment_id),
        &comment.to_props(),
    )?;

    let key = post_key(&comment.post_id);
    let post_props = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;
    let mut ids = props::req_str_list(&post_props, Kind::Post, "comments")?;
    if !ids.iter().any(|id| id == &comment.comment_id) {
        ids.push(comment.comment_id.clone());
        let mut patch = Properties::new();
        patch.insert("comments".to_string(), json!(ids));
        store.update(&key, &patch)?;
    }

    tracing::info!("created comment {} on post {}", comment.comment_id, comment.post_id);
    Ok(())
}

/// Refresh the denormalized `profile_pic` on every post authored by the
/// user. Best-effort sequential: failures are logged and counted, not
/// propagated, so some posts may stay stale.
pub fn refresh_profile_pics(
    store: &dyn Datastore,
    username: &str,
    photo_url: &str,
) -> StoreResult<FanOut> {
    let rows = store.query(&Query::kind(Kind::Post).filter("username", username))?;
    let attempted = rows.len();

    let mut patch = Properties::new();
    patch.insert("profile_pic".to_string(), json!(photo_url));

    let mut updated = 0;
    for (key, _) in rows {
        match store.update(&key, &patch) {
            Ok(()) => updated += 1,
            Err(e) => tracing::warn!("profile_pic refresh failed for {}: {}", key, e),
        }
    }

    if updated < attempted {
        tracing::warn!(
            "profile_pic fan-out for {} updated {}/{} posts",
            username,
            updated,
            attempted
        );
    }
    Ok(FanOut { attempted, updated })
}
